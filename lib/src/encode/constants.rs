use crate::jvm::class_file::{BootstrapMethod, ConstantIndex, ConstantsPool};
use crate::jvm::{Error, UNKNOWN_CLASS};
use crate::model::{Constant, Handle};
use std::collections::HashMap;

/// Constant pool under construction, along with the bootstrap methods it references
#[derive(Default)]
pub struct Constants {
    pub pool: ConstantsPool,
    bootstrap_methods: Vec<BootstrapMethod>,
    bootstrap_indices: HashMap<(ConstantIndex, Vec<ConstantIndex>), u16>,
}

impl Constants {
    /// Get or insert a loadable constant
    pub fn loadable(&mut self, constant: &Constant) -> Result<ConstantIndex, Error> {
        let index = match constant {
            Constant::Int(i) => self.pool.get_integer(*i)?,
            Constant::Long(l) => self.pool.get_long(*l)?,
            Constant::Float(f) => self.pool.get_float(*f)?,
            Constant::Double(d) => self.pool.get_double(*d)?,
            Constant::String(s) => self.pool.get_string(s)?,
            Constant::Class(class) => self.pool.get_class(class)?.0,
            Constant::MethodType(descriptor) => self.pool.get_method_type(descriptor)?,
            Constant::MethodHandle(handle) => self.handle(handle)?,
            Constant::Dynamic(dynamic) => {
                let bootstrap = self.bootstrap(&dynamic.bootstrap, &dynamic.arguments)?;
                self.pool
                    .get_dynamic(bootstrap, &dynamic.name, &dynamic.descriptor)?
            }
        };
        Ok(index)
    }

    pub fn handle(&mut self, handle: &Handle) -> Result<ConstantIndex, Error> {
        let index = self.pool.get_method_handle(
            handle.kind,
            &handle.owner,
            &handle.name,
            &handle.descriptor,
            handle.interface,
        )?;
        Ok(index)
    }

    /// Get or insert a bootstrap method entry, returning its index in `BootstrapMethods`
    pub fn bootstrap(&mut self, handle: &Handle, arguments: &[Constant]) -> Result<u16, Error> {
        let method = self.handle(handle)?;
        let arguments = arguments
            .iter()
            .map(|argument| self.loadable(argument))
            .collect::<Result<Vec<_>, _>>()?;
        let key = (method, arguments);
        if let Some(index) = self.bootstrap_indices.get(&key) {
            return Ok(*index);
        }
        let index = u16::try_from(self.bootstrap_methods.len())
            .map_err(|_| Error::malformed(UNKNOWN_CLASS, "too many bootstrap methods"))?;
        self.bootstrap_methods.push(BootstrapMethod {
            bootstrap_method: key.0,
            bootstrap_arguments: key.1.clone(),
        });
        self.bootstrap_indices.insert(key, index);
        Ok(index)
    }

    pub fn invoke_dynamic(
        &mut self,
        name: &str,
        descriptor: &str,
        bootstrap: &Handle,
        arguments: &[Constant],
    ) -> Result<ConstantIndex, Error> {
        let bootstrap = self.bootstrap(bootstrap, arguments)?;
        Ok(self.pool.get_invoke_dynamic(bootstrap, name, descriptor)?)
    }

    /// Bootstrap methods accumulated so far, in index order
    pub fn take_bootstrap_methods(&mut self) -> Vec<BootstrapMethod> {
        self.bootstrap_indices.clear();
        std::mem::take(&mut self.bootstrap_methods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::class_file::HandleKind;
    use crate::model::DynamicConstant;

    fn metafactory() -> Handle {
        Handle {
            kind: HandleKind::InvokeStatic,
            owner: "java/lang/invoke/LambdaMetafactory".into(),
            name: "metafactory".into(),
            descriptor: "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;".into(),
            interface: false,
        }
    }

    #[test]
    fn bootstrap_methods_are_shared() {
        let mut constants = Constants::default();
        let args = vec![Constant::MethodType("()V".into())];
        let first = constants
            .invoke_dynamic("run", "()Ljava/lang/Runnable;", &metafactory(), &args)
            .unwrap();
        let second = constants
            .invoke_dynamic("call", "()Ljava/lang/Runnable;", &metafactory(), &args)
            .unwrap();
        assert_ne!(first, second);
        let methods = constants.take_bootstrap_methods();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].bootstrap_arguments.len(), 1);
    }

    #[test]
    fn nested_dynamic_constants() {
        let mut constants = Constants::default();
        let inner = Constant::Dynamic(Box::new(DynamicConstant {
            name: "inner".into(),
            descriptor: "I".into(),
            bootstrap: metafactory(),
            arguments: vec![],
        }));
        let outer = Constant::Dynamic(Box::new(DynamicConstant {
            name: "outer".into(),
            descriptor: "J".into(),
            bootstrap: metafactory(),
            arguments: vec![inner],
        }));
        constants.loadable(&outer).unwrap();
        assert_eq!(constants.take_bootstrap_methods().len(), 2);
    }
}
