use crate::jvm::class_file::{self, BootstrapMethod, ConstantIndex, ConstantsReader};
use crate::jvm::{Error, UNKNOWN_CLASS};
use crate::model::{Constant, DynamicConstant, Handle};
use crate::util::OffsetVec;

/// Bootstrap arguments may reference dynamic constants, which may have bootstrap arguments...
const MAX_DYNAMIC_NESTING: usize = 32;

/// Constant pool along with the class' bootstrap methods
pub struct Pool<'a> {
    pub constants: &'a OffsetVec<class_file::Constant>,
    pub bootstrap_methods: &'a [BootstrapMethod],
}

impl<'a> ConstantsReader for Pool<'a> {
    fn constant(&self, index: ConstantIndex) -> Result<&class_file::Constant, Error> {
        self.constants.constant(index)
    }
}

impl<'a> Pool<'a> {
    /// Resolve a loadable constant
    pub fn loadable(&self, index: ConstantIndex) -> Result<Constant, Error> {
        self.loadable_nested(index, 0)
    }

    fn loadable_nested(&self, index: ConstantIndex, depth: usize) -> Result<Constant, Error> {
        let constant = match self.constant(index)? {
            class_file::Constant::Integer(i) => Constant::Int(*i),
            class_file::Constant::Long(l) => Constant::Long(*l),
            class_file::Constant::Float(f) => Constant::Float(*f),
            class_file::Constant::Double(d) => Constant::Double(*d),
            class_file::Constant::String(s) => Constant::String(self.utf8(*s)?.to_owned()),
            class_file::Constant::Class(name) => Constant::Class(self.utf8(*name)?.to_owned()),
            class_file::Constant::MethodType { descriptor } => {
                Constant::MethodType(self.utf8(*descriptor)?.to_owned())
            }
            class_file::Constant::MethodHandle { .. } => Constant::MethodHandle(self.handle(index)?),
            class_file::Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                if depth >= MAX_DYNAMIC_NESTING {
                    let msg = format!("dynamic constant {} nests too deeply", index.0);
                    return Err(Error::malformed(UNKNOWN_CLASS, msg));
                }
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                let (bootstrap, arguments) = self.bootstrap(*bootstrap_method, depth + 1)?;
                Constant::Dynamic(Box::new(DynamicConstant {
                    name: name.to_owned(),
                    descriptor: descriptor.to_owned(),
                    bootstrap,
                    arguments,
                }))
            }
            other => {
                let msg = format!("constant {} is not loadable: {:?}", index.0, other);
                return Err(Error::malformed(UNKNOWN_CLASS, msg));
            }
        };
        Ok(constant)
    }

    /// Resolve a `CONSTANT_MethodHandle`
    pub fn handle(&self, index: ConstantIndex) -> Result<Handle, Error> {
        match self.constant(index)? {
            class_file::Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                let (owner, name, descriptor, interface) = if handle_kind.is_field() {
                    let (owner, name, descriptor) = self.field_ref(*member)?;
                    (owner, name, descriptor, false)
                } else {
                    self.method_ref(*member)?
                };
                Ok(Handle {
                    kind: *handle_kind,
                    owner: owner.to_owned(),
                    name: name.to_owned(),
                    descriptor: descriptor.to_owned(),
                    interface,
                })
            }
            other => {
                let msg = format!("constant {} is not a method handle: {:?}", index.0, other);
                Err(Error::malformed(UNKNOWN_CLASS, msg))
            }
        }
    }

    /// Resolve an entry of the `BootstrapMethods` attribute
    pub fn bootstrap(
        &self,
        bootstrap_method: u16,
        depth: usize,
    ) -> Result<(Handle, Vec<Constant>), Error> {
        let method = self
            .bootstrap_methods
            .get(bootstrap_method as usize)
            .ok_or_else(|| {
                let msg = format!("invalid bootstrap method index {}", bootstrap_method);
                Error::malformed(UNKNOWN_CLASS, msg)
            })?;
        let handle = self.handle(method.bootstrap_method)?;
        let arguments = method
            .bootstrap_arguments
            .iter()
            .map(|arg| self.loadable_nested(*arg, depth))
            .collect::<Result<_, _>>()?;
        Ok((handle, arguments))
    }

    /// Resolve a `CONSTANT_InvokeDynamic` into name, descriptor, bootstrap handle, and arguments
    pub fn invoke_dynamic(
        &self,
        index: ConstantIndex,
    ) -> Result<(String, String, Handle, Vec<Constant>), Error> {
        match self.constant(index)? {
            class_file::Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                let (handle, arguments) = self.bootstrap(*bootstrap_method, 0)?;
                Ok((name.to_owned(), descriptor.to_owned(), handle, arguments))
            }
            other => {
                let msg = format!("constant {} is not an invokedynamic: {:?}", index.0, other);
                Err(Error::malformed(UNKNOWN_CLASS, msg))
            }
        }
    }

    pub fn integer(&self, index: ConstantIndex) -> Result<i32, Error> {
        match self.constant(index)? {
            class_file::Constant::Integer(i) => Ok(*i),
            other => Err(wrong_constant(index, "Integer", other)),
        }
    }

    pub fn long(&self, index: ConstantIndex) -> Result<i64, Error> {
        match self.constant(index)? {
            class_file::Constant::Long(l) => Ok(*l),
            other => Err(wrong_constant(index, "Long", other)),
        }
    }

    pub fn float(&self, index: ConstantIndex) -> Result<f32, Error> {
        match self.constant(index)? {
            class_file::Constant::Float(f) => Ok(*f),
            other => Err(wrong_constant(index, "Float", other)),
        }
    }

    pub fn double(&self, index: ConstantIndex) -> Result<f64, Error> {
        match self.constant(index)? {
            class_file::Constant::Double(d) => Ok(*d),
            other => Err(wrong_constant(index, "Double", other)),
        }
    }
}

fn wrong_constant(index: ConstantIndex, expected: &str, found: &class_file::Constant) -> Error {
    let msg = format!(
        "constant pool index {} should be {} but is {:?}",
        index.0, expected, found
    );
    Error::malformed(UNKNOWN_CLASS, msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::class_file::{ConstantsPool, HandleKind};

    #[test]
    fn resolve_handles_and_dynamics() {
        let mut pool = ConstantsPool::new();
        let bsm = pool
            .get_method_handle(HandleKind::InvokeStatic, "Boot", "bsm", "()V", false)
            .unwrap();
        let condy = pool.get_dynamic(0, "_", "J").unwrap();
        let string = pool.get_string("hi").unwrap();
        let constants = pool.into_offset_vec();
        let bootstrap_methods = vec![BootstrapMethod {
            bootstrap_method: bsm,
            bootstrap_arguments: vec![string],
        }];
        let pool = Pool {
            constants: &constants,
            bootstrap_methods: &bootstrap_methods,
        };

        match pool.loadable(condy).unwrap() {
            Constant::Dynamic(dynamic) => {
                assert_eq!(dynamic.descriptor, "J");
                assert_eq!(dynamic.bootstrap.name, "bsm");
                assert_eq!(dynamic.arguments, vec![Constant::String("hi".into())]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(pool.integer(string).is_err());
    }

    #[test]
    fn self_referencing_dynamic_is_rejected() {
        let mut pool = ConstantsPool::new();
        let bsm = pool
            .get_method_handle(HandleKind::InvokeStatic, "Boot", "bsm", "()V", false)
            .unwrap();
        let condy = pool.get_dynamic(0, "_", "I").unwrap();
        let constants = pool.into_offset_vec();
        let bootstrap_methods = vec![BootstrapMethod {
            bootstrap_method: bsm,
            bootstrap_arguments: vec![condy],
        }];
        let pool = Pool {
            constants: &constants,
            bootstrap_methods: &bootstrap_methods,
        };
        assert!(pool.loadable(condy).is_err());
    }
}
