use crate::encode::annotations::{annotations, element_value, type_annotations};
use crate::encode::code::CodeWriter;
use crate::encode::constants::Constants;
use crate::jvm::class_file::{
    self, AnnotationDefault, Attribute, AttributeLike, BootstrapMethods, ClassFile,
    ConstantValue, ConstantsPool, EnclosingMethod, Exceptions, InnerClasses, MethodParameter, MethodParameters,
    ModuleMainClass, ModulePackages, NestHost, NestMembers, PermittedSubclasses, Record,
    RecordComponentInfo, RuntimeInvisibleAnnotations, RuntimeInvisibleParameterAnnotations,
    RuntimeInvisibleTypeAnnotations, RuntimeVisibleAnnotations,
    RuntimeVisibleParameterAnnotations, RuntimeVisibleTypeAnnotations, Signature, SourceFile,
    Version,
};
use crate::jvm::{Error, UNKNOWN_CLASS};
use crate::model::{
    Annotation, Class, Constant, Field, Method, Module, ModuleExport, RawAttribute,
    RecordComponent, TypeAnnotation,
};

/// Lay out a class as a class file
///
/// Constants are added to the pool in a fixed traversal order (header, fields, methods, class
/// attributes, bootstrap methods) so equal classes always produce identical bytes. `target`
/// overrides the version recorded in the class.
pub fn write_class(class: &Class, target: Option<Version>) -> Result<ClassFile, Error> {
    log::debug!("encoding class {}", class.name);
    ClassWriter::default()
        .write(class, target)
        .map_err(|err| err.in_class(&class.name))
}

#[derive(Default)]
struct ClassWriter {
    constants: Constants,
}

impl ClassWriter {
    fn write(mut self, class: &Class, target: Option<Version>) -> Result<ClassFile, Error> {
        let pool = &mut self.constants.pool;
        let this_class = pool.get_class(&class.name)?;
        let super_class = match &class.super_class {
            None => None,
            Some(name) => Some(pool.get_class(name)?),
        };
        let interfaces = class
            .interfaces
            .iter()
            .map(|interface| pool.get_class(interface))
            .collect::<Result<_, _>>()?;

        let fields = class
            .fields
            .iter()
            .map(|field| self.field(field))
            .collect::<Result<_, _>>()?;
        let methods = class
            .methods
            .iter()
            .map(|method| self.method(method))
            .collect::<Result<_, _>>()?;

        let mut attributes = self.class_attributes(class)?;
        let bootstrap_methods = self.constants.take_bootstrap_methods();
        if !bootstrap_methods.is_empty() {
            attributes.push(self.attribute(BootstrapMethods(bootstrap_methods))?);
        }

        Ok(ClassFile {
            version: target.unwrap_or(class.version),
            constants: self.constants.pool.into_offset_vec(),
            access_flags: class.access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    fn attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        self.constants.pool.get_attribute(attribute)
    }

    fn raw_attributes(
        &mut self,
        raw: &[RawAttribute],
        attributes: &mut Vec<Attribute>,
    ) -> Result<(), Error> {
        for attribute in raw {
            attributes.push(Attribute {
                name_index: self.constants.pool.get_utf8(&attribute.name)?,
                info: attribute.data.clone(),
            });
        }
        Ok(())
    }

    fn signature(
        &mut self,
        signature: &Option<String>,
        attributes: &mut Vec<Attribute>,
    ) -> Result<(), Error> {
        if let Some(signature) = signature {
            let signature = self.constants.pool.get_utf8(signature)?;
            attributes.push(self.attribute(Signature(signature))?);
        }
        Ok(())
    }

    fn annotations(
        &mut self,
        annots: &[Annotation],
        type_annots: &[TypeAnnotation],
        attributes: &mut Vec<Attribute>,
    ) -> Result<(), Error> {
        let (visible, invisible) = annotations(&mut self.constants.pool, annots)?;
        if !visible.is_empty() {
            attributes.push(self.attribute(RuntimeVisibleAnnotations(visible))?);
        }
        if !invisible.is_empty() {
            attributes.push(self.attribute(RuntimeInvisibleAnnotations(invisible))?);
        }
        let (visible, invisible) = type_annotations(&mut self.constants.pool, type_annots)?;
        if !visible.is_empty() {
            attributes.push(self.attribute(RuntimeVisibleTypeAnnotations(visible))?);
        }
        if !invisible.is_empty() {
            attributes.push(self.attribute(RuntimeInvisibleTypeAnnotations(invisible))?);
        }
        Ok(())
    }

    fn field(&mut self, field: &Field) -> Result<class_file::Field, Error> {
        let name_index = self.constants.pool.get_utf8(&field.name)?;
        let descriptor_index = self.constants.pool.get_utf8(&field.descriptor)?;

        let mut attributes = vec![];
        if let Some(value) = &field.value {
            match value {
                Constant::Int(_)
                | Constant::Long(_)
                | Constant::Float(_)
                | Constant::Double(_)
                | Constant::String(_) => {
                    let value = self.constants.loadable(value)?;
                    attributes.push(self.attribute(ConstantValue(value))?);
                }
                other => {
                    let msg = format!("field {} cannot have value {:?}", field.name, other);
                    return Err(Error::malformed(UNKNOWN_CLASS, msg));
                }
            }
        }
        self.signature(&field.signature, &mut attributes)?;
        self.annotations(&field.annotations, &field.type_annotations, &mut attributes)?;
        self.raw_attributes(&field.attributes, &mut attributes)?;

        Ok(class_file::Field {
            access_flags: field.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn method(&mut self, method: &Method) -> Result<class_file::Method, Error> {
        log::trace!("encoding method {}{}", method.name, method.descriptor);
        let name_index = self.constants.pool.get_utf8(&method.name)?;
        let descriptor_index = self.constants.pool.get_utf8(&method.descriptor)?;

        let mut attributes = vec![];
        if method.has_code() {
            let code = CodeWriter::new(&mut self.constants, method).write()?;
            attributes.push(self.attribute(code)?);
        } else if !method.body.is_empty() {
            let msg = format!(
                "abstract or native method {}{} has a body",
                method.name, method.descriptor
            );
            return Err(Error::malformed(UNKNOWN_CLASS, msg));
        }

        if !method.exceptions.is_empty() {
            let exceptions = method
                .exceptions
                .iter()
                .map(|exception| self.constants.pool.get_class(exception))
                .collect::<Result<_, _>>()?;
            attributes.push(self.attribute(Exceptions(exceptions))?);
        }
        self.signature(&method.signature, &mut attributes)?;

        let described = method
            .parameters
            .iter()
            .any(|param| param.name.is_some() || !param.access_flags.is_empty());
        if described {
            let mut parameters = vec![];
            for param in &method.parameters {
                let name = match &param.name {
                    None => None,
                    Some(name) => Some(self.constants.pool.get_utf8(name)?),
                };
                parameters.push(MethodParameter {
                    name,
                    access_flags: param.access_flags,
                });
            }
            attributes.push(self.attribute(MethodParameters(parameters))?);
        }

        if let Some(default) = &method.annotation_default {
            let default = element_value(&mut self.constants.pool, default)?;
            attributes.push(self.attribute(AnnotationDefault(default))?);
        }
        self.annotations(&method.annotations, &[], &mut attributes)?;

        let mut visible = vec![];
        let mut invisible = vec![];
        for param in &method.parameters {
            let (v, i) = annotations(&mut self.constants.pool, &param.annotations)?;
            visible.push(v);
            invisible.push(i);
        }
        if visible.iter().any(|annots| !annots.is_empty()) {
            attributes.push(self.attribute(RuntimeVisibleParameterAnnotations(visible))?);
        }
        if invisible.iter().any(|annots| !annots.is_empty()) {
            attributes.push(self.attribute(RuntimeInvisibleParameterAnnotations(invisible))?);
        }
        self.annotations(&[], &method.type_annotations, &mut attributes)?;
        self.raw_attributes(&method.attributes, &mut attributes)?;

        Ok(class_file::Method {
            access_flags: method.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn class_names(&mut self, names: &[String]) -> Result<Vec<class_file::ClassConstantIndex>, Error> {
        let indices = names
            .iter()
            .map(|name| self.constants.pool.get_class(name))
            .collect::<Result<_, _>>()?;
        Ok(indices)
    }

    fn class_attributes(&mut self, class: &Class) -> Result<Vec<Attribute>, Error> {
        let mut attributes = vec![];
        if let Some(source) = &class.source_file {
            let source = self.constants.pool.get_utf8(source)?;
            attributes.push(self.attribute(SourceFile(source))?);
        }
        self.signature(&class.signature, &mut attributes)?;

        if !class.inner_classes.is_empty() {
            let mut inner_classes = vec![];
            for inner in &class.inner_classes {
                let pool = &mut self.constants.pool;
                inner_classes.push(class_file::InnerClass {
                    inner_class: pool.get_class(&inner.name)?,
                    outer_class: match &inner.outer_name {
                        None => None,
                        Some(outer) => Some(pool.get_class(outer)?),
                    },
                    inner_name: match &inner.inner_name {
                        None => None,
                        Some(name) => Some(pool.get_utf8(name)?),
                    },
                    access_flags: inner.access_flags,
                });
            }
            attributes.push(self.attribute(InnerClasses(inner_classes))?);
        }

        if let Some(enclosing) = &class.enclosing_method {
            let pool = &mut self.constants.pool;
            let owner = pool.get_class(&enclosing.owner)?;
            let method = match (&enclosing.name, &enclosing.descriptor) {
                (None, None) => None,
                (Some(name), Some(descriptor)) => Some(pool.get_name_and_type(name, descriptor)?),
                _ => {
                    let msg = "enclosing method needs both a name and a descriptor";
                    return Err(Error::malformed(UNKNOWN_CLASS, msg));
                }
            };
            attributes.push(self.attribute(EnclosingMethod {
                class: owner,
                method,
            })?);
        }

        if let Some(host) = &class.nest_host {
            let host = self.constants.pool.get_class(host)?;
            attributes.push(self.attribute(NestHost(host))?);
        }
        if !class.nest_members.is_empty() {
            let members = self.class_names(&class.nest_members)?;
            attributes.push(self.attribute(NestMembers(members))?);
        }
        if !class.permitted_subclasses.is_empty() {
            let subclasses = self.class_names(&class.permitted_subclasses)?;
            attributes.push(self.attribute(PermittedSubclasses(subclasses))?);
        }

        if let Some(module) = &class.module {
            self.module(module, &mut attributes)?;
        }
        if let Some(components) = &class.record_components {
            let components = components
                .iter()
                .map(|component| self.record_component(component))
                .collect::<Result<_, _>>()?;
            attributes.push(self.attribute(Record(components))?);
        }

        self.annotations(&class.annotations, &class.type_annotations, &mut attributes)?;
        self.raw_attributes(&class.attributes, &mut attributes)?;
        Ok(attributes)
    }

    fn module(&mut self, module: &Module, attributes: &mut Vec<Attribute>) -> Result<(), Error> {
        let pool = &mut self.constants.pool;
        let mut requires = vec![];
        for require in &module.requires {
            requires.push(class_file::ModuleRequires {
                module: pool.get_module(&require.module)?,
                flags: require.access_flags,
                version: utf8_opt(pool, &require.version)?,
            });
        }
        let exports = module_packages(pool, &module.exports)?;
        let opens = module_packages(pool, &module.opens)?;
        let mut uses = vec![];
        for service in &module.uses {
            uses.push(pool.get_class(service)?);
        }
        let mut provides = vec![];
        for provide in &module.provides {
            let service = pool.get_class(&provide.service)?;
            let mut providers = vec![];
            for provider in &provide.providers {
                providers.push(pool.get_class(provider)?);
            }
            provides.push(class_file::ModuleProvides { service, providers });
        }
        let descriptor = class_file::Module {
            name: pool.get_module(&module.name)?,
            flags: module.access_flags,
            version: utf8_opt(pool, &module.version)?,
            requires,
            exports,
            opens,
            uses,
            provides,
        };
        attributes.push(self.attribute(descriptor)?);

        if !module.packages.is_empty() {
            let packages = module
                .packages
                .iter()
                .map(|package| self.constants.pool.get_package(package))
                .collect::<Result<_, _>>()?;
            attributes.push(self.attribute(ModulePackages(packages))?);
        }
        if let Some(main_class) = &module.main_class {
            let main_class = self.constants.pool.get_class(main_class)?;
            attributes.push(self.attribute(ModuleMainClass(main_class))?);
        }
        Ok(())
    }

    fn record_component(&mut self, component: &RecordComponent) -> Result<RecordComponentInfo, Error> {
        let name = self.constants.pool.get_utf8(&component.name)?;
        let descriptor = self.constants.pool.get_utf8(&component.descriptor)?;
        let mut attributes = vec![];
        self.signature(&component.signature, &mut attributes)?;
        self.annotations(
            &component.annotations,
            &component.type_annotations,
            &mut attributes,
        )?;
        Ok(RecordComponentInfo {
            name,
            descriptor,
            attributes,
        })
    }
}

fn utf8_opt(
    pool: &mut ConstantsPool,
    value: &Option<String>,
) -> Result<Option<class_file::Utf8ConstantIndex>, Error> {
    match value {
        None => Ok(None),
        Some(value) => Ok(Some(pool.get_utf8(value)?)),
    }
}

fn module_packages(
    pool: &mut ConstantsPool,
    exports: &[ModuleExport],
) -> Result<Vec<class_file::ModulePackage>, Error> {
    let mut packages = vec![];
    for export in exports {
        let mut modules = vec![];
        for module in &export.modules {
            modules.push(pool.get_module(module)?);
        }
        packages.push(class_file::ModulePackage {
            package: pool.get_package(&export.package)?,
            flags: export.access_flags,
            modules,
        });
    }
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::annotations::annotation;
    use crate::jvm::class_file::ConstantsReader;
    use crate::jvm::{FieldAccessFlags, MethodAccessFlags};
    use crate::model::{Entry, Instruction, Parameter};

    fn attribute_names(class_file: &ClassFile, attributes: &[Attribute]) -> Vec<String> {
        attributes
            .iter()
            .map(|attr| class_file.constants.utf8(attr.name_index).unwrap().to_owned())
            .collect()
    }

    #[test]
    fn constant_fields() {
        let mut class = Class::new("Consts", Some("java/lang/Object"));
        let mut field = Field::new(FieldAccessFlags::STATIC | FieldAccessFlags::FINAL, "N", "I");
        field.value = Some(Constant::Int(42));
        class.fields.push(field);
        let class_file = write_class(&class, None).unwrap();
        let names = attribute_names(&class_file, &class_file.fields[0].attributes);
        assert_eq!(names, vec!["ConstantValue"]);

        let mut bad = Field::new(FieldAccessFlags::STATIC, "C", "Ljava/lang/Class;");
        bad.value = Some(Constant::Class("Consts".into()));
        class.fields.push(bad);
        match write_class(&class, None) {
            Err(Error::MalformedClass { class, .. }) => assert_eq!(class, "Consts"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn parameters_only_when_described() {
        let mut class = Class::new("Params", Some("java/lang/Object"));
        let method = Method::new(MethodAccessFlags::ABSTRACT, "run", "(II)V");
        class.methods.push(method.clone());

        let mut named = method;
        named.name = "named".into();
        named.parameters[1] = Parameter {
            name: Some("b".into()),
            ..Parameter::default()
        };
        named.parameters[0]
            .annotations
            .push(Annotation::new("LNonNull;", false));
        class.methods.push(named);

        let class_file = write_class(&class, None).unwrap();
        assert!(class_file.methods[0].attributes.is_empty());
        let names = attribute_names(&class_file, &class_file.methods[1].attributes);
        assert_eq!(
            names,
            vec!["MethodParameters", "RuntimeInvisibleParameterAnnotations"]
        );
        let annots = class_file.methods[1].attributes[1]
            .parse::<RuntimeInvisibleParameterAnnotations>()
            .unwrap();
        assert_eq!(annots.0.len(), 2);
        assert!(annots.0[1].is_empty());
    }

    #[test]
    fn abstract_methods_have_no_body() {
        let mut class = Class::new("Bad", Some("java/lang/Object"));
        let mut method = Method::new(MethodAccessFlags::ABSTRACT, "run", "()V");
        method
            .body
            .push(Entry::Instruction(Instruction::Simple(crate::jvm::opcodes::RETURN)));
        class.methods.push(method);
        assert!(write_class(&class, None).is_err());
    }

    #[test]
    fn target_version_override() {
        let class = Class::new("Old", Some("java/lang/Object"));
        let class_file = write_class(&class, Some(Version::JAVA17)).unwrap();
        assert_eq!(class_file.version, Version::JAVA17);
        assert_eq!(write_class(&class, None).unwrap().version, Version::JAVA8);
    }

    #[test]
    fn annotation_payload() {
        let mut annot = Annotation::new("LTag;", true);
        annot
            .values
            .push(("value".into(), crate::model::AnnotationValue::Int(3)));
        let info = annotation(&mut ConstantsPool::new(), &annot).unwrap();
        assert_eq!(info.element_value_pairs.len(), 1);
    }
}
