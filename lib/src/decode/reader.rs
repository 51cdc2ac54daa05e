use crate::decode::annotations::{annotations, element_value, type_annotations};
use crate::decode::attributes::Attributes;
use crate::decode::code::read_body;
use crate::decode::constants::Pool;
use crate::decode::{ClassVisitor, MethodVisitor, Mode};
use crate::jvm::class_file::{
    self, AnnotationDefault, BootstrapMethods, ClassFile, Code, ConstantValue, ConstantsReader,
    EnclosingMethod, Exceptions, InnerClasses, MethodParameters, Module, ModuleMainClass,
    ModulePackages, NestHost, NestMembers, PermittedSubclasses, Record,
    RuntimeInvisibleAnnotations, RuntimeInvisibleParameterAnnotations,
    RuntimeInvisibleTypeAnnotations, RuntimeVisibleAnnotations,
    RuntimeVisibleParameterAnnotations, RuntimeVisibleTypeAnnotations, Signature, SourceFile,
};
use crate::jvm::{Error, MethodDescriptor, ParseDescriptor, UNKNOWN_CLASS};
use crate::model::{self, Annotation, Constant, Parameter, TypeAnnotation};

const CLASS_ATTRIBUTES: &[&str] = &[
    "SourceFile",
    "Signature",
    "InnerClasses",
    "EnclosingMethod",
    "NestHost",
    "NestMembers",
    "PermittedSubclasses",
    "Module",
    "ModulePackages",
    "ModuleMainClass",
    "Record",
    "BootstrapMethods",
    "RuntimeVisibleAnnotations",
    "RuntimeInvisibleAnnotations",
    "RuntimeVisibleTypeAnnotations",
    "RuntimeInvisibleTypeAnnotations",
];

const FIELD_ATTRIBUTES: &[&str] = &[
    "ConstantValue",
    "Signature",
    "RuntimeVisibleAnnotations",
    "RuntimeInvisibleAnnotations",
    "RuntimeVisibleTypeAnnotations",
    "RuntimeInvisibleTypeAnnotations",
];

const METHOD_ATTRIBUTES: &[&str] = &[
    "Code",
    "Exceptions",
    "Signature",
    "MethodParameters",
    "AnnotationDefault",
    "RuntimeVisibleAnnotations",
    "RuntimeInvisibleAnnotations",
    "RuntimeVisibleParameterAnnotations",
    "RuntimeInvisibleParameterAnnotations",
    "RuntimeVisibleTypeAnnotations",
    "RuntimeInvisibleTypeAnnotations",
];

const RECORD_COMPONENT_ATTRIBUTES: &[&str] = &[
    "Signature",
    "RuntimeVisibleAnnotations",
    "RuntimeInvisibleAnnotations",
    "RuntimeVisibleTypeAnnotations",
    "RuntimeInvisibleTypeAnnotations",
];

/// Parse class file bytes and walk them with a visitor
///
/// Errors are reported as `MalformedClass` naming the class, as soon as its name is known.
pub fn read_class<V: ClassVisitor>(bytes: &[u8], mode: Mode, visitor: &mut V) -> Result<(), Error> {
    let class_file = ClassFile::parse(bytes)?;
    let name = class_file.name()?.to_owned();
    log::debug!("decoding class {}", name);
    accept(&class_file, mode, visitor).map_err(|err| err.in_class(&name))
}

/// Annotations and type annotations, visible ones first
fn all_annotations(
    pool: &Pool,
    attributes: &Attributes,
) -> Result<(Vec<Annotation>, Vec<TypeAnnotation>), Error> {
    let mut annots = vec![];
    if let Some(RuntimeVisibleAnnotations(infos)) = attributes.get()? {
        annots.extend(annotations(pool, &infos, true)?);
    }
    if let Some(RuntimeInvisibleAnnotations(infos)) = attributes.get()? {
        annots.extend(annotations(pool, &infos, false)?);
    }
    let mut type_annots = vec![];
    if let Some(RuntimeVisibleTypeAnnotations(infos)) = attributes.get()? {
        type_annots.extend(type_annotations(pool, &infos, true)?);
    }
    if let Some(RuntimeInvisibleTypeAnnotations(infos)) = attributes.get()? {
        type_annots.extend(type_annotations(pool, &infos, false)?);
    }
    Ok((annots, type_annots))
}

fn accept<V: ClassVisitor>(class_file: &ClassFile, mode: Mode, visitor: &mut V) -> Result<(), Error> {
    let constants = &class_file.constants;
    let attributes = Attributes::new(constants, &class_file.attributes, CLASS_ATTRIBUTES)?;
    let bootstrap_methods = attributes
        .get::<BootstrapMethods>()?
        .map_or_else(Vec::new, |methods| methods.0);
    let pool = Pool {
        constants,
        bootstrap_methods: &bootstrap_methods,
    };

    let super_class = match class_file.super_class {
        None => None,
        Some(class) => Some(pool.class_name(class)?),
    };
    let interfaces = class_file
        .interfaces
        .iter()
        .map(|interface| Ok(pool.class_name(*interface)?.to_owned()))
        .collect::<Result<_, Error>>()?;
    visitor.visit_header(
        class_file.version,
        class_file.access_flags,
        class_file.name()?,
        super_class,
        interfaces,
    );

    if let Some(Signature(signature)) = attributes.get()? {
        visitor.visit_signature(pool.utf8(signature)?);
    }
    if mode == Mode::Full {
        if let Some(SourceFile(source)) = attributes.get()? {
            visitor.visit_source(pool.utf8(source)?);
        }
    }

    let (annots, type_annots) = all_annotations(&pool, &attributes)?;
    annots.into_iter().for_each(|a| visitor.visit_annotation(a));
    type_annots
        .into_iter()
        .for_each(|a| visitor.visit_type_annotation(a));

    if let Some(InnerClasses(inner_classes)) = attributes.get()? {
        for inner in inner_classes {
            let outer_name = match inner.outer_class {
                None => None,
                Some(outer) => Some(pool.class_name(outer)?.to_owned()),
            };
            let inner_name = match inner.inner_name {
                None => None,
                Some(name) => Some(pool.utf8(name)?.to_owned()),
            };
            visitor.visit_inner_class(model::InnerClass {
                name: pool.class_name(inner.inner_class)?.to_owned(),
                outer_name,
                inner_name,
                access_flags: inner.access_flags,
            });
        }
    }

    if let Some(EnclosingMethod { class, method }) = attributes.get()? {
        let (name, descriptor) = match method {
            None => (None, None),
            Some(method) => {
                let (name, descriptor) = pool.name_and_type(method)?;
                (Some(name.to_owned()), Some(descriptor.to_owned()))
            }
        };
        visitor.visit_enclosing_method(model::EnclosingMethod {
            owner: pool.class_name(class)?.to_owned(),
            name,
            descriptor,
        });
    }

    if let Some(NestHost(host)) = attributes.get()? {
        visitor.visit_nest_host(pool.class_name(host)?);
    }
    if let Some(NestMembers(members)) = attributes.get()? {
        for member in members {
            visitor.visit_nest_member(pool.class_name(member)?);
        }
    }
    if let Some(PermittedSubclasses(subclasses)) = attributes.get()? {
        for subclass in subclasses {
            visitor.visit_permitted_subclass(pool.class_name(subclass)?);
        }
    }

    match attributes.get::<Module>()? {
        Some(module) => visitor.visit_module(read_module(&pool, &attributes, module)?),
        None => {
            if attributes.get::<ModulePackages>()?.is_some()
                || attributes.get::<ModuleMainClass>()?.is_some()
            {
                log::warn!("dropping module attributes from a class without a module");
            }
        }
    }

    if let Some(Record(components)) = attributes.get()? {
        let components = components
            .iter()
            .map(|component| {
                let attributes =
                    Attributes::new(constants, &component.attributes, RECORD_COMPONENT_ATTRIBUTES)?;
                for dropped in &attributes.unknown {
                    log::warn!("dropping unsupported record component attribute {}", dropped.name);
                }
                let signature = match attributes.get::<Signature>()? {
                    None => None,
                    Some(Signature(signature)) => Some(pool.utf8(signature)?.to_owned()),
                };
                let (annotations, type_annotations) = all_annotations(&pool, &attributes)?;
                Ok(model::RecordComponent {
                    name: pool.utf8(component.name)?.to_owned(),
                    descriptor: pool.utf8(component.descriptor)?.to_owned(),
                    signature,
                    annotations,
                    type_annotations,
                })
            })
            .collect::<Result<_, Error>>()?;
        visitor.visit_record(components);
    }

    for raw in attributes.unknown {
        log::trace!("keeping raw class attribute {}", raw.name);
        visitor.visit_attribute(raw);
    }

    for field in &class_file.fields {
        visitor.visit_field(read_field(&pool, field)?);
    }

    for method in &class_file.methods {
        let name = pool.utf8(method.name_index)?;
        let descriptor = pool.utf8(method.descriptor_index)?;
        log::debug!("decoding method {}{}", name, descriptor);
        let mut method_visitor = visitor.visit_method(method.access_flags, name, descriptor);
        read_method(&pool, method, mode, &mut method_visitor).map_err(|err| match err {
            Error::MalformedClass { class, message } => Error::MalformedClass {
                class,
                message: format!("method '{}{}': {}", name, descriptor, message),
            },
            other => other,
        })?;
        visitor.visit_method_end(method_visitor);
    }

    Ok(())
}

fn read_module(pool: &Pool, attributes: &Attributes, module: Module) -> Result<model::Module, Error> {
    let utf8_opt = |index: Option<class_file::Utf8ConstantIndex>| -> Result<Option<String>, Error> {
        match index {
            None => Ok(None),
            Some(index) => Ok(Some(pool.utf8(index)?.to_owned())),
        }
    };
    let export = |export: &class_file::ModulePackage| -> Result<model::ModuleExport, Error> {
        Ok(model::ModuleExport {
            package: pool.package_name(export.package)?.to_owned(),
            access_flags: export.flags,
            modules: export
                .modules
                .iter()
                .map(|module| Ok(pool.module_name(*module)?.to_owned()))
                .collect::<Result<_, Error>>()?,
        })
    };
    let class_names = |classes: &[class_file::ClassConstantIndex]| -> Result<Vec<String>, Error> {
        classes
            .iter()
            .map(|class| Ok(pool.class_name(*class)?.to_owned()))
            .collect()
    };

    let main_class = match attributes.get::<ModuleMainClass>()? {
        None => None,
        Some(ModuleMainClass(class)) => Some(pool.class_name(class)?.to_owned()),
    };
    let packages = match attributes.get::<ModulePackages>()? {
        None => vec![],
        Some(ModulePackages(packages)) => packages
            .iter()
            .map(|package| Ok(pool.package_name(*package)?.to_owned()))
            .collect::<Result<_, Error>>()?,
    };

    Ok(model::Module {
        name: pool.module_name(module.name)?.to_owned(),
        access_flags: module.flags,
        version: utf8_opt(module.version)?,
        main_class,
        packages,
        requires: module
            .requires
            .iter()
            .map(|require| {
                Ok(model::ModuleRequire {
                    module: pool.module_name(require.module)?.to_owned(),
                    access_flags: require.flags,
                    version: utf8_opt(require.version)?,
                })
            })
            .collect::<Result<_, Error>>()?,
        exports: module.exports.iter().map(export).collect::<Result<_, _>>()?,
        opens: module.opens.iter().map(export).collect::<Result<_, _>>()?,
        uses: class_names(&module.uses)?,
        provides: module
            .provides
            .iter()
            .map(|provide| {
                Ok(model::ModuleProvide {
                    service: pool.class_name(provide.service)?.to_owned(),
                    providers: class_names(&provide.providers)?,
                })
            })
            .collect::<Result<_, Error>>()?,
    })
}

fn read_field(pool: &Pool, field: &class_file::Field) -> Result<model::Field, Error> {
    let attributes = Attributes::new(pool.constants, &field.attributes, FIELD_ATTRIBUTES)?;
    let descriptor = pool.utf8(field.descriptor_index)?;
    let value = match attributes.get::<ConstantValue>()? {
        None => None,
        Some(ConstantValue(index)) => match pool.loadable(index)? {
            value @ (Constant::Int(_)
            | Constant::Long(_)
            | Constant::Float(_)
            | Constant::Double(_)
            | Constant::String(_)) => Some(value),
            other => {
                let msg = format!("invalid constant value {:?}", other);
                return Err(Error::malformed(UNKNOWN_CLASS, msg));
            }
        },
    };
    let signature = match attributes.get::<Signature>()? {
        None => None,
        Some(Signature(signature)) => Some(pool.utf8(signature)?.to_owned()),
    };
    let (annotations, type_annotations) = all_annotations(pool, &attributes)?;
    Ok(model::Field {
        access_flags: field.access_flags,
        name: pool.utf8(field.name_index)?.to_owned(),
        descriptor: descriptor.to_owned(),
        signature,
        value,
        annotations,
        type_annotations,
        attributes: attributes.unknown,
    })
}

fn read_method<M: MethodVisitor>(
    pool: &Pool,
    method: &class_file::Method,
    mode: Mode,
    visitor: &mut M,
) -> Result<(), Error> {
    let attributes = Attributes::new(pool.constants, &method.attributes, METHOD_ATTRIBUTES)?;
    let descriptor = pool.utf8(method.descriptor_index)?;
    let arity = MethodDescriptor::parse(descriptor)
        .map_err(|err| {
            let msg = format!("invalid method descriptor '{}': {}", descriptor, err);
            Error::malformed(UNKNOWN_CLASS, msg)
        })?
        .parameters
        .len();

    if let Some(Signature(signature)) = attributes.get()? {
        visitor.visit_signature(pool.utf8(signature)?);
    }
    if let Some(Exceptions(exceptions)) = attributes.get()? {
        for exception in exceptions {
            visitor.visit_exception(pool.class_name(exception)?);
        }
    }

    let mut parameters = vec![Parameter::default(); arity];
    if let Some(MethodParameters(entries)) = attributes.get()? {
        if entries.len() != arity {
            log::warn!(
                "method parameters list {} entries for {} descriptor arguments",
                entries.len(),
                arity
            );
        }
        for (parameter, entry) in parameters.iter_mut().zip(entries) {
            parameter.access_flags = entry.access_flags;
            if let Some(name) = entry.name {
                parameter.name = Some(pool.utf8(name)?.to_owned());
            }
        }
    }
    let visible = attributes
        .get::<RuntimeVisibleParameterAnnotations>()?
        .map(|annots| (annots.0, true));
    let invisible = attributes
        .get::<RuntimeInvisibleParameterAnnotations>()?
        .map(|annots| (annots.0, false));
    for (per_parameter, visible) in visible.into_iter().chain(invisible) {
        if per_parameter.len() > arity {
            log::warn!(
                "dropping annotations on {} parameters not in the descriptor",
                per_parameter.len() - arity
            );
        }
        for (parameter, infos) in parameters.iter_mut().zip(per_parameter) {
            parameter.annotations.extend(annotations(pool, &infos, visible)?);
        }
    }
    parameters
        .into_iter()
        .for_each(|parameter| visitor.visit_parameter(parameter));

    let (annots, type_annots) = all_annotations(pool, &attributes)?;
    annots.into_iter().for_each(|a| visitor.visit_annotation(a));
    type_annots
        .into_iter()
        .for_each(|a| visitor.visit_type_annotation(a));

    if let Some(AnnotationDefault(value)) = attributes.get()? {
        visitor.visit_annotation_default(element_value(pool, &value, true)?);
    }

    if let Some(code) = attributes.get::<Code>()? {
        read_body(pool, &code, mode, visitor)?;
    }

    for raw in attributes.unknown {
        visitor.visit_attribute(raw);
    }
    Ok(())
}
