use crate::jvm::class_file::Version;
use crate::jvm::{ClassAccessFlags, FieldAccessFlags};
use crate::model::{
    Annotation, Constant, EnclosingMethod, InnerClass, Method, Module, RawAttribute,
    RecordComponent, TypeAnnotation,
};

/// Top-level unit of translation: one class and the package it lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Dotted package name (empty for the default package)
    pub package: String,
    pub class: Class,
}

impl Program {
    /// Program whose package is derived from the class name
    pub fn new(class: Class) -> Program {
        let package = match class.name.rfind('/') {
            Some(idx) => class.name[..idx].replace('/', "."),
            None => String::new(),
        };
        Program { package, class }
    }
}

/// Class, interface, enum, record, or module descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub version: Version,

    /// Internal name (eg. `java/lang/String`)
    pub name: String,
    pub access_flags: ClassAccessFlags,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub signature: Option<String>,
    pub source_file: Option<String>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub annotations: Vec<Annotation>,
    pub type_annotations: Vec<TypeAnnotation>,
    pub inner_classes: Vec<InnerClass>,
    pub enclosing_method: Option<EnclosingMethod>,
    pub nest_host: Option<String>,
    pub nest_members: Vec<String>,
    pub permitted_subclasses: Vec<String>,
    pub module: Option<Module>,

    /// Present exactly for record classes
    pub record_components: Option<Vec<RecordComponent>>,

    /// Unrecognized attributes, passed through untouched
    pub attributes: Vec<RawAttribute>,
}

impl Class {
    /// Empty public class
    pub fn new(name: impl Into<String>, super_class: Option<&str>) -> Class {
        Class {
            version: Version::JAVA8,
            name: name.into(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            super_class: super_class.map(String::from),
            interfaces: vec![],
            signature: None,
            source_file: None,
            fields: vec![],
            methods: vec![],
            annotations: vec![],
            type_annotations: vec![],
            inner_classes: vec![],
            enclosing_method: None,
            nest_host: None,
            nest_members: vec![],
            permitted_subclasses: vec![],
            module: None,
            record_components: None,
            attributes: vec![],
        }
    }
}

/// Field declared by a class or interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,

    /// Initial value of a static field (int, long, float, double, or string)
    pub value: Option<Constant>,
    pub annotations: Vec<Annotation>,
    pub type_annotations: Vec<TypeAnnotation>,
    pub attributes: Vec<RawAttribute>,
}

impl Field {
    pub fn new(
        access_flags: FieldAccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Field {
        Field {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            value: None,
            annotations: vec![],
            type_annotations: vec![],
            attributes: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_from_name() {
        let program = Program::new(Class::new("org/eolang/Foo", Some("java/lang/Object")));
        assert_eq!(program.package, "org.eolang");
        let program = Program::new(Class::new("Foo", Some("java/lang/Object")));
        assert_eq!(program.package, "");
    }
}
