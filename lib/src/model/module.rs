use crate::jvm::{InnerClassAccessFlags, ModuleAccessFlags};
use crate::model::{Annotation, TypeAnnotation};

/// Module descriptor of a `module-info` class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub access_flags: ModuleAccessFlags,
    pub version: Option<String>,
    pub main_class: Option<String>,
    pub packages: Vec<String>,
    pub requires: Vec<ModuleRequire>,
    pub exports: Vec<ModuleExport>,
    pub opens: Vec<ModuleExport>,
    pub uses: Vec<String>,
    pub provides: Vec<ModuleProvide>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Module {
        Module {
            name: name.into(),
            access_flags: ModuleAccessFlags::empty(),
            version: None,
            main_class: None,
            packages: vec![],
            requires: vec![],
            exports: vec![],
            opens: vec![],
            uses: vec![],
            provides: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequire {
    pub module: String,
    pub access_flags: ModuleAccessFlags,
    pub version: Option<String>,
}

/// Package exported or opened, optionally only to some modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleExport {
    pub package: String,
    pub access_flags: ModuleAccessFlags,
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProvide {
    pub service: String,
    pub providers: Vec<String>,
}

/// Component of a record class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordComponent {
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub annotations: Vec<Annotation>,
    pub type_annotations: Vec<TypeAnnotation>,
}

/// Entry of the `InnerClasses` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClass {
    pub name: String,
    pub outer_name: Option<String>,

    /// Simple name (`None` for anonymous classes)
    pub inner_name: Option<String>,
    pub access_flags: InnerClassAccessFlags,
}

/// Method (or initializer) enclosing a local or anonymous class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingMethod {
    pub owner: String,
    pub name: Option<String>,
    pub descriptor: Option<String>,
}

/// Attribute kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name: String,
    pub data: Vec<u8>,
}
