use crate::jvm::{MethodAccessFlags, MethodDescriptor, ParameterAccessFlags, ParseDescriptor};
use crate::model::{
    Annotation, AnnotationValue, Frame, Instruction, Label, RawAttribute, TypeAnnotation,
};

/// Method declared by a class or interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,

    /// One entry per argument in the descriptor
    pub parameters: Vec<Parameter>,

    /// Declared checked exceptions (internal names)
    pub exceptions: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub type_annotations: Vec<TypeAnnotation>,

    /// Default value of an annotation interface element
    pub annotation_default: Option<AnnotationValue>,

    /// Method body (empty when the method has no code)
    pub body: Vec<Entry>,
    pub attributes: Vec<RawAttribute>,
}

impl Method {
    /// Method without a body, with one unnamed parameter per descriptor argument
    ///
    /// A descriptor that doesn't parse yields no parameters (the encoder rejects it later).
    pub fn new(
        access_flags: MethodAccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Method {
        let descriptor = descriptor.into();
        let arity = MethodDescriptor::parse(&descriptor).map_or(0, |desc| desc.parameters.len());
        Method {
            access_flags,
            name: name.into(),
            descriptor,
            signature: None,
            parameters: vec![Parameter::default(); arity],
            exceptions: vec![],
            annotations: vec![],
            type_annotations: vec![],
            annotation_default: None,
            body: vec![],
            attributes: vec![],
        }
    }

    /// Does the method have a `Code` attribute?
    pub fn has_code(&self) -> bool {
        !self
            .access_flags
            .intersects(MethodAccessFlags::ABSTRACT | MethodAccessFlags::NATIVE)
    }

    /// Instructions of the body, skipping the other entries
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.body.iter().filter_map(|entry| match entry {
            Entry::Instruction(insn) => Some(insn),
            _ => None,
        })
    }
}

/// Formal parameter of a method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    pub name: Option<String>,
    pub access_flags: ParameterAccessFlags,
    pub annotations: Vec<Annotation>,
}

/// Element of a method body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Instruction(Instruction),

    /// Marks the position of the next instruction
    Label(Label),

    /// Source line of the instructions that follow
    Line(u16),

    /// Exception handler covering `start` (inclusive) to `end` (exclusive)
    TryCatch {
        start: Label,
        end: Label,
        handler: Label,

        /// Caught class (`None` catches everything, as used for `finally`)
        catch_type: Option<String>,
    },

    LocalVariable(LocalVariable),

    /// Stack map frame for the next instruction
    Frame(Frame),
}

/// Entry of the local variable table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub index: u16,
    pub name: String,
    pub descriptor: String,

    /// Generic signature, from the local variable type table
    pub signature: Option<String>,
    pub start: Label,
    pub end: Label,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_follow_descriptor() {
        let method = Method::new(MethodAccessFlags::STATIC, "max", "(JJ)J");
        assert_eq!(method.parameters.len(), 2);
        assert!(method.has_code());

        let method = Method::new(MethodAccessFlags::ABSTRACT, "run", "()V");
        assert!(method.parameters.is_empty());
        assert!(!method.has_code());
    }
}
