use crate::jvm::class_file::Version;
use crate::jvm::{ClassAccessFlags, MethodAccessFlags};
use crate::model::{
    Annotation, AnnotationValue, EnclosingMethod, Field, Frame, InnerClass, Instruction, Label,
    LocalVariable, Module, Parameter, RawAttribute, RecordComponent, TypeAnnotation,
};

/// Callbacks fired while walking a class file
///
/// Callbacks fire in a fixed order: the header, then class-level metadata, then fields, then
/// methods. Every callback has an empty default so visitors only implement what they care about.
#[allow(unused_variables)]
pub trait ClassVisitor {
    /// Visitor for the contents of one method
    type Method: MethodVisitor;

    fn visit_header(
        &mut self,
        version: Version,
        access_flags: ClassAccessFlags,
        name: &str,
        super_class: Option<&str>,
        interfaces: Vec<String>,
    ) {
    }

    fn visit_signature(&mut self, signature: &str) {}

    fn visit_source(&mut self, source_file: &str) {}

    fn visit_annotation(&mut self, annotation: Annotation) {}

    fn visit_type_annotation(&mut self, annotation: TypeAnnotation) {}

    fn visit_inner_class(&mut self, inner_class: InnerClass) {}

    fn visit_enclosing_method(&mut self, enclosing_method: EnclosingMethod) {}

    fn visit_nest_host(&mut self, host: &str) {}

    fn visit_nest_member(&mut self, member: &str) {}

    fn visit_permitted_subclass(&mut self, subclass: &str) {}

    fn visit_module(&mut self, module: Module) {}

    /// Only fires for record classes (possibly with no components)
    fn visit_record(&mut self, components: Vec<RecordComponent>) {}

    /// Unrecognized class attribute
    fn visit_attribute(&mut self, attribute: RawAttribute) {}

    fn visit_field(&mut self, field: Field) {}

    /// Start visiting a method
    ///
    /// The returned visitor gets handed back in `visit_method_end` once the method is done.
    fn visit_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
    ) -> Self::Method;

    fn visit_method_end(&mut self, method: Self::Method) {}
}

/// Callbacks fired while walking one method
///
/// Metadata comes first, then the body. In the body, all try-catch blocks come first, then the
/// instruction stream (labels, line numbers, and frames preceding the instruction they apply to),
/// then the local variables.
#[allow(unused_variables)]
pub trait MethodVisitor {
    fn visit_signature(&mut self, signature: &str) {}

    fn visit_exception(&mut self, exception: &str) {}

    /// Fires once per descriptor argument, in order
    fn visit_parameter(&mut self, parameter: Parameter) {}

    fn visit_annotation(&mut self, annotation: Annotation) {}

    fn visit_type_annotation(&mut self, annotation: TypeAnnotation) {}

    fn visit_annotation_default(&mut self, value: AnnotationValue) {}

    /// Unrecognized method attribute
    fn visit_attribute(&mut self, attribute: RawAttribute) {}

    fn visit_try_catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&str>,
    ) {
    }

    fn visit_label(&mut self, label: Label) {}

    fn visit_line(&mut self, line: u16) {}

    fn visit_frame(&mut self, frame: Frame) {}

    fn visit_instruction(&mut self, instruction: Instruction) {}

    fn visit_local_variable(&mut self, variable: LocalVariable) {}
}
