use crate::decode::{ClassVisitor, MethodVisitor};
use crate::jvm::class_file::Version;
use crate::jvm::{ClassAccessFlags, MethodAccessFlags};
use crate::model::{
    Annotation, AnnotationValue, Class, EnclosingMethod, Entry, Field, Frame, InnerClass,
    Instruction, Label, LocalVariable, Method, Module, Parameter, RawAttribute, RecordComponent,
    TypeAnnotation,
};

/// Visitor accumulating a [`Class`]
pub struct ClassBuilder {
    class: Class,
}

impl ClassBuilder {
    pub fn new() -> ClassBuilder {
        ClassBuilder {
            class: Class::new(String::new(), None),
        }
    }

    pub fn finish(self) -> Class {
        self.class
    }
}

impl Default for ClassBuilder {
    fn default() -> ClassBuilder {
        ClassBuilder::new()
    }
}

impl ClassVisitor for ClassBuilder {
    type Method = MethodBuilder;

    fn visit_header(
        &mut self,
        version: Version,
        access_flags: ClassAccessFlags,
        name: &str,
        super_class: Option<&str>,
        interfaces: Vec<String>,
    ) {
        self.class.version = version;
        self.class.access_flags = access_flags;
        self.class.name = name.to_owned();
        self.class.super_class = super_class.map(String::from);
        self.class.interfaces = interfaces;
    }

    fn visit_signature(&mut self, signature: &str) {
        self.class.signature = Some(signature.to_owned());
    }

    fn visit_source(&mut self, source_file: &str) {
        self.class.source_file = Some(source_file.to_owned());
    }

    fn visit_annotation(&mut self, annotation: Annotation) {
        self.class.annotations.push(annotation);
    }

    fn visit_type_annotation(&mut self, annotation: TypeAnnotation) {
        self.class.type_annotations.push(annotation);
    }

    fn visit_inner_class(&mut self, inner_class: InnerClass) {
        self.class.inner_classes.push(inner_class);
    }

    fn visit_enclosing_method(&mut self, enclosing_method: EnclosingMethod) {
        self.class.enclosing_method = Some(enclosing_method);
    }

    fn visit_nest_host(&mut self, host: &str) {
        self.class.nest_host = Some(host.to_owned());
    }

    fn visit_nest_member(&mut self, member: &str) {
        self.class.nest_members.push(member.to_owned());
    }

    fn visit_permitted_subclass(&mut self, subclass: &str) {
        self.class.permitted_subclasses.push(subclass.to_owned());
    }

    fn visit_module(&mut self, module: Module) {
        self.class.module = Some(module);
    }

    fn visit_record(&mut self, components: Vec<RecordComponent>) {
        self.class.record_components = Some(components);
    }

    fn visit_attribute(&mut self, attribute: RawAttribute) {
        self.class.attributes.push(attribute);
    }

    fn visit_field(&mut self, field: Field) {
        self.class.fields.push(field);
    }

    fn visit_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
    ) -> MethodBuilder {
        let mut method = Method::new(access_flags, name, descriptor);
        method.parameters.clear();
        MethodBuilder { method }
    }

    fn visit_method_end(&mut self, method: MethodBuilder) {
        self.class.methods.push(method.method);
    }
}

/// Visitor accumulating a [`Method`]
pub struct MethodBuilder {
    method: Method,
}

impl MethodBuilder {
    pub fn finish(self) -> Method {
        self.method
    }
}

impl MethodVisitor for MethodBuilder {
    fn visit_signature(&mut self, signature: &str) {
        self.method.signature = Some(signature.to_owned());
    }

    fn visit_exception(&mut self, exception: &str) {
        self.method.exceptions.push(exception.to_owned());
    }

    fn visit_parameter(&mut self, parameter: Parameter) {
        self.method.parameters.push(parameter);
    }

    fn visit_annotation(&mut self, annotation: Annotation) {
        self.method.annotations.push(annotation);
    }

    fn visit_type_annotation(&mut self, annotation: TypeAnnotation) {
        self.method.type_annotations.push(annotation);
    }

    fn visit_annotation_default(&mut self, value: AnnotationValue) {
        self.method.annotation_default = Some(value);
    }

    fn visit_attribute(&mut self, attribute: RawAttribute) {
        self.method.attributes.push(attribute);
    }

    fn visit_try_catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&str>,
    ) {
        self.method.body.push(Entry::TryCatch {
            start,
            end,
            handler,
            catch_type: catch_type.map(String::from),
        });
    }

    fn visit_label(&mut self, label: Label) {
        self.method.body.push(Entry::Label(label));
    }

    fn visit_line(&mut self, line: u16) {
        self.method.body.push(Entry::Line(line));
    }

    fn visit_frame(&mut self, frame: Frame) {
        self.method.body.push(Entry::Frame(frame));
    }

    fn visit_instruction(&mut self, instruction: Instruction) {
        self.method.body.push(Entry::Instruction(instruction));
    }

    fn visit_local_variable(&mut self, variable: LocalVariable) {
        self.method.body.push(Entry::LocalVariable(variable));
    }
}
