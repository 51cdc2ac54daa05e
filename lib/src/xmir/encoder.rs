use crate::jvm::opcodes;
use crate::model::{
    Annotation, AnnotationValue, Class, Constant, Entry, Field, Frame, Handle, Instruction,
    LocalVariable, Method, Module, ModuleExport, Program, RawAttribute, RecordComponent,
    TypeAnnotation, VerificationType,
};
use crate::xmir::hex::Data;
use crate::xmir::listing::{describe, Listing};
use crate::xmir::names::{method_name, numbered, prefix, signature};
use crate::xmir::xml::Element;
use crate::xmir::CodecError;
use std::collections::HashMap;

/// Documentation to add on top of the IR proper
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Put a comment describing every instruction before its node
    pub comments: bool,
    pub listing: Listing,
}

/// Build the IR document tree of a program
pub fn encode(program: &Program, options: &Options) -> Result<Element, CodecError> {
    let class = &program.class;
    let simple_name = class.name.rsplit('/').next().unwrap_or(&class.name);
    let mut element = Element::new("program")
        .with_attribute("name", simple_name)
        .with_attribute("package", program.package.as_str());
    if let Some(listing) = options.listing.render(class) {
        let mut listing_element = Element::new("listing");
        listing_element.push_text(listing);
        element.push(listing_element);
    }
    element.push(Encoder { options }.class(class)?);
    Ok(Element::new("xmir").with_child(element))
}

struct Encoder<'a> {
    options: &'a Options,
}

fn object(kind: &str, name: Option<&str>) -> Element {
    let element = Element::new("o").with_attribute("base", kind);
    match name {
        Some(name) => element.with_attribute("name", name),
        None => element,
    }
}

fn leaf(name: Option<&str>, value: Data) -> Element {
    let mut element = object(value.base(), name).with_attribute("data", "bytes");
    let hex = value.to_hex();
    if !hex.is_empty() {
        element.push_text(hex);
    }
    element
}

fn int(name: &str, value: i32) -> Element {
    leaf(Some(name), Data::Int(value))
}

fn string(name: &str, value: &str) -> Element {
    leaf(Some(name), Data::String(value.to_owned()))
}

fn seq(name: &str, items: impl IntoIterator<Item = Element>) -> Element {
    let mut element = object("seq", Some(name));
    for item in items {
        element.push(item);
    }
    element
}

fn push_opt(element: &mut Element, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        element.push(string(name, value));
    }
}

fn class_names<'s>(names: impl IntoIterator<Item = &'s String>) -> Vec<Element> {
    names
        .into_iter()
        .map(|name| leaf(None, Data::Class(name.clone())))
        .collect()
}

fn strings<'s>(values: impl IntoIterator<Item = &'s String>) -> Vec<Element> {
    values
        .into_iter()
        .map(|value| leaf(None, Data::String(value.clone())))
        .collect()
}

fn label(name: Option<&str>, label: crate::model::Label) -> Element {
    leaf(name, Data::Label(label.to_string()))
}

impl<'a> Encoder<'a> {
    fn class(&self, class: &Class) -> Result<Element, CodecError> {
        let mut element = object("class", Some(&prefix(&class.name)?));
        element.push(int("major", class.version.major_version as i32));
        element.push(int("minor", class.version.minor_version as i32));
        element.push(int("access", class.access_flags.bits() as i32));
        element.push(string("name", &class.name));
        if let Some(super_class) = &class.super_class {
            element.push(leaf(Some("super"), Data::Class(super_class.clone())));
        }
        element.push(seq("interfaces", class_names(&class.interfaces)));
        push_opt(&mut element, "signature", &class.signature);
        push_opt(&mut element, "source", &class.source_file);

        let mut seen: HashMap<&str, i64> = HashMap::new();
        for field in &class.fields {
            let count = seen.entry(field.name.as_str()).or_insert(0);
            *count += 1;
            element.push(self.field(field, *count)?);
        }
        for method in &class.methods {
            element.push(self.method(method)?);
        }

        element.push(annotations(&class.annotations));
        element.push(type_annotations(&class.type_annotations));
        element.push(seq(
            "inner-classes",
            class.inner_classes.iter().map(|inner| {
                let mut element = object("inner-class", None);
                element.push(string("name", &inner.name));
                push_opt(&mut element, "outer", &inner.outer_name);
                push_opt(&mut element, "inner", &inner.inner_name);
                element.push(int("access", inner.access_flags.bits() as i32));
                element
            }),
        ));
        if let Some(enclosing) = &class.enclosing_method {
            let mut enclosing_element = object("enclosing-method", Some("enclosing"));
            enclosing_element.push(string("owner", &enclosing.owner));
            push_opt(&mut enclosing_element, "name", &enclosing.name);
            push_opt(&mut enclosing_element, "descriptor", &enclosing.descriptor);
            element.push(enclosing_element);
        }
        if let Some(host) = &class.nest_host {
            element.push(leaf(Some("nest-host"), Data::Class(host.clone())));
        }
        element.push(seq("nest-members", class_names(&class.nest_members)));
        element.push(seq("permitted", class_names(&class.permitted_subclasses)));
        if let Some(module) = &class.module {
            element.push(module_element(module));
        }
        if let Some(components) = &class.record_components {
            element.push(seq("record", components.iter().map(record_component)));
        }
        element.push(attributes(&class.attributes));
        Ok(element)
    }

    fn field(&self, field: &Field, number: i64) -> Result<Element, CodecError> {
        let mut element = object("field", Some(&prefix(&numbered(&field.name, number)?)?));
        element.push(string("name", &field.name));
        element.push(int("access", field.access_flags.bits() as i32));
        element.push(string("descriptor", &field.descriptor));
        push_opt(&mut element, "signature", &field.signature);
        if let Some(value) = &field.value {
            element.push(constant(Some("value"), value));
        }
        element.push(annotations(&field.annotations));
        element.push(type_annotations(&field.type_annotations));
        element.push(attributes(&field.attributes));
        Ok(element)
    }

    fn method(&self, method: &Method) -> Result<Element, CodecError> {
        let name = signature(method_name(&method.name), &method.descriptor);
        let mut element = object("method", Some(&prefix(&name)?));
        element.push(int("access", method.access_flags.bits() as i32));
        push_opt(&mut element, "signature", &method.signature);
        element.push(seq("exceptions", class_names(&method.exceptions)));

        let mut params = Vec::with_capacity(method.parameters.len());
        for (i, parameter) in method.parameters.iter().enumerate() {
            let mut param = object("param", Some(&numbered("param", i as i64 + 1)?));
            push_opt(&mut param, "name", &parameter.name);
            param.push(int("access", parameter.access_flags.bits() as i32));
            param.push(annotations(&parameter.annotations));
            params.push(param);
        }
        element.push(seq("params", params));

        element.push(annotations(&method.annotations));
        element.push(type_annotations(&method.type_annotations));
        if let Some(default) = &method.annotation_default {
            element.push(value(Some("default"), default));
        }

        let mut body = object("seq", Some("body"));
        for entry in &method.body {
            if let (true, Entry::Instruction(insn)) = (self.options.comments, entry) {
                body.push_comment(format!("#{}:{}", insn.opcode(), describe(insn)));
            }
            body.push(self.entry(entry));
        }
        element.push(body);
        element.push(attributes(&method.attributes));
        Ok(element)
    }

    fn entry(&self, entry: &Entry) -> Element {
        match entry {
            Entry::Instruction(insn) => instruction(insn),
            Entry::Label(l) => label(None, *l),
            Entry::Line(line) => object("line", None).with_attribute("line", line.to_string()),
            Entry::TryCatch {
                start,
                end,
                handler,
                catch_type,
            } => {
                let mut element = object("try-catch", None);
                element.push(label(Some("start"), *start));
                element.push(label(Some("end"), *end));
                element.push(label(Some("handler"), *handler));
                if let Some(catch_type) = catch_type {
                    element.push(leaf(Some("type"), Data::Class(catch_type.clone())));
                }
                element
            }
            Entry::LocalVariable(var) => local_variable(var),
            Entry::Frame(frame) => frame_element(frame),
        }
    }
}

fn instruction(insn: &Instruction) -> Element {
    let opcode = insn.opcode();
    let mnemonic = opcodes::mnemonic(opcode).unwrap_or("unknown");
    let mut element = object("opcode", Some(&format!("{}-{}", mnemonic, opcode)));
    let operands: Vec<Element> = match insn {
        Instruction::Simple(_) => vec![],
        Instruction::Int { operand, .. } => vec![leaf(None, Data::Int(*operand))],
        Instruction::Var { index, .. } => vec![leaf(None, Data::Int(*index as i32))],
        Instruction::IInc { index, increment } => vec![
            leaf(None, Data::Int(*index as i32)),
            leaf(None, Data::Int(*increment as i32)),
        ],
        Instruction::Type { class, .. } => vec![leaf(None, Data::Class(class.clone()))],
        Instruction::Field {
            owner,
            name,
            descriptor,
            ..
        } => vec![
            leaf(None, Data::String(owner.clone())),
            leaf(None, Data::String(name.clone())),
            leaf(None, Data::String(descriptor.clone())),
        ],
        Instruction::Method {
            owner,
            name,
            descriptor,
            interface,
            ..
        } => vec![
            leaf(None, Data::String(owner.clone())),
            leaf(None, Data::String(name.clone())),
            leaf(None, Data::String(descriptor.clone())),
            leaf(None, Data::Bool(*interface)),
        ],
        Instruction::InvokeDynamic {
            name,
            descriptor,
            bootstrap,
            arguments,
        } => vec![
            leaf(None, Data::String(name.clone())),
            leaf(None, Data::String(descriptor.clone())),
            handle(None, bootstrap),
            seq("arguments", arguments.iter().map(|arg| constant(None, arg))),
        ],
        Instruction::Jump { target, .. } => vec![label(None, *target)],
        Instruction::Ldc(value) => vec![constant(None, value)],
        Instruction::TableSwitch {
            min,
            max,
            default,
            targets,
        } => vec![
            leaf(None, Data::Int(*min)),
            leaf(None, Data::Int(*max)),
            label(None, *default),
            seq("targets", targets.iter().map(|target| label(None, *target))),
        ],
        Instruction::LookupSwitch {
            default,
            keys,
            targets,
        } => vec![
            label(None, *default),
            seq("keys", keys.iter().map(|key| leaf(None, Data::Int(*key)))),
            seq("targets", targets.iter().map(|target| label(None, *target))),
        ],
        Instruction::MultiANewArray {
            descriptor,
            dimensions,
        } => vec![
            leaf(None, Data::Class(descriptor.clone())),
            leaf(None, Data::Int(*dimensions as i32)),
        ],
    };
    for operand in operands {
        element.push(operand);
    }
    element
}

fn local_variable(var: &LocalVariable) -> Element {
    let mut element = object("local-variable", None);
    element.push(int("index", var.index as i32));
    element.push(string("name", &var.name));
    element.push(string("descriptor", &var.descriptor));
    push_opt(&mut element, "signature", &var.signature);
    element.push(label(Some("start"), var.start));
    element.push(label(Some("end"), var.end));
    element
}

fn frame_element(frame: &Frame) -> Element {
    let vtypes = |name: &str, types: &[VerificationType]| seq(name, types.iter().map(vtype));
    let mut element = object("frame", None);
    match frame {
        Frame::Same => element.push(string("type", "same")),
        Frame::SameLocals1StackItem(typ) => {
            element.push(string("type", "same1"));
            element.push(vtypes("stack", std::slice::from_ref(typ)));
        }
        Frame::Chop(k) => {
            element.push(string("type", "chop"));
            element.push(int("chop", *k as i32));
        }
        Frame::Append(locals) => {
            element.push(string("type", "append"));
            element.push(vtypes("locals", locals));
        }
        Frame::Full { locals, stack } => {
            element.push(string("type", "full"));
            element.push(vtypes("locals", locals));
            element.push(vtypes("stack", stack));
        }
    }
    element
}

fn vtype(typ: &VerificationType) -> Element {
    let mut element = object("vtype", None);
    let kind = match typ {
        VerificationType::Top => "top",
        VerificationType::Integer => "int",
        VerificationType::Float => "float",
        VerificationType::Double => "double",
        VerificationType::Long => "long",
        VerificationType::Null => "null",
        VerificationType::UninitializedThis => "uninitialized-this",
        VerificationType::Object(_) => "object",
        VerificationType::Uninitialized(_) => "uninitialized",
    };
    element.push(string("kind", kind));
    match typ {
        VerificationType::Object(class) => {
            element.push(leaf(Some("value"), Data::Class(class.clone())))
        }
        VerificationType::Uninitialized(l) => element.push(label(Some("value"), *l)),
        _ => (),
    }
    element
}

fn constant(name: Option<&str>, value: &Constant) -> Element {
    match value {
        Constant::Int(i) => leaf(name, Data::Int(*i)),
        Constant::Long(l) => leaf(name, Data::Long(*l)),
        Constant::Float(f) => leaf(name, Data::Float(*f)),
        Constant::Double(d) => leaf(name, Data::Double(*d)),
        Constant::String(s) => leaf(name, Data::String(s.clone())),
        Constant::Class(class) => leaf(name, Data::Class(class.clone())),
        Constant::MethodType(descriptor) => {
            object("method-type", name).with_child(string("descriptor", descriptor))
        }
        Constant::MethodHandle(h) => handle(name, h),
        Constant::Dynamic(dynamic) => {
            let mut element = object("dynamic", name);
            element.push(string("name", &dynamic.name));
            element.push(string("descriptor", &dynamic.descriptor));
            element.push(handle(Some("bootstrap"), &dynamic.bootstrap));
            element.push(seq(
                "arguments",
                dynamic.arguments.iter().map(|arg| constant(None, arg)),
            ));
            element
        }
    }
}

fn handle(name: Option<&str>, handle: &Handle) -> Element {
    let mut element = object("handle", name);
    element.push(int("tag", handle.kind.tag() as i32));
    element.push(string("owner", &handle.owner));
    element.push(string("name", &handle.name));
    element.push(string("descriptor", &handle.descriptor));
    element.push(leaf(Some("interface"), Data::Bool(handle.interface)));
    element
}

fn annotations(annotations: &[Annotation]) -> Element {
    let mut element = object("annotations", Some("annotations"));
    for a in annotations {
        element.push(annotation(None, a));
    }
    element
}

fn annotation_body(element: &mut Element, annotation: &Annotation) {
    element.push(string("descriptor", &annotation.descriptor));
    element.push(leaf(Some("visible"), Data::Bool(annotation.visible)));
    element.push(seq(
        "values",
        annotation.values.iter().map(|(key, v)| {
            object("property", None)
                .with_child(string("key", key))
                .with_child(value(Some("value"), v))
        }),
    ));
}

fn annotation(name: Option<&str>, annotation: &Annotation) -> Element {
    let mut element = object("annotation", name);
    annotation_body(&mut element, annotation);
    element
}

fn type_annotations(annotations: &[TypeAnnotation]) -> Element {
    let mut element = object("type-annotations", Some("type-annotations"));
    for a in annotations {
        let mut type_annotation = object("type-annotation", None);
        type_annotation.push(int("ref", a.type_ref as i32));
        if !a.type_path.is_empty() {
            type_annotation.push(string("path", &a.type_path));
        }
        annotation_body(&mut type_annotation, &a.annotation);
        element.push(type_annotation);
    }
    element
}

fn value(name: Option<&str>, value: &AnnotationValue) -> Element {
    match value {
        AnnotationValue::Byte(b) => leaf(name, Data::Byte(*b)),
        AnnotationValue::Char(c) => leaf(name, Data::Char(*c)),
        AnnotationValue::Double(d) => leaf(name, Data::Double(*d)),
        AnnotationValue::Float(f) => leaf(name, Data::Float(*f)),
        AnnotationValue::Int(i) => leaf(name, Data::Int(*i)),
        AnnotationValue::Long(l) => leaf(name, Data::Long(*l)),
        AnnotationValue::Short(s) => leaf(name, Data::Short(*s)),
        AnnotationValue::Boolean(b) => leaf(name, Data::Bool(*b)),
        AnnotationValue::String(s) => leaf(name, Data::String(s.clone())),
        AnnotationValue::Class(class) => leaf(name, Data::Class(class.clone())),
        AnnotationValue::Enum { descriptor, value } => object("enum", name)
            .with_child(string("descriptor", descriptor))
            .with_child(string("value", value)),
        AnnotationValue::Annotation(nested) => annotation(name, nested),
        AnnotationValue::Array(values) => {
            let mut element = object("array", name);
            for v in values {
                element.push(self::value(None, v));
            }
            element
        }
    }
}

fn module_element(module: &Module) -> Element {
    let exports = |kind: &'static str, exports: &[ModuleExport]| -> Vec<Element> {
        exports
            .iter()
            .map(|export| {
                let mut element = object(kind, None);
                element.push(string("package", &export.package));
                element.push(int("access", export.access_flags.bits() as i32));
                element.push(seq("modules", strings(&export.modules)));
                element
            })
            .collect()
    };

    let mut element = object("module", Some("module"));
    element.push(string("name", &module.name));
    element.push(int("access", module.access_flags.bits() as i32));
    push_opt(&mut element, "version", &module.version);
    push_opt(&mut element, "main", &module.main_class);
    element.push(seq("packages", strings(&module.packages)));
    element.push(seq(
        "requires",
        module.requires.iter().map(|require| {
            let mut element = object("module-require", None);
            element.push(string("module", &require.module));
            element.push(int("access", require.access_flags.bits() as i32));
            push_opt(&mut element, "version", &require.version);
            element
        }),
    ));
    element.push(seq("exports", exports("module-export", &module.exports)));
    element.push(seq("opens", exports("module-open", &module.opens)));
    element.push(seq("uses", strings(&module.uses)));
    element.push(seq(
        "provides",
        module.provides.iter().map(|provide| {
            object("module-provide", None)
                .with_child(string("service", &provide.service))
                .with_child(seq("providers", strings(&provide.providers)))
        }),
    ));
    element
}

fn record_component(component: &RecordComponent) -> Element {
    let mut element = object("record-component", None);
    element.push(string("name", &component.name));
    element.push(string("descriptor", &component.descriptor));
    push_opt(&mut element, "signature", &component.signature);
    element.push(annotations(&component.annotations));
    element.push(type_annotations(&component.type_annotations));
    element
}

fn attributes(attributes: &[RawAttribute]) -> Element {
    seq(
        "attributes",
        attributes.iter().map(|attribute| {
            object("attribute", None)
                .with_child(string("name", &attribute.name))
                .with_child(leaf(Some("data"), Data::Bytes(attribute.data.clone())))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::opcodes::*;
    use crate::jvm::{FieldAccessFlags, MethodAccessFlags};
    use crate::model::Label;
    use crate::xmir::xml::{Element, Node};

    fn find<'e>(element: &'e Element, name: &str) -> &'e Element {
        element
            .elements()
            .find(|e| e.attribute("name") == Some(name))
            .unwrap_or_else(|| panic!("no child {}", name))
    }

    fn program() -> Program {
        let mut class = Class::new("org/eolang/Foo", Some("java/lang/Object"));
        class
            .fields
            .push(Field::new(FieldAccessFlags::PRIVATE, "x", "I"));
        let mut method = Method::new(MethodAccessFlags::PUBLIC, "<init>", "(I)V");
        method.body = vec![
            Entry::Label(Label(0)),
            Entry::Line(7),
            Entry::Instruction(Instruction::Var {
                opcode: ALOAD,
                index: 0,
            }),
            Entry::Instruction(Instruction::Method {
                opcode: INVOKESPECIAL,
                owner: "java/lang/Object".into(),
                name: "<init>".into(),
                descriptor: "()V".into(),
                interface: false,
            }),
            Entry::Instruction(Instruction::Simple(RETURN)),
        ];
        class.methods.push(method);
        Program::new(class)
    }

    #[test]
    fn document_layout() {
        let root = encode(&program(), &Options::default()).unwrap();
        assert_eq!(root.name, "xmir");
        let program = root.elements().next().unwrap();
        assert_eq!(program.attribute("name"), Some("Foo"));
        assert_eq!(program.attribute("package"), Some("org.eolang"));

        let class = program.elements().next().unwrap();
        assert_eq!(class.attribute("base"), Some("class"));
        assert_eq!(class.attribute("name"), Some("j$org/j$eolang/j$Foo"));
        assert_eq!(find(class, "major").text(), "00 00 00 00 00 00 00 34");

        let field = find(class, "j$x");
        assert_eq!(field.attribute("base"), Some("field"));
        let method = find(class, "j$object@init@-%28I%29V");
        let params: Vec<&Element> = find(method, "params").elements().collect();
        assert_eq!(params[0].attribute("name"), Some("param"));

        let body: Vec<&Element> = find(method, "body").elements().collect();
        assert_eq!(body[0].attribute("base"), Some("label"));
        assert_eq!(body[0].text(), "4C 30");
        assert_eq!(body[1].attribute("line"), Some("7"));
        assert_eq!(body[3].attribute("name"), Some("invokespecial-183"));
        assert_eq!(body[3].elements().count(), 4);
    }

    #[test]
    fn comments_and_listing() {
        let options = Options {
            comments: true,
            listing: Listing::Summary,
        };
        let root = encode(&program(), &options).unwrap();
        let program = root.elements().next().unwrap();
        let listing = program.elements().next().unwrap();
        assert_eq!(listing.name, "listing");
        assert!(listing.text().starts_with("class org/eolang/Foo"));

        let class = program.elements().nth(1).unwrap();
        let body = find(find(class, "j$object@init@-%28I%29V"), "body");
        let comments: Vec<&str> = body
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Comment(c) => Some(c.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            comments[1],
            "#183:invokespecial(java/lang/Object, <init>, ()V)"
        );
    }

    #[test]
    fn repeated_field_names_are_numbered() {
        let mut program = program();
        program
            .class
            .fields
            .push(Field::new(FieldAccessFlags::PRIVATE, "x", "J"));
        let root = encode(&program, &Options::default()).unwrap();
        let class = root.elements().next().unwrap().elements().next().unwrap();
        find(class, "j$x");
        find(class, "j$x-2");
    }
}
