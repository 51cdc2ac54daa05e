use crate::jvm::class_file::{HandleKind, Version};
use crate::jvm::opcodes::{self, Family};
use crate::jvm::{
    ClassAccessFlags, FieldAccessFlags, InnerClassAccessFlags, MethodAccessFlags,
    ModuleAccessFlags, ParameterAccessFlags,
};
use crate::model::{
    Annotation, AnnotationValue, Class, Constant, DynamicConstant, EnclosingMethod, Entry, Field,
    Frame, Handle, InnerClass, Instruction, Label, Labels, LocalVariable, Method, Module,
    ModuleExport, ModuleProvide, ModuleRequire, Parameter, Program, RawAttribute, RecordComponent,
    TypeAnnotation, VerificationType,
};
use crate::xmir::hex::Data;
use crate::xmir::names::{java_method_name, split_signature, unprefix};
use crate::xmir::schema::{kind, validate, violation};
use crate::xmir::xml::Element;
use crate::xmir::Error;

/// Rebuild a program from an IR document tree
///
/// The tree is validated first. Comments and the listing are ignored.
pub fn decode(root: &Element) -> Result<Program, Error> {
    validate(root)?;
    let program = root
        .elements()
        .find(|e| e.name == "program")
        .ok_or_else(|| violation(root, "missing <program>"))?;
    let class_element = program
        .elements()
        .find(|e| e.name == "o")
        .ok_or_else(|| violation(program, "missing class"))?;
    let class = class(class_element)?;
    Ok(match program.attribute("package") {
        Some(package) => Program {
            package: package.to_owned(),
            class,
        },
        None => Program::new(class),
    })
}

fn child<'e>(element: &'e Element, name: &str) -> Option<&'e Element> {
    element
        .elements()
        .find(|child| child.attribute("name") == Some(name))
}

fn required<'e>(element: &'e Element, name: &str) -> Result<&'e Element, Error> {
    child(element, name).ok_or_else(|| violation(element, format!("missing child '{}'", name)))
}

fn items(element: &Element) -> Vec<&Element> {
    element.elements().collect()
}

fn data(element: &Element) -> Result<Data, Error> {
    let kind = kind(element)?;
    Data::from_hex(kind, &element.text())
        .map_err(|err| violation(element, format!("invalid {} data: {}", kind, err)))
}

fn mismatch(element: &Element, expected: &str, found: &Data) -> Error {
    violation(
        element,
        format!("expected {}, found {}", expected, found.base()),
    )
}

fn as_int(element: &Element) -> Result<i32, Error> {
    match data(element)? {
        Data::Int(i) => Ok(i),
        other => Err(mismatch(element, "int", &other)),
    }
}

fn as_bool(element: &Element) -> Result<bool, Error> {
    match data(element)? {
        Data::Bool(b) => Ok(b),
        other => Err(mismatch(element, "bool", &other)),
    }
}

fn as_string(element: &Element) -> Result<String, Error> {
    match data(element)? {
        Data::String(s) => Ok(s),
        other => Err(mismatch(element, "string", &other)),
    }
}

fn as_class(element: &Element) -> Result<String, Error> {
    match data(element)? {
        Data::Class(s) => Ok(s),
        other => Err(mismatch(element, "class", &other)),
    }
}

fn narrow<T: TryFrom<i32>>(element: &Element, value: i32, what: &str) -> Result<T, Error> {
    T::try_from(value)
        .map_err(|_| violation(element, format!("{} {} is out of range", what, value)))
}

fn u16_of(element: &Element, name: &str) -> Result<u16, Error> {
    let child = required(element, name)?;
    narrow(child, as_int(child)?, name)
}

fn string_of(element: &Element, name: &str) -> Result<String, Error> {
    as_string(required(element, name)?)
}

fn opt_string(element: &Element, name: &str) -> Result<Option<String>, Error> {
    child(element, name).map(as_string).transpose()
}

fn bool_of(element: &Element, name: &str) -> Result<bool, Error> {
    as_bool(required(element, name)?)
}

fn classes_of(element: &Element, name: &str) -> Result<Vec<String>, Error> {
    match child(element, name) {
        None => Ok(vec![]),
        Some(seq) => seq.elements().map(as_class).collect(),
    }
}

fn strings_of(element: &Element, name: &str) -> Result<Vec<String>, Error> {
    match child(element, name) {
        None => Ok(vec![]),
        Some(seq) => seq.elements().map(as_string).collect(),
    }
}

fn class(element: &Element) -> Result<Class, Error> {
    let mut class = Class::new(string_of(element, "name")?, None);
    class.version = Version::new(u16_of(element, "major")?, u16_of(element, "minor")?);
    class.access_flags = ClassAccessFlags::from_bits_retain(u16_of(element, "access")?);
    class.super_class = child(element, "super").map(as_class).transpose()?;
    class.interfaces = classes_of(element, "interfaces")?;
    class.signature = opt_string(element, "signature")?;
    class.source_file = opt_string(element, "source")?;

    for member in element.elements() {
        match member.attribute("base") {
            Some("field") => class.fields.push(field(member)?),
            Some("method") => class.methods.push(method(member)?),
            _ => (),
        }
    }

    class.annotations = annotations(required(element, "annotations")?)?;
    class.type_annotations = type_annotations(required(element, "type-annotations")?)?;
    class.inner_classes = required(element, "inner-classes")?
        .elements()
        .map(|inner| {
            Ok(InnerClass {
                name: string_of(inner, "name")?,
                outer_name: opt_string(inner, "outer")?,
                inner_name: opt_string(inner, "inner")?,
                access_flags: InnerClassAccessFlags::from_bits_retain(u16_of(inner, "access")?),
            })
        })
        .collect::<Result<_, Error>>()?;
    if let Some(enclosing) = child(element, "enclosing") {
        class.enclosing_method = Some(EnclosingMethod {
            owner: string_of(enclosing, "owner")?,
            name: opt_string(enclosing, "name")?,
            descriptor: opt_string(enclosing, "descriptor")?,
        });
    }
    class.nest_host = child(element, "nest-host").map(as_class).transpose()?;
    class.nest_members = classes_of(element, "nest-members")?;
    class.permitted_subclasses = classes_of(element, "permitted")?;
    class.module = child(element, "module").map(module).transpose()?;
    class.record_components = match child(element, "record") {
        None => None,
        Some(record) => Some(
            record
                .elements()
                .map(record_component)
                .collect::<Result<_, _>>()?,
        ),
    };
    class.attributes = attributes(element)?;
    Ok(class)
}

fn field(element: &Element) -> Result<Field, Error> {
    let mut field = Field::new(
        FieldAccessFlags::from_bits_retain(u16_of(element, "access")?),
        string_of(element, "name")?,
        string_of(element, "descriptor")?,
    );
    field.signature = opt_string(element, "signature")?;
    field.value = child(element, "value").map(constant).transpose()?;
    field.annotations = annotations(required(element, "annotations")?)?;
    field.type_annotations = type_annotations(required(element, "type-annotations")?)?;
    field.attributes = attributes(element)?;
    Ok(field)
}

fn method(element: &Element) -> Result<Method, Error> {
    let encoded = element
        .attribute("name")
        .ok_or_else(|| violation(element, "method has no name"))?;
    let (name, descriptor) = split_signature(&unprefix(encoded))
        .map_err(|err| violation(element, err.to_string()))?;

    let mut method = Method::new(
        MethodAccessFlags::from_bits_retain(u16_of(element, "access")?),
        java_method_name(&name),
        descriptor,
    );
    method.signature = opt_string(element, "signature")?;
    method.exceptions = classes_of(element, "exceptions")?;
    method.parameters = required(element, "params")?
        .elements()
        .map(|param| {
            Ok(Parameter {
                name: opt_string(param, "name")?,
                access_flags: ParameterAccessFlags::from_bits_retain(u16_of(param, "access")?),
                annotations: annotations(required(param, "annotations")?)?,
            })
        })
        .collect::<Result<_, Error>>()?;
    method.annotations = annotations(required(element, "annotations")?)?;
    method.type_annotations = type_annotations(required(element, "type-annotations")?)?;
    method.annotation_default = child(element, "default").map(value).transpose()?;
    method.body = body(required(element, "body")?)?;
    method.attributes = attributes(element)?;
    Ok(method)
}

/// Per-method label identity, keyed by label name
struct LabelNames(Labels<String>);

impl LabelNames {
    fn get(&mut self, element: &Element) -> Result<Label, Error> {
        match data(element)? {
            Data::Label(name) if !name.is_empty() => Ok(self.0.label(name)),
            Data::Label(_) => Err(violation(element, "label without a name")),
            other => Err(mismatch(element, "label", &other)),
        }
    }

    fn named(&mut self, element: &Element, name: &str) -> Result<Label, Error> {
        self.get(required(element, name)?)
    }
}

fn body(element: &Element) -> Result<Vec<Entry>, Error> {
    let mut labels = LabelNames(Labels::new());
    let mut entries = vec![];
    for entry in element.elements() {
        let decoded = match kind(entry)? {
            "opcode" => Entry::Instruction(instruction(entry, &mut labels)?),
            "label" => Entry::Label(labels.get(entry)?),
            "line" => {
                let line = entry.attribute("line").unwrap_or_default();
                let line = line
                    .parse::<u16>()
                    .map_err(|_| violation(entry, format!("invalid line number '{}'", line)))?;
                Entry::Line(line)
            }
            "try-catch" => Entry::TryCatch {
                start: labels.named(entry, "start")?,
                end: labels.named(entry, "end")?,
                handler: labels.named(entry, "handler")?,
                catch_type: child(entry, "type").map(as_class).transpose()?,
            },
            "local-variable" => Entry::LocalVariable(LocalVariable {
                index: u16_of(entry, "index")?,
                name: string_of(entry, "name")?,
                descriptor: string_of(entry, "descriptor")?,
                signature: opt_string(entry, "signature")?,
                start: labels.named(entry, "start")?,
                end: labels.named(entry, "end")?,
            }),
            "frame" => Entry::Frame(frame(entry, &mut labels)?),
            other => return Err(violation(entry, format!("unknown entry '{}'", other))),
        };
        entries.push(decoded);
    }
    Ok(entries)
}

fn instruction(element: &Element, labels: &mut LabelNames) -> Result<Instruction, Error> {
    let name = element.attribute("name").unwrap_or_default();
    let (mnemonic, number) = name
        .rsplit_once('-')
        .ok_or_else(|| violation(element, format!("invalid opcode name '{}'", name)))?;
    let opcode: u8 = number
        .parse()
        .map_err(|_| violation(element, format!("invalid opcode number '{}'", number)))?;
    if opcodes::from_mnemonic(mnemonic) != Some(opcode) {
        let msg = format!("opcode {} is not '{}'", opcode, mnemonic);
        return Err(violation(element, msg));
    }
    let family = opcodes::family(opcode)
        .ok_or_else(|| violation(element, format!("'{}' is not a canonical opcode", mnemonic)))?;

    let operands = items(element);
    let arity = match family {
        Family::Simple => 0,
        Family::Int | Family::Var | Family::Type | Family::Jump | Family::Ldc => 1,
        Family::IInc | Family::MultiANewArray => 2,
        Family::Field | Family::LookupSwitch => 3,
        Family::Method | Family::InvokeDynamic | Family::TableSwitch => 4,
    };
    if operands.len() != arity {
        let msg = format!(
            "{} takes {} operands, found {}",
            mnemonic,
            arity,
            operands.len()
        );
        return Err(violation(element, msg));
    }

    let insn = match family {
        Family::Simple => Instruction::Simple(opcode),
        Family::Int => Instruction::Int {
            opcode,
            operand: as_int(operands[0])?,
        },
        Family::Var => Instruction::Var {
            opcode,
            index: narrow(operands[0], as_int(operands[0])?, "local index")?,
        },
        Family::IInc => Instruction::IInc {
            index: narrow(operands[0], as_int(operands[0])?, "local index")?,
            increment: narrow(operands[1], as_int(operands[1])?, "increment")?,
        },
        Family::Type => Instruction::Type {
            opcode,
            class: as_class(operands[0])?,
        },
        Family::Field => Instruction::Field {
            opcode,
            owner: as_string(operands[0])?,
            name: as_string(operands[1])?,
            descriptor: as_string(operands[2])?,
        },
        Family::Method => Instruction::Method {
            opcode,
            owner: as_string(operands[0])?,
            name: as_string(operands[1])?,
            descriptor: as_string(operands[2])?,
            interface: as_bool(operands[3])?,
        },
        Family::InvokeDynamic => Instruction::InvokeDynamic {
            name: as_string(operands[0])?,
            descriptor: as_string(operands[1])?,
            bootstrap: handle(operands[2])?,
            arguments: operands[3]
                .elements()
                .map(constant)
                .collect::<Result<_, _>>()?,
        },
        Family::Jump => Instruction::Jump {
            opcode,
            target: labels.get(operands[0])?,
        },
        Family::Ldc => Instruction::Ldc(constant(operands[0])?),
        Family::TableSwitch => Instruction::TableSwitch {
            min: as_int(operands[0])?,
            max: as_int(operands[1])?,
            default: labels.get(operands[2])?,
            targets: operands[3]
                .elements()
                .map(|target| labels.get(target))
                .collect::<Result<_, _>>()?,
        },
        Family::LookupSwitch => Instruction::LookupSwitch {
            default: labels.get(operands[0])?,
            keys: operands[1]
                .elements()
                .map(as_int)
                .collect::<Result<_, _>>()?,
            targets: operands[2]
                .elements()
                .map(|target| labels.get(target))
                .collect::<Result<_, _>>()?,
        },
        Family::MultiANewArray => Instruction::MultiANewArray {
            descriptor: as_class(operands[0])?,
            dimensions: narrow(operands[1], as_int(operands[1])?, "dimension count")?,
        },
    };
    Ok(insn)
}

fn frame(element: &Element, labels: &mut LabelNames) -> Result<Frame, Error> {
    let mut vtypes = |name: &str| -> Result<Vec<VerificationType>, Error> {
        match child(element, name) {
            None => Ok(vec![]),
            Some(seq) => seq.elements().map(|typ| vtype(typ, labels)).collect(),
        }
    };
    let frame = match string_of(element, "type")?.as_str() {
        "same" => Frame::Same,
        "same1" => {
            let mut stack = vtypes("stack")?;
            match (stack.pop(), stack.is_empty()) {
                (Some(typ), true) => Frame::SameLocals1StackItem(typ),
                _ => return Err(violation(element, "same1 frame needs one stack item")),
            }
        }
        "chop" => {
            let chop = required(element, "chop")?;
            Frame::Chop(narrow(chop, as_int(chop)?, "chopped locals")?)
        }
        "append" => Frame::Append(vtypes("locals")?),
        "full" => Frame::Full {
            locals: vtypes("locals")?,
            stack: vtypes("stack")?,
        },
        other => return Err(violation(element, format!("unknown frame type '{}'", other))),
    };
    Ok(frame)
}

fn vtype(element: &Element, labels: &mut LabelNames) -> Result<VerificationType, Error> {
    let typ = match string_of(element, "kind")?.as_str() {
        "top" => VerificationType::Top,
        "int" => VerificationType::Integer,
        "float" => VerificationType::Float,
        "double" => VerificationType::Double,
        "long" => VerificationType::Long,
        "null" => VerificationType::Null,
        "uninitialized-this" => VerificationType::UninitializedThis,
        "object" => VerificationType::Object(as_class(required(element, "value")?)?),
        "uninitialized" => VerificationType::Uninitialized(labels.named(element, "value")?),
        other => return Err(violation(element, format!("unknown type '{}'", other))),
    };
    Ok(typ)
}

fn constant(element: &Element) -> Result<Constant, Error> {
    let constant = match kind(element)? {
        "method-type" => Constant::MethodType(string_of(element, "descriptor")?),
        "handle" => Constant::MethodHandle(handle(element)?),
        "dynamic" => Constant::Dynamic(Box::new(DynamicConstant {
            name: string_of(element, "name")?,
            descriptor: string_of(element, "descriptor")?,
            bootstrap: handle(required(element, "bootstrap")?)?,
            arguments: required(element, "arguments")?
                .elements()
                .map(constant)
                .collect::<Result<_, _>>()?,
        })),
        _ => match data(element)? {
            Data::Int(i) => Constant::Int(i),
            Data::Long(l) => Constant::Long(l),
            Data::Float(f) => Constant::Float(f),
            Data::Double(d) => Constant::Double(d),
            Data::String(s) => Constant::String(s),
            Data::Class(class) => Constant::Class(class),
            other => return Err(mismatch(element, "a constant", &other)),
        },
    };
    Ok(constant)
}

fn handle(element: &Element) -> Result<Handle, Error> {
    if kind(element)? != "handle" {
        return Err(violation(element, "expected a method handle"));
    }
    let tag_element = required(element, "tag")?;
    let tag: u8 = narrow(tag_element, as_int(tag_element)?, "handle kind")?;
    let kind = HandleKind::from_tag(tag)
        .ok_or_else(|| violation(tag_element, format!("invalid handle kind {}", tag)))?;
    Ok(Handle {
        kind,
        owner: string_of(element, "owner")?,
        name: string_of(element, "name")?,
        descriptor: string_of(element, "descriptor")?,
        interface: bool_of(element, "interface")?,
    })
}

fn annotations(element: &Element) -> Result<Vec<Annotation>, Error> {
    element.elements().map(annotation).collect()
}

fn annotation(element: &Element) -> Result<Annotation, Error> {
    let mut annotation = Annotation::new(
        string_of(element, "descriptor")?,
        bool_of(element, "visible")?,
    );
    for property in required(element, "values")?.elements() {
        annotation
            .values
            .push((string_of(property, "key")?, value(required(property, "value")?)?));
    }
    Ok(annotation)
}

fn type_annotations(element: &Element) -> Result<Vec<TypeAnnotation>, Error> {
    element
        .elements()
        .map(|typed| {
            let type_ref = required(typed, "ref")?;
            Ok(TypeAnnotation {
                type_ref: narrow(type_ref, as_int(type_ref)?, "type reference")?,
                type_path: opt_string(typed, "path")?.unwrap_or_default(),
                annotation: annotation(typed)?,
            })
        })
        .collect()
}

fn value(element: &Element) -> Result<AnnotationValue, Error> {
    let value = match kind(element)? {
        "enum" => AnnotationValue::Enum {
            descriptor: string_of(element, "descriptor")?,
            value: string_of(element, "value")?,
        },
        "annotation" => AnnotationValue::Annotation(annotation(element)?),
        "array" => {
            AnnotationValue::Array(element.elements().map(value).collect::<Result<_, _>>()?)
        }
        _ => match data(element)? {
            Data::Byte(b) => AnnotationValue::Byte(b),
            Data::Char(c) => AnnotationValue::Char(c),
            Data::Double(d) => AnnotationValue::Double(d),
            Data::Float(f) => AnnotationValue::Float(f),
            Data::Int(i) => AnnotationValue::Int(i),
            Data::Long(l) => AnnotationValue::Long(l),
            Data::Short(s) => AnnotationValue::Short(s),
            Data::Bool(b) => AnnotationValue::Boolean(b),
            Data::String(s) => AnnotationValue::String(s),
            Data::Class(class) => AnnotationValue::Class(class),
            other => return Err(mismatch(element, "an annotation value", &other)),
        },
    };
    Ok(value)
}

fn module(element: &Element) -> Result<Module, Error> {
    let exports = |name: &str| -> Result<Vec<ModuleExport>, Error> {
        let Some(seq) = child(element, name) else {
            return Ok(vec![]);
        };
        seq.elements()
            .map(|export| {
                Ok(ModuleExport {
                    package: string_of(export, "package")?,
                    access_flags: ModuleAccessFlags::from_bits_retain(u16_of(export, "access")?),
                    modules: strings_of(export, "modules")?,
                })
            })
            .collect()
    };

    let mut module = Module::new(string_of(element, "name")?);
    module.access_flags = ModuleAccessFlags::from_bits_retain(u16_of(element, "access")?);
    module.version = opt_string(element, "version")?;
    module.main_class = opt_string(element, "main")?;
    module.packages = strings_of(element, "packages")?;
    if let Some(requires) = child(element, "requires") {
        module.requires = requires
            .elements()
            .map(|require| {
                Ok(ModuleRequire {
                    module: string_of(require, "module")?,
                    access_flags: ModuleAccessFlags::from_bits_retain(u16_of(require, "access")?),
                    version: opt_string(require, "version")?,
                })
            })
            .collect::<Result<_, Error>>()?;
    }
    module.exports = exports("exports")?;
    module.opens = exports("opens")?;
    module.uses = strings_of(element, "uses")?;
    if let Some(provides) = child(element, "provides") {
        module.provides = provides
            .elements()
            .map(|provide| {
                Ok(ModuleProvide {
                    service: string_of(provide, "service")?,
                    providers: strings_of(provide, "providers")?,
                })
            })
            .collect::<Result<_, Error>>()?;
    }
    Ok(module)
}

fn record_component(element: &Element) -> Result<RecordComponent, Error> {
    Ok(RecordComponent {
        name: string_of(element, "name")?,
        descriptor: string_of(element, "descriptor")?,
        signature: opt_string(element, "signature")?,
        annotations: annotations(required(element, "annotations")?)?,
        type_annotations: type_annotations(required(element, "type-annotations")?)?,
    })
}

fn attributes(element: &Element) -> Result<Vec<RawAttribute>, Error> {
    required(element, "attributes")?
        .elements()
        .map(|attribute| {
            let data_element = required(attribute, "data")?;
            let data = match data(data_element)? {
                Data::Bytes(bytes) => bytes,
                other => return Err(mismatch(data_element, "bytes", &other)),
            };
            Ok(RawAttribute {
                name: string_of(attribute, "name")?,
                data,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::opcodes::*;
    use crate::xmir::encoder::{encode, Options};
    use crate::xmir::xml::{parse, write};

    fn round_trip(program: &Program) -> Program {
        let xml = write(&encode(program, &Options::default()).unwrap()).unwrap();
        decode(&parse(&xml).unwrap()).unwrap()
    }

    #[test]
    fn instructions_and_labels() {
        let mut class = Class::new("demo/Loop", Some("java/lang/Object"));
        let mut method = Method::new(MethodAccessFlags::STATIC, "count", "(I)I");
        method.parameters[0].name = Some("n".into());
        method.body = vec![
            Entry::TryCatch {
                start: Label(0),
                end: Label(1),
                handler: Label(2),
                catch_type: Some("java/lang/Exception".into()),
            },
            Entry::Label(Label(0)),
            Entry::Line(4),
            Entry::Instruction(Instruction::Var {
                opcode: ILOAD,
                index: 0,
            }),
            Entry::Instruction(Instruction::LookupSwitch {
                default: Label(1),
                keys: vec![1, 10],
                targets: vec![Label(2), Label(1)],
            }),
            Entry::Label(Label(1)),
            Entry::Frame(Frame::Same),
            Entry::Instruction(Instruction::Ldc(Constant::Long(1 << 40))),
            Entry::Instruction(Instruction::Simple(L2I)),
            Entry::Instruction(Instruction::Simple(IRETURN)),
            Entry::Label(Label(2)),
            Entry::Frame(Frame::SameLocals1StackItem(VerificationType::Object(
                "java/lang/Throwable".into(),
            ))),
            Entry::Instruction(Instruction::Simple(ATHROW)),
        ];
        class.methods.push(method);
        let program = Program::new(class);
        assert_eq!(round_trip(&program), program);
    }

    #[test]
    fn annotations_and_constants() {
        let mut class = Class::new("demo/Tagged", Some("java/lang/Object"));
        let mut marker = Annotation::new("Ldemo/Marker;", true);
        marker.values = vec![
            ("count".into(), AnnotationValue::Int(3)),
            ("ratio".into(), AnnotationValue::Float(f32::NAN)),
            (
                "kind".into(),
                AnnotationValue::Enum {
                    descriptor: "Ldemo/Kind;".into(),
                    value: "LARGE".into(),
                },
            ),
            (
                "tags".into(),
                AnnotationValue::Array(vec![
                    AnnotationValue::String("a".into()),
                    AnnotationValue::Char('b' as u16),
                ]),
            ),
        ];
        class.annotations.push(marker);
        let mut field = Field::new(
            FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
            "LIMIT",
            "J",
        );
        field.value = Some(Constant::Long(-5));
        class.fields.push(field);
        class.attributes.push(RawAttribute {
            name: "Custom".into(),
            data: vec![0, 1, 2],
        });
        let program = Program::new(class);
        assert_eq!(round_trip(&program), program);
    }

    #[test]
    fn opcode_name_must_match() {
        let mut method = Method::new(MethodAccessFlags::STATIC, "run", "()V");
        method.body = vec![Entry::Instruction(Instruction::Simple(RETURN))];
        let mut class = Class::new("demo/A", Some("java/lang/Object"));
        class.methods.push(method);
        let xml = write(&encode(&Program::new(class), &Options::default()).unwrap())
            .unwrap()
            .replace("return-177", "return-176");
        match decode(&parse(&xml).unwrap()) {
            Err(Error::SchemaViolation { rule, line, .. }) => {
                assert_eq!(rule, "opcode 176 is not 'return'");
                assert!(line > 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
