use pretty_assertions::assert_eq;
use xmir::decode::{decode_class, Mode};
use xmir::encode::{encode_class, Options};
use xmir::jvm::opcodes::*;
use xmir::jvm::{FieldAccessFlags, MethodAccessFlags};
use xmir::model::*;
use xmir::translate::{self, Settings};
use xmir::xmir::{phi, xml, Error};

fn constructor() -> Method {
    let mut init = Method::new(MethodAccessFlags::PUBLIC, "<init>", "()V");
    init.body = vec![
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
    init
}

fn hello_world() -> Class {
    let mut class = Class::new("org/eolang/Hello", Some("java/lang/Object"));
    class.source_file = Some("Hello.java".into());
    class.methods.push(constructor());

    let mut main = Method::new(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        "main",
        "([Ljava/lang/String;)V",
    );
    main.body = vec![
        Entry::Label(Label(0)),
        Entry::Line(5),
        Entry::Instruction(Instruction::Field {
            opcode: GETSTATIC,
            owner: "java/lang/System".into(),
            name: "out".into(),
            descriptor: "Ljava/io/PrintStream;".into(),
        }),
        Entry::Instruction(Instruction::Ldc(Constant::String("Hello, world!".into()))),
        Entry::Instruction(Instruction::Method {
            opcode: INVOKEVIRTUAL,
            owner: "java/io/PrintStream".into(),
            name: "println".into(),
            descriptor: "(Ljava/lang/String;)V".into(),
            interface: false,
        }),
        Entry::Line(6),
        Entry::Instruction(Instruction::Simple(RETURN)),
        Entry::Label(Label(1)),
        Entry::LocalVariable(LocalVariable {
            index: 0,
            name: "args".into(),
            descriptor: "[Ljava/lang/String;".into(),
            signature: None,
            start: Label(0),
            end: Label(1),
        }),
    ];
    class.methods.push(main);
    class
}

fn bytes_of(class: &Class) -> Vec<u8> {
    encode_class(class, &Options::default()).unwrap()
}

fn through_document(bytes: &[u8], settings: &Settings) -> Vec<u8> {
    let document = translate::disassemble(bytes, settings).unwrap();
    translate::assemble(&document, settings).unwrap()
}

#[test]
fn minimal_class() {
    let bytes = bytes_of(&Class::new("Minimal", Some("java/lang/Object")));
    assert_eq!(through_document(&bytes, &Settings::default()), bytes);
}

#[test]
fn hello_world_class() {
    let bytes = bytes_of(&hello_world());
    assert_eq!(through_document(&bytes, &Settings::default()), bytes);

    let documented = Settings::default()
        .with_comments(true)
        .with_listing(xmir::xmir::Listing::Full);
    assert_eq!(through_document(&bytes, &documented), bytes);
}

#[test]
fn one_field_class() {
    let mut class = Class::new("demo/Point", Some("java/lang/Object"));
    let mut field = Field::new(
        FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL | FieldAccessFlags::STATIC,
        "ORIGIN",
        "I",
    );
    field.value = Some(Constant::Int(0));
    class.fields.push(field);
    let bytes = bytes_of(&class);
    assert_eq!(through_document(&bytes, &Settings::default()), bytes);
}

#[test]
fn models_survive_the_document() {
    let bytes = bytes_of(&hello_world());
    let class = decode_class(&bytes, Mode::Full).unwrap();
    let document = translate::disassemble(&bytes, &Settings::default()).unwrap();
    assert_eq!(xmir::xmir::from_xml(&document).unwrap(), Program::new(class));
}

#[test]
fn short_mode_drops_debug_information() {
    let bytes = bytes_of(&hello_world());
    let short = decode_class(&bytes, Mode::Short).unwrap();
    assert_eq!(short.source_file, None);
    let main = &short.methods[1];
    assert!(main
        .body
        .iter()
        .all(|entry| !matches!(entry, Entry::Line(_) | Entry::LocalVariable(_))));
    assert_eq!(main.instructions().count(), 4);

    let document = translate::disassemble(&bytes, &Settings::new(Mode::Short)).unwrap();
    assert!(!document.contains("base=\"line\""), "{}", document);
    assert_ne!(through_document(&bytes, &Settings::new(Mode::Short)), bytes);
}

#[test]
fn canonical_form_is_equivalent() {
    let bytes = bytes_of(&hello_world());
    let document = translate::disassemble(&bytes, &Settings::default()).unwrap();
    let canonical = translate::to_phi(&document).unwrap();
    assert_ne!(canonical, document);
    assert!(canonical.contains("base=\"Q.jeo.class\""));
    assert!(canonical.contains("base=\"Q.org.eolang.bytes\""));
    assert_eq!(translate::assemble(&canonical, &Settings::default()).unwrap(), bytes);

    let root = xml::parse(&document).unwrap();
    let restored = phi::restore(&phi::normalize(&root)).unwrap();
    assert_eq!(
        xmir::xmir::decode(&restored).unwrap(),
        xmir::xmir::decode(&root).unwrap()
    );
}

#[test]
fn missing_element_is_named() {
    let bytes = bytes_of(&hello_world());
    let document = translate::disassemble(&bytes, &Settings::default()).unwrap();
    let start = document.find("<o base=\"int\" name=\"major\"").unwrap();
    let end = start + document[start..].find("</o>").unwrap() + "</o>".len();
    let broken = format!("{}{}", &document[..start], &document[end..]);

    match xmir::xmir::from_xml(&broken) {
        Err(Error::SchemaViolation { path, rule, .. }) => {
            assert!(rule.contains("major"), "{}", rule);
            assert!(path.starts_with("/xmir/program"), "{}", path);
        }
        other => panic!("expected a schema violation, got {:?}", other),
    }
}
