//! Class files produced by `javac -g --release 17` from the sources in `fixtures/java`.

use pretty_assertions::assert_eq;
use xmir::decode::{decode_class, Mode};
use xmir::encode::{encode_class, Options};
use xmir::jvm::opcodes::*;
use xmir::model::*;
use xmir::translate::{self, Settings};
use xmir::xmir::{from_xml, to_xml, Listing};

const HELLO: &[u8] = include_bytes!("fixtures/Hello.class");
const OUTER: &[u8] = include_bytes!("fixtures/Outer.class");
const OUTER_INNER: &[u8] = include_bytes!("fixtures/Outer$Inner.class");
const OUTER_NESTED: &[u8] = include_bytes!("fixtures/Outer$Nested.class");
const OUTER_ANONYMOUS: &[u8] = include_bytes!("fixtures/Outer$1.class");
const POINT: &[u8] = include_bytes!("fixtures/Point.class");
const DASHES: &[u8] = include_bytes!("fixtures/Dashes.class");
const BIG: &[u8] = include_bytes!("fixtures/Big.class");
const MODULE_INFO: &[u8] = include_bytes!("fixtures/module-info.class");

const ALL: [(&str, &[u8]); 9] = [
    ("Hello", HELLO),
    ("Outer", OUTER),
    ("Outer$Inner", OUTER_INNER),
    ("Outer$Nested", OUTER_NESTED),
    ("Outer$1", OUTER_ANONYMOUS),
    ("Point", POINT),
    ("Dashes", DASHES),
    ("Big", BIG),
    ("module-info", MODULE_INFO),
];

fn documented() -> xmir::xmir::Options {
    xmir::xmir::Options {
        comments: true,
        listing: Listing::Full,
    }
}

fn method<'a>(class: &'a Class, name: &str) -> &'a Method {
    class
        .methods
        .iter()
        .find(|method| method.name == name)
        .unwrap_or_else(|| panic!("no method {} in {}", name, class.name))
}

#[test]
fn models_survive_the_document() {
    for (name, bytes) in ALL {
        for mode in [Mode::Full, Mode::Short] {
            let program = Program::new(decode_class(bytes, mode).unwrap());
            let document = to_xml(&program, &documented()).unwrap();
            assert_eq!(from_xml(&document).unwrap(), program, "{} in {:?}", name, mode);
        }
    }
}

#[test]
fn reassembled_classes_are_equivalent() {
    for (name, bytes) in ALL {
        let document = translate::disassemble(bytes, &Settings::default()).unwrap();
        let reassembled = translate::assemble(&document, &Settings::default())
            .unwrap_or_else(|err| panic!("{}: {}", name, err));
        assert_eq!(
            decode_class(&reassembled, Mode::Full).unwrap(),
            decode_class(bytes, Mode::Full).unwrap(),
            "{}",
            name
        );

        let again = translate::disassemble(&reassembled, &Settings::default()).unwrap();
        assert_eq!(
            translate::assemble(&again, &Settings::default()).unwrap(),
            reassembled,
            "{}",
            name
        );
    }
}

#[test]
fn canonical_documents_reassemble() {
    for (name, bytes) in ALL {
        let document = translate::disassemble(bytes, &Settings::default()).unwrap();
        let direct = translate::assemble(&document, &Settings::default()).unwrap();
        let canonical = translate::to_phi(&document).unwrap();
        assert_eq!(
            translate::assemble(&canonical, &Settings::default()).unwrap(),
            direct,
            "{}",
            name
        );
    }
}

#[test]
fn far_loops_are_reencoded() {
    let class = decode_class(BIG, Mode::Full).unwrap();
    let run = method(&class, "run");
    let gotos = run
        .instructions()
        .filter(|instruction| matches!(instruction, Instruction::Jump { opcode: GOTO, .. }))
        .count();
    assert!(gotos >= 2, "{:?}", gotos);
    assert!(!run
        .instructions()
        .any(|instruction| instruction.opcode() == GOTO_W));

    let bytes = encode_class(&class, &Options::default()).unwrap();
    assert_eq!(decode_class(&bytes, Mode::Full).unwrap(), class);
}

#[test]
fn string_dashes_stay_inside_comments() {
    let settings = Settings::default().with_comments(true);
    let document = translate::disassemble(DASHES, &settings).unwrap();
    assert!(document.contains("<!-- #"), "{}", document);
    assert!(!document.contains("--->"), "{}", document);
    assert!(!document.contains("-- --- ----"), "{}", document);

    let class = from_xml(&document).unwrap().class;
    let strings: Vec<_> = class
        .methods
        .iter()
        .flat_map(|method| method.instructions())
        .filter_map(|instruction| match instruction {
            Instruction::Ldc(Constant::String(value)) => Some(value.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(strings, ["a--->b <o base=\"x\"/>", "-- --- ----"]);

    let reassembled = translate::assemble(&document, &settings).unwrap();
    assert_eq!(
        decode_class(&reassembled, Mode::Full).unwrap(),
        decode_class(DASHES, Mode::Full).unwrap()
    );
}

#[test]
fn module_descriptor() {
    let class = decode_class(MODULE_INFO, Mode::Full).unwrap();
    assert_eq!(class.name, "module-info");
    let module = class.module.as_ref().unwrap();
    assert_eq!(module.name, "demo.mod");
    assert!(module
        .requires
        .iter()
        .any(|require| require.module == "java.logging"));
    assert!(module
        .requires
        .iter()
        .any(|require| require.module == "java.base"));
    let exports: Vec<_> = module.exports.iter().map(|e| e.package.as_str()).collect();
    assert_eq!(exports, ["demo/api"]);
    assert_eq!(module.uses, ["java/lang/Runnable"]);
}

#[test]
fn record_components() {
    let class = decode_class(POINT, Mode::Full).unwrap();
    let components = class.record_components.as_ref().unwrap();
    let names: Vec<_> = components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["x", "y"]);
    assert!(components.iter().all(|c| c.descriptor == "I"));
    let accessor = method(&class, "y");
    assert_eq!(accessor.annotations[0].descriptor, "Ljava/lang/Deprecated;");
    assert!(class
        .methods
        .iter()
        .flat_map(|method| method.instructions())
        .any(|instruction| instruction.opcode() == INVOKEDYNAMIC));
}

#[test]
fn nested_classes() {
    let outer = decode_class(OUTER, Mode::Full).unwrap();
    let inner_names: Vec<_> = outer.inner_classes.iter().map(|c| c.name.as_str()).collect();
    for name in ["demo/Outer$Inner", "demo/Outer$Nested", "demo/Outer$1"] {
        assert!(inner_names.contains(&name), "{:?}", inner_names);
    }
    assert!(outer.nest_members.iter().any(|m| m == "demo/Outer$Inner"));

    let inner = decode_class(OUTER_INNER, Mode::Full).unwrap();
    assert_eq!(inner.nest_host.as_deref(), Some("demo/Outer"));
    assert!(inner
        .inner_classes
        .iter()
        .any(|c| c.name == "demo/Outer$Inner" && c.inner_name.as_deref() == Some("Inner")));

    let anonymous = decode_class(OUTER_ANONYMOUS, Mode::Full).unwrap();
    let enclosing = anonymous.enclosing_method.as_ref().unwrap();
    assert_eq!(enclosing.owner, "demo/Outer");
    assert!(anonymous
        .inner_classes
        .iter()
        .any(|c| c.name == "demo/Outer$1" && c.inner_name.is_none()));
}
