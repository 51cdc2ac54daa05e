//! Structural rules of IR documents
//!
//! Every object is an `<o>` element whose `base` attribute names its kind. Data kinds are leaves
//! holding hex text; composite kinds hold a fixed sequence of named children (a record) or any
//! number of unnamed ones (a sequence). Validation walks the whole tree before decoding starts,
//! so the decoder only has to deal with semantic problems.

use crate::xmir::hex::{is_data_type, Data};
use crate::xmir::xml::Element;
use crate::xmir::Error;

/// Kinds that may stand where a loadable constant is expected
pub const CONSTANTS: &[&str] = &[
    "int",
    "long",
    "float",
    "double",
    "string",
    "class",
    "method-type",
    "handle",
    "dynamic",
];

/// Kinds that may stand where an annotation element value is expected
pub const VALUES: &[&str] = &[
    "byte",
    "char",
    "double",
    "float",
    "int",
    "long",
    "short",
    "bool",
    "string",
    "class",
    "enum",
    "annotation",
    "array",
];

/// Kinds of method body entries
pub const ENTRIES: &[&str] = &[
    "opcode",
    "label",
    "line",
    "try-catch",
    "local-variable",
    "frame",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Occurs {
    One,
    Optional,

    /// Any number of unnamed children, matched by kind
    Many,
}

/// Expected child of a record
#[derive(Copy, Clone, Debug)]
struct Slot {
    name: &'static str,
    kinds: &'static [&'static str],
    occurs: Occurs,

    /// Kinds allowed inside of the child, when it is a `seq`
    items: &'static [&'static str],
}

const fn one(name: &'static str, kinds: &'static [&'static str]) -> Slot {
    Slot {
        name,
        kinds,
        occurs: Occurs::One,
        items: &[],
    }
}

const fn opt(name: &'static str, kinds: &'static [&'static str]) -> Slot {
    Slot {
        name,
        kinds,
        occurs: Occurs::Optional,
        items: &[],
    }
}

const fn seq(name: &'static str, items: &'static [&'static str], occurs: Occurs) -> Slot {
    Slot {
        name,
        kinds: &["seq"],
        occurs,
        items,
    }
}

const fn many(kind: &'static [&'static str]) -> Slot {
    Slot {
        name: "",
        kinds: kind,
        occurs: Occurs::Many,
        items: &[],
    }
}

#[derive(Copy, Clone, Debug)]
enum Shape {
    Record(&'static [Slot]),
    Items(&'static [&'static str]),
    Operands,
    Line,
}

const INT: &[&str] = &["int"];
const STRING: &[&str] = &["string"];
const CLASS: &[&str] = &["class"];
const LABEL: &[&str] = &["label"];
const BOOL: &[&str] = &["bool"];
const BYTES: &[&str] = &["bytes"];
const ANNOTATIONS: &[&str] = &["annotations"];
const TYPE_ANNOTATIONS: &[&str] = &["type-annotations"];
const OPERANDS: &[&str] = &[
    "int",
    "bool",
    "label",
    "long",
    "float",
    "double",
    "string",
    "class",
    "method-type",
    "handle",
    "dynamic",
];
const OPERANDS_OR_SEQ: &[&str] = &[
    "int",
    "bool",
    "label",
    "long",
    "float",
    "double",
    "string",
    "class",
    "method-type",
    "handle",
    "dynamic",
    "seq",
];

const CLASS_SLOTS: &[Slot] = &[
    one("major", INT),
    one("minor", INT),
    one("access", INT),
    one("name", STRING),
    opt("super", CLASS),
    seq("interfaces", CLASS, Occurs::One),
    opt("signature", STRING),
    opt("source", STRING),
    many(&["field"]),
    many(&["method"]),
    one("annotations", ANNOTATIONS),
    one("type-annotations", TYPE_ANNOTATIONS),
    seq("inner-classes", &["inner-class"], Occurs::One),
    opt("enclosing", &["enclosing-method"]),
    opt("nest-host", CLASS),
    seq("nest-members", CLASS, Occurs::One),
    seq("permitted", CLASS, Occurs::One),
    opt("module", &["module"]),
    seq("record", &["record-component"], Occurs::Optional),
    seq("attributes", &["attribute"], Occurs::One),
];

const FIELD_SLOTS: &[Slot] = &[
    one("name", STRING),
    one("access", INT),
    one("descriptor", STRING),
    opt("signature", STRING),
    opt("value", CONSTANTS),
    one("annotations", ANNOTATIONS),
    one("type-annotations", TYPE_ANNOTATIONS),
    seq("attributes", &["attribute"], Occurs::One),
];

const METHOD_SLOTS: &[Slot] = &[
    one("access", INT),
    opt("signature", STRING),
    seq("exceptions", CLASS, Occurs::One),
    seq("params", &["param"], Occurs::One),
    one("annotations", ANNOTATIONS),
    one("type-annotations", TYPE_ANNOTATIONS),
    opt("default", VALUES),
    seq("body", ENTRIES, Occurs::One),
    seq("attributes", &["attribute"], Occurs::One),
];

const PARAM_SLOTS: &[Slot] = &[
    opt("name", STRING),
    one("access", INT),
    one("annotations", ANNOTATIONS),
];

const TRY_CATCH_SLOTS: &[Slot] = &[
    one("start", LABEL),
    one("end", LABEL),
    one("handler", LABEL),
    opt("type", CLASS),
];

const LOCAL_VARIABLE_SLOTS: &[Slot] = &[
    one("index", INT),
    one("name", STRING),
    one("descriptor", STRING),
    opt("signature", STRING),
    one("start", LABEL),
    one("end", LABEL),
];

const FRAME_SLOTS: &[Slot] = &[
    one("type", STRING),
    opt("chop", INT),
    seq("locals", &["vtype"], Occurs::Optional),
    seq("stack", &["vtype"], Occurs::Optional),
];

const VTYPE_SLOTS: &[Slot] = &[one("kind", STRING), opt("value", &["class", "label"])];

const ANNOTATION_SLOTS: &[Slot] = &[
    one("descriptor", STRING),
    one("visible", BOOL),
    seq("values", &["property"], Occurs::One),
];

const TYPE_ANNOTATION_SLOTS: &[Slot] = &[
    one("ref", INT),
    opt("path", STRING),
    one("descriptor", STRING),
    one("visible", BOOL),
    seq("values", &["property"], Occurs::One),
];

const PROPERTY_SLOTS: &[Slot] = &[one("key", STRING), one("value", VALUES)];

const ENUM_SLOTS: &[Slot] = &[one("descriptor", STRING), one("value", STRING)];

const METHOD_TYPE_SLOTS: &[Slot] = &[one("descriptor", STRING)];

const HANDLE_SLOTS: &[Slot] = &[
    one("tag", INT),
    one("owner", STRING),
    one("name", STRING),
    one("descriptor", STRING),
    one("interface", BOOL),
];

const DYNAMIC_SLOTS: &[Slot] = &[
    one("name", STRING),
    one("descriptor", STRING),
    one("bootstrap", &["handle"]),
    seq("arguments", CONSTANTS, Occurs::One),
];

const MODULE_SLOTS: &[Slot] = &[
    one("name", STRING),
    one("access", INT),
    opt("version", STRING),
    opt("main", STRING),
    seq("packages", STRING, Occurs::Optional),
    seq("requires", &["module-require"], Occurs::Optional),
    seq("exports", &["module-export"], Occurs::Optional),
    seq("opens", &["module-open"], Occurs::Optional),
    seq("uses", STRING, Occurs::Optional),
    seq("provides", &["module-provide"], Occurs::Optional),
];

const MODULE_REQUIRE_SLOTS: &[Slot] = &[
    one("module", STRING),
    one("access", INT),
    opt("version", STRING),
];

const MODULE_EXPORT_SLOTS: &[Slot] = &[
    one("package", STRING),
    one("access", INT),
    seq("modules", STRING, Occurs::Optional),
];

const MODULE_PROVIDE_SLOTS: &[Slot] = &[
    one("service", STRING),
    seq("providers", STRING, Occurs::One),
];

const RECORD_COMPONENT_SLOTS: &[Slot] = &[
    one("name", STRING),
    one("descriptor", STRING),
    opt("signature", STRING),
    one("annotations", ANNOTATIONS),
    one("type-annotations", TYPE_ANNOTATIONS),
];

const INNER_CLASS_SLOTS: &[Slot] = &[
    one("name", STRING),
    opt("outer", STRING),
    opt("inner", STRING),
    one("access", INT),
];

const ENCLOSING_METHOD_SLOTS: &[Slot] = &[
    one("owner", STRING),
    opt("name", STRING),
    opt("descriptor", STRING),
];

const ATTRIBUTE_SLOTS: &[Slot] = &[one("name", STRING), one("data", BYTES)];

fn shape(kind: &str) -> Option<Shape> {
    let shape = match kind {
        "field" => Shape::Record(FIELD_SLOTS),
        "method" => Shape::Record(METHOD_SLOTS),
        "param" => Shape::Record(PARAM_SLOTS),
        "opcode" => Shape::Operands,
        "line" => Shape::Line,
        "try-catch" => Shape::Record(TRY_CATCH_SLOTS),
        "local-variable" => Shape::Record(LOCAL_VARIABLE_SLOTS),
        "frame" => Shape::Record(FRAME_SLOTS),
        "vtype" => Shape::Record(VTYPE_SLOTS),
        "annotations" => Shape::Items(&["annotation"]),
        "annotation" => Shape::Record(ANNOTATION_SLOTS),
        "type-annotations" => Shape::Items(&["type-annotation"]),
        "type-annotation" => Shape::Record(TYPE_ANNOTATION_SLOTS),
        "property" => Shape::Record(PROPERTY_SLOTS),
        "enum" => Shape::Record(ENUM_SLOTS),
        "array" => Shape::Items(VALUES),
        "method-type" => Shape::Record(METHOD_TYPE_SLOTS),
        "handle" => Shape::Record(HANDLE_SLOTS),
        "dynamic" => Shape::Record(DYNAMIC_SLOTS),
        "module" => Shape::Record(MODULE_SLOTS),
        "module-require" => Shape::Record(MODULE_REQUIRE_SLOTS),
        "module-export" | "module-open" => Shape::Record(MODULE_EXPORT_SLOTS),
        "module-provide" => Shape::Record(MODULE_PROVIDE_SLOTS),
        "record-component" => Shape::Record(RECORD_COMPONENT_SLOTS),
        "inner-class" => Shape::Record(INNER_CLASS_SLOTS),
        "enclosing-method" => Shape::Record(ENCLOSING_METHOD_SLOTS),
        "attribute" => Shape::Record(ATTRIBUTE_SLOTS),
        _ => return None,
    };
    Some(shape)
}

/// Violation pointing at an element
pub fn violation(element: &Element, rule: impl Into<String>) -> Error {
    Error::SchemaViolation {
        path: element.path.clone(),
        line: element.line,
        rule: rule.into(),
    }
}

/// Kind of an object, from its `base` attribute
pub fn kind(element: &Element) -> Result<&str, Error> {
    if element.name != "o" {
        return Err(violation(
            element,
            format!("expected an object, found <{}>", element.name),
        ));
    }
    element
        .attribute("base")
        .ok_or_else(|| violation(element, "object has no base"))
}

/// Check a whole document
pub fn validate(root: &Element) -> Result<(), Error> {
    if root.name != "xmir" {
        return Err(violation(root, format!("root must be <xmir>, found <{}>", root.name)));
    }
    let mut programs = root.elements().filter(|e| e.name == "program");
    let program = programs
        .next()
        .ok_or_else(|| violation(root, "missing <program>"))?;
    if let Some(extra) = programs.next() {
        return Err(violation(extra, "more than one <program>"));
    }
    if program.attribute("form") == Some("phi") {
        return Err(violation(program, "document is in phi form"));
    }
    if program.attribute("name").is_none() {
        return Err(violation(program, "program has no name"));
    }

    let mut class = None;
    for child in program.elements() {
        match child.name.as_str() {
            "listing" => (),
            "o" if class.is_none() => class = Some(child),
            _ => return Err(violation(child, format!("unexpected <{}> in program", child.name))),
        }
    }
    // The class object is the only composite of kind `class`, everywhere else it is a name
    let class = class.ok_or_else(|| violation(program, "missing class"))?;
    match kind(class)? {
        "class" if class.attribute("data").is_none() => check_record(class, CLASS_SLOTS),
        other => Err(violation(class, format!("expected a class, found '{}'", other))),
    }
}

/// Check an object against the kinds allowed where it stands
fn check(element: &Element, kinds: &[&str], items: &[&str]) -> Result<(), Error> {
    let kind = kind(element)?;
    if !kinds.contains(&kind) {
        return Err(violation(
            element,
            format!("expected one of {:?}, found '{}'", kinds, kind),
        ));
    }

    if is_data_type(kind) {
        if element.attribute("data") != Some("bytes") {
            return Err(violation(element, "data object without data=\"bytes\""));
        }
        if let Some(child) = element.elements().next() {
            return Err(violation(child, "data object with child objects"));
        }
        return match Data::from_hex(kind, &element.text()) {
            Ok(_) => Ok(()),
            Err(err) => Err(violation(element, format!("invalid {} data: {}", kind, err))),
        };
    }

    if kind == "seq" {
        for child in element.elements() {
            check(child, items, OPERANDS)?;
        }
        return Ok(());
    }

    match shape(kind) {
        None => Err(violation(element, format!("unknown kind '{}'", kind))),
        Some(Shape::Line) => {
            let line = element.attribute("line").unwrap_or_default();
            if line.parse::<u16>().is_err() {
                return Err(violation(element, format!("invalid line number '{}'", line)));
            }
            match element.elements().next() {
                Some(child) => Err(violation(child, "line with child objects")),
                None => Ok(()),
            }
        }
        Some(Shape::Operands) => {
            for child in element.elements() {
                check(child, OPERANDS_OR_SEQ, OPERANDS)?;
            }
            Ok(())
        }
        Some(Shape::Items(allowed)) => {
            for child in element.elements() {
                check(child, allowed, &[])?;
            }
            Ok(())
        }
        Some(Shape::Record(slots)) => check_record(element, slots),
    }
}

fn check_record(element: &Element, slots: &[Slot]) -> Result<(), Error> {
    let children: Vec<&Element> = element.elements().collect();
    let mut next = 0;
    for slot in slots {
        match slot.occurs {
            Occurs::Many => {
                while let Some(child) = children.get(next) {
                    match child.attribute("base") {
                        Some(base) if slot.kinds.contains(&base) => {
                            check(child, slot.kinds, &[])?;
                            next += 1;
                        }
                        _ => break,
                    }
                }
            }
            Occurs::One | Occurs::Optional => match children.get(next) {
                Some(child) if child.attribute("name") == Some(slot.name) => {
                    check(child, slot.kinds, slot.items)?;
                    next += 1;
                }
                _ if slot.occurs == Occurs::Optional => (),
                _ => {
                    return Err(violation(
                        element,
                        format!("missing child '{}'", slot.name),
                    ))
                }
            },
        }
    }
    match children.get(next) {
        None => Ok(()),
        Some(child) => {
            let name = child
                .attribute("name")
                .or_else(|| child.attribute("base"))
                .unwrap_or_default();
            Err(violation(child, format!("unexpected child '{}'", name)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmir::xml::parse;

    fn class(body: &str) -> String {
        format!(
            r#"<xmir><program name="A"><o base="class" name="j$A">{}</o></program></xmir>"#,
            body
        )
    }

    const HEADER: &str = r#"
        <o base="int" name="major" data="bytes">00 00 00 00 00 00 00 34</o>
        <o base="int" name="minor" data="bytes">00 00 00 00 00 00 00 00</o>
        <o base="int" name="access" data="bytes">00 00 00 00 00 00 00 21</o>
        <o base="string" name="name" data="bytes">41</o>
        <o base="seq" name="interfaces"/>
        <o base="annotations" name="annotations"/>
        <o base="type-annotations" name="type-annotations"/>
        <o base="seq" name="inner-classes"/>
        <o base="seq" name="nest-members"/>
        <o base="seq" name="permitted"/>
    "#;

    const TAIL: &str = r#"<o base="seq" name="attributes"/>"#;

    fn rule(xml: &str) -> String {
        match validate(&parse(xml).unwrap()) {
            Err(Error::SchemaViolation { rule, .. }) => rule,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn minimal_class() {
        validate(&parse(&class(&format!("{}{}", HEADER, TAIL))).unwrap()).unwrap();
    }

    #[test]
    fn missing_child() {
        let body = HEADER.replace(
            r#"<o base="int" name="major" data="bytes">00 00 00 00 00 00 00 34</o>"#,
            "",
        ) + TAIL;
        assert_eq!(rule(&class(&body)), "missing child 'major'");
    }

    #[test]
    fn unknown_kind() {
        let body = format!(
            r#"{}<o base="widget" name="attributes"/>"#,
            HEADER
        );
        assert!(rule(&class(&body)).contains("'widget'"));
    }

    #[test]
    fn bad_data() {
        let body = HEADER.replace("00 00 00 00 00 00 00 21", "21") + TAIL;
        assert!(rule(&class(&body)).starts_with("invalid int data"));
        let body = HEADER.replace(r#"name="name" data="bytes""#, r#"name="name""#) + TAIL;
        assert!(rule(&class(&body)).contains("data=\"bytes\""));
    }

    #[test]
    fn unexpected_child() {
        let body = format!(
            r#"{}<o base="seq" name="attributes"/><o base="int" name="extra" data="bytes">--</o>"#,
            HEADER
        );
        assert!(matches!(
            validate(&parse(&class(&body)).unwrap()),
            Err(Error::SchemaViolation { .. })
        ));
    }

    #[test]
    fn reports_location() {
        let xml = format!(
            "<xmir>\n<program name=\"A\">\n<o base=\"class\" name=\"j$A\">\n{}\n<o base=\"seq\" name=\"attributes\">\n<o base=\"int\" data=\"bytes\">00</o>\n</o>\n</o></program></xmir>",
            HEADER
        );
        match validate(&parse(&xml).unwrap()) {
            Err(Error::SchemaViolation { path, line, .. }) => {
                assert_eq!(
                    path,
                    "/xmir/program[@name='A']/o[@name='j$A']/o[@name='attributes']/o[1]"
                );
                assert_eq!(line, 17);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
