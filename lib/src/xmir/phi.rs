//! Canonical object-calculus form of IR documents
//!
//! Downstream tools expect every object to be an application of a `Q.jeo.*` object, with data
//! passed in as a `Q.org.eolang.bytes` object. [`normalize`] rewrites a plain document into that
//! form and [`restore`] takes it back.

use crate::xmir::hex::is_data_type;
use crate::xmir::schema::violation;
use crate::xmir::xml::{Element, Node};
use crate::xmir::Error;

/// Prefix of every object kind in canonical form
pub const PREFIX: &str = "Q.jeo.";

/// Kind of the object carrying raw bytes
pub const BYTES: &str = "Q.org.eolang.bytes";

/// Is the document in canonical form?
pub fn is_phi(root: &Element) -> bool {
    root.elements()
        .any(|e| e.name == "program" && e.attribute("form") == Some("phi"))
}

/// Rewrite a plain document into canonical form
///
/// Comments and the listing are dropped.
pub fn normalize(root: &Element) -> Element {
    let mut out = shallow(root);
    for child in root.elements() {
        if child.name == "program" {
            let mut program = shallow(child);
            program.set_attribute("form", "phi");
            for object in child.elements().filter(|e| e.name == "o") {
                program.push(to_phi(object));
            }
            out.push(program);
        } else {
            out.push(child.clone());
        }
    }
    out
}

fn shallow(element: &Element) -> Element {
    let mut out = Element::new(element.name.as_str());
    out.attributes = element.attributes.clone();
    out.line = element.line;
    out.path = element.path.clone();
    out
}

fn to_phi(element: &Element) -> Element {
    let base = element.attribute("base").unwrap_or_default();
    let mut out = Element::new("o").with_attribute("base", format!("{}{}", PREFIX, base));
    for (key, value) in &element.attributes {
        if key != "base" && key != "data" {
            out.set_attribute(key, value.as_str());
        }
    }
    if element.attribute("data").is_some() {
        let mut bytes = Element::new("o")
            .with_attribute("base", BYTES)
            .with_attribute("data", "bytes");
        let text = element.text();
        if !text.is_empty() {
            bytes.push_text(text);
        }
        out.push(bytes);
    } else {
        for child in element.elements() {
            out.push(to_phi(child));
        }
    }
    out
}

/// Take a canonical document back to plain form
pub fn restore(root: &Element) -> Result<Element, Error> {
    let mut out = shallow(root);
    let mut seen_program = false;
    for child in root.elements() {
        if child.name != "program" {
            out.push(child.clone());
            continue;
        }
        seen_program = true;
        if child.attribute("form") != Some("phi") {
            return Err(violation(child, "program is not in phi form"));
        }
        let mut program = shallow(child);
        program.remove_attribute("form");
        for object in child.elements() {
            if object.name != "o" {
                let msg = format!("unexpected <{}> in phi form", object.name);
                return Err(violation(object, msg));
            }
            program.push(from_phi(object, true)?);
        }
        out.push(program);
    }
    if !seen_program {
        return Err(violation(root, "missing <program>"));
    }
    Ok(out)
}

fn from_phi(element: &Element, top: bool) -> Result<Element, Error> {
    if element.name != "o" {
        let msg = format!("expected an object, found <{}>", element.name);
        return Err(violation(element, msg));
    }
    let base = element.attribute("base").unwrap_or_default();
    let kind = base.strip_prefix(PREFIX).ok_or_else(|| {
        violation(element, format!("base '{}' is not a {} object", base, PREFIX))
    })?;
    if element.attribute("data").is_some() {
        return Err(violation(element, "data outside of a bytes object"));
    }
    if element.children.iter().any(|node| matches!(node, Node::Text(_))) {
        return Err(violation(element, "text outside of a bytes object"));
    }

    let mut out = shallow(element);
    out.attributes = vec![("base".to_owned(), kind.to_owned())];
    for (key, value) in &element.attributes {
        if key != "base" {
            out.attributes.push((key.clone(), value.clone()));
        }
    }

    let children: Vec<&Element> = element.elements().collect();
    if is_data_type(kind) && !top {
        let bytes = match children.as_slice() {
            [bytes]
                if bytes.attribute("base") == Some(BYTES)
                    && bytes.attribute("data") == Some("bytes")
                    && bytes.elements().next().is_none() =>
            {
                bytes
            }
            _ => {
                let msg = format!("{} object needs one bytes object", kind);
                return Err(violation(element, msg));
            }
        };
        out.set_attribute("data", "bytes");
        let text = bytes.text();
        if !text.is_empty() {
            out.push_text(text);
        }
    } else {
        for child in children {
            out.push(from_phi(child, false)?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmir::xml::parse;

    const PLAIN: &str = r#"<xmir><program name="A" package="">
        <listing>class A</listing>
        <o base="class" name="j$A">
          <o base="int" name="major" data="bytes">00 00 00 00 00 00 00 34</o>
          <o base="seq" name="interfaces"><!-- none --></o>
          <o base="seq" name="body"><o base="line" line="3"/></o>
        </o>
    </program></xmir>"#;

    #[test]
    fn canonical_layout() {
        let phi = normalize(&parse(PLAIN).unwrap());
        assert!(is_phi(&phi));
        let program = phi.elements().next().unwrap();
        let class = program.elements().next().unwrap();
        assert_eq!(class.attribute("base"), Some("Q.jeo.class"));

        let major = class.elements().next().unwrap();
        assert_eq!(major.attribute("base"), Some("Q.jeo.int"));
        assert_eq!(major.attribute("data"), None);
        let bytes = major.elements().next().unwrap();
        assert_eq!(bytes.attribute("base"), Some(BYTES));
        assert_eq!(bytes.text(), "00 00 00 00 00 00 00 34");

        let interfaces = class.elements().nth(1).unwrap();
        assert!(interfaces.children.is_empty());
    }

    #[test]
    fn restore_inverts_normalize() {
        let plain = parse(PLAIN).unwrap();
        let restored = restore(&normalize(&plain)).unwrap();
        assert!(!is_phi(&restored));
        let class = restored.elements().next().unwrap().elements().next().unwrap();
        assert_eq!(class.attribute("base"), Some("class"));
        let major = class.elements().next().unwrap();
        assert_eq!(major.attribute("data"), Some("bytes"));
        assert_eq!(major.text(), "00 00 00 00 00 00 00 34");
        let line = class.elements().nth(2).unwrap().elements().next().unwrap();
        assert_eq!(line.attribute("line"), Some("3"));
    }

    #[test]
    fn rejects_plain_input() {
        let plain = parse(PLAIN).unwrap();
        assert!(matches!(restore(&plain), Err(Error::SchemaViolation { .. })));

        let broken = r#"<xmir><program name="A" form="phi">
            <o base="Q.jeo.class"><o base="Q.jeo.int" name="major"/></o>
        </program></xmir>"#;
        match restore(&parse(broken).unwrap()) {
            Err(Error::SchemaViolation { rule, .. }) => {
                assert_eq!(rule, "int object needs one bytes object")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
