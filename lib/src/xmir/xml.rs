//! Minimal owned XML tree, read and written with `quick-xml`
//!
//! Parsed elements remember the line of their start tag and a readable path from the root, so
//! that schema violations can point at the offending node.

use crate::xmir::Error;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,

    /// Attributes, in document order
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,

    /// Line of the start tag (`0` for elements built in memory)
    pub line: usize,

    /// Location from the root, eg. `/xmir/program/o[@name='j$Foo']/o[2]`
    pub path: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Element {
        Element {
            name: name.into(),
            attributes: vec![],
            children: vec![],
            line: 0,
            path: String::new(),
        }
    }

    /// Builder-style [`Element::set_attribute`]
    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Element {
        self.set_attribute(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Element {
        self.push(child);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    pub fn push_comment(&mut self, comment: impl Into<String>) {
        self.children.push(Node::Comment(comment.into()));
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_owned(), value)),
        }
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(idx).1)
    }

    /// Child elements, skipping text and comments
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Concatenated text children
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                text.push_str(t);
            }
        }
        text
    }
}

/// Parse a document into its root element
///
/// Whitespace-only text is dropped. The XML declaration, processing instructions, and the
/// doctype are ignored.
pub fn parse(xml: &str) -> Result<Element, Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut lines = LineCounter::default();
    let mut stack: Vec<Element> = vec![];
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(start) => {
                let line = lines.line_at(xml, position);
                let element = open(&reader, &start, line, &stack, &root)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let line = lines.line_at(xml, position);
                let element = open(&reader, &start, line, &stack, &root)?;
                close(element, &mut stack, &mut root);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    close(element, &mut stack, &mut root);
                }
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(text.unescape()?.into_owned());
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(reader.decoder().decode(&data)?.into_owned());
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_comment(reader.decoder().decode(&comment)?.trim());
                }
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => (),
            Event::Eof => break,
        }
    }

    root.ok_or_else(|| Error::SchemaViolation {
        path: "/".to_owned(),
        line: 1,
        rule: "document has no root element".to_owned(),
    })
}

fn open(
    reader: &Reader<&[u8]>,
    start: &BytesStart,
    line: usize,
    stack: &[Element],
    root: &Option<Element>,
) -> Result<Element, Error> {
    let name = reader.decoder().decode(start.name().as_ref())?.into_owned();
    if let Some(root) = root {
        return Err(Error::SchemaViolation {
            path: root.path.clone(),
            line,
            rule: format!("element '{}' after the root element", name),
        });
    }

    let mut element = Element::new(name);
    element.line = line;
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::InvalidAttr)?;
        let key = reader.decoder().decode(attribute.key.as_ref())?;
        let value = attribute.unescape_value()?;
        element.attributes.push((key.into_owned(), value.into_owned()));
    }

    let segment = match (element.attribute("name"), stack.last()) {
        (Some(name), _) => format!("{}[@name='{}']", element.name, name),
        (None, Some(parent)) if element.name == "o" => {
            format!("o[{}]", parent.elements().count() + 1)
        }
        _ => element.name.clone(),
    };
    let parent_path = stack.last().map_or("", |parent| parent.path.as_str());
    element.path = format!("{}/{}", parent_path, segment);
    Ok(element)
}

fn close(element: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.push(element),
        None => *root = Some(element),
    }
}

/// Maps byte offsets to line numbers, for offsets visited in increasing order
#[derive(Default)]
struct LineCounter {
    offset: usize,
    line: usize,
}

impl LineCounter {
    fn line_at(&mut self, xml: &str, position: usize) -> usize {
        // Offset is before the whitespace that precedes the tag
        let bytes = xml.as_bytes();
        let mut start = position.min(bytes.len());
        while start < bytes.len() && bytes[start].is_ascii_whitespace() {
            start += 1;
        }
        if start >= self.offset {
            self.line += bytes[self.offset..start]
                .iter()
                .filter(|b| **b == b'\n')
                .count();
            self.offset = start;
        }
        self.line + 1
    }
}

/// Write a document, indented by two spaces, with an XML declaration
pub fn write(root: &Element) -> Result<String, Error> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, root)?;
    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes)
        .map_err(|err| Error::Xml(quick_xml::Error::NonDecodable(Some(err.utf8_error()))))
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, element: &Element) -> Result<(), Error> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for node in &element.children {
        match node {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Node::Comment(comment) => {
                let comment = format!(" {} ", comment_text(comment));
                writer.write_event(Event::Comment(BytesText::from_escaped(comment)))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

/// Comment text with no "--" in it, so that it can not end the comment early
fn comment_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '-' && out.ends_with('-') {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xmir>
  <program name="Foo">
    <!-- note -->
    <o base="class" name="j$Foo">
      <o base="int" data="bytes">00 01</o>
      <o base="seq"/>
    </o>
  </program>
</xmir>
"#;

    #[test]
    fn parse_tracks_lines_and_paths() {
        let root = parse(DOC).unwrap();
        assert_eq!(root.name, "xmir");
        assert_eq!(root.line, 2);
        let program = root.elements().next().unwrap();
        assert_eq!(program.attribute("name"), Some("Foo"));
        assert_eq!(program.line, 3);
        assert!(matches!(&program.children[0], Node::Comment(c) if c == "note"));

        let class = program.elements().next().unwrap();
        assert_eq!(class.path, "/xmir/program[@name='Foo']/o[@name='j$Foo']");
        let children: Vec<&Element> = class.elements().collect();
        assert_eq!(children[0].text(), "00 01");
        assert_eq!(children[0].line, 6);
        assert_eq!(children[1].path, "/xmir/program[@name='Foo']/o[@name='j$Foo']/o[2]");
        assert_eq!(children[1].line, 7);
    }

    #[test]
    fn write_then_parse() {
        let mut data = Element::new("o").with_attribute("base", "string");
        data.push_text("3C 26");
        let mut root = Element::new("xmir").with_child(
            Element::new("o")
                .with_attribute("base", "seq")
                .with_attribute("name", "a<b")
                .with_child(data),
        );
        root.push_comment("#1:x--y");

        let xml = write(&root).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("name=\"a&lt;b\""), "{}", xml);
        assert!(xml.contains(">3C 26</o>"), "{}", xml);
        assert!(xml.contains("<!-- #1:x- -y -->"), "{}", xml);
        assert_eq!(parsed_comments(&xml), vec!["#1:x- -y"]);

        let parsed = parse(&xml).unwrap();
        let seq = parsed.elements().next().unwrap();
        assert_eq!(seq.attribute("name"), Some("a<b"));
        assert_eq!(seq.elements().next().unwrap().text(), "3C 26");
    }

    fn parsed_comments(xml: &str) -> Vec<String> {
        parse(xml)
            .unwrap()
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Comment(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn dashes_can_not_close_comments() {
        assert_eq!(comment_text("a---b"), "a- - -b");
        assert_eq!(comment_text("end-"), "end-");

        let mut root = Element::new("xmir");
        root.push_comment(r#"ldc("a--->b <o base="x"/>")"#);
        root.push_comment("----");
        let xml = write(&root).unwrap();
        assert!(!xml.contains("--->"), "{}", xml);
        assert_eq!(
            parsed_comments(&xml),
            vec![r#"ldc("a- - ->b <o base="x"/>")"#, "- - - -"]
        );
        assert_eq!(parse(&xml).unwrap().elements().count(), 0);
    }

    #[test]
    fn malformed_documents() {
        assert!(matches!(parse("<a><b></a>"), Err(Error::Xml(_))));
        assert!(matches!(parse(""), Err(Error::SchemaViolation { .. })));
        assert!(matches!(
            parse("<a/><b/>"),
            Err(Error::SchemaViolation { .. })
        ));
    }
}
