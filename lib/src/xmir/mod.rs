//! XML intermediate representation (XMIR) of a [`Program`]
//!
//! A document has one `<program>` holding one class object. Objects are `<o>` elements: the
//! `base` attribute says what kind of object it is, leaves carry their value as hex bytes (see
//! [`hex`]), and names are made safe with the codecs in [`names`]. The layout is checked by
//! [`schema`] before anything is decoded.
//!
//! ```xml
//! <xmir>
//!   <program name="Hello" package="demo">
//!     <o base="class" name="j$demo/j$Hello">
//!       <o base="int" name="major" data="bytes">00 00 00 00 00 00 00 34</o>
//!       ...
//! ```

mod decoder;
mod encoder;
mod errors;
pub mod hex;
mod listing;
pub mod names;
pub mod phi;
pub mod schema;
pub mod xml;

pub use decoder::decode;
pub use encoder::{encode, Options};
pub use errors::{CodecError, Error};
pub use listing::{describe, Listing};

use crate::model::Program;

/// Write a program as an IR document
pub fn to_xml(program: &Program, options: &Options) -> Result<String, Error> {
    log::debug!("writing IR of class {}", program.class.name);
    let root = encode(program, options)?;
    xml::write(&root)
}

/// Read a program from a plain (not canonical) IR document
pub fn from_xml(document: &str) -> Result<Program, Error> {
    let root = xml::parse(document)?;
    let program = decode(&root)?;
    log::debug!("read IR of class {}", program.class.name);
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::opcodes::*;
    use crate::jvm::MethodAccessFlags;
    use crate::model::{Class, Entry, Instruction, Method};
    use pretty_assertions::assert_eq;

    #[test]
    fn document_round_trip() {
        let mut class = Class::new("demo/Hello", Some("java/lang/Object"));
        let mut method = Method::new(MethodAccessFlags::STATIC, "<clinit>", "()V");
        method.body = vec![Entry::Instruction(Instruction::Simple(RETURN))];
        class.methods.push(method);
        let program = Program::new(class);

        let options = Options {
            comments: true,
            listing: Listing::Full,
        };
        let document = to_xml(&program, &options).unwrap();
        assert!(document.contains("name=\"j$class@clinit@-%28%29V\""), "{}", document);
        assert!(document.contains("<!-- #177:return() -->"), "{}", document);
        assert_eq!(from_xml(&document).unwrap(), program);

        // Documentation never changes what is decoded
        let bare = to_xml(&program, &Options::default()).unwrap();
        assert_eq!(from_xml(&bare).unwrap(), from_xml(&document).unwrap());
    }

    #[test]
    fn canonical_form_decodes_the_same() {
        let program = Program::new(Class::new("demo/Empty", Some("java/lang/Object")));
        let document = to_xml(&program, &Options::default()).unwrap();
        let root = xml::parse(&document).unwrap();
        let canonical = phi::normalize(&root);
        assert_ne!(xml::write(&canonical).unwrap(), document);
        let restored = phi::restore(&canonical).unwrap();
        assert_eq!(decode(&restored).unwrap(), decode(&root).unwrap());
    }
}
