//! Whole-file translation between class file bytes and IR documents
//!
//! These are the entry points the command line tool is built on: each one takes the raw input
//! (bytes or text) and a [`Settings`], and runs the decoder and encoder of the two formats back
//! to back.

mod errors;
mod settings;

pub use errors::*;
pub use settings::*;

use crate::decode::decode_class;
use crate::encode::{self, encode_class};
use crate::model::Program;
use crate::xmir::{self, phi, xml};

/// Translate class file bytes into a plain IR document
pub fn disassemble(bytes: &[u8], settings: &Settings) -> Result<String, Error> {
    let class = decode_class(bytes, settings.mode)?;
    log::debug!("disassembling {} ({} mode)", class.name, settings.mode);
    let options = xmir::Options {
        comments: settings.comments,
        listing: settings.listing,
    };
    Ok(xmir::to_xml(&Program::new(class), &options)?)
}

/// Translate an IR document, plain or canonical, into class file bytes
pub fn assemble(document: &str, settings: &Settings) -> Result<Vec<u8>, Error> {
    let mut root = xml::parse(document)?;
    if phi::is_phi(&root) {
        log::trace!("restoring canonical document");
        root = phi::restore(&root)?;
    }
    let program = xmir::decode(&root)?;
    log::debug!("assembling {}", program.class.name);
    let options = encode::Options {
        target: settings.target,
        verify: settings.verify,
    };
    Ok(encode_class(&program.class, &options)?)
}

/// Rewrite a plain IR document into canonical form
pub fn to_phi(document: &str) -> Result<String, Error> {
    let root = xml::parse(document)?;
    Ok(xml::write(&phi::normalize(&root))?)
}

/// Rewrite a canonical IR document back into plain form
pub fn from_phi(document: &str) -> Result<String, Error> {
    let root = xml::parse(document)?;
    Ok(xml::write(&phi::restore(&root)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Mode;
    use crate::jvm::opcodes::*;
    use crate::jvm::MethodAccessFlags;
    use crate::model::{Class, Entry, Instruction, Method};
    use crate::xmir::Listing;

    fn empty_class() -> Vec<u8> {
        let mut class = Class::new("demo/Empty", Some("java/lang/Object"));
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
        class.methods.push(init);
        encode_class(&class, &encode::Options::default()).unwrap()
    }

    #[test]
    fn bytes_survive_the_document() {
        let bytes = empty_class();
        let settings = Settings::default();
        let document = disassemble(&bytes, &settings).unwrap();
        assert!(document.contains("<program name=\"Empty\" package=\"demo\">"), "{}", document);
        assert_eq!(assemble(&document, &settings).unwrap(), bytes);
    }

    #[test]
    fn canonical_documents_assemble() {
        let bytes = empty_class();
        let settings = Settings::new(Mode::Full)
            .with_comments(true)
            .with_listing(Listing::Summary);
        let document = disassemble(&bytes, &settings).unwrap();
        let canonical = to_phi(&document).unwrap();
        assert!(canonical.contains("form=\"phi\""));
        assert!(!canonical.contains("<listing>"));
        assert_eq!(assemble(&canonical, &settings).unwrap(), bytes);

        let plain = from_phi(&canonical).unwrap();
        assert_eq!(assemble(&plain, &settings).unwrap(), bytes);
        assert!(matches!(from_phi(&document), Err(Error::Document(_))));
    }

    #[test]
    fn errors_name_their_layer() {
        let err = disassemble(&[0xCA, 0xFE], &Settings::default()).unwrap_err();
        assert!(matches!(err, Error::Bytecode(_)), "{:?}", err);

        let err = assemble("<xmir/>", &Settings::default()).unwrap_err();
        assert!(matches!(err, Error::Document(_)), "{:?}", err);

        let err: Error = "fast".parse::<Mode>().unwrap_err().into();
        assert_eq!(
            err.to_string(),
            "unsupported mode: unknown mode 'fast' (expected 'full', 'debug', or 'short')"
        );
    }
}
