//! [`model`](crate::model) to class file bytes
//!
//! [`write_class`] lays a [`Class`] out as a [`ClassFile`](crate::jvm::class_file::ClassFile):
//! it builds the constant pool, picks the shortest encoding of every instruction, patches jump
//! offsets, and computes `max_stack` and `max_locals`. Stack map frames are written as given,
//! never computed. [`verify`] re-reads the bytes and checks the method bodies.

mod annotations;
mod code;
mod constants;
mod flow;
mod verify;
mod writer;

pub use annotations::parse_type_path;
pub use flow::{max_stack, stack_effect, FlowError};
pub use verify::verify;
pub use writer::write_class;

use crate::jvm::class_file::Version;
use crate::jvm::Error;
use crate::model::Class;

/// Knobs for [`encode_class`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Class file version to write instead of the one recorded in the class
    pub target: Option<Version>,

    /// Re-read the written bytes and check the method bodies (on by default)
    pub verify: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            target: None,
            verify: true,
        }
    }
}

/// Encode a class into class file bytes
pub fn encode_class(class: &Class, options: &Options) -> Result<Vec<u8>, Error> {
    let class_file = write_class(class, options.target)?;
    let bytes = class_file.to_bytes()?;
    if options.verify {
        verify(&bytes)?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_class, Mode};
    use crate::jvm::opcodes::*;
    use crate::jvm::MethodAccessFlags;
    use crate::model::{Entry, Instruction, Method};

    #[test]
    fn encode_then_decode() {
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

        let options = Options::default();
        assert!(options.verify);
        let bytes = encode_class(&class, &options).unwrap();
        assert_eq!(decode_class(&bytes, Mode::Full).unwrap(), class);
        assert_eq!(encode_class(&class, &options).unwrap(), bytes);
    }
}
