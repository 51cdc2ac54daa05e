//! Class file bytes to [`model`](crate::model)
//!
//! Decoding happens in two layers. [`ClassFile::parse`](crate::jvm::class_file::ClassFile::parse)
//! reads the binary layout, then [`read_class`] walks it and feeds resolved values to a
//! [`ClassVisitor`]. [`ClassBuilder`] is the visitor that accumulates a [`Class`].

mod annotations;
mod attributes;
mod builder;
pub(crate) mod code;
pub(crate) mod constants;
mod reader;
mod visitor;

pub use builder::*;
pub use reader::*;
pub use visitor::*;

use crate::jvm::Error;
use crate::model::Class;
use std::fmt;
use std::str::FromStr;

/// How much debug information to keep
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Keep line numbers, local variables, and the source file name
    #[default]
    Full,

    /// Drop line numbers, local variables, and the source file name
    Short,
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(mode: &str) -> Result<Mode, UnknownMode> {
        match mode {
            "full" | "debug" => Ok(Mode::Full),
            "short" => Ok(Mode::Short),
            other => Err(UnknownMode(other.to_owned())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Full => f.write_str("full"),
            Mode::Short => f.write_str("short"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown mode '{0}' (expected 'full', 'debug', or 'short')")]
pub struct UnknownMode(pub String);

/// Decode class file bytes into a class
pub fn decode_class(bytes: &[u8], mode: Mode) -> Result<Class, Error> {
    let mut builder = ClassBuilder::new();
    read_class(bytes, mode, &mut builder)?;
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!("full".parse::<Mode>().unwrap(), Mode::Full);
        assert_eq!("debug".parse::<Mode>().unwrap(), Mode::Full);
        assert_eq!("short".parse::<Mode>().unwrap(), Mode::Short);
        assert!("fast".parse::<Mode>().is_err());
        assert_eq!(Mode::Short.to_string(), "short");
    }
}
