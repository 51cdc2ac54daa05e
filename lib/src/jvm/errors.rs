use crate::jvm::class_file::Constant;

/// Class name used in errors raised before `this_class` has been resolved
pub const UNKNOWN_CLASS: &str = "<unknown>";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Class file bytes are not a well-formed class
    #[error("malformed class '{class}': {message}")]
    MalformedClass { class: String, message: String },

    /// Constant pool has no space left for another entry
    #[error("constant pool overflow at offset {offset} (inserting {constant:?})")]
    ConstantPoolOverflow { constant: Constant, offset: u16 },

    /// A jump target is too far away to be encoded in a 16-bit branch offset
    #[error("branch offset {offset} in method '{method}' does not fit in 16 bits")]
    BranchOffsetOverflow { method: String, offset: i64 },

    /// Method body exceeds the 65535 byte limit on code arrays
    #[error("code of method '{method}' is {size} bytes long")]
    MethodCodeOverflow { method: String, size: usize },

    /// Emitted class failed to pass the structural self-check
    #[error("verification of method '{method}' failed at instruction {index}: {message}")]
    Verification {
        method: String,
        index: usize,
        message: String,
    },

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl Error {
    pub fn malformed(class: impl Into<String>, message: impl Into<String>) -> Error {
        Error::MalformedClass {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Attach a class name to a `MalformedClass` error that doesn't have one yet
    ///
    /// Truncated input surfaces as an IO error from the reader, so that gets turned into a
    /// `MalformedClass` error too.
    pub fn in_class(self, class: &str) -> Error {
        match self {
            Error::MalformedClass {
                class: unknown,
                message,
            } if unknown == UNKNOWN_CLASS => Error::malformed(class, message),
            Error::IoError(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                Error::malformed(class, "unexpected end of class file")
            }
            other => other,
        }
    }
}

impl From<crate::jvm::class_file::ConstantPoolOverflow> for Error {
    fn from(overflow: crate::jvm::class_file::ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow {
            constant: overflow.constant,
            offset: overflow.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_names_the_class() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        match Error::IoError(eof).in_class("a/B") {
            Error::MalformedClass { class, .. } => assert_eq!(class, "a/B"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn known_class_is_kept() {
        let err = Error::malformed("x/Y", "bad").in_class("a/B");
        assert_eq!(err.to_string(), "malformed class 'x/Y': bad");
    }
}
