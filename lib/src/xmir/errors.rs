/// Value that one of the name or data codecs cannot translate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("odd number of hex digits in '{0}'")]
    OddDigits(String),

    #[error("invalid hex digit in '{0}'")]
    InvalidDigit(String),

    #[error("{kind} data needs {expected} bytes, but '{data}' has {actual}")]
    WrongWidth {
        kind: &'static str,
        expected: usize,
        actual: usize,
        data: String,
    },

    #[error("{value} is out of range for {kind}")]
    OutOfRange { kind: &'static str, value: i64 },

    #[error("invalid UTF-8 in '{0}'")]
    InvalidUtf8(String),

    #[error("unknown data type '{0}'")]
    UnknownType(String),

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("invalid encoded string '{0}'")]
    InvalidEncoding(String),

    #[error("signature '{0}' has no '-' separator")]
    InvalidSignature(String),

    #[error("Number must be greater than 0, but was: {0}")]
    InvalidNumber(i64),

    #[error("Invalid number in name: {0}")]
    InvalidSuffix(String),
}

/// Failure to read or write an IR document
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Document is well-formed XML but not a valid IR document
    #[error("schema violation at {path} (line {line}): {rule}")]
    SchemaViolation {
        path: String,
        line: usize,
        rule: String,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),
}
