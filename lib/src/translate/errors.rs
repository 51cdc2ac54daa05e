use crate::decode::UnknownMode;
use crate::jvm;
use crate::xmir;

/// Anything that can go wrong between class file bytes and IR documents
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Class file could not be read, written, or verified
    #[error(transparent)]
    Bytecode(#[from] jvm::Error),

    /// IR document is malformed or violates the schema
    #[error(transparent)]
    Document(#[from] xmir::Error),

    #[error("unsupported mode: {0}")]
    Mode(#[from] UnknownMode),
}

impl From<xmir::CodecError> for Error {
    fn from(err: xmir::CodecError) -> Error {
        Error::Document(xmir::Error::Codec(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Bytecode(jvm::Error::IoError(err))
    }
}
