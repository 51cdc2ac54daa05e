//! Binary layout of class files
//!
//! Everything here maps one-to-one onto the structures of the class file format, with constant
//! pool indices left unresolved.

mod attribute;
mod class;
mod constants;
mod field;
mod method;
mod serialize;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use serialize::*;
pub use version::*;
