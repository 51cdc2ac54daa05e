//! Bytecode domain model
//!
//! Plain values mirroring the structure of a class file, with constant pool references resolved
//! into strings and bytecode offsets replaced by [`Label`]s. This is the hand-off point between
//! the decoders (class file bytes, IR documents) and the encoders. Nothing in here knows how it is
//! serialized.
//!
//! Equality is structural everywhere. Floating point values compare by bit pattern, so a `NaN`
//! constant is equal to itself and `0.0` is not equal to `-0.0`.

mod annotation;
mod class;
mod constant;
mod instruction;
mod label;
mod method;
mod module;

pub use annotation::*;
pub use class::*;
pub use constant::*;
pub use instruction::*;
pub use label::*;
pub use method::*;
pub use module::*;
