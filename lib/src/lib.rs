//! Translate JVM class files to and from XMIR, an XML intermediate representation
//!
//! The pipeline has three layers:
//!
//!   * [`jvm`] reads and writes the binary class file format
//!   * [`decode`] and [`encode`] map between class files and the [`model`] of a class, resolving
//!     constant pool references, labels, and instruction encodings
//!   * [`xmir`] maps between the model and IR documents, including the canonical `Q.jeo.*` form
//!
//! [`translate`] strings them together.
//!
//! ```
//! use xmir::translate::{assemble, disassemble, Settings};
//! use xmir::model::Class;
//!
//! # fn main() -> Result<(), xmir::translate::Error> {
//! let class = Class::new("demo/Empty", Some("java/lang/Object"));
//! let bytes = xmir::encode::encode_class(&class, &Default::default())?;
//! let document = disassemble(&bytes, &Settings::default())?;
//! assert_eq!(assemble(&document, &Settings::default())?, bytes);
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod encode;
pub mod jvm;
pub mod model;
pub mod translate;
mod util;
pub mod xmir;
