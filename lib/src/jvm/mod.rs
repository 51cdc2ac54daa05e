//! Read and write JVM classes
//!
//! The [`class_file`] module maps one-to-one onto the binary class file format: constant pool
//! indices are left unresolved and attributes are kept as opaque byte blobs until they are parsed
//! on demand. Everything that needs to interpret bytecode (the decoder, the encoder, the
//! verifier) does so on top of these structures.
//!
//! ### Simple example
//!
//! ```
//! use xmir::jvm::class_file::{ClassFile, ConstantsPool, Version};
//! use xmir::jvm::ClassAccessFlags;
//!
//! # fn generate_class() -> Result<(), xmir::jvm::Error> {
//! let mut constants = ConstantsPool::new();
//! let this_class = constants.get_class("me/alec/Point")?;
//! let super_class = constants.get_class("java/lang/Object")?;
//!
//! let class_file = ClassFile {
//!     version: Version::JAVA11,
//!     constants: constants.into_offset_vec(),
//!     access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//!     this_class,
//!     super_class: Some(super_class),
//!     interfaces: vec![],
//!     fields: vec![],
//!     methods: vec![],
//!     attributes: vec![],
//! };
//! let class_bytes: Vec<u8> = class_file.to_bytes()?;
//! assert_eq!(ClassFile::parse(&class_bytes)?, class_file);
//! # Ok(())
//! # }
//! ```

mod access_flags;
pub mod class_file;
mod descriptors;
mod errors;
pub mod opcodes;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
