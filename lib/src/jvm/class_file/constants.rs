use crate::jvm::class_file::{Attribute, AttributeLike, Deserialize, Serialize};
use crate::jvm::{Error, UNKNOWN_CLASS};
use crate::util::{Offset, OffsetVec, Width};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;

/// Class file constants pool builder
///
/// The pool is append only and only after the pool is fully built up, it can be consumed into a
/// regular [`OffsetVec`]. Every `get_*` method returns the index of an existing equal constant if
/// there is one, so the pool never contains duplicates and its layout only depends on the order in
/// which constants were requested.
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<Utf8ConstantIndex, ClassConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, ConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<u32, ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<u64, ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    fieldrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex), ConstantIndex>,
    methodrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), ConstantIndex>,
    method_handles: HashMap<(HandleKind, ConstantIndex), ConstantIndex>,
    method_types: HashMap<Utf8ConstantIndex, ConstantIndex>,
    dynamics: HashMap<(u16, NameAndTypeConstantIndex), ConstantIndex>,
    invoke_dynamics: HashMap<(u16, NameAndTypeConstantIndex), ConstantIndex>,
    modules: HashMap<Utf8ConstantIndex, ConstantIndex>,
    packages: HashMap<Utf8ConstantIndex, ConstantIndex>,
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

macro_rules! get_or_insert {
    ($self:ident, $map:ident, $key:expr, $constant:expr, $wrap:expr) => {{
        let key = $key;
        if let Some(idx) = $self.$map.get(&key) {
            Ok(*idx)
        } else {
            let idx = $wrap($self.push_constant($constant)?);
            $self.$map.insert(key, idx);
            Ok(idx)
        }
    }};
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
            name_and_types: HashMap::new(),
            fieldrefs: HashMap::new(),
            methodrefs: HashMap::new(),
            method_handles: HashMap::new(),
            method_types: HashMap::new(),
            dynamics: HashMap::new(),
            invoke_dynamics: HashMap::new(),
            modules: HashMap::new(),
            packages: HashMap::new(),
        }
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let offset = self.constants.offset_len().0;
        if offset + constant.width() > u16::MAX as usize {
            return Err(ConstantPoolOverflow {
                constant,
                offset: offset as u16,
            });
        }

        self.constants.push(constant);
        Ok(ConstantIndex(offset as u16))
    }

    /// Consume the pool and return the final vector of constants
    pub fn into_offset_vec(self) -> OffsetVec<Constant> {
        self.constants
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8(&mut self, utf8: &str) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.utf8s.get(utf8) {
            Ok(*idx)
        } else {
            let constant = Constant::Utf8(utf8.to_owned());
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(utf8.to_owned(), idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant (binary name or array descriptor)
    pub fn get_class(&mut self, name: &str) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        let name = self.get_utf8(name)?;
        get_or_insert!(self, classes, name, Constant::Class(name), ClassConstantIndex)
    }

    /// Get or insert a string constant from the constant pool
    pub fn get_string(&mut self, string: &str) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let utf8 = self.get_utf8(string)?;
        get_or_insert!(self, strings, utf8, Constant::String(utf8), |idx| idx)
    }

    pub fn get_integer(&mut self, integer: i32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        get_or_insert!(self, integers, integer, Constant::Integer(integer), |idx| idx)
    }

    pub fn get_float(&mut self, float: f32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        get_or_insert!(self, floats, float.to_bits(), Constant::Float(float), |idx| idx)
    }

    pub fn get_long(&mut self, long: i64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        get_or_insert!(self, longs, long, Constant::Long(long), |idx| idx)
    }

    pub fn get_double(&mut self, double: f64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        get_or_insert!(self, doubles, double.to_bits(), Constant::Double(double), |idx| idx)
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let name = self.get_utf8(name)?;
        let descriptor = self.get_utf8(descriptor)?;
        get_or_insert!(
            self,
            name_and_types,
            (name, descriptor),
            Constant::NameAndType { name, descriptor },
            NameAndTypeConstantIndex
        )
    }

    pub fn get_field_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let class = self.get_class(owner)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        get_or_insert!(
            self,
            fieldrefs,
            (class, name_and_type),
            Constant::FieldRef(class, name_and_type),
            |idx| idx
        )
    }

    pub fn get_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let class = self.get_class(owner)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        get_or_insert!(
            self,
            methodrefs,
            (class, name_and_type, is_interface),
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            },
            |idx| idx
        )
    }

    /// Get or insert a method handle constant
    ///
    /// Field handles point to a `Fieldref`, the rest point to a (possibly interface) `Methodref`.
    pub fn get_method_handle(
        &mut self,
        handle_kind: HandleKind,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let member = if handle_kind.is_field() {
            self.get_field_ref(owner, name, descriptor)?
        } else {
            self.get_method_ref(owner, name, descriptor, is_interface)?
        };
        get_or_insert!(
            self,
            method_handles,
            (handle_kind, member),
            Constant::MethodHandle {
                handle_kind,
                member,
            },
            |idx| idx
        )
    }

    pub fn get_method_type(&mut self, descriptor: &str) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let descriptor = self.get_utf8(descriptor)?;
        get_or_insert!(
            self,
            method_types,
            descriptor,
            Constant::MethodType { descriptor },
            |idx| idx
        )
    }

    /// Get or insert a dynamically-computed constant
    pub fn get_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        get_or_insert!(
            self,
            dynamics,
            (bootstrap_method, name_and_type),
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            },
            |idx| idx
        )
    }

    /// Get or insert an invoke dynamic constant from the constant pool
    pub fn get_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        get_or_insert!(
            self,
            invoke_dynamics,
            (bootstrap_method, name_and_type),
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            },
            |idx| idx
        )
    }

    pub fn get_module(&mut self, name: &str) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let name = self.get_utf8(name)?;
        get_or_insert!(self, modules, name, Constant::Module(name), |idx| idx)
    }

    pub fn get_package(&mut self, name: &str) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let name = self.get_utf8(name)?;
        get_or_insert!(self, packages, name, Constant::Package(name), |idx| idx)
    }

    /// Add an attribute to the constant pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let mut info = vec![];

        attribute.serialize(&mut info)?;

        Ok(Attribute { name_index, info })
    }
}

#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: u16,
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// Depending on the method kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Module (only in `module-info` classes)
    Module(Utf8ConstantIndex),

    /// Package exported or opened by a module
    Package(Utf8ConstantIndex),
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.to_bits().serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.to_bits().serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(bytes) => {
                8u8.serialize(writer)?;
                bytes.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                17u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::Module(name) => {
                19u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::Package(name) => {
                20u8.serialize(writer)?;
                name.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for Constant {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let tag = u8::deserialize(reader)?;
        let constant = match tag {
            1 => {
                let len = u16::deserialize(reader)? as usize;
                let bytes = super::read_bytes(reader, len)?;
                let string = decode_modified_utf8(&bytes).ok_or_else(|| {
                    Error::malformed(UNKNOWN_CLASS, "invalid modified UTF-8 constant")
                })?;
                Constant::Utf8(string)
            }
            3 => Constant::Integer(i32::deserialize(reader)?),
            4 => Constant::Float(f32::from_bits(u32::deserialize(reader)?)),
            5 => Constant::Long(i64::deserialize(reader)?),
            6 => Constant::Double(f64::from_bits(u64::deserialize(reader)?)),
            7 => Constant::Class(Utf8ConstantIndex::deserialize(reader)?),
            8 => Constant::String(Utf8ConstantIndex::deserialize(reader)?),
            9 => Constant::FieldRef(
                ClassConstantIndex::deserialize(reader)?,
                NameAndTypeConstantIndex::deserialize(reader)?,
            ),
            10 | 11 => Constant::MethodRef {
                class: ClassConstantIndex::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: Utf8ConstantIndex::deserialize(reader)?,
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            15 => Constant::MethodHandle {
                handle_kind: HandleKind::deserialize(reader)?,
                member: ConstantIndex::deserialize(reader)?,
            },
            16 => Constant::MethodType {
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            17 => Constant::Dynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            19 => Constant::Module(Utf8ConstantIndex::deserialize(reader)?),
            20 => Constant::Package(Utf8ConstantIndex::deserialize(reader)?),
            other => {
                let msg = format!("unknown constant pool tag {}", other);
                return Err(Error::malformed(UNKNOWN_CLASS, msg));
            }
        };
        Ok(constant)
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        // Handle the exception for how `\u{0000}` is represented
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters: main divergence from unicode
            _ => {
                buffer.push(0b1110_1101);
                buffer.push(((code >> 16 & 0x0F) as u8).wrapping_sub(1) & 0x0F | 0b1010_0000);
                buffer.push((code >> 10 & 0x3F) as u8 | 0b1000_0000);

                buffer.push(0b1110_1101);
                buffer.push(((code >> 6 & 0x0F) as u8) | 0b1011_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Surrogate pairs are recombined into supplementary characters. Unpaired surrogates have no
/// representation in a Rust string and are replaced with `U+FFFD`.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        if b0 & 0x80 == 0 && b0 != 0 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *bytes.get(i + 1)? as u16;
            if b1 & 0xC0 != 0x80 {
                return None;
            }
            units.push((b0 & 0x1F) << 6 | (b1 & 0x3F));
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *bytes.get(i + 1)? as u16;
            let b2 = *bytes.get(i + 2)? as u16;
            if b1 & 0xC0 != 0x80 || b2 & 0xC0 != 0x80 {
                return None;
            }
            units.push((b0 & 0x0F) << 12 | (b1 & 0x3F) << 6 | (b2 & 0x3F));
            i += 3;
        } else {
            return None;
        }
    }
    Some(
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    )
}

#[cfg(test)]
mod encode_modified_utf8_tests {
    use super::*;

    #[test]
    fn containing_null_byte() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
    }

    #[test]
    fn simple_ascii() {
        assert_eq!(encode_modified_utf8("foo"), vec![102, 111, 111]);
        assert_eq!(
            encode_modified_utf8("hel10_World"),
            vec![104, 101, 108, 49, 48, 95, 87, 111, 114, 108, 100]
        );
    }

    #[test]
    fn two_and_three_byte_encodings() {
        assert_eq!(
            encode_modified_utf8("ĄǍǞ"),
            vec![196, 132, 199, 141, 199, 158]
        );
        assert_eq!(
            encode_modified_utf8("ऄअॲ"),
            vec![224, 164, 132, 224, 164, 133, 224, 165, 178]
        );
    }

    #[test]
    fn supplementary_characters() {
        assert_eq!(
            encode_modified_utf8("\u{10000}\u{dffff}\u{10FFFF}"),
            vec![
                237, 160, 128, 237, 176, 128, 237, 172, 191, 237, 191, 191, 237, 175, 191, 237,
                191, 191
            ]
        );
    }
}

#[cfg(test)]
mod decode_modified_utf8_tests {
    use super::*;

    #[test]
    fn inverts_encoding() {
        for text in ["", "foo", "a\x00a", "ĄǍǞ ऄअॲ", "\u{10000}\u{dffff}\u{10FFFF}"] {
            assert_eq!(
                decode_modified_utf8(&encode_modified_utf8(text)).as_deref(),
                Some(text)
            );
        }
    }

    #[test]
    fn rejects_raw_null_and_truncation() {
        assert_eq!(decode_modified_utf8(&[97, 0]), None);
        assert_eq!(decode_modified_utf8(&[224, 164]), None);
        assert_eq!(decode_modified_utf8(&[0xF0, 0x9F, 0x98, 0x80]), None);
    }

    #[test]
    fn lone_surrogate_is_replaced() {
        assert_eq!(
            decode_modified_utf8(&[237, 160, 128]).as_deref(),
            Some("\u{FFFD}")
        );
    }
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. From the
/// JVM specification:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
/// >
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Pool serializes as `constant_pool_count` (one more than the last usable index) followed by the
/// constants
impl Serialize for OffsetVec<Constant> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.offset_len().0 as u16).serialize(writer)?;
        for (_, _, constant) in self.iter() {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for OffsetVec<Constant> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let count = u16::deserialize(reader)? as usize;
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < count {
            constants.push(Constant::deserialize(reader)?);
        }
        if constants.offset_len().0 != count {
            let msg = "wide constant overflows the constant pool count";
            return Err(Error::malformed(UNKNOWN_CLASS, msg));
        }
        Ok(constants)
    }
}

/// Typed lookups into a parsed constant pool
///
/// Each lookup fails with a `MalformedClass` error when the index is out of range or points at a
/// constant of the wrong kind.
pub trait ConstantsReader {
    fn constant(&self, index: ConstantIndex) -> Result<&Constant, Error>;

    fn utf8(&self, index: Utf8ConstantIndex) -> Result<&str, Error> {
        match self.constant(index.0)? {
            Constant::Utf8(string) => Ok(string),
            other => Err(wrong_kind(index.0, "Utf8", other)),
        }
    }

    fn class_name(&self, index: ClassConstantIndex) -> Result<&str, Error> {
        match self.constant(index.0)? {
            Constant::Class(name) => self.utf8(*name),
            other => Err(wrong_kind(index.0, "Class", other)),
        }
    }

    fn name_and_type(&self, index: NameAndTypeConstantIndex) -> Result<(&str, &str), Error> {
        match self.constant(index.0)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            other => Err(wrong_kind(index.0, "NameAndType", other)),
        }
    }

    /// Owner, name, and descriptor of a `Fieldref`
    fn field_ref(&self, index: ConstantIndex) -> Result<(&str, &str, &str), Error> {
        match self.constant(index)? {
            Constant::FieldRef(class, name_and_type) => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((self.class_name(*class)?, name, descriptor))
            }
            other => Err(wrong_kind(index, "Fieldref", other)),
        }
    }

    /// Owner, name, descriptor, and interface-ness of a `Methodref` or `InterfaceMethodref`
    fn method_ref(&self, index: ConstantIndex) -> Result<(&str, &str, &str, bool), Error> {
        match self.constant(index)? {
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((self.class_name(*class)?, name, descriptor, *is_interface))
            }
            other => Err(wrong_kind(index, "Methodref", other)),
        }
    }

    fn module_name(&self, index: ConstantIndex) -> Result<&str, Error> {
        match self.constant(index)? {
            Constant::Module(name) => self.utf8(*name),
            other => Err(wrong_kind(index, "Module", other)),
        }
    }

    fn package_name(&self, index: ConstantIndex) -> Result<&str, Error> {
        match self.constant(index)? {
            Constant::Package(name) => self.utf8(*name),
            other => Err(wrong_kind(index, "Package", other)),
        }
    }
}

impl ConstantsReader for OffsetVec<Constant> {
    fn constant(&self, index: ConstantIndex) -> Result<&Constant, Error> {
        self.get_offset(Offset(index.0 as usize)).ok_or_else(|| {
            let msg = format!("invalid constant pool index {}", index.0);
            Error::malformed(UNKNOWN_CLASS, msg)
        })
    }
}

fn wrong_kind(index: ConstantIndex, expected: &str, found: &Constant) -> Error {
    let msg = format!(
        "constant pool index {} should be {} but is {:?}",
        index.0, expected, found
    );
    Error::malformed(UNKNOWN_CLASS, msg)
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct ConstantIndex(pub u16);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ConstantIndex(u16::deserialize(reader)?))
    }
}

/// Index `0` is never a valid constant, so it is used to encode an absent optional index
impl Serialize for Option<ConstantIndex> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.map_or(0, |idx| idx.0).serialize(writer)
    }
}

impl Deserialize for Option<ConstantIndex> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let idx = u16::deserialize(reader)?;
        Ok(if idx == 0 { None } else { Some(ConstantIndex(idx)) })
    }
}

macro_rules! typed_constant_index {
    ($($name:ident),*) => {
        $(
            #[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
            pub struct $name(pub ConstantIndex);

            impl From<$name> for ConstantIndex {
                fn from(index: $name) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $name {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }

            impl Deserialize for $name {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                    Ok($name(ConstantIndex::deserialize(reader)?))
                }
            }

            impl Serialize for Option<$name> {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.map(|idx| idx.0).serialize(writer)
                }
            }

            impl Deserialize for Option<$name> {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                    Ok(Option::<ConstantIndex>::deserialize(reader)?.map($name))
                }
            }
        )*
    };
}

typed_constant_index!(Utf8ConstantIndex, ClassConstantIndex, NameAndTypeConstantIndex);

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl HandleKind {
    /// Reference kind tag as it appears in the class file
    pub fn tag(self) -> u8 {
        match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        }
    }

    pub fn from_tag(tag: u8) -> Option<HandleKind> {
        let kind = match tag {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            _ => return None,
        };
        Some(kind)
    }

    /// Does the handle refer to a field (as opposed to a method)?
    pub fn is_field(self) -> bool {
        self.tag() <= 4
    }
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.tag().serialize(writer)
    }
}

impl Deserialize for HandleKind {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let tag = u8::deserialize(reader)?;
        HandleKind::from_tag(tag).ok_or_else(|| {
            Error::malformed(UNKNOWN_CLASS, format!("invalid method handle kind {}", tag))
        })
    }
}

#[cfg(test)]
mod pool_tests {
    use super::*;

    #[test]
    fn deduplicates_and_accounts_for_wide_constants() {
        let mut pool = ConstantsPool::new();
        let object = pool.get_class("java/lang/Object").unwrap();
        assert_eq!(object, ClassConstantIndex(ConstantIndex(2)));
        assert_eq!(pool.get_class("java/lang/Object").unwrap(), object);

        let long = pool.get_long(7).unwrap();
        assert_eq!(long, ConstantIndex(3));
        let after = pool.get_integer(7).unwrap();
        assert_eq!(after, ConstantIndex(5));
        assert_eq!(pool.get_long(7).unwrap(), long);

        let nan = pool.get_float(f32::NAN).unwrap();
        assert_eq!(pool.get_float(f32::NAN).unwrap(), nan);
    }

    #[test]
    fn pool_round_trips_through_bytes() {
        let mut pool = ConstantsPool::new();
        pool.get_method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V", false)
            .unwrap();
        pool.get_double(1.5).unwrap();
        pool.get_string("hello").unwrap();
        let constants = pool.into_offset_vec();

        let mut bytes = vec![];
        constants.serialize(&mut bytes).unwrap();
        let mut input: &[u8] = &bytes;
        let parsed = OffsetVec::<Constant>::deserialize(&mut input).unwrap();
        assert_eq!(parsed, constants);

        let (owner, name, descriptor, is_interface) =
            parsed.method_ref(ConstantIndex(6)).unwrap();
        assert_eq!(owner, "java/io/PrintStream");
        assert_eq!(name, "println");
        assert_eq!(descriptor, "(Ljava/lang/String;)V");
        assert!(!is_interface);
    }

    #[test]
    fn lookups_check_kinds() {
        let mut pool = ConstantsPool::new();
        let utf8 = pool.get_utf8("x").unwrap();
        let constants = pool.into_offset_vec();
        assert!(constants.utf8(utf8).is_ok());
        assert!(constants.class_name(ClassConstantIndex(utf8.0)).is_err());
        assert!(constants.constant(ConstantIndex(0)).is_err());
        assert!(constants.constant(ConstantIndex(9)).is_err());
    }
}
