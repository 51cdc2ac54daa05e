use crate::jvm::class_file::{
    read_bytes, ClassConstantIndex, ConstantIndex, Deserialize, NameAndTypeConstantIndex,
    Serialize, Utf8ConstantIndex,
};
use crate::jvm::{
    Error, InnerClassAccessFlags, ModuleAccessFlags, ParameterAccessFlags, UNKNOWN_CLASS,
};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Error as IoError, ErrorKind};

/// Attributes (used in classes, fields, methods, and even on some attributes)
///
/// The representation is designed to be easily extended with custom attributes.
/// While some attributes aren't essential, others are really important (eg. the
/// code attribute for including the actual bytecode).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name_index: Utf8ConstantIndex,
    pub info: Vec<u8>,
}

impl Attribute {
    /// Parse the attribute payload as a known attribute
    ///
    /// The whole payload must be consumed.
    pub fn parse<A: AttributeLike>(&self) -> Result<A, Error> {
        let mut reader: &[u8] = &self.info;
        let attribute = A::deserialize(&mut reader).map_err(|err| match err {
            Error::IoError(io) if io.kind() == ErrorKind::UnexpectedEof => {
                let msg = format!("truncated {} attribute", A::NAME);
                Error::malformed(UNKNOWN_CLASS, msg)
            }
            other => other,
        })?;
        if !reader.is_empty() {
            let msg = format!("{} trailing bytes in {} attribute", reader.len(), A::NAME);
            return Err(Error::malformed(UNKNOWN_CLASS, msg));
        }
        Ok(attribute)
    }
}

impl Serialize for Attribute {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name_index.serialize(writer)?;

        // Attribute info length is 4 bytes
        (self.info.len() as u32).serialize(writer)?;
        writer.write_all(&self.info)?;

        Ok(())
    }
}

impl Deserialize for Attribute {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let name_index = Utf8ConstantIndex::deserialize(reader)?;
        let len = u32::deserialize(reader)? as usize;
        let info = read_bytes(reader, len)?;
        Ok(Attribute { name_index, info })
    }
}

/// Attributes are all stored in the same way (see `Attribute`), but internally
/// they represent very different things. This trait is implemented by things
/// which can be turned into attributes and parsed back out of them.
pub trait AttributeLike: Serialize + Deserialize {
    /// Name of the attribute
    const NAME: &'static str;
}

/// Vectors whose length is prefixed by a single byte
fn serialize_u8_vec<A: Serialize, W: WriteBytesExt>(
    elems: &[A],
    writer: &mut W,
) -> std::io::Result<()> {
    let len = u8::try_from(elems.len())
        .map_err(|_| IoError::new(ErrorKind::InvalidData, "more than 255 elements"))?;
    len.serialize(writer)?;
    for elem in elems {
        elem.serialize(writer)?;
    }
    Ok(())
}

fn deserialize_u8_vec<A: Deserialize, R: ReadBytesExt>(reader: &mut R) -> Result<Vec<A>, Error> {
    let len = u8::deserialize(reader)?;
    (0..len).map(|_| A::deserialize(reader)).collect()
}

/// Attributes that are just a wrapper around one serializable value
macro_rules! newtype_attribute {
    ($($(#[$meta:meta])* $name:ident($inner:ty) = $attr_name:literal;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq)]
            pub struct $name(pub $inner);

            impl AttributeLike for $name {
                const NAME: &'static str = $attr_name;
            }

            impl Serialize for $name {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }

            impl Deserialize for $name {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                    Ok($name(<$inner>::deserialize(reader)?))
                }
            }
        )*
    };
}

newtype_attribute! {
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.2
    ConstantValue(ConstantIndex) = "ConstantValue";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.4
    StackMapTable(Vec<StackMapFrame>) = "StackMapTable";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.5
    Exceptions(Vec<ClassConstantIndex>) = "Exceptions";

    /// Every inner class referenced in a class' constant pool must be included in the inner
    /// classes attribute on the class.
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.6
    InnerClasses(Vec<InnerClass>) = "InnerClasses";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.9
    Signature(Utf8ConstantIndex) = "Signature";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.10
    SourceFile(Utf8ConstantIndex) = "SourceFile";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.12
    LineNumberTable(Vec<LineNumber>) = "LineNumberTable";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.13
    LocalVariableTable(Vec<LocalVariable>) = "LocalVariableTable";

    /// Same layout as `LocalVariableTable`, but the descriptor slot holds a generic signature
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.14
    LocalVariableTypeTable(Vec<LocalVariable>) = "LocalVariableTypeTable";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.16
    RuntimeVisibleAnnotations(Vec<AnnotationInfo>) = "RuntimeVisibleAnnotations";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.17
    RuntimeInvisibleAnnotations(Vec<AnnotationInfo>) = "RuntimeInvisibleAnnotations";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.20
    RuntimeVisibleTypeAnnotations(Vec<TypeAnnotationInfo>) = "RuntimeVisibleTypeAnnotations";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.21
    RuntimeInvisibleTypeAnnotations(Vec<TypeAnnotationInfo>) = "RuntimeInvisibleTypeAnnotations";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.22
    AnnotationDefault(ElementValue) = "AnnotationDefault";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.23
    BootstrapMethods(Vec<BootstrapMethod>) = "BootstrapMethods";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.26
    ModulePackages(Vec<ConstantIndex>) = "ModulePackages";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.27
    ModuleMainClass(ClassConstantIndex) = "ModuleMainClass";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.28
    NestHost(ClassConstantIndex) = "NestHost";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.29
    NestMembers(Vec<ClassConstantIndex>) = "NestMembers";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.30
    Record(Vec<RecordComponentInfo>) = "Record";

    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.31
    PermittedSubclasses(Vec<ClassConstantIndex>) = "PermittedSubclasses";
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.3
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_array: BytecodeArray,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Code {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;
        self.code_array.serialize(writer)?;
        self.exception_table.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Code {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Code {
            max_stack: u16::deserialize(reader)?,
            max_locals: u16::deserialize(reader)?,
            code_array: BytecodeArray::deserialize(reader)?,
            exception_table: Vec::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}

impl AttributeLike for Code {
    const NAME: &'static str = "Code";
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Start of exception handler range (inclusive)
    pub start_pc: u16,

    /// End of exception handler range (exclusive)
    pub end_pc: u16,

    /// Start of the exception handler
    pub handler_pc: u16,

    /// Class of exceptions caught (`None` catches everything)
    pub catch_type: Option<ClassConstantIndex>,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        self.catch_type.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ExceptionHandler {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ExceptionHandler {
            start_pc: u16::deserialize(reader)?,
            end_pc: u16::deserialize(reader)?,
            handler_pc: u16::deserialize(reader)?,
            catch_type: Option::deserialize(reader)?,
        })
    }
}

/// Encoded bytecode instructions
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodeArray(pub Vec<u8>);

impl Serialize for BytecodeArray {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let len = self.0.len() as u32;
        len.serialize(writer)?;
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl Deserialize for BytecodeArray {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let len = u32::deserialize(reader)? as usize;
        Ok(BytecodeArray(read_bytes(reader, len)?))
    }
}

/// Verification type as it appears in a `StackMapTable`
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationTypeInfo {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(ClassConstantIndex),

    /// Offset of the `new` instruction that created the object
    Uninitialized(u16),
}

impl Serialize for VerificationTypeInfo {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationTypeInfo::Top => 0u8.serialize(writer),
            VerificationTypeInfo::Integer => 1u8.serialize(writer),
            VerificationTypeInfo::Float => 2u8.serialize(writer),
            VerificationTypeInfo::Double => 3u8.serialize(writer),
            VerificationTypeInfo::Long => 4u8.serialize(writer),
            VerificationTypeInfo::Null => 5u8.serialize(writer),
            VerificationTypeInfo::UninitializedThis => 6u8.serialize(writer),
            VerificationTypeInfo::Object(class) => {
                7u8.serialize(writer)?;
                class.serialize(writer)
            }
            VerificationTypeInfo::Uninitialized(offset) => {
                8u8.serialize(writer)?;
                offset.serialize(writer)
            }
        }
    }
}

impl Deserialize for VerificationTypeInfo {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let typ = match u8::deserialize(reader)? {
            0 => VerificationTypeInfo::Top,
            1 => VerificationTypeInfo::Integer,
            2 => VerificationTypeInfo::Float,
            3 => VerificationTypeInfo::Double,
            4 => VerificationTypeInfo::Long,
            5 => VerificationTypeInfo::Null,
            6 => VerificationTypeInfo::UninitializedThis,
            7 => VerificationTypeInfo::Object(ClassConstantIndex::deserialize(reader)?),
            8 => VerificationTypeInfo::Uninitialized(u16::deserialize(reader)?),
            other => {
                let msg = format!("invalid verification type tag {}", other);
                return Err(Error::malformed(UNKNOWN_CLASS, msg));
            }
        };
        Ok(typ)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StackMapFrame {
    /// Frame has the same locals as the previous frame and number of stack items is zero
    /// Tags: 0-63 or 251
    SameLocalsNoStack { offset_delta: u16 },

    /// Frame has the same locals as the previous frame and number of stack items is one
    /// Tags: 64-127 or 247
    SameLocalsOneStack {
        offset_delta: u16,
        stack: VerificationTypeInfo,
    },

    /// Frame is like the previous frame, but without the last `chopped_k` locals
    ///
    /// Note: `chopped_k` must be in the range 1 to 3 inclusive
    /// Tags: 248-250
    ChopLocalsNoStack { offset_delta: u16, chopped_k: u8 },

    /// Frame is like the previous frame, but with extra locals
    /// Tags: 252-254
    AppendLocalsNoStack {
        offset_delta: u16,
        locals: Vec<VerificationTypeInfo>,
    },

    /// Frame has exactly the locals and stack specified
    /// Tag: 255
    Full {
        offset_delta: u16,
        locals: Vec<VerificationTypeInfo>,
        stack: Vec<VerificationTypeInfo>,
    },
}

impl StackMapFrame {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta }
            | StackMapFrame::SameLocalsOneStack { offset_delta, .. }
            | StackMapFrame::ChopLocalsNoStack { offset_delta, .. }
            | StackMapFrame::AppendLocalsNoStack { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }
}

impl Serialize for StackMapFrame {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            // `same_frame` and `same_frame_extended`
            StackMapFrame::SameLocalsNoStack { offset_delta } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8).serialize(writer)?;
                } else {
                    251u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
            }

            // `same_locals_1_stack_item_frame` and `same_locals_1_stack_item_frame_extended`
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8 + 64).serialize(writer)?;
                } else {
                    247u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
                stack.serialize(writer)?;
            }

            // `chop_frame`
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => {
                if !(1..=3).contains(chopped_k) {
                    let msg = "chop frames remove 1-3 locals";
                    return Err(IoError::new(ErrorKind::InvalidData, msg));
                }
                (251 - chopped_k).serialize(writer)?;
                offset_delta.serialize(writer)?;
            }

            // `append_frame`
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => {
                if !(1..=3).contains(&locals.len()) {
                    let msg = "append frames add 1-3 locals";
                    return Err(IoError::new(ErrorKind::InvalidData, msg));
                }
                (251 + locals.len() as u8).serialize(writer)?;
                offset_delta.serialize(writer)?;
                for local in locals {
                    local.serialize(writer)?;
                }
            }

            // `full_frame`
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                255u8.serialize(writer)?;
                offset_delta.serialize(writer)?;
                locals.serialize(writer)?;
                stack.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for StackMapFrame {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let frame = match u8::deserialize(reader)? {
            tag @ 0..=63 => StackMapFrame::SameLocalsNoStack {
                offset_delta: tag as u16,
            },
            tag @ 64..=127 => StackMapFrame::SameLocalsOneStack {
                offset_delta: tag as u16 - 64,
                stack: VerificationTypeInfo::deserialize(reader)?,
            },
            247 => StackMapFrame::SameLocalsOneStack {
                offset_delta: u16::deserialize(reader)?,
                stack: VerificationTypeInfo::deserialize(reader)?,
            },
            tag @ 248..=250 => StackMapFrame::ChopLocalsNoStack {
                offset_delta: u16::deserialize(reader)?,
                chopped_k: 251 - tag,
            },
            251 => StackMapFrame::SameLocalsNoStack {
                offset_delta: u16::deserialize(reader)?,
            },
            tag @ 252..=254 => {
                let offset_delta = u16::deserialize(reader)?;
                let locals = (0..tag - 251)
                    .map(|_| VerificationTypeInfo::deserialize(reader))
                    .collect::<Result<_, _>>()?;
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals,
                }
            }
            255 => StackMapFrame::Full {
                offset_delta: u16::deserialize(reader)?,
                locals: Vec::deserialize(reader)?,
                stack: Vec::deserialize(reader)?,
            },
            tag => {
                let msg = format!("reserved stack map frame type {}", tag);
                return Err(Error::malformed(UNKNOWN_CLASS, msg));
            }
        };
        Ok(frame)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InnerClass {
    pub inner_class: ClassConstantIndex,
    pub outer_class: Option<ClassConstantIndex>,
    pub inner_name: Option<Utf8ConstantIndex>,
    pub access_flags: InnerClassAccessFlags,
}

impl Serialize for InnerClass {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.inner_class.serialize(writer)?;
        self.outer_class.serialize(writer)?;
        self.inner_name.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for InnerClass {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(InnerClass {
            inner_class: ClassConstantIndex::deserialize(reader)?,
            outer_class: Option::deserialize(reader)?,
            inner_name: Option::deserialize(reader)?,
            access_flags: InnerClassAccessFlags::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.7
#[derive(Debug, Clone, PartialEq)]
pub struct EnclosingMethod {
    pub class: ClassConstantIndex,
    pub method: Option<NameAndTypeConstantIndex>,
}

impl AttributeLike for EnclosingMethod {
    const NAME: &'static str = "EnclosingMethod";
}

impl Serialize for EnclosingMethod {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.class.serialize(writer)?;
        self.method.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for EnclosingMethod {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(EnclosingMethod {
            class: ClassConstantIndex::deserialize(reader)?,
            method: Option::deserialize(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

impl Serialize for LineNumber {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.line_number.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for LineNumber {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LineNumber {
            start_pc: u16::deserialize(reader)?,
            line_number: u16::deserialize(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub index: u16,
}

impl Serialize for LocalVariable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.length.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.index.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for LocalVariable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LocalVariable {
            start_pc: u16::deserialize(reader)?,
            length: u16::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            index: u16::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.24
#[derive(Debug, Clone, PartialEq)]
pub struct MethodParameters(pub Vec<MethodParameter>);

#[derive(Debug, Clone, PartialEq)]
pub struct MethodParameter {
    pub name: Option<Utf8ConstantIndex>,
    pub access_flags: ParameterAccessFlags,
}

impl AttributeLike for MethodParameters {
    const NAME: &'static str = "MethodParameters";
}

impl Serialize for MethodParameters {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        serialize_u8_vec(&self.0, writer)
    }
}

impl Deserialize for MethodParameters {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(MethodParameters(deserialize_u8_vec(reader)?))
    }
}

impl Serialize for MethodParameter {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for MethodParameter {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(MethodParameter {
            name: Option::deserialize(reader)?,
            access_flags: ParameterAccessFlags::deserialize(reader)?,
        })
    }
}

/// Annotation structure shared by all annotation attributes
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.16
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationInfo {
    pub type_index: Utf8ConstantIndex,
    pub element_value_pairs: Vec<ElementValuePair>,
}

impl Serialize for AnnotationInfo {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.type_index.serialize(writer)?;
        self.element_value_pairs.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for AnnotationInfo {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(AnnotationInfo {
            type_index: Utf8ConstantIndex::deserialize(reader)?,
            element_value_pairs: Vec::deserialize(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementValuePair {
    pub name: Utf8ConstantIndex,
    pub value: ElementValue,
}

impl Serialize for ElementValuePair {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name.serialize(writer)?;
        self.value.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ElementValuePair {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ElementValuePair {
            name: Utf8ConstantIndex::deserialize(reader)?,
            value: ElementValue::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.16.1
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Primitive or string constant, tagged with one of `BCDFIJSZs`
    Const { tag: u8, value: ConstantIndex },
    Enum {
        type_name: Utf8ConstantIndex,
        const_name: Utf8ConstantIndex,
    },
    Class(Utf8ConstantIndex),
    Annotation(AnnotationInfo),
    Array(Vec<ElementValue>),
}

impl Serialize for ElementValue {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            ElementValue::Const { tag, value } => {
                tag.serialize(writer)?;
                value.serialize(writer)
            }
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                b'e'.serialize(writer)?;
                type_name.serialize(writer)?;
                const_name.serialize(writer)
            }
            ElementValue::Class(class) => {
                b'c'.serialize(writer)?;
                class.serialize(writer)
            }
            ElementValue::Annotation(annotation) => {
                b'@'.serialize(writer)?;
                annotation.serialize(writer)
            }
            ElementValue::Array(values) => {
                b'['.serialize(writer)?;
                values.serialize(writer)
            }
        }
    }
}

impl Deserialize for ElementValue {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let value = match u8::deserialize(reader)? {
            tag @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's') => {
                ElementValue::Const {
                    tag,
                    value: ConstantIndex::deserialize(reader)?,
                }
            }
            b'e' => ElementValue::Enum {
                type_name: Utf8ConstantIndex::deserialize(reader)?,
                const_name: Utf8ConstantIndex::deserialize(reader)?,
            },
            b'c' => ElementValue::Class(Utf8ConstantIndex::deserialize(reader)?),
            b'@' => ElementValue::Annotation(AnnotationInfo::deserialize(reader)?),
            b'[' => ElementValue::Array(Vec::deserialize(reader)?),
            other => {
                let msg = format!("invalid element value tag {:?}", other as char);
                return Err(Error::malformed(UNKNOWN_CLASS, msg));
            }
        };
        Ok(value)
    }
}

/// Parameter annotations: one list of annotations per parameter
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.18
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeVisibleParameterAnnotations(pub Vec<Vec<AnnotationInfo>>);

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.19
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeInvisibleParameterAnnotations(pub Vec<Vec<AnnotationInfo>>);

macro_rules! parameter_annotations {
    ($($name:ident),*) => {
        $(
            impl AttributeLike for $name {
                const NAME: &'static str = stringify!($name);
            }

            impl Serialize for $name {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    serialize_u8_vec(&self.0, writer)
                }
            }

            impl Deserialize for $name {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                    Ok($name(deserialize_u8_vec(reader)?))
                }
            }
        )*
    };
}

parameter_annotations!(
    RuntimeVisibleParameterAnnotations,
    RuntimeInvisibleParameterAnnotations
);

/// Type annotation on a class, field, method, or record component
///
/// The target is kept in the packed form used by `java.lang.reflect`-style type references: the
/// target type in the top byte, then target-specific indices. Only targets that can appear
/// outside of method bodies are supported.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.20
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotationInfo {
    pub type_ref: u32,
    pub type_path: Vec<TypePathEntry>,
    pub annotation: AnnotationInfo,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypePathEntry {
    pub kind: u8,
    pub argument_index: u8,
}

impl Serialize for TypePathEntry {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.kind.serialize(writer)?;
        self.argument_index.serialize(writer)
    }
}

impl Deserialize for TypePathEntry {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(TypePathEntry {
            kind: u8::deserialize(reader)?,
            argument_index: u8::deserialize(reader)?,
        })
    }
}

impl Serialize for TypeAnnotationInfo {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let target_type = (self.type_ref >> 24) as u8;
        target_type.serialize(writer)?;
        match target_type {
            0x00 | 0x01 | 0x16 => ((self.type_ref >> 16) as u8).serialize(writer)?,
            0x10 | 0x17 => ((self.type_ref >> 8) as u16).serialize(writer)?,
            0x11 | 0x12 => {
                ((self.type_ref >> 16) as u8).serialize(writer)?;
                ((self.type_ref >> 8) as u8).serialize(writer)?;
            }
            0x13..=0x15 => (),
            other => {
                let msg = format!("unsupported type annotation target 0x{:02x}", other);
                return Err(IoError::new(ErrorKind::InvalidData, msg));
            }
        }
        serialize_u8_vec(&self.type_path, writer)?;
        self.annotation.serialize(writer)
    }
}

impl Deserialize for TypeAnnotationInfo {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let target_type = u8::deserialize(reader)?;
        let tag = (target_type as u32) << 24;
        let type_ref = match target_type {
            0x00 | 0x01 | 0x16 => tag | (u8::deserialize(reader)? as u32) << 16,
            0x10 | 0x17 => tag | (u16::deserialize(reader)? as u32) << 8,
            0x11 | 0x12 => {
                let parameter = u8::deserialize(reader)? as u32;
                let bound = u8::deserialize(reader)? as u32;
                tag | parameter << 16 | bound << 8
            }
            0x13..=0x15 => tag,
            other => {
                let msg = format!("unsupported type annotation target 0x{:02x}", other);
                return Err(Error::malformed(UNKNOWN_CLASS, msg));
            }
        };
        Ok(TypeAnnotationInfo {
            type_ref,
            type_path: deserialize_u8_vec(reader)?,
            annotation: AnnotationInfo::deserialize(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMethod {
    pub bootstrap_method: ConstantIndex,
    pub bootstrap_arguments: Vec<ConstantIndex>,
}

impl Serialize for BootstrapMethod {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.bootstrap_method.serialize(writer)?;
        self.bootstrap_arguments.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for BootstrapMethod {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(BootstrapMethod {
            bootstrap_method: ConstantIndex::deserialize(reader)?,
            bootstrap_arguments: Vec::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.25
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: ConstantIndex,
    pub flags: ModuleAccessFlags,
    pub version: Option<Utf8ConstantIndex>,
    pub requires: Vec<ModuleRequires>,
    pub exports: Vec<ModulePackage>,
    pub opens: Vec<ModulePackage>,
    pub uses: Vec<ClassConstantIndex>,
    pub provides: Vec<ModuleProvides>,
}

impl AttributeLike for Module {
    const NAME: &'static str = "Module";
}

impl Serialize for Module {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name.serialize(writer)?;
        self.flags.serialize(writer)?;
        self.version.serialize(writer)?;
        self.requires.serialize(writer)?;
        self.exports.serialize(writer)?;
        self.opens.serialize(writer)?;
        self.uses.serialize(writer)?;
        self.provides.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Module {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Module {
            name: ConstantIndex::deserialize(reader)?,
            flags: ModuleAccessFlags::deserialize(reader)?,
            version: Option::deserialize(reader)?,
            requires: Vec::deserialize(reader)?,
            exports: Vec::deserialize(reader)?,
            opens: Vec::deserialize(reader)?,
            uses: Vec::deserialize(reader)?,
            provides: Vec::deserialize(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRequires {
    pub module: ConstantIndex,
    pub flags: ModuleAccessFlags,
    pub version: Option<Utf8ConstantIndex>,
}

impl Serialize for ModuleRequires {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.module.serialize(writer)?;
        self.flags.serialize(writer)?;
        self.version.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ModuleRequires {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ModuleRequires {
            module: ConstantIndex::deserialize(reader)?,
            flags: ModuleAccessFlags::deserialize(reader)?,
            version: Option::deserialize(reader)?,
        })
    }
}

/// Entry of the `exports` or `opens` tables
#[derive(Debug, Clone, PartialEq)]
pub struct ModulePackage {
    pub package: ConstantIndex,
    pub flags: ModuleAccessFlags,
    pub modules: Vec<ConstantIndex>,
}

impl Serialize for ModulePackage {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.package.serialize(writer)?;
        self.flags.serialize(writer)?;
        self.modules.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ModulePackage {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ModulePackage {
            package: ConstantIndex::deserialize(reader)?,
            flags: ModuleAccessFlags::deserialize(reader)?,
            modules: Vec::deserialize(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleProvides {
    pub service: ClassConstantIndex,
    pub providers: Vec<ClassConstantIndex>,
}

impl Serialize for ModuleProvides {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.service.serialize(writer)?;
        self.providers.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ModuleProvides {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ModuleProvides {
            service: ClassConstantIndex::deserialize(reader)?,
            providers: Vec::deserialize(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponentInfo {
    pub name: Utf8ConstantIndex,
    pub descriptor: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for RecordComponentInfo {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for RecordComponentInfo {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(RecordComponentInfo {
            name: Utf8ConstantIndex::deserialize(reader)?,
            descriptor: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<A: AttributeLike + PartialEq + std::fmt::Debug>(attribute: A) {
        let mut info = vec![];
        attribute.serialize(&mut info).unwrap();
        let wrapped = Attribute {
            name_index: Utf8ConstantIndex(ConstantIndex(1)),
            info,
        };
        assert_eq!(wrapped.parse::<A>().unwrap(), attribute);
    }

    #[test]
    fn stack_map_frames_pick_compact_encodings() {
        let frames = StackMapTable(vec![
            StackMapFrame::SameLocalsNoStack { offset_delta: 3 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 300 },
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 5,
                stack: VerificationTypeInfo::Integer,
            },
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 1,
                chopped_k: 2,
            },
        ]);
        let mut bytes = vec![];
        frames.serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0, 4, 3, 251, 1, 44, 69, 1, 249, 0, 1]);
        round_trip(frames);
    }

    #[test]
    fn type_annotations_pack_targets() {
        let annotation = TypeAnnotationInfo {
            type_ref: 0x1100_0100,
            type_path: vec![TypePathEntry {
                kind: 3,
                argument_index: 0,
            }],
            annotation: AnnotationInfo {
                type_index: Utf8ConstantIndex(ConstantIndex(4)),
                element_value_pairs: vec![],
            },
        };
        let mut bytes = vec![];
        annotation.serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0x11, 0, 1, 1, 3, 0, 0, 4, 0, 0]);
        round_trip(RuntimeVisibleTypeAnnotations(vec![annotation]));
    }

    #[test]
    fn parameter_annotations_use_byte_counts() {
        let attribute = RuntimeInvisibleParameterAnnotations(vec![vec![], vec![]]);
        let mut bytes = vec![];
        attribute.serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![2, 0, 0, 0, 0]);
        round_trip(attribute);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let attribute = Attribute {
            name_index: Utf8ConstantIndex(ConstantIndex(1)),
            info: vec![0, 2, 0],
        };
        assert!(attribute.parse::<SourceFile>().is_err());
    }

    #[test]
    fn module_round_trip() {
        round_trip(Module {
            name: ConstantIndex(1),
            flags: ModuleAccessFlags::OPEN,
            version: None,
            requires: vec![ModuleRequires {
                module: ConstantIndex(2),
                flags: ModuleAccessFlags::MANDATED,
                version: Some(Utf8ConstantIndex(ConstantIndex(3))),
            }],
            exports: vec![ModulePackage {
                package: ConstantIndex(4),
                flags: ModuleAccessFlags::empty(),
                modules: vec![ConstantIndex(2)],
            }],
            opens: vec![],
            uses: vec![ClassConstantIndex(ConstantIndex(5))],
            provides: vec![],
        });
    }
}
