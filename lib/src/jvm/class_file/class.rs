use crate::jvm::class_file::{
    Attribute, ClassConstantIndex, Constant, ConstantsReader, Deserialize, Field, Method,
    Serialize, Version,
};
use crate::jvm::{ClassAccessFlags, Error, UNKNOWN_CLASS};
use crate::util::OffsetVec;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub version: Version,
    pub constants: OffsetVec<Constant>,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,

    /// Only `java/lang/Object` and `module-info` have no superclass
    pub super_class: Option<ClassConstantIndex>,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Parse a complete class file
    ///
    /// Errors raised once `this_class` is known carry the class name.
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, Error> {
        let mut reader = bytes;
        let class = ClassFile::deserialize(&mut reader)?;
        if !reader.is_empty() {
            let msg = format!("{} trailing bytes after class file", reader.len());
            return Err(Error::malformed(class.name()?, msg));
        }
        Ok(class)
    }

    /// Internal name of the class
    pub fn name(&self) -> Result<&str, Error> {
        self.constants.class_name(self.this_class)
    }

    /// Serialize into a fresh buffer
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let mut bytes = vec![];
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ClassFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let unknown = |err: Error| err.in_class(UNKNOWN_CLASS);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(Error::from).map_err(unknown)?;
        if magic != ClassFile::MAGIC {
            let msg = format!("bad magic number {:02X?}", magic);
            return Err(Error::malformed(UNKNOWN_CLASS, msg));
        }

        let version = Version::deserialize(reader).map_err(unknown)?;
        if !version.is_supported() {
            let msg = format!("unsupported class file version {}", version);
            return Err(Error::malformed(UNKNOWN_CLASS, msg));
        }

        let constants = OffsetVec::<Constant>::deserialize(reader).map_err(unknown)?;
        let access_flags = ClassAccessFlags::deserialize(reader).map_err(unknown)?;
        let this_class = ClassConstantIndex::deserialize(reader).map_err(unknown)?;
        let name = constants.class_name(this_class).map_err(unknown)?.to_owned();

        let rest = |reader: &mut R| -> Result<ClassFile, Error> {
            Ok(ClassFile {
                version,
                constants: OffsetVec::new(),
                access_flags,
                this_class,
                super_class: Option::deserialize(reader)?,
                interfaces: Vec::deserialize(reader)?,
                fields: Vec::deserialize(reader)?,
                methods: Vec::deserialize(reader)?,
                attributes: Vec::deserialize(reader)?,
            })
        };
        let class = rest(reader).map_err(|err| err.in_class(&name))?;
        Ok(ClassFile { constants, ..class })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::class_file::ConstantsPool;

    fn minimal() -> ClassFile {
        let mut pool = ConstantsPool::new();
        let this_class = pool.get_class("Foo").unwrap();
        let super_class = pool.get_class("java/lang/Object").unwrap();
        ClassFile {
            version: Version::JAVA8,
            constants: pool.into_offset_vec(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class: Some(super_class),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        }
    }

    #[test]
    fn parse_what_was_serialized() {
        let class = minimal();
        let bytes = class.to_bytes().unwrap();
        assert_eq!(&bytes[..8], &[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52]);
        let parsed = ClassFile::parse(&bytes).unwrap();
        assert_eq!(parsed, class);
        assert_eq!(parsed.name().unwrap(), "Foo");
    }

    #[test]
    fn bad_magic() {
        let err = ClassFile::parse(&[0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 52]).unwrap_err();
        assert!(err.to_string().contains("bad magic"), "{}", err);
    }

    #[test]
    fn truncation_names_the_class() {
        let bytes = minimal().to_bytes().unwrap();
        let err = ClassFile::parse(&bytes[..bytes.len() - 3]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed class 'Foo': unexpected end of class file"
        );
    }

    #[test]
    fn unsupported_version() {
        let mut class = minimal();
        class.version = Version::new(99, 0);
        let bytes = class.to_bytes().unwrap();
        assert!(ClassFile::parse(&bytes).is_err());
    }
}
