//! Typed values stored as hex byte strings
//!
//! Every leaf of an IR document holds its value as space separated, uppercase hex bytes. The
//! width depends on the type: all integral numbers except `byte` and `char` take 8 bytes
//! (`short` and `int` are sign extended), `float` takes 4, `char` 2, and `bool` and `byte` 1.
//! Strings, class names, and labels are their UTF-8 bytes.

use crate::xmir::CodecError;
use std::fmt::Write;

/// Placeholder used for an empty byte string in listings
pub const EMPTY: &str = "--";

/// Value of a data node
#[derive(Debug, Clone)]
pub enum Data {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Char(u16),
    String(String),
    Bytes(Vec<u8>),

    /// Internal class name or array descriptor
    Class(String),
    Label(String),
}

/// Names of the data node types
pub const TYPES: [&str; 12] = [
    "byte", "short", "int", "long", "float", "double", "bool", "char", "string", "bytes", "class",
    "label",
];

/// Is `base` one of the data node types?
pub fn is_data_type(base: &str) -> bool {
    TYPES.contains(&base)
}

impl Data {
    /// Type name, as used in the `base` attribute
    pub fn base(&self) -> &'static str {
        match self {
            Data::Byte(_) => "byte",
            Data::Short(_) => "short",
            Data::Int(_) => "int",
            Data::Long(_) => "long",
            Data::Float(_) => "float",
            Data::Double(_) => "double",
            Data::Bool(_) => "bool",
            Data::Char(_) => "char",
            Data::String(_) => "string",
            Data::Bytes(_) => "bytes",
            Data::Class(_) => "class",
            Data::Label(_) => "label",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Data::Byte(b) => vec![*b as u8],
            Data::Short(s) => (*s as i64).to_be_bytes().to_vec(),
            Data::Int(i) => (*i as i64).to_be_bytes().to_vec(),
            Data::Long(l) => l.to_be_bytes().to_vec(),
            Data::Float(f) => f.to_bits().to_be_bytes().to_vec(),
            Data::Double(d) => d.to_bits().to_be_bytes().to_vec(),
            Data::Bool(b) => vec![*b as u8],
            Data::Char(c) => c.to_be_bytes().to_vec(),
            Data::String(s) | Data::Class(s) | Data::Label(s) => s.as_bytes().to_vec(),
            Data::Bytes(bytes) => bytes.clone(),
        }
    }

    pub fn to_hex(&self) -> String {
        render(&self.to_bytes())
    }

    /// Read a value of type `base` from its hex text
    pub fn from_hex(base: &str, hex: &str) -> Result<Data, CodecError> {
        let bytes = parse(hex)?;
        let data = match base {
            "byte" => Data::Byte(fixed::<1>("byte", &bytes, hex)?[0] as i8),
            "bool" => match fixed::<1>("bool", &bytes, hex)?[0] {
                0 => Data::Bool(false),
                1 => Data::Bool(true),
                other => {
                    return Err(CodecError::OutOfRange {
                        kind: "bool",
                        value: other as i64,
                    })
                }
            },
            "char" => Data::Char(u16::from_be_bytes(fixed::<2>("char", &bytes, hex)?)),
            "short" => {
                let value = i64::from_be_bytes(fixed::<8>("short", &bytes, hex)?);
                Data::Short(narrow("short", value)?)
            }
            "int" => {
                let value = i64::from_be_bytes(fixed::<8>("int", &bytes, hex)?);
                Data::Int(narrow("int", value)?)
            }
            "long" => Data::Long(i64::from_be_bytes(fixed::<8>("long", &bytes, hex)?)),
            "float" => Data::Float(f32::from_bits(u32::from_be_bytes(fixed::<4>(
                "float", &bytes, hex,
            )?))),
            "double" => Data::Double(f64::from_bits(u64::from_be_bytes(fixed::<8>(
                "double", &bytes, hex,
            )?))),
            "string" => Data::String(utf8(bytes, hex)?),
            "class" => Data::Class(utf8(bytes, hex)?),
            "label" => Data::Label(utf8(bytes, hex)?),
            "bytes" => Data::Bytes(bytes),
            other => return Err(CodecError::UnknownType(other.to_owned())),
        };
        Ok(data)
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Data) -> bool {
        match (self, other) {
            (Data::Float(x), Data::Float(y)) => x.to_bits() == y.to_bits(),
            (Data::Double(x), Data::Double(y)) => x.to_bits() == y.to_bits(),
            _ => self.base() == other.base() && self.to_bytes() == other.to_bytes(),
        }
    }
}

impl Eq for Data {}

fn fixed<const N: usize>(kind: &'static str, bytes: &[u8], hex: &str) -> Result<[u8; N], CodecError> {
    bytes.try_into().map_err(|_| CodecError::WrongWidth {
        kind,
        expected: N,
        actual: bytes.len(),
        data: hex.to_owned(),
    })
}

fn narrow<T: TryFrom<i64>>(kind: &'static str, value: i64) -> Result<T, CodecError> {
    T::try_from(value).map_err(|_| CodecError::OutOfRange { kind, value })
}

fn utf8(bytes: Vec<u8>, hex: &str) -> Result<String, CodecError> {
    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8(hex.to_owned()))
}

/// Render bytes as `"0A FF 10"`
pub fn render(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Parse hex text back into bytes
///
/// Whitespace between digits is ignored, as is case. Blank text and [`EMPTY`] are the empty
/// byte string.
pub fn parse(hex: &str) -> Result<Vec<u8>, CodecError> {
    let trimmed = hex.trim();
    if trimmed == EMPTY {
        return Ok(vec![]);
    }
    let digits: Vec<u8> = trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            c.to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| CodecError::InvalidDigit(hex.to_owned()))
        })
        .collect::<Result<_, _>>()?;
    if digits.len() % 2 != 0 {
        return Err(CodecError::OddDigits(hex.to_owned()));
    }
    Ok(digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(Data::Int(10).to_hex(), "00 00 00 00 00 00 00 0A");
        assert_eq!(Data::Short(-1).to_hex(), "FF FF FF FF FF FF FF FF");
        assert_eq!(Data::Bool(true).to_hex(), "01");
        assert_eq!(Data::Float(0.1).to_hex(), "3D CC CC CD");
        assert_eq!(Data::Char('A' as u16).to_hex(), "00 41");
        assert_eq!(Data::String("".into()).to_hex(), "");
    }

    #[test]
    fn read_back() {
        assert_eq!(
            Data::from_hex("int", "00 00 00 00 00 00 00 0a").unwrap(),
            Data::Int(10)
        );
        assert_eq!(
            Data::from_hex("string", "48 69").unwrap(),
            Data::String("Hi".into())
        );
        assert_eq!(Data::from_hex("bytes", "--").unwrap(), Data::Bytes(vec![]));
        assert_eq!(
            Data::from_hex("double", &Data::Double(f64::NAN).to_hex()).unwrap(),
            Data::Double(f64::NAN)
        );
    }

    #[test]
    fn malformed() {
        assert_eq!(
            parse("0A F"),
            Err(CodecError::OddDigits("0A F".to_owned()))
        );
        assert_eq!(parse("ZZ"), Err(CodecError::InvalidDigit("ZZ".to_owned())));
        assert!(matches!(
            Data::from_hex("int", "01"),
            Err(CodecError::WrongWidth { expected: 8, .. })
        ));
        assert!(matches!(
            Data::from_hex("int", "00 00 00 01 00 00 00 00"),
            Err(CodecError::OutOfRange { kind: "int", .. })
        ));
        assert!(matches!(
            Data::from_hex("bool", "02"),
            Err(CodecError::OutOfRange { .. })
        ));
        assert_eq!(
            Data::from_hex("widget", ""),
            Err(CodecError::UnknownType("widget".to_owned()))
        );
    }
}
