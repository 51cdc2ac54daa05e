use crate::jvm::class_file::{Deserialize, Serialize};
use crate::jvm::Error;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fmt;

/// Class file format version
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.1-200-B.2
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    pub const JAVA1: Version = Version::new(45, 3);
    pub const JAVA8: Version = Version::new(52, 0);
    pub const JAVA11: Version = Version::new(55, 0);
    pub const JAVA17: Version = Version::new(61, 0);
    pub const JAVA21: Version = Version::new(65, 0);

    /// Oldest and newest major versions the decoder accepts
    pub const OLDEST_MAJOR: u16 = 45;
    pub const NEWEST_MAJOR: u16 = 68;

    pub const fn new(major_version: u16, minor_version: u16) -> Version {
        Version {
            major_version,
            minor_version,
        }
    }

    pub fn is_supported(&self) -> bool {
        (Version::OLDEST_MAJOR..=Version::NEWEST_MAJOR).contains(&self.major_version)
    }

    /// Parse `MAJOR.MINOR` or just `MAJOR`
    pub fn parse(text: &str) -> Option<Version> {
        let (major, minor) = match text.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (text, "0"),
        };
        Some(Version::new(major.trim().parse().ok()?, minor.trim().parse().ok()?))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major_version, self.minor_version)
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Version {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let minor_version = u16::deserialize(reader)?;
        let major_version = u16::deserialize(reader)?;
        Ok(Version {
            major_version,
            minor_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_versions() {
        assert_eq!(Version::parse("52"), Some(Version::JAVA8));
        assert_eq!(Version::parse("45.3"), Some(Version::JAVA1));
        assert_eq!(Version::parse("java"), None);
    }

    #[test]
    fn supported_range() {
        assert!(Version::JAVA17.is_supported());
        assert!(!Version::new(44, 0).is_supported());
        assert!(!Version::new(69, 0).is_supported());
    }
}
