use crate::decode::Mode;
use crate::jvm::class_file::Version;
use crate::xmir::Listing;

/// Knobs for [`disassemble`](super::disassemble) and [`assemble`](super::assemble)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// How much debug information survives disassembly
    pub mode: Mode,

    /// Precede every instruction with a comment describing it
    pub comments: bool,

    /// Disassembly to embed in the document's `<listing>`
    pub listing: Listing,

    /// Class file version to assemble into, instead of the one recorded in the document
    pub target: Option<Version>,

    /// Re-read assembled bytes and check the method bodies
    pub verify: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            mode: Mode::default(),
            comments: false,
            listing: Listing::default(),
            target: None,
            verify: true,
        }
    }
}

impl Settings {
    pub fn new(mode: Mode) -> Settings {
        Settings {
            mode,
            ..Settings::default()
        }
    }

    pub fn with_comments(mut self, comments: bool) -> Settings {
        self.comments = comments;
        self
    }

    pub fn with_listing(mut self, listing: Listing) -> Settings {
        self.listing = listing;
        self
    }

    pub fn with_target(mut self, target: Option<Version>) -> Settings {
        self.target = target;
        self
    }

    /// Turn the check of assembled bytes on or off
    pub fn with_verify(mut self, verify: bool) -> Settings {
        self.verify = verify;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_is_on_unless_turned_off() {
        assert!(Settings::default().verify);
        assert!(Settings::new(Mode::Short).verify);
        assert!(!Settings::default().with_verify(false).verify);
        assert_eq!(Settings::default().mode, Mode::Full);
        assert_eq!(Settings::default().listing, Listing::Omitted);
    }
}
