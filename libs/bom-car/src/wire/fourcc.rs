use serde::{Serialize, Serializer};

/// Four-character code, as used for magic numbers and pixel formats
///
/// The bytes are kept as decoded. Codes declared little-endian in a record layout have already
/// been reversed by the schema engine, so `RATC`, `CTSI` or `ARGB` read naturally here.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// Creates a new FourCc from its bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        FourCc(bytes)
    }

    /// Creates a FourCc from a slice, which must be exactly 4 bytes long
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(FourCc)
    }

    /// Returns the raw bytes of the code
    pub fn bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for FourCc {
    fn from(bytes: [u8; 4]) -> Self {
        FourCc(bytes)
    }
}

impl PartialEq<&str> for FourCc {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

impl std::fmt::Debug for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

impl Serialize for FourCc {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::FourCc;

    #[test]
    fn test_four_cc_display() {
        assert_eq!(FourCc::new(*b"RATC").to_string(), "RATC");
        assert_eq!(FourCc::new([b'a', 0, b'b', 0xFF]).to_string(), "a\\x00b\\xff");
    }

    #[test]
    fn test_four_cc_from_slice() {
        assert_eq!(FourCc::from_slice(b"tree"), Some(FourCc::new(*b"tree")));
        assert_eq!(FourCc::from_slice(b"tre"), None);
        assert_eq!(FourCc::from_slice(b"trees"), None);
    }

    #[test]
    fn test_four_cc_str_comparison() {
        let magic = FourCc::new(*b"CTSI");
        assert!(magic == "CTSI");
        assert!(magic != "ISTC");
        assert!(magic != "CTS");
    }
}
