//! Bzip2 file-signature parsing.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::Error;
use crate::Result;

/// Parsed bzip2 signature: `BZh` followed by the block-size digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bz2Header {
    /// Compression level, `1..=9`, taken from the signature digit.
    pub level: u8,
}

impl Bz2Header {
    /// Parses the signature of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderParse`] unless the file starts with
    /// `BZh<digit>` where digit is `1`..`9`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut sig = [0u8; 4];
        file.read_exact(&mut sig)
            .map_err(|_| bad_header("truncated signature"))?;
        Self::parse(&sig)
    }

    /// Parses a 4-byte bzip2 signature.
    pub fn parse(sig: &[u8; 4]) -> Result<Self> {
        if &sig[..3] != b"BZh" {
            return Err(bad_header("wrong signature"));
        }
        let digit = sig[3];
        if !digit.is_ascii_digit() || digit == b'0' {
            return Err(bad_header("bad block-size digit"));
        }
        Ok(Self {
            level: digit - b'0',
        })
    }
}

fn bad_header(reason: &str) -> Error {
    Error::HeaderParse {
        format: "bz2",
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        for level in 1..=9u8 {
            let sig = [b'B', b'Z', b'h', b'0' + level];
            assert_eq!(Bz2Header::parse(&sig).unwrap().level, level);
        }
    }

    #[test]
    fn test_reject_zero_digit() {
        assert!(Bz2Header::parse(b"BZh0").is_err());
    }

    #[test]
    fn test_reject_wrong_signature() {
        let err = Bz2Header::parse(b"BZx9").unwrap_err();
        assert!(err.to_string().contains("not a valid bz2 archive"));
    }

    #[test]
    fn test_reject_non_digit() {
        assert!(Bz2Header::parse(b"BZhX").is_err());
    }
}
