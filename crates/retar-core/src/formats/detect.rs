//! Compression detection by leading magic bytes.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::Result;

/// Gzip member magic plus the deflate method byte.
const GZIP_MAGIC: [u8; 3] = [0x1F, 0x8B, 0x08];

/// Bzip2 stream signature (`BZh`).
const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];

/// Compression wrapping around an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionKind {
    /// Plain uncompressed tar.
    None,
    /// Gzip-compressed tar archive.
    Gzip,
    /// Bzip2-compressed tar archive.
    Bzip2,
}

impl CompressionKind {
    /// Returns the delta `type` string for this kind.
    ///
    /// Uncompressed archives have no wrapper delta, so `None` maps to the
    /// tar delta type.
    #[must_use]
    pub const fn delta_type(self) -> &'static str {
        match self {
            Self::None => "tar",
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
        }
    }

    /// Returns a human-readable name for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        }
    }
}

/// Detects the compression wrapping from a byte prefix.
///
/// Anything that is neither gzip nor bzip2 is assumed to be an
/// uncompressed tar; tar has no leading magic at offset zero.
#[must_use]
pub fn detect_bytes(prefix: &[u8]) -> CompressionKind {
    if prefix.starts_with(&GZIP_MAGIC) {
        CompressionKind::Gzip
    } else if prefix.starts_with(&BZIP2_MAGIC) {
        CompressionKind::Bzip2
    } else {
        CompressionKind::None
    }
}

/// Detects the compression wrapping of the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn detect_path(path: &Path) -> Result<CompressionKind> {
    let mut file = File::open(path)?;
    let mut prefix = [0u8; 10];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = file.read(&mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(detect_bytes(&prefix[..filled]))
}
