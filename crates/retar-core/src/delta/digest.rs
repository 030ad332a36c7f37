//! Pristine-hash helpers.
//!
//! The wrapper delta records the SHA-1 of the original compressed file as
//! a base64 string; the flat encoding additionally derives its MIME
//! boundary from the same digest in hex.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::Digest;
use sha1::Sha1;

use crate::Result;

/// Base64 SHA-1 of a byte slice.
#[must_use]
pub fn sha1_base64(data: &[u8]) -> String {
    STANDARD.encode(Sha1::digest(data))
}

/// Base64 SHA-1 of the file at `path`, computed streaming.
///
/// # Errors
///
/// Returns an error when the file cannot be read.
pub fn sha1_base64_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(STANDARD.encode(hasher.finalize()))
}

/// Lowercase hex rendering of a base64 digest string.
///
/// Returns `None` when the input is not valid base64.
#[must_use]
pub fn base64_to_hex(b64: &str) -> Option<String> {
    let raw = STANDARD.decode(b64).ok()?;
    let mut hex = String::with_capacity(raw.len() * 2);
    for byte in raw {
        let _ = write!(hex, "{byte:02x}");
    }
    Some(hex)
}
