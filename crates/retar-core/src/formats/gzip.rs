//! RFC 1952 gzip member-header parsing.
//!
//! Only the first member header is read. The parsed fields drive candidate
//! selection in the compressor search: the flag bits decide whether a
//! filename has to be reproduced, the extra-flags byte maps to a
//! compression level, and the OS byte selects between GNU- and
//! BSD-flavoured producers.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;

use crate::Error;
use crate::Result;

/// FLG bit: file is probably ASCII text.
pub const FTEXT: u8 = 0x01;
/// FLG bit: a CRC16 of the header follows the optional sections.
pub const FHCRC: u8 = 0x02;
/// FLG bit: an extra field is present.
pub const FEXTRA: u8 = 0x04;
/// FLG bit: the original file name is present, NUL-terminated.
pub const FNAME: u8 = 0x08;
/// FLG bit: a file comment is present, NUL-terminated.
pub const FCOMMENT: u8 = 0x10;

/// OS byte value for Unix producers.
pub const OS_UNIX: u8 = 3;
/// OS byte value for NTFS filesystems (emitted by some Windows ports).
pub const OS_NTFS: u8 = 11;

/// Compression-level hint from the XFL byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraFlags {
    /// XFL 0 (or anything unrecognised): default level.
    Normal,
    /// XFL 2: slowest algorithm, `-9`.
    Best,
    /// XFL 4: fastest algorithm, `-1`.
    Fast,
}

impl From<u8> for ExtraFlags {
    fn from(xfl: u8) -> Self {
        match xfl {
            2 => Self::Best,
            4 => Self::Fast,
            _ => Self::Normal,
        }
    }
}

/// Parsed fields of a gzip member header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzHeader {
    /// Raw FLG byte.
    pub flags: u8,
    /// Modification time, seconds since epoch, 0 when absent.
    pub mtime: u32,
    /// Level hint from XFL.
    pub extra_flags: ExtraFlags,
    /// Producer OS byte.
    pub os: u8,
    /// Stored original file name, without the terminating NUL.
    /// `None` when FNAME is unset.
    pub filename: Option<String>,
}

impl GzHeader {
    /// Whether the header carries an original file name.
    #[must_use]
    pub fn has_filename(&self) -> bool {
        self.flags & FNAME != 0
    }

    /// Parses the first member header of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderParse`] when the leading bytes are not a
    /// deflate gzip member, and I/O errors from reading the file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::parse(&mut reader)
    }

    /// Parses a member header from `reader`, consuming exactly the header
    /// bytes including the optional extra/name/comment/CRC sections.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; 10];
        reader
            .read_exact(&mut fixed)
            .map_err(|_| bad_header("truncated member header"))?;

        if fixed[0] != 0x1F || fixed[1] != 0x8B {
            return Err(bad_header("wrong magic"));
        }
        if fixed[2] != 0x08 {
            return Err(bad_header("unknown compression method"));
        }

        let flags = fixed[3];
        let mtime = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let extra_flags = ExtraFlags::from(fixed[8]);
        let os = fixed[9];

        if flags & FEXTRA != 0 {
            let mut len = [0u8; 2];
            reader
                .read_exact(&mut len)
                .map_err(|_| bad_header("truncated extra field"))?;
            let xlen = u16::from_le_bytes(len);
            skip(reader, u64::from(xlen)).map_err(|_| bad_header("truncated extra field"))?;
        }

        let filename = if flags & FNAME != 0 {
            Some(read_cstring(reader).map_err(|_| bad_header("unterminated file name"))?)
        } else {
            None
        };

        if flags & FCOMMENT != 0 {
            read_cstring(reader).map_err(|_| bad_header("unterminated comment"))?;
        }

        if flags & FHCRC != 0 {
            skip(reader, 2).map_err(|_| bad_header("truncated header CRC"))?;
        }

        Ok(Self {
            flags,
            mtime,
            extra_flags,
            os,
            filename,
        })
    }
}

fn bad_header(reason: &str) -> Error {
    Error::HeaderParse {
        format: "gz",
        reason: reason.to_string(),
    }
}

fn skip<R: Read>(reader: &mut R, n: u64) -> std::io::Result<()> {
    let copied = std::io::copy(&mut reader.take(n), &mut std::io::sink())?;
    if copied == n {
        Ok(())
    } else {
        Err(std::io::ErrorKind::UnexpectedEof.into())
    }
}

fn read_cstring<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte)?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::gz_member_header;

    #[test]
    fn test_parse_minimal_header() {
        let raw = gz_member_header(0, 0, 0, OS_UNIX, None);
        let header = GzHeader::parse(&mut raw.as_slice()).unwrap();
        assert_eq!(header.flags, 0);
        assert_eq!(header.mtime, 0);
        assert_eq!(header.extra_flags, ExtraFlags::Normal);
        assert_eq!(header.os, OS_UNIX);
        assert!(header.filename.is_none());
        assert!(!header.has_filename());
    }

    #[test]
    fn test_parse_filename_and_mtime() {
        let raw = gz_member_header(FNAME, 1_577_836_800, 0, OS_UNIX, Some("pkg.tar"));
        let header = GzHeader::parse(&mut raw.as_slice()).unwrap();
        assert!(header.has_filename());
        assert_eq!(header.filename.as_deref(), Some("pkg.tar"));
        assert_eq!(header.mtime, 1_577_836_800);
    }

    #[test]
    fn test_xfl_mapping() {
        for (xfl, expected) in [
            (0, ExtraFlags::Normal),
            (2, ExtraFlags::Best),
            (4, ExtraFlags::Fast),
            (7, ExtraFlags::Normal),
        ] {
            let raw = gz_member_header(0, 0, xfl, OS_UNIX, None);
            let header = GzHeader::parse(&mut raw.as_slice()).unwrap();
            assert_eq!(header.extra_flags, expected);
        }
    }

    #[test]
    fn test_extra_and_comment_sections_are_skipped() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&[0x1F, 0x8B, 0x08, FEXTRA | FNAME | FCOMMENT | FHCRC]);
        raw.extend_from_slice(&[0, 0, 0, 0]); // mtime
        raw.extend_from_slice(&[0, OS_NTFS]);
        raw.extend_from_slice(&[3, 0]); // xlen
        raw.extend_from_slice(b"abc"); // extra field
        raw.extend_from_slice(b"name\0");
        raw.extend_from_slice(b"a comment\0");
        raw.extend_from_slice(&[0xAA, 0xBB]); // header crc
        raw.extend_from_slice(b"deflate stream follows");

        let mut cursor = raw.as_slice();
        let header = GzHeader::parse(&mut cursor).unwrap();
        assert_eq!(header.os, OS_NTFS);
        assert_eq!(header.filename.as_deref(), Some("name"));
        // Parsing must stop exactly at the end of the member header.
        assert_eq!(cursor, b"deflate stream follows");
    }

    #[test]
    fn test_reject_wrong_magic() {
        let err = GzHeader::parse(&mut &b"BZh91AY&SY"[..]).unwrap_err();
        assert!(err.to_string().contains("not a valid gz archive"));
    }

    #[test]
    fn test_reject_non_deflate_method() {
        let raw = [0x1F, 0x8B, 0x07, 0, 0, 0, 0, 0, 0, 3];
        assert!(GzHeader::parse(&mut raw.as_slice()).is_err());
    }

    #[test]
    fn test_reject_truncated() {
        let raw = [0x1F, 0x8B];
        assert!(GzHeader::parse(&mut raw.as_slice()).is_err());
    }
}
