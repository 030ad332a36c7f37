//! Test utilities for building archive fixtures.
//!
//! In-memory tar, gzip, and bzip2 fixtures used across the unit tests.
//!
//! # Panics
//!
//! All helpers may panic on I/O errors since they are for test use only.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Write;

/// Builder for in-memory tar fixtures with files, directories and
/// symlinks.
///
/// # Examples
///
/// ```
/// use retar_core::test_utils::TarFixture;
///
/// let tar = TarFixture::new()
///     .dir("pkg-1.0/")
///     .file("pkg-1.0/a", b"contents")
///     .into_bytes();
/// ```
pub struct TarFixture {
    builder: Option<tar::Builder<Vec<u8>>>,
}

impl Default for TarFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TarFixture {
    /// Creates an empty fixture.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: Some(tar::Builder::new(Vec::new())),
        }
    }

    fn builder(&mut self) -> &mut tar::Builder<Vec<u8>> {
        self.builder.as_mut().unwrap()
    }

    /// Appends a regular file with mode 0644 and mtime 0.
    #[must_use]
    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.file_full(path, data, 0o644, 0)
    }

    /// Appends a regular file with explicit mode and mtime.
    #[must_use]
    pub fn file_full(mut self, path: &str, data: &[u8], mode: u32, mtime: u64) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_mtime(mtime);
        header.set_cksum();
        self.builder().append_data(&mut header, path, data).unwrap();
        self
    }

    /// Appends a directory entry.
    #[must_use]
    pub fn dir(mut self, path: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o755);
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Directory);
        header.set_cksum();
        self.builder()
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    /// Appends a symlink entry.
    #[must_use]
    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o777);
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Symlink);
        self.builder()
            .append_link(&mut header, path, target)
            .unwrap();
        self
    }

    /// Finishes the archive and returns its bytes.
    #[must_use]
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.builder.take().unwrap().into_inner().unwrap()
    }
}

/// Builds a raw gzip member header (no deflate body).
///
/// When `filename` is given the FNAME flag must already be set in
/// `flags`; the name is appended NUL-terminated.
#[must_use]
pub fn gz_member_header(
    flags: u8,
    mtime: u32,
    xfl: u8,
    os: u8,
    filename: Option<&str>,
) -> Vec<u8> {
    let mut raw = vec![0x1F, 0x8B, 0x08, flags];
    raw.extend_from_slice(&mtime.to_le_bytes());
    raw.push(xfl);
    raw.push(os);
    if let Some(name) = filename {
        raw.extend_from_slice(name.as_bytes());
        raw.push(0);
    }
    raw
}

/// Gzip-compresses `data` in memory (flate2, mtime 0, no stored name).
#[must_use]
pub fn gz_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Bzip2-compresses `data` in memory at level 9.
#[must_use]
pub fn bz2_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
