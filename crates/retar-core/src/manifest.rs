//! Ordered path manifests recording original tar entry order.
//!
//! The manifest is the sole traversal source for the canonical tar
//! builder: the builder never recurses, it sees files only through the
//! manifest, so the recorded order fully determines the produced byte
//! stream.

use std::io::Read;

use crate::Result;

/// Ordered sequence of normalised entry paths from a tar archive.
///
/// Paths never start with `/` or `./` and are never empty. Directory
/// entries keep their trailing `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    paths: Vec<String>,
}

impl Manifest {
    /// Builds a manifest by listing `reader` (an uncompressed tar stream)
    /// in entry order.
    ///
    /// # Errors
    ///
    /// Returns an error when the stream is not a readable tar archive.
    pub fn from_tar<R: Read>(reader: R) -> Result<Self> {
        let mut archive = tar::Archive::new(reader);
        let mut paths = Vec::new();
        for entry in archive.entries()? {
            let entry = entry?;
            let mut path = entry.path()?.to_string_lossy().into_owned();
            if entry.header().entry_type().is_dir() && !path.ends_with('/') {
                path.push('/');
            }
            if let Some(clean) = normalize(&path) {
                paths.push(clean);
            }
        }
        Ok(Self { paths })
    }

    /// Parses the newline-separated wire form stored in a tar delta.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let paths = text.lines().filter_map(normalize).collect();
        Self { paths }
    }

    /// Renders the newline-separated wire form.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for path in &self.paths {
            out.push_str(path);
            out.push('\n');
        }
        out
    }

    /// Entry paths in original tar order.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Detects a single wrapping directory.
    ///
    /// Returns the shared first path component when every entry lives
    /// below the same one, `None` as soon as any entry is top-level (has
    /// no `/` at all) or two entries disagree. Tar's own `./` prefixes
    /// were already stripped during normalisation, so the comparison is
    /// on bare component names.
    #[must_use]
    pub fn common_subdir(&self) -> Option<&str> {
        let mut subdir: Option<&str> = None;
        for path in &self.paths {
            let first = path.split('/').next().unwrap_or("");
            if first.len() == path.len() {
                // No separator at all: a top-level file disables wrapping.
                return None;
            }
            match subdir {
                None => subdir = Some(first),
                Some(seen) if seen == first => {}
                Some(_) => return None,
            }
        }
        subdir
    }
}

/// Strips leading `./` and `/` runs; drops entries that normalise to
/// nothing (such as the bare `./` root entry).
fn normalize(raw: &str) -> Option<String> {
    let mut s = raw;
    loop {
        if let Some(rest) = s.strip_prefix("./") {
            s = rest;
        } else if let Some(rest) = s.strip_prefix('/') {
            s = rest;
        } else {
            break;
        }
    }
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
