//! Scratch-directory lifecycle.
//!
//! Each top-level operation owns one scratch root; nested operations get
//! sub-scratches below it. The root is removed on drop unless the user
//! asked for preservation, in which case the path is logged so it can be
//! inspected.

use std::path::Path;
use std::path::PathBuf;

use log::info;
use tempfile::TempDir;

use crate::Options;
use crate::Result;

/// An owned scratch directory tree.
#[derive(Debug)]
pub struct Scratch {
    // `None` after the directory has been deliberately kept.
    dir: Option<TempDir>,
    path: PathBuf,
    counter: std::cell::Cell<u32>,
}

impl Scratch {
    /// Creates a fresh scratch root.
    ///
    /// With [`Options::keep_scratch`] set the directory survives drop and
    /// its path is logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new(opts: &Options) -> Result<Self> {
        let dir = TempDir::with_prefix("retar-")?;
        let path = dir.path().to_path_buf();
        let dir = if opts.keep_scratch {
            info!("keeping scratch directory {}", path.display());
            let _kept = dir.keep();
            None
        } else {
            Some(dir)
        };
        Ok(Self {
            dir,
            path,
            counter: std::cell::Cell::new(0),
        })
    }

    /// The scratch root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates and returns a named directory below the root.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.path.join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Returns a fresh path below the root for a scratch file, without
    /// creating it. Successive calls yield distinct names.
    #[must_use]
    pub fn file(&self, stem: &str) -> PathBuf {
        let n = self.counter.get();
        self.counter.set(n + 1);
        self.path.join(format!("{stem}.{n}"))
    }

    /// Whether this scratch tree will survive drop.
    #[must_use]
    pub fn is_kept(&self) -> bool {
        self.dir.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let opts = Options::default();
        let path;
        {
            let scratch = Scratch::new(&opts).unwrap();
            path = scratch.path().to_path_buf();
            assert!(path.is_dir());
            assert!(!scratch.is_kept());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_kept_on_request() {
        let opts = Options::default().with_keep_scratch();
        let path;
        {
            let scratch = Scratch::new(&opts).unwrap();
            path = scratch.path().to_path_buf();
            assert!(scratch.is_kept());
        }
        assert!(path.is_dir());
        std::fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn test_subdir_and_files() {
        let opts = Options::default();
        let scratch = Scratch::new(&opts).unwrap();
        let sub = scratch.subdir("workdir").unwrap();
        assert!(sub.is_dir());
        let a = scratch.file("canonical.tar");
        let b = scratch.file("canonical.tar");
        assert_ne!(a, b);
    }
}
