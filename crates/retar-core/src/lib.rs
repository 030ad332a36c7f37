//! Byte-identical reproduction of upstream release archives.
//!
//! `retar-core` regenerates the exact bytes of a release archive (tar,
//! tar.gz, tar.bz2) from a working tree whose file *contents* match the
//! archive plus a small delta blob capturing everything a content tracker
//! does not preserve: entry order, metadata, and the compressed wrapping.
//!
//! # Examples
//!
//! ```no_run
//! use retar_core::Options;
//! use retar_core::driver;
//! use std::path::Path;
//!
//! # fn main() -> retar_core::Result<()> {
//! let opts = Options::default();
//! driver::gendelta(Path::new("pkg-1.0.tar.gz"), Path::new("pkg.delta"), &opts)?;
//! driver::gentar(
//!     Path::new("pkg.delta"),
//!     Path::new("worktree"),
//!     Path::new("pkg-1.0.tar.gz"),
//!     &opts,
//! )?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod canonical;
pub mod delta;
pub mod driver;
pub mod error;
pub mod formats;
pub mod manifest;
pub mod options;
pub mod oracle;
pub mod patch;
pub mod process;
pub mod repo;
pub mod scratch;
pub mod test_utils;

// Re-export main API types
pub use delta::TarDelta;
pub use delta::WrapperDelta;
pub use error::Error;
pub use error::Result;
pub use formats::CompressionKind;
pub use manifest::Manifest;
pub use options::Options;
pub use scratch::Scratch;
