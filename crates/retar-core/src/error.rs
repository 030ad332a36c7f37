//! Error types for archive reproduction operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating or applying deltas.
///
/// Every variant is fatal to the current top-level operation; there is no
/// internal retry. Candidate misses inside the compressor search are not
/// errors and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A compressed file's leading bytes do not form a valid member header.
    #[error("not a valid {format} archive: {reason}")]
    HeaderParse {
        /// Format whose header failed to parse (`gz` or `bz2`).
        format: &'static str,
        /// What was wrong with the header bytes.
        reason: String,
    },

    /// A delta carries a version this reader refuses.
    #[error("unsupported delta version {version} for type {kind}")]
    UnsupportedVersion {
        /// Version string found in the delta.
        version: String,
        /// Delta type the version belongs to.
        kind: String,
    },

    /// A required container entry is absent.
    #[error("delta lacks {entry}")]
    MissingDeltaEntry {
        /// Name of the missing entry.
        entry: &'static str,
    },

    /// The delta's stored type disagrees with what the caller requested.
    #[error("delta is of type {stored}, expected {requested}")]
    CompressionMismatch {
        /// Type recorded in the delta.
        stored: String,
        /// Type the operation needed.
        requested: String,
    },

    /// A stored compressor parameter falls outside the whitelist.
    #[error("paranoia check failed on compressor parameter: {token}")]
    ParamValidation {
        /// The offending token.
        token: String,
    },

    /// No compressor invocation reproduces the original bytes.
    #[error("unable to reproduce {path} with any supported compressor")]
    ReproductionFailure {
        /// The archive that could not be reproduced.
        path: PathBuf,
    },

    /// Reproduced output disagrees with the recorded pristine hash.
    #[error("reproduced file has wrong checksum: expected {expected}, got {actual}")]
    Sha1Mismatch {
        /// Base64 SHA-1 recorded in the delta.
        expected: String,
        /// Base64 SHA-1 of the reproduced bytes.
        actual: String,
    },

    /// An external tool exited outside its tolerated status set.
    #[error("{program} failed with {status}")]
    SubprocessFailure {
        /// Program that failed.
        program: String,
        /// Its exit status, rendered.
        status: String,
    },

    /// A repository reference is missing or ambiguous.
    #[error("cannot resolve {name}: {reason}")]
    RepositoryLookup {
        /// The reference being resolved.
        name: String,
        /// Why resolution failed, including any candidate list.
        reason: String,
    },
}
