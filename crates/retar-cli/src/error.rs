//! Error conversion utilities for CLI.
//!
//! Converts retar-core's typed errors into contextual anyhow errors
//! with actionable guidance where there is any to give.

use anyhow::Result;
use anyhow::anyhow;
use retar_core::Error;
use std::path::Path;

/// Converts a core error into a user-facing error for `archive`.
pub fn convert_core_error(err: Error, archive: &Path) -> anyhow::Error {
    match err {
        Error::ReproductionFailure { path } => {
            anyhow!(
                "unable to reproduce '{}' with any supported compressor\n\
                 HINT: for bzip2 input, --try-harder sweeps pbzip2 block sizes.",
                path.display()
            )
        }
        Error::ParamValidation { token } => {
            anyhow!(
                "delta for '{}' holds a compressor parameter outside the whitelist: {token}\n\
                 HINT: the delta is corrupt or was written by an untrusted tool.",
                archive.display()
            )
        }
        Error::Sha1Mismatch { expected, actual } => {
            anyhow!(
                "reproduction of '{}' does not match the recorded checksum\n\
                 expected {expected}, got {actual}; the working tree differs from the \
                 one the delta was generated against.",
                archive.display()
            )
        }
        Error::SubprocessFailure { program, status } => {
            anyhow!(
                "while processing '{}': {program} failed with {status}",
                archive.display()
            )
        }
        _ => anyhow::Error::from(err)
            .context(format!("error processing '{}'", archive.display())),
    }
}

/// Adds archive context to a core result.
pub fn add_archive_context<T>(result: Result<T, Error>, archive: &Path) -> anyhow::Result<T> {
    result.map_err(|e| convert_core_error(e, archive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_reproduction_failure_hint() {
        let err = Error::ReproductionFailure {
            path: PathBuf::from("pkg.tar.bz2"),
        };
        let converted = convert_core_error(err, Path::new("pkg.tar.bz2"));
        let msg = format!("{converted:?}");
        assert!(msg.contains("pkg.tar.bz2"));
        assert!(msg.contains("HINT"));
    }

    #[test]
    fn test_param_validation_names_token() {
        let err = Error::ParamValidation {
            token: "--evil".to_string(),
        };
        let converted = convert_core_error(err, Path::new("a.tar.gz"));
        assert!(format!("{converted:?}").contains("--evil"));
    }
}
