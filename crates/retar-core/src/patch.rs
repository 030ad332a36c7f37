//! Binary diff and patch through the external xdelta tool.
//!
//! The diff command exits 0 when the inputs are identical and 1 when they
//! differ; both are success. Any other status is fatal. `--pristine`
//! keeps xdelta from transparently decompressing gzipped inputs, which
//! would destroy byte fidelity, and `-0` leaves the patch stream
//! uncompressed since every patch ends up inside a gzipped container
//! anyway.

use std::path::Path;
use std::process::Stdio;

use crate::Error;
use crate::Result;
use crate::process;

/// The binary patch tool.
pub const PROGRAM: &str = "xdelta";

/// Produces a binary patch turning `pre` into `post`, written to `patch`.
///
/// # Errors
///
/// Returns [`Error::SubprocessFailure`] when xdelta cannot start or exits
/// with a status other than 0 or 1.
pub fn diff(pre: &Path, post: &Path, patch: &Path) -> Result<()> {
    run(
        &["delta", "-0", "--pristine"],
        &[pre, post, patch],
        &[1],
    )
}

/// Applies `patch` to the exact pre-image `pre`, writing the post-image
/// to `out`.
///
/// # Errors
///
/// Returns [`Error::SubprocessFailure`] on any nonzero exit; xdelta does
/// no fuzzy matching, so failure means the pre-image was not the one the
/// patch was made against.
pub fn apply(pre: &Path, patch: &Path, out: &Path) -> Result<()> {
    run(&["patch", "--pristine"], &[patch, pre, out], &[])
}

fn run(flags: &[&str], files: &[&Path], tolerated: &[i32]) -> Result<()> {
    let output = process::command(PROGRAM)
        .args(flags)
        .args(files)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::SubprocessFailure {
            program: PROGRAM.to_string(),
            status: format!("failed to start: {e}"),
        })?;
    let status = output.status;
    if status.success() || status.code().is_some_and(|c| tolerated.contains(&c)) {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(Error::SubprocessFailure {
        program: PROGRAM.to_string(),
        status: format!("{status}: {}", stderr.trim()),
    })
}
