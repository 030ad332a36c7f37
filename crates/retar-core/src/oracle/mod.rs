//! Compressor identification and replay.
//!
//! Given a compressed file and its decompressed plaintext, find the
//! exact external-compressor invocation whose output matches the file
//! byte-for-byte; failing that (gzip only), the invocation minimising a
//! residual binary patch. The reverse path replays a stored invocation,
//! applies any residual patch, and verifies the pristine hash.

pub mod bzip2;
pub mod gzip;
pub mod params;

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use crate::Error;
use crate::Options;
use crate::Result;
use crate::Scratch;
use crate::WrapperDelta;
use crate::delta::digest;
use crate::formats::CompressionKind;
use crate::patch;
use crate::process;

/// One entry in a replay ladder: a program and the parameter tokens that
/// would be stored in the delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub program: &'static str,
    pub params: Vec<String>,
}

impl Candidate {
    pub(crate) fn new(program: &'static str, params: Vec<String>) -> Self {
        Self { program, params }
    }
}

/// Produces the wrapper delta identifying how `archive` was compressed.
///
/// `plaintext` is the already-decompressed stream. `kind` must be a real
/// compression kind.
///
/// # Errors
///
/// Returns [`Error::ReproductionFailure`] when no supported invocation
/// reproduces the file and no residual-patch path exists for the format,
/// plus header-parse and subprocess errors.
pub fn gendelta_wrapper(
    archive: &Path,
    plaintext: &Path,
    kind: CompressionKind,
    opts: &Options,
    scratch: &Scratch,
) -> Result<WrapperDelta> {
    match kind {
        CompressionKind::Gzip => gzip::gendelta(archive, plaintext, scratch),
        CompressionKind::Bzip2 => bzip2::gendelta(archive, plaintext, opts),
        CompressionKind::None => Err(Error::CompressionMismatch {
            stored: "none".to_string(),
            requested: "gz or bz2".to_string(),
        }),
    }
}

/// Replays a stored wrapper delta: compresses `plaintext` with the
/// recorded invocation, applies the residual patch when present, and
/// writes the result to `output`.
///
/// The stored parameters are validated against the whitelist before any
/// compressor is spawned, and the pristine SHA-1 (when recorded) is
/// verified before returning; on mismatch `output` is removed.
///
/// # Errors
///
/// Returns [`Error::ParamValidation`], [`Error::Sha1Mismatch`], or
/// subprocess errors.
pub fn reproduce(
    wrapper: &WrapperDelta,
    plaintext: &Path,
    output: &Path,
    scratch: &Scratch,
) -> Result<()> {
    params::validate(wrapper)?;
    let (program, argv) = invocation(wrapper)?;

    match &wrapper.patch {
        None => process::run_filter(&program, &argv, plaintext, output, &[])?,
        Some(residual) => {
            let approx = scratch.file("approx");
            process::run_filter(&program, &argv, plaintext, &approx, &[])?;
            let residual_path = scratch.file("wrapper.delta");
            fs::write(&residual_path, residual)?;
            patch::apply(&approx, &residual_path, output)?;
        }
    }

    if let Some(expected) = &wrapper.sha1sum {
        let actual = digest::sha1_base64_file(output)?;
        if &actual != expected {
            let _ = fs::remove_file(output);
            return Err(Error::Sha1Mismatch {
                expected: expected.clone(),
                actual,
            });
        }
    }
    Ok(())
}

/// The program and argument vector a wrapper delta replays with.
fn invocation(wrapper: &WrapperDelta) -> Result<(String, Vec<OsString>)> {
    match wrapper.kind {
        CompressionKind::Gzip => {
            let filename = wrapper.filename.as_deref().unwrap_or("");
            let timestamp = wrapper.timestamp.unwrap_or(0);
            Ok((
                gzip::PROGRAM.to_string(),
                gzip::argv(&wrapper.params, filename, timestamp),
            ))
        }
        _ => {
            let program = wrapper
                .program
                .clone()
                .ok_or(Error::MissingDeltaEntry { entry: "program" })?;
            let argv = wrapper.params.iter().map(OsString::from).collect();
            Ok((program, argv))
        }
    }
}
