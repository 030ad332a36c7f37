//! Reproduction driver.
//!
//! Orchestrates delta generation and archive reproduction over the
//! canonical tar builder, the binary patcher and the compressor oracle.

use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use log::debug;
use log::info;

use crate::Manifest;
use crate::Options;
use crate::Result;
use crate::Scratch;
use crate::canonical;
use crate::canonical::SourceDisposition;
use crate::delta::TarDelta;
use crate::formats;
use crate::formats::CompressionKind;
use crate::oracle;
use crate::patch;
use crate::process;

/// Generates the delta for `archive` and writes it to `delta_out`.
///
/// # Errors
///
/// Propagates every failure of the pipeline; nothing is written on
/// error.
pub fn gendelta(archive: &Path, delta_out: &Path, opts: &Options) -> Result<()> {
    let bytes = gendelta_bytes(archive, opts)?;
    fs::write(delta_out, bytes)?;
    Ok(())
}

/// Generates the delta for `archive` as bytes.
///
/// Detects the compression wrapping, identifies the compressor when
/// there is one, rebuilds the canonical tar from the archive's own
/// contents, and packs the container.
///
/// # Errors
///
/// Propagates detection, identification, extraction and patch failures.
pub fn gendelta_bytes(archive: &Path, opts: &Options) -> Result<Vec<u8>> {
    let scratch = Scratch::new(opts)?;
    let kind = formats::detect_path(archive)?;
    debug!("{} detected as {}", archive.display(), kind.name());

    let (inner_tar, wrapper) = match kind {
        CompressionKind::None => (archive.to_path_buf(), None),
        compressed => {
            let plaintext = scratch.file("inner.tar");
            decompress(compressed, archive, &plaintext)?;
            let wrapper =
                oracle::gendelta_wrapper(archive, &plaintext, compressed, opts, &scratch)?;
            (plaintext, Some(wrapper))
        }
    };

    let manifest = Manifest::from_tar(BufReader::new(File::open(&inner_tar)?))?;

    let extract_dir = scratch.subdir("extract")?;
    let mut unpacker = tar::Archive::new(BufReader::new(File::open(&inner_tar)?));
    unpacker.unpack(&extract_dir)?;
    let source_root = match manifest.common_subdir() {
        Some(subdir) => extract_dir.join(subdir),
        None => extract_dir,
    };

    let canonical_tar = scratch.file("canonical.tar");
    canonical::build(
        &source_root,
        &manifest,
        &canonical_tar,
        &scratch,
        SourceDisposition::Clobber,
        false,
    )?;

    let tar_patch = scratch.file("tar.delta");
    patch::diff(&canonical_tar, &inner_tar, &tar_patch)?;

    let delta = TarDelta {
        manifest,
        patch: fs::read(&tar_patch)?,
        wrapper,
    };
    delta.to_bytes()
}

/// Reproduces `archive_out` from the delta at `delta_path` and a working
/// tree whose contents match the archive.
///
/// # Errors
///
/// Propagates unpack, rebuild, patch and replay failures.
pub fn gentar(
    delta_path: &Path,
    worktree: &Path,
    archive_out: &Path,
    opts: &Options,
) -> Result<()> {
    let bytes = fs::read(delta_path)?;
    gentar_bytes(&bytes, worktree, archive_out, opts)
}

/// Reproduces `archive_out` from delta bytes and a working tree.
///
/// The result is staged next to the target and renamed into place only
/// after the pristine hash (when recorded) has been verified, so a
/// failed reproduction never clobbers an existing file.
///
/// # Errors
///
/// Propagates unpack, rebuild, patch, replay and hash failures.
pub fn gentar_bytes(
    delta_bytes: &[u8],
    worktree: &Path,
    archive_out: &Path,
    opts: &Options,
) -> Result<()> {
    let scratch = Scratch::new(opts)?;
    let delta = TarDelta::from_bytes(delta_bytes)?;

    let canonical_tar = scratch.file("canonical.tar");
    canonical::build(
        worktree,
        &delta.manifest,
        &canonical_tar,
        &scratch,
        SourceDisposition::Preserve,
        true,
    )?;

    let tar_patch = scratch.file("tar.delta");
    fs::write(&tar_patch, &delta.patch)?;
    let inner_tar = scratch.file("inner.tar");
    patch::apply(&canonical_tar, &tar_patch, &inner_tar)?;

    let staging = staging_path(archive_out);
    let finish = || -> Result<()> {
        match &delta.wrapper {
            None => {
                fs::copy(&inner_tar, &staging)?;
            }
            Some(wrapper) => oracle::reproduce(wrapper, &inner_tar, &staging, &scratch)?,
        }
        fs::rename(&staging, archive_out)?;
        Ok(())
    };
    let outcome = finish();
    if outcome.is_err() {
        let _ = fs::remove_file(&staging);
    } else {
        info!("reproduced {}", archive_out.display());
    }
    outcome
}

/// Extracts `archive`'s contents into `scratch` and returns the root a
/// content tracker would snapshot: the inside of the wrapping directory
/// when the archive has one, the whole extraction otherwise.
///
/// # Errors
///
/// Propagates detection, decompression and unpack failures.
pub fn extract_source_root(archive: &Path, scratch: &Scratch) -> Result<PathBuf> {
    let kind = formats::detect_path(archive)?;
    let inner_tar = match kind {
        CompressionKind::None => archive.to_path_buf(),
        compressed => {
            let plaintext = scratch.file("inner.tar");
            decompress(compressed, archive, &plaintext)?;
            plaintext
        }
    };
    let manifest = Manifest::from_tar(BufReader::new(File::open(&inner_tar)?))?;
    let extract_dir = scratch.subdir("source")?;
    let mut unpacker = tar::Archive::new(BufReader::new(File::open(&inner_tar)?));
    unpacker.unpack(&extract_dir)?;
    Ok(match manifest.common_subdir() {
        Some(subdir) => extract_dir.join(subdir),
        None => extract_dir,
    })
}

/// Streams `archive` through the external decompressor into `out`.
fn decompress(kind: CompressionKind, archive: &Path, out: &Path) -> Result<()> {
    match kind {
        // gzip exits 2 for warnings such as trailing garbage.
        CompressionKind::Gzip => process::run_filter("gzip", &["-dc"], archive, out, &[2]),
        _ => process::run_filter("bzip2", &["-dc"], archive, out, &[]),
    }
}

/// Same-directory temporary path, renamed over the target on success.
fn staging_path(out: &Path) -> PathBuf {
    let name = out
        .file_name()
        .map_or_else(|| "archive".to_string(), |n| n.to_string_lossy().into_owned());
    out.with_file_name(format!("{name}.tmp"))
}
