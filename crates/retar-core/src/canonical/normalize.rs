//! In-place working-tree normalisation.
//!
//! Rewrites the staged tree so that everything the archiver reads from
//! disk is deterministic. Symlinks become empty regular files (a symlink
//! has no clampable mtime and its target bytes are restored by the binary
//! patch afterwards), directory setuid/setgid/sticky bits are cleared
//! (forcing a uniform archive mode does not cover those bits), and every
//! timestamp is pinned to epoch 0.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use filetime::FileTime;
use log::warn;
use walkdir::WalkDir;

use crate::Manifest;
use crate::Result;

/// Mask of the setuid, setgid and sticky bits.
const SPECIAL_BITS: u32 = 0o7000;

/// Normalises every manifest path below `base`, in manifest order.
///
/// A manifest path with nothing on disk either gets an empty directory
/// (`create_missing`, for trees coming out of snapshots that drop empty
/// directories) or triggers a full-tree sweep: the manifest may disagree
/// with disk because of tar's own name canonicalisation, in which case
/// every entry under `base` is normalised instead.
///
/// Running this twice over the same tree changes nothing the second time.
pub fn normalize_tree(base: &Path, manifest: &Manifest, create_missing: bool) -> Result<()> {
    let mut need_sweep = false;
    for path in manifest.paths() {
        let disk = base.join(path.trim_end_matches('/'));
        match fs::symlink_metadata(&disk) {
            Ok(meta) => normalize_entry(&disk, &meta)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if create_missing {
                    fs::create_dir_all(&disk)?;
                    clamp_times(&disk)?;
                } else if !need_sweep {
                    warn!(
                        "manifest path {path} not found below {}, falling back to a full sweep",
                        base.display()
                    );
                    need_sweep = true;
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
    if need_sweep {
        full_sweep(base)?;
    }
    Ok(())
}

/// Applies the symlink, mode and timestamp rules to one on-disk entry.
fn normalize_entry(disk: &Path, meta: &fs::Metadata) -> Result<()> {
    if meta.file_type().is_symlink() {
        fs::remove_file(disk)?;
        fs::File::create(disk)?;
        clamp_times(disk)?;
        return Ok(());
    }
    if meta.is_dir() {
        let mode = meta.permissions().mode();
        if mode & SPECIAL_BITS != 0 {
            fs::set_permissions(disk, fs::Permissions::from_mode(0o755))?;
        }
    }
    clamp_times(disk)?;
    Ok(())
}

fn clamp_times(disk: &Path) -> Result<()> {
    let epoch = FileTime::zero();
    filetime::set_file_times(disk, epoch, epoch)?;
    Ok(())
}

/// Normalises every entry below `base`, depth-first.
fn full_sweep(base: &Path) -> Result<()> {
    for entry in WalkDir::new(base).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.path() == base {
            continue;
        }
        let meta = fs::symlink_metadata(entry.path())?;
        normalize_entry(entry.path(), &meta)?;
    }
    Ok(())
}
