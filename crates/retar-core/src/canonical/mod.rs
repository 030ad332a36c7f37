//! Canonical tar construction.
//!
//! Given a working tree and a path manifest, produce a tar byte stream
//! whose metadata is fully forced (owner 0/0, mode 0644, mtime 0, ustar)
//! and whose entry order is exactly the manifest order. Two invocations
//! over trees with equal per-manifest contents produce bytewise-equal
//! output no matter what timestamps, modes or symlinks the trees carried.

pub mod emit;
pub mod normalize;

use std::path::Path;

use crate::Manifest;
use crate::Result;
use crate::Scratch;

/// What the builder may do with the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDisposition {
    /// The source tree is expendable; move it into the staging area and
    /// rewrite it in place.
    Clobber,
    /// The source tree must survive; work on a copy.
    Preserve,
}

/// Builds the canonical tar for `(source_root, manifest)` at `output`.
///
/// `source_root` holds the tree *without* any wrapping directory; when
/// the manifest shows a single shared first component the wrapper is
/// re-introduced here before archiving. `create_missing` makes the
/// normalisation pass create empty directories for manifest paths absent
/// on disk (content trackers drop empty directories from snapshots).
///
/// # Errors
///
/// Returns I/O errors from staging, normalisation, or tar emission.
pub fn build(
    source_root: &Path,
    manifest: &Manifest,
    output: &Path,
    scratch: &Scratch,
    disposition: SourceDisposition,
    create_missing: bool,
) -> Result<()> {
    let staged = stage(source_root, manifest, scratch, disposition)?;
    normalize::normalize_tree(&staged, manifest, create_missing)?;
    emit::emit_tar(&staged, manifest, output)
}

/// Places the source tree so that manifest paths resolve below the
/// returned root.
fn stage(
    source_root: &Path,
    manifest: &Manifest,
    scratch: &Scratch,
    disposition: SourceDisposition,
) -> Result<std::path::PathBuf> {
    match manifest.common_subdir() {
        Some(subdir) => {
            let workdir = scratch.file("workdir");
            std::fs::create_dir_all(&workdir)?;
            let target = workdir.join(subdir);
            match disposition {
                SourceDisposition::Clobber => move_tree(source_root, &target)?,
                SourceDisposition::Preserve => copy_tree(source_root, &target)?,
            }
            Ok(workdir)
        }
        None => match disposition {
            // No wrapping directory: the source root already is the
            // archive root, and clobber mode may rewrite it in place.
            SourceDisposition::Clobber => Ok(source_root.to_path_buf()),
            SourceDisposition::Preserve => {
                let workdir = scratch.file("workdir");
                copy_tree(source_root, &workdir)?;
                Ok(workdir)
            }
        },
    }
}

fn move_tree(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to)?;
    Ok(())
}

/// Recursive copy preserving symlinks and permission bits.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        let meta = std::fs::symlink_metadata(&src)?;
        if meta.file_type().is_symlink() {
            let target = std::fs::read_link(&src)?;
            std::os::unix::fs::symlink(target, &dst)?;
        } else if meta.is_dir() {
            copy_tree(&src, &dst)?;
            std::fs::set_permissions(&dst, meta.permissions())?;
        } else {
            std::fs::copy(&src, &dst)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Options;
    use std::fs;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a"), b"alpha").unwrap();
        fs::write(root.join("sub/b"), b"beta").unwrap();
    }

    #[test]
    fn test_build_is_deterministic() {
        let opts = Options::default();
        let scratch = Scratch::new(&opts).unwrap();
        let manifest = Manifest::parse("pkg/\npkg/a\npkg/sub/\npkg/sub/b\n");

        let src1 = scratch.subdir("src1").unwrap();
        sample_tree(&src1);
        let out1 = scratch.file("canon.tar");
        build(&src1, &manifest, &out1, &scratch, SourceDisposition::Preserve, false).unwrap();

        // Same contents, wildly different metadata.
        let src2 = scratch.subdir("src2").unwrap();
        sample_tree(&src2);
        fs::set_permissions(
            src2.join("a"),
            std::os::unix::fs::PermissionsExt::from_mode(0o600),
        )
        .unwrap();
        filetime::set_file_mtime(
            src2.join("sub/b"),
            filetime::FileTime::from_unix_time(1_600_000_000, 0),
        )
        .unwrap();
        let out2 = scratch.file("canon.tar");
        build(&src2, &manifest, &out2, &scratch, SourceDisposition::Preserve, false).unwrap();

        assert_eq!(fs::read(&out1).unwrap(), fs::read(&out2).unwrap());
    }

    #[test]
    fn test_preserve_keeps_source_intact() {
        let opts = Options::default();
        let scratch = Scratch::new(&opts).unwrap();
        let manifest = Manifest::parse("pkg/\npkg/a\npkg/sub/\npkg/sub/b\n");

        let src = scratch.subdir("src").unwrap();
        sample_tree(&src);
        filetime::set_file_mtime(
            src.join("a"),
            filetime::FileTime::from_unix_time(1_600_000_000, 0),
        )
        .unwrap();

        let out = scratch.file("canon.tar");
        build(&src, &manifest, &out, &scratch, SourceDisposition::Preserve, false).unwrap();

        // The original tree's timestamps were not clamped.
        let mtime = filetime::FileTime::from_last_modification_time(
            &fs::metadata(src.join("a")).unwrap(),
        );
        assert_eq!(mtime.unix_seconds(), 1_600_000_000);
    }

    #[test]
    fn test_no_subdir_stages_flat() {
        let opts = Options::default();
        let scratch = Scratch::new(&opts).unwrap();
        // A top-level file disables the wrapping directory.
        let manifest = Manifest::parse("a\nsub/\nsub/b\n");

        let src = scratch.subdir("flat").unwrap();
        sample_tree(&src);
        let out = scratch.file("canon.tar");
        build(&src, &manifest, &out, &scratch, SourceDisposition::Preserve, false).unwrap();

        let names: Vec<String> = crate::Manifest::from_tar(fs::File::open(&out).unwrap())
            .unwrap()
            .paths()
            .to_vec();
        assert_eq!(names, ["a", "sub/", "sub/b"]);
    }
}
