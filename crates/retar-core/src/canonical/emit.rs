//! Tar emission with forced metadata.

use std::fs::File;
use std::path::Path;

use crate::Manifest;
use crate::Result;

/// Appends every manifest path below `base` to a fresh tar at `output`.
///
/// Headers are ustar with uid=gid=0, empty user/group names, mode 0644
/// and mtime 0 for every entry; entries appear in manifest order and
/// nothing is picked up by recursion. The normalisation pass has already
/// removed symlinks, so only regular files and directories remain.
///
/// # Errors
///
/// Returns an error when a manifest path is unreadable or the output
/// cannot be written.
pub fn emit_tar(base: &Path, manifest: &Manifest, output: &Path) -> Result<()> {
    let file = File::create(output)?;
    let mut builder = tar::Builder::new(file);
    builder.follow_symlinks(false);

    for path in manifest.paths() {
        let disk = base.join(path.trim_end_matches('/'));
        let meta = std::fs::metadata(&disk)?;

        let mut header = tar::Header::new_ustar();
        header.set_uid(0);
        header.set_gid(0);
        header.set_mode(0o644);
        header.set_mtime(0);

        if meta.is_dir() {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            let name = if path.ends_with('/') {
                path.clone()
            } else {
                format!("{path}/")
            };
            builder.append_data(&mut header, name, std::io::empty())?;
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(meta.len());
            builder.append_data(&mut header, path, File::open(&disk)?)?;
        }
    }

    let mut file = builder.into_inner()?;
    std::io::Write::flush(&mut file)?;
    Ok(())
}
