//! Gzip replay search.
//!
//! The member header narrows the space of producers down to a short
//! ordered ladder of invocations of the replay compressor. The first
//! pass streams each candidate against the original and stops at the
//! first byte-exact match; only when every candidate misses does the
//! fallback pass materialise candidate outputs and keep the one with the
//! smallest residual patch.

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use log::debug;
use log::warn;

use crate::Error;
use crate::Result;
use crate::Scratch;
use crate::WrapperDelta;
use crate::delta::digest;
use crate::formats::CompressionKind;
use crate::formats::gzip::ExtraFlags;
use crate::formats::gzip::GzHeader;
use crate::formats::gzip::OS_NTFS;
use crate::formats::gzip::OS_UNIX;
use crate::patch;
use crate::process;

use super::Candidate;

/// The gzip replay compressor.
pub const PROGRAM: &str = "zgz";

/// Builds the ordered candidate ladder for a parsed header.
pub(crate) fn candidates(header: &GzHeader) -> Vec<Candidate> {
    let mut base: Vec<String> = Vec::new();
    if !header.has_filename() {
        base.push("-n".to_string());
        if header.mtime != 0 {
            // No stored name, but a stored timestamp all the same.
            base.push("-M".to_string());
        }
    }
    match header.extra_flags {
        ExtraFlags::Best => base.push("-9".to_string()),
        ExtraFlags::Fast => base.push("-1".to_string()),
        ExtraFlags::Normal => {}
    }

    let mut list = Vec::new();
    if header.os == OS_UNIX {
        let mut gnu = vec!["--gnu".to_string()];
        gnu.extend(base.iter().cloned());
        list.push(Candidate::new(PROGRAM, gnu.clone()));
        gnu.push("--rsyncable".to_string());
        list.push(Candidate::new(PROGRAM, gnu));
    }

    let mut bsd = base;
    bsd.push("--osflag".to_string());
    bsd.push(header.os.to_string());
    list.push(Candidate::new(PROGRAM, bsd.clone()));

    let mut buggy = bsd.clone();
    buggy.push("--quirk".to_string());
    buggy.push("buggy-bsd".to_string());
    list.push(Candidate::new(PROGRAM, buggy));

    if header.os == OS_NTFS {
        let mut ntfs = bsd;
        ntfs.push("--quirk".to_string());
        ntfs.push("ntfs".to_string());
        list.push(Candidate::new(PROGRAM, ntfs));
    }
    list
}

/// Whether the replayed header must carry the stored timestamp: either a
/// name is stored (no `-n`) or `-M` forces the timestamp despite `-n`.
fn needs_timestamp(params: &[String]) -> bool {
    params.iter().any(|p| p == "-M") || !params.iter().any(|p| p == "-n")
}

/// Full argument vector for one invocation: the stored params plus the
/// name and timestamp transported outside them.
pub(crate) fn argv(params: &[String], filename: &str, timestamp: u32) -> Vec<OsString> {
    let mut argv: Vec<OsString> = params.iter().map(OsString::from).collect();
    if !filename.is_empty() {
        argv.push("--original-name".into());
        argv.push(filename.into());
    }
    if timestamp != 0 && needs_timestamp(params) {
        argv.push("--timestamp".into());
        argv.push(timestamp.to_string().into());
    }
    argv
}

/// Identifies the producing invocation of `archive` given its decompressed
/// `plaintext`, storing a residual patch when no candidate is exact.
pub(crate) fn gendelta(
    archive: &Path,
    plaintext: &Path,
    scratch: &Scratch,
) -> Result<WrapperDelta> {
    let header = GzHeader::from_path(archive)?;
    let filename = header.filename.clone().unwrap_or_default();
    let sha1sum = digest::sha1_base64_file(archive)?;
    let list = candidates(&header);

    let wrapper = |params: Vec<String>, patch: Option<Vec<u8>>| WrapperDelta {
        kind: CompressionKind::Gzip,
        params,
        program: None,
        filename: Some(filename.clone()),
        timestamp: Some(header.mtime),
        sha1sum: Some(sha1sum.clone()),
        patch,
    };

    for candidate in &list {
        let argv = argv(&candidate.params, &filename, header.mtime);
        debug!("trying {PROGRAM} {}", candidate.params.join(" "));
        if process::output_matches_file(candidate.program, &argv, plaintext, archive)? {
            return Ok(wrapper(candidate.params.clone(), None));
        }
    }

    warn!(
        "no invocation reproduces {} exactly, searching for the smallest residual delta",
        archive.display()
    );
    let original_len = fs::metadata(archive)?.len();
    let mut best: Option<(u64, usize, std::path::PathBuf)> = None;
    for (index, candidate) in list.iter().enumerate() {
        let argv = argv(&candidate.params, &filename, header.mtime);
        let approx = scratch.file("approx.gz");
        match process::run_filter(candidate.program, &argv, plaintext, &approx, &[]) {
            Ok(()) => {}
            Err(Error::SubprocessFailure { .. }) => continue,
            Err(err) => return Err(err),
        }
        let residual = scratch.file("wrapper.delta");
        patch::diff(&approx, archive, &residual)?;
        let len = fs::metadata(&residual)?.len();
        // Strictly smaller, so ties keep the earlier candidate.
        if best.as_ref().is_none_or(|(b, _, _)| len < *b) {
            best = Some((len, index, residual));
        }
    }

    let Some((len, index, residual)) = best else {
        return Err(Error::ReproductionFailure {
            path: archive.to_path_buf(),
        });
    };
    if original_len > 0 {
        if len >= original_len {
            warn!("storing entire file in delta for {}", archive.display());
        } else if len * 10 > original_len {
            warn!(
                "wrapper delta for {} is {}% of the original size",
                archive.display(),
                len * 100 / original_len
            );
        }
    }
    Ok(wrapper(list[index].params.clone(), Some(fs::read(&residual)?)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::formats::gzip::FNAME;
    use crate::test_utils::gz_member_header;

    fn parse(raw: &[u8]) -> GzHeader {
        GzHeader::parse(&mut &raw[..]).unwrap()
    }

    fn param_lists(header: &GzHeader) -> Vec<Vec<String>> {
        candidates(header)
            .into_iter()
            .map(|c| c.params)
            .collect()
    }

    #[test]
    fn test_unix_ladder_order() {
        let header = parse(&gz_member_header(0, 0, 2, OS_UNIX, None));
        let lists = param_lists(&header);
        assert_eq!(
            lists,
            vec![
                vec!["--gnu", "-n", "-9"],
                vec!["--gnu", "-n", "-9", "--rsyncable"],
                vec!["-n", "-9", "--osflag", "3"],
                vec!["-n", "-9", "--osflag", "3", "--quirk", "buggy-bsd"],
            ]
            .into_iter()
            .map(|v: Vec<&str>| v.into_iter().map(str::to_string).collect::<Vec<_>>())
            .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_ntfs_ladder_skips_gnu_and_adds_quirk() {
        let header = parse(&gz_member_header(0, 0, 0, OS_NTFS, None));
        let lists = param_lists(&header);
        assert_eq!(lists.len(), 3);
        assert_eq!(lists[0], vec!["-n", "--osflag", "11"]);
        assert!(lists[2].contains(&"ntfs".to_string()));
    }

    #[test]
    fn test_stored_mtime_without_name_adds_big_m() {
        let header = parse(&gz_member_header(0, 12345, 0, OS_UNIX, None));
        let lists = param_lists(&header);
        assert_eq!(lists[0], vec!["--gnu", "-n", "-M"]);
    }

    #[test]
    fn test_stored_name_suppresses_n() {
        let header = parse(&gz_member_header(FNAME, 12345, 4, OS_UNIX, Some("p.tar")));
        let lists = param_lists(&header);
        assert_eq!(lists[0], vec!["--gnu", "-1"]);
    }

    #[test]
    fn test_argv_appends_name_and_timestamp() {
        let params = vec!["--gnu".to_string(), "-1".to_string()];
        let argv = argv(&params, "p.tar", 12345);
        let rendered: Vec<String> = argv
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            rendered,
            ["--gnu", "-1", "--original-name", "p.tar", "--timestamp", "12345"]
        );
    }

    #[test]
    fn test_argv_skips_timestamp_with_dash_n() {
        let params = vec!["--gnu".to_string(), "-n".to_string()];
        let argv = argv(&params, "", 12345);
        assert_eq!(argv.len(), 2);
    }

    #[test]
    fn test_argv_honours_big_m() {
        let params = vec!["-n".to_string(), "-M".to_string()];
        let argv = argv(&params, "", 777);
        let rendered: Vec<String> = argv
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        assert_eq!(rendered, ["-n", "-M", "--timestamp", "777"]);
    }
}
