//! Bzip2 replay search.
//!
//! The signature digit pins the compression level, leaving only the
//! producing program to find. The ladder tries each supported program at
//! that level; with try-harder enabled a pbzip2 block-size sweep follows,
//! since pbzip2 splits its input into multiple streams at boundaries the
//! block size controls. There is no residual-patch fallback for bz2.

use std::path::Path;

use log::debug;
use log::warn;

use crate::Error;
use crate::Options;
use crate::Result;
use crate::WrapperDelta;
use crate::delta::digest;
use crate::formats::CompressionKind;
use crate::formats::bzip2::Bz2Header;
use crate::process;

use super::Candidate;

/// Identifies the producing program and invocation of `archive` given
/// its decompressed `plaintext`.
pub(crate) fn gendelta(
    archive: &Path,
    plaintext: &Path,
    opts: &Options,
) -> Result<WrapperDelta> {
    let header = Bz2Header::from_path(archive)?;
    let level = format!("-{}", header.level);
    let sha1sum = digest::sha1_base64_file(archive)?;

    let wrapper = |candidate: &Candidate| WrapperDelta {
        kind: CompressionKind::Bzip2,
        params: candidate.params.clone(),
        program: Some(candidate.program.to_string()),
        filename: None,
        timestamp: None,
        sha1sum: Some(sha1sum.clone()),
        patch: None,
    };

    let ladder = [
        Candidate::new("bzip2", vec![level.clone()]),
        Candidate::new("pbzip2", vec![level.clone()]),
        Candidate::new("zgz", vec![level.clone(), "--old-bzip2".to_string()]),
    ];
    for candidate in &ladder {
        if which::which(candidate.program).is_err() {
            debug!("{} not installed, skipping", candidate.program);
            continue;
        }
        debug!("trying {} {}", candidate.program, candidate.params.join(" "));
        if process::output_matches_file(
            candidate.program,
            &candidate.params,
            plaintext,
            archive,
        )? {
            return Ok(wrapper(candidate));
        }
    }

    if opts.try_harder {
        if which::which("pbzip2").is_ok() {
            for block_size in block_size_sweep() {
                let candidate = Candidate::new(
                    "pbzip2",
                    vec![level.clone(), format!("-b{block_size}")],
                );
                debug!("trying pbzip2 {}", candidate.params.join(" "));
                if process::output_matches_file(
                    candidate.program,
                    &candidate.params,
                    plaintext,
                    archive,
                )? {
                    return Ok(wrapper(&candidate));
                }
            }
        }
    } else {
        warn!(
            "no supported bzip2 invocation reproduces {}; a block-size sweep (try harder) might",
            archive.display()
        );
    }

    Err(Error::ReproductionFailure {
        path: archive.to_path_buf(),
    })
}

/// Block sizes for the try-harder sweep: the common low sizes first,
/// then round multiples, then the remaining values. 9 is pbzip2's
/// default and was already covered by the first pass.
fn block_size_sweep() -> Vec<u32> {
    let mut seen = [false; 101];
    seen[9] = true;
    let mut order = Vec::new();
    for n in (1..=10u32).chain((15..=95).step_by(5)).chain(11..=100) {
        if !seen[n as usize] {
            seen[n as usize] = true;
            order.push(n);
        }
    }
    order
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_starts_with_small_sizes() {
        let order = block_size_sweep();
        assert_eq!(order[..10], [1, 2, 3, 4, 5, 6, 7, 8, 10, 15]);
    }

    #[test]
    fn test_sweep_skips_nine_and_covers_the_rest() {
        let order = block_size_sweep();
        assert!(!order.contains(&9));
        assert_eq!(order.len(), 99);
        for n in (1..=100u32).filter(|&n| n != 9) {
            assert!(order.contains(&n), "missing block size {n}");
        }
    }

    #[test]
    fn test_sweep_round_multiples_before_gap_fill() {
        let order = block_size_sweep();
        let pos = |n: u32| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(95) < pos(11));
        assert!(pos(20) < pos(16));
    }
}
