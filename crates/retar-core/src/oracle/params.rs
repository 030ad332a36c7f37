//! Compressor-parameter whitelist.
//!
//! Stored deltas name the exact compressor invocation to replay. Before
//! any compressor is spawned on restore, every token is checked against
//! the closed grammar below; anything else is a fatal validation error.
//! The check runs on restore only — generation writes tokens from its
//! own candidate tables, which are a subset of the grammar.

use crate::Error;
use crate::Result;
use crate::WrapperDelta;
use crate::formats::CompressionKind;

/// Compressor binaries a bz2 delta may name.
pub const BZ2_PROGRAMS: [&str; 3] = ["bzip2", "pbzip2", "zgz"];

/// Validates a wrapper delta's stored parameters and program.
///
/// # Errors
///
/// Returns [`Error::ParamValidation`] on the first token outside the
/// whitelist, or on a bz2 program outside [`BZ2_PROGRAMS`].
pub fn validate(wrapper: &WrapperDelta) -> Result<()> {
    match wrapper.kind {
        CompressionKind::Gzip => validate_gz(&wrapper.params),
        _ => {
            validate_bz2(&wrapper.params)?;
            if let Some(program) = &wrapper.program {
                if !BZ2_PROGRAMS.contains(&program.as_str()) {
                    return Err(reject(program));
                }
            }
            Ok(())
        }
    }
}

fn validate_gz(params: &[String]) -> Result<()> {
    let mut iter = params.iter();
    while let Some(token) = iter.next() {
        match token.as_str() {
            "--gnu" | "--rsyncable" | "-n" | "-m" | "-M" => {}
            // Value-taking options consume the following token unchecked.
            "--original-name" | "--quirk" | "--osflag" => {
                iter.next().ok_or_else(|| reject(token))?;
            }
            t if is_level(t) => {}
            t => return Err(reject(t)),
        }
    }
    Ok(())
}

fn validate_bz2(params: &[String]) -> Result<()> {
    for token in params {
        match token.as_str() {
            "--old-bzip2" => {}
            t if is_level(t) => {}
            t if is_block_size(t) => {}
            t => return Err(reject(t)),
        }
    }
    Ok(())
}

/// `-1` through `-9`.
fn is_level(token: &str) -> bool {
    matches!(token.as_bytes(), [b'-', d] if (b'1'..=b'9').contains(d))
}

/// `-b1` through `-b100`: the pbzip2 block-size recorded by the
/// try-harder sweep.
fn is_block_size(token: &str) -> bool {
    token
        .strip_prefix("-b")
        .and_then(|n| n.parse::<u32>().ok())
        .is_some_and(|n| (1..=100).contains(&n))
}

fn reject(token: &str) -> Error {
    Error::ParamValidation {
        token: token.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn gz(params: &[&str]) -> WrapperDelta {
        WrapperDelta {
            kind: CompressionKind::Gzip,
            params: params.iter().map(ToString::to_string).collect(),
            program: None,
            filename: Some(String::new()),
            timestamp: Some(0),
            sha1sum: None,
            patch: None,
        }
    }

    fn bz2(params: &[&str], program: &str) -> WrapperDelta {
        WrapperDelta {
            kind: CompressionKind::Bzip2,
            params: params.iter().map(ToString::to_string).collect(),
            program: Some(program.to_string()),
            filename: None,
            timestamp: None,
            sha1sum: None,
            patch: None,
        }
    }

    #[test]
    fn test_gz_accepts_generated_params() {
        validate(&gz(&["--gnu", "-n", "-M", "-9", "--rsyncable"])).unwrap();
        validate(&gz(&["-1", "--osflag", "11", "--quirk", "buggy-bsd"])).unwrap();
        validate(&gz(&["--original-name", "pkg.tar"])).unwrap();
        validate(&gz(&[])).unwrap();
    }

    #[test]
    fn test_gz_rejects_stray_tokens() {
        for bad in [
            &["--best"][..],
            &["-0"][..],
            &["-10"][..],
            &["--gnu", "; rm -rf /"][..],
            &["--quirk"][..], // value-taking option with no value
        ] {
            let err = validate(&gz(bad)).unwrap_err();
            assert!(matches!(err, Error::ParamValidation { .. }), "{bad:?}");
        }
    }

    #[test]
    fn test_bz2_accepts_levels_and_block_sizes() {
        validate(&bz2(&["-9"], "bzip2")).unwrap();
        validate(&bz2(&["-6", "-b17"], "pbzip2")).unwrap();
        validate(&bz2(&["-1", "--old-bzip2"], "zgz")).unwrap();
    }

    #[test]
    fn test_bz2_rejects_bad_tokens() {
        assert!(validate(&bz2(&["-b0"], "pbzip2")).is_err());
        assert!(validate(&bz2(&["-b101"], "pbzip2")).is_err());
        assert!(validate(&bz2(&["--rsyncable"], "bzip2")).is_err());
    }

    #[test]
    fn test_bz2_rejects_unknown_program() {
        let err = validate(&bz2(&["-9"], "lrzip")).unwrap_err();
        assert!(matches!(err, Error::ParamValidation { .. }));
    }
}
