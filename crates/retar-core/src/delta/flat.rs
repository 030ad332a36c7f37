//! Flat wrapper-delta encoding.
//!
//! An alternate single-file wire form for wrapper deltas, used when the
//! content-tracking store wants one blob instead of a nested tarball: an
//! RFC-822-style header block, a blank line, and (only when reproduction
//! was inexact) a two-part body carrying the residual patch and the
//! decompressed plaintext, which makes the inexact form self-contained.
//!
//! The multipart boundary is the pristine SHA-1 in lowercase hex, so the
//! encoding stays deterministic.

use percent_encoding::AsciiSet;
use percent_encoding::CONTROLS;
use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;

use crate::Error;
use crate::Result;
use crate::formats::CompressionKind;

use super::WrapperDelta;
use super::digest;

/// Version stamped into every flat message.
pub const FLAT_RECODE_VERSION: &str = "1.0";

/// Characters escaped in the `Filename` header: controls cover newlines,
/// and space/`%` keep the header token-safe.
const FILENAME_SET: &AsciiSet = &CONTROLS.add(b' ').add(b'%');

/// Encodes a wrapper delta as a flat message.
///
/// `plaintext` is the decompressed inner stream; it is required exactly
/// when the delta carries a residual patch, because the multipart form
/// embeds it.
///
/// # Errors
///
/// Returns [`Error::MissingDeltaEntry`] when the delta has no pristine
/// hash or the multipart form is needed without a plaintext.
pub fn encode(wrapper: &WrapperDelta, plaintext: Option<&[u8]>) -> Result<Vec<u8>> {
    let sha1sum = wrapper
        .sha1sum
        .as_deref()
        .ok_or(Error::MissingDeltaEntry { entry: "sha1sum" })?;

    let mut head = String::new();
    let boundary = match &wrapper.patch {
        Some(_) => {
            let boundary = digest::base64_to_hex(sha1sum).ok_or(Error::MissingDeltaEntry {
                entry: "sha1sum",
            })?;
            head.push_str(&format!(
                "Content-Type: multipart/flat-recode; boundary={boundary}\n"
            ));
            Some(boundary)
        }
        None => {
            head.push_str("Content-Type: application/flat-recode\n");
            None
        }
    };
    head.push_str(&format!("Flat-Recode-Version: {FLAT_RECODE_VERSION}\n"));
    head.push_str(&format!("Pristine-SHA1: {sha1sum}\n"));
    head.push_str(&format!("Type: {}\n", wrapper.kind.delta_type()));
    match wrapper.kind {
        CompressionKind::Gzip => {
            let filename = wrapper.filename.as_deref().unwrap_or("");
            head.push_str(&format!(
                "Filename: {}\n",
                utf8_percent_encode(filename, FILENAME_SET)
            ));
            head.push_str(&format!(
                "Timestamp: {}\n",
                wrapper.timestamp.unwrap_or(0)
            ));
        }
        _ => {
            let program = wrapper
                .program
                .as_deref()
                .ok_or(Error::MissingDeltaEntry { entry: "program" })?;
            head.push_str(&format!("Program: {program}\n"));
        }
    }
    head.push_str(&format!("Params: {}\n", wrapper.params.join(" ")));
    head.push('\n');

    let mut message = head.into_bytes();
    if let (Some(boundary), Some(patch)) = (boundary, &wrapper.patch) {
        let plaintext = plaintext.ok_or(Error::MissingDeltaEntry { entry: "plaintext" })?;
        message.extend_from_slice(format!("--{boundary}\n").as_bytes());
        message.extend_from_slice(patch);
        message.extend_from_slice(format!("\n--{boundary}\n").as_bytes());
        message.extend_from_slice(plaintext);
        message.extend_from_slice(format!("\n--{boundary}--\n").as_bytes());
    }
    Ok(message)
}

/// Decodes a flat message back into a wrapper delta and, for the
/// multipart form, the embedded plaintext.
///
/// # Errors
///
/// Returns [`Error::UnsupportedVersion`] for an unknown
/// `Flat-Recode-Version` major, [`Error::MissingDeltaEntry`] for absent
/// mandatory headers (`Pristine-SHA1` included), and I/O-kind errors for
/// malformed framing.
pub fn decode(message: &[u8]) -> Result<(WrapperDelta, Option<Vec<u8>>)> {
    let split = find(message, b"\n\n").ok_or_else(|| malformed("missing header block"))?;
    let head = std::str::from_utf8(&message[..split])
        .map_err(|_| malformed("non-ASCII header block"))?;
    let body = &message[split + 2..];

    let version = required(head, "Flat-Recode-Version")?;
    if version.split('.').next() != Some("1") {
        return Err(Error::UnsupportedVersion {
            version: version.to_string(),
            kind: "flat-recode".to_string(),
        });
    }
    let sha1sum = required(head, "Pristine-SHA1")?.to_string();
    let content_type = required(head, "Content-Type")?;

    let kind = match required(head, "Type")? {
        "gz" => CompressionKind::Gzip,
        "bz2" => CompressionKind::Bzip2,
        other => {
            return Err(Error::CompressionMismatch {
                stored: other.to_string(),
                requested: "gz or bz2".to_string(),
            });
        }
    };
    let params = required(head, "Params")?
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let (program, filename, timestamp) = match kind {
        CompressionKind::Gzip => {
            let filename = percent_decode_str(required(head, "Filename")?)
                .decode_utf8()
                .map_err(|_| malformed("undecodable Filename header"))?
                .into_owned();
            let timestamp = required(head, "Timestamp")?
                .parse::<u32>()
                .map_err(|_| malformed("bad Timestamp header"))?;
            (None, Some(filename), Some(timestamp))
        }
        _ => (Some(required(head, "Program")?.to_string()), None, None),
    };

    let (patch, plaintext) = if content_type.starts_with("multipart/flat-recode") {
        let boundary = content_type
            .split("boundary=")
            .nth(1)
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| malformed("multipart without boundary"))?;
        let (patch, plaintext) = split_parts(body, boundary)?;
        (Some(patch), Some(plaintext))
    } else {
        (None, None)
    };

    let wrapper = WrapperDelta {
        kind,
        params,
        program,
        filename,
        timestamp,
        sha1sum: Some(sha1sum),
        patch,
    };
    Ok((wrapper, plaintext))
}

/// Splits the two-part body framed by `--boundary` lines.
fn split_parts(body: &[u8], boundary: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let opener = format!("--{boundary}\n").into_bytes();
    let divider = format!("\n--{boundary}\n").into_bytes();
    let closer = format!("\n--{boundary}--").into_bytes();

    if !body.starts_with(&opener) {
        return Err(malformed("body does not start with boundary"));
    }
    let rest = &body[opener.len()..];
    let mid = find(rest, &divider).ok_or_else(|| malformed("missing part divider"))?;
    let first = rest[..mid].to_vec();
    let rest = &rest[mid + divider.len()..];
    let end = find(rest, &closer).ok_or_else(|| malformed("missing closing boundary"))?;
    let second = rest[..end].to_vec();
    Ok((first, second))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        // Only the ASCII space separator is stripped; anything else in
        // the value is payload (filenames are percent-encoded).
        key.eq_ignore_ascii_case(name).then(|| value.trim_matches(' '))
    })
}

fn required<'a>(head: &'a str, name: &'static str) -> Result<&'a str> {
    header_value(head, name).ok_or(Error::MissingDeltaEntry { entry: name })
}

fn malformed(reason: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("malformed flat-recode message: {reason}"),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn gz_wrapper(patch: Option<Vec<u8>>) -> WrapperDelta {
        WrapperDelta {
            kind: CompressionKind::Gzip,
            params: vec!["--gnu".into(), "-n".into()],
            program: None,
            filename: Some("dir with space/pkg.tar".into()),
            timestamp: Some(1_600_000_000),
            sha1sum: Some(digest::sha1_base64(b"original gz bytes")),
            patch,
        }
    }

    #[test]
    fn test_single_body_round_trip() {
        let wrapper = gz_wrapper(None);
        let message = encode(&wrapper, None).unwrap();
        let text = String::from_utf8(message.clone()).unwrap();
        assert!(text.starts_with("Content-Type: application/flat-recode\n"));
        assert!(text.contains("Filename: dir%20with%20space/pkg.tar\n"));

        let (back, plaintext) = decode(&message).unwrap();
        assert_eq!(back, wrapper);
        assert!(plaintext.is_none());
    }

    #[test]
    fn test_multipart_round_trip() {
        let wrapper = gz_wrapper(Some(vec![0, 1, 2, 0xFF, b'\n', 3]));
        let plaintext = b"the decompressed inner tar".to_vec();
        let message = encode(&wrapper, Some(&plaintext)).unwrap();
        let text = String::from_utf8_lossy(&message);
        assert!(text.starts_with("Content-Type: multipart/flat-recode; boundary="));

        let (back, embedded) = decode(&message).unwrap();
        assert_eq!(back, wrapper);
        assert_eq!(embedded.unwrap(), plaintext);
    }

    #[test]
    fn test_bz2_headers() {
        let wrapper = WrapperDelta {
            kind: CompressionKind::Bzip2,
            params: vec!["-9".into()],
            program: Some("pbzip2".into()),
            filename: None,
            timestamp: None,
            sha1sum: Some(digest::sha1_base64(b"bz")),
            patch: None,
        };
        let message = encode(&wrapper, None).unwrap();
        let text = String::from_utf8(message.clone()).unwrap();
        assert!(text.contains("Type: bz2\n"));
        assert!(text.contains("Program: pbzip2\n"));
        let (back, _) = decode(&message).unwrap();
        assert_eq!(back, wrapper);
    }

    #[test]
    fn test_patch_without_plaintext_refused() {
        let wrapper = gz_wrapper(Some(vec![1]));
        assert!(encode(&wrapper, None).is_err());
    }

    #[test]
    fn test_missing_pristine_sha1_refused() {
        let mut wrapper = gz_wrapper(None);
        wrapper.sha1sum = None;
        let err = encode(&wrapper, None).unwrap_err();
        assert_eq!(err.to_string(), "delta lacks sha1sum");
    }

    #[test]
    fn test_unknown_version_refused() {
        let wrapper = gz_wrapper(None);
        let message = String::from_utf8(encode(&wrapper, None).unwrap()).unwrap();
        let bumped = message.replace("Flat-Recode-Version: 1.0", "Flat-Recode-Version: 2.0");
        let err = decode(bumped.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion { .. }));
    }
}
