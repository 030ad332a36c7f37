//! Property-based tests for manifest normalisation and the flat
//! encoding.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use retar_core::Manifest;
use retar_core::WrapperDelta;
use retar_core::delta::digest;
use retar_core::delta::flat;
use retar_core::formats::CompressionKind;

proptest! {
    /// Normalised manifests never contain empty entries or entries with
    /// leading `/` or `./`, whatever the input lines look like.
    #[test]
    fn manifest_entries_are_normalised(lines in proptest::collection::vec("[ -~]{0,20}", 0..20)) {
        let text = lines.join("\n");
        let manifest = Manifest::parse(&text);
        for path in manifest.paths() {
            prop_assert!(!path.is_empty());
            prop_assert!(!path.starts_with('/'));
            prop_assert!(!path.starts_with("./"));
        }
    }

    /// Parsing a manifest's own wire form is the identity.
    #[test]
    fn manifest_wire_form_round_trips(lines in proptest::collection::vec("[a-z0-9./-]{1,20}", 0..20)) {
        let manifest = Manifest::parse(&lines.join("\n"));
        let reparsed = Manifest::parse(&manifest.to_text());
        prop_assert_eq!(&reparsed, &manifest);
    }

    /// Any stored gz filename survives the flat encoding, spaces,
    /// percent signs and non-ASCII included.
    #[test]
    fn flat_filename_round_trips(filename in "\\PC{0,40}") {
        let wrapper = WrapperDelta {
            kind: CompressionKind::Gzip,
            params: vec!["-n".to_string()],
            program: None,
            filename: Some(filename.clone()),
            timestamp: Some(0),
            sha1sum: Some(digest::sha1_base64(b"pristine")),
            patch: None,
        };
        let message = flat::encode(&wrapper, None).unwrap();
        let (decoded, _) = flat::decode(&message).unwrap();
        prop_assert_eq!(decoded.filename.as_deref(), Some(filename.as_str()));
    }

    /// The multipart body framing never corrupts patch or plaintext.
    #[test]
    fn flat_multipart_round_trips(
        patch in proptest::collection::vec(any::<u8>(), 1..200),
        plaintext in proptest::collection::vec(any::<u8>(), 0..200),
    ) {
        let wrapper = WrapperDelta {
            kind: CompressionKind::Bzip2,
            params: vec!["-9".to_string()],
            program: Some("bzip2".to_string()),
            filename: None,
            timestamp: None,
            sha1sum: Some(digest::sha1_base64(&plaintext)),
            patch: Some(patch.clone()),
        };
        let message = flat::encode(&wrapper, Some(&plaintext)).unwrap();
        let (decoded, embedded) = flat::decode(&message).unwrap();
        prop_assert_eq!(decoded.patch.unwrap(), patch);
        prop_assert_eq!(embedded.unwrap(), plaintext);
    }
}
