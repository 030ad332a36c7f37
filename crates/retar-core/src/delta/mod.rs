//! Delta containers.
//!
//! A stored delta is a small gzipped ustar tar whose entries are plain
//! files: `version` gates decoding, `type` names what is being
//! reproduced, and the rest carry the manifest, binary patches and
//! compressor metadata. Readers ignore unknown entries, so the format
//! can grow, and refuse unknown major versions outright.

pub mod digest;
pub mod flat;

use std::collections::BTreeMap;
use std::io::Read;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::Error;
use crate::Manifest;
use crate::Result;
use crate::formats::CompressionKind;
use crate::formats::detect;

/// Version written into freshly generated tar deltas.
pub const TAR_DELTA_VERSION: &str = "2.0";

/// The delta for an archive's tar layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarDelta {
    /// Entry paths in original tar order.
    pub manifest: Manifest,
    /// Binary patch: pre-image canonical tar, post-image original tar.
    pub patch: Vec<u8>,
    /// Present iff the outer archive was compressed.
    pub wrapper: Option<WrapperDelta>,
}

impl TarDelta {
    /// Serialises into the gzipped-tar wire form.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from the in-memory archive writer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut entries: Vec<(&str, Vec<u8>)> = vec![
            ("version", format!("{TAR_DELTA_VERSION}\n").into_bytes()),
            ("type", b"tar\n".to_vec()),
            ("manifest", self.manifest.to_text().into_bytes()),
            ("delta", self.patch.clone()),
        ];
        let wrapper = match &self.wrapper {
            Some(wrapper) => Some(wrapper.to_bytes()?),
            None => None,
        };
        if let Some(bytes) = wrapper {
            entries.push(("wrapper", bytes));
        }
        pack_container(&entries)
    }

    /// Parses the wire form, gating on version and type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedVersion`] for a major version other
    /// than 2, [`Error::CompressionMismatch`] when the delta is not a tar
    /// delta, and [`Error::MissingDeltaEntry`] for absent entries.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let map = unpack_container(bytes)?;
        let version = text_entry(&map, "version")?;
        gate_version(&version, "tar", &[2])?;
        let kind = text_entry(&map, "type")?;
        if kind != "tar" {
            return Err(Error::CompressionMismatch {
                stored: kind,
                requested: "tar".to_string(),
            });
        }
        let manifest = Manifest::parse(&String::from_utf8_lossy(require(&map, "manifest")?));
        let patch = require(&map, "delta")?.clone();
        let wrapper = match map.get("wrapper") {
            Some(bytes) => Some(WrapperDelta::from_bytes(bytes)?),
            None => None,
        };
        Ok(Self {
            manifest,
            patch,
            wrapper,
        })
    }
}

/// The delta reproducing a compressed wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperDelta {
    /// `Gzip` or `Bzip2`; never `None`.
    pub kind: CompressionKind,
    /// Whitelisted compressor argument tokens, in invocation order.
    pub params: Vec<String>,
    /// Compressor binary name; bz2 only.
    pub program: Option<String>,
    /// Stored original-name header field, possibly empty; gz only.
    pub filename: Option<String>,
    /// Header modification time, seconds since epoch; gz only.
    pub timestamp: Option<u32>,
    /// Base64 SHA-1 of the original compressed file. Optional in legacy
    /// container deltas, enforced whenever present.
    pub sha1sum: Option<String>,
    /// Residual binary patch from best-reproduction output to the
    /// original; its presence makes this a version 3.0 delta.
    pub patch: Option<Vec<u8>>,
}

impl WrapperDelta {
    /// The version string this delta serialises with.
    #[must_use]
    pub fn version(&self) -> &'static str {
        if self.patch.is_some() { "3.0" } else { "2.0" }
    }

    /// Serialises into the gzipped-tar wire form.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from the in-memory archive writer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut entries: Vec<(&str, Vec<u8>)> = vec![
            ("version", format!("{}\n", self.version()).into_bytes()),
            ("type", format!("{}\n", self.kind.delta_type()).into_bytes()),
            ("params", format!("{}\n", self.params.join(" ")).into_bytes()),
        ];
        if let Some(program) = &self.program {
            entries.push(("program", format!("{program}\n").into_bytes()));
        }
        if let Some(filename) = &self.filename {
            entries.push(("filename", format!("{filename}\n").into_bytes()));
        }
        if let Some(timestamp) = self.timestamp {
            entries.push(("timestamp", format!("{timestamp}\n").into_bytes()));
        }
        if let Some(sha1sum) = &self.sha1sum {
            entries.push(("sha1sum", format!("{sha1sum}\n").into_bytes()));
        }
        if let Some(patch) = &self.patch {
            entries.push(("delta", patch.clone()));
        }
        pack_container(&entries)
    }

    /// Parses the wire form, gating on the per-type version window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedVersion`] outside the accepted majors
    /// (gz: 2 and 3; bz2: 2), [`Error::CompressionMismatch`] for a type
    /// that is not a compression wrapper, and
    /// [`Error::MissingDeltaEntry`] for absent entries.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let map = unpack_container(bytes)?;
        let kind_text = text_entry(&map, "type")?;
        let kind = match kind_text.as_str() {
            "gz" => CompressionKind::Gzip,
            "bz2" => CompressionKind::Bzip2,
            other => {
                return Err(Error::CompressionMismatch {
                    stored: other.to_string(),
                    requested: "gz or bz2".to_string(),
                });
            }
        };
        let version = text_entry(&map, "version")?;
        let accepted: &[u32] = match kind {
            CompressionKind::Gzip => &[2, 3],
            _ => &[2],
        };
        let (major, _) = gate_version(&version, kind_text.as_str(), accepted)?;

        let params = text_entry(&map, "params")?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let patch = map.get("delta").cloned();
        if major >= 3 && patch.is_none() {
            return Err(Error::MissingDeltaEntry { entry: "delta" });
        }

        let (program, filename, timestamp) = match kind {
            CompressionKind::Gzip => {
                let filename = line_entry(&map, "filename")?;
                let timestamp = text_entry(&map, "timestamp")?;
                let timestamp = timestamp.parse::<u32>().map_err(|_| Error::Io(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("bad timestamp in delta: {timestamp}"),
                    ),
                ))?;
                (None, Some(filename), Some(timestamp))
            }
            _ => (Some(text_entry(&map, "program")?), None, None),
        };
        let sha1sum = map
            .get("sha1sum")
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string());

        Ok(Self {
            kind,
            params,
            program,
            filename,
            timestamp,
            sha1sum,
            patch,
        })
    }
}

/// Parses "major.minor" and enforces the accepted major versions.
fn gate_version(version: &str, kind: &str, accepted: &[u32]) -> Result<(u32, u32)> {
    let reject = || Error::UnsupportedVersion {
        version: version.to_string(),
        kind: kind.to_string(),
    };
    let (major, minor) = version.split_once('.').ok_or_else(reject)?;
    let major: u32 = major.parse().map_err(|_| reject())?;
    let minor: u32 = minor.parse().map_err(|_| reject())?;
    if accepted.contains(&major) {
        Ok((major, minor))
    } else {
        Err(reject())
    }
}

fn require<'m>(
    map: &'m BTreeMap<String, Vec<u8>>,
    entry: &'static str,
) -> Result<&'m Vec<u8>> {
    map.get(entry).ok_or(Error::MissingDeltaEntry { entry })
}

/// A small text entry, whitespace-trimmed.
fn text_entry(map: &BTreeMap<String, Vec<u8>>, entry: &'static str) -> Result<String> {
    Ok(String::from_utf8_lossy(require(map, entry)?)
        .trim()
        .to_string())
}

/// A text entry where interior whitespace is meaningful; only the
/// trailing newline is removed. Stored gz filenames can contain spaces.
fn line_entry(map: &BTreeMap<String, Vec<u8>>, entry: &'static str) -> Result<String> {
    let text = String::from_utf8_lossy(require(map, entry)?).into_owned();
    Ok(text.strip_suffix('\n').unwrap_or(&text).to_string())
}

/// Packs entries into a gzipped ustar tar, in the given order, with
/// owner 0/0, mode 0644 and mtime 0 on every member.
fn pack_container(entries: &[(&str, Vec<u8>)]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = tar::Header::new_ustar();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(0);
        builder.append_data(&mut header, name, data.as_slice())?;
    }
    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Unpacks a plain or gzipped container into an entry map; unknown
/// entries simply end up unused.
fn unpack_container(bytes: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let reader: Box<dyn Read + '_> = match detect::detect_bytes(bytes) {
        CompressionKind::Gzip => Box::new(GzDecoder::new(bytes)),
        _ => Box::new(bytes),
    };
    let mut archive = tar::Archive::new(reader);
    let mut map = BTreeMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let name = name.trim_start_matches("./").to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        map.insert(name, data);
    }
    Ok(map)
}
