//! Package codec: ZIP archive layout and legacy bare JSON.
//!
//! Archive layout:
//!
//! ```text
//! manifest.json          provenance, data checksum, media checksums
//! data.json              the data record
//! media/images/<name>    image files
//! media/audio/<name>     audio files
//! ```
//!
//! JSON is deflated; media is stored since it is already compressed.
//!
//! Decoding caps the total uncompressed size of an archive. Entries are
//! streamed through that cap, so a small archive cannot expand past it.

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::portability::hash::{HashingWriter, digest_matches, sha256_hex};
use crate::portability::media::{AUDIO_DIR, IMAGES_DIR, MediaBundle, archive_path};
use crate::portability::preflight::MAX_PACKAGE_BYTES;
use crate::portability::types::{
    Manifest, ManifestEntry, PackageRecord, PortResult, PortabilityError,
};

pub const DATA_FILE: &str = "data.json";
pub const MANIFEST_FILE: &str = "manifest.json";
const MEDIA_PREFIX: &str = "media";

/// ZIP local file header magic.
const ZIP_MAGIC: &[u8] = b"PK";

/// A decoded package, media staged on disk.
#[derive(Debug)]
pub struct DecodedPackage {
    /// Absent for legacy bare JSON and for archives written before manifests.
    pub manifest: Option<Manifest>,
    /// Raw data record, not yet validated.
    pub record: Value,
    /// Root holding `images/` and `audio/`, if the package carried media.
    pub media_dir: Option<PathBuf>,
}

#[must_use]
pub fn is_archive(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

fn zip_io(e: ZipError) -> PortabilityError {
    PortabilityError::Io(std::io::Error::other(e))
}

/// Encode a package archive.
///
/// `manifest` supplies provenance; its checksum and media list are filled here.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn encode(
    mut manifest: Manifest,
    record: &PackageRecord,
    media: &MediaBundle,
) -> PortResult<Vec<u8>> {
    let data = serde_json::to_vec_pretty(record).map_err(std::io::Error::from)?;

    manifest.data_sha256 = sha256_hex(&data);
    manifest.media = media
        .files
        .iter()
        .map(|(name, file)| ManifestEntry {
            path: archive_path(file.kind, name),
            kind: file.kind.as_str().to_string(),
            size: file.bytes.len() as u64,
            sha256: sha256_hex(&file.bytes),
        })
        .collect();
    let manifest_json = serde_json::to_vec_pretty(&manifest).map_err(std::io::Error::from)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    zip.start_file(MANIFEST_FILE, deflated).map_err(zip_io)?;
    zip.write_all(&manifest_json)?;

    zip.start_file(DATA_FILE, deflated).map_err(zip_io)?;
    zip.write_all(&data)?;

    for (entry, file) in manifest.media.iter().zip(media.files.values()) {
        zip.start_file(entry.path.as_str(), stored).map_err(zip_io)?;
        zip.write_all(&file.bytes)?;
    }

    let cursor = zip.finish().map_err(zip_io)?;
    Ok(cursor.into_inner())
}

/// Uncompressed bytes an archive may still produce.
struct Budget {
    limit: u64,
    used: u64,
}

impl Budget {
    fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Bytes to read before the cap is known to be exceeded.
    fn read_limit(&self) -> u64 {
        self.limit.saturating_sub(self.used).saturating_add(1)
    }

    fn charge(&mut self, n: u64) -> PortResult<()> {
        self.used = self.used.saturating_add(n);
        if self.used > self.limit {
            return Err(PortabilityError::PackageTooLarge {
                max: self.limit,
                actual: self.used,
            });
        }
        Ok(())
    }
}

/// Decode a package, staging media under `scratch`, with the default
/// expansion cap of [`MAX_PACKAGE_BYTES`].
///
/// # Errors
///
/// See [`decode_with_limit`].
pub fn decode(bytes: &[u8], scratch: &Path) -> PortResult<DecodedPackage> {
    decode_with_limit(bytes, scratch, MAX_PACKAGE_BYTES)
}

/// Decode a package, staging media under `scratch`.
///
/// Accepts a ZIP archive or a legacy bare JSON record. An archive whose
/// entries expand to more than `limit` bytes is rejected before or while
/// they are read.
///
/// # Errors
///
/// Returns `InvalidFormat` for unreadable archives, a missing data file,
/// checksum mismatches, or a data record that is not a JSON object.
/// Returns `PackageTooLarge` when the archive expands past `limit`.
pub fn decode_with_limit(bytes: &[u8], scratch: &Path, limit: u64) -> PortResult<DecodedPackage> {
    if !is_archive(bytes) {
        debug!("Decoding legacy JSON package");
        return Ok(DecodedPackage {
            manifest: None,
            record: parse_record(bytes)?,
            media_dir: None,
        });
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PortabilityError::InvalidFormat(format!("unreadable archive: {e}")))?;

    let declared = declared_size(&mut archive)?;
    if declared > limit {
        return Err(PortabilityError::PackageTooLarge {
            max: limit,
            actual: declared,
        });
    }
    let mut budget = Budget::new(limit);

    let manifest = match read_entry(&mut archive, MANIFEST_FILE, &mut budget)? {
        Some(raw) => Some(serde_json::from_slice::<Manifest>(&raw).map_err(|e| {
            PortabilityError::InvalidFormat(format!("{MANIFEST_FILE}: {e}"))
        })?),
        None => None,
    };

    let data = read_entry(&mut archive, DATA_FILE, &mut budget)?.ok_or_else(|| {
        PortabilityError::InvalidFormat(format!("archive has no {DATA_FILE}"))
    })?;
    if let Some(m) = &manifest {
        if !digest_matches(&data, &m.data_sha256) {
            return Err(PortabilityError::InvalidFormat(format!(
                "{DATA_FILE} checksum mismatch"
            )));
        }
    }
    let record = parse_record(&data)?;

    let expected: HashMap<&str, &str> = manifest
        .iter()
        .flat_map(|m| m.media.iter())
        .map(|e| (e.path.as_str(), e.sha256.as_str()))
        .collect();
    let media_root = scratch.join(MEDIA_PREFIX);
    let staged = stage_media(&mut archive, &media_root, &expected, &mut budget)?;

    Ok(DecodedPackage {
        manifest,
        record,
        media_dir: (staged > 0).then_some(media_root),
    })
}

fn parse_record(bytes: &[u8]) -> PortResult<Value> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| PortabilityError::InvalidFormat(format!("data record: {e}")))?;
    if !value.is_object() {
        return Err(PortabilityError::InvalidFormat(
            "data record is not a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Sum of the uncompressed sizes the archive's headers declare.
fn declared_size<R: Read + io::Seek>(archive: &mut ZipArchive<R>) -> PortResult<u64> {
    let mut total: u64 = 0;
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| PortabilityError::InvalidFormat(format!("entry {i}: {e}")))?;
        total = total.saturating_add(entry.size());
    }
    Ok(total)
}

fn read_entry<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    budget: &mut Budget,
) -> PortResult<Option<Vec<u8>>> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(PortabilityError::InvalidFormat(format!("{name}: {e}")));
        }
    };
    let mut buf = Vec::new();
    let read = file
        .take(budget.read_limit())
        .read_to_end(&mut buf)
        .map_err(|e| PortabilityError::InvalidFormat(format!("{name}: {e}")))?;
    budget.charge(read as u64)?;
    Ok(Some(buf))
}

/// `media/<images|audio>/<name>` → `<images|audio>/<name>`; anything else is `None`.
fn media_relative(path: &Path) -> Option<PathBuf> {
    let rel = path.strip_prefix(MEDIA_PREFIX).ok()?;
    let mut parts = rel.components();
    let folder = match parts.next()? {
        Component::Normal(f) if f == IMAGES_DIR || f == AUDIO_DIR => f,
        _ => return None,
    };
    let name = match parts.next()? {
        Component::Normal(n) => n,
        _ => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(Path::new(folder).join(name))
}

fn stage_media<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    media_root: &Path,
    expected: &HashMap<&str, &str>,
    budget: &mut Budget,
) -> PortResult<usize> {
    let mut staged = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| PortabilityError::InvalidFormat(format!("entry {i}: {e}")))?;
        if entry.is_dir() || !entry.name().starts_with(MEDIA_PREFIX) {
            continue;
        }

        let name = entry.name().to_string();
        let Some(rel) = entry.enclosed_name().as_deref().and_then(media_relative) else {
            warn!(entry = %name, "Skipping media entry with unsafe path");
            continue;
        };

        let dest = media_root.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = HashingWriter::new(BufWriter::new(fs::File::create(&dest)?));
        let written = io::copy(&mut (&mut entry).take(budget.read_limit()), &mut writer)
            .map_err(|e| PortabilityError::InvalidFormat(format!("{name}: {e}")))?;
        budget.charge(written)?;
        let (mut out, digest) = writer.finish();
        out.flush()?;

        if let Some(sha) = expected.get(name.as_str()) {
            if !sha.is_empty() && !digest.eq_ignore_ascii_case(sha) {
                return Err(PortabilityError::InvalidFormat(format!(
                    "{name} checksum mismatch"
                )));
            }
        }
        staged += 1;
    }
    Ok(staged)
}
