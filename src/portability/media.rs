//! Media bundler.
//!
//! Export side: gather every file a flashcard references from the flat media
//! directory, deduplicated by bare filename, recompressing raster images.
//! Import side: copy staged media into the media directory in small batches,
//! overwriting same-named files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::ColorType;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::model::{Flashcard, MediaKind};
use crate::portability::types::{PortResult, PortabilityError};

/// Archive folder for images.
pub const IMAGES_DIR: &str = "images";

/// Archive folder for audio.
pub const AUDIO_DIR: &str = "audio";

/// A media file ready to be written into a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
}

/// Media collected for one export, keyed by bare filename.
#[derive(Debug, Default, Clone)]
pub struct MediaBundle {
    pub files: BTreeMap<String, MediaFile>,
    /// Referenced names that were absent from the media directory.
    pub missing: Vec<String>,
}

impl MediaBundle {
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Path of a media file inside the archive.
#[must_use]
pub fn archive_path(kind: MediaKind, name: &str) -> String {
    match kind {
        MediaKind::Audio => format!("media/{AUDIO_DIR}/{name}"),
        MediaKind::Image | MediaKind::Text => format!("media/{IMAGES_DIR}/{name}"),
    }
}

/// Strip any directory components; `None` for names like `..`.
#[must_use]
pub fn bare_name(name: &str) -> Option<&str> {
    Path::new(name).file_name().and_then(|n| n.to_str())
}

fn is_compressible(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            e.eq_ignore_ascii_case("jpg")
                || e.eq_ignore_ascii_case("jpeg")
                || e.eq_ignore_ascii_case("png")
        })
}

/// Re-encode a raster image as JPEG at `quality`.
///
/// Returns `None` if the bytes do not decode as an image.
#[must_use]
pub fn compress_image(bytes: &[u8], quality: u8) -> Option<Vec<u8>> {
    let img = image::load_from_memory(bytes).ok()?;
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .ok()?;
    Some(out)
}

/// Collect the media referenced by `cards` from `source_dir`.
///
/// Each filename is read once. Missing files are logged and listed in
/// `missing`; they never fail the export. Images keep their filename even
/// when re-encoded.
pub fn collect(cards: &[Flashcard], source_dir: &Path, jpeg_quality: u8) -> MediaBundle {
    let mut bundle = MediaBundle::default();

    for card in cards {
        for (kind, raw_name) in card.media_files() {
            let Some(name) = bare_name(raw_name) else {
                warn!(card = %card.id, file = %raw_name, "Skipping media with unusable name");
                continue;
            };
            if bundle.files.contains_key(name) || bundle.missing.iter().any(|m| m == name) {
                continue;
            }

            let bytes = match fs::read(source_dir.join(name)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(card = %card.id, file = %name, error = %e, "Media file missing, skipped");
                    bundle.missing.push(name.to_string());
                    continue;
                }
            };

            let bytes = if kind == MediaKind::Image && is_compressible(name) {
                compress_image(&bytes, jpeg_quality).unwrap_or_else(|| {
                    debug!(file = %name, "Image did not decode, bundling as-is");
                    bytes
                })
            } else {
                bytes
            };

            bundle.files.insert(name.to_string(), MediaFile { kind, bytes });
        }
    }

    bundle
}

/// Files under a staged media tree, in a stable order.
fn staged_files(staged: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = [IMAGES_DIR, AUDIO_DIR]
        .iter()
        .map(|sub| staged.join(sub))
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| {
            WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(walkdir::DirEntry::into_path)
                .collect::<Vec<_>>()
        })
        .collect();
    files.dedup();
    files
}

/// Place staged media into `media_dir`.
///
/// Copies `batch_size` files at a time and sleeps `pause` between batches.
/// Existing files with the same name are overwritten. Returns the number of
/// files placed.
///
/// # Errors
///
/// Returns `MediaWrite` naming the first file that could not be written.
pub async fn place(
    staged: &Path,
    media_dir: &Path,
    batch_size: usize,
    pause: Duration,
) -> PortResult<usize> {
    let files = staged_files(staged);
    if files.is_empty() {
        return Ok(0);
    }

    tokio::fs::create_dir_all(media_dir)
        .await
        .map_err(|source| PortabilityError::MediaWrite {
            file: media_dir.display().to_string(),
            source,
        })?;

    let mut placed = 0;
    for (i, batch) in files.chunks(batch_size.max(1)).enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        for src in batch {
            let Some(name) = src.file_name() else {
                continue;
            };
            let dest = media_dir.join(name);
            tokio::fs::copy(src, &dest)
                .await
                .map_err(|source| PortabilityError::MediaWrite {
                    file: name.to_string_lossy().into_owned(),
                    source,
                })?;
            placed += 1;
        }
        debug!(batch = i, placed, "Placed media batch");
    }

    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaRef;
    use image::{DynamicImage, ImageOutputFormat, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([200, 40, 40])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_collect_dedupes_and_skips_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cell.png"), png_bytes()).unwrap();
        fs::write(dir.path().join("bonjour.m4a"), b"audio-bytes").unwrap();

        let cards = vec![
            Flashcard::new("q1", "a1", "d")
                .with_question_media(MediaRef::image("cell.png"))
                .with_answer_media(MediaRef::audio("bonjour.m4a", 0.8)),
            Flashcard::new("q2", "a2", "d").with_question_media(MediaRef::image("cell.png")),
            Flashcard::new("q3", "a3", "d").with_question_media(MediaRef::image("gone.jpg")),
        ];

        let bundle = collect(&cards, dir.path(), 50);

        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.missing, vec!["gone.jpg".to_string()]);

        let image = &bundle.files["cell.png"];
        assert_eq!(image.kind, MediaKind::Image);
        assert_eq!(&image.bytes[..2], &[0xFF, 0xD8]);

        let audio = &bundle.files["bonjour.m4a"];
        assert_eq!(audio.kind, MediaKind::Audio);
        assert_eq!(audio.bytes, b"audio-bytes");
    }

    #[test]
    fn test_undecodable_image_is_bundled_verbatim() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();
        let cards =
            vec![Flashcard::new("q", "a", "d").with_question_media(MediaRef::image("broken.jpg"))];

        let bundle = collect(&cards, dir.path(), 50);
        assert_eq!(bundle.files["broken.jpg"].bytes, b"not a jpeg");
    }

    #[test]
    fn test_archive_paths_and_bare_names() {
        assert_eq!(archive_path(MediaKind::Image, "a.png"), "media/images/a.png");
        assert_eq!(archive_path(MediaKind::Audio, "b.m4a"), "media/audio/b.m4a");
        assert_eq!(bare_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(bare_name(".."), None);
    }

    #[tokio::test]
    async fn test_place_batches_and_overwrites() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let images = staged.path().join(IMAGES_DIR);
        let audio = staged.path().join(AUDIO_DIR);
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&audio).unwrap();
        for i in 0..23 {
            fs::write(images.join(format!("img{i:02}.jpg")), format!("new{i}")).unwrap();
        }
        fs::write(audio.join("clip.m4a"), b"clip").unwrap();
        fs::write(target.path().join("img00.jpg"), b"old").unwrap();

        let placed = place(staged.path(), target.path(), 10, Duration::from_millis(1))
            .await
            .unwrap();

        assert_eq!(placed, 24);
        assert_eq!(fs::read(target.path().join("img00.jpg")).unwrap(), b"new0");
        assert!(target.path().join("clip.m4a").exists());
    }

    #[tokio::test]
    async fn test_place_with_nothing_staged() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let placed = place(staged.path(), &target.path().join("media"), 10, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(placed, 0);
        assert!(!target.path().join("media").exists());
    }
}
