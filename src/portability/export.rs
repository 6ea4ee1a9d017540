//! Package export.
//!
//! Reads the whole store in one read transaction so the package is a
//! consistent snapshot, serializes every entity, bundles referenced media
//! and encodes the archive.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::info;

use crate::model::{
    Evaluation, Flashcard, FlashcardDeck, Period, Subject, UserConfiguration, now,
};
use crate::portability::codec::encode;
use crate::portability::media::{self, MediaBundle};
use crate::portability::serialize::{format_date, serialize};
use crate::portability::types::{
    ExportStats, FORMAT_VERSION, Manifest, Metadata, PackageRecord, PortResult,
};
use crate::storage::SqliteStorage;
use crate::storage::sqlite::{
    fetch_decks, fetch_evaluations, fetch_flashcards, fetch_periods, fetch_subjects,
    fetch_user_configurations,
};

/// Default JPEG quality for bundled images.
pub const DEFAULT_JPEG_QUALITY: u8 = 50;

/// Every entity in the store at one point in time.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    pub user_configurations: Vec<UserConfiguration>,
    pub periods: Vec<Period>,
    pub subjects: Vec<Subject>,
    pub evaluations: Vec<Evaluation>,
    pub decks: Vec<FlashcardDeck>,
    pub flashcards: Vec<Flashcard>,
}

impl Snapshot {
    /// Read every collection inside one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn load(conn: &Connection) -> rusqlite::Result<Self> {
        let tx = conn.unchecked_transaction()?;
        let snapshot = Self {
            user_configurations: fetch_user_configurations(&tx)?,
            periods: fetch_periods(&tx)?,
            subjects: fetch_subjects(&tx)?,
            evaluations: fetch_evaluations(&tx)?,
            decks: fetch_decks(&tx)?,
            flashcards: fetch_flashcards(&tx)?,
        };
        tx.commit()?;
        Ok(snapshot)
    }
}

/// Builds packages from a store.
pub struct Exporter<'a> {
    storage: &'a SqliteStorage,
    media_dir: &'a Path,
    app_version: String,
    jpeg_quality: u8,
    user_defaults: Map<String, Value>,
}

impl<'a> Exporter<'a> {
    #[must_use]
    pub fn new(storage: &'a SqliteStorage, media_dir: &'a Path) -> Self {
        Self {
            storage,
            media_dir,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            user_defaults: Map::new(),
        }
    }

    #[must_use]
    pub fn with_app_version(mut self, version: &str) -> Self {
        self.app_version = version.to_string();
        self
    }

    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Preferences to carry as the package's `user_defaults`.
    #[must_use]
    pub fn with_user_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.user_defaults = defaults;
        self
    }

    /// Serialize a snapshot into a data record.
    #[must_use]
    pub fn build_record(&self, snapshot: &Snapshot, at: DateTime<Utc>) -> PackageRecord {
        PackageRecord {
            metadata: Metadata {
                export_date: format_date(&at),
                app_version: self.app_version.clone(),
                format_version: Some(FORMAT_VERSION.to_string()),
                platform_version: Some(std::env::consts::OS.to_string()),
            },
            user_defaults: self.user_defaults.clone(),
            user_configuration: snapshot.user_configurations.iter().map(serialize).collect(),
            periods: snapshot.periods.iter().map(serialize).collect(),
            subjects: snapshot.subjects.iter().map(serialize).collect(),
            evaluations: snapshot.evaluations.iter().map(serialize).collect(),
            flashcard_decks: snapshot.decks.iter().map(serialize).collect(),
            flashcards: snapshot.flashcards.iter().map(serialize).collect(),
        }
    }

    /// Collect the media a snapshot references.
    #[must_use]
    pub fn collect_media(&self, snapshot: &Snapshot) -> MediaBundle {
        media::collect(&snapshot.flashcards, self.media_dir, self.jpeg_quality)
    }

    /// Produce a complete package.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the archive cannot
    /// be written. Missing media files are skipped, not errors.
    pub fn export(&self) -> PortResult<(Vec<u8>, ExportStats)> {
        let at = now();
        let snapshot = Snapshot::load(self.storage.conn())?;
        let record = self.build_record(&snapshot, at);
        let bundle = self.collect_media(&snapshot);

        let manifest = Manifest {
            format_version: FORMAT_VERSION.to_string(),
            created_at: record.metadata.export_date.clone(),
            app_version: self.app_version.clone(),
            data_sha256: String::new(),
            media: Vec::new(),
        };
        let bytes = encode(manifest, &record, &bundle)?;

        let stats = ExportStats {
            entities: record.counts(),
            media_files: bundle.len(),
            media_missing: bundle.missing.len(),
            bytes: bytes.len() as u64,
        };
        info!(
            entities = stats.entities.total(),
            media = stats.media_files,
            missing = stats.media_missing,
            bytes = stats.bytes,
            "Package exported"
        );
        Ok((bytes, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaRef;
    use crate::portability::codec::decode;
    use tempfile::TempDir;

    #[test]
    fn test_empty_store_exports_empty_collections() {
        let storage = SqliteStorage::open_memory().unwrap();
        let media = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();

        let (bytes, stats) = Exporter::new(&storage, media.path()).export().unwrap();
        assert_eq!(stats.entities.total(), 0);

        let decoded = decode(&bytes, scratch.path()).unwrap();
        for key in ["periods", "subjects", "evaluations", "flashcard_decks", "flashcards"] {
            assert_eq!(decoded.record[key], serde_json::json!([]), "{key}");
        }
        assert_eq!(decoded.record["metadata"]["format_version"], FORMAT_VERSION);
        assert!(decoded.media_dir.is_none());
    }

    #[test]
    fn test_export_bundles_media_and_skips_missing() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let media = TempDir::new().unwrap();
        std::fs::write(media.path().join("voice.m4a"), b"voice").unwrap();

        let deck = FlashcardDeck::new("Spanish");
        storage.save_deck(&deck, "test").unwrap();
        let card = Flashcard::new("hola", "hello", &deck.id)
            .with_question_media(MediaRef::audio("voice.m4a", 1.0))
            .with_answer_media(MediaRef::image("missing.png"));
        storage.save_flashcard(&card, "test").unwrap();

        let mut defaults = Map::new();
        defaults.insert("username".into(), Value::String("Camille".into()));
        let (bytes, stats) = Exporter::new(&storage, media.path())
            .with_app_version("9.9.9")
            .with_user_defaults(defaults)
            .export()
            .unwrap();

        assert_eq!(stats.entities.flashcards, 1);
        assert_eq!(stats.media_files, 1);
        assert_eq!(stats.media_missing, 1);

        let scratch = TempDir::new().unwrap();
        let decoded = decode(&bytes, scratch.path()).unwrap();
        assert_eq!(decoded.record["metadata"]["app_version"], "9.9.9");
        assert_eq!(decoded.record["user_defaults"]["username"], "Camille");
        assert_eq!(decoded.record["flashcards"][0]["deckId"], deck.id.as_str());
        assert!(decoded.media_dir.unwrap().join("audio/voice.m4a").exists());
    }
}
