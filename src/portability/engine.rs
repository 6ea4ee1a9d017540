//! Engine facade.
//!
//! [`Porter`] owns the store, the preference surface and the notification
//! sink, and drives the full pipelines:
//!
//! - export: snapshot → serialize → bundle media → encode
//! - import: preflight → decode → validate → place media → import → reconcile
//!
//! Only one export and one import may run at a time; a second call fails
//! fast with `OperationInProgress`. Blocking work (decode, encode, the store
//! transaction) runs on the blocking pool; media placement runs on the
//! async runtime with pauses between batches.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::PortOptions;
use crate::config::prefs::{ACTIVE_PERIOD_KEY, PendingPreferences, PreferenceStore};
use crate::model::{new_id, now};
use crate::portability::codec::decode_with_limit;
use crate::portability::export::{Exporter, Snapshot};
use crate::portability::file::atomic_write_bytes;
use crate::portability::import::{ImportOutcome, Importer};
use crate::portability::media;
use crate::portability::notify::{EventSink, Notification, TracingSink};
use crate::portability::preflight::{FsSpaceProbe, SpaceProbe, check_destination};
use crate::portability::reconcile::{self, ReconcileOutcome};
use crate::portability::types::{
    ExportStats, Operation, PackageRecord, PortResult, PortabilityError,
};
use crate::portability::validate::{ValidationReport, validate};
use crate::storage::SqliteStorage;
use crate::storage::events::EventType;

/// Resets an operation flag when dropped.
struct OperationGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> OperationGuard<'a> {
    fn acquire(flag: &'a AtomicBool, operation: Operation) -> PortResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PortabilityError::OperationInProgress(operation))?;
        Ok(Self { flag })
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> PortResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| PortabilityError::Worker("shared state poisoned".to_string()))
}

async fn run_blocking<T, F>(f: F) -> PortResult<T>
where
    F: FnOnce() -> PortResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PortabilityError::Worker(e.to_string()))?
}

/// Export/import engine over one store.
pub struct Porter {
    storage: Arc<Mutex<SqliteStorage>>,
    prefs: Arc<Mutex<Box<dyn PreferenceStore>>>,
    sink: Arc<dyn EventSink>,
    probe: Arc<dyn SpaceProbe>,
    media_dir: PathBuf,
    scratch_root: PathBuf,
    options: PortOptions,
    exporting: AtomicBool,
    importing: AtomicBool,
}

impl Porter {
    /// Create an engine with the filesystem space probe and a logging sink.
    #[must_use]
    pub fn new(storage: SqliteStorage, prefs: Box<dyn PreferenceStore>, media_dir: &Path) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            prefs: Arc::new(Mutex::new(prefs)),
            sink: Arc::new(TracingSink),
            probe: Arc::new(FsSpaceProbe),
            media_dir: media_dir.to_path_buf(),
            scratch_root: std::env::temp_dir(),
            options: PortOptions::default(),
            exporting: AtomicBool::new(false),
            importing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: PortOptions) -> Self {
        self.options = options;
        self
    }

    /// Directory under which per-import scratch directories are created.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: &Path) -> Self {
        self.scratch_root = dir.to_path_buf();
        self
    }

    #[must_use]
    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    #[must_use]
    pub fn options(&self) -> &PortOptions {
        &self.options
    }

    /// Produce a package in memory.
    ///
    /// # Errors
    ///
    /// `OperationInProgress` if another export is running, otherwise any
    /// store or archive error.
    pub async fn export_bytes(&self) -> PortResult<(Vec<u8>, ExportStats)> {
        let _guard = OperationGuard::acquire(&self.exporting, Operation::Export)?;

        let user_defaults = lock(&self.prefs)?.user_defaults();
        let storage = Arc::clone(&self.storage);
        let media_dir = self.media_dir.clone();
        let options = self.options.clone();

        run_blocking(move || {
            let mut storage = lock(&storage)?;
            let (bytes, stats) = Exporter::new(&storage, &media_dir)
                .with_app_version(&options.app_version)
                .with_jpeg_quality(options.jpeg_quality)
                .with_user_defaults(user_defaults)
                .export()?;

            let note = format!(
                "{} entities, {} media files, {} bytes",
                stats.entities.total(),
                stats.media_files,
                stats.bytes
            );
            storage.mutate("export", &options.actor, |_, ctx| {
                ctx.record_note("package", &new_id(), EventType::PackageExported, &note);
                Ok::<_, PortabilityError>(())
            })?;
            Ok((bytes, stats))
        })
        .await
    }

    /// Produce a package and write it atomically to `path`.
    ///
    /// # Errors
    ///
    /// Same as [`Porter::export_bytes`], plus `Io` if the file cannot be written.
    pub async fn export_to(&self, path: &Path) -> PortResult<ExportStats> {
        let (bytes, stats) = self.export_bytes().await?;
        let path = path.to_path_buf();
        run_blocking(move || Ok(atomic_write_bytes(&path, &bytes)?)).await?;
        Ok(stats)
    }

    /// Import a package file. The file size is checked before it is read.
    ///
    /// # Errors
    ///
    /// Pre-mutation errors leave the store untouched; `Database` and
    /// `Consistency` errors mean the transaction was rolled back.
    pub async fn import_file(&self, path: &Path) -> PortResult<ImportOutcome> {
        let _guard = OperationGuard::acquire(&self.importing, Operation::Import)?;

        let size = tokio::fs::metadata(path).await?.len();
        self.preflight(size)?;
        let bytes = tokio::fs::read(path).await?;
        self.run_import(bytes).await
    }

    /// Import a package held in memory.
    ///
    /// # Errors
    ///
    /// See [`Porter::import_file`].
    pub async fn import_bytes(&self, bytes: Vec<u8>) -> PortResult<ImportOutcome> {
        let _guard = OperationGuard::acquire(&self.importing, Operation::Import)?;

        self.preflight(bytes.len() as u64)?;
        self.run_import(bytes).await
    }

    /// Decode and validate a package without touching the store.
    ///
    /// # Errors
    ///
    /// Any preflight, format, identity or referential error.
    pub async fn validate_bytes(&self, bytes: Vec<u8>) -> PortResult<ValidationReport> {
        self.preflight(bytes.len() as u64)?;
        let (_, report, _scratch) = self.decode_and_validate(bytes).await?;
        Ok(report)
    }

    /// Decode and validate a package file without touching the store.
    ///
    /// # Errors
    ///
    /// Any preflight, format, identity or referential error.
    pub async fn validate_file(&self, path: &Path) -> PortResult<ValidationReport> {
        let size = tokio::fs::metadata(path).await?.len();
        self.preflight(size)?;
        let bytes = tokio::fs::read(path).await?;
        let (_, report, _scratch) = self.decode_and_validate(bytes).await?;
        Ok(report)
    }

    /// Run the reconciler on the stored data in its own transaction and
    /// publish the active period.
    ///
    /// # Errors
    ///
    /// `OperationInProgress` while an import runs, otherwise any store error.
    /// `Preferences` if the transaction committed but the pointer could not
    /// be written.
    pub async fn reconcile(&self) -> PortResult<ReconcileOutcome> {
        let _guard = OperationGuard::acquire(&self.importing, Operation::Import)?;

        let storage = Arc::clone(&self.storage);
        let actor = self.options.actor.clone();
        let outcome = run_blocking(move || {
            lock(&storage)?.mutate("reconcile", &actor, |tx, ctx| {
                reconcile::reconcile(tx, ctx, now())
            })
        })
        .await?;

        if let Some(period) = &outcome.active_period {
            let mut pending = PendingPreferences::new();
            pending.stage(ACTIVE_PERIOD_KEY, Value::String(period.id.clone()));
            lock(&self.prefs)?.apply(&pending)?;
            if outcome.configurations_updated > 0 {
                self.sink.notify(&Notification::ActivePeriodChanged {
                    period_id: period.id.clone(),
                    period_name: period.name.clone(),
                    source: "reconcile".to_string(),
                });
            }
        }
        if outcome.schedules_corrected > 0 || outcome.configurations_updated > 0 {
            self.sink.notify(&Notification::DataChanged);
        }
        Ok(outcome)
    }

    /// Read every stored entity.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub async fn snapshot(&self) -> PortResult<Snapshot> {
        let storage = Arc::clone(&self.storage);
        run_blocking(move || Ok(Snapshot::load(lock(&storage)?.conn())?)).await
    }

    /// Read one preference.
    ///
    /// # Errors
    ///
    /// Returns `Worker` if the preference store lock is poisoned.
    pub fn preference(&self, key: &str) -> PortResult<Option<Value>> {
        Ok(lock(&self.prefs)?.get(key))
    }

    fn preflight(&self, size: u64) -> PortResult<()> {
        check_destination(
            self.probe.as_ref(),
            &self.media_dir,
            size,
            self.options.max_package_bytes,
            self.options.headroom_factor,
        )
    }

    /// Most bytes a package may expand to once decoded: the size limit, or
    /// what the destination holds under the same headroom rule.
    fn expansion_limit(&self) -> PortResult<u64> {
        let available = self.probe.available(&self.media_dir)?;
        let by_disk = available / self.options.headroom_factor.max(1);
        Ok(self.options.max_package_bytes.min(by_disk))
    }

    /// Decode into a fresh scratch directory and validate. The returned
    /// directory holds the staged media and is removed when dropped.
    async fn decode_and_validate(
        &self,
        bytes: Vec<u8>,
    ) -> PortResult<(DecodedRecord, ValidationReport, tempfile::TempDir)> {
        let limit = self.expansion_limit()?;
        std::fs::create_dir_all(&self.scratch_root)?;
        let scratch = tempfile::Builder::new()
            .prefix("sv-import-")
            .tempdir_in(&self.scratch_root)?;
        let scratch_path = scratch.path().to_path_buf();

        let (decoded, report) = run_blocking(move || {
            let decoded = decode_with_limit(&bytes, &scratch_path, limit)?;
            let report = validate(&decoded.record)?;
            let record = PackageRecord::from_value(decoded.record)?;
            Ok((
                DecodedRecord {
                    record,
                    media_dir: decoded.media_dir,
                },
                report,
            ))
        })
        .await?;
        debug!(
            entities = report.counts.total(),
            decks_to_create = report.decks_to_create.len(),
            "Package validated"
        );
        Ok((decoded, report, scratch))
    }

    async fn run_import(&self, bytes: Vec<u8>) -> PortResult<ImportOutcome> {
        let (decoded, report, _scratch) = self.decode_and_validate(bytes).await?;

        let placed = match &decoded.media_dir {
            Some(staged) => {
                media::place(
                    staged,
                    &self.media_dir,
                    self.options.media_batch_size,
                    self.options.media_batch_pause,
                )
                .await?
            }
            None => 0,
        };

        let storage = Arc::clone(&self.storage);
        let prefs = Arc::clone(&self.prefs);
        let sink = Arc::clone(&self.sink);
        let actor = self.options.actor.clone();
        let record = decoded.record;

        let mut outcome = run_blocking(move || {
            let mut storage = lock(&storage)?;
            let mut prefs = lock(&prefs)?;
            Importer::new(&mut storage, &mut **prefs, &*sink, &actor).import(&record, &report)
        })
        .await?;

        outcome.stats.media_placed = placed;
        info!(
            media = placed,
            flashcards = outcome.stats.flashcards.total(),
            "Import finished"
        );
        Ok(outcome)
    }
}

/// A decoded record with its staged media.
struct DecodedRecord {
    record: PackageRecord,
    media_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prefs::MemoryPreferences;
    use crate::model::{Flashcard, FlashcardDeck, MediaRef, Period};
    use crate::portability::notify::RecordingSink;
    use crate::portability::preflight::FixedSpace;
    use crate::portability::codec::DATA_FILE;
    use crate::portability::testing::{PERIOD_SPRING, SUBJECT_BIO, sample_package};
    use std::io::{Cursor, Write};
    use std::time::Duration;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn porter_with(storage: SqliteStorage, dir: &TempDir, name: &str) -> Porter {
        let options = PortOptions {
            media_batch_pause: Duration::ZERO,
            ..PortOptions::default()
        };
        Porter::new(
            storage,
            Box::new(MemoryPreferences::new()),
            &dir.path().join(name).join("media"),
        )
        .with_scratch_dir(&dir.path().join("scratch"))
        .with_probe(Arc::new(FixedSpace(u64::MAX)))
        .with_options(options.with_actor("test"))
    }

    fn porter(dir: &TempDir, name: &str) -> Porter {
        porter_with(SqliteStorage::open_memory().unwrap(), dir, name)
    }

    fn sample_bytes() -> Vec<u8> {
        serde_json::to_vec(&sample_package()).unwrap()
    }

    /// Export a one-card store whose card references `hola.m4a`.
    async fn package_with_audio(dir: &TempDir) -> Vec<u8> {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .save_period(&Period::new("Spring", now()), "test")
            .unwrap();
        let deck = FlashcardDeck::new("Spanish");
        storage.save_deck(&deck, "test").unwrap();
        let card = Flashcard::new("hola", "hello", &deck.id)
            .with_question_media(MediaRef::audio("hola.m4a", 0.8));
        storage.save_flashcard(&card, "test").unwrap();

        let source = porter_with(storage, dir, "a");
        std::fs::create_dir_all(source.media_dir()).unwrap();
        std::fs::write(source.media_dir().join("hola.m4a"), b"audio").unwrap();
        let (bytes, stats) = source.export_bytes().await.unwrap();
        assert_eq!(stats.media_files, 1);
        bytes
    }

    #[tokio::test]
    async fn test_export_then_import_reproduces_store() {
        let dir = TempDir::new().unwrap();
        let source = porter(&dir, "a");
        source.import_bytes(sample_bytes()).await.unwrap();

        let (bytes, stats) = source.export_bytes().await.unwrap();
        assert_eq!(stats.entities.periods, 2);
        assert_eq!(stats.entities.flashcards, 2);

        let target = porter(&dir, "b");
        let outcome = target.import_bytes(bytes).await.unwrap();
        assert_eq!(outcome.stats.schedules_corrected, 0);
        assert_eq!(
            outcome.active_period.map(|p| p.id).as_deref(),
            Some(PERIOD_SPRING)
        );

        assert_eq!(
            source.snapshot().await.unwrap(),
            target.snapshot().await.unwrap()
        );
        assert_eq!(
            target.preference("username").unwrap(),
            Some(Value::String("Camille".into()))
        );
    }

    #[tokio::test]
    async fn test_empty_store_export_fails_period_check_on_import() {
        let dir = TempDir::new().unwrap();
        let (bytes, stats) = porter(&dir, "a").export_bytes().await.unwrap();
        assert_eq!(stats.entities.total(), 0);

        let target = porter(&dir, "b");
        let err = target.import_bytes(bytes).await.unwrap_err();
        assert!(matches!(err, PortabilityError::Consistency(_)), "{err}");
        assert_eq!(target.snapshot().await.unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn test_oversized_file_fails_on_disk_space_before_decode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.svpkg");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(600 * 1024 * 1024).unwrap();

        let target = porter(&dir, "b").with_probe(Arc::new(FixedSpace(GIB)));
        let err = target.import_file(&path).await.unwrap_err();
        assert!(
            matches!(err, PortabilityError::InsufficientDiskSpace { .. }),
            "{err}"
        );
        // Nothing was staged
        assert!(!dir.path().join("scratch").exists());
    }

    #[tokio::test]
    async fn test_orphaned_subject_is_rejected_without_writes() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let target = porter(&dir, "b").with_sink(sink.clone());

        let mut package = sample_package();
        package["subjects"][1]["periodId"] = "0b8e6a34-0000-4000-8000-0000000000ff".into();

        let err = target
            .import_bytes(serde_json::to_vec(&package).unwrap())
            .await
            .unwrap_err();
        match err {
            PortabilityError::OrphanedReference {
                entity, entity_id, ..
            } => {
                assert_eq!(entity, "subject");
                assert_eq!(entity_id, SUBJECT_BIO);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(target.snapshot().await.unwrap(), Snapshot::default());
        assert!(target.preference("username").unwrap().is_none());
        assert!(sink.received().is_empty());
    }

    #[tokio::test]
    async fn test_second_import_fails_fast_while_one_runs() {
        let dir = TempDir::new().unwrap();
        let target = porter(&dir, "b");

        {
            let _held = OperationGuard::acquire(&target.importing, Operation::Import).unwrap();
            let err = target.import_bytes(sample_bytes()).await.unwrap_err();
            assert!(matches!(
                err,
                PortabilityError::OperationInProgress(Operation::Import)
            ));
            // Exports use their own guard
            target.export_bytes().await.unwrap();
        }

        target.import_bytes(sample_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_second_export_fails_fast_while_one_runs() {
        let dir = TempDir::new().unwrap();
        let target = porter(&dir, "b");
        target.import_bytes(sample_bytes()).await.unwrap();

        {
            let _held = OperationGuard::acquire(&target.exporting, Operation::Export).unwrap();
            let err = target.export_bytes().await.unwrap_err();
            assert!(matches!(
                err,
                PortabilityError::OperationInProgress(Operation::Export)
            ));
            let err = target
                .export_to(&dir.path().join("blocked.svpkg"))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                PortabilityError::OperationInProgress(Operation::Export)
            ));
            assert!(!dir.path().join("blocked.svpkg").exists());
        }

        target.export_bytes().await.unwrap();
    }

    #[tokio::test]
    async fn test_media_write_failure_aborts_before_store_writes() {
        let dir = TempDir::new().unwrap();
        let bytes = package_with_audio(&dir).await;

        // A regular file where the media directory should be
        let blocked = dir.path().join("not-a-dir");
        std::fs::write(&blocked, b"").unwrap();
        let sink = Arc::new(RecordingSink::new());
        let target = Porter::new(
            SqliteStorage::open_memory().unwrap(),
            Box::new(MemoryPreferences::new()),
            &blocked,
        )
        .with_scratch_dir(&dir.path().join("scratch"))
        .with_probe(Arc::new(FixedSpace(u64::MAX)))
        .with_sink(sink.clone());

        let err = target.import_bytes(bytes).await.unwrap_err();
        assert!(matches!(err, PortabilityError::MediaWrite { .. }), "{err}");
        assert_eq!(target.snapshot().await.unwrap(), Snapshot::default());
        assert!(sink.received().is_empty());
    }

    #[tokio::test]
    async fn test_reimport_keeps_legacy_inline_image() {
        let dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .save_period(&Period::new("Spring", now()), "test")
            .unwrap();
        let deck = FlashcardDeck::new("Flags");
        storage.save_deck(&deck, "test").unwrap();
        let mut card = Flashcard::new("Flag of Peru?", "Red and white", &deck.id);
        card.question_media.image_data = Some(vec![1, 2, 3, 4]);
        storage.save_flashcard(&card, "test").unwrap();

        let porter = porter_with(storage, &dir, "a");
        let before = porter.snapshot().await.unwrap();
        let (bytes, _) = porter.export_bytes().await.unwrap();
        porter.import_bytes(bytes).await.unwrap();

        let after = porter.snapshot().await.unwrap();
        assert_eq!(after.flashcards, before.flashcards);
        assert_eq!(
            after.flashcards[0].question_media.image_data,
            Some(vec![1, 2, 3, 4])
        );
    }

    #[tokio::test]
    async fn test_validate_bytes_reports_without_writing() {
        let dir = TempDir::new().unwrap();
        let target = porter(&dir, "b");

        let report = target.validate_bytes(sample_bytes()).await.unwrap();
        assert_eq!(report.counts.periods, 2);
        assert_eq!(report.counts.flashcards, 2);
        assert_eq!(target.snapshot().await.unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn test_archive_expanding_past_free_space_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DATA_FILE, SimpleFileOptions::default()).unwrap();
        zip.write_all(&sample_bytes()).unwrap();
        zip.start_file("media/audio/silence.m4a", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(&vec![0u8; 4 * 1024 * 1024]).unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(bytes.len() < 256 * 1024);

        // Room for the archive, not for what it expands to
        let target = porter(&dir, "b").with_probe(Arc::new(FixedSpace(1024 * 1024)));
        let err = target.import_bytes(bytes).await.unwrap_err();
        assert!(
            matches!(err, PortabilityError::PackageTooLarge { max, .. } if max == 512 * 1024),
            "{err}"
        );
        assert_eq!(target.snapshot().await.unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn test_media_is_placed_on_import() {
        let dir = TempDir::new().unwrap();
        let bytes = package_with_audio(&dir).await;

        let target = porter(&dir, "b");
        let outcome = target.import_bytes(bytes).await.unwrap();
        assert_eq!(outcome.stats.media_placed, 1);
        assert_eq!(outcome.stats.flashcards.created, 1);
        assert_eq!(
            std::fs::read(target.media_dir().join("hola.m4a")).unwrap(),
            b"audio"
        );

        // Scratch directories are removed once the import returns
        let leftovers = std::fs::read_dir(dir.path().join("scratch")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_standalone_reconcile_publishes_active_period() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let target = porter(&dir, "b").with_sink(sink.clone());
        target.import_bytes(sample_bytes()).await.unwrap();
        let before = sink.received().len();

        let outcome = target.reconcile().await.unwrap();
        assert_eq!(outcome.schedules_corrected, 0);
        assert_eq!(outcome.configurations_updated, 0);
        assert_eq!(
            target.preference(ACTIVE_PERIOD_KEY).unwrap(),
            Some(Value::String(PERIOD_SPRING.into()))
        );
        // Nothing changed, nothing published
        assert_eq!(sink.received().len(), before);
    }
}
