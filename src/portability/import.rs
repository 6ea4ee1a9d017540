//! Transactional importer.
//!
//! Replaces periods, subjects, evaluations, decks and user configurations
//! wholesale and upserts flashcards by identity, all inside one store
//! transaction. The reconciler and the consistency checks run on that same
//! transaction; any failure rolls everything back. Preferences and
//! notifications are only touched after the commit.
//!
//! # Deck resolution
//!
//! Flashcards are never cleared, so every card must point at an existing
//! deck by the time the transaction commits:
//!
//! - a deck id the package references but does not carry gets an
//!   `"Imported deck"` under that id
//! - cards with no usable deck id share one generated `"Imported deck"`
//! - stored cards absent from the package keep their deck id; if that deck
//!   was cleared, a `"Recovered deck"` is created under it

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::prefs::{ACTIVE_PERIOD_KEY, PendingPreferences, PreferenceStore};
use crate::model::{
    Evaluation, Flashcard, FlashcardDeck, Period, Subject, UserConfiguration, new_id, now,
};
use crate::portability::notify::{EventSink, Notification};
use crate::portability::reconcile::reconcile;
use crate::portability::serialize::Portable;
use crate::portability::types::{ImportStats, PackageRecord, PortResult, PortabilityError};
use crate::portability::validate::{ValidationReport, normalize_id, parse_id};
use crate::storage::events::EventType;
use crate::storage::sqlite::{
    clear_replaceable, count_entities, count_evaluations_without_subject,
    count_subjects_without_period, fetch_flashcard_decks, insert_deck, insert_evaluation,
    insert_period, insert_subject, insert_user_configuration, set_flashcard_deck,
    upsert_flashcard,
};
use crate::storage::{MutationContext, SqliteStorage};

/// Name given to decks created for unresolved deck references.
pub const IMPORTED_DECK_NAME: &str = "Imported deck";

/// Name given to decks recreated for cards that survived the import.
pub const RECOVERED_DECK_NAME: &str = "Recovered deck";

/// Result of a committed import.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub stats: ImportStats,
    /// Period the active pointer names after the import.
    pub active_period: Option<Period>,
}

/// Applies a validated package to the store.
pub struct Importer<'a> {
    storage: &'a mut SqliteStorage,
    prefs: &'a mut dyn PreferenceStore,
    sink: &'a dyn EventSink,
    actor: String,
    now: DateTime<Utc>,
}

impl<'a> Importer<'a> {
    #[must_use]
    pub fn new(
        storage: &'a mut SqliteStorage,
        prefs: &'a mut dyn PreferenceStore,
        sink: &'a dyn EventSink,
        actor: &str,
    ) -> Self {
        Self {
            storage,
            prefs,
            sink,
            actor: actor.to_string(),
            now: now(),
        }
    }

    /// Use a fixed clock for fallback timestamps and schedule repairs.
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Import a package that passed validation.
    ///
    /// # Errors
    ///
    /// `Database` or `Consistency` if the transaction failed and was rolled
    /// back. `Preferences` if the commit succeeded but the staged
    /// preferences could not be written; notifications are still sent.
    pub fn import(
        &mut self,
        record: &PackageRecord,
        report: &ValidationReport,
    ) -> PortResult<ImportOutcome> {
        let mut pending = PendingPreferences::from_user_defaults(&record.user_defaults);
        let now = self.now;

        let (stats, active_period) = self.storage.mutate("import", &self.actor, |tx, ctx| {
            apply_package(tx, ctx, record, report, now)
        })?;

        info!(
            periods = stats.inserted.periods,
            subjects = stats.inserted.subjects,
            flashcards_created = stats.flashcards.created,
            flashcards_updated = stats.flashcards.updated,
            "Import committed"
        );

        if let Some(period) = &active_period {
            pending.stage(ACTIVE_PERIOD_KEY, Value::String(period.id.clone()));
        }
        let prefs_result = self.prefs.apply(&pending);
        if let Err(e) = &prefs_result {
            warn!(error = %e, "Imported data committed but preferences were not written");
        }

        if let Some(period) = &active_period {
            self.sink.notify(&Notification::ActivePeriodChanged {
                period_id: period.id.clone(),
                period_name: period.name.clone(),
                source: "import".to_string(),
            });
        }
        self.sink.notify(&Notification::DataChanged);

        prefs_result?;
        Ok(ImportOutcome {
            stats,
            active_period,
        })
    }
}

/// Deck ids present in the transaction, keyed by normalized id.
struct DeckIndex {
    ids: HashMap<String, String>,
    shared: Option<String>,
}

impl DeckIndex {
    fn insert(&mut self, stored_id: &str) {
        self.ids.insert(normalize_id(stored_id), stored_id.to_string());
    }

    fn get(&self, raw: &str) -> Option<&String> {
        self.ids.get(&normalize_id(raw))
    }

    fn create(
        &mut self,
        conn: &Connection,
        ctx: &mut MutationContext,
        id: &str,
        name: &str,
        event: EventType,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<String> {
        insert_deck(conn, &FlashcardDeck::with_id(id, name, now))?;
        ctx.record_event("flashcard_deck", id, event);
        self.insert(id);
        debug!(deck = %id, name, "Created placeholder deck");
        Ok(id.to_string())
    }
}

fn apply_package(
    tx: &Connection,
    ctx: &mut MutationContext,
    record: &PackageRecord,
    report: &ValidationReport,
    now: DateTime<Utc>,
) -> PortResult<(ImportStats, Option<Period>)> {
    let mut stats = ImportStats::default();

    // Stored cards before the clear: normalized id -> (stored id, deck id)
    let mut survivors: HashMap<String, (String, String)> = fetch_flashcard_decks(tx)?
        .into_iter()
        .map(|(id, deck)| (normalize_id(&id), (id, deck)))
        .collect();

    stats.cleared = clear_replaceable(tx)?;

    for rec in &record.user_configuration {
        insert_user_configuration(tx, &UserConfiguration::from_record(rec, now))?;
        stats.inserted.user_configurations += 1;
    }

    let mut periods: HashMap<String, String> = HashMap::with_capacity(record.periods.len());
    for rec in &record.periods {
        let period = Period::from_record(rec, now);
        insert_period(tx, &period)?;
        periods.insert(normalize_id(&period.id), period.id);
    }
    stats.inserted.periods = periods.len();

    let mut subjects: HashMap<String, String> = HashMap::with_capacity(record.subjects.len());
    for rec in &record.subjects {
        let mut subject = Subject::from_record(rec, now);
        subject.period_id = subject
            .period_id
            .as_deref()
            .and_then(|raw| periods.get(&normalize_id(raw)))
            .cloned();
        insert_subject(tx, &subject)?;
        subjects.insert(normalize_id(&subject.id), subject.id);
    }
    stats.inserted.subjects = subjects.len();

    for rec in &record.evaluations {
        let mut evaluation = Evaluation::from_record(rec, now);
        evaluation.subject_id = evaluation
            .subject_id
            .as_deref()
            .and_then(|raw| subjects.get(&normalize_id(raw)))
            .cloned();
        insert_evaluation(tx, &evaluation)?;
        stats.inserted.evaluations += 1;
    }

    let mut decks = DeckIndex {
        ids: HashMap::with_capacity(record.flashcard_decks.len()),
        shared: None,
    };
    for rec in &record.flashcard_decks {
        let deck = FlashcardDeck::from_record(rec, now);
        insert_deck(tx, &deck)?;
        decks.insert(&deck.id);
    }

    for raw in &report.decks_to_create {
        if decks.get(raw).is_none() {
            decks.create(
                tx,
                ctx,
                raw,
                IMPORTED_DECK_NAME,
                EventType::DeckAutoCreated,
                now,
            )?;
            stats.decks_auto_created += 1;
        }
    }

    for rec in &record.flashcards {
        let mut card = Flashcard::from_record(rec, now);

        let raw_deck = std::mem::take(&mut card.deck_id);
        let usable = Some(raw_deck.trim()).filter(|raw| parse_id(raw).is_some());
        card.deck_id = match usable {
            Some(raw) => match decks.get(raw) {
                Some(stored) => stored.clone(),
                None => {
                    stats.decks_auto_created += 1;
                    decks.create(
                        tx,
                        ctx,
                        raw,
                        IMPORTED_DECK_NAME,
                        EventType::DeckAutoCreated,
                        now,
                    )?
                }
            },
            None => match decks.shared.clone() {
                Some(shared) => shared,
                None => {
                    stats.decks_auto_created += 1;
                    let id = decks.create(
                        tx,
                        ctx,
                        &new_id(),
                        IMPORTED_DECK_NAME,
                        EventType::DeckAutoCreated,
                        now,
                    )?;
                    decks.shared = Some(id.clone());
                    id
                }
            },
        };

        if let Some((stored_id, _)) = survivors.remove(&normalize_id(&card.id)) {
            card.id = stored_id;
            ctx.record_event("flashcard", &card.id, EventType::FlashcardMerged);
            stats.flashcards.updated += 1;
        } else {
            stats.flashcards.created += 1;
        }
        upsert_flashcard(tx, &card)?;
    }

    for (card_id, deck_id) in survivors.into_values() {
        match decks.get(&deck_id).cloned() {
            Some(stored) if stored == deck_id => {}
            Some(stored) => {
                set_flashcard_deck(tx, &card_id, &stored)?;
            }
            None => {
                decks.create(
                    tx,
                    ctx,
                    &deck_id,
                    RECOVERED_DECK_NAME,
                    EventType::DeckRecovered,
                    now,
                )?;
                stats.decks_recovered += 1;
            }
        }
    }

    let reconciled = reconcile(tx, ctx, now)?;
    stats.schedules_corrected = reconciled.schedules_corrected;

    verify(tx)?;

    let counts = count_entities(tx)?;
    stats.inserted.flashcard_decks = counts.flashcard_decks;
    stats.inserted.flashcards = stats.flashcards.total();

    ctx.record_note(
        "package",
        &record.metadata.export_date,
        EventType::PackageImported,
        &format!(
            "{} periods, {} subjects, {} flashcards from app {}",
            stats.inserted.periods,
            stats.inserted.subjects,
            stats.inserted.flashcards,
            record.metadata.app_version
        ),
    );

    Ok((stats, reconciled.active_period))
}

/// Post-import invariants, checked before commit.
fn verify(conn: &Connection) -> PortResult<()> {
    if count_entities(conn)?.periods == 0 {
        return Err(PortabilityError::Consistency(
            "the import left no period".to_string(),
        ));
    }
    let orphans = count_subjects_without_period(conn)?;
    if orphans > 0 {
        return Err(PortabilityError::Consistency(format!(
            "{orphans} subject(s) without a period"
        )));
    }
    let orphans = count_evaluations_without_subject(conn)?;
    if orphans > 0 {
        return Err(PortabilityError::Consistency(format!(
            "{orphans} evaluation(s) without a subject"
        )));
    }
    Ok(())
}
