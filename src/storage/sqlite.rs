//! SQLite storage implementation.
//!
//! This module provides the entity store for StudyVault using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.
//!
//! Row-level helpers are free functions over `&Connection` so they can run
//! either against the plain connection or inside a `mutate` transaction
//! (a `Transaction` derefs to `Connection`).

use crate::model::{
    Evaluation, Flashcard, FlashcardDeck, MediaKind, MediaRef, Period, SrsState, Subject,
    SubjectWeight, UserConfiguration,
};
use crate::storage::events::{insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking side effects.
///
/// Passed to mutation closures to record audit events, which are written
/// inside the same transaction right before commit.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (user, script, etc.).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }

    /// Record an event carrying a free-form comment.
    pub fn record_note(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        comment: &str,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(comment),
        );
    }
}

/// Row counts per entity collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub user_configurations: usize,
    pub periods: usize,
    pub subjects: usize,
    pub evaluations: usize,
    pub flashcard_decks: usize,
    pub flashcards: usize,
}

impl EntityCounts {
    /// Returns total number of records.
    #[must_use]
    pub fn total(&self) -> usize {
        self.user_configurations
            + self.periods
            + self.subjects
            + self.evaluations
            + self.flashcard_decks
            + self.flashcards
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// The closure's error type only needs to absorb `rusqlite::Error`, so
    /// callers keep their own error taxonomy across the transaction boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R, E>(&mut self, op: &str, actor: &str, f: F) -> Result<R, E>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R, E>,
        E: From<rusqlite::Error>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        // Dropping `tx` on the error path rolls back
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ==================
    // Entity Operations
    // ==================

    /// Insert a period.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn save_period(&mut self, period: &Period, actor: &str) -> rusqlite::Result<()> {
        self.mutate("save_period", actor, |tx, _| insert_period(tx, period))
    }

    /// Insert a subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (including an unknown period).
    pub fn save_subject(&mut self, subject: &Subject, actor: &str) -> rusqlite::Result<()> {
        self.mutate("save_subject", actor, |tx, _| insert_subject(tx, subject))
    }

    /// Insert an evaluation.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (including an unknown subject).
    pub fn save_evaluation(&mut self, evaluation: &Evaluation, actor: &str) -> rusqlite::Result<()> {
        self.mutate("save_evaluation", actor, |tx, _| {
            insert_evaluation(tx, evaluation)
        })
    }

    /// Insert a flashcard deck.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn save_deck(&mut self, deck: &FlashcardDeck, actor: &str) -> rusqlite::Result<()> {
        self.mutate("save_deck", actor, |tx, _| insert_deck(tx, deck))
    }

    /// Insert or replace a flashcard.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the deck does not exist at commit.
    pub fn save_flashcard(&mut self, card: &Flashcard, actor: &str) -> rusqlite::Result<()> {
        self.mutate("save_flashcard", actor, |tx, _| upsert_flashcard(tx, card))
    }

    /// Insert a user configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn save_user_configuration(
        &mut self,
        config: &UserConfiguration,
        actor: &str,
    ) -> rusqlite::Result<()> {
        self.mutate("save_user_configuration", actor, |tx, _| {
            insert_user_configuration(tx, config)
        })
    }

    /// Count rows in every entity collection.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn counts(&self) -> rusqlite::Result<EntityCounts> {
        count_entities(&self.conn)
    }

    /// Get a flashcard by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_flashcard(&self, id: &str) -> rusqlite::Result<Option<Flashcard>> {
        self.conn
            .query_row(
                &format!("SELECT {FLASHCARD_COLUMNS} FROM flashcards WHERE id = ?1"),
                [id],
                map_flashcard,
            )
            .optional()
    }

    /// Get a period by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_period(&self, id: &str) -> rusqlite::Result<Option<Period>> {
        self.conn
            .query_row(
                "SELECT id, name, start_date, end_date, created_at FROM periods WHERE id = ?1",
                [id],
                map_period,
            )
            .optional()
    }
}

// ==================
// Timestamp helpers
// ==================

fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn opt_millis(ts: Option<&DateTime<Utc>>) -> Option<i64> {
    ts.map(DateTime::timestamp_millis)
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn opt_from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

// ==================
// Writes
// ==================

/// Insert a period row.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_period(conn: &Connection, period: &Period) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO periods (id, name, start_date, end_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            period.id,
            period.name,
            to_millis(&period.start_date),
            opt_millis(period.end_date.as_ref()),
            to_millis(&period.created_at),
        ],
    )?;
    Ok(())
}

/// Insert a subject row.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_subject(conn: &Connection, subject: &Subject) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO subjects (id, name, code, weight_kind, weight, grade, created_at, last_modified, period_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            subject.id,
            subject.name,
            subject.code,
            subject.weight.kind_str(),
            subject.weight.value(),
            subject.grade,
            to_millis(&subject.created_at),
            to_millis(&subject.last_modified),
            subject.period_id,
        ],
    )?;
    Ok(())
}

/// Insert an evaluation row.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_evaluation(conn: &Connection, evaluation: &Evaluation) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO evaluations (id, title, grade, coefficient, date, subject_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            evaluation.id,
            evaluation.title,
            evaluation.grade,
            evaluation.coefficient,
            to_millis(&evaluation.date),
            evaluation.subject_id,
        ],
    )?;
    Ok(())
}

/// Insert a deck row.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_deck(conn: &Connection, deck: &FlashcardDeck) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO flashcard_decks (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![deck.id, deck.name, to_millis(&deck.created_at)],
    )?;
    Ok(())
}

/// Insert a flashcard, or overwrite every field of the card with the same id.
///
/// Inline image data is kept when the incoming card carries none.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn upsert_flashcard(conn: &Connection, card: &Flashcard) -> rusqlite::Result<()> {
    let q = &card.question_media;
    let a = &card.answer_media;
    let srs = &card.srs;
    conn.execute(
        "INSERT INTO flashcards (
            id, question, answer,
            question_kind, question_image, question_image_data, question_audio, question_audio_duration,
            answer_kind, answer_image, answer_image_data, answer_audio, answer_audio_duration,
            interval_days, ease_factor, review_count, correct_count, next_review_at, last_review_at,
            created_at, deck_id
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
         ON CONFLICT(id) DO UPDATE SET
            question = excluded.question,
            answer = excluded.answer,
            question_kind = excluded.question_kind,
            question_image = excluded.question_image,
            question_image_data = COALESCE(excluded.question_image_data, flashcards.question_image_data),
            question_audio = excluded.question_audio,
            question_audio_duration = excluded.question_audio_duration,
            answer_kind = excluded.answer_kind,
            answer_image = excluded.answer_image,
            answer_image_data = COALESCE(excluded.answer_image_data, flashcards.answer_image_data),
            answer_audio = excluded.answer_audio,
            answer_audio_duration = excluded.answer_audio_duration,
            interval_days = excluded.interval_days,
            ease_factor = excluded.ease_factor,
            review_count = excluded.review_count,
            correct_count = excluded.correct_count,
            next_review_at = excluded.next_review_at,
            last_review_at = excluded.last_review_at,
            created_at = excluded.created_at,
            deck_id = excluded.deck_id",
        params![
            card.id,
            card.question,
            card.answer,
            q.kind.as_str(),
            q.image_file_name,
            q.image_data,
            q.audio_file_name,
            q.audio_duration,
            a.kind.as_str(),
            a.image_file_name,
            a.image_data,
            a.audio_file_name,
            a.audio_duration,
            srs.interval_days,
            srs.ease_factor,
            srs.review_count,
            srs.correct_count,
            opt_millis(srs.next_review_at.as_ref()),
            opt_millis(srs.last_review_at.as_ref()),
            to_millis(&card.created_at),
            card.deck_id,
        ],
    )?;
    Ok(())
}

/// Overwrite the scheduling columns of one flashcard.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn update_flashcard_srs(conn: &Connection, id: &str, srs: &SrsState) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE flashcards
         SET interval_days = ?2, ease_factor = ?3, review_count = ?4, correct_count = ?5,
             next_review_at = ?6, last_review_at = ?7
         WHERE id = ?1",
        params![
            id,
            srs.interval_days,
            srs.ease_factor,
            srs.review_count,
            srs.correct_count,
            opt_millis(srs.next_review_at.as_ref()),
            opt_millis(srs.last_review_at.as_ref()),
        ],
    )?;
    Ok(())
}

/// Move one flashcard to another deck.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn set_flashcard_deck(conn: &Connection, id: &str, deck_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE flashcards SET deck_id = ?2 WHERE id = ?1",
        params![id, deck_id],
    )
}

/// Insert a user configuration row.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_user_configuration(
    conn: &Connection,
    config: &UserConfiguration,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO user_configuration (
            id, username, has_completed_onboarding, active_period_id, grading_system, theme,
            profile_gradient_start, profile_gradient_end, created_at, last_modified
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            config.id,
            config.username,
            config.has_completed_onboarding,
            config.active_period_id,
            config.grading_system,
            config.theme,
            config.profile_gradient_start,
            config.profile_gradient_end,
            to_millis(&config.created_at),
            to_millis(&config.last_modified),
        ],
    )?;
    Ok(())
}

/// Point every user configuration at `period_id`. Returns rows changed.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn set_active_period(conn: &Connection, period_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE user_configuration SET active_period_id = ?1
         WHERE active_period_id IS NOT ?1",
        [period_id],
    )
}

/// Delete every row of the collections an import replaces wholesale.
///
/// Flashcards are not touched; their deck references are re-established by
/// the caller before the transaction commits.
///
/// # Errors
///
/// Returns an error if a delete fails.
pub fn clear_replaceable(conn: &Connection) -> rusqlite::Result<EntityCounts> {
    // Children before parents: subject/evaluation references are immediate
    let evaluations = conn.execute("DELETE FROM evaluations", [])?;
    let subjects = conn.execute("DELETE FROM subjects", [])?;
    let periods = conn.execute("DELETE FROM periods", [])?;
    let flashcard_decks = conn.execute("DELETE FROM flashcard_decks", [])?;
    let user_configurations = conn.execute("DELETE FROM user_configuration", [])?;

    Ok(EntityCounts {
        user_configurations,
        periods,
        subjects,
        evaluations,
        flashcard_decks,
        flashcards: 0,
    })
}

// ==================
// Reads
// ==================

fn count_table(conn: &Connection, table: &str) -> rusqlite::Result<usize> {
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(usize::try_from(n).unwrap_or(0))
}

/// Count rows in every entity collection.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn count_entities(conn: &Connection) -> rusqlite::Result<EntityCounts> {
    Ok(EntityCounts {
        user_configurations: count_table(conn, "user_configuration")?,
        periods: count_table(conn, "periods")?,
        subjects: count_table(conn, "subjects")?,
        evaluations: count_table(conn, "evaluations")?,
        flashcard_decks: count_table(conn, "flashcard_decks")?,
        flashcards: count_table(conn, "flashcards")?,
    })
}

/// Count subjects with no owning period.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_subjects_without_period(conn: &Connection) -> rusqlite::Result<usize> {
    count_table(conn, "subjects WHERE period_id IS NULL")
}

/// Count evaluations with no owning subject.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_evaluations_without_subject(conn: &Connection) -> rusqlite::Result<usize> {
    count_table(conn, "evaluations WHERE subject_id IS NULL")
}

fn map_period(row: &Row<'_>) -> rusqlite::Result<Period> {
    Ok(Period {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: from_millis(row.get(2)?),
        end_date: opt_from_millis(row.get(3)?),
        created_at: from_millis(row.get(4)?),
    })
}

/// All periods, oldest start first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch_periods(conn: &Connection) -> rusqlite::Result<Vec<Period>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, start_date, end_date, created_at FROM periods
         ORDER BY start_date, created_at, id",
    )?;
    let rows = stmt.query_map([], map_period)?;
    rows.collect()
}

/// The most recently started period (ties: latest created, then lowest id).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn latest_period(conn: &Connection) -> rusqlite::Result<Option<Period>> {
    conn.query_row(
        "SELECT id, name, start_date, end_date, created_at FROM periods
         ORDER BY start_date DESC, created_at DESC, id ASC
         LIMIT 1",
        [],
        map_period,
    )
    .optional()
}

/// All subjects.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch_subjects(conn: &Connection) -> rusqlite::Result<Vec<Subject>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, code, weight_kind, weight, grade, created_at, last_modified, period_id
         FROM subjects ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map([], |row| {
        let kind: String = row.get(3)?;
        Ok(Subject {
            id: row.get(0)?,
            name: row.get(1)?,
            code: row.get(2)?,
            weight: SubjectWeight::from_parts(&kind, row.get(4)?),
            grade: row.get(5)?,
            created_at: from_millis(row.get(6)?),
            last_modified: from_millis(row.get(7)?),
            period_id: row.get(8)?,
        })
    })?;
    rows.collect()
}

/// All evaluations.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch_evaluations(conn: &Connection) -> rusqlite::Result<Vec<Evaluation>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, grade, coefficient, date, subject_id
         FROM evaluations ORDER BY date, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Evaluation {
            id: row.get(0)?,
            title: row.get(1)?,
            grade: row.get(2)?,
            coefficient: row.get(3)?,
            date: from_millis(row.get(4)?),
            subject_id: row.get(5)?,
        })
    })?;
    rows.collect()
}

/// All decks.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch_decks(conn: &Connection) -> rusqlite::Result<Vec<FlashcardDeck>> {
    let mut stmt =
        conn.prepare("SELECT id, name, created_at FROM flashcard_decks ORDER BY created_at, id")?;
    let rows = stmt.query_map([], |row| {
        Ok(FlashcardDeck {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: from_millis(row.get(2)?),
        })
    })?;
    rows.collect()
}

const FLASHCARD_COLUMNS: &str = "id, question, answer,
    question_kind, question_image, question_image_data, question_audio, question_audio_duration,
    answer_kind, answer_image, answer_image_data, answer_audio, answer_audio_duration,
    interval_days, ease_factor, review_count, correct_count, next_review_at, last_review_at,
    created_at, deck_id";

fn map_media(row: &Row<'_>, offset: usize) -> rusqlite::Result<MediaRef> {
    let kind: String = row.get(offset)?;
    Ok(MediaRef {
        kind: MediaKind::parse(&kind),
        image_file_name: row.get(offset + 1)?,
        image_data: row.get(offset + 2)?,
        audio_file_name: row.get(offset + 3)?,
        audio_duration: row.get(offset + 4)?,
    })
}

fn map_flashcard(row: &Row<'_>) -> rusqlite::Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        question: row.get(1)?,
        answer: row.get(2)?,
        question_media: map_media(row, 3)?,
        answer_media: map_media(row, 8)?,
        srs: SrsState {
            interval_days: row.get(13)?,
            ease_factor: row.get(14)?,
            review_count: row.get(15)?,
            correct_count: row.get(16)?,
            next_review_at: opt_from_millis(row.get(17)?),
            last_review_at: opt_from_millis(row.get(18)?),
        },
        created_at: from_millis(row.get(19)?),
        deck_id: row.get(20)?,
    })
}

/// All flashcards.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch_flashcards(conn: &Connection) -> rusqlite::Result<Vec<Flashcard>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FLASHCARD_COLUMNS} FROM flashcards ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map([], map_flashcard)?;
    rows.collect()
}

/// `(id, deck_id)` of every stored flashcard, without loading card content.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch_flashcard_decks(conn: &Connection) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT id, deck_id FROM flashcards")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// `(id, schedule)` of every stored flashcard.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch_schedules(conn: &Connection) -> rusqlite::Result<Vec<(String, SrsState)>> {
    let mut stmt = conn.prepare(
        "SELECT id, interval_days, ease_factor, review_count, correct_count, next_review_at, last_review_at
         FROM flashcards ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get(0)?,
            SrsState {
                interval_days: row.get(1)?,
                ease_factor: row.get(2)?,
                review_count: row.get(3)?,
                correct_count: row.get(4)?,
                next_review_at: opt_from_millis(row.get(5)?),
                last_review_at: opt_from_millis(row.get(6)?),
            },
        ))
    })?;
    rows.collect()
}

/// All user configurations.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn fetch_user_configurations(conn: &Connection) -> rusqlite::Result<Vec<UserConfiguration>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, has_completed_onboarding, active_period_id, grading_system, theme,
                profile_gradient_start, profile_gradient_end, created_at, last_modified
         FROM user_configuration ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(UserConfiguration {
            id: row.get(0)?,
            username: row.get(1)?,
            has_completed_onboarding: row.get(2)?,
            active_period_id: row.get(3)?,
            grading_system: row.get(4)?,
            theme: row.get(5)?,
            profile_gradient_start: row.get(6)?,
            profile_gradient_end: row.get(7)?,
            created_at: from_millis(row.get(8)?),
            last_modified: from_millis(row.get(9)?),
        })
    })?;
    rows.collect()
}
