//! Database schema definitions.
//!
//! Timestamps are stored as INTEGER (Unix milliseconds) so packages can
//! round-trip them exactly at millisecond precision.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the StudyVault database.
///
/// `flashcards.deck_id` is a deferred foreign key: an import may clear every
/// deck and re-create them later in the same transaction, but a card still
/// pointing at a missing deck makes the COMMIT fail.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Academic hierarchy
-- ====================

CREATE TABLE IF NOT EXISTS periods (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    start_date INTEGER NOT NULL,
    end_date INTEGER,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_periods_start ON periods(start_date DESC, created_at DESC);

CREATE TABLE IF NOT EXISTS subjects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    code TEXT,
    weight_kind TEXT NOT NULL DEFAULT 'coefficient'
        CHECK (weight_kind IN ('coefficient', 'credit_hours')),
    weight REAL NOT NULL DEFAULT 1.0,
    grade REAL NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    last_modified INTEGER NOT NULL,
    period_id TEXT REFERENCES periods(id)
);

CREATE INDEX IF NOT EXISTS idx_subjects_period ON subjects(period_id);

CREATE TABLE IF NOT EXISTS evaluations (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    grade REAL NOT NULL,
    coefficient REAL NOT NULL DEFAULT 1.0,
    date INTEGER NOT NULL,
    subject_id TEXT REFERENCES subjects(id)
);

CREATE INDEX IF NOT EXISTS idx_evaluations_subject ON evaluations(subject_id);

-- ====================
-- Flashcards
-- ====================

CREATE TABLE IF NOT EXISTS flashcard_decks (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS flashcards (
    id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    question_kind TEXT NOT NULL DEFAULT 'text',
    question_image TEXT,
    question_image_data BLOB,
    question_audio TEXT,
    question_audio_duration REAL,
    answer_kind TEXT NOT NULL DEFAULT 'text',
    answer_image TEXT,
    answer_image_data BLOB,
    answer_audio TEXT,
    answer_audio_duration REAL,
    interval_days REAL NOT NULL DEFAULT 1.0,
    ease_factor REAL NOT NULL DEFAULT 2.3,
    review_count INTEGER NOT NULL DEFAULT 0,
    correct_count INTEGER NOT NULL DEFAULT 0,
    next_review_at INTEGER,
    last_review_at INTEGER,
    created_at INTEGER NOT NULL,
    deck_id TEXT NOT NULL REFERENCES flashcard_decks(id) DEFERRABLE INITIALLY DEFERRED
);

CREATE INDEX IF NOT EXISTS idx_flashcards_deck ON flashcards(deck_id);
CREATE INDEX IF NOT EXISTS idx_flashcards_next_review ON flashcards(next_review_at);

-- ====================
-- Profile
-- ====================

CREATE TABLE IF NOT EXISTS user_configuration (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL DEFAULT '',
    has_completed_onboarding INTEGER NOT NULL DEFAULT 0,
    active_period_id TEXT,
    grading_system TEXT NOT NULL DEFAULT 'france',
    theme TEXT,
    profile_gradient_start TEXT,
    profile_gradient_end TEXT,
    created_at INTEGER NOT NULL,
    last_modified INTEGER NOT NULL
);

-- ====================
-- Audit Events
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);
";

/// Apply the schema to a database connection.
///
/// Sets pragmas, creates tables, and records the schema version.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Set pragmas before schema creation
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-64000")?; // 64MB cache
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "periods",
            "subjects",
            "evaluations",
            "flashcard_decks",
            "flashcards",
            "user_configuration",
            "events",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let fk_enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_enabled, 1);
    }

    #[test]
    fn test_subject_period_reference_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO subjects (id, name, created_at, last_modified, period_id)
             VALUES ('s1', 'Maths', 0, 0, 'missing')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_flashcard_deck_reference_checked_at_commit() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let tx = conn.transaction().unwrap();
        // Deferred: the insert itself succeeds
        tx.execute(
            "INSERT INTO flashcards (id, question, answer, created_at, deck_id)
             VALUES ('c1', 'q', 'a', 0, 'd1')",
            [],
        )
        .unwrap();
        tx.execute(
            "INSERT INTO flashcard_decks (id, name, created_at) VALUES ('d1', 'Deck', 0)",
            [],
        )
        .unwrap();
        tx.commit().unwrap();

        let tx = conn.transaction().unwrap();
        tx.execute("DELETE FROM flashcard_decks", []).unwrap();
        assert!(tx.commit().is_err());
    }
}
