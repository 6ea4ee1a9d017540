//! Audit event storage and retrieval.
//!
//! Events track imports, reconciliations and the corrections they made.

use rusqlite::{Connection, Result};

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    // Package events
    PackageImported,
    PackageExported,

    // Import side effects
    FlashcardMerged,
    DeckAutoCreated,
    DeckRecovered,

    // Reconciler events
    ScheduleCorrected,
    ActivePeriodChanged,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PackageImported => "package_imported",
            Self::PackageExported => "package_exported",
            Self::FlashcardMerged => "flashcard_merged",
            Self::DeckAutoCreated => "deck_auto_created",
            Self::DeckRecovered => "deck_recovered",
            Self::ScheduleCorrected => "schedule_corrected",
            Self::ActivePeriodChanged => "active_period_changed",
        }
    }

    /// Parse from the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "package_imported" => Some(Self::PackageImported),
            "package_exported" => Some(Self::PackageExported),
            "flashcard_merged" => Some(Self::FlashcardMerged),
            "deck_auto_created" => Some(Self::DeckAutoCreated),
            "deck_recovered" => Some(Self::DeckRecovered),
            "schedule_corrected" => Some(Self::ScheduleCorrected),
            "active_period_changed" => Some(Self::ActivePeriodChanged),
            _ => None,
        }
    }
}

/// An audit event record.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_value: None,
            new_value: None,
            comment: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new values for field change tracking.
    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    /// Add a comment to the event.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.old_value,
            event.new_value,
            event.comment,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get the most recent events of one type.
///
/// Rows with an unrecognized `event_type` are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events_by_type(
    conn: &Connection,
    event_type: EventType,
    limit: Option<u32>,
) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at
         FROM events
         WHERE event_type = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![event_type.as_str(), limit], |row| {
        let kind: String = row.get(3)?;
        let Some(event_type) = EventType::parse(&kind) else {
            return Ok(None);
        };
        Ok(Some(Event {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            event_type,
            actor: row.get(4)?,
            old_value: row.get(5)?,
            new_value: row.get(6)?,
            comment: row.get(7)?,
            created_at: row.get(8)?,
        }))
    })?;

    let mut events = Vec::new();
    for row in rows {
        if let Some(event) = row? {
            events.push(event);
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    #[test]
    fn test_event_insert_and_get() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let event = Event::new("package", "pkg_1", EventType::PackageImported, "test-actor")
            .with_comment("3 periods, 12 flashcards");

        let id = insert_event(&conn, &event).unwrap();
        assert!(id > 0);

        let events = get_events_by_type(&conn, EventType::PackageImported, Some(10)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "test-actor");
        assert_eq!(events[0].comment.as_deref(), Some("3 periods, 12 flashcards"));
    }

    #[test]
    fn test_event_type_round_trips_through_storage_name() {
        for kind in [
            EventType::PackageImported,
            EventType::FlashcardMerged,
            EventType::ScheduleCorrected,
            EventType::ActivePeriodChanged,
        ] {
            assert_eq!(EventType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventType::parse("session_created"), None);
    }
}
