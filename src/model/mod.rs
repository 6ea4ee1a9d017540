//! Data models for StudyVault.
//!
//! This module contains the study domain:
//! - Period (academic term, root of the hierarchy)
//! - Subject and Evaluation (grades)
//! - FlashcardDeck and Flashcard (spaced repetition)
//! - UserConfiguration (profile snapshot)
//!
//! Relationships are plain parent-id fields; lookups go through
//! identity-keyed maps rather than object graphs.

pub mod academic;
pub mod flashcard;
pub mod user_config;

pub use academic::{Evaluation, Period, Subject, SubjectWeight};
pub use flashcard::{Flashcard, FlashcardDeck, MediaKind, MediaRef, SrsState};
pub use user_config::UserConfiguration;

/// Current time truncated to the millisecond precision the store keeps.
#[must_use]
pub fn now() -> chrono::DateTime<chrono::Utc> {
    use chrono::SubsecRound;
    chrono::Utc::now().trunc_subsecs(3)
}

/// Generate a fresh identity token (hyphenated UUID v4).
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
