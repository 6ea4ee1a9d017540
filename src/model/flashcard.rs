//! Flashcard decks and cards with spaced-repetition state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, now};

/// A named collection of flashcards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardDeck {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl FlashcardDeck {
    pub fn new(name: &str) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            created_at: now(),
        }
    }

    /// Deck with a caller-chosen identity (placeholder decks keep the
    /// identity their cards already point at).
    pub fn with_id(id: &str, name: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            created_at,
        }
    }
}

/// What a card side displays besides its text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Text,
    Image,
    Audio,
}

impl MediaKind {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }

    /// Parse from string. Unknown values are treated as plain text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "image" => Self::Image,
            "audio" => Self::Audio,
            _ => Self::Text,
        }
    }
}

/// Media attached to one side of a card.
///
/// Filenames are bare names inside the media directory. `image_data` is the
/// legacy inline payload: read from old packages, never written by new exports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub image_file_name: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub audio_file_name: Option<String>,
    pub audio_duration: Option<f64>,
}

impl MediaRef {
    #[must_use]
    pub fn image(file_name: &str) -> Self {
        Self {
            kind: MediaKind::Image,
            image_file_name: Some(file_name.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn audio(file_name: &str, duration: f64) -> Self {
        Self {
            kind: MediaKind::Audio,
            audio_file_name: Some(file_name.to_string()),
            audio_duration: Some(duration),
            ..Self::default()
        }
    }

    /// Referenced media filenames on this side, images first.
    pub fn file_names(&self) -> impl Iterator<Item = (MediaKind, &str)> {
        self.image_file_name
            .as_deref()
            .map(|n| (MediaKind::Image, n))
            .into_iter()
            .chain(self.audio_file_name.as_deref().map(|n| (MediaKind::Audio, n)))
            .filter(|(_, n)| !n.is_empty())
    }
}

/// Spaced-repetition scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrsState {
    pub interval_days: f64,
    pub ease_factor: f64,
    pub review_count: i64,
    pub correct_count: i64,
    pub next_review_at: Option<DateTime<Utc>>,
    pub last_review_at: Option<DateTime<Utc>>,
}

impl SrsState {
    /// Interval given to a card that has never been reviewed.
    pub const NEW_CARD_INTERVAL: f64 = 1.0;
    /// Ease given to a card that has never been reviewed.
    pub const NEW_CARD_EASE: f64 = 2.3;
}

impl Default for SrsState {
    fn default() -> Self {
        Self {
            interval_days: Self::NEW_CARD_INTERVAL,
            ease_factor: Self::NEW_CARD_EASE,
            review_count: 0,
            correct_count: 0,
            next_review_at: None,
            last_review_at: None,
        }
    }
}

/// A question/answer card owned by a deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub question_media: MediaRef,
    pub answer_media: MediaRef,
    pub srs: SrsState,
    pub created_at: DateTime<Utc>,
    pub deck_id: String,
}

impl Flashcard {
    pub fn new(question: &str, answer: &str, deck_id: &str) -> Self {
        Self {
            id: new_id(),
            question: question.to_string(),
            answer: answer.to_string(),
            question_media: MediaRef::default(),
            answer_media: MediaRef::default(),
            srs: SrsState::default(),
            created_at: now(),
            deck_id: deck_id.to_string(),
        }
    }

    #[must_use]
    pub fn with_question_media(mut self, media: MediaRef) -> Self {
        self.question_media = media;
        self
    }

    #[must_use]
    pub fn with_answer_media(mut self, media: MediaRef) -> Self {
        self.answer_media = media;
        self
    }

    #[must_use]
    pub fn with_srs(mut self, srs: SrsState) -> Self {
        self.srs = srs;
        self
    }

    /// Every media filename referenced by either side.
    pub fn media_files(&self) -> impl Iterator<Item = (MediaKind, &str)> {
        self.question_media
            .file_names()
            .chain(self.answer_media.file_names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_parsing() {
        assert_eq!(MediaKind::parse("image"), MediaKind::Image);
        assert_eq!(MediaKind::parse("AUDIO"), MediaKind::Audio);
        assert_eq!(MediaKind::parse(""), MediaKind::Text);
    }

    #[test]
    fn test_media_files_skips_empty_names() {
        let card = Flashcard::new("q", "a", "deck")
            .with_question_media(MediaRef::image("q.png"))
            .with_answer_media(MediaRef {
                kind: MediaKind::Audio,
                audio_file_name: Some(String::new()),
                ..MediaRef::default()
            });

        let files: Vec<_> = card.media_files().collect();
        assert_eq!(files, vec![(MediaKind::Image, "q.png")]);
    }

    #[test]
    fn test_new_card_schedule() {
        let srs = SrsState::default();
        assert!((srs.interval_days - 1.0).abs() < f64::EPSILON);
        assert!((srs.ease_factor - 2.3).abs() < f64::EPSILON);
        assert_eq!(srs.review_count, 0);
        assert!(srs.next_review_at.is_none());
    }
}
