//! Entity serializer: stored entities to package records and back.
//!
//! `to_record` is pure and infallible. `from_record` is lenient: absent or
//! unparseable values fall back to the same defaults a freshly created
//! entity would get, because the validator has already rejected everything
//! that would break an invariant.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::model::user_config::DEFAULT_GRADING_SYSTEM;
use crate::model::{
    Evaluation, Flashcard, FlashcardDeck, MediaKind, MediaRef, Period, SrsState, Subject,
    SubjectWeight, UserConfiguration,
};
use crate::portability::types::{
    DeckRecord, EvaluationRecord, FLASHCARD_SCHEMA_VERSION, FlashcardRecord, PeriodRecord,
    SubjectRecord, UserConfigurationRecord,
};
use crate::portability::media::bare_name;

/// Conversion between a stored entity and its package record.
pub trait Portable: Sized {
    type Record;

    /// Canonical record for this entity.
    fn to_record(&self) -> Self::Record;

    /// Rebuild an entity; `now` stands in for missing timestamps.
    fn from_record(record: &Self::Record, now: DateTime<Utc>) -> Self;
}

/// Serialize one entity.
pub fn serialize<T: Portable>(entity: &T) -> T::Record {
    entity.to_record()
}

/// ISO-8601, UTC, millisecond fraction: `2024-09-01T08:30:00.000Z`.
#[must_use]
pub fn format_date(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse the date shapes packages have carried over time.
///
/// RFC 3339 with any offset, naive date-times taken as UTC, and bare dates.
#[must_use]
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn date_or(value: Option<&String>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    value.and_then(|s| parse_date(s)).unwrap_or(fallback)
}

fn opt_date(value: Option<&String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| parse_date(s))
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|s| !s.is_empty()).cloned()
}

impl Portable for Period {
    type Record = PeriodRecord;

    fn to_record(&self) -> PeriodRecord {
        PeriodRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            start_date: Some(format_date(&self.start_date)),
            end_date: self.end_date.as_ref().map(format_date),
            created_at: Some(format_date(&self.created_at)),
        }
    }

    fn from_record(rec: &PeriodRecord, now: DateTime<Utc>) -> Self {
        let created_at = date_or(rec.created_at.as_ref(), now);
        Self {
            id: rec.id.clone(),
            name: rec.name.clone(),
            start_date: date_or(rec.start_date.as_ref(), created_at),
            end_date: opt_date(rec.end_date.as_ref()),
            created_at,
        }
    }
}

impl Portable for Subject {
    type Record = SubjectRecord;

    fn to_record(&self) -> SubjectRecord {
        SubjectRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            code: self.code.clone(),
            coefficient: Some(self.weight.value()),
            credit_hours: match self.weight {
                SubjectWeight::CreditHours(h) => Some(h),
                SubjectWeight::Coefficient(_) => None,
            },
            grade: Some(self.grade),
            period_id: self.period_id.clone(),
            created_at: Some(format_date(&self.created_at)),
            last_modified: Some(format_date(&self.last_modified)),
        }
    }

    fn from_record(rec: &SubjectRecord, now: DateTime<Utc>) -> Self {
        let weight = match (rec.credit_hours, rec.coefficient) {
            (Some(hours), _) => SubjectWeight::CreditHours(hours),
            (None, Some(c)) => SubjectWeight::Coefficient(c),
            (None, None) => SubjectWeight::default(),
        };
        let created_at = date_or(rec.created_at.as_ref(), now);
        Self {
            id: rec.id.clone(),
            name: rec.name.clone(),
            code: non_empty(rec.code.as_ref()),
            weight,
            grade: rec.grade.unwrap_or(0.0),
            created_at,
            last_modified: date_or(rec.last_modified.as_ref(), created_at),
            period_id: non_empty(rec.period_id.as_ref()),
        }
    }
}

impl Portable for Evaluation {
    type Record = EvaluationRecord;

    fn to_record(&self) -> EvaluationRecord {
        EvaluationRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            grade: Some(self.grade),
            coefficient: Some(self.coefficient),
            date: Some(format_date(&self.date)),
            subject_id: self.subject_id.clone(),
        }
    }

    fn from_record(rec: &EvaluationRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: rec.id.clone(),
            title: rec.title.clone(),
            grade: rec.grade.unwrap_or(0.0),
            coefficient: rec.coefficient.unwrap_or(1.0),
            date: date_or(rec.date.as_ref(), now),
            subject_id: non_empty(rec.subject_id.as_ref()),
        }
    }
}

impl Portable for FlashcardDeck {
    type Record = DeckRecord;

    fn to_record(&self) -> DeckRecord {
        DeckRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: Some(format_date(&self.created_at)),
        }
    }

    fn from_record(rec: &DeckRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: rec.id.clone(),
            name: rec.name.clone(),
            created_at: date_or(rec.created_at.as_ref(), now),
        }
    }
}

/// Decode a legacy inline image. Invalid payloads are dropped with a warning.
fn decode_legacy_image(card_id: &str, data: Option<&String>) -> Option<Vec<u8>> {
    let encoded = data.filter(|s| !s.is_empty())?;
    match STANDARD.decode(encoded) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(card = %card_id, error = %e, "Ignoring undecodable inline image");
            None
        }
    }
}

fn media_from_parts(
    card_id: &str,
    kind: Option<&String>,
    image: Option<&String>,
    image_data: Option<&String>,
    audio: Option<&String>,
    audio_duration: Option<f64>,
) -> MediaRef {
    let image_file_name = non_empty(image);
    let audio_file_name = non_empty(audio);
    let kind = match kind {
        Some(k) => MediaKind::parse(k),
        None if image_file_name.is_some() => MediaKind::Image,
        None if audio_file_name.is_some() => MediaKind::Audio,
        None => MediaKind::Text,
    };
    MediaRef {
        kind,
        image_file_name,
        image_data: decode_legacy_image(card_id, image_data),
        audio_file_name,
        audio_duration,
    }
}

/// The name a media file is packaged under; the archive has no subfolders per card.
fn packaged_name(name: Option<&String>) -> Option<String> {
    name.map(|n| bare_name(n).unwrap_or(n).to_string())
}

impl Portable for Flashcard {
    type Record = FlashcardRecord;

    fn to_record(&self) -> FlashcardRecord {
        let q = &self.question_media;
        let a = &self.answer_media;
        FlashcardRecord {
            id: self.id.clone(),
            question: self.question.clone(),
            answer: self.answer.clone(),
            interval_days: Some(self.srs.interval_days),
            ease_factor: Some(self.srs.ease_factor),
            correct_count: Some(self.srs.correct_count),
            review_count: Some(self.srs.review_count),
            next_review_date: self.srs.next_review_at.as_ref().map(format_date),
            last_review_date: self.srs.last_review_at.as_ref().map(format_date),
            created_at: Some(format_date(&self.created_at)),
            question_type: Some(q.kind.as_str().to_string()),
            question_image_file_name: packaged_name(q.image_file_name.as_ref()),
            // Media travels through the archive, never inline
            question_image_data: Some(String::new()),
            question_audio_file_name: packaged_name(q.audio_file_name.as_ref()),
            question_audio_duration: q.audio_duration,
            answer_type: Some(a.kind.as_str().to_string()),
            answer_image_file_name: packaged_name(a.image_file_name.as_ref()),
            answer_image_data: Some(String::new()),
            answer_audio_file_name: packaged_name(a.audio_file_name.as_ref()),
            answer_audio_duration: a.audio_duration,
            deck_id: Some(self.deck_id.clone()),
            schema_version: Some(FLASHCARD_SCHEMA_VERSION.to_string()),
        }
    }

    fn from_record(rec: &FlashcardRecord, now: DateTime<Utc>) -> Self {
        let defaults = SrsState::default();
        Self {
            id: rec.id.clone(),
            question: rec.question.clone(),
            answer: rec.answer.clone(),
            question_media: media_from_parts(
                &rec.id,
                rec.question_type.as_ref(),
                rec.question_image_file_name.as_ref(),
                rec.question_image_data.as_ref(),
                rec.question_audio_file_name.as_ref(),
                rec.question_audio_duration,
            ),
            answer_media: media_from_parts(
                &rec.id,
                rec.answer_type.as_ref(),
                rec.answer_image_file_name.as_ref(),
                rec.answer_image_data.as_ref(),
                rec.answer_audio_file_name.as_ref(),
                rec.answer_audio_duration,
            ),
            srs: SrsState {
                interval_days: rec.interval_days.unwrap_or(defaults.interval_days),
                ease_factor: rec.ease_factor.unwrap_or(defaults.ease_factor),
                review_count: rec.review_count.unwrap_or(0),
                correct_count: rec.correct_count.unwrap_or(0),
                next_review_at: opt_date(rec.next_review_date.as_ref()),
                last_review_at: opt_date(rec.last_review_date.as_ref()),
            },
            created_at: date_or(rec.created_at.as_ref(), now),
            deck_id: rec.deck_id.clone().unwrap_or_default(),
        }
    }
}

impl Portable for UserConfiguration {
    type Record = UserConfigurationRecord;

    fn to_record(&self) -> UserConfigurationRecord {
        UserConfigurationRecord {
            id: self.id.clone(),
            username: self.username.clone(),
            has_completed_onboarding: self.has_completed_onboarding,
            active_period_id: self.active_period_id.clone(),
            selected_system: Some(self.grading_system.clone()),
            theme: self.theme.clone(),
            profile_gradient_start: self.profile_gradient_start.clone(),
            profile_gradient_end: self.profile_gradient_end.clone(),
            created_date: Some(format_date(&self.created_at)),
            last_modified_date: Some(format_date(&self.last_modified)),
        }
    }

    fn from_record(rec: &UserConfigurationRecord, now: DateTime<Utc>) -> Self {
        let created_at = date_or(rec.created_date.as_ref(), now);
        Self {
            id: rec.id.clone(),
            username: rec.username.clone(),
            has_completed_onboarding: rec.has_completed_onboarding,
            active_period_id: non_empty(rec.active_period_id.as_ref()),
            grading_system: non_empty(rec.selected_system.as_ref())
                .unwrap_or_else(|| DEFAULT_GRADING_SYSTEM.to_string()),
            theme: rec.theme.clone(),
            profile_gradient_start: rec.profile_gradient_start.clone(),
            profile_gradient_end: rec.profile_gradient_end.clone(),
            created_at,
            last_modified: date_or(rec.last_modified_date.as_ref(), created_at),
        }
    }
}
