//! Package record types, statistics and errors.
//!
//! Record structs mirror the package's data file field-for-field. Entity
//! records use camelCase keys; the top-level record and metadata use
//! snake_case. Optional fields default when absent so older packages parse.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::EntityCounts;

/// Package format written by this version.
pub const FORMAT_VERSION: &str = "3.0";

/// Flashcard record schema version, advertised per card.
pub const FLASHCARD_SCHEMA_VERSION: &str = "3.0";

/// The whole data record of a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    pub metadata: Metadata,
    #[serde(default)]
    pub user_defaults: Map<String, Value>,
    #[serde(default)]
    pub user_configuration: Vec<UserConfigurationRecord>,
    pub periods: Vec<PeriodRecord>,
    pub subjects: Vec<SubjectRecord>,
    pub evaluations: Vec<EvaluationRecord>,
    pub flashcard_decks: Vec<DeckRecord>,
    pub flashcards: Vec<FlashcardRecord>,
}

impl PackageRecord {
    /// Typed view of a validated record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if a field has an unexpected type.
    pub fn from_value(value: Value) -> PortResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| PortabilityError::InvalidFormat(format!("data record: {e}")))
    }

    /// Entity counts carried by this record.
    #[must_use]
    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            user_configurations: self.user_configuration.len(),
            periods: self.periods.len(),
            subjects: self.subjects.len(),
            evaluations: self.evaluations.len(),
            flashcard_decks: self.flashcard_decks.len(),
            flashcards: self.flashcards.len(),
        }
    }
}

/// Package provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub export_date: String,
    pub app_version: String,
    #[serde(default)]
    pub format_version: Option<String>,
    #[serde(default, alias = "ios_version")]
    pub platform_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfigurationRecord {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub has_completed_onboarding: bool,
    #[serde(default, rename = "activePeriodID")]
    pub active_period_id: Option<String>,
    #[serde(default)]
    pub selected_system: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub profile_gradient_start: Option<String>,
    #[serde(default)]
    pub profile_gradient_end: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub last_modified_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub coefficient: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_hours: Option<f64>,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub period_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub coefficient: Option<f64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub subject_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardRecord {
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub interval_days: Option<f64>,
    #[serde(default)]
    pub ease_factor: Option<f64>,
    #[serde(default)]
    pub correct_count: Option<i64>,
    #[serde(default)]
    pub review_count: Option<i64>,
    #[serde(default)]
    pub next_review_date: Option<String>,
    #[serde(default)]
    pub last_review_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub question_type: Option<String>,
    #[serde(default)]
    pub question_image_file_name: Option<String>,
    #[serde(default)]
    pub question_image_data: Option<String>,
    #[serde(default)]
    pub question_audio_file_name: Option<String>,
    #[serde(default)]
    pub question_audio_duration: Option<f64>,
    #[serde(default)]
    pub answer_type: Option<String>,
    #[serde(default)]
    pub answer_image_file_name: Option<String>,
    #[serde(default)]
    pub answer_image_data: Option<String>,
    #[serde(default)]
    pub answer_audio_file_name: Option<String>,
    #[serde(default)]
    pub answer_audio_duration: Option<f64>,
    #[serde(default)]
    pub deck_id: Option<String>,
    #[serde(default)]
    pub schema_version: Option<String>,
}

/// Archive manifest, written next to the data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: String,
    pub created_at: String,
    pub app_version: String,
    /// SHA256 of `data.json`; empty when unknown.
    #[serde(default)]
    pub data_sha256: String,
    #[serde(default)]
    pub media: Vec<ManifestEntry>,
}

/// One media file inside the archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub kind: String,
    pub size: u64,
    pub sha256: String,
}

/// Statistics for an export operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    pub entities: EntityCounts,
    /// Media files written into the package.
    pub media_files: usize,
    /// Referenced media files that were not found and were skipped.
    pub media_missing: usize,
    /// Package size in bytes.
    pub bytes: u64,
}

/// Per-entity statistics for upserted collections.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityStats {
    /// Number of new records created.
    pub created: usize,
    /// Number of existing records updated.
    pub updated: usize,
}

impl EntityStats {
    /// Total records processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

/// Statistics for an import operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    /// Rows removed by the replace step.
    pub cleared: EntityCounts,
    /// Rows inserted into replaced collections.
    pub inserted: EntityCounts,
    /// Flashcard upsert results.
    pub flashcards: EntityStats,
    /// Placeholder decks created for missing deck references.
    pub decks_auto_created: usize,
    /// Placeholder decks created for surviving cards whose deck was cleared.
    pub decks_recovered: usize,
    /// Cards whose schedule the reconciler corrected.
    pub schedules_corrected: usize,
    /// Media files placed into the media directory.
    pub media_placed: usize,
}

/// The operations guarded by the single-writer discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Export,
    Import,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Export => write!(f, "export"),
            Self::Import => write!(f, "import"),
        }
    }
}

/// Error kinds, independent of the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Format,
    Identity,
    Referential,
    Resource,
    Transactional,
    Consistency,
    Concurrency,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Identity => "identity",
            Self::Referential => "referential",
            Self::Resource => "resource",
            Self::Transactional => "transactional",
            Self::Consistency => "consistency",
            Self::Concurrency => "concurrency",
        }
    }

    /// Whether errors of this kind are raised before the store is touched.
    #[must_use]
    pub const fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            Self::Format | Self::Identity | Self::Referential | Self::Resource | Self::Concurrency
        )
    }
}

/// Portability-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum PortabilityError {
    /// Corrupted archive, missing data file, unparseable record.
    #[error("Invalid package format: {0}")]
    InvalidFormat(String),

    /// Mandatory field absent or of the wrong container type.
    #[error("Missing or malformed field: {field}")]
    MissingField { field: String },

    #[error("Invalid identity in {collection} at index {index}: {reason}")]
    InvalidIdentity {
        collection: String,
        index: usize,
        reason: String,
    },

    #[error("Duplicate identity in {collection}: {id}")]
    DuplicateIdentity { collection: String, id: String },

    #[error(
        "Orphaned reference: {entity} {entity_id} references missing {referenced_entity} {referenced_id}"
    )]
    OrphanedReference {
        entity: String,
        entity_id: String,
        referenced_entity: String,
        referenced_id: String,
    },

    #[error("Package too large: {actual} bytes (maximum {max})")]
    PackageTooLarge { max: u64, actual: u64 },

    #[error("Insufficient disk space: {required} bytes required, {available} available")]
    InsufficientDiskSpace { required: u64, available: u64 },

    #[error("Failed to write media file {file}: {source}")]
    MediaWrite {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store write or commit failure; the transaction was rolled back.
    #[error("Transaction failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// Post-import validation failure; the transaction was rolled back.
    #[error("Consistency check failed: {0}")]
    Consistency(String),

    #[error("An {0} is already in progress")]
    OperationInProgress(Operation),

    #[error("Preference write failed: {0}")]
    Preferences(String),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl PortabilityError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat(_) | Self::MissingField { .. } => ErrorKind::Format,
            Self::InvalidIdentity { .. } | Self::DuplicateIdentity { .. } => ErrorKind::Identity,
            Self::OrphanedReference { .. } => ErrorKind::Referential,
            Self::PackageTooLarge { .. }
            | Self::InsufficientDiskSpace { .. }
            | Self::MediaWrite { .. }
            | Self::Io(_)
            | Self::Preferences(_) => ErrorKind::Resource,
            Self::Database(_) => ErrorKind::Transactional,
            Self::Consistency(_) => ErrorKind::Consistency,
            Self::OperationInProgress(_) | Self::Worker(_) => ErrorKind::Concurrency,
        }
    }

    /// Structured detail for precise user-facing messages.
    #[must_use]
    pub fn detail(&self) -> Option<Value> {
        match self {
            Self::MissingField { field } => Some(serde_json::json!({ "field": field })),
            Self::InvalidIdentity {
                collection,
                index,
                reason,
            } => Some(serde_json::json!({
                "collection": collection,
                "index": index,
                "reason": reason,
            })),
            Self::DuplicateIdentity { collection, id } => {
                Some(serde_json::json!({ "collection": collection, "id": id }))
            }
            Self::OrphanedReference {
                entity,
                entity_id,
                referenced_entity,
                referenced_id,
            } => Some(serde_json::json!({
                "entity": entity,
                "entity_id": entity_id,
                "referenced_entity": referenced_entity,
                "referenced_id": referenced_id,
            })),
            Self::PackageTooLarge { max, actual } => {
                Some(serde_json::json!({ "max": max, "actual": actual }))
            }
            Self::InsufficientDiskSpace {
                required,
                available,
            } => Some(serde_json::json!({ "required": required, "available": available })),
            Self::MediaWrite { file, .. } => Some(serde_json::json!({ "file": file })),
            _ => None,
        }
    }
}

/// Result type for portability operations.
pub type PortResult<T> = std::result::Result<T, PortabilityError>;
