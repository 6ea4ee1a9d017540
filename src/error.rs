//! Error types for StudyVault CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=format, 4=validation, 5=resource, etc.)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use crate::portability::PortabilityError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for StudyVault operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,
    TransactionFailed,

    // Format (exit 3)
    InvalidFormat,
    MissingField,

    // Validation (exit 4)
    InvalidIdentity,
    DuplicateIdentity,
    OrphanedReference,
    InvalidArgument,

    // Resource (exit 5)
    PackageTooLarge,
    InsufficientDiskSpace,
    MediaWriteFailed,

    // Consistency (exit 6)
    ConsistencyFailed,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Concurrency (exit 9)
    OperationInProgress,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::TransactionFailed => "TRANSACTION_FAILED",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidIdentity => "INVALID_IDENTITY",
            Self::DuplicateIdentity => "DUPLICATE_IDENTITY",
            Self::OrphanedReference => "ORPHANED_REFERENCE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::PackageTooLarge => "PACKAGE_TOO_LARGE",
            Self::InsufficientDiskSpace => "INSUFFICIENT_DISK_SPACE",
            Self::MediaWriteFailed => "MEDIA_WRITE_FAILED",
            Self::ConsistencyFailed => "CONSISTENCY_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::OperationInProgress => "OPERATION_IN_PROGRESS",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::DatabaseError
            | Self::TransactionFailed => 2,
            Self::InvalidFormat | Self::MissingField => 3,
            Self::InvalidIdentity
            | Self::DuplicateIdentity
            | Self::OrphanedReference
            | Self::InvalidArgument => 4,
            Self::PackageTooLarge | Self::InsufficientDiskSpace | Self::MediaWriteFailed => 5,
            Self::ConsistencyFailed => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::OperationInProgress => 9,
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// True for busy conditions (another operation, a locked database) and
    /// bad arguments. Package content errors need a different package.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OperationInProgress | Self::DatabaseError | Self::InvalidArgument
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in StudyVault CLI operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `sv init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Portability(#[from] PortabilityError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Portability(e) => portability_code(e),
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for humans and scripts.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `sv init` to create the database".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::Portability(e) => portability_hint(e),

            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Self::Portability(e) = self {
            obj["error"]["kind"] = serde_json::Value::String(e.kind().as_str().to_string());
            if let Some(detail) = e.detail() {
                obj["error"]["detail"] = detail;
            }
        }

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

const fn portability_code(e: &PortabilityError) -> ErrorCode {
    match e {
        PortabilityError::InvalidFormat(_) => ErrorCode::InvalidFormat,
        PortabilityError::MissingField { .. } => ErrorCode::MissingField,
        PortabilityError::InvalidIdentity { .. } => ErrorCode::InvalidIdentity,
        PortabilityError::DuplicateIdentity { .. } => ErrorCode::DuplicateIdentity,
        PortabilityError::OrphanedReference { .. } => ErrorCode::OrphanedReference,
        PortabilityError::PackageTooLarge { .. } => ErrorCode::PackageTooLarge,
        PortabilityError::InsufficientDiskSpace { .. } => ErrorCode::InsufficientDiskSpace,
        PortabilityError::MediaWrite { .. } => ErrorCode::MediaWriteFailed,
        PortabilityError::Io(_) | PortabilityError::Preferences(_) => ErrorCode::IoError,
        PortabilityError::Database(_) => ErrorCode::TransactionFailed,
        PortabilityError::Consistency(_) => ErrorCode::ConsistencyFailed,
        PortabilityError::OperationInProgress(_) => ErrorCode::OperationInProgress,
        PortabilityError::Worker(_) => ErrorCode::InternalError,
    }
}

fn portability_hint(e: &PortabilityError) -> Option<String> {
    match e {
        PortabilityError::InvalidFormat(_) => Some(
            "The file is not a StudyVault package. Export a fresh one with `sv export`."
                .to_string(),
        ),
        PortabilityError::OrphanedReference {
            referenced_entity, ..
        } => Some(format!(
            "The package references a {referenced_entity} it does not contain. \
             Nothing was imported; re-export the package from its source."
        )),
        PortabilityError::DuplicateIdentity { collection, .. } => Some(format!(
            "Two {collection} share one identity. Nothing was imported."
        )),
        PortabilityError::PackageTooLarge { max, .. } => Some(format!(
            "Packages are limited to {} MB.",
            max / (1024 * 1024)
        )),
        PortabilityError::InsufficientDiskSpace { required, .. } => Some(format!(
            "Free at least {} MB on the destination volume and retry.",
            required.div_ceil(1024 * 1024)
        )),
        PortabilityError::Consistency(_) => Some(
            "The import was rolled back. A package needs at least one period, \
             and every subject must belong to one."
                .to_string(),
        ),
        PortabilityError::OperationInProgress(op) => Some(format!(
            "Wait for the running {op} to finish, then retry."
        )),
        PortabilityError::Database(_) => {
            Some("The import was rolled back; the store is unchanged.".to_string())
        }
        PortabilityError::MissingField { .. }
        | PortabilityError::InvalidIdentity { .. }
        | PortabilityError::MediaWrite { .. }
        | PortabilityError::Io(_)
        | PortabilityError::Preferences(_)
        | PortabilityError::Worker(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portability::Operation;

    #[test]
    fn test_portability_errors_map_to_codes() {
        let err = Error::from(PortabilityError::OrphanedReference {
            entity: "subject".into(),
            entity_id: "s1".into(),
            referenced_entity: "period".into(),
            referenced_id: "p9".into(),
        });
        assert_eq!(err.error_code(), ErrorCode::OrphanedReference);
        assert_eq!(err.exit_code(), 4);

        let err = Error::from(PortabilityError::InsufficientDiskSpace {
            required: 10,
            available: 5,
        });
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_structured_json_carries_kind_and_detail() {
        let err = Error::from(PortabilityError::DuplicateIdentity {
            collection: "periods".into(),
            id: "0b8e6a34-0000-4000-8000-000000000001".into(),
        });
        let json = err.to_structured_json();

        assert_eq!(json["error"]["code"], "DUPLICATE_IDENTITY");
        assert_eq!(json["error"]["kind"], "identity");
        assert_eq!(
            json["error"]["detail"]["id"],
            "0b8e6a34-0000-4000-8000-000000000001"
        );
        assert_eq!(json["error"]["retryable"], false);
    }

    #[test]
    fn test_operation_in_progress_is_retryable() {
        let err = Error::from(PortabilityError::OperationInProgress(Operation::Import));
        assert!(err.error_code().is_retryable());
        assert!(err.hint().unwrap().contains("import"));
    }
}
