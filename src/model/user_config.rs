//! User profile snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, now};

/// Grading system used when none is recorded.
pub const DEFAULT_GRADING_SYSTEM: &str = "france";

/// Singleton-per-user profile and preferences snapshot.
///
/// Not relationally linked to the academic entities; `active_period_id` is a
/// loose pointer that the reconciler rewrites after every import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfiguration {
    pub id: String,
    pub username: String,
    pub has_completed_onboarding: bool,
    pub active_period_id: Option<String>,
    pub grading_system: String,
    pub theme: Option<String>,
    pub profile_gradient_start: Option<String>,
    pub profile_gradient_end: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl UserConfiguration {
    pub fn new(username: &str) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            username: username.to_string(),
            has_completed_onboarding: false,
            active_period_id: None,
            grading_system: DEFAULT_GRADING_SYSTEM.to_string(),
            theme: None,
            profile_gradient_start: None,
            profile_gradient_end: None,
            created_at: ts,
            last_modified: ts,
        }
    }

    #[must_use]
    pub fn with_active_period(mut self, period_id: &str) -> Self {
        self.active_period_id = Some(period_id.to_string());
        self
    }
}
