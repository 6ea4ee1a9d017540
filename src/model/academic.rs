//! Academic hierarchy: periods, subjects and evaluations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, now};

/// An academic period (semester, trimester, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Period {
    /// Create a period starting at `start_date`.
    pub fn new(name: &str, start_date: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            start_date,
            end_date: None,
            created_at: now(),
        }
    }

    /// Set the end date.
    #[must_use]
    pub fn with_end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }
}

/// How a subject is weighted in averages.
///
/// Coefficient-based and credit-based grading systems are mutually
/// exclusive, so a subject carries exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SubjectWeight {
    Coefficient(f64),
    CreditHours(f64),
}

impl SubjectWeight {
    /// Storage tag.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Coefficient(_) => "coefficient",
            Self::CreditHours(_) => "credit_hours",
        }
    }

    /// Numeric weight regardless of convention.
    #[must_use]
    pub const fn value(&self) -> f64 {
        match self {
            Self::Coefficient(v) | Self::CreditHours(v) => *v,
        }
    }

    /// Rebuild from a storage tag and value. Unknown tags fall back to coefficient.
    #[must_use]
    pub fn from_parts(kind: &str, value: f64) -> Self {
        match kind {
            "credit_hours" => Self::CreditHours(value),
            _ => Self::Coefficient(value),
        }
    }
}

impl Default for SubjectWeight {
    fn default() -> Self {
        Self::Coefficient(1.0)
    }
}

/// A subject taught during a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    pub weight: SubjectWeight,
    /// Cached average, recomputed by the app when evaluations change.
    pub grade: f64,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Owning period. Non-null after any successful import.
    pub period_id: Option<String>,
}

impl Subject {
    /// Create a subject owned by `period_id`.
    pub fn new(name: &str, period_id: &str) -> Self {
        let ts = now();
        Self {
            id: new_id(),
            name: name.to_string(),
            code: None,
            weight: SubjectWeight::default(),
            grade: 0.0,
            created_at: ts,
            last_modified: ts,
            period_id: Some(period_id.to_string()),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: SubjectWeight) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_grade(mut self, grade: f64) -> Self {
        self.grade = grade;
        self
    }
}

/// A graded evaluation (exam, homework, oral).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub title: String,
    pub grade: f64,
    pub coefficient: f64,
    pub date: DateTime<Utc>,
    pub subject_id: Option<String>,
}

impl Evaluation {
    /// Create an evaluation for `subject_id`.
    pub fn new(title: &str, grade: f64, subject_id: &str) -> Self {
        Self {
            id: new_id(),
            title: title.to_string(),
            grade,
            coefficient: 1.0,
            date: now(),
            subject_id: Some(subject_id.to_string()),
        }
    }

    #[must_use]
    pub fn with_coefficient(mut self, coefficient: f64) -> Self {
        self.coefficient = coefficient;
        self
    }

    #[must_use]
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_weight_parts() {
        let w = SubjectWeight::from_parts("credit_hours", 3.0);
        assert_eq!(w, SubjectWeight::CreditHours(3.0));
        assert_eq!(w.kind_str(), "credit_hours");
        assert_eq!(SubjectWeight::from_parts("bogus", 2.0), SubjectWeight::Coefficient(2.0));
    }

    #[test]
    fn test_new_subject_links_period() {
        let period = Period::new("S1", Utc::now());
        let subject = Subject::new("Maths", &period.id).with_code("MAT");
        assert_eq!(subject.period_id.as_deref(), Some(period.id.as_str()));
        assert_eq!(subject.code.as_deref(), Some("MAT"));
        assert!(uuid::Uuid::parse_str(&subject.id).is_ok());
    }
}
