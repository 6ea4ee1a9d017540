//! Shared package fixtures for unit tests.

use serde_json::{Value, json};

pub const USER: &str = "7d1c62d6-4f7f-4a8e-9a55-1f7f64f0b7a1";
pub const PERIOD_FALL: &str = "0b8e6a34-0000-4000-8000-000000000001";
pub const PERIOD_SPRING: &str = "0b8e6a34-0000-4000-8000-000000000002";
pub const SUBJECT_MATH: &str = "5a1f0c2e-0000-4000-8000-000000000011";
pub const SUBJECT_BIO: &str = "5a1f0c2e-0000-4000-8000-000000000012";
pub const EVAL_MIDTERM: &str = "9c3d1e7b-0000-4000-8000-000000000021";
pub const EVAL_LAB: &str = "9c3d1e7b-0000-4000-8000-000000000022";
pub const DECK_VOCAB: &str = "e2a4b6c8-0000-4000-8000-000000000031";
pub const CARD_MITOSIS: &str = "b4f7c3a0-0000-4000-8000-000000000041";
pub const CARD_DERIVATIVE: &str = "b4f7c3a0-0000-4000-8000-000000000042";

/// Two periods, two subjects, two evaluations, one deck, two cards.
///
/// The spring period starts last. The mitosis card has been reviewed but
/// has no next review date; the derivative card's ease is out of bounds.
pub fn sample_package() -> Value {
    json!({
        "metadata": {
            "export_date": "2025-03-01T09:00:00.000Z",
            "app_version": "2.4.0",
            "format_version": "3.0",
            "platform_version": "17.5"
        },
        "user_defaults": {
            "username": "Camille",
            "GradingSystem": "usa",
            "enableHaptics": true
        },
        "user_configuration": [{
            "id": USER,
            "username": "Camille",
            "hasCompletedOnboarding": true,
            "activePeriodID": PERIOD_FALL,
            "selectedSystem": "usa",
            "createdDate": "2024-08-20T12:00:00.000Z",
            "lastModifiedDate": "2025-02-01T12:00:00.000Z"
        }],
        "periods": [
            {
                "id": PERIOD_FALL,
                "name": "Fall 2024",
                "startDate": "2024-09-01T00:00:00.000Z",
                "endDate": "2024-12-20T00:00:00.000Z",
                "createdAt": "2024-08-20T12:00:00.000Z"
            },
            {
                "id": PERIOD_SPRING,
                "name": "Spring 2025",
                "startDate": "2025-02-01T00:00:00.000Z",
                "createdAt": "2025-01-15T12:00:00.000Z"
            }
        ],
        "subjects": [
            {
                "id": SUBJECT_MATH,
                "name": "Calculus",
                "code": "MATH 201",
                "coefficient": 4.0,
                "creditHours": 4.0,
                "grade": 15.5,
                "periodId": PERIOD_FALL,
                "createdAt": "2024-09-02T08:00:00.000Z",
                "lastModified": "2024-12-01T08:00:00.000Z"
            },
            {
                "id": SUBJECT_BIO,
                "name": "Biology",
                "coefficient": 2.0,
                "grade": 13.0,
                "periodId": PERIOD_SPRING,
                "createdAt": "2025-02-02T08:00:00.000Z",
                "lastModified": "2025-02-02T08:00:00.000Z"
            }
        ],
        "evaluations": [
            {
                "id": EVAL_MIDTERM,
                "title": "Midterm",
                "grade": 16.0,
                "coefficient": 2.0,
                "date": "2024-10-15T09:00:00.000Z",
                "subjectId": SUBJECT_MATH
            },
            {
                "id": EVAL_LAB,
                "title": "Lab report",
                "grade": 12.5,
                "coefficient": 1.0,
                "date": "2025-02-20T09:00:00.000Z",
                "subjectId": SUBJECT_BIO
            }
        ],
        "flashcard_decks": [
            {
                "id": DECK_VOCAB,
                "name": "Biology terms",
                "createdAt": "2025-02-02T08:00:00.000Z"
            }
        ],
        "flashcards": [
            {
                "id": CARD_MITOSIS,
                "question": "What is mitosis?",
                "answer": "Cell division producing two identical nuclei",
                "intervalDays": 6.0,
                "easeFactor": 2.5,
                "correctCount": 2,
                "reviewCount": 3,
                "lastReviewDate": "2025-02-25T18:00:00.000Z",
                "createdAt": "2025-02-02T08:05:00.000Z",
                "questionType": "text",
                "answerType": "text",
                "deckId": DECK_VOCAB,
                "schemaVersion": "3.0"
            },
            {
                "id": CARD_DERIVATIVE,
                "question": "d/dx x^2",
                "answer": "2x",
                "intervalDays": 3.0,
                "easeFactor": 5.0,
                "correctCount": 1,
                "reviewCount": 1,
                "nextReviewDate": "2025-03-04T18:00:00.000Z",
                "lastReviewDate": "2025-03-01T18:00:00.000Z",
                "createdAt": "2024-09-10T08:05:00.000Z",
                "deckId": DECK_VOCAB,
                "schemaVersion": "3.0"
            }
        ]
    })
}
