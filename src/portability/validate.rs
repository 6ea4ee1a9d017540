//! Integrity validator.
//!
//! Three passes over the raw data record, each short-circuiting on the first
//! violation: structure, identity, references. Nothing here touches the store.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::portability::types::{PortResult, PortabilityError};
use crate::storage::EntityCounts;

/// Collections that must be present as arrays of objects.
const REQUIRED_COLLECTIONS: [&str; 5] = [
    "periods",
    "subjects",
    "evaluations",
    "flashcard_decks",
    "flashcards",
];

/// What a valid package will do to the store.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ValidationReport {
    pub counts: EntityCounts,
    /// Deck ids referenced by flashcards but absent from the package, in first-seen order.
    pub decks_to_create: Vec<String>,
    /// Flashcards with an empty or malformed deck id.
    pub deckless_cards: usize,
}

/// Parse an identity token. Case-insensitive, hyphenated or not.
#[must_use]
pub fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Canonical lookup key for an identity token.
///
/// Lowercase hyphenated form for UUIDs; anything else is returned as-is.
#[must_use]
pub fn normalize_id(raw: &str) -> String {
    parse_id(raw).map_or_else(|| raw.to_string(), |id| id.hyphenated().to_string())
}

/// Validate a data record.
///
/// # Errors
///
/// `MissingField` for structural problems, `InvalidIdentity` or
/// `DuplicateIdentity` for identity problems, `OrphanedReference` for a
/// subject or evaluation pointing outside the package.
pub fn validate(record: &Value) -> PortResult<ValidationReport> {
    let root = check_structure(record)?;
    let ids = check_identities(root)?;
    let (decks_to_create, deckless_cards) = check_references(root, &ids)?;

    let len = |key: &str| root.get(key).and_then(Value::as_array).map_or(0, Vec::len);
    Ok(ValidationReport {
        counts: EntityCounts {
            user_configurations: len("user_configuration"),
            periods: len("periods"),
            subjects: len("subjects"),
            evaluations: len("evaluations"),
            flashcard_decks: len("flashcard_decks"),
            flashcards: len("flashcards"),
        },
        decks_to_create,
        deckless_cards,
    })
}

fn missing(field: impl Into<String>) -> PortabilityError {
    PortabilityError::MissingField {
        field: field.into(),
    }
}

fn items<'a>(root: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    root.get(key)
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

fn check_array_of_objects(root: &Map<String, Value>, key: &str) -> PortResult<()> {
    let array = root
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| missing(key))?;
    if let Some(i) = array.iter().position(|v| !v.is_object()) {
        return Err(missing(format!("{key}[{i}]")));
    }
    Ok(())
}

fn check_structure(record: &Value) -> PortResult<&Map<String, Value>> {
    let root = record.as_object().ok_or_else(|| missing("<root>"))?;

    let metadata = root
        .get("metadata")
        .and_then(Value::as_object)
        .ok_or_else(|| missing("metadata"))?;
    for field in ["export_date", "app_version"] {
        if !metadata.get(field).is_some_and(Value::is_string) {
            return Err(missing(format!("metadata.{field}")));
        }
    }

    for key in REQUIRED_COLLECTIONS {
        check_array_of_objects(root, key)?;
    }
    if root.contains_key("user_configuration") {
        check_array_of_objects(root, "user_configuration")?;
    }
    if root.get("user_defaults").is_some_and(|v| !v.is_object()) {
        return Err(missing("user_defaults"));
    }
    Ok(root)
}

/// Identity sets used by the reference pass.
struct Identities {
    periods: HashSet<Uuid>,
    subjects: HashSet<Uuid>,
    decks: HashSet<Uuid>,
}

fn collect_ids(root: &Map<String, Value>, collection: &str) -> PortResult<HashSet<Uuid>> {
    let mut seen = HashSet::new();
    for (index, item) in items(root, collection).iter().enumerate() {
        let invalid = |reason: String| PortabilityError::InvalidIdentity {
            collection: collection.to_string(),
            index,
            reason,
        };
        let raw = match item.get("id") {
            None | Some(Value::Null) => return Err(invalid("missing id".into())),
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(invalid("empty id".into()));
            }
            Some(Value::String(s)) => s,
            Some(other) => return Err(invalid(format!("id is not a string: {other}"))),
        };
        let id = parse_id(raw).ok_or_else(|| invalid(format!("not a UUID: {raw}")))?;
        if !seen.insert(id) {
            return Err(PortabilityError::DuplicateIdentity {
                collection: collection.to_string(),
                id: raw.clone(),
            });
        }
    }
    Ok(seen)
}

fn check_identities(root: &Map<String, Value>) -> PortResult<Identities> {
    collect_ids(root, "user_configuration")?;
    let periods = collect_ids(root, "periods")?;
    let subjects = collect_ids(root, "subjects")?;
    collect_ids(root, "evaluations")?;
    let decks = collect_ids(root, "flashcard_decks")?;
    collect_ids(root, "flashcards")?;
    Ok(Identities {
        periods,
        subjects,
        decks,
    })
}

/// Non-empty string reference, if any.
fn reference<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn item_id(item: &Value) -> String {
    item.get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn check_parent(
    root: &Map<String, Value>,
    collection: &str,
    entity: &str,
    key: &str,
    referenced_entity: &str,
    known: &HashSet<Uuid>,
) -> PortResult<()> {
    for item in items(root, collection) {
        let Some(target) = reference(item, key) else {
            continue;
        };
        if !parse_id(target).is_some_and(|id| known.contains(&id)) {
            return Err(PortabilityError::OrphanedReference {
                entity: entity.to_string(),
                entity_id: item_id(item),
                referenced_entity: referenced_entity.to_string(),
                referenced_id: target.to_string(),
            });
        }
    }
    Ok(())
}

fn check_references(
    root: &Map<String, Value>,
    ids: &Identities,
) -> PortResult<(Vec<String>, usize)> {
    check_parent(root, "subjects", "subject", "periodId", "period", &ids.periods)?;
    check_parent(
        root,
        "evaluations",
        "evaluation",
        "subjectId",
        "subject",
        &ids.subjects,
    )?;

    let mut decks_to_create = Vec::new();
    let mut pending = HashSet::new();
    let mut deckless = 0;
    for card in items(root, "flashcards") {
        match reference(card, "deckId").and_then(|raw| parse_id(raw).map(|id| (raw, id))) {
            Some((raw, id)) => {
                if !ids.decks.contains(&id) && pending.insert(id) {
                    decks_to_create.push(raw.to_string());
                }
            }
            None => deckless += 1,
        }
    }
    Ok((decks_to_create, deckless))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portability::testing::*;
    use serde_json::json;

    #[test]
    fn test_sample_package_is_valid() {
        let report = validate(&sample_package()).unwrap();
        assert_eq!(report.counts.periods, 2);
        assert_eq!(report.counts.flashcards, 2);
        assert_eq!(report.counts.user_configurations, 1);
        assert!(report.decks_to_create.is_empty());
        assert_eq!(report.deckless_cards, 0);
    }

    #[test]
    fn test_structural_failures_name_the_field() {
        let mut pkg = sample_package();
        pkg["metadata"].as_object_mut().unwrap().remove("app_version");
        assert!(matches!(
            validate(&pkg),
            Err(PortabilityError::MissingField { field }) if field == "metadata.app_version"
        ));

        let mut pkg = sample_package();
        pkg["subjects"] = json!({});
        assert!(matches!(
            validate(&pkg),
            Err(PortabilityError::MissingField { field }) if field == "subjects"
        ));

        let mut pkg = sample_package();
        pkg["flashcards"].as_array_mut().unwrap().push(json!("card"));
        assert!(matches!(
            validate(&pkg),
            Err(PortabilityError::MissingField { field }) if field == "flashcards[2]"
        ));

        let mut pkg = sample_package();
        pkg["user_defaults"] = json!([]);
        assert!(validate(&pkg).is_err());
    }

    #[test]
    fn test_user_configuration_is_optional() {
        let mut pkg = sample_package();
        pkg.as_object_mut().unwrap().remove("user_configuration");
        pkg.as_object_mut().unwrap().remove("user_defaults");
        assert_eq!(validate(&pkg).unwrap().counts.user_configurations, 0);
    }

    #[test]
    fn test_invalid_identity_reports_position() {
        let mut pkg = sample_package();
        pkg["evaluations"][1]["id"] = json!("not-a-uuid");
        match validate(&pkg) {
            Err(PortabilityError::InvalidIdentity {
                collection, index, ..
            }) => {
                assert_eq!(collection, "evaluations");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let mut pkg = sample_package();
        pkg["periods"][0]["id"] = json!("");
        assert!(matches!(
            validate(&pkg),
            Err(PortabilityError::InvalidIdentity { reason, .. }) if reason == "empty id"
        ));
    }

    #[test]
    fn test_duplicate_period_is_named() {
        let mut pkg = sample_package();
        // Same token, different case
        pkg["periods"][1]["id"] = json!(PERIOD_FALL.to_uppercase());
        pkg["subjects"][1]["periodId"] = json!(PERIOD_FALL);
        match validate(&pkg) {
            Err(PortabilityError::DuplicateIdentity { collection, id }) => {
                assert_eq!(collection, "periods");
                assert_eq!(id, PERIOD_FALL.to_uppercase());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_orphaned_subject() {
        let mut pkg = sample_package();
        let ghost = "0b8e6a34-0000-4000-8000-0000000000ff";
        pkg["subjects"][0]["periodId"] = json!(ghost);
        match validate(&pkg) {
            Err(PortabilityError::OrphanedReference {
                entity,
                entity_id,
                referenced_entity,
                referenced_id,
            }) => {
                assert_eq!(entity, "subject");
                assert_eq!(entity_id, SUBJECT_MATH);
                assert_eq!(referenced_entity, "period");
                assert_eq!(referenced_id, ghost);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_orphaned_evaluation() {
        let mut pkg = sample_package();
        pkg["evaluations"][0]["subjectId"] = json!("5a1f0c2e-0000-4000-8000-0000000000ff");
        assert!(matches!(
            validate(&pkg),
            Err(PortabilityError::OrphanedReference { entity, .. }) if entity == "evaluation"
        ));
    }

    #[test]
    fn test_references_match_case_insensitively() {
        let mut pkg = sample_package();
        pkg["subjects"][0]["periodId"] = json!(PERIOD_FALL.to_uppercase());
        validate(&pkg).unwrap();
    }

    #[test]
    fn test_empty_subject_reference_is_left_for_import() {
        let mut pkg = sample_package();
        pkg["subjects"][0]["periodId"] = json!("");
        validate(&pkg).unwrap();
    }

    #[test]
    fn test_missing_decks_are_collected_not_fatal() {
        let mut pkg = sample_package();
        let lost = "e2a4b6c8-0000-4000-8000-0000000000aa";
        pkg["flashcards"][0]["deckId"] = json!(lost);
        pkg["flashcards"][1]["deckId"] = json!(lost.to_uppercase());
        let report = validate(&pkg).unwrap();
        assert_eq!(report.decks_to_create, vec![lost.to_string()]);

        pkg["flashcards"][0]["deckId"] = json!("");
        pkg["flashcards"][1].as_object_mut().unwrap().remove("deckId");
        let report = validate(&pkg).unwrap();
        assert!(report.decks_to_create.is_empty());
        assert_eq!(report.deckless_cards, 2);
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id(&PERIOD_FALL.to_uppercase()), PERIOD_FALL);
        assert_eq!(normalize_id("legacy-id"), "legacy-id");
    }
}
