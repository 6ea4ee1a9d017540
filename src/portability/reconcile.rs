//! Post-import reconciler.
//!
//! Repairs flashcard schedules that fall outside the scheduler's bounds and
//! points every user configuration at the most recently started period.
//! Every correction is independent and idempotent: a second run changes
//! nothing.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::model::{Period, SrsState};
use crate::portability::types::PortResult;
use crate::storage::MutationContext;
use crate::storage::events::EventType;
use crate::storage::sqlite::{
    fetch_schedules, latest_period, set_active_period, update_flashcard_srs,
};

pub const MIN_EASE: f64 = 1.3;
pub const MAX_EASE: f64 = 3.0;
pub const MAX_INTERVAL_DAYS: f64 = 1095.0;

/// What a reconcile pass changed.
#[derive(Debug, Default, Clone)]
pub struct ReconcileOutcome {
    /// Cards with at least one corrected field.
    pub schedules_corrected: usize,
    /// Period the active pointer now names, if any period exists.
    pub active_period: Option<Period>,
    /// User configurations whose pointer changed.
    pub configurations_updated: usize,
}

/// Bring one schedule within bounds. Returns the number of fields changed.
pub fn correct_schedule(srs: &mut SrsState, now: DateTime<Utc>) -> usize {
    let mut changed = 0;

    let ease = if srs.ease_factor.is_nan() {
        SrsState::NEW_CARD_EASE
    } else {
        srs.ease_factor.clamp(MIN_EASE, MAX_EASE)
    };
    if ease.to_bits() != srs.ease_factor.to_bits() {
        srs.ease_factor = ease;
        changed += 1;
    }

    let interval = if srs.interval_days.is_nan() || srs.interval_days < 0.0 {
        SrsState::NEW_CARD_INTERVAL
    } else {
        srs.interval_days.min(MAX_INTERVAL_DAYS)
    };
    if interval.to_bits() != srs.interval_days.to_bits() {
        srs.interval_days = interval;
        changed += 1;
    }

    if srs.review_count < 0 {
        srs.review_count = 0;
        changed += 1;
    }
    if srs.correct_count < 0 {
        srs.correct_count = 0;
        changed += 1;
    }

    if srs.review_count > 0 && srs.next_review_at.is_none() {
        // Bounded by MAX_INTERVAL_DAYS above
        #[allow(clippy::cast_possible_truncation)]
        let days = srs.interval_days.trunc() as i64;
        srs.next_review_at = Some(now + Duration::days(days));
        changed += 1;
    }

    if let (Some(next), Some(last)) = (srs.next_review_at, srs.last_review_at) {
        if next < last {
            debug!(%next, %last, "Next review precedes last review");
        }
    }

    changed
}

/// Reconcile every stored schedule and the active-period pointer.
///
/// Runs on the caller's connection, normally inside an import transaction.
///
/// # Errors
///
/// Returns an error if a read or update fails.
pub fn reconcile(
    conn: &Connection,
    ctx: &mut MutationContext,
    now: DateTime<Utc>,
) -> PortResult<ReconcileOutcome> {
    let mut outcome = ReconcileOutcome::default();

    for (id, mut srs) in fetch_schedules(conn)? {
        let fields = correct_schedule(&mut srs, now);
        if fields == 0 {
            continue;
        }
        update_flashcard_srs(conn, &id, &srs)?;
        ctx.record_note(
            "flashcard",
            &id,
            EventType::ScheduleCorrected,
            &format!("{fields} field(s) corrected"),
        );
        outcome.schedules_corrected += 1;
    }

    match latest_period(conn)? {
        Some(period) => {
            outcome.configurations_updated = set_active_period(conn, &period.id)?;
            if outcome.configurations_updated > 0 {
                ctx.record_change(
                    "period",
                    &period.id,
                    EventType::ActivePeriodChanged,
                    None,
                    Some(period.name.clone()),
                );
            }
            outcome.active_period = Some(period);
        }
        None => warn!("No period to activate"),
    }

    info!(
        corrected = outcome.schedules_corrected,
        active = outcome.active_period.as_ref().map_or("", |p| p.name.as_str()),
        "Reconciled"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Flashcard, FlashcardDeck, UserConfiguration, now};
    use crate::storage::SqliteStorage;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_ease_bounds() {
        let mut srs = SrsState {
            ease_factor: 5.0,
            ..SrsState::default()
        };
        assert_eq!(correct_schedule(&mut srs, now()), 1);
        assert!((srs.ease_factor - MAX_EASE).abs() < f64::EPSILON);

        srs.ease_factor = 0.4;
        correct_schedule(&mut srs, now());
        assert!((srs.ease_factor - MIN_EASE).abs() < f64::EPSILON);

        srs.ease_factor = f64::NAN;
        correct_schedule(&mut srs, now());
        assert!((srs.ease_factor - 2.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_interval_and_counters() {
        let mut srs = SrsState {
            interval_days: -4.0,
            review_count: -2,
            correct_count: -1,
            ..SrsState::default()
        };
        assert_eq!(correct_schedule(&mut srs, now()), 3);
        assert!((srs.interval_days - 1.0).abs() < f64::EPSILON);
        assert_eq!(srs.review_count, 0);
        assert_eq!(srs.correct_count, 0);
        // Never reviewed: no next review is invented
        assert!(srs.next_review_at.is_none());

        srs.interval_days = 4000.0;
        correct_schedule(&mut srs, now());
        assert!((srs.interval_days - MAX_INTERVAL_DAYS).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reviewed_card_gets_next_review() {
        let today = at(2025, 3, 1);
        let mut srs = SrsState {
            interval_days: 6.9,
            review_count: 3,
            ..SrsState::default()
        };
        assert_eq!(correct_schedule(&mut srs, today), 1);
        assert_eq!(srs.next_review_at, Some(at(2025, 3, 7)));
    }

    #[test]
    fn test_correction_is_idempotent() {
        let mut srs = SrsState {
            interval_days: f64::NAN,
            ease_factor: 9.0,
            review_count: 2,
            correct_count: -3,
            ..SrsState::default()
        };
        assert!(correct_schedule(&mut srs, now()) > 0);
        let once = srs.clone();
        assert_eq!(correct_schedule(&mut srs, now()), 0);
        assert_eq!(srs, once);
    }

    #[test]
    fn test_backwards_review_dates_are_left_alone() {
        let mut srs = SrsState {
            review_count: 1,
            next_review_at: Some(at(2025, 1, 1)),
            last_review_at: Some(at(2025, 2, 1)),
            ..SrsState::default()
        };
        assert_eq!(correct_schedule(&mut srs, now()), 0);
        assert_eq!(srs.next_review_at, Some(at(2025, 1, 1)));
    }

    #[test]
    fn test_reconcile_store() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let older = Period::new("Fall", at(2024, 9, 1));
        let newer = Period::new("Spring", at(2025, 2, 1));
        storage.save_period(&older, "test").unwrap();
        storage.save_period(&newer, "test").unwrap();
        storage
            .save_user_configuration(
                &UserConfiguration::new("camille").with_active_period(&older.id),
                "test",
            )
            .unwrap();
        let deck = FlashcardDeck::new("Vocab");
        storage.save_deck(&deck, "test").unwrap();
        let card = Flashcard::new("q", "a", &deck.id).with_srs(SrsState {
            ease_factor: 4.0,
            ..SrsState::default()
        });
        storage.save_flashcard(&card, "test").unwrap();

        let first: ReconcileOutcome = storage
            .mutate("reconcile", "test", |tx, ctx| reconcile(tx, ctx, now()))
            .unwrap();
        assert_eq!(first.schedules_corrected, 1);
        assert_eq!(first.configurations_updated, 1);
        assert_eq!(first.active_period.unwrap().id, newer.id);

        let stored = storage.get_flashcard(&card.id).unwrap().unwrap();
        assert!((stored.srs.ease_factor - MAX_EASE).abs() < f64::EPSILON);

        let second: ReconcileOutcome = storage
            .mutate("reconcile", "test", |tx, ctx| reconcile(tx, ctx, now()))
            .unwrap();
        assert_eq!(second.schedules_corrected, 0);
        assert_eq!(second.configurations_updated, 0);
    }
}
