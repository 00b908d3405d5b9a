//! Eligibility and random selection of the next card for a user.

use crate::entities::card_entity;
use crate::error::{AppError, AppResult};
use crate::models::CardHistory;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'a> {
    Picked(&'a card_entity::Model),
    /// Every card in the catalog is still cooling down for this user.
    Exhausted,
}

/// A card issued at `at` is cooling while `now - at <= cooldown`; it becomes
/// eligible only once the cooldown is strictly exceeded.
pub fn is_cooling(history: &CardHistory, card_id: i32, now: DateTime<Utc>, cooldown: Duration) -> bool {
    history
        .issued_at(card_id)
        .is_some_and(|at| now - at <= cooldown)
}

/// Never-drawn cards plus drawn cards past their cooldown. History entries
/// for cards missing from the catalog are simply never looked up.
pub fn eligible_cards<'a>(
    catalog: &'a [card_entity::Model],
    history: &CardHistory,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Vec<&'a card_entity::Model> {
    catalog
        .iter()
        .filter(|card| !is_cooling(history, card.id, now, cooldown))
        .collect()
}

/// 从可用卡牌中均匀随机选择一张
///
/// - 目录为空 -> `NoCardsAvailable`
/// - 全部在冷却期 -> `Selection::Exhausted`
///
/// 调用方负责写回 `history[card.id] = now`。
pub fn select_card<'a, R: Rng + ?Sized>(
    catalog: &'a [card_entity::Model],
    history: &CardHistory,
    now: DateTime<Utc>,
    cooldown: Duration,
    rng: &mut R,
) -> AppResult<Selection<'a>> {
    if catalog.is_empty() {
        return Err(AppError::NoCardsAvailable);
    }

    let eligible = eligible_cards(catalog, history, now, cooldown);
    Ok(match eligible.choose(rng) {
        Some(card) => Selection::Picked(card),
        None => Selection::Exhausted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn card(id: i32) -> card_entity::Model {
        card_entity::Model {
            id,
            description: format!("card {id}"),
            image: format!("images/{id}.jpg"),
            created_at: None,
            updated_at: None,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()
    }

    fn cooldown() -> Duration {
        Duration::days(10)
    }

    #[test]
    fn test_empty_catalog_is_an_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = select_card(&[], &CardHistory::new(), t0(), cooldown(), &mut rng);
        assert!(matches!(result, Err(AppError::NoCardsAvailable)));
    }

    #[test]
    fn test_fresh_user_gets_any_card() {
        let catalog = vec![card(1), card(2)];
        let mut history = CardHistory::new();
        let mut rng = StdRng::seed_from_u64(7);

        let picked = match select_card(&catalog, &history, t0(), cooldown(), &mut rng).unwrap() {
            Selection::Picked(card) => card.id,
            Selection::Exhausted => panic!("fresh user must get a card"),
        };
        assert!(picked == 1 || picked == 2);

        history.record(picked, t0());
        assert_eq!(history.len(), 1);
        assert_eq!(history.issued_at(picked), Some(t0()));
    }

    #[test]
    fn test_single_card_inside_cooldown_is_exhausted() {
        let catalog = vec![card(1)];
        let mut history = CardHistory::new();
        history.record(1, t0());
        let mut rng = StdRng::seed_from_u64(3);

        let result = select_card(&catalog, &history, t0() + Duration::days(5), cooldown(), &mut rng);
        assert_eq!(result.unwrap(), Selection::Exhausted);
    }

    #[test]
    fn test_single_card_after_cooldown_is_picked_again() {
        let catalog = vec![card(1)];
        let mut history = CardHistory::new();
        history.record(1, t0());
        let now = t0() + Duration::days(11);
        let mut rng = StdRng::seed_from_u64(3);

        let result = select_card(&catalog, &history, now, cooldown(), &mut rng).unwrap();
        assert_eq!(result, Selection::Picked(&catalog[0]));

        history.record(1, now);
        assert_eq!(history.issued_at(1), Some(now));
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        let catalog = vec![card(1)];
        let mut history = CardHistory::new();
        history.record(1, t0());
        let mut rng = StdRng::seed_from_u64(5);

        let at_boundary = t0() + cooldown();
        assert!(is_cooling(&history, 1, at_boundary, cooldown()));
        assert_eq!(
            select_card(&catalog, &history, at_boundary, cooldown(), &mut rng).unwrap(),
            Selection::Exhausted
        );

        let just_past = at_boundary + Duration::seconds(1);
        assert!(!is_cooling(&history, 1, just_past, cooldown()));
        assert_eq!(
            select_card(&catalog, &history, just_past, cooldown(), &mut rng).unwrap(),
            Selection::Picked(&catalog[0])
        );
    }

    #[test]
    fn test_stale_history_ids_are_ignored() {
        let catalog = vec![card(1)];
        let mut history = CardHistory::new();
        history.record(42, t0());
        let mut rng = StdRng::seed_from_u64(9);

        let result = select_card(&catalog, &history, t0(), cooldown(), &mut rng).unwrap();
        assert_eq!(result, Selection::Picked(&catalog[0]));
    }

    #[test]
    fn test_never_returns_cooling_card() {
        let catalog: Vec<_> = (1..=6).map(card).collect();
        let mut history = CardHistory::new();
        let now = t0() + Duration::days(20);
        // 1,2,3 仍在冷却；4 已过冷却；5,6 从未抽到
        history.record(1, now - Duration::days(1));
        history.record(2, now - Duration::days(9));
        history.record(3, now - Duration::days(10));
        history.record(4, now - Duration::days(10) - Duration::seconds(1));

        let expected: Vec<i32> = eligible_cards(&catalog, &history, now, cooldown())
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(expected, vec![4, 5, 6]);

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            match select_card(&catalog, &history, now, cooldown(), &mut rng).unwrap() {
                Selection::Picked(card) => assert!(expected.contains(&card.id)),
                Selection::Exhausted => panic!("eligible set is not empty"),
            }
        }
    }

    #[test]
    fn test_selection_is_uniform() {
        let catalog: Vec<_> = (1..=4).map(card).collect();
        let mut history = CardHistory::new();
        history.record(1, t0());
        let mut rng = StdRng::seed_from_u64(2024);

        let trials = 30_000;
        let mut counts: HashMap<i32, u32> = HashMap::new();
        for _ in 0..trials {
            if let Selection::Picked(card) =
                select_card(&catalog, &history, t0(), cooldown(), &mut rng).unwrap()
            {
                *counts.entry(card.id).or_default() += 1;
            }
        }

        assert!(!counts.contains_key(&1));
        for id in 2..=4 {
            let freq = f64::from(counts[&id]) / f64::from(trials);
            assert!((freq - 1.0 / 3.0).abs() < 0.02, "card {id} frequency {freq}");
        }
    }
}
