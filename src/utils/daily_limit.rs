use crate::models::CardHistory;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// 未配置 cards_limit 时的每日上限
pub const DEFAULT_CARDS_LIMIT: u32 = 3;

pub fn effective_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(n) if n > 0 => n,
        _ => DEFAULT_CARDS_LIMIT,
    }
}

/// Cards issued on the reference-zone calendar day containing `now`.
pub fn issued_today(history: &CardHistory, now: DateTime<Utc>, zone: Tz) -> usize {
    history.issued_on(now.with_timezone(&zone).date_naive(), zone)
}

/// 判断用户今天是否还能抽卡
///
/// "今天" 一律按参考时区计算，与用户所在地区无关。
pub fn can_draw_today(history: &CardHistory, now: DateTime<Utc>, limit: Option<u32>, zone: Tz) -> bool {
    issued_today(history, now, zone) < effective_limit(limit) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Europe::Kyiv;

    fn noon() -> DateTime<Utc> {
        // 15:00 Kyiv
        Utc.with_ymd_and_hms(2025, 9, 10, 12, 0, 0).unwrap()
    }

    fn history_with(times: &[DateTime<Utc>]) -> CardHistory {
        let mut history = CardHistory::new();
        for (i, at) in times.iter().enumerate() {
            history.record(i as i32 + 1, *at);
        }
        history
    }

    #[test]
    fn test_limit_boundary() {
        let now = noon();
        let two = history_with(&[now - Duration::hours(1), now - Duration::hours(2)]);
        assert!(can_draw_today(&two, now, Some(3), Kyiv));

        let three = history_with(&[
            now - Duration::hours(1),
            now - Duration::hours(2),
            now - Duration::hours(3),
        ]);
        assert!(!can_draw_today(&three, now, Some(3), Kyiv));
    }

    #[test]
    fn test_previous_days_do_not_count() {
        let now = noon();
        let history = history_with(&[
            now - Duration::days(1),
            now - Duration::days(2),
            now - Duration::days(3),
        ]);
        assert_eq!(issued_today(&history, now, Kyiv), 0);
        assert!(can_draw_today(&history, now, Some(1), Kyiv));
    }

    #[test]
    fn test_day_boundary_follows_reference_zone() {
        // 21:30 UTC = 00:30 Kyiv 次日
        let now = Utc.with_ymd_and_hms(2025, 9, 10, 21, 30, 0).unwrap();
        let history = history_with(&[Utc.with_ymd_and_hms(2025, 9, 10, 20, 0, 0).unwrap()]);

        // 在 UTC 看是同一天，在基辅已是前一天
        assert_eq!(issued_today(&history, now, Kyiv), 0);
        assert!(can_draw_today(&history, now, Some(1), Kyiv));
        assert!(!can_draw_today(&history, now, Some(1), chrono_tz::UTC));
    }

    #[test]
    fn test_unset_limit_falls_back_to_default() {
        assert_eq!(effective_limit(None), DEFAULT_CARDS_LIMIT);
        assert_eq!(effective_limit(Some(0)), DEFAULT_CARDS_LIMIT);
        assert_eq!(effective_limit(Some(5)), 5);

        let now = noon();
        let history = history_with(&[now, now, now]);
        assert!(!can_draw_today(&history, now, None, Kyiv));
    }
}
