use crate::error::{AppError, AppResult};
use crate::models::BotSettings;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;

const DAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// 每日推送时间：参考时区内的整点 + 星期集合（0=周一）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSchedule {
    hour: u32,
    days: BTreeSet<u32>,
}

impl NotificationSchedule {
    pub fn new(hour: u32, days: impl IntoIterator<Item = u32>) -> AppResult<Self> {
        if hour > 23 {
            return Err(AppError::ValidationError(format!(
                "notification hour must be 0-23, got {hour}"
            )));
        }
        let days: BTreeSet<u32> = days.into_iter().collect();
        if let Some(bad) = days.iter().find(|d| **d > 6) {
            return Err(AppError::ValidationError(format!(
                "weekday must be 0-6, got {bad}"
            )));
        }
        Ok(Self { hour, days })
    }

    /// Builds the schedule from settings; weekday strings that are not
    /// `"0"`..`"6"` are skipped with a warning.
    pub fn from_settings(settings: &BotSettings) -> AppResult<Self> {
        let days = settings
            .notification_days
            .iter()
            .filter_map(|raw| match raw.trim().parse::<u32>() {
                Ok(day) if day <= 6 => Some(day),
                _ => {
                    log::warn!("Ignoring invalid notification day {raw:?}");
                    None
                }
            })
            .collect::<Vec<_>>();
        Self::new(settings.notification_time, days)
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Cron form of the schedule, e.g. `0 9 * * mon,fri`.
    pub fn cron_expression(&self) -> String {
        if self.days.is_empty() {
            return "never".to_string();
        }
        let days: Vec<&str> = self.days.iter().map(|d| DAY_NAMES[*d as usize]).collect();
        format!("0 {} * * {}", self.hour, days.join(","))
    }

    /// First fire time strictly after `now`, or `None` when no weekday is selected.
    pub fn next_run_after(&self, now: DateTime<Utc>, zone: Tz) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(&zone).date_naive();
        for offset in 0..=7 {
            let date = today + Duration::days(offset);
            if !self.days.contains(&date.weekday().num_days_from_monday()) {
                continue;
            }
            let naive = date.and_hms_opt(self.hour, 0, 0)?;
            // 夏令时跳过的整点顺延一小时
            let local = zone
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| zone.from_local_datetime(&(naive + Duration::hours(1))).earliest());
            if let Some(local) = local {
                let at = local.with_timezone(&Utc);
                if at > now {
                    return Some(at);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Kyiv;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_next_run_later_same_day() {
        let schedule = NotificationSchedule::new(9, [0]).unwrap();
        // 2025-09-01 周一 08:00 Kyiv
        let next = schedule.next_run_after(utc(2025, 9, 1, 5, 0), Kyiv);
        assert_eq!(next, Some(utc(2025, 9, 1, 6, 0)));
    }

    #[test]
    fn test_next_run_is_strictly_after_now() {
        let schedule = NotificationSchedule::new(9, [0]).unwrap();
        let next = schedule.next_run_after(utc(2025, 9, 1, 6, 0), Kyiv);
        assert_eq!(next, Some(utc(2025, 9, 8, 6, 0)));
    }

    #[test]
    fn test_next_run_skips_unselected_days() {
        let schedule = NotificationSchedule::new(9, [2, 4]).unwrap();
        let next = schedule.next_run_after(utc(2025, 9, 1, 5, 0), Kyiv);
        assert_eq!(next, Some(utc(2025, 9, 3, 6, 0)));
    }

    #[test]
    fn test_next_run_in_winter_offset() {
        let schedule = NotificationSchedule::new(0, 0..=6).unwrap();
        // 23:59 Kyiv (UTC+2)
        let next = schedule.next_run_after(utc(2025, 12, 1, 21, 59), Kyiv);
        assert_eq!(next, Some(utc(2025, 12, 1, 22, 0)));
    }

    #[test]
    fn test_no_days_never_runs() {
        let schedule = NotificationSchedule::new(9, Vec::<u32>::new()).unwrap();
        assert!(schedule.is_empty());
        assert_eq!(schedule.next_run_after(utc(2025, 9, 1, 5, 0), Kyiv), None);
        assert_eq!(schedule.cron_expression(), "never");
    }

    #[test]
    fn test_from_settings_skips_invalid_days() {
        let settings = BotSettings {
            notification_time: 9,
            notification_days: vec!["2".into(), "0".into(), "9".into(), "x".into()],
            ..BotSettings::default()
        };
        let schedule = NotificationSchedule::from_settings(&settings).unwrap();
        assert_eq!(schedule.days.iter().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(schedule.cron_expression(), "0 9 * * mon,wed");
    }

    #[test]
    fn test_invalid_hour_is_rejected() {
        assert!(NotificationSchedule::new(24, [0]).is_err());
        assert!(NotificationSchedule::new(9, [7]).is_err());
    }
}
