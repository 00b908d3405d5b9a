//! Per-user draw history: card id -> last issuance time.
//!
//! Persisted as a JSON object with string keys (`{"12": "2025-09-01T10:00:00Z"}`).
//! Everything read from storage goes through [`CardHistory::from_json`], which
//! drops malformed entries instead of trusting the stored blob.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

pub type CardId = i32;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardHistory {
    entries: BTreeMap<CardId, DateTime<Utc>>,
}

/// An entry dropped while reading a stored history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub key: String,
    pub reason: String,
}

impl CardHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(value: &Value) -> (Self, Vec<RejectedEntry>) {
        let mut history = Self::new();
        let mut rejected = Vec::new();

        let map = match value {
            Value::Object(map) => map,
            Value::Null => return (history, rejected),
            other => {
                rejected.push(RejectedEntry {
                    key: "<root>".to_string(),
                    reason: format!("expected an object, got {other}"),
                });
                return (history, rejected);
            }
        };

        for (key, raw) in map {
            let Ok(card_id) = key.trim().parse::<CardId>() else {
                rejected.push(RejectedEntry {
                    key: key.clone(),
                    reason: "card id is not an integer".to_string(),
                });
                continue;
            };
            match raw.as_str().and_then(parse_timestamp) {
                Some(at) => {
                    history.entries.insert(card_id, at);
                }
                None => rejected.push(RejectedEntry {
                    key: key.clone(),
                    reason: format!("invalid timestamp {raw}"),
                }),
            }
        }

        (history, rejected)
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(id, at)| {
                (
                    id.to_string(),
                    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true)),
                )
            })
            .collect();
        Value::Object(map)
    }

    pub fn issued_at(&self, card_id: CardId) -> Option<DateTime<Utc>> {
        self.entries.get(&card_id).copied()
    }

    pub fn record(&mut self, card_id: CardId, at: DateTime<Utc>) {
        self.entries.insert(card_id, at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries issued on `date` as seen from `zone`.
    pub fn issued_on(&self, date: NaiveDate, zone: Tz) -> usize {
        self.entries
            .values()
            .filter(|at| at.with_timezone(&zone).date_naive() == date)
            .count()
    }

    /// Drops entries for cards that no longer exist. Entries issued on
    /// `keep_day` survive so the daily limit still counts them.
    pub fn prune_missing(&mut self, known: &HashSet<CardId>, keep_day: NaiveDate, zone: Tz) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, at| {
            known.contains(id) || at.with_timezone(&zone).date_naive() == keep_day
        });
        before - self.entries.len()
    }
}

/// RFC 3339 first, then the offset-less ISO-8601 forms (read as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
