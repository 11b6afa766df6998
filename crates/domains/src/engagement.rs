//! # Engagement buckets and ranking windows
//!
//! Key layout in the counter store:
//!
//! ```text
//! view:YYYYMMDD      → hash { "topic:<thread_id>" → count }
//! view:YYYYMMDDHH    → hash { "topic:<thread_id>" → count }
//! reply:YYYYMMDD     → hash { "topic:<thread_id>" → count }
//! reply:YYYYMMDDHH   → hash { "topic:<thread_id>" → count }   (deletions only)
//! hot:weekly         → sorted set { thread_id → score }
//! hot:daily          → sorted set { thread_id → score }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// A reply weighs this many views.
pub const REPLY_MULTIPLIER: i64 = 3;

const FIELD_PREFIX: &str = "topic:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    View,
    Reply,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::View, EventKind::Reply];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::View => "view",
            EventKind::Reply => "reply",
        }
    }

    /// Score contribution of one event of this kind before decay.
    pub fn multiplier(self) -> i64 {
        match self {
            EventKind::View => 1,
            EventKind::Reply => REPLY_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Hour,
}

impl Granularity {
    fn format(self) -> &'static str {
        match self {
            Granularity::Day => "%Y%m%d",
            Granularity::Hour => "%Y%m%d%H",
        }
    }

    fn step(self) -> Duration {
        match self {
            Granularity::Day => Duration::days(1),
            Granularity::Hour => Duration::hours(1),
        }
    }
}

/// Identifies one counter hash: an event kind over one calendar period.
///
/// Any instant inside the period names the same bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub kind: EventKind,
    pub granularity: Granularity,
    pub at: DateTime<Utc>,
}

impl BucketKey {
    pub fn new(kind: EventKind, granularity: Granularity, at: DateTime<Utc>) -> Self {
        Self { kind, granularity, at }
    }

    pub fn day(kind: EventKind, at: DateTime<Utc>) -> Self {
        Self::new(kind, Granularity::Day, at)
    }

    pub fn hour(kind: EventKind, at: DateTime<Utc>) -> Self {
        Self::new(kind, Granularity::Hour, at)
    }

    pub fn stamp(&self) -> String {
        self.at.format(self.granularity.format()).to_string()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.stamp())
    }
}

/// Hash field naming a thread inside a bucket.
pub fn thread_field(thread_id: Uuid) -> String {
    format!("{FIELD_PREFIX}{thread_id}")
}

/// Inverse of [`thread_field`]. Foreign fields yield `None`.
pub fn parse_thread_field(field: &str) -> Option<Uuid> {
    field
        .strip_prefix(FIELD_PREFIX)
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// The two rolling rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingWindow {
    /// 24 hour buckets ending at the current hour
    Daily,
    /// 7 day buckets ending today
    Weekly,
}

impl RankingWindow {
    pub const ALL: [RankingWindow; 2] = [RankingWindow::Daily, RankingWindow::Weekly];

    pub fn name(self) -> &'static str {
        match self {
            RankingWindow::Daily => "daily",
            RankingWindow::Weekly => "weekly",
        }
    }

    /// Key of the ranking set in the store.
    pub fn key(self) -> String {
        format!("hot:{}", self.name())
    }

    pub fn granularity(self) -> Granularity {
        match self {
            RankingWindow::Daily => Granularity::Hour,
            RankingWindow::Weekly => Granularity::Day,
        }
    }

    /// Number of periods scanned.
    pub fn len(self) -> usize {
        match self {
            RankingWindow::Daily => 24,
            RankingWindow::Weekly => 7,
        }
    }

    /// Periods of the window ending at `now`, oldest first, each with its
    /// recency weight. The oldest period weighs 1, the current one `len()`.
    pub fn periods(self, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, i64)> {
        let len = self.len();
        let step = self.granularity().step();
        (0..len)
            .map(|i| {
                let back = (len - 1 - i) as i32;
                (now - step * back, i as i64 + 1)
            })
            .collect()
    }

    /// Every bucket the window reads at `now`, with the weight applied to it.
    pub fn buckets(self, now: DateTime<Utc>) -> Vec<(BucketKey, i64)> {
        let granularity = self.granularity();
        self.periods(now)
            .into_iter()
            .flat_map(|(at, weight)| {
                [EventKind::Reply, EventKind::View]
                    .into_iter()
                    .map(move |kind| (BucketKey::new(kind, granularity, at), weight))
            })
            .collect()
    }
}

impl fmt::Display for RankingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RankingWindow {
    type Err = DomainError;

    /// Accepts both the bare name and the store key (`hot:daily`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("hot:").unwrap_or(s) {
            "daily" => Ok(RankingWindow::Daily),
            "weekly" => Ok(RankingWindow::Weekly),
            other => Err(DomainError::NotFound(
                "ranking window".to_string(),
                other.to_string(),
            )),
        }
    }
}

/// One entry of a ranking set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedThread {
    pub thread_id: Uuid,
    pub score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bucket_keys_format_day_and_hour() {
        let at = Utc.with_ymd_and_hms(2024, 1, 9, 7, 45, 0).unwrap();
        assert_eq!(BucketKey::day(EventKind::View, at).to_string(), "view:20240109");
        assert_eq!(BucketKey::hour(EventKind::Reply, at).to_string(), "reply:2024010907");
    }

    #[test]
    fn field_round_trips_thread_id() {
        let id = Uuid::now_v7();
        assert_eq!(parse_thread_field(&thread_field(id)), Some(id));
        assert_eq!(parse_thread_field("user:1"), None);
        assert_eq!(parse_thread_field("topic:not-a-uuid"), None);
    }

    #[test]
    fn weekly_periods_weight_today_highest() {
        let now = Utc.with_ymd_and_hms(2024, 1, 9, 7, 0, 0).unwrap();
        let periods = RankingWindow::Weekly.periods(now);

        assert_eq!(periods.len(), 7);
        assert_eq!(periods[0], (now - Duration::days(6), 1));
        assert_eq!(periods[6], (now, 7));
    }

    #[test]
    fn daily_periods_span_24_hours() {
        let now = Utc.with_ymd_and_hms(2024, 1, 9, 7, 30, 0).unwrap();
        let buckets = RankingWindow::Daily.buckets(now);

        assert_eq!(buckets.len(), 48);
        assert_eq!(buckets[0].0.to_string(), "reply:2024010808");
        assert_eq!(buckets[0].1, 1);
        assert_eq!(buckets[47].0.to_string(), "view:2024010907");
        assert_eq!(buckets[47].1, 24);
    }

    #[test]
    fn window_parses_name_or_key() {
        assert_eq!("weekly".parse::<RankingWindow>().unwrap(), RankingWindow::Weekly);
        assert_eq!("hot:daily".parse::<RankingWindow>().unwrap(), RankingWindow::Daily);
        assert!("monthly".parse::<RankingWindow>().is_err());
        assert_eq!(RankingWindow::Weekly.key(), "hot:weekly");
    }
}
