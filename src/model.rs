use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Attribution used when a quote has no real author attached.
/// Never placed on exclusion lists: it must stay reusable.
pub const PLACEHOLDER_AUTHOR: &str = "Anonymous";

/// Days covered by the editorial schedule, counted from today.
pub const HORIZON_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Empty,
    Draft,
    Approved,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Empty => "empty",
            QueueStatus::Draft => "draft",
            QueueStatus::Approved => "approved",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "empty" => Some(QueueStatus::Empty),
            "draft" => Some(QueueStatus::Draft),
            "approved" => Some(QueueStatus::Approved),
            _ => None,
        }
    }
}

/// One content item shown for a calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub text: String,
    pub author_name: String,
    pub author_role: String,
    pub author_country: String,
}

/// Persisted record of a day's editorial status and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// ISO date key, `YYYY-MM-DD`, local calendar day.
    pub date: String,
    pub status: QueueStatus,
    pub content: Option<Quote>,
    pub reactions: ReactionCounts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Love,
    Power,
    Sad,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Love => "love",
            ReactionKind::Power => "power",
            ReactionKind::Sad => "sad",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "love" => Some(ReactionKind::Love),
            "power" => Some(ReactionKind::Power),
            "sad" => Some(ReactionKind::Sad),
            _ => None,
        }
    }
}

/// Per-day reaction tally. Counters never go below zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionCounts {
    pub love: u32,
    pub power: u32,
    pub sad: u32,
}

impl ReactionCounts {
    pub fn get(&self, kind: ReactionKind) -> u32 {
        match kind {
            ReactionKind::Love => self.love,
            ReactionKind::Power => self.power,
            ReactionKind::Sad => self.sad,
        }
    }

    pub fn increment(&mut self, kind: ReactionKind) {
        match kind {
            ReactionKind::Love => self.love += 1,
            ReactionKind::Power => self.power += 1,
            ReactionKind::Sad => self.sad += 1,
        }
    }

    pub fn decrement(&mut self, kind: ReactionKind) {
        match kind {
            ReactionKind::Love => self.love = self.love.saturating_sub(1),
            ReactionKind::Power => self.power = self.power.saturating_sub(1),
            ReactionKind::Sad => self.sad = self.sad.saturating_sub(1),
        }
    }
}

/// Format a calendar date as the queue's `YYYY-MM-DD` key.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Today's key in local time. Local, not UTC, so the editorial day does
/// not flip at a timezone boundary.
pub fn today_key() -> String {
    date_key(Local::now().date_naive())
}

/// The schedule horizon: today plus the next `HORIZON_DAYS - 1` days,
/// in date order.
pub fn horizon_keys() -> Vec<String> {
    let today = Local::now().date_naive();
    (0..HORIZON_DAYS)
        .map(|i| date_key(today + Duration::days(i)))
        .collect()
}

/// Check a `YYYY-MM-DD` date key for well-formedness. Strict: chrono
/// tolerates unpadded fields, so the key must format back to itself.
pub fn parse_date_key(s: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    (date_key(date) == s).then_some(date)
}
