//! Per-respondent submission quotas.
//!
//! Counters live in an expiring key-value cache. A daily counter expires at
//! the next local midnight and a total counter expires at the survey deadline,
//! so an absent counter always means "nothing submitted in this window yet".

use std::{fmt, time::Duration};

use thiserror::Error;

use crate::model::common::survey::SurveyId;

mod ledger;
mod memory;
mod redis_cache;

pub use ledger::{next_local_midnight, Admission, QuotaLedger, QuotaOp, QuotaTimezone};
pub use memory::MemoryCounterCache;
pub use redis_cache::RedisCounterCache;

/// The two windows a respondent's submissions are counted over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Daily,
    Total,
}

impl WindowKind {
    /// Every window, in the order they are checked.
    pub const ALL: [WindowKind; 2] = [WindowKind::Daily, WindowKind::Total];

    fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Total => "total",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaKey<'a> {
    pub survey_id: SurveyId,
    pub window: WindowKind,
    pub respondent: &'a str,
}

impl<'a> QuotaKey<'a> {
    pub fn new(survey_id: SurveyId, window: WindowKind, respondent: &'a str) -> Self {
        Self {
            survey_id,
            window,
            respondent,
        }
    }

    /// The cache key for this counter.
    ///
    /// The respondent is length-prefixed so that no respondent ID can collide
    /// with another survey's or window's key.
    pub fn encode(&self) -> String {
        format!(
            "{}{}:{}:{}",
            Self::survey_prefix(self.survey_id),
            self.window,
            self.respondent.len(),
            self.respondent
        )
    }

    /// The prefix shared by every counter of a survey.
    pub fn survey_prefix(survey_id: SurveyId) -> String {
        format!("quota:{survey_id}:")
    }
}

/// Failures of the counter cache.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The cache could not be reached at all, so nothing was read or written.
    #[error("Counter cache unavailable: {0}")]
    Unavailable(String),
    /// The cache was reached but the operation failed or its outcome is unknown.
    #[error("Counter cache failure: {0}")]
    Ambiguous(String),
}

/// An expiring integer store.
#[rocket::async_trait]
pub trait CounterCache: Send + Sync {
    /// The current value, or `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError>;

    /// Overwrite the value and (re)start its time-to-live.
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError>;

    /// Add one and return the new value, keeping any existing time-to-live.
    /// An absent key is created with the value `1` and no expiry.
    async fn increment(&self, key: &str) -> Result<i64, CacheError>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    async fn scan_delete(&self, prefix: &str) -> Result<u64, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_by_survey_and_window() {
        let daily = QuotaKey::new(7, WindowKind::Daily, "alice").encode();
        let total = QuotaKey::new(7, WindowKind::Total, "alice").encode();
        assert_eq!(daily, "quota:7:daily:5:alice");
        assert_eq!(total, "quota:7:total:5:alice");
        assert!(daily.starts_with(&QuotaKey::survey_prefix(7)));
        assert!(!daily.starts_with(&QuotaKey::survey_prefix(70)));
    }

    #[test]
    fn respondent_cannot_forge_another_key() {
        let sneaky = QuotaKey::new(1, WindowKind::Daily, "1:a").encode();
        let plain = QuotaKey::new(1, WindowKind::Daily, "a").encode();
        assert_ne!(sneaky, plain);
    }
}
