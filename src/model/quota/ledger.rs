use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Days, FixedOffset, Local, TimeZone, Utc};

use crate::{
    error::{Error, Result},
    model::common::survey::{Survey, SurveyId},
};

use super::{CacheError, CounterCache, QuotaKey, WindowKind};

/// Smallest time-to-live given to a counter, so a counter written moments
/// before its window ends is still set with an expiry.
const MIN_TTL: Duration = Duration::from_secs(1);

/// The outcome of an admitted quota check.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The window has no limit, so nothing is counted.
    Unlimited,
    /// No counter exists yet; one must be created on commit.
    FirstInWindow,
    /// The respondent has `used` submissions in the window, below the limit.
    WithinLimit { used: i64 },
    /// The cache could not be reached, so the submission is let through
    /// without being counted.
    Unverified,
}

impl Admission {
    pub fn is_first_in_window(&self) -> bool {
        matches!(self, Self::FirstInWindow)
    }
}

/// A counter mutation deferred until the answer sheet has been stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QuotaOp {
    /// Create the counter at `1` expiring after `ttl`.
    Initialize { window: WindowKind, ttl: Duration },
    /// Add one to the existing counter. `ttl` is used only if the counter
    /// expired between the check and the commit.
    Increment { window: WindowKind, ttl: Duration },
}

impl QuotaOp {
    pub fn window(&self) -> WindowKind {
        match self {
            Self::Initialize { window, .. } | Self::Increment { window, .. } => *window,
        }
    }
}

/// Where "midnight" is for daily windows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QuotaTimezone {
    Fixed(FixedOffset),
    /// The host's timezone, including any daylight saving changes.
    HostLocal,
}

impl QuotaTimezone {
    /// The first instant of the day after `now`.
    pub fn next_midnight(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Fixed(offset) => next_local_midnight(now, offset),
            Self::HostLocal => next_local_midnight(now, &Local),
        }
    }
}

impl From<FixedOffset> for QuotaTimezone {
    fn from(offset: FixedOffset) -> Self {
        Self::Fixed(offset)
    }
}

impl fmt::Display for QuotaTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(offset) => write!(f, "UTC{offset}"),
            Self::HostLocal => f.write_str("host local time"),
        }
    }
}

/// Per-(survey, window, respondent) submission counters.
pub struct QuotaLedger {
    cache: Arc<dyn CounterCache>,
    timezone: QuotaTimezone,
}

impl QuotaLedger {
    /// Daily windows reset at midnight in `timezone`.
    pub fn new(cache: Arc<dyn CounterCache>, timezone: impl Into<QuotaTimezone>) -> Self {
        Self {
            cache,
            timezone: timezone.into(),
        }
    }

    /// Read a counter without touching it. An absent counter is `None`.
    ///
    /// If the cache is unreachable the counter is treated as absent.
    pub async fn peek(
        &self,
        survey_id: SurveyId,
        window: WindowKind,
        respondent: &str,
    ) -> Result<Option<i64>> {
        let key = QuotaKey::new(survey_id, window, respondent).encode();
        match self.cache.get(&key).await {
            Ok(value) => Ok(value),
            Err(CacheError::Unavailable(reason)) => {
                warn!("Quota counter {key} unreadable, treating as absent: {reason}");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Create or overwrite a counter with a fresh time-to-live.
    pub async fn initialize(
        &self,
        survey_id: SurveyId,
        window: WindowKind,
        respondent: &str,
        value: i64,
        ttl: Duration,
    ) -> Result<()> {
        let key = QuotaKey::new(survey_id, window, respondent).encode();
        self.cache.set(&key, value, ttl.max(MIN_TTL)).await?;
        Ok(())
    }

    /// Add one to a counter, keeping its time-to-live.
    pub async fn increment(
        &self,
        survey_id: SurveyId,
        window: WindowKind,
        respondent: &str,
    ) -> Result<i64> {
        let key = QuotaKey::new(survey_id, window, respondent).encode();
        Ok(self.cache.increment(&key).await?)
    }

    /// Decide whether one more submission fits in the window.
    ///
    /// Read-only: the matching [`QuotaOp`] must be applied once the
    /// submission is stored. An unreachable cache admits the submission as
    /// [`Admission::Unverified`], which has no counter update to apply.
    pub async fn check_and_admit(
        &self,
        survey_id: SurveyId,
        window: WindowKind,
        respondent: &str,
        limit: u32,
    ) -> Result<Admission> {
        if limit == 0 {
            return Ok(Admission::Unlimited);
        }
        let key = QuotaKey::new(survey_id, window, respondent).encode();
        let used = match self.cache.get(&key).await {
            Ok(used) => used,
            Err(CacheError::Unavailable(reason)) => {
                warn!("Quota counter {key} unreadable, admitting without counting: {reason}");
                return Ok(Admission::Unverified);
            }
            Err(err) => return Err(err.into()),
        };
        match used {
            None => Ok(Admission::FirstInWindow),
            Some(used) if used >= i64::from(limit) => {
                debug!("Respondent {respondent} hit the {window} limit of survey {survey_id}");
                Err(Error::QuotaExceeded { window, limit })
            }
            Some(used) => Ok(Admission::WithinLimit { used }),
        }
    }

    /// The counter mutation that commits an admission, if any.
    pub fn op_for(
        &self,
        survey: &Survey,
        window: WindowKind,
        admission: Admission,
        now: DateTime<Utc>,
    ) -> Option<QuotaOp> {
        let ttl = self.window_ttl(survey, window, now);
        match admission {
            Admission::Unlimited | Admission::Unverified => None,
            Admission::FirstInWindow => Some(QuotaOp::Initialize { window, ttl }),
            Admission::WithinLimit { .. } => Some(QuotaOp::Increment { window, ttl }),
        }
    }

    /// Apply a deferred counter mutation.
    pub async fn apply(&self, survey_id: SurveyId, respondent: &str, op: QuotaOp) -> Result<()> {
        match op {
            QuotaOp::Initialize { window, ttl } => {
                self.initialize(survey_id, window, respondent, 1, ttl).await
            }
            QuotaOp::Increment { window, ttl } => {
                let value = self.increment(survey_id, window, respondent).await?;
                if value == 1 {
                    // The counter expired since the check; give the recreated one a window.
                    self.initialize(survey_id, window, respondent, 1, ttl).await?;
                }
                Ok(())
            }
        }
    }

    /// How long a counter created at `now` should live.
    pub fn window_ttl(&self, survey: &Survey, window: WindowKind, now: DateTime<Utc>) -> Duration {
        let expires_at = match window {
            WindowKind::Daily => self.timezone.next_midnight(now),
            WindowKind::Total => survey.deadline,
        };
        (expires_at - now).to_std().unwrap_or(MIN_TTL).max(MIN_TTL)
    }

    /// Drop every counter belonging to a survey.
    pub async fn clear_survey(&self, survey_id: SurveyId) -> Result<u64> {
        let removed = self
            .cache
            .scan_delete(&QuotaKey::survey_prefix(survey_id))
            .await?;
        Ok(removed)
    }
}

/// The first instant of the day after `now`, in the timezone `tz`.
pub fn next_local_midnight<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let tomorrow = now.with_timezone(tz).date_naive() + Days::new(1);
    tomorrow
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| {
            // Where a DST jump skips midnight the day starts an hour later.
            tz.from_local_datetime(&midnight).earliest().or_else(|| {
                tz.from_local_datetime(&(midnight + chrono::Duration::hours(1)))
                    .earliest()
            })
        })
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or(now + chrono::Duration::days(1))
}
