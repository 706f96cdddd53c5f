use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::quota::WindowKind;

pub type SurveyId = u32;

/// Publication states of a survey. Stored as the numbers `1`, `2` and `3`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum SurveyState {
    /// Still being authored.
    Unpublished = 1,
    /// Open for responses between its start time and deadline.
    Published = 2,
    /// Closed by its owner.
    Closed = 3,
}

impl From<SurveyState> for Bson {
    fn from(state: SurveyState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}

/// A survey definition. Authoring happens elsewhere; this service only reads
/// surveys and bumps their response counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    #[serde(rename = "_id")]
    pub id: SurveyId,
    pub title: String,
    pub state: SurveyState,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub deadline: DateTime<Utc>,
    /// Per-respondent submissions allowed per calendar day, `0` for unlimited.
    #[serde(default)]
    pub daily_limit: u32,
    /// Per-respondent submissions allowed over the survey's lifetime, `0` for unlimited.
    #[serde(default)]
    pub sum_limit: u32,
    /// Number of accepted answer sheets.
    #[serde(default)]
    pub num: i64,
}

impl Survey {
    /// Whether a submission made at `now` may be admitted.
    pub fn accepts_responses_at(&self, now: DateTime<Utc>) -> bool {
        self.state == SurveyState::Published && self.start_time <= now && now < self.deadline
    }

    /// The configured limit for the given quota window.
    pub fn limit(&self, window: WindowKind) -> u32 {
        match window {
            WindowKind::Daily => self.daily_limit,
            WindowKind::Total => self.sum_limit,
        }
    }
}
