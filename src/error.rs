use mongodb::error::{Error as DbError, ErrorKind as DbErrorKind};
use rocket::{
    http::{Status, StatusClass},
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    common::{question::QuestionId, survey::SurveyId},
    quota::{CacheError, WindowKind},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Survey {0} is not accepting responses")]
    SurveyClosed(SurveyId),
    #[error("The {window} submission limit of {limit} has been reached")]
    QuotaExceeded { window: WindowKind, limit: u32 },
    #[error("An identical answer to question {0} has already been submitted")]
    DuplicateUniqueAnswer(QuestionId),
    #[error("Question {0} does not belong to this survey")]
    QuestionNotFound(QuestionId),
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error(transparent)]
    CounterStore(#[from] CacheError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::CounterStore(_))
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SurveyClosed(_) => "survey_closed",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::DuplicateUniqueAnswer(_) => "duplicate_unique_answer",
            Self::QuestionNotFound(_) => "question_not_found",
            Self::Persistence(_) => "persistence_error",
            Self::CounterStore(_) => "counter_store_error",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::SurveyClosed(_) => Status::Forbidden,
            Self::QuotaExceeded { .. } => Status::TooManyRequests,
            Self::DuplicateUniqueAnswer(_) => Status::Conflict,
            Self::QuestionNotFound(_) | Self::BadRequest(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::Persistence(_) => Status::InternalServerError,
            Self::CounterStore(_) => Status::ServiceUnavailable,
        }
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        match *err.kind {
            DbErrorKind::BsonDeserialization(_) => {
                error!("Stored document could not be decoded: {err}");
            }
            _ => debug!("Database operation failed: {err}"),
        }
        Self::Persistence(err.to_string())
    }
}

/// The body sent alongside any error status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        Custom(status, Json(body)).respond_to(req)
    }
}
