use std::ops::Deref;

use rocket::{
    http::Status,
    request::{FromRequest, Outcome, Request},
};

/// Header carrying the respondent identity, set by the upstream identity
/// resolver.
pub const RESPONDENT_HEADER: &str = "X-Respondent-Id";

const MAX_RESPONDENT_LEN: usize = 128;

/// The identity quotas are counted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Respondent(String);

impl Respondent {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Respondent {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespondentError {
    Missing,
    Invalid,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Respondent {
    type Error = RespondentError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(raw) = req.headers().get_one(RESPONDENT_HEADER) else {
            return Outcome::Failure((Status::Unauthorized, RespondentError::Missing));
        };
        let id = raw.trim();
        if id.is_empty() || id.len() > MAX_RESPONDENT_LEN {
            return Outcome::Failure((Status::BadRequest, RespondentError::Invalid));
        }
        Outcome::Success(Respondent(id.to_string()))
    }
}
