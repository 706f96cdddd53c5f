//! Storage seams between the services and MongoDB.

use crate::{
    error::Result,
    model::{
        common::{
            question::{Question, QuestionId, QuestionOption},
            survey::{Survey, SurveyId},
        },
        db::answer_sheet::AnswerSheet,
        mongodb::Id,
    },
};

mod mongo;
pub use mongo::MongoStore;

#[cfg(test)]
mod memory;
#[cfg(test)]
pub use memory::MemoryStore;

/// Read access to survey definitions.
#[rocket::async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn survey(&self, survey_id: SurveyId) -> Result<Option<Survey>>;

    /// All questions of a survey, ordered by serial number.
    async fn questions_by_survey(&self, survey_id: SurveyId) -> Result<Vec<Question>>;

    /// The options of a question, ordered by serial number. Unknown
    /// questions have none.
    async fn options(&self, question_id: QuestionId) -> Result<Vec<QuestionOption>>;
}

/// Durable storage of answer sheets and survey response counts.
#[rocket::async_trait]
pub trait ResponseStore: Send + Sync {
    async fn insert(&self, sheet: &AnswerSheet) -> Result<()>;

    /// Any sheet of the survey answering `question_id` with exactly `content`.
    async fn find_by_content(
        &self,
        survey_id: SurveyId,
        question_id: QuestionId,
        content: &str,
    ) -> Result<Option<AnswerSheet>>;

    async fn list_by_survey(&self, survey_id: SurveyId) -> Result<Vec<AnswerSheet>>;

    /// A newest-first page of a survey's sheets and the total number of
    /// matching sheets. With `text`, only sheets with an answer containing it
    /// match.
    async fn page_by_survey(
        &self,
        survey_id: SurveyId,
        text: Option<&str>,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<AnswerSheet>, u64)>;

    async fn get(&self, id: Id) -> Result<Option<AnswerSheet>>;

    /// Returns whether a sheet was deleted.
    async fn delete_one(&self, id: Id) -> Result<bool>;

    /// Returns how many sheets were deleted.
    async fn delete_by_survey(&self, survey_id: SurveyId) -> Result<u64>;

    async fn increment_survey_count(&self, survey_id: SurveyId) -> Result<()>;

    /// Set the survey's response count to an exact value.
    async fn set_survey_count(&self, survey_id: SurveyId, count: i64) -> Result<()>;
}
