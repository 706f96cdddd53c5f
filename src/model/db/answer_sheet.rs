use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{answer::Answer, question::QuestionId, survey::SurveyId},
    mongodb::Id,
};

/// Core answer sheet data, as submitted by a respondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSheetCore {
    pub survey_id: SurveyId,
    pub answers: Vec<Answer>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
}

impl AnswerSheetCore {
    /// The stored answer to the given question, if any.
    pub fn answer_to(&self, question_id: QuestionId) -> Option<&str> {
        self.answers
            .iter()
            .find(|answer| answer.question_id == question_id)
            .map(|answer| answer.content.as_str())
    }
}

/// An answer sheet with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSheet {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub sheet: AnswerSheetCore,
}

impl AnswerSheet {
    /// Assign a fresh ID to a submitted sheet.
    pub fn new(survey_id: SurveyId, answers: Vec<Answer>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            sheet: AnswerSheetCore {
                survey_id,
                answers,
                submitted_at,
            },
        }
    }
}

impl Deref for AnswerSheet {
    type Target = AnswerSheetCore;

    fn deref(&self) -> &Self::Target {
        &self.sheet
    }
}

impl DerefMut for AnswerSheet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.sheet
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl AnswerSheet {
        pub fn example(survey_id: SurveyId, answers: &[(QuestionId, &str)]) -> Self {
            let answers = answers
                .iter()
                .map(|(question_id, content)| Answer {
                    question_id: *question_id,
                    content: content.to_string(),
                })
                .collect();
            Self::new(survey_id, answers, Utc::now())
        }
    }
}
