use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::survey::SurveyId;

pub type QuestionId = u32;

/// Serial number reserved for the implicit "other" option.
pub const OTHER_SERIAL_NUM: u32 = 0;

/// Label of the implicit "other" option.
pub const OTHER_CONTENT: &str = "Other";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum QuestionType {
    SingleChoice = 1,
    MultiChoice = 2,
    ShortText = 3,
    LongText = 4,
    Image = 5,
    File = 6,
}

impl QuestionType {
    pub fn is_choice(self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultiChoice)
    }

    /// Free-text questions are the only ones a uniqueness constraint applies to.
    pub fn is_text(self) -> bool {
        matches!(self, Self::ShortText | Self::LongText)
    }
}

/// One selectable option of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub serial_num: u32,
    pub content: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: QuestionId,
    pub survey_id: SurveyId,
    pub serial_num: u32,
    pub subject: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub required: bool,
    /// No two accepted sheets may give the same answer to this question.
    #[serde(default)]
    pub unique: bool,
    /// Unmatched choices are tallied under an "other" bucket.
    #[serde(default)]
    pub other_option: bool,
    #[serde(default)]
    pub minimum_option: u32,
    #[serde(default)]
    pub maximum_option: u32,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

impl Question {
    /// Whether answers to this question must be unique across the survey.
    pub fn enforces_uniqueness(&self) -> bool {
        self.unique && self.question_type.is_text()
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl Question {
        pub fn example(
            id: QuestionId,
            survey_id: SurveyId,
            question_type: QuestionType,
            options: &[&str],
        ) -> Self {
            Self {
                id,
                survey_id,
                serial_num: id,
                subject: format!("Question {id}"),
                question_type,
                required: false,
                unique: false,
                other_option: false,
                minimum_option: 0,
                maximum_option: 0,
                options: options
                    .iter()
                    .enumerate()
                    .map(|(i, content)| QuestionOption {
                        serial_num: i as u32 + 1,
                        content: content.to_string(),
                        description: String::new(),
                    })
                    .collect(),
            }
        }

        pub fn unique(mut self) -> Self {
            self.unique = true;
            self
        }

        pub fn with_other(mut self) -> Self {
            self.other_option = true;
            self
        }

        pub fn serial(mut self, serial_num: u32) -> Self {
            self.serial_num = serial_num;
            self
        }
    }
}
