use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::question::QuestionId;

/// Separator between selected options in a stored multi-choice answer.
pub const SELECTION_SEPARATOR: &str = "┋";

/// What a respondent gave for a single question.
///
/// Over JSON this is either a plain string or an array of selected option
/// contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Selected(Vec<String>),
    Text(String),
}

impl AnswerValue {
    /// Flatten into the single string stored on an answer sheet.
    ///
    /// Repeated selections collapse to their first occurrence. Selections may
    /// not contain the separator.
    pub fn encode(&self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::Selected(selected) => {
                let mut seen: Vec<&str> = Vec::with_capacity(selected.len());
                for choice in selected {
                    if choice.contains(SELECTION_SEPARATOR) {
                        return Err(Error::BadRequest(format!(
                            "Selected option {choice:?} contains a reserved character"
                        )));
                    }
                    if !seen.contains(&choice.as_str()) {
                        seen.push(choice);
                    }
                }
                Ok(seen.join(SELECTION_SEPARATOR))
            }
        }
    }
}

/// Iterate the non-empty selections of a stored answer.
pub fn selections(content: &str) -> impl Iterator<Item = &str> {
    content
        .split(SELECTION_SEPARATOR)
        .filter(|choice| !choice.is_empty())
}

/// A single stored answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: QuestionId,
    pub content: String,
}
