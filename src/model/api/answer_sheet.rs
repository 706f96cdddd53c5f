use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        answer::{Answer, AnswerValue},
        question::QuestionId,
        survey::SurveyId,
    },
    db::answer_sheet::AnswerSheet,
    pagination::PaginationResult,
    submission::SubmittedAnswer,
};

use super::id::SheetId;

/// A respondent's answer sheet, as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub answers: Vec<AnswerRequest>,
}

/// `answer` is a string for text questions and single choices, or an array
/// of option contents for multiple choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub answer: AnswerValue,
}

impl From<SubmissionRequest> for Vec<SubmittedAnswer> {
    fn from(request: SubmissionRequest) -> Self {
        request
            .answers
            .into_iter()
            .map(|answer| SubmittedAnswer {
                question_id: answer.question_id,
                value: answer.answer,
            })
            .collect()
    }
}

/// Acknowledges an accepted answer sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub answer_sheet_id: SheetId,
    pub submitted_at: DateTime<Utc>,
}

impl From<&AnswerSheet> for SubmissionReceipt {
    fn from(sheet: &AnswerSheet) -> Self {
        Self {
            answer_sheet_id: sheet.id.into(),
            submitted_at: sheet.submitted_at,
        }
    }
}

/// A stored answer sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSheetDescription {
    pub id: SheetId,
    pub survey_id: SurveyId,
    pub submitted_at: DateTime<Utc>,
    pub answers: Vec<Answer>,
}

impl From<AnswerSheet> for AnswerSheetDescription {
    fn from(sheet: AnswerSheet) -> Self {
        Self {
            id: sheet.id.into(),
            survey_id: sheet.sheet.survey_id,
            submitted_at: sheet.sheet.submitted_at,
            answers: sheet.sheet.answers,
        }
    }
}

/// A page of stored answer sheets, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSheetPage {
    pub pagination: PaginationResult,
    pub answer_sheets: Vec<AnswerSheetDescription>,
}

/// What clearing a survey's responses removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub answer_sheets_deleted: u64,
    pub quota_counters_cleared: u64,
}
