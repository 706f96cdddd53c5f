use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    error::{Error, Result},
    model::{
        common::{
            answer::{Answer, AnswerValue},
            question::{Question, QuestionId},
            survey::{Survey, SurveyId},
        },
        db::answer_sheet::AnswerSheet,
        quota::{QuotaLedger, QuotaOp, WindowKind},
        store::{DefinitionStore, ResponseStore},
    },
    notification::{NotificationQueue, ResponseNotification},
};

/// One answer as supplied by a respondent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub value: AnswerValue,
}

/// Validates, rate-limits, deduplicates and stores answer sheets.
pub struct SubmissionPipeline {
    definitions: Arc<dyn DefinitionStore>,
    responses: Arc<dyn ResponseStore>,
    ledger: Arc<QuotaLedger>,
    notifications: Option<NotificationQueue>,
}

impl SubmissionPipeline {
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        responses: Arc<dyn ResponseStore>,
        ledger: Arc<QuotaLedger>,
    ) -> Self {
        Self {
            definitions,
            responses,
            ledger,
            notifications: None,
        }
    }

    /// Announce every accepted sheet on `queue`.
    pub fn with_notifications(mut self, queue: NotificationQueue) -> Self {
        self.notifications = Some(queue);
        self
    }

    /// Accept one answer sheet from `respondent`.
    ///
    /// Nothing is written unless every check passes: the survey must be open,
    /// every answer must belong to one of its questions, the respondent must be
    /// within both quota windows, and no unique answer may repeat an accepted
    /// one. The sheet is stored before the quota counters are advanced, so a
    /// storage failure never consumes quota.
    ///
    /// Once the sheet is stored every counter update and the survey's response
    /// count are attempted even if one of them fails. The first failure is
    /// then returned, and the sheet is not announced.
    pub async fn submit(
        &self,
        survey_id: SurveyId,
        respondent: &str,
        answers: Vec<SubmittedAnswer>,
        submitted_at: DateTime<Utc>,
    ) -> Result<AnswerSheet> {
        let survey = self
            .definitions
            .survey(survey_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Survey with ID '{survey_id}'")))?;
        if !survey.accepts_responses_at(submitted_at) {
            return Err(Error::SurveyClosed(survey_id));
        }

        let questions: HashMap<QuestionId, Question> = self
            .definitions
            .questions_by_survey(survey_id)
            .await?
            .into_iter()
            .map(|question| (question.id, question))
            .collect();
        let answers = encode_answers(&questions, answers)?;

        let quota_ops = self.check_quota(&survey, respondent, submitted_at).await?;
        self.check_unique(&survey, &questions, &answers).await?;

        let sheet = AnswerSheet::new(survey_id, answers, submitted_at);
        self.responses.insert(&sheet).await?;
        info!("Stored answer sheet {} for survey {survey_id}", sheet.id);

        let mut first_error = None;
        for op in quota_ops {
            if let Err(err) = self.ledger.apply(survey_id, respondent, op).await {
                error!(
                    "Answer sheet {} stored but {} quota counter not advanced: {err}",
                    sheet.id,
                    op.window()
                );
                first_error.get_or_insert(err);
            }
        }
        if let Err(err) = self.responses.increment_survey_count(survey_id).await {
            error!(
                "Answer sheet {} stored but response count of survey {survey_id} not advanced: {err}",
                sheet.id
            );
            first_error.get_or_insert(err);
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        if let Some(queue) = &self.notifications {
            queue.enqueue(ResponseNotification {
                survey_id,
                survey_title: survey.title.clone(),
                answer_sheet_id: sheet.id,
                submitted_at,
            });
        }
        Ok(sheet)
    }

    /// Check both windows, returning the counter updates to apply on success.
    async fn check_quota(
        &self,
        survey: &Survey,
        respondent: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuotaOp>> {
        let mut ops = Vec::with_capacity(WindowKind::ALL.len());
        for window in WindowKind::ALL {
            let admission = self
                .ledger
                .check_and_admit(survey.id, window, respondent, survey.limit(window))
                .await?;
            ops.extend(self.ledger.op_for(survey, window, admission, now));
        }
        Ok(ops)
    }

    async fn check_unique(
        &self,
        survey: &Survey,
        questions: &HashMap<QuestionId, Question>,
        answers: &[Answer],
    ) -> Result<()> {
        for answer in answers {
            let unique = questions
                .get(&answer.question_id)
                .map_or(false, Question::enforces_uniqueness);
            // Blank answers to optional questions never collide.
            if !unique || answer.content.is_empty() {
                continue;
            }
            let existing = self
                .responses
                .find_by_content(survey.id, answer.question_id, &answer.content)
                .await?;
            if existing.is_some() {
                return Err(Error::DuplicateUniqueAnswer(answer.question_id));
            }
        }
        Ok(())
    }
}

/// Resolve every answer against the survey's questions and flatten it for
/// storage.
fn encode_answers(
    questions: &HashMap<QuestionId, Question>,
    answers: Vec<SubmittedAnswer>,
) -> Result<Vec<Answer>> {
    let mut encoded: Vec<Answer> = Vec::with_capacity(answers.len());
    for SubmittedAnswer { question_id, value } in answers {
        let question = questions
            .get(&question_id)
            .ok_or(Error::QuestionNotFound(question_id))?;
        if encoded.iter().any(|a| a.question_id == question_id) {
            return Err(Error::BadRequest(format!(
                "Question {question_id} answered more than once"
            )));
        }
        if matches!(value, AnswerValue::Selected(_)) && !question.question_type.is_choice() {
            return Err(Error::BadRequest(format!(
                "Question {question_id} does not take selected options"
            )));
        }
        encoded.push(Answer {
            question_id,
            content: value.encode()?,
        });
    }
    Ok(encoded)
}
