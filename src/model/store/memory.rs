use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::{
    error::{Error, Result},
    model::{
        common::{
            question::{Question, QuestionId, QuestionOption},
            survey::{Survey, SurveyId},
        },
        db::answer_sheet::AnswerSheet,
        mongodb::Id,
    },
};

use super::{DefinitionStore, ResponseStore};

/// An in-process stand-in for [`super::MongoStore`].
#[derive(Default)]
pub struct MemoryStore {
    surveys: Mutex<HashMap<SurveyId, Survey>>,
    questions: Mutex<Vec<Question>>,
    sheets: Mutex<Vec<AnswerSheet>>,
    fail_writes: AtomicBool,
    fail_count_updates: AtomicBool,
    option_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_survey(&self, survey: Survey) {
        self.surveys.lock().unwrap().insert(survey.id, survey);
    }

    pub fn add_question(&self, question: Question) {
        self.questions.lock().unwrap().push(question);
    }

    pub fn add_sheet(&self, sheet: AnswerSheet) {
        self.sheets.lock().unwrap().push(sheet);
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.lock().unwrap().len()
    }

    pub fn survey_count(&self, survey_id: SurveyId) -> i64 {
        self.surveys.lock().unwrap()[&survey_id].num
    }

    /// Make every subsequent write fail as if the database were down.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make only the response count updates fail.
    pub fn fail_count_updates(&self, fail: bool) {
        self.fail_count_updates.store(fail, Ordering::SeqCst);
    }

    /// How many times [`DefinitionStore::options`] has been called.
    pub fn option_reads(&self) -> usize {
        self.option_reads.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persistence("database unavailable".to_string()));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl DefinitionStore for MemoryStore {
    async fn survey(&self, survey_id: SurveyId) -> Result<Option<Survey>> {
        Ok(self.surveys.lock().unwrap().get(&survey_id).cloned())
    }

    async fn questions_by_survey(&self, survey_id: SurveyId) -> Result<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .questions
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.survey_id == survey_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.serial_num);
        for question in &mut questions {
            question.options.sort_by_key(|o| o.serial_num);
        }
        Ok(questions)
    }

    async fn options(&self, question_id: QuestionId) -> Result<Vec<QuestionOption>> {
        self.option_reads.fetch_add(1, Ordering::SeqCst);
        let mut options = self
            .questions
            .lock()
            .unwrap()
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| q.options.clone())
            .unwrap_or_default();
        options.sort_by_key(|o| o.serial_num);
        Ok(options)
    }
}

#[rocket::async_trait]
impl ResponseStore for MemoryStore {
    async fn insert(&self, sheet: &AnswerSheet) -> Result<()> {
        self.check_writable()?;
        // Let concurrent submissions run their checks before this one lands.
        rocket::tokio::task::yield_now().await;
        self.sheets.lock().unwrap().push(sheet.clone());
        Ok(())
    }

    async fn find_by_content(
        &self,
        survey_id: SurveyId,
        question_id: QuestionId,
        content: &str,
    ) -> Result<Option<AnswerSheet>> {
        Ok(self
            .sheets
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.survey_id == survey_id && s.answer_to(question_id) == Some(content))
            .cloned())
    }

    async fn list_by_survey(&self, survey_id: SurveyId) -> Result<Vec<AnswerSheet>> {
        Ok(self
            .sheets
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.survey_id == survey_id)
            .cloned()
            .collect())
    }

    async fn page_by_survey(
        &self,
        survey_id: SurveyId,
        text: Option<&str>,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<AnswerSheet>, u64)> {
        let mut matching: Vec<AnswerSheet> = self
            .sheets
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.survey_id == survey_id)
            .filter(|s| text.map_or(true, |t| s.answers.iter().any(|a| a.content.contains(t))))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.submitted_at, b.id).cmp(&(a.submitted_at, a.id)));
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn get(&self, id: Id) -> Result<Option<AnswerSheet>> {
        Ok(self
            .sheets
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn delete_one(&self, id: Id) -> Result<bool> {
        self.check_writable()?;
        let mut sheets = self.sheets.lock().unwrap();
        let before = sheets.len();
        sheets.retain(|s| s.id != id);
        Ok(sheets.len() < before)
    }

    async fn delete_by_survey(&self, survey_id: SurveyId) -> Result<u64> {
        self.check_writable()?;
        let mut sheets = self.sheets.lock().unwrap();
        let before = sheets.len();
        sheets.retain(|s| s.survey_id != survey_id);
        Ok((before - sheets.len()) as u64)
    }

    async fn increment_survey_count(&self, survey_id: SurveyId) -> Result<()> {
        self.check_writable()?;
        if self.fail_count_updates.load(Ordering::SeqCst) {
            return Err(Error::Persistence("count update failed".to_string()));
        }
        match self.surveys.lock().unwrap().get_mut(&survey_id) {
            Some(survey) => {
                survey.num += 1;
                Ok(())
            }
            None => Err(Error::not_found(format!("Survey with ID '{survey_id}'"))),
        }
    }

    async fn set_survey_count(&self, survey_id: SurveyId, count: i64) -> Result<()> {
        self.check_writable()?;
        match self.surveys.lock().unwrap().get_mut(&survey_id) {
            Some(survey) => {
                survey.num = count;
                Ok(())
            }
            None => Err(Error::not_found(format!("Survey with ID '{survey_id}'"))),
        }
    }
}
