use mongodb::{
    bson::{doc, Document, Regex},
    options::FindOptions,
    Database,
};
use rocket::futures::TryStreamExt;

use crate::{
    error::{Error, Result},
    model::{
        common::{
            question::{Question, QuestionId, QuestionOption},
            survey::{Survey, SurveyId},
        },
        db::answer_sheet::AnswerSheet,
        mongodb::{u32_id_filter, Coll, Id},
    },
};

use super::{DefinitionStore, ResponseStore};

/// Both stores, backed by one MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    surveys: Coll<Survey>,
    questions: Coll<Question>,
    sheets: Coll<AnswerSheet>,
}

impl MongoStore {
    pub fn from_db(db: &Database) -> Self {
        Self {
            surveys: Coll::from_db(db),
            questions: Coll::from_db(db),
            sheets: Coll::from_db(db),
        }
    }
}

fn survey_filter(survey_id: SurveyId) -> Document {
    doc! { "survey_id": survey_id }
}

/// Match sheets with any answer containing `text`, literally.
fn text_filter(survey_id: SurveyId, text: &str) -> Document {
    let pattern = Regex {
        pattern: escape_regex(text),
        options: String::new(),
    };
    doc! {
        "survey_id": survey_id,
        "answers.content": pattern,
    }
}

fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[rocket::async_trait]
impl DefinitionStore for MongoStore {
    async fn survey(&self, survey_id: SurveyId) -> Result<Option<Survey>> {
        Ok(self.surveys.find_one(u32_id_filter(survey_id), None).await?)
    }

    async fn questions_by_survey(&self, survey_id: SurveyId) -> Result<Vec<Question>> {
        let by_serial = FindOptions::builder()
            .sort(doc! {"serial_num": 1})
            .build();
        let mut questions: Vec<Question> = self
            .questions
            .find(survey_filter(survey_id), by_serial)
            .await?
            .try_collect()
            .await?;
        for question in &mut questions {
            question.options.sort_by_key(|option| option.serial_num);
        }
        Ok(questions)
    }

    async fn options(&self, question_id: QuestionId) -> Result<Vec<QuestionOption>> {
        let question = self
            .questions
            .find_one(u32_id_filter(question_id), None)
            .await?;
        let mut options = question.map(|q| q.options).unwrap_or_default();
        options.sort_by_key(|option| option.serial_num);
        Ok(options)
    }
}

#[rocket::async_trait]
impl ResponseStore for MongoStore {
    async fn insert(&self, sheet: &AnswerSheet) -> Result<()> {
        self.sheets.insert_one(sheet, None).await?;
        Ok(())
    }

    async fn find_by_content(
        &self,
        survey_id: SurveyId,
        question_id: QuestionId,
        content: &str,
    ) -> Result<Option<AnswerSheet>> {
        let filter = doc! {
            "survey_id": survey_id,
            "answers": {
                "$elemMatch": {
                    "question_id": question_id,
                    "content": content,
                }
            },
        };
        Ok(self.sheets.find_one(filter, None).await?)
    }

    async fn list_by_survey(&self, survey_id: SurveyId) -> Result<Vec<AnswerSheet>> {
        let sheets = self
            .sheets
            .find(survey_filter(survey_id), None)
            .await?
            .try_collect()
            .await?;
        Ok(sheets)
    }

    async fn page_by_survey(
        &self,
        survey_id: SurveyId,
        text: Option<&str>,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<AnswerSheet>, u64)> {
        let filter = match text {
            Some(text) => text_filter(survey_id, text),
            None => survey_filter(survey_id),
        };
        let options = FindOptions::builder()
            .sort(doc! {"submitted_at": -1, "_id": -1})
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        let sheets = self
            .sheets
            .find(filter.clone(), options)
            .await?
            .try_collect()
            .await?;
        let total = self.sheets.count_documents(filter, None).await?;
        Ok((sheets, total))
    }

    async fn get(&self, id: Id) -> Result<Option<AnswerSheet>> {
        Ok(self.sheets.find_one(id.as_filter(), None).await?)
    }

    async fn delete_one(&self, id: Id) -> Result<bool> {
        let result = self.sheets.delete_one(id.as_filter(), None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_by_survey(&self, survey_id: SurveyId) -> Result<u64> {
        let result = self
            .sheets
            .delete_many(survey_filter(survey_id), None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn increment_survey_count(&self, survey_id: SurveyId) -> Result<()> {
        let result = self
            .surveys
            .update_one(u32_id_filter(survey_id), doc! {"$inc": {"num": 1}}, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Survey with ID '{survey_id}'")));
        }
        Ok(())
    }

    async fn set_survey_count(&self, survey_id: SurveyId, count: i64) -> Result<()> {
        let result = self
            .surveys
            .update_one(u32_id_filter(survey_id), doc! {"$set": {"num": count}}, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Survey with ID '{survey_id}'")));
        }
        Ok(())
    }
}
