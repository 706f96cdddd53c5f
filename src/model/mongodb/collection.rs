use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::{
    common::{question::Question, survey::Survey},
    db::answer_sheet::AnswerSheet,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Survey {
    const NAME: &'static str = "surveys";
}

impl MongoCollection for Question {
    const NAME: &'static str = "questions";
}

impl MongoCollection for AnswerSheet {
    const NAME: &'static str = "answer_sheets";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // Question ordering within a survey.
    let question_index = IndexModel::builder()
        .keys(doc! {"survey_id": 1, "serial_num": 1})
        .options(IndexOptions::builder().unique(true).build())
        .build();
    Coll::<Question>::from_db(db)
        .create_index(question_index, None)
        .await?;

    // Uniqueness lookups.
    let content_index = IndexModel::builder()
        .keys(doc! {"survey_id": 1, "answers.question_id": 1, "answers.content": 1})
        .build();
    // Newest-first listings.
    let listing_index = IndexModel::builder()
        .keys(doc! {"survey_id": 1, "submitted_at": -1})
        .build();
    Coll::<AnswerSheet>::from_db(db)
        .create_indexes([content_index, listing_index], None)
        .await?;

    Ok(())
}
