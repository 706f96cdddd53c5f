use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        answer_admin::AnswerSheetAdmin,
        api::answer_sheet::{AnswerSheetDescription, AnswerSheetPage, ResetSummary},
        common::survey::SurveyId,
        mongodb::Id,
        pagination::Pagination,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        survey_answer_sheets,
        answer_sheet,
        delete_answer_sheet,
        reset_survey_answers,
    ]
}

#[get("/surveys/<survey_id>/answers?<text>")]
async fn survey_answer_sheets(
    survey_id: SurveyId,
    text: Option<&str>,
    pagination: Pagination,
    admin: &State<AnswerSheetAdmin>,
) -> Result<Json<AnswerSheetPage>> {
    let page = admin.list(survey_id, pagination, text).await?;
    Ok(Json(page))
}

#[get("/answers/<id>")]
async fn answer_sheet(
    id: Id,
    admin: &State<AnswerSheetAdmin>,
) -> Result<Json<AnswerSheetDescription>> {
    let sheet = admin.get(id).await?;
    Ok(Json(sheet))
}

#[delete("/answers/<id>")]
async fn delete_answer_sheet(id: Id, admin: &State<AnswerSheetAdmin>) -> Result<()> {
    admin.delete(id).await
}

#[delete("/surveys/<survey_id>/answers")]
async fn reset_survey_answers(
    survey_id: SurveyId,
    admin: &State<AnswerSheetAdmin>,
) -> Result<Json<ResetSummary>> {
    let summary = admin.reset_survey(survey_id).await?;
    Ok(Json(summary))
}
