use std::sync::Arc;

use rocket::{response::status::Created, serde::json::Json, Route, State};

use crate::{
    clock::Clock,
    error::Result,
    model::{
        api::answer_sheet::{SubmissionReceipt, SubmissionRequest},
        common::survey::SurveyId,
        respondent::Respondent,
        submission::SubmissionPipeline,
    },
};

pub fn routes() -> Vec<Route> {
    routes![submit_response]
}

#[post("/surveys/<survey_id>/responses", data = "<submission>", format = "json")]
async fn submit_response(
    survey_id: SurveyId,
    respondent: Respondent,
    submission: Json<SubmissionRequest>,
    pipeline: &State<SubmissionPipeline>,
    clock: &State<Arc<dyn Clock>>,
) -> Result<Created<Json<SubmissionReceipt>>> {
    let sheet = pipeline
        .submit(
            survey_id,
            &respondent,
            submission.into_inner().into(),
            clock.now(),
        )
        .await?;
    let location = format!("/answers/{}", sheet.id);
    Ok(Created::new(location).body(Json(SubmissionReceipt::from(&sheet))))
}
