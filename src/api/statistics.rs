use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        common::survey::SurveyId,
        pagination::Pagination,
        statistics::{StatisticsAggregator, StatisticsReport},
    },
};

pub fn routes() -> Vec<Route> {
    routes![survey_statistics]
}

#[get("/surveys/<survey_id>/statistics")]
async fn survey_statistics(
    survey_id: SurveyId,
    pagination: Pagination,
    aggregator: &State<StatisticsAggregator>,
) -> Result<Json<StatisticsReport>> {
    let report = aggregator.aggregate(survey_id, pagination).await?;
    Ok(Json(report))
}
