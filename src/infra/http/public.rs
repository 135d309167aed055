use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::domain::query::QueryParams;

use super::{ApiError, HttpState};

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/timetable/universities", get(universities))
        .route("/timetable/{university}/courses", get(courses))
        .route("/timetable/{university}/lessons", get(lessons))
}

async fn universities(State(state): State<HttpState>) -> Json<BTreeMap<String, String>> {
    let listing = state
        .timetable
        .universities()
        .into_iter()
        .map(|university| (university.denomination, university.name))
        .collect();
    Json(listing)
}

async fn courses(
    State(state): State<HttpState>,
    Path(university): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params = QueryParams::from_pairs(pairs);
    match state.timetable.courses(&university, params).await {
        Ok(courses) => Json(courses).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn lessons(
    State(state): State<HttpState>,
    Path(university): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params = QueryParams::from_pairs(pairs);
    match state.timetable.lessons(&university, params).await {
        Ok(lessons) => Json(lessons).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
