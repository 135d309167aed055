mod admin;
mod error;
mod middleware;
mod public;

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};

use crate::application::error::ErrorReport;
use crate::application::purge::PurgeService;
use crate::application::timetable::TimetableService;
use crate::cache::KeyValueStore;

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub timetable: Arc<TimetableService>,
    pub purge: Arc<PurgeService>,
    pub store: Arc<dyn KeyValueStore>,
    /// Take the client identity from `X-Forwarded-For` when present.
    pub trust_forwarded_for: bool,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .merge(public::routes())
        .merge(admin::routes())
        .route("/_health/store", get(store_health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn store_health(State(state): State<HttpState>) -> Response {
    if state.store.is_alive().await {
        return StatusCode::NO_CONTENT.into_response();
    }

    let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
    ErrorReport::from_message(
        "infra::http::store_health",
        StatusCode::SERVICE_UNAVAILABLE,
        "key-value store did not answer the liveness probe",
    )
    .attach(&mut response);
    response
}
