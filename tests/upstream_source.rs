use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use timetable::application::sources::TimetableSource;
use timetable::config::SourceSettings;
use timetable::domain::error::SourceError;
use timetable::domain::query::QueryParams;
use timetable::infra::upstream::HttpJsonSource;
use url::Url;

async fn courses() -> Response {
    Json(json!([
        { "id": "L-31", "code": "INF", "name": "Informatica", "category": "Laurea" }
    ]))
    .into_response()
}

async fn lessons(Query(query): Query<HashMap<String, String>>) -> Response {
    match query.get("course_id").map(String::as_str) {
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Bad Request", "message": "Missing course_id" })),
        )
            .into_response(),
        Some("crash") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("garbled") => "not json".into_response(),
        Some(_) => Json(json!([
            {
                "starts_at": "2025-03-03T09:00:00+01:00",
                "ends_at": "2025-03-03T11:00:00+01:00",
                "subject": "Algoritmi"
            }
        ]))
        .into_response(),
    }
}

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/api/courses", get(courses))
        .route("/api/lessons", get(lessons));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn source(addr: SocketAddr) -> HttpJsonSource {
    HttpJsonSource::new(&SourceSettings {
        denomination: "unicam".into(),
        name: "Università di Camerino".into(),
        base_url: Url::parse(&format!("http://{addr}/api")).expect("url"),
        timeout: Duration::from_secs(5),
    })
    .expect("source")
}

#[tokio::test]
async fn decodes_course_records() {
    let source = source(spawn_upstream().await);
    let courses = source.courses(&QueryParams::new()).await.expect("courses");
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].code, "INF");
}

#[tokio::test]
async fn forwards_query_parameters() {
    let source = source(spawn_upstream().await);
    let params = QueryParams::from_pairs([("Course_Id", "L-31")]);
    let lessons = source.lessons(&params).await.expect("lessons");
    assert_eq!(lessons[0].subject, "Algoritmi");
    assert!(lessons[0].teacher.is_none());
}

#[tokio::test]
async fn client_errors_are_user_faults() {
    let source = source(spawn_upstream().await);
    let err = source
        .lessons(&QueryParams::new())
        .await
        .expect_err("rejected");
    assert_eq!(err, SourceError::user("Missing course_id"));
}

#[tokio::test]
async fn server_errors_and_bad_bodies_are_system_faults() {
    let source = source(spawn_upstream().await);

    let crash = QueryParams::from_pairs([("course_id", "crash")]);
    let err = source.lessons(&crash).await.expect_err("5xx");
    assert!(!err.is_user_fault());

    let garbled = QueryParams::from_pairs([("course_id", "garbled")]);
    let err = source.lessons(&garbled).await.expect_err("bad body");
    assert!(!err.is_user_fault());
}

#[tokio::test]
async fn unreachable_upstream_is_a_system_fault() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = source(addr)
        .courses(&QueryParams::new())
        .await
        .expect_err("connection refused");
    assert!(!err.is_user_fault());
}
