use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    Form, Json, Router,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderMap, request::Parts},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, HttpState};

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_IDENTITY: &str = "unknown";

const PURGE_FORM: &str = r#"<!doctype html>
<html lang="en">
  <head><meta charset="utf-8"><title>Purge cache</title></head>
  <body>
    <form method="post" action="/cache/purge">
      <label for="password">One-time code</label>
      <input id="password" name="password" type="password" inputmode="numeric"
             autocomplete="one-time-code" maxlength="6" required>
      <button type="submit">Purge</button>
    </form>
  </body>
</html>
"#;

pub(super) fn routes() -> Router<HttpState> {
    Router::new().route("/cache/purge", get(purge_form).post(purge))
}

/// Honeypot identity of the caller. Purge responses carry it for the response log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ClientIdentity(pub String);

impl FromRequestParts<HttpState> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(resolve_identity(
            &parts.headers,
            peer,
            state.trust_forwarded_for,
        )))
    }
}

fn resolve_identity(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(first) = forwarded {
            return first.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PurgeForm {
    password: String,
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
    message: &'static str,
}

async fn purge_form(State(state): State<HttpState>) -> Response {
    if !state.purge.store_available().await {
        return ApiError::store_unavailable().into_response();
    }
    Html(PURGE_FORM).into_response()
}

async fn purge(
    State(state): State<HttpState>,
    identity: ClientIdentity,
    Form(form): Form<PurgeForm>,
) -> Response {
    let mut response = match state.purge.purge(&identity.0, form.password.trim()).await {
        Ok(()) => Json(PurgeResponse {
            message: "Cache purged",
        })
        .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    };
    response.extensions_mut().insert(identity);
    response
}
