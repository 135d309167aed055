//! Timetable source backed by an upstream JSON service.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::application::sources::TimetableSource;
use crate::config::SourceSettings;
use crate::domain::error::SourceError;
use crate::domain::query::QueryParams;
use crate::domain::timetable::{Course, Lesson};

use super::error::InfraError;

const COURSES_PATH: &str = "courses";
const LESSONS_PATH: &str = "lessons";

/// Error payload upstreams use to explain a rejected request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpstreamFault {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    denomination: String,
    name: String,
    base: Url,
    client: Client,
}

impl HttpJsonSource {
    pub fn new(settings: &SourceSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!(
                    "failed to build HTTP client for `{}`: {err}",
                    settings.denomination
                ))
            })?;

        Ok(Self {
            denomination: settings.denomination.clone(),
            name: settings.name.clone(),
            base: directory_url(&settings.base_url),
            client,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("timetable/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, path: &str, query: &QueryParams) -> Result<Url, SourceError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| SourceError::system(format!("invalid upstream path `{path}`: {err}")))?;
        url.set_query(None);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.iter() {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<T, SourceError> {
        let url = self.url(path, query)?;
        debug!(
            target = "timetable::upstream",
            source = %self.denomination,
            url = %url,
            "requesting upstream"
        );

        let response = self.client.get(url).send().await.map_err(|err| {
            SourceError::system(format!("request to `{}` failed: {err}", self.denomination))
        })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| {
            SourceError::system(format!(
                "reading response from `{}` failed: {err}",
                self.denomination
            ))
        })?;

        if status.is_client_error() {
            return Err(SourceError::user(client_fault_message(status, &bytes)));
        }
        if !status.is_success() {
            return Err(SourceError::system(format!(
                "`{}` answered with status {status}",
                self.denomination
            )));
        }

        serde_json::from_slice(&bytes).map_err(|err| {
            SourceError::system(format!(
                "`{}` returned an undecodable body: {err}",
                self.denomination
            ))
        })
    }
}

#[async_trait]
impl TimetableSource for HttpJsonSource {
    fn denomination(&self) -> &str {
        &self.denomination
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn courses(&self, query: &QueryParams) -> Result<Vec<Course>, SourceError> {
        self.fetch(COURSES_PATH, query).await
    }

    async fn lessons(&self, query: &QueryParams) -> Result<Vec<Lesson>, SourceError> {
        self.fetch(LESSONS_PATH, query).await
    }
}

/// `Url::join` drops the last segment unless the base ends with a slash.
fn directory_url(base: &Url) -> Url {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn client_fault_message(status: StatusCode, body: &[u8]) -> String {
    let fault: UpstreamFault = serde_json::from_slice(body).unwrap_or_default();
    fault
        .message
        .or(fault.error)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Rejected by upstream")
                .to_string()
        })
}
