//! Cached timetable lookups across the registered sources.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::{CacheAsideFetcher, Lookup, LookupKind};
use crate::domain::error::SourceError;
use crate::domain::query::QueryParams;
use crate::domain::timetable::{Course, Lesson, University};

use super::sources::TimetableSource;

#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("no source registered for `{0}`")]
    UnknownUniversity(String),
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Clone)]
pub struct TimetableService {
    sources: BTreeMap<String, Arc<dyn TimetableSource>>,
    fetcher: CacheAsideFetcher,
}

impl TimetableService {
    pub fn new(sources: Vec<Arc<dyn TimetableSource>>, fetcher: CacheAsideFetcher) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (normalize_denomination(source.denomination()), source))
            .collect();
        Self { sources, fetcher }
    }

    pub fn universities(&self) -> Vec<University> {
        self.sources
            .iter()
            .map(|(denomination, source)| University {
                denomination: denomination.clone(),
                name: source.name().to_string(),
            })
            .collect()
    }

    pub async fn courses(
        &self,
        university: &str,
        params: QueryParams,
    ) -> Result<Vec<Course>, TimetableError> {
        let (denomination, source) = self.source(university)?;
        let params = &params;
        let lookup = Lookup::new(LookupKind::Courses, &denomination, params);
        let courses = self
            .fetcher
            .fetch(lookup, move || async move { source.courses(params).await })
            .await?;
        Ok(courses)
    }

    pub async fn lessons(
        &self,
        university: &str,
        params: QueryParams,
    ) -> Result<Vec<Lesson>, TimetableError> {
        let (denomination, source) = self.source(university)?;
        let params = &params;
        let lookup = Lookup::new(LookupKind::Lessons, &denomination, params);
        let lessons = self
            .fetcher
            .fetch(lookup, move || async move { source.lessons(params).await })
            .await?;
        Ok(lessons)
    }

    fn source(
        &self,
        university: &str,
    ) -> Result<(String, Arc<dyn TimetableSource>), TimetableError> {
        let denomination = normalize_denomination(university);
        match self.sources.get(&denomination) {
            Some(source) => Ok((denomination, Arc::clone(source))),
            None => Err(TimetableError::UnknownUniversity(denomination)),
        }
    }
}

fn normalize_denomination(value: &str) -> String {
    value.trim().to_lowercase()
}
