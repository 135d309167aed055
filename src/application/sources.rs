//! Data producers behind the cache.

use async_trait::async_trait;

use crate::domain::error::SourceError;
use crate::domain::query::QueryParams;
use crate::domain::timetable::{Course, Lesson};

/// An upstream institution that can produce timetable records.
///
/// Implementations perform the expensive remote fetch and own their retry and timeout
/// policy. They must not touch the cache.
#[async_trait]
pub trait TimetableSource: Send + Sync {
    /// Short identifier used in URLs and cache keys, e.g. `unicam`.
    fn denomination(&self) -> &str;

    /// Human-readable institution name.
    fn name(&self) -> &str;

    async fn courses(&self, query: &QueryParams) -> Result<Vec<Course>, SourceError>;

    async fn lessons(&self, query: &QueryParams) -> Result<Vec<Lesson>, SourceError>;
}
