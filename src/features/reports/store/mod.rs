//! Report persistence port.
//!
//! The service layer talks to storage only through [`ReportStore`]; the
//! Postgres implementation is used in production and an in-memory one backs
//! the tests.

mod postgres;

#[cfg(test)]
mod memory;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::reports::models::{
    BoundingBox, GeoPoint, Report, ReportCategory, ReportFilter, ReportStatus,
};
use crate::shared::types::PaginationQuery;

pub use postgres::PgReportStore;

#[cfg(test)]
pub use memory::InMemoryReportStore;

/// Change applied to a locked report inside [`ReportStore::modify`]
pub type Mutation<'a> = &'a (dyn Fn(&mut Report) -> Result<()> + Send + Sync);

/// Count of reports sharing a category and status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct StatisticsRow {
    pub category: ReportCategory,
    pub status: ReportStatus,
    pub count: i64,
}

/// Minimal projection of a located report for map rendering
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedReport {
    pub id: Uuid,
    pub title: String,
    pub category: ReportCategory,
    pub status: ReportStatus,
    pub location: GeoPoint,
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a newly filed report with its initial history.
    ///
    /// # Errors
    ///
    /// - `Conflict` if a report with the same id exists
    async fn insert(&self, report: &Report) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>>;

    /// One page of matching reports, newest first, plus the total match count
    async fn list(
        &self,
        filter: &ReportFilter,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Report>, i64)>;

    /// Atomically read, change and persist one report.
    ///
    /// The mutation runs while the record is locked against other writers.
    /// If it fails nothing is written. History entries appended by the
    /// mutation are persisted in order.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the report does not exist (before the mutation runs)
    /// - whatever the mutation returns
    async fn modify(&self, id: Uuid, mutation: Mutation<'_>) -> Result<Report>;

    /// Remove a report and its history, returning what was removed
    async fn delete(&self, id: Uuid) -> Result<Option<Report>>;

    /// Matching reports grouped by (category, status), ordered by both
    async fn aggregate(&self, filter: &ReportFilter) -> Result<Vec<StatisticsRow>>;

    /// Matching reports that carry a location, newest first
    async fn locate(
        &self,
        filter: &ReportFilter,
        bounds: Option<&BoundingBox>,
        limit: i64,
    ) -> Result<Vec<LocatedReport>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn ReportStore) {}
    }
}
