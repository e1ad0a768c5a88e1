use serde::Serialize;
use utoipa::ToSchema;

use crate::features::reports::models::ReportStatus;
use crate::features::reports::store::StatisticsRow;

/// Per-status totals across all categories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusSummary {
    pub received: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub total: i64,
}

/// Aggregated counts for dashboards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Statistics {
    /// One row per (category, status) pair with at least one report
    pub rows: Vec<StatisticsRow>,
    pub summary: StatusSummary,
}

impl Statistics {
    pub fn from_rows(rows: Vec<StatisticsRow>) -> Self {
        let summary = summarize(&rows);
        Self { rows, summary }
    }
}

pub fn summarize(rows: &[StatisticsRow]) -> StatusSummary {
    rows.iter()
        .fold(StatusSummary::default(), |mut summary, row| {
            match row.status {
                ReportStatus::Received => summary.received += row.count,
                ReportStatus::InProgress => summary.in_progress += row.count,
                ReportStatus::Resolved => summary.resolved += row.count,
            }
            summary.total += row.count;
            summary
        })
}
