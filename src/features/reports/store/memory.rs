use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LocatedReport, Mutation, ReportStore, StatisticsRow};
use crate::core::error::{AppError, Result};
use crate::features::reports::models::{BoundingBox, Report, ReportFilter};
use crate::shared::types::PaginationQuery;

/// Map-backed store used by service and handler tests.
///
/// A single write lock stands in for the row lock of the database store.
#[derive(Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<Uuid, Report>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first<'a>(reports: impl Iterator<Item = &'a Report>) -> Vec<&'a Report> {
        let mut sorted: Vec<&Report> = reports.collect();
        sorted.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        sorted
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn insert(&self, report: &Report) -> Result<()> {
        let mut reports = self.reports.write().await;
        if reports.contains_key(&report.id()) {
            return Err(AppError::Conflict(format!(
                "Report {} already exists",
                report.id()
            )));
        }
        reports.insert(report.id(), report.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>> {
        Ok(self.reports.read().await.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &ReportFilter,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Report>, i64)> {
        let reports = self.reports.read().await;
        let matching = Self::newest_first(reports.values().filter(|r| filter.matches(r)));
        let total = matching.len() as i64;

        let page = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn modify(&self, id: Uuid, mutation: Mutation<'_>) -> Result<Report> {
        let mut reports = self.reports.write().await;
        let stored = reports
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;

        // Work on a copy so a failed mutation leaves the stored report intact
        let mut working = stored.clone();
        mutation(&mut working)?;
        *stored = working.clone();

        Ok(working)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Report>> {
        Ok(self.reports.write().await.remove(&id))
    }

    async fn aggregate(&self, filter: &ReportFilter) -> Result<Vec<StatisticsRow>> {
        let reports = self.reports.read().await;
        let mut counts = BTreeMap::new();
        for report in reports.values().filter(|r| filter.matches(r)) {
            *counts
                .entry((report.category(), report.status()))
                .or_insert(0i64) += 1;
        }

        Ok(counts
            .into_iter()
            .map(|((category, status), count)| StatisticsRow {
                category,
                status,
                count,
            })
            .collect())
    }

    async fn locate(
        &self,
        filter: &ReportFilter,
        bounds: Option<&BoundingBox>,
        limit: i64,
    ) -> Result<Vec<LocatedReport>> {
        let reports = self.reports.read().await;
        let located = Self::newest_first(reports.values().filter(|r| filter.matches(r)))
            .into_iter()
            .filter_map(|report| {
                let location = report.location()?;
                if bounds.is_some_and(|b| !b.contains(&location)) {
                    return None;
                }
                Some(LocatedReport {
                    id: report.id(),
                    title: report.title.clone(),
                    category: report.category(),
                    status: report.status(),
                    location,
                })
            })
            .take(limit.max(0) as usize)
            .collect();

        Ok(located)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reports::models::{
        GeoPoint, NewReport, OriginDevice, ReportCategory, ReportStatus,
    };
    use chrono::{Duration, Utc};

    fn filed(reporter: &str, category: ReportCategory, minutes_ago: i64) -> Report {
        Report::file(
            NewReport {
                id: Uuid::new_v4(),
                reporter_id: reporter.to_string(),
                title: format!("{} report", category),
                description: None,
                category,
                location: Some(GeoPoint::encode(-102.35, 19.33).unwrap()),
                photos: vec![],
                origin_device: OriginDevice::Web,
            },
            "Report created",
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let store = InMemoryReportStore::new();
        let report = filed("c-1", ReportCategory::Waste, 0);

        store.insert(&report).await.unwrap();
        let result = store.insert(&report).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = InMemoryReportStore::new();
        let older = filed("c-1", ReportCategory::Waste, 10);
        let newer = filed("c-1", ReportCategory::Waste, 1);
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();

        let (page, total) = store
            .list(&ReportFilter::everything(), &PaginationQuery::default())
            .await
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(page[0].id(), newer.id());
        assert_eq!(page[1].id(), older.id());
    }

    #[tokio::test]
    async fn test_failed_mutation_is_not_persisted() {
        let store = InMemoryReportStore::new();
        let report = filed("c-1", ReportCategory::Leak, 0);
        store.insert(&report).await.unwrap();

        let result = store
            .modify(report.id(), &|r: &mut Report| {
                r.title = "changed".to_string();
                Err(AppError::Validation("nope".to_string()))
            })
            .await;

        assert!(result.is_err());
        let stored = store.find_by_id(report.id()).await.unwrap().unwrap();
        assert_eq!(stored.title, report.title);
    }

    #[tokio::test]
    async fn test_modify_missing_report_is_not_found() {
        let store = InMemoryReportStore::new();
        let result = store.modify(Uuid::new_v4(), &|_: &mut Report| Ok(())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_aggregate_groups_by_category_and_status() {
        let store = InMemoryReportStore::new();
        for category in [
            ReportCategory::Pothole,
            ReportCategory::Pothole,
            ReportCategory::Leak,
        ] {
            store.insert(&filed("c-1", category, 0)).await.unwrap();
        }

        let rows = store.aggregate(&ReportFilter::everything()).await.unwrap();

        assert_eq!(
            rows,
            vec![
                StatisticsRow {
                    category: ReportCategory::Pothole,
                    status: ReportStatus::Received,
                    count: 2,
                },
                StatisticsRow {
                    category: ReportCategory::Leak,
                    status: ReportStatus::Received,
                    count: 1,
                },
            ]
        );
    }
}
