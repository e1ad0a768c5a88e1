use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::reports::dtos::{
    CreateReportDto, ListReportsQuery, MapQuery, StatisticsQuery, UpdateReportFieldsDto,
    UpdateReportStatusDto,
};
use crate::features::reports::models::{BoundingBox, NewReport, Report};
use crate::features::reports::services::statistics::Statistics;
use crate::features::reports::services::{access_filter, transition};
use crate::features::reports::store::{LocatedReport, ReportStore};
use crate::shared::constants::INITIAL_HISTORY_NOTE;

/// Located reports plus the box that encloses them
#[derive(Debug, Clone)]
pub struct MapView {
    pub markers: Vec<LocatedReport>,
    pub bounds: Option<BoundingBox>,
}

/// Service for report operations
pub struct ReportService {
    store: Arc<dyn ReportStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// File a new report in the `received` state
    pub async fn create_report(
        &self,
        caller: &AuthenticatedUser,
        dto: CreateReportDto,
    ) -> Result<Report> {
        let reporter_id = access_filter::authorize_create(caller, dto.reporter_id.as_deref())?;

        dto.validate()?;
        let category = dto.category()?;
        let location = dto.location()?;

        let report = Report::file(
            NewReport {
                id: dto.id.unwrap_or_else(Uuid::new_v4),
                reporter_id,
                title: dto.title.trim().to_string(),
                description: dto.description,
                category,
                location,
                photos: dto.photos,
                origin_device: dto.origin_device.unwrap_or_default(),
            },
            INITIAL_HISTORY_NOTE,
            Utc::now(),
        );

        self.store.insert(&report).await?;

        tracing::info!(
            "Created report: {} ({}) by {} for {}",
            report.id(),
            report.category(),
            caller.user_id,
            report.reporter_id()
        );

        Ok(report)
    }

    pub async fn get_report(&self, caller: &AuthenticatedUser, id: Uuid) -> Result<Report> {
        let report = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;

        access_filter::authorize_read(caller, &report)?;
        Ok(report)
    }

    /// One page of visible reports, newest first, with the total visible count
    pub async fn list_reports(
        &self,
        caller: &AuthenticatedUser,
        query: &ListReportsQuery,
    ) -> Result<(Vec<Report>, i64)> {
        let filter = access_filter::derive_filter(caller).and(query.filter()?);
        self.store.list(&filter, &query.pagination()).await
    }

    /// Move a report through the status state machine.
    ///
    /// Order of checks: existence, then authorization, then transition
    /// legality. All of it runs under the store's per-report lock so two
    /// concurrent calls never both apply against the same prior status.
    pub async fn update_report_status(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
        dto: UpdateReportStatusDto,
    ) -> Result<Report> {
        let report = self
            .store
            .modify(id, &|report: &mut Report| {
                access_filter::authorize_status_change(caller, report)?;
                transition::apply(report, dto.status, caller, dto.notes.clone(), Utc::now())
            })
            .await?;

        tracing::info!(
            "Report {} moved to {} by {}",
            report.id(),
            report.status(),
            caller.user_id
        );

        Ok(report)
    }

    /// Patch title, description and (through the state machine) status.
    ///
    /// A category equal to the current one is accepted and changes nothing;
    /// any other category is rejected.
    pub async fn update_report_fields(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
        dto: UpdateReportFieldsDto,
    ) -> Result<Report> {
        dto.validate()?;
        let category = dto.category()?;

        let report = self
            .store
            .modify(id, &|report: &mut Report| {
                access_filter::authorize_field_update(caller, report)?;

                if let Some(category) = category.filter(|c| *c != report.category()) {
                    return Err(AppError::Validation(format!(
                        "Category is fixed once filed ({} cannot become {})",
                        report.category(),
                        category
                    )));
                }

                if let Some(status) = dto.status {
                    access_filter::authorize_status_change(caller, report)?;
                    transition::apply(report, status, caller, dto.notes.clone(), Utc::now())?;
                }

                let mut edited = false;
                if let Some(title) = &dto.title {
                    report.title = title.trim().to_string();
                    edited = true;
                }
                if let Some(description) = &dto.description {
                    report.description = Some(description.clone());
                    edited = true;
                }
                if edited {
                    report.touch(Utc::now());
                }

                Ok(())
            })
            .await?;

        tracing::info!("Updated report: {} by {}", report.id(), caller.user_id);

        Ok(report)
    }

    /// Irreversibly remove a report; returns what was removed
    pub async fn delete_report(&self, caller: &AuthenticatedUser, id: Uuid) -> Result<Report> {
        access_filter::authorize_delete(caller)?;

        let report = self
            .store
            .delete(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;

        tracing::info!(
            "Deleted report: {} ({} history entries) by {}",
            report.id(),
            report.history().len(),
            caller.user_id
        );

        Ok(report)
    }

    pub async fn get_statistics(
        &self,
        caller: &AuthenticatedUser,
        query: &StatisticsQuery,
    ) -> Result<Statistics> {
        let filter = access_filter::derive_filter(caller).and(query.filter()?);
        let rows = self.store.aggregate(&filter).await?;
        Ok(Statistics::from_rows(rows))
    }

    /// Visible located reports, optionally inside a bounding box
    pub async fn map_markers(
        &self,
        caller: &AuthenticatedUser,
        query: &MapQuery,
    ) -> Result<MapView> {
        let filter = access_filter::derive_filter(caller).and(query.filter()?);
        let bounds = query.bounds()?;

        let markers = self
            .store
            .locate(&filter, bounds.as_ref(), query.limit())
            .await?;
        let bounds = BoundingBox::enclosing(markers.iter().map(|m| &m.location));

        Ok(MapView { markers, bounds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reports::models::{ReportCategory, ReportStatus};
    use crate::features::reports::store::InMemoryReportStore;
    use crate::shared::test_helpers::{admin, citizen, staff};
    use fake::faker::lorem::en::Sentence;
    use fake::Fake;

    fn service() -> ReportService {
        ReportService::new(Arc::new(InMemoryReportStore::new()))
    }

    fn create_dto(title: &str, category: &str) -> CreateReportDto {
        CreateReportDto {
            id: None,
            reporter_id: None,
            title: title.to_string(),
            description: None,
            category: category.to_string(),
            longitude: None,
            latitude: None,
            photos: vec![],
            origin_device: None,
        }
    }

    fn random_title() -> String {
        let title: String = Sentence(2..6).fake();
        title.chars().take(200).collect()
    }

    fn status_dto(status: ReportStatus, notes: Option<&str>) -> UpdateReportStatusDto {
        UpdateReportStatusDto {
            status,
            notes: notes.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_report_lifecycle_scenario() {
        let service = service();
        let resident = citizen("citizen-1");
        let pothole_crew = staff("staff-1", Some("pothole"));

        let mut dto = create_dto("Pothole on Main St", "pothole");
        dto.latitude = Some(19.337);
        dto.longitude = Some(-102.352);
        let report = service.create_report(&resident, dto).await.unwrap();

        assert_eq!(report.status(), ReportStatus::Received);
        assert_eq!(report.history().len(), 1);
        assert_eq!(report.history().current().notes, INITIAL_HISTORY_NOTE);
        assert_eq!(report.location().unwrap().decode(), (-102.352, 19.337));

        let report = service
            .update_report_status(
                &pothole_crew,
                report.id(),
                status_dto(ReportStatus::InProgress, Some("crew dispatched")),
            )
            .await
            .unwrap();

        assert_eq!(report.status(), ReportStatus::InProgress);
        assert_eq!(report.history().len(), 2);
        assert_eq!(report.history().current().notes, "crew dispatched");
        assert_eq!(report.history().current().actor_id, "staff-1");

        // Resolved report from another department is refused before transition rules
        let leak = service
            .create_report(&resident, create_dto("Leaking main", "leak"))
            .await
            .unwrap();
        service
            .update_report_status(
                &admin("admin-1"),
                leak.id(),
                status_dto(ReportStatus::Resolved, None),
            )
            .await
            .unwrap();
        let result = service
            .update_report_status(
                &pothole_crew,
                leak.id(),
                status_dto(ReportStatus::InProgress, None),
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let reopened = service
            .update_report_status(
                &admin("admin-1"),
                leak.id(),
                status_dto(ReportStatus::InProgress, Some("reopened")),
            )
            .await
            .unwrap();
        assert_eq!(reopened.status(), ReportStatus::InProgress);
        assert_eq!(reopened.history().len(), 3);
    }

    #[tokio::test]
    async fn test_staff_cannot_reopen_resolved_report() {
        let service = service();
        let crew = staff("staff-1", Some("lighting"));
        let report = service
            .create_report(&citizen("c-1"), create_dto("Dark street", "lighting"))
            .await
            .unwrap();
        service
            .update_report_status(&crew, report.id(), status_dto(ReportStatus::Resolved, None))
            .await
            .unwrap();

        let result = service
            .update_report_status(&crew, report.id(), status_dto(ReportStatus::Received, None))
            .await;

        assert!(matches!(
            result,
            Err(AppError::IllegalTransition {
                from: ReportStatus::Resolved,
                to: ReportStatus::Received
            })
        ));
        let stored = service.get_report(&admin("a-1"), report.id()).await.unwrap();
        assert_eq!(stored.history().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_report_is_not_found_before_transition_rules() {
        let service = service();
        let result = service
            .update_report_status(
                &admin("a-1"),
                Uuid::new_v4(),
                status_dto(ReportStatus::Received, None),
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = service();
        let resident = citizen("c-1");

        let result = service
            .create_report(&resident, create_dto("  ", "pothole"))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = service
            .create_report(&resident, create_dto("Broken sign", "signage"))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let mut dto = create_dto("Broken sign", "roadway");
        dto.latitude = Some(91.0);
        dto.longitude = Some(0.0);
        let result = service.create_report(&resident, dto).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let mut dto = create_dto("Broken sign", "roadway");
        dto.latitude = Some(19.0);
        let result = service.create_report(&resident, dto).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_authorization() {
        let service = service();

        let result = service
            .create_report(&staff("s-1", Some("waste")), create_dto("Bins", "waste"))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let mut dto = create_dto("Bins", "waste");
        dto.reporter_id = Some("c-2".to_string());
        let result = service.create_report(&citizen("c-1"), dto).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let mut dto = create_dto("Bins", "waste");
        dto.reporter_id = Some("c-2".to_string());
        let report = service.create_report(&admin("a-1"), dto).await.unwrap();
        assert_eq!(report.reporter_id(), "c-2");
        assert_eq!(report.history().current().actor_id, "c-2");
    }

    #[tokio::test]
    async fn test_overlong_reporter_id_is_a_validation_error() {
        let service = service();

        let mut dto = create_dto("Bins", "waste");
        dto.reporter_id = Some("c".repeat(101));
        let result = service.create_report(&admin("a-1"), dto).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_duplicate_client_id_conflicts() {
        let service = service();
        let id = Uuid::new_v4();
        let mut dto = create_dto("Overflowing bins", "waste");
        dto.id = Some(id);

        service
            .create_report(&citizen("c-1"), dto.clone())
            .await
            .unwrap();
        let result = service.create_report(&citizen("c-1"), dto).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_pagination_third_page() {
        let service = service();
        let resident = citizen("c-1");
        for _ in 0..25 {
            service
                .create_report(&resident, create_dto(&random_title(), "roadway"))
                .await
                .unwrap();
        }

        let query = ListReportsQuery {
            page: Some(3),
            page_size: Some(10),
            ..ListReportsQuery::default()
        };
        let (items, total) = service.list_reports(&resident, &query).await.unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(total, 25);
    }

    #[tokio::test]
    async fn test_citizen_only_lists_own_reports() {
        let service = service();
        for reporter in ["c-1", "c-2", "c-1", "c-3"] {
            service
                .create_report(&citizen(reporter), create_dto(&random_title(), "waste"))
                .await
                .unwrap();
        }

        let (items, total) = service
            .list_reports(&citizen("c-1"), &ListReportsQuery::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(items.iter().all(|r| r.reporter_id() == "c-1"));

        // Asking for someone else's reports yields nothing rather than widening access
        let query = ListReportsQuery {
            reporter_id: Some("c-2".to_string()),
            ..ListReportsQuery::default()
        };
        let (items, total) = service.list_reports(&citizen("c-1"), &query).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_staff_without_department_sees_nothing() {
        let service = service();
        service
            .create_report(&citizen("c-1"), create_dto("Broken lamp", "lighting"))
            .await
            .unwrap();
        let unassigned = staff("s-9", None);

        let (items, total) = service
            .list_reports(&unassigned, &ListReportsQuery::default())
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);

        let stats = service
            .get_statistics(&unassigned, &StatisticsQuery::default())
            .await
            .unwrap();
        assert!(stats.rows.is_empty());
        assert_eq!(stats.summary.total, 0);
    }

    #[tokio::test]
    async fn test_read_outside_scope_is_forbidden() {
        let service = service();
        let report = service
            .create_report(&citizen("c-1"), create_dto("Broken lamp", "lighting"))
            .await
            .unwrap();

        assert!(matches!(
            service.get_report(&citizen("c-2"), report.id()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service
                .get_report(&staff("s-1", Some("waste")), report.id())
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(service
            .get_report(&staff("s-1", Some("lighting")), report.id())
            .await
            .is_ok());
        assert!(matches!(
            service.get_report(&admin("a-1"), Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_field_patch_rules() {
        let service = service();
        let report = service
            .create_report(&citizen("c-1"), create_dto("Broken lamp", "lighting"))
            .await
            .unwrap();
        let crew = staff("s-1", Some("lighting"));

        let result = service
            .update_report_fields(
                &citizen("c-1"),
                report.id(),
                UpdateReportFieldsDto {
                    title: Some("Changed".to_string()),
                    ..UpdateReportFieldsDto::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let result = service
            .update_report_fields(
                &crew,
                report.id(),
                UpdateReportFieldsDto {
                    category: Some("waste".to_string()),
                    ..UpdateReportFieldsDto::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let updated = service
            .update_report_fields(
                &crew,
                report.id(),
                UpdateReportFieldsDto {
                    title: Some("Lamp post 14 dark".to_string()),
                    category: Some("lighting".to_string()),
                    status: Some(ReportStatus::InProgress),
                    notes: Some("bulb ordered".to_string()),
                    ..UpdateReportFieldsDto::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Lamp post 14 dark");
        assert_eq!(updated.category(), ReportCategory::Lighting);
        assert_eq!(updated.status(), ReportStatus::InProgress);
        assert_eq!(updated.history().len(), 2);
        assert_eq!(updated.history().current().notes, "bulb ordered");
    }

    #[tokio::test]
    async fn test_rejected_patch_persists_nothing() {
        let service = service();
        let report = service
            .create_report(&citizen("c-1"), create_dto("Broken lamp", "lighting"))
            .await
            .unwrap();
        let crew = staff("s-1", Some("lighting"));

        let result = service
            .update_report_fields(
                &crew,
                report.id(),
                UpdateReportFieldsDto {
                    title: Some("Should not stick".to_string()),
                    status: Some(ReportStatus::Received),
                    ..UpdateReportFieldsDto::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::IllegalTransition { .. })));

        let stored = service.get_report(&crew, report.id()).await.unwrap();
        assert_eq!(stored.title, "Broken lamp");
        assert_eq!(stored.history().len(), 1);
    }

    #[tokio::test]
    async fn test_only_admin_deletes() {
        let service = service();
        let report = service
            .create_report(&citizen("c-1"), create_dto("Broken lamp", "lighting"))
            .await
            .unwrap();

        assert!(matches!(
            service.delete_report(&citizen("c-1"), report.id()).await,
            Err(AppError::Forbidden(_))
        ));

        let removed = service
            .delete_report(&admin("a-1"), report.id())
            .await
            .unwrap();
        assert_eq!(removed.id(), report.id());

        assert!(matches!(
            service.delete_report(&admin("a-1"), report.id()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_statistics_follow_access_filter() {
        let service = service();
        for (reporter, category) in [
            ("c-1", "pothole"),
            ("c-1", "pothole"),
            ("c-2", "pothole"),
            ("c-2", "waste"),
        ] {
            service
                .create_report(&citizen(reporter), create_dto(&random_title(), category))
                .await
                .unwrap();
        }

        let stats = service
            .get_statistics(&staff("s-1", Some("pothole")), &StatisticsQuery::default())
            .await
            .unwrap();
        assert_eq!(stats.rows.len(), 1);
        assert_eq!(stats.rows[0].count, 3);
        assert_eq!(stats.summary.received, 3);

        let stats = service
            .get_statistics(&admin("a-1"), &StatisticsQuery::default())
            .await
            .unwrap();
        assert_eq!(stats.summary.total, 4);

        let stats = service
            .get_statistics(&citizen("c-2"), &StatisticsQuery::default())
            .await
            .unwrap();
        assert_eq!(stats.summary.total, 2);
    }

    #[tokio::test]
    async fn test_map_markers_skip_unlocated_and_respect_bounds() {
        let service = service();
        let resident = citizen("c-1");
        for (lon, lat) in [(-102.35, 19.33), (-99.13, 19.43)] {
            let mut dto = create_dto(&random_title(), "leak");
            dto.longitude = Some(lon);
            dto.latitude = Some(lat);
            service.create_report(&resident, dto).await.unwrap();
        }
        service
            .create_report(&resident, create_dto("No location", "leak"))
            .await
            .unwrap();

        let view = service
            .map_markers(&resident, &MapQuery::default())
            .await
            .unwrap();
        assert_eq!(view.markers.len(), 2);
        let bounds = view.bounds.unwrap();
        assert_eq!(bounds.south_west.decode(), (-102.35, 19.33));
        assert_eq!(bounds.north_east.decode(), (-99.13, 19.43));

        let query = MapQuery {
            min_lon: Some(-103.0),
            min_lat: Some(19.0),
            max_lon: Some(-102.0),
            max_lat: Some(20.0),
            ..MapQuery::default()
        };
        let view = service.map_markers(&resident, &query).await.unwrap();
        assert_eq!(view.markers.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_transitions_apply_once() {
        let service = Arc::new(service());
        let report = service
            .create_report(&citizen("c-1"), create_dto("Burst pipe", "leak"))
            .await
            .unwrap();

        let attempts = (0..8).map(|i| {
            let service = service.clone();
            let id = report.id();
            tokio::spawn(async move {
                service
                    .update_report_status(
                        &staff(&format!("s-{}", i), Some("leak")),
                        id,
                        status_dto(ReportStatus::Resolved, None),
                    )
                    .await
            })
        });
        let results = futures::future::join_all(attempts).await;

        let succeeded = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(succeeded, 1);

        let stored = service.get_report(&admin("a-1"), report.id()).await.unwrap();
        assert_eq!(stored.history().len(), 2);
        let times: Vec<_> = stored.history().iter().map(|e| e.recorded_at).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }
}
