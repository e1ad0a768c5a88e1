use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::{AppJson, AppQuery};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::reports::dtos::{
    CreateReportDto, ListReportsQuery, MapQuery, MapResponseDto, ReportResponseDto,
    StatisticsQuery, UpdateReportFieldsDto, UpdateReportStatusDto,
};
use crate::features::reports::services::{ReportService, Statistics};
use crate::shared::types::{ApiResponse, Meta};

/// File a new report
#[utoipa::path(
    post,
    path = "/api/reports",
    request_body = CreateReportDto,
    responses(
        (status = 201, description = "Report created", body = ApiResponse<ReportResponseDto>),
        (status = 400, description = "Invalid report data"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller may not file this report"),
        (status = 409, description = "Report id already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn create_report(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    AppJson(dto): AppJson<CreateReportDto>,
) -> Result<(StatusCode, Json<ApiResponse<ReportResponseDto>>)> {
    let report = service.create_report(&user, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(report.into()),
            Some("Report created".to_string()),
            None,
        )),
    ))
}

/// List reports visible to the caller
#[utoipa::path(
    get,
    path = "/api/reports",
    params(ListReportsQuery),
    responses(
        (status = 200, description = "Paginated reports", body = ApiResponse<Vec<ReportResponseDto>>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn list_reports(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    AppQuery(query): AppQuery<ListReportsQuery>,
) -> Result<Json<ApiResponse<Vec<ReportResponseDto>>>> {
    let (reports, total) = service.list_reports(&user, &query).await?;
    let dtos: Vec<ReportResponseDto> = reports.into_iter().map(|r| r.into()).collect();
    Ok(Json(ApiResponse::success(
        Some(dtos),
        None,
        Some(Meta::paged(total, &query.pagination())),
    )))
}

/// Counts of visible reports by category and status
#[utoipa::path(
    get,
    path = "/api/reports/statistics",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Report statistics", body = ApiResponse<Statistics>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn get_statistics(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    AppQuery(query): AppQuery<StatisticsQuery>,
) -> Result<Json<ApiResponse<Statistics>>> {
    let stats = service.get_statistics(&user, &query).await?;
    Ok(Json(ApiResponse::success(Some(stats), None, None)))
}

/// Markers for visible reports that have a location
#[utoipa::path(
    get,
    path = "/api/reports/map",
    params(MapQuery),
    responses(
        (status = 200, description = "Map markers", body = ApiResponse<MapResponseDto>),
        (status = 400, description = "Invalid bounding box"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn get_map_markers(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    AppQuery(query): AppQuery<MapQuery>,
) -> Result<Json<ApiResponse<MapResponseDto>>> {
    let view = service.map_markers(&user, &query).await?;
    let total = view.markers.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(view.into()),
        None,
        Some(Meta::total(total)),
    )))
}

/// Get report by ID with its history
#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    params(
        ("id" = Uuid, Path, description = "Report ID")
    ),
    responses(
        (status = 200, description = "Report found", body = ApiResponse<ReportResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Report outside caller's scope"),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn get_report(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReportResponseDto>>> {
    let report = service.get_report(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(report.into()), None, None)))
}

/// Edit title/description, optionally changing status
#[utoipa::path(
    patch,
    path = "/api/reports/{id}",
    params(
        ("id" = Uuid, Path, description = "Report ID")
    ),
    request_body = UpdateReportFieldsDto,
    responses(
        (status = 200, description = "Report updated", body = ApiResponse<ReportResponseDto>),
        (status = 400, description = "Invalid patch"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller may not edit this report"),
        (status = 404, description = "Report not found"),
        (status = 409, description = "Status change not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn update_report_fields(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateReportFieldsDto>,
) -> Result<Json<ApiResponse<ReportResponseDto>>> {
    let report = service.update_report_fields(&user, id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(report.into()),
        Some("Report updated".to_string()),
        None,
    )))
}

/// Update report status (staff of the report's department, or admin)
#[utoipa::path(
    patch,
    path = "/api/reports/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Report ID")
    ),
    request_body = UpdateReportStatusDto,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<ReportResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller may not change this report"),
        (status = 404, description = "Report not found"),
        (status = 409, description = "Status change not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn update_report_status(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateReportStatusDto>,
) -> Result<Json<ApiResponse<ReportResponseDto>>> {
    let report = service.update_report_status(&user, id, dto).await?;
    Ok(Json(ApiResponse::success(Some(report.into()), None, None)))
}

/// Permanently delete a report (admin only)
#[utoipa::path(
    delete,
    path = "/api/reports/{id}",
    params(
        ("id" = Uuid, Path, description = "Report ID")
    ),
    responses(
        (status = 200, description = "Deleted report", body = ApiResponse<ReportResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn delete_report(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReportResponseDto>>> {
    let report = service.delete_report(&user, id).await?;
    Ok(Json(ApiResponse::success(
        Some(report.into()),
        Some("Report deleted".to_string()),
        None,
    )))
}
