use std::sync::Arc;

use axum::{
    routing::{get, patch},
    Router,
};

use crate::features::reports::handlers;
use crate::features::reports::services::ReportService;

/// Report routes; the caller applies the auth middleware
pub fn routes(report_service: Arc<ReportService>) -> Router {
    Router::new()
        .route(
            "/api/reports",
            get(handlers::list_reports).post(handlers::create_report),
        )
        // Static segments before the id capture
        .route("/api/reports/statistics", get(handlers::get_statistics))
        .route("/api/reports/map", get(handlers::get_map_markers))
        .route(
            "/api/reports/{id}",
            get(handlers::get_report)
                .patch(handlers::update_report_fields)
                .delete(handlers::delete_report),
        )
        .route(
            "/api/reports/{id}/status",
            patch(handlers::update_report_status),
        )
        .with_state(report_service)
}
