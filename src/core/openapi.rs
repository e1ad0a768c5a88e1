use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth;
use crate::features::reports::{
    dtos as reports_dtos, handlers as reports_handlers, models as reports_models,
    services as reports_services, store as reports_store,
};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        auth::handler::get_me,
        // Reports
        reports_handlers::create_report,
        reports_handlers::list_reports,
        reports_handlers::get_statistics,
        reports_handlers::get_map_markers,
        reports_handlers::get_report,
        reports_handlers::update_report_fields,
        reports_handlers::update_report_status,
        reports_handlers::delete_report,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Auth
            auth::model::Role,
            auth::model::AuthenticatedUser,
            auth::dto::MeResponseDto,
            ApiResponse<auth::dto::MeResponseDto>,
            // Reports
            reports_models::ReportStatus,
            reports_models::ReportCategory,
            reports_models::OriginDevice,
            reports_dtos::CreateReportDto,
            reports_dtos::UpdateReportStatusDto,
            reports_dtos::UpdateReportFieldsDto,
            reports_dtos::LocationDto,
            reports_dtos::HistoryEntryDto,
            reports_dtos::ReportResponseDto,
            reports_dtos::MapMarkerDto,
            reports_dtos::MapBoundsDto,
            reports_dtos::MapResponseDto,
            reports_store::StatisticsRow,
            reports_services::StatusSummary,
            reports_services::Statistics,
            ApiResponse<reports_dtos::ReportResponseDto>,
            ApiResponse<Vec<reports_dtos::ReportResponseDto>>,
            ApiResponse<reports_dtos::MapResponseDto>,
            ApiResponse<reports_services::Statistics>,
        )
    ),
    tags(
        (name = "auth", description = "Caller identity"),
        (name = "reports", description = "Incident reports, status changes and statistics"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Civic Reports API",
        version = "0.1.0",
        description = "Incident report lifecycle and access-filtered queries",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
