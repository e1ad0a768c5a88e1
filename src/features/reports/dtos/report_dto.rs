use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::core::error::{AppError, Result};
use crate::features::reports::models::{
    BoundingBox, GeoPoint, HistoryEntry, OriginDevice, Report, ReportCategory, ReportFilter,
    ReportStatus,
};
use crate::features::reports::services::MapView;
use crate::features::reports::store::LocatedReport;
use crate::shared::constants::{
    DEFAULT_MAP_LIMIT, MAX_MAP_LIMIT, MAX_PHOTOS_PER_REPORT, MAX_TITLE_LENGTH,
    MAX_USER_ID_LENGTH,
};
use crate::shared::types::PaginationQuery;

fn validate_not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

fn parse_category(raw: Option<&str>) -> Result<Option<ReportCategory>> {
    raw.filter(|c| !c.trim().is_empty())
        .map(str::parse)
        .transpose()
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Request DTO for filing a report
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReportDto {
    /// Client-generated id; a new one is assigned when omitted
    pub id: Option<Uuid>,
    /// Only administrators may name someone other than themselves
    #[validate(length(
        min = 1,
        max = MAX_USER_ID_LENGTH,
        message = "Reporter id must be 1-100 characters"
    ))]
    pub reporter_id: Option<String>,
    #[validate(
        length(min = 1, max = MAX_TITLE_LENGTH, message = "Title must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,
    pub description: Option<String>,
    /// One of pothole, lighting, waste, leak, roadway, other
    pub category: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Opaque media references
    #[serde(default)]
    #[validate(length(max = MAX_PHOTOS_PER_REPORT, message = "At most 5 photos per report"))]
    pub photos: Vec<String>,
    pub origin_device: Option<OriginDevice>,
}

impl CreateReportDto {
    pub fn category(&self) -> Result<ReportCategory> {
        self.category.parse()
    }

    pub fn location(&self) -> Result<Option<GeoPoint>> {
        GeoPoint::from_optional(self.longitude, self.latitude)
    }
}

/// Request DTO for a status change
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateReportStatusDto {
    pub status: ReportStatus,
    pub notes: Option<String>,
}

/// Partial update. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateReportFieldsDto {
    #[validate(
        length(min = 1, max = MAX_TITLE_LENGTH, message = "Title must be 1-200 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: Option<String>,
    pub description: Option<String>,
    /// Accepted only when equal to the current category
    pub category: Option<String>,
    /// Applied through the status state machine
    pub status: Option<ReportStatus>,
    /// Notes for the history entry when `status` is present
    pub notes: Option<String>,
}

impl UpdateReportFieldsDto {
    pub fn category(&self) -> Result<Option<ReportCategory>> {
        parse_category(self.category.as_deref())
    }
}

/// Query params for listing reports
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListReportsQuery {
    /// Page number (1-indexed)
    #[param(minimum = 1)]
    pub page: Option<i64>,
    /// Items per page
    #[param(minimum = 1, maximum = 100)]
    pub page_size: Option<i64>,
    pub category: Option<String>,
    pub status: Option<ReportStatus>,
    pub reporter_id: Option<String>,
}

impl ListReportsQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery::new(self.page, self.page_size)
    }

    /// Request criteria; the caller's access filter is applied on top
    pub fn filter(&self) -> Result<ReportFilter> {
        Ok(ReportFilter::criteria(
            parse_category(self.category.as_deref())?,
            self.status,
            self.reporter_id.clone().filter(|r| !r.is_empty()),
        ))
    }
}

/// Query params for statistics
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct StatisticsQuery {
    pub category: Option<String>,
    pub status: Option<ReportStatus>,
}

impl StatisticsQuery {
    pub fn filter(&self) -> Result<ReportFilter> {
        Ok(ReportFilter::criteria(
            parse_category(self.category.as_deref())?,
            self.status,
            None,
        ))
    }
}

/// Query params for map markers
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct MapQuery {
    pub min_lon: Option<f64>,
    pub min_lat: Option<f64>,
    pub max_lon: Option<f64>,
    pub max_lat: Option<f64>,
    pub category: Option<String>,
    pub status: Option<ReportStatus>,
    /// Maximum markers returned
    #[param(minimum = 1, maximum = 1000)]
    pub limit: Option<i64>,
}

impl MapQuery {
    pub fn filter(&self) -> Result<ReportFilter> {
        Ok(ReportFilter::criteria(
            parse_category(self.category.as_deref())?,
            self.status,
            None,
        ))
    }

    /// Bounding box from all four corners, or none when all are absent
    pub fn bounds(&self) -> Result<Option<BoundingBox>> {
        let south_west = GeoPoint::from_optional(self.min_lon, self.min_lat)?;
        let north_east = GeoPoint::from_optional(self.max_lon, self.max_lat)?;
        match (south_west, north_east) {
            (Some(sw), Some(ne)) => BoundingBox::new(sw, ne).map(Some),
            (None, None) => Ok(None),
            _ => Err(AppError::Validation(
                "Bounding box needs min_lon, min_lat, max_lon and max_lat".to_string(),
            )),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .filter(|l| *l > 0)
            .map(|l| l.min(MAX_MAP_LIMIT))
            .unwrap_or(DEFAULT_MAP_LIMIT)
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Coordinates as stored
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationDto {
    pub longitude: f64,
    pub latitude: f64,
}

impl From<GeoPoint> for LocationDto {
    fn from(point: GeoPoint) -> Self {
        let (longitude, latitude) = point.decode();
        Self {
            longitude,
            latitude,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryDto {
    pub status: ReportStatus,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub notes: String,
}

impl From<&HistoryEntry> for HistoryEntryDto {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            status: entry.status,
            timestamp: entry.recorded_at,
            actor_id: entry.actor_id.clone(),
            notes: entry.notes.clone(),
        }
    }
}

/// Response DTO for report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportResponseDto {
    pub id: Uuid,
    pub reporter_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: ReportCategory,
    pub location: Option<LocationDto>,
    pub photos: Vec<String>,
    pub origin_device: OriginDevice,
    pub status: ReportStatus,
    /// Oldest first
    pub history: Vec<HistoryEntryDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Report> for ReportResponseDto {
    fn from(r: Report) -> Self {
        Self {
            id: r.id(),
            reporter_id: r.reporter_id().to_string(),
            category: r.category(),
            location: r.location().map(LocationDto::from),
            photos: r.photos().to_vec(),
            origin_device: r.origin_device(),
            status: r.status(),
            history: r.history().iter().map(HistoryEntryDto::from).collect(),
            created_at: r.created_at(),
            updated_at: r.updated_at(),
            title: r.title,
            description: r.description,
        }
    }
}

/// Map marker for a located report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MapMarkerDto {
    pub id: Uuid,
    pub title: String,
    pub category: ReportCategory,
    pub status: ReportStatus,
    pub longitude: f64,
    pub latitude: f64,
}

impl From<LocatedReport> for MapMarkerDto {
    fn from(r: LocatedReport) -> Self {
        let (longitude, latitude) = r.location.decode();
        Self {
            id: r.id,
            title: r.title,
            category: r.category,
            status: r.status,
            longitude,
            latitude,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct MapBoundsDto {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl From<BoundingBox> for MapBoundsDto {
    fn from(b: BoundingBox) -> Self {
        Self {
            min_lon: b.south_west.longitude(),
            min_lat: b.south_west.latitude(),
            max_lon: b.north_east.longitude(),
            max_lat: b.north_east.latitude(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MapResponseDto {
    pub markers: Vec<MapMarkerDto>,
    /// Box enclosing the returned markers
    pub bounds: Option<MapBoundsDto>,
}

impl From<MapView> for MapResponseDto {
    fn from(view: MapView) -> Self {
        Self {
            markers: view.markers.into_iter().map(MapMarkerDto::from).collect(),
            bounds: view.bounds.map(MapBoundsDto::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_dto(title: &str) -> CreateReportDto {
        CreateReportDto {
            id: None,
            reporter_id: None,
            title: title.to_string(),
            description: None,
            category: "pothole".to_string(),
            longitude: None,
            latitude: None,
            photos: vec![],
            origin_device: None,
        }
    }

    #[test]
    fn test_title_rules() {
        assert!(create_dto("Pothole on Main St").validate().is_ok());
        assert!(create_dto("").validate().is_err());
        assert!(create_dto("   ").validate().is_err());
        assert!(create_dto(&"x".repeat(201)).validate().is_err());
    }

    #[test]
    fn test_photo_limit() {
        let mut dto = create_dto("Overflowing bins");
        dto.photos = (0..6).map(|i| format!("https://cdn.example/p{}.jpg", i)).collect();
        assert!(dto.validate().is_err());
        dto.photos.truncate(5);
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_reporter_id_fits_the_column() {
        let mut dto = create_dto("Broken lamp");
        dto.reporter_id = Some("c".repeat(100));
        assert!(dto.validate().is_ok());
        dto.reporter_id = Some("c".repeat(101));
        assert!(dto.validate().is_err());
        dto.reporter_id = Some(String::new());
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_query_filters_carry_request_criteria() {
        let query = ListReportsQuery {
            category: Some("leak".to_string()),
            status: Some(ReportStatus::Resolved),
            reporter_id: Some(String::new()),
            ..ListReportsQuery::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.category, Some(ReportCategory::Leak));
        assert_eq!(filter.status, Some(ReportStatus::Resolved));
        assert_eq!(filter.reporter_id, None);
        assert!(!filter.matches_nothing());

        let filter = StatisticsQuery {
            category: None,
            status: Some(ReportStatus::Received),
        }
        .filter()
        .unwrap();
        assert_eq!(filter, ReportFilter::criteria(None, Some(ReportStatus::Received), None));
    }

    #[test]
    fn test_unknown_patch_keys_are_ignored() {
        let dto: UpdateReportFieldsDto = serde_json::from_value(serde_json::json!({
            "title": "New title",
            "reporter_id": "someone-else",
            "created_at": "2020-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(dto.title.as_deref(), Some("New title"));
    }

    #[test]
    fn test_list_query_rejects_unknown_category() {
        let query = ListReportsQuery {
            category: Some("bache".to_string()),
            ..ListReportsQuery::default()
        };
        assert!(matches!(query.filter(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_map_bounds_need_all_corners() {
        let partial = MapQuery {
            min_lon: Some(-103.0),
            min_lat: Some(19.0),
            ..MapQuery::default()
        };
        assert!(partial.bounds().is_err());

        let full = MapQuery {
            min_lon: Some(-103.0),
            min_lat: Some(19.0),
            max_lon: Some(-102.0),
            max_lat: Some(20.0),
            ..MapQuery::default()
        };
        assert!(full.bounds().unwrap().is_some());
        assert!(MapQuery::default().bounds().unwrap().is_none());
    }

    #[test]
    fn test_map_limit_is_clamped() {
        assert_eq!(MapQuery::default().limit(), DEFAULT_MAP_LIMIT);
        let query = MapQuery {
            limit: Some(50_000),
            ..MapQuery::default()
        };
        assert_eq!(query.limit(), MAX_MAP_LIMIT);
    }
}
