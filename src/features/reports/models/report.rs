use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{GeoPoint, HistoryEntry, StatusHistory};
use crate::core::error::{AppError, Result};

/// Report status enum matching database enum; ordered as declared there
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Received,
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Received => "received",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incident category; also names the department that handles it
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "report_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    Pothole,
    Lighting,
    Waste,
    Leak,
    Roadway,
    Other,
}

impl ReportCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportCategory::Pothole => "pothole",
            ReportCategory::Lighting => "lighting",
            ReportCategory::Waste => "waste",
            ReportCategory::Leak => "leak",
            ReportCategory::Roadway => "roadway",
            ReportCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pothole" => Ok(ReportCategory::Pothole),
            "lighting" => Ok(ReportCategory::Lighting),
            "waste" => Ok(ReportCategory::Waste),
            "leak" => Ok(ReportCategory::Leak),
            "roadway" => Ok(ReportCategory::Roadway),
            "other" => Ok(ReportCategory::Other),
            other => Err(AppError::Validation(format!(
                "Unknown report category: {}",
                other
            ))),
        }
    }
}

/// Where a report was filed from (informational only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "origin_device", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OriginDevice {
    #[default]
    Web,
    Mobile,
    System,
}

/// Data for filing a new report; validated before it reaches this type
#[derive(Debug, Clone)]
pub struct NewReport {
    pub id: Uuid,
    pub reporter_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: ReportCategory,
    pub location: Option<GeoPoint>,
    pub photos: Vec<String>,
    pub origin_device: OriginDevice,
}

/// Raw stored form of a report, as read back by a store
#[derive(Debug, Clone)]
pub struct PersistedReport {
    pub id: Uuid,
    pub reporter_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: ReportCategory,
    pub location: Option<GeoPoint>,
    pub photos: Vec<String>,
    pub origin_device: OriginDevice,
    pub status: ReportStatus,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An incident report.
///
/// Identity, reporter, category, location, photos and creation time are fixed
/// once the report is filed. The current status is always the status of the
/// last history entry; the history only grows through [`Report::record_transition`].
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    id: Uuid,
    reporter_id: String,
    pub title: String,
    pub description: Option<String>,
    category: ReportCategory,
    location: Option<GeoPoint>,
    photos: Vec<String>,
    origin_device: OriginDevice,
    history: StatusHistory,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Report {
    /// File a new report in the `received` state, attributed to its reporter
    pub fn file(new: NewReport, note: &str, now: DateTime<Utc>) -> Self {
        let history = StatusHistory::start(HistoryEntry {
            status: ReportStatus::Received,
            recorded_at: now,
            actor_id: new.reporter_id.clone(),
            notes: note.to_string(),
        });

        Self {
            id: new.id,
            reporter_id: new.reporter_id,
            title: new.title,
            description: new.description,
            category: new.category,
            location: new.location,
            photos: new.photos,
            origin_device: new.origin_device,
            history,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a report from storage, rejecting rows that break the history invariants
    pub fn restore(persisted: PersistedReport) -> Result<Self> {
        let id = persisted.id;
        let history = StatusHistory::from_entries(persisted.history).ok_or_else(|| {
            AppError::Internal(format!("Report {} has no status history", id))
        })?;

        if history.current_status() != persisted.status {
            return Err(AppError::Internal(format!(
                "Report {} status {} disagrees with history ({})",
                id,
                persisted.status,
                history.current_status()
            )));
        }

        Ok(Self {
            id,
            reporter_id: persisted.reporter_id,
            title: persisted.title,
            description: persisted.description,
            category: persisted.category,
            location: persisted.location,
            photos: persisted.photos,
            origin_device: persisted.origin_device,
            history,
            created_at: persisted.created_at,
            updated_at: persisted.updated_at,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn reporter_id(&self) -> &str {
        &self.reporter_id
    }

    pub fn category(&self) -> ReportCategory {
        self.category
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    pub fn photos(&self) -> &[String] {
        &self.photos
    }

    pub fn origin_device(&self) -> OriginDevice {
        self.origin_device
    }

    pub fn status(&self) -> ReportStatus {
        self.history.current_status()
    }

    pub fn history(&self) -> &StatusHistory {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Append an accepted transition; the entry becomes the current status
    pub(crate) fn record_transition(&mut self, entry: HistoryEntry) {
        self.updated_at = self.updated_at.max(entry.recorded_at);
        self.history.append(entry);
    }

    /// Mark a field edit; never moves `updated_at` backwards
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
    }
}
