use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use super::{LocatedReport, Mutation, ReportStore, StatisticsRow};
use crate::core::error::{AppError, Result};
use crate::features::reports::models::{
    BoundingBox, GeoPoint, HistoryEntry, OriginDevice, PersistedReport, Report, ReportCategory,
    ReportFilter, ReportStatus, SRID,
};
use crate::shared::types::PaginationQuery;

/// Columns selected for a full report row; location is split back into its components
macro_rules! report_columns {
    () => {
        r#"
        id, reporter_id, title, description, category,
        ST_X(location) AS longitude, ST_Y(location) AS latitude,
        photos, origin_device, status, created_at, updated_at
        "#
    };
}

/// History of the row in `reports`, oldest first, as one JSON array.
///
/// Selected next to `report_columns!()` so a row and its history come from the
/// same snapshot.
macro_rules! history_column {
    () => {
        r#"
        COALESCE((
            SELECT json_agg(json_build_object(
                'status', h.status,
                'actor_id', h.actor_id,
                'notes', h.notes,
                'recorded_at', h.recorded_at
            ) ORDER BY h.seq)
            FROM report_status_history h
            WHERE h.report_id = reports.id
        ), '[]'::json) AS history
        "#
    };
}

/// Access/request predicate. Binds: $1 matches_nothing, $2 category, $3 status, $4 reporter_id
macro_rules! filter_clause {
    () => {
        r#"
        NOT $1
          AND ($2::report_category IS NULL OR category = $2)
          AND ($3::report_status IS NULL OR status = $3)
          AND ($4::text IS NULL OR reporter_id = $4)
        "#
    };
}

#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    reporter_id: String,
    title: String,
    description: Option<String>,
    category: ReportCategory,
    longitude: Option<f64>,
    latitude: Option<f64>,
    photos: Json<Vec<String>>,
    origin_device: OriginDevice,
    status: ReportStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Deserialize)]
struct HistoryRow {
    status: ReportStatus,
    actor_id: String,
    notes: String,
    recorded_at: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            status: row.status,
            recorded_at: row.recorded_at,
            actor_id: row.actor_id,
            notes: row.notes,
        }
    }
}

/// Report row read together with its history in one statement
#[derive(Debug, FromRow)]
struct SnapshotRow {
    #[sqlx(flatten)]
    report: ReportRow,
    history: Json<Vec<HistoryRow>>,
}

impl SnapshotRow {
    fn into_report(self) -> Result<Report> {
        let history = self.history.0.into_iter().map(HistoryEntry::from).collect();
        self.report.into_report(history)
    }
}

#[derive(Debug, FromRow)]
struct LocatedRow {
    id: Uuid,
    title: String,
    category: ReportCategory,
    status: ReportStatus,
    longitude: f64,
    latitude: f64,
}

impl ReportRow {
    fn into_report(self, history: Vec<HistoryEntry>) -> Result<Report> {
        let location = GeoPoint::from_optional(self.longitude, self.latitude).map_err(|e| {
            AppError::Internal(format!("Report {} has an invalid location: {}", self.id, e))
        })?;

        Report::restore(PersistedReport {
            id: self.id,
            reporter_id: self.reporter_id,
            title: self.title,
            description: self.description,
            category: self.category,
            location,
            photos: self.photos.0,
            origin_device: self.origin_device,
            status: self.status,
            history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!("{}: {:?}", context, e);
        AppError::Database(e)
    }
}

/// PostgreSQL + PostGIS report store
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// History of one report in recorded order
    async fn load_history<'e, E>(executor: E, id: Uuid) -> Result<Vec<HistoryEntry>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT status, actor_id, notes, recorded_at
            FROM report_status_history
            WHERE report_id = $1
            ORDER BY seq
            "#,
        )
        .bind(id)
        .fetch_all(executor)
        .await
        .map_err(db_error("Failed to load report history"))?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    async fn append_history<'e, E>(
        executor: E,
        report_id: Uuid,
        entry: &HistoryEntry,
    ) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO report_status_history (report_id, status, actor_id, notes, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(report_id)
        .bind(entry.status)
        .bind(&entry.actor_id)
        .bind(&entry.notes)
        .bind(entry.recorded_at)
        .execute(executor)
        .await
        .map_err(db_error("Failed to append report history"))?;

        Ok(())
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn insert(&self, report: &Report) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let location = report.location().map(|p| p.decode());

        sqlx::query(
            r#"
            INSERT INTO reports (
                id, reporter_id, title, description, category, location,
                photos, origin_device, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, ST_SetSRID(ST_MakePoint($6, $7), $8), $9, $10, $11, $12, $13)
            "#,
        )
        .bind(report.id())
        .bind(report.reporter_id())
        .bind(&report.title)
        .bind(&report.description)
        .bind(report.category())
        .bind(location.map(|(lon, _)| lon))
        .bind(location.map(|(_, lat)| lat))
        .bind(SRID)
        .bind(Json(report.photos()))
        .bind(report.origin_device())
        .bind(report.status())
        .bind(report.created_at())
        .bind(report.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Report {} already exists", report.id()))
            }
            e => db_error("Failed to create report")(e),
        })?;

        for entry in report.history().iter() {
            Self::append_history(&mut *tx, report.id(), entry).await?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit report creation"))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>> {
        sqlx::query_as::<_, SnapshotRow>(concat!(
            "SELECT ",
            report_columns!(),
            ", ",
            history_column!(),
            " FROM reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get report"))?
        .map(SnapshotRow::into_report)
        .transpose()
    }

    async fn list(
        &self,
        filter: &ReportFilter,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Report>, i64)> {
        let count = sqlx::query_scalar::<_, i64>(concat!(
            "SELECT COUNT(*) FROM reports WHERE ",
            filter_clause!()
        ))
        .bind(filter.matches_nothing())
        .bind(filter.category)
        .bind(filter.status)
        .bind(filter.reporter_id.as_deref())
        .fetch_one(&self.pool);

        let page = sqlx::query_as::<_, SnapshotRow>(concat!(
            "SELECT ",
            report_columns!(),
            ", ",
            history_column!(),
            " FROM reports WHERE ",
            filter_clause!(),
            " ORDER BY created_at DESC, id DESC OFFSET $5 LIMIT $6"
        ))
        .bind(filter.matches_nothing())
        .bind(filter.category)
        .bind(filter.status)
        .bind(filter.reporter_id.as_deref())
        .bind(pagination.offset())
        .bind(pagination.limit())
        .fetch_all(&self.pool);

        let (total, rows) =
            futures::try_join!(count, page).map_err(db_error("Failed to list reports"))?;

        let reports = rows
            .into_iter()
            .map(SnapshotRow::into_report)
            .collect::<Result<Vec<_>>>()?;

        Ok((reports, total))
    }

    async fn modify(&self, id: Uuid, mutation: Mutation<'_>) -> Result<Report> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        // Row lock serializes concurrent writers on this report until commit
        let row = sqlx::query_as::<_, ReportRow>(concat!(
            "SELECT ",
            report_columns!(),
            " FROM reports WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to lock report"))?
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;

        // Read after the lock is held, so it sees the last committed writer
        let history = Self::load_history(&mut *tx, id).await?;
        let mut report = row.into_report(history)?;
        let persisted_len = report.history().len();

        // Dropping tx on error rolls back
        mutation(&mut report)?;

        sqlx::query(
            r#"
            UPDATE reports
            SET title = $2, description = $3, status = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&report.title)
        .bind(&report.description)
        .bind(report.status())
        .bind(report.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update report"))?;

        for entry in report.history().since(persisted_len) {
            Self::append_history(&mut *tx, id, entry).await?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit report update"))?;

        Ok(report)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Report>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let row = sqlx::query_as::<_, ReportRow>(concat!(
            "SELECT ",
            report_columns!(),
            " FROM reports WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to lock report"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history = Self::load_history(&mut *tx, id).await?;
        let report = row.into_report(history)?;

        sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete report"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit report deletion"))?;

        Ok(Some(report))
    }

    async fn aggregate(&self, filter: &ReportFilter) -> Result<Vec<StatisticsRow>> {
        sqlx::query_as::<_, StatisticsRow>(concat!(
            "SELECT category, status, COUNT(*) AS count FROM reports WHERE ",
            filter_clause!(),
            " GROUP BY category, status ORDER BY category, status"
        ))
        .bind(filter.matches_nothing())
        .bind(filter.category)
        .bind(filter.status)
        .bind(filter.reporter_id.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to aggregate reports"))
    }

    async fn locate(
        &self,
        filter: &ReportFilter,
        bounds: Option<&BoundingBox>,
        limit: i64,
    ) -> Result<Vec<LocatedReport>> {
        let rows = sqlx::query_as::<_, LocatedRow>(concat!(
            r#"
            SELECT id, title, category, status,
                   ST_X(location) AS longitude, ST_Y(location) AS latitude
            FROM reports
            WHERE location IS NOT NULL AND "#,
            filter_clause!(),
            r#"
              AND ($5::float8 IS NULL OR location && ST_MakeEnvelope($5, $6, $7, $8, $9))
            ORDER BY created_at DESC, id DESC
            LIMIT $10
            "#
        ))
        .bind(filter.matches_nothing())
        .bind(filter.category)
        .bind(filter.status)
        .bind(filter.reporter_id.as_deref())
        .bind(bounds.map(|b| b.south_west.longitude()))
        .bind(bounds.map(|b| b.south_west.latitude()))
        .bind(bounds.map(|b| b.north_east.longitude()))
        .bind(bounds.map(|b| b.north_east.latitude()))
        .bind(SRID)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch located reports"))?;

        rows.into_iter()
            .map(|row| {
                let location = GeoPoint::encode(row.longitude, row.latitude)?;
                Ok(LocatedReport {
                    id: row.id,
                    title: row.title,
                    category: row.category,
                    status: row.status,
                    location,
                })
            })
            .collect()
    }
}
