mod filter;
mod geo_point;
mod history;
mod report;

pub use filter::ReportFilter;
pub use geo_point::{BoundingBox, GeoPoint, SRID};
pub use history::{HistoryEntry, StatusHistory};
pub use report::{NewReport, OriginDevice, PersistedReport, Report, ReportCategory, ReportStatus};
