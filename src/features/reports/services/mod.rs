pub mod access_filter;
mod report_service;
pub mod statistics;
pub mod transition;

pub use report_service::{MapView, ReportService};
pub use statistics::{Statistics, StatusSummary};
