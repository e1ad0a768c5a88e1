/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// REPORT LIMITS
// =============================================================================

/// Maximum length of a report title
pub const MAX_TITLE_LENGTH: u64 = 200;

/// Maximum number of photo references attached to one report
pub const MAX_PHOTOS_PER_REPORT: u64 = 5;

/// Note recorded on the history entry synthesized at creation
pub const INITIAL_HISTORY_NOTE: &str = "Report created";

/// Default and maximum number of markers returned by the map endpoint
pub const DEFAULT_MAP_LIMIT: i64 = 500;
pub const MAX_MAP_LIMIT: i64 = 1000;

/// Maximum length of a user id stored as reporter or history actor
pub const MAX_USER_ID_LENGTH: u64 = 100;
