use super::{Report, ReportCategory, ReportStatus};

/// Typed conjunction of report predicates.
///
/// Built by the access filter for the caller, optionally narrowed with the
/// request's own criteria, and handed to the store as-is. An unset field
/// matches every report; a filter marked as matching nothing matches none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub category: Option<ReportCategory>,
    pub status: Option<ReportStatus>,
    pub reporter_id: Option<String>,
    matches_nothing: bool,
}

impl ReportFilter {
    pub fn everything() -> Self {
        Self::default()
    }

    /// Filter that no report satisfies
    pub fn nothing() -> Self {
        Self {
            matches_nothing: true,
            ..Self::default()
        }
    }

    pub fn reporter(reporter_id: impl Into<String>) -> Self {
        Self {
            reporter_id: Some(reporter_id.into()),
            ..Self::default()
        }
    }

    pub fn category(category: ReportCategory) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    /// Request criteria; each `None` leaves that field unconstrained
    pub fn criteria(
        category: Option<ReportCategory>,
        status: Option<ReportStatus>,
        reporter_id: Option<String>,
    ) -> Self {
        Self {
            category,
            status,
            reporter_id,
            matches_nothing: false,
        }
    }

    pub fn matches_nothing(&self) -> bool {
        self.matches_nothing
    }

    /// Both filters must hold. Two different values for the same field can
    /// never hold together, so the result matches nothing.
    pub fn and(self, other: ReportFilter) -> ReportFilter {
        let mut matches_nothing = self.matches_nothing || other.matches_nothing;

        let category = merge(self.category, other.category, &mut matches_nothing);
        let status = merge(self.status, other.status, &mut matches_nothing);
        let reporter_id = merge(self.reporter_id, other.reporter_id, &mut matches_nothing);

        ReportFilter {
            category,
            status,
            reporter_id,
            matches_nothing,
        }
    }

    pub fn matches(&self, report: &Report) -> bool {
        !self.matches_nothing
            && self.category.is_none_or(|c| c == report.category())
            && self.status.is_none_or(|s| s == report.status())
            && self
                .reporter_id
                .as_deref()
                .is_none_or(|id| id == report.reporter_id())
    }
}

fn merge<T: PartialEq>(left: Option<T>, right: Option<T>, conflict: &mut bool) -> Option<T> {
    match (left, right) {
        (Some(l), Some(r)) => {
            if l != r {
                *conflict = true;
            }
            Some(l)
        }
        (l, r) => l.or(r),
    }
}
