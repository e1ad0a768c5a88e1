//! Role-scoped visibility and write authorization for reports.
//!
//! - citizen: only their own reports; may file reports; never changes status
//! - staff: only reports whose category is their department; may change
//!   status and edit fields of those; may not file reports
//! - admin: everything, including deletion
//!
//! Staff without a department (or with one that names no category) see
//! nothing. That is a valid, empty result rather than an error.

use crate::core::error::{AppError, Result};
use crate::features::auth::model::{AuthenticatedUser, Role};
use crate::features::reports::models::{Report, ReportCategory, ReportFilter};

/// Category a staff member is scoped to, if their department names one
pub fn department_category(caller: &AuthenticatedUser) -> Option<ReportCategory> {
    caller
        .department
        .as_deref()
        .and_then(|d| d.parse::<ReportCategory>().ok())
}

/// Predicate selecting the reports the caller may see
pub fn derive_filter(caller: &AuthenticatedUser) -> ReportFilter {
    match caller.role {
        Role::Citizen => ReportFilter::reporter(caller.user_id.clone()),
        Role::Staff => match department_category(caller) {
            Some(category) => ReportFilter::category(category),
            None => ReportFilter::nothing(),
        },
        Role::Admin => ReportFilter::everything(),
    }
}

/// Single-record read check; mirrors [`derive_filter`]
pub fn authorize_read(caller: &AuthenticatedUser, report: &Report) -> Result<()> {
    if derive_filter(caller).matches(report) {
        return Ok(());
    }

    tracing::warn!(
        "User {} ({}) denied access to report {}",
        caller.user_id,
        caller.role,
        report.id()
    );
    Err(match caller.role {
        Role::Citizen => AppError::Forbidden("You can only access your own reports".to_string()),
        _ => AppError::Forbidden("Report belongs to another department".to_string()),
    })
}

/// Decide who a new report is filed for.
///
/// Staff cannot file reports. Citizens always file for themselves; naming
/// another reporter is refused. Admins may file on behalf of someone else.
pub fn authorize_create(
    caller: &AuthenticatedUser,
    requested_reporter: Option<&str>,
) -> Result<String> {
    match caller.role {
        Role::Staff => Err(AppError::Forbidden(
            "Staff members cannot create reports".to_string(),
        )),
        Role::Citizen => match requested_reporter {
            Some(reporter) if reporter != caller.user_id => Err(AppError::Forbidden(
                "Reports can only be filed under your own identity".to_string(),
            )),
            _ => Ok(caller.user_id.clone()),
        },
        Role::Admin => Ok(requested_reporter
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(&caller.user_id)
            .to_string()),
    }
}

/// Status changes: staff on visible reports, admins on any
pub fn authorize_status_change(caller: &AuthenticatedUser, report: &Report) -> Result<()> {
    match caller.role {
        Role::Citizen => Err(AppError::Forbidden(
            "Citizens cannot change report status".to_string(),
        )),
        Role::Staff | Role::Admin => authorize_read(caller, report),
    }
}

/// Title/description edits follow the same rule as status changes
pub fn authorize_field_update(caller: &AuthenticatedUser, report: &Report) -> Result<()> {
    match caller.role {
        Role::Citizen => Err(AppError::Forbidden(
            "Citizens cannot edit reports".to_string(),
        )),
        Role::Staff | Role::Admin => authorize_read(caller, report),
    }
}

pub fn authorize_delete(caller: &AuthenticatedUser) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only administrators can delete reports".to_string(),
        ))
    }
}
