//! Report status state machine.
//!
//! ```text
//! received    -> in_progress | resolved
//! in_progress -> received    | resolved
//! resolved    -> (admin only) received | in_progress
//! ```

use chrono::{DateTime, Utc};

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::reports::models::{HistoryEntry, Report, ReportStatus};

/// Targets reachable from `from`; `privileged` unlocks reopening resolved reports
pub fn valid_transitions(from: ReportStatus, privileged: bool) -> Vec<ReportStatus> {
    use ReportStatus::*;
    match from {
        Received => vec![InProgress, Resolved],
        InProgress => vec![Received, Resolved],
        Resolved if privileged => vec![Received, InProgress],
        Resolved => vec![],
    }
}

pub fn can_transition(from: ReportStatus, to: ReportStatus, privileged: bool) -> bool {
    valid_transitions(from, privileged).contains(&to)
}

/// Validate and apply one status change, appending exactly one history entry.
///
/// On error the report is left untouched. The entry's timestamp never goes
/// back before the previous entry, so history stays chronological.
pub fn apply(
    report: &mut Report,
    target: ReportStatus,
    actor: &AuthenticatedUser,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    let current = report.status();

    if !can_transition(current, target, actor.is_admin()) {
        tracing::warn!(
            "Rejected transition of report {} from {} to {} by {} ({})",
            report.id(),
            current,
            target,
            actor.user_id,
            actor.role
        );
        return Err(AppError::IllegalTransition {
            from: current,
            to: target,
        });
    }

    let recorded_at = now.max(report.history().current().recorded_at);
    report.record_transition(HistoryEntry {
        status: target,
        recorded_at,
        actor_id: actor.user_id.clone(),
        notes: notes.unwrap_or_default(),
    });

    Ok(())
}
