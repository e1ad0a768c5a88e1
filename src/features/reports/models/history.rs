use chrono::{DateTime, Utc};

use super::ReportStatus;

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub status: ReportStatus,
    pub recorded_at: DateTime<Utc>,
    pub actor_id: String,
    pub notes: String,
}

/// Ordered, non-empty, append-only status history.
///
/// There is no way to remove, reorder or edit an entry once it is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusHistory {
    first: HistoryEntry,
    rest: Vec<HistoryEntry>,
}

impl StatusHistory {
    pub fn start(first: HistoryEntry) -> Self {
        Self {
            first,
            rest: Vec::new(),
        }
    }

    /// Rebuild from stored entries in recorded order; `None` when empty
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Option<Self> {
        let mut entries = entries.into_iter();
        let first = entries.next()?;
        Some(Self {
            first,
            rest: entries.collect(),
        })
    }

    pub fn current(&self) -> &HistoryEntry {
        self.rest.last().unwrap_or(&self.first)
    }

    pub fn current_status(&self) -> ReportStatus {
        self.current().status
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    /// Entries recorded after the first `count`; used by stores to persist new appends
    pub fn since(&self, count: usize) -> impl Iterator<Item = &HistoryEntry> {
        self.iter().skip(count)
    }

    pub(crate) fn append(&mut self, entry: HistoryEntry) {
        self.rest.push(entry);
    }
}
