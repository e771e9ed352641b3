use std::collections::VecDeque;

use chrono::{DateTime, Local};
use sim::{LogEntry, LogSource};

/// Append-only audit trail, most recent entry first.
#[derive(Clone, Debug, Default)]
pub struct AuditLog {
    entries: VecDeque<LogEntry>,
    appended: u64,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        tick: u64,
        timestamp: DateTime<Local>,
        source: LogSource,
        event: impl Into<String>,
        detail: impl Into<String>,
    ) -> &LogEntry {
        self.entries.push_front(LogEntry {
            tick,
            timestamp,
            source,
            event: event.into(),
            detail: detail.into(),
        });
        self.appended += 1;
        &self.entries[0]
    }

    /// Only a global reset clears the log.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ever appended, including those dropped by a reset.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Entries appended after the log had seen `mark` appends, most recent first.
    pub fn since(&self, mark: u64) -> impl Iterator<Item = &LogEntry> {
        let fresh = self.appended.saturating_sub(mark).min(self.entries.len() as u64);
        self.entries.iter().take(fresh as usize)
    }

    pub fn count(&self, source: LogSource, event: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.source == source && e.event == event)
            .count()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
