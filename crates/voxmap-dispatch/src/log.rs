//! Bounded, ordered command log
//!
//! Newest-first for display. The dispatcher is the only writer; the
//! controller and UI observers read snapshots. A single lock guards the
//! deque, so append and per-entry status mutation are atomic and
//! concurrent handler completions cannot corrupt adjacent entries.

use parking_lot::RwLock;
use std::collections::VecDeque;
use thiserror::Error;

use crate::record::{CommandRecord, CommandStatus};

pub const DEFAULT_LOG_CAPACITY: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    /// The entry was evicted (or never existed). Late handler
    /// completions tolerate this.
    #[error("command {0} is not in the log")]
    NotFound(u64),

    #[error("illegal status transition {from} -> {to} for command {id}")]
    InvalidTransition {
        id: u64,
        from: CommandStatus,
        to: CommandStatus,
    },
}

pub struct CommandLog {
    entries: RwLock<VecDeque<CommandRecord>>,
    capacity: usize,
}

impl CommandLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Append a record (newest first). Returns the evicted oldest entry
    /// id when the log was at capacity.
    pub fn append(&self, record: CommandRecord) -> Option<u64> {
        let mut entries = self.entries.write();
        entries.push_front(record);
        if entries.len() > self.capacity {
            entries.pop_back().map(|evicted| evicted.id)
        } else {
            None
        }
    }

    /// Mutate one entry's status, enforcing the lifecycle state machine.
    /// Terminal states never regress. Returns the updated record for
    /// observer notification.
    pub fn update_status(
        &self,
        id: u64,
        status: CommandStatus,
        error_detail: Option<String>,
    ) -> Result<CommandRecord, LogError> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LogError::NotFound(id))?;

        if !entry.status.can_transition_to(status) {
            return Err(LogError::InvalidTransition {
                id,
                from: entry.status,
                to: status,
            });
        }

        entry.status = status;
        entry.error_detail = if status == CommandStatus::Failed {
            error_detail
        } else {
            None
        };
        Ok(entry.clone())
    }

    pub fn get(&self, id: u64) -> Option<CommandRecord> {
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    /// Snapshot, newest first.
    pub fn snapshot(&self) -> Vec<CommandRecord> {
        self.entries.read().iter().cloned().collect()
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CommandSource;
    use voxmap_intent::CommandIntent;

    fn record(raw: &str) -> CommandRecord {
        CommandRecord::new(
            CommandIntent::Search {
                query: Some(raw.to_string()),
            },
            raw,
            CommandSource::Manual,
        )
    }

    #[test]
    fn newest_entries_come_first() {
        let log = CommandLog::new(10);
        let first = record("first");
        let second = record("second");
        let second_id = second.id;
        log.append(first);
        log.append(second);

        let snapshot = log.snapshot();
        assert_eq!(snapshot[0].id, second_id);
    }

    #[test]
    fn capacity_is_enforced_and_oldest_evicts() {
        let log = CommandLog::new(3);
        let ids: Vec<u64> = (0..4)
            .map(|i| {
                let r = record(&format!("cmd {i}"));
                let id = r.id;
                log.append(r);
                id
            })
            .collect();

        assert_eq!(log.len(), 3);
        // The oldest entry (ids[0]) was evicted, never a newer one.
        assert!(log.get(ids[0]).is_none());
        for id in &ids[1..] {
            assert!(log.get(*id).is_some());
        }
    }

    #[test]
    fn append_reports_the_evicted_id() {
        let log = CommandLog::new(1);
        let first = record("a");
        let first_id = first.id;
        assert_eq!(log.append(first), None);
        assert_eq!(log.append(record("b")), Some(first_id));
    }

    #[test]
    fn status_follows_the_lifecycle() {
        let log = CommandLog::new(10);
        let r = record("zoom in");
        let id = r.id;
        log.append(r);

        log.update_status(id, CommandStatus::Processing, None).unwrap();
        let done = log
            .update_status(id, CommandStatus::Completed, None)
            .unwrap();
        assert_eq!(done.status, CommandStatus::Completed);

        // No transition out of a terminal state.
        let err = log.update_status(id, CommandStatus::Processing, None);
        assert_eq!(
            err,
            Err(LogError::InvalidTransition {
                id,
                from: CommandStatus::Completed,
                to: CommandStatus::Processing,
            })
        );
    }

    #[test]
    fn failed_entries_keep_their_detail_and_completed_clear_it() {
        let log = CommandLog::new(10);
        let r = record("set zoom to 25");
        let id = r.id;
        log.append(r);
        log.update_status(id, CommandStatus::Processing, None).unwrap();
        let failed = log
            .update_status(id, CommandStatus::Failed, Some("out of range".into()))
            .unwrap();
        assert_eq!(failed.error_detail.as_deref(), Some("out of range"));
    }

    #[test]
    fn update_on_missing_entry_is_reported_not_panicked() {
        let log = CommandLog::new(10);
        assert_eq!(
            log.update_status(9999, CommandStatus::Processing, None),
            Err(LogError::NotFound(9999))
        );
    }
}
