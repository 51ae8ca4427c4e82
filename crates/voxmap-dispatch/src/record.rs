//! Command record and lifecycle state machine

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use voxmap_intent::CommandIntent;

/// Generates unique command ids. Wall-clock timestamps can collide at
/// millisecond resolution, so the monotonic counter is the identity
/// used for all status updates; `issued_at` is display-only.
static COMMAND_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn next_command_id() -> u64 {
    COMMAND_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandStatus::Completed | CommandStatus::Failed)
    }

    /// The only legal moves: `Pending → Processing → {Completed | Failed}`.
    pub fn can_transition_to(&self, next: CommandStatus) -> bool {
        matches!(
            (self, next),
            (CommandStatus::Pending, CommandStatus::Processing)
                | (CommandStatus::Processing, CommandStatus::Completed)
                | (CommandStatus::Processing, CommandStatus::Failed)
        )
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Processing => "processing",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "error",
        };
        f.write_str(s)
    }
}

/// How the command entered the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    /// Spoken, via the continuous backend and segmenter.
    Voice,
    /// Typed, via `submit_manual_command`.
    Manual,
    /// A keyword-spotter token.
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRecord {
    pub id: u64,
    pub issued_at: SystemTime,
    pub intent: CommandIntent,
    /// Original text, retained for diagnostics and log display.
    pub raw_utterance: String,
    pub source: CommandSource,
    pub status: CommandStatus,
    /// Set only when `status` is Failed.
    pub error_detail: Option<String>,
}

impl CommandRecord {
    pub fn new(intent: CommandIntent, raw_utterance: &str, source: CommandSource) -> Self {
        Self {
            id: next_command_id(),
            issued_at: SystemTime::now(),
            intent,
            raw_utterance: raw_utterance.to_string(),
            source,
            status: CommandStatus::Pending,
            error_detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = next_command_id();
        let b = next_command_id();
        assert!(b > a);
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        for terminal in [CommandStatus::Completed, CommandStatus::Failed] {
            for next in [
                CommandStatus::Pending,
                CommandStatus::Processing,
                CommandStatus::Completed,
                CommandStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn pending_only_moves_to_processing() {
        assert!(CommandStatus::Pending.can_transition_to(CommandStatus::Processing));
        assert!(!CommandStatus::Pending.can_transition_to(CommandStatus::Completed));
        assert!(!CommandStatus::Pending.can_transition_to(CommandStatus::Failed));
    }
}
