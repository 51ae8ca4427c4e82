use crate::error::EngineError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    Initializing,
    Ready,
    Listening { backend: String },
    Stopping,
    Stopped,
}

/// Tracks the engine lifecycle and broadcasts transitions to observers.
pub struct StateManager {
    state: Arc<RwLock<EngineState>>,
    state_tx: Sender<EngineState>,
    state_rx: Receiver<EngineState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(EngineState::Initializing)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: EngineState) -> Result<(), EngineError> {
        let mut current = self.state.write();

        // Validate state transitions
        let valid = matches!(
            (&*current, &new_state),
            (EngineState::Initializing, EngineState::Ready)
                | (EngineState::Ready, EngineState::Listening { .. })
                | (EngineState::Listening { .. }, EngineState::Ready)
                | (EngineState::Listening { .. }, EngineState::Listening { .. })
                | (EngineState::Ready, EngineState::Stopping)
                | (EngineState::Listening { .. }, EngineState::Stopping)
                | (EngineState::Stopping, EngineState::Stopped)
        );

        if !valid {
            return Err(EngineError::Fatal(format!(
                "Invalid state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!(target: "session", "State transition: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> EngineState {
        self.state.read().clone()
    }

    pub fn is_listening(&self) -> bool {
        matches!(*self.state.read(), EngineState::Listening { .. })
    }

    pub fn subscribe(&self) -> Receiver<EngineState> {
        self.state_rx.clone()
    }
}
