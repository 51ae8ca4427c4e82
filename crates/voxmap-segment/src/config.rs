use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Trailing silence after the last final fragment before the buffer
    /// is finalized into an utterance.
    pub silence_timeout_ms: u64,
    /// Whether the backend session is continuous. Non-continuous
    /// sessions ask the backend to stop once an utterance finalizes.
    pub continuous: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            silence_timeout_ms: 1500,
            continuous: true,
        }
    }
}
