use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Speech backend error: {0}")]
    Speech(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("Transient error, will retry: {0}")]
    Transient(String),
}

/// Session-level errors surfaced on the controller's error channel.
///
/// These never produce command log entries: no command was formed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Microphone permission was refused. Listening stays disabled until
    /// the user retries `start_listening` explicitly.
    PermissionDenied,
    /// The requested backend is unsupported or its model failed to load.
    BackendUnavailable { reason: String },
    /// A recognition cycle ended without hearing any speech.
    NoSpeechDetected,
    /// The backend aborted the recognition cycle mid-stream.
    RecognitionAborted { reason: String },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::PermissionDenied => write!(f, "microphone permission denied"),
            SessionError::BackendUnavailable { reason } => {
                write!(f, "speech backend unavailable: {reason}")
            }
            SessionError::NoSpeechDetected => write!(f, "no speech detected"),
            SessionError::RecognitionAborted { reason } => {
                write!(f, "recognition aborted: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum RecoveryStrategy {
    Retry { max_attempts: u32, delay: Duration },
    Fallback { to: String },
    Restart,
    Ignore,
    Fatal,
}

impl EngineError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            EngineError::Speech(_) => RecoveryStrategy::Fallback {
                to: "continuous".into(),
            },
            EngineError::Transient(_) => RecoveryStrategy::Retry {
                max_attempts: 3,
                delay: Duration::from_secs(1),
            },
            EngineError::Command(_) => RecoveryStrategy::Ignore,
            EngineError::Fatal(_) | EngineError::ShutdownRequested => RecoveryStrategy::Fatal,
            _ => RecoveryStrategy::Restart,
        }
    }
}
