//! Speech backend contract
//!
//! Both recognition variants (continuous cloud recognizer, on-device
//! keyword spotter) implement `SpeechBackend`. Factories and the registry
//! let the manager construct backends without knowing their concrete
//! source types.

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

use voxmap_foundation::error::{EngineError, SessionError};

use crate::types::{BackendKind, EventSink};

/// Errors raised by speech backends
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Backend not supported: {reason}")]
    NotSupported { reason: String },

    /// Distinguishable from other failures: listening stays disabled
    /// until the user retries explicitly.
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Recognition aborted: {0}")]
    Aborted(String),

    #[error("No speech detected")]
    NoSpeechDetected,
}

impl SpeechError {
    /// Stable code string carried on `RecognitionEvent::Error`.
    pub fn code(&self) -> &'static str {
        match self {
            SpeechError::NotSupported { .. } => "not_supported",
            SpeechError::PermissionDenied => "permission_denied",
            SpeechError::BackendUnavailable(_) => "backend_unavailable",
            SpeechError::ModelLoadFailed(_) => "model_load_failed",
            SpeechError::Aborted(_) => "aborted",
            SpeechError::NoSpeechDetected => "no_speech",
        }
    }

    /// Map onto the session-level error channel taxonomy.
    pub fn to_session_error(&self) -> SessionError {
        match self {
            SpeechError::PermissionDenied => SessionError::PermissionDenied,
            SpeechError::NotSupported { reason } => SessionError::BackendUnavailable {
                reason: reason.clone(),
            },
            SpeechError::BackendUnavailable(reason) | SpeechError::ModelLoadFailed(reason) => {
                SessionError::BackendUnavailable {
                    reason: reason.clone(),
                }
            }
            SpeechError::Aborted(reason) => SessionError::RecognitionAborted {
                reason: reason.clone(),
            },
            SpeechError::NoSpeechDetected => SessionError::NoSpeechDetected,
        }
    }
}

impl From<SpeechError> for EngineError {
    fn from(err: SpeechError) -> Self {
        EngineError::Speech(err.to_string())
    }
}

/// Metadata about a speech backend
#[derive(Debug, Clone)]
pub struct BackendInfo {
    pub kind: BackendKind,
    /// Human-readable name
    pub name: String,
    pub requires_network: bool,
    pub is_local: bool,
}

/// Capabilities a backend variant supports
#[derive(Debug, Clone, Default)]
pub struct BackendCapabilities {
    /// Emits interim (non-final) fragments during recognition.
    pub interim_results: bool,
    /// Arbitrary vocabulary vs a closed token set.
    pub free_text: bool,
    /// Provides per-result confidence scores.
    pub confidence_scores: bool,
    /// Restarts recognition automatically after silence.
    pub auto_restart: bool,
}

/// The contract both backend variants implement
///
/// Only one backend is active at a time; the manager enforces the
/// stop-before-switch rule.
#[async_trait]
pub trait SpeechBackend: Send + Sync + Debug {
    fn info(&self) -> BackendInfo;

    fn capabilities(&self) -> BackendCapabilities;

    /// Open the recognition source and begin pushing events into `sink`.
    /// Fails with `PermissionDenied` when the microphone is refused.
    async fn start(&mut self, sink: EventSink) -> Result<(), SpeechError>;

    /// Stop capturing. A no-op when the backend is idle. In-flight
    /// recognizer calls are cancelled; a final `SessionEnded` event is
    /// emitted before the sink is released.
    async fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Factory for creating speech backends
pub trait SpeechBackendFactory: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn create(&self) -> Result<Box<dyn SpeechBackend>, SpeechError>;
}

/// Registry of backend factories, keyed by variant
#[derive(Default)]
pub struct BackendRegistry {
    factories: Vec<Box<dyn SpeechBackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Box<dyn SpeechBackendFactory>) {
        self.factories.push(factory);
    }

    pub fn create(&self, kind: BackendKind) -> Result<Box<dyn SpeechBackend>, SpeechError> {
        self.factories
            .iter()
            .find(|f| f.kind() == kind)
            .ok_or_else(|| SpeechError::NotSupported {
                reason: format!("no factory registered for backend '{kind}'"),
            })?
            .create()
    }

    pub fn registered_kinds(&self) -> Vec<BackendKind> {
        self.factories.iter().map(|f| f.kind()).collect()
    }
}
