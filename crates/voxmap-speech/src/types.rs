//! Core types for the recognition event stream

use serde::{Deserialize, Serialize};

/// A single recognizer result within one recognition cycle.
///
/// Ephemeral: consumed immediately by the segmenter, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    /// Final fragments extend the utterance buffer; interim ones only
    /// update the live preview.
    pub is_final: bool,
}

impl Fragment {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Events emitted by a speech backend into the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// A recognition cycle opened (microphone live).
    SessionStarted,
    /// Free-text recognizer output (continuous backend).
    Fragment(Fragment),
    /// Closed-vocabulary detection at or above the confidence threshold
    /// (keyword backend).
    Token { word: String, confidence: f32 },
    /// The recognition cycle ended (prolonged silence or external stop).
    SessionEnded,
    /// Backend-level error. Never produces a command log entry.
    Error { code: String, message: String },
}

/// Channel half a backend pushes recognition events into.
pub type EventSink = tokio::sync::mpsc::Sender<RecognitionEvent>;

/// Identifies one of the two mutually exclusive backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Cloud-backed continuous recognizer with arbitrary vocabulary.
    Continuous,
    /// On-device keyword spotter over a closed vocabulary.
    Keyword,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Continuous => "continuous",
            BackendKind::Keyword => "keyword",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognition configuration shared by both backend variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Restart the recognizer automatically when a cycle ends on silence.
    pub continuous: bool,
    /// Recognition language (BCP 47 tag).
    pub language: String,
    /// Minimum confidence for keyword detections (keyword backend only).
    pub confidence_threshold: f32,
    /// Path to the on-device keyword model.
    pub model_path: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            language: "en-US".to_string(),
            confidence_threshold: 0.80,
            model_path: "models/keyword-spotter".to_string(),
        }
    }
}
