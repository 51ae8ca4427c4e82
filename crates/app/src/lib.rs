//! VoxMap voice command engine — session façade
//!
//! Wires the pipeline (backend manager → segmenter → intent parser →
//! dispatcher) behind the `VoiceSessionController` the host embeds.

pub mod config;
pub mod controller;
pub mod runtime;

pub use config::EngineSettings;
pub use controller::{TranscriptEvent, VoiceSessionController};
pub use runtime::EngineRuntime;
