//! Utterance segmentation for VoxMap
//!
//! Turns the stream of partial/final transcript fragments into complete
//! utterances using a trailing-silence timeout. The state machine itself
//! is pure (`segmenter`); the async `driver` owns the only real timer in
//! the engine and races it against incoming recognition events.

pub mod config;
pub mod driver;
pub mod segmenter;

pub use config::SegmenterConfig;
pub use driver::{SegmentDriver, SegmentEvent};
pub use segmenter::{SegmentOutput, SegmenterState, Utterance, UtteranceSegmenter, UtteranceSource};
