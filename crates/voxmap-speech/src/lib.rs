//! Speech recognition backend abstraction for VoxMap
//!
//! This crate provides the adapter layer over the two interchangeable
//! recognition backends: the continuous (cloud) recognizer and the
//! on-device keyword spotter. Both implement the same `SpeechBackend`
//! contract and feed `RecognitionEvent`s into the pipeline.

pub mod backend;
pub mod continuous;
pub mod keyword;
pub mod manager;
pub mod mock;
pub mod types;

pub use backend::{
    BackendCapabilities, BackendInfo, BackendRegistry, SpeechBackend, SpeechBackendFactory,
    SpeechError,
};
pub use manager::BackendManager;
pub use types::{BackendKind, EventSink, Fragment, RecognitionConfig, RecognitionEvent};
