//! Engine runtime wiring
//!
//! Builds the pipeline from injected parts: backend registry (which
//! concrete recognition sources to use), collaborators (map surface,
//! geocoding/POI clients, layer registry, location provider), and the
//! engine settings. Multiple independent engines are safe to run
//! concurrently as long as they do not share a physical microphone.

use std::sync::Arc;

use voxmap_dispatch::collab::Collaborators;
use voxmap_dispatch::dispatcher::CommandDispatcher;
use voxmap_dispatch::log::CommandLog;
use voxmap_foundation::error::EngineError;
use voxmap_foundation::state::{EngineState, StateManager};
use voxmap_speech::backend::BackendRegistry;
use voxmap_speech::manager::BackendManager;
use voxmap_telemetry::EngineMetrics;

use crate::config::EngineSettings;
use crate::controller::VoiceSessionController;

pub struct EngineRuntime;

impl EngineRuntime {
    /// Assemble a controller from settings, a backend registry, and the
    /// collaborator set.
    pub fn build(
        settings: EngineSettings,
        registry: BackendRegistry,
        collaborators: Collaborators,
    ) -> Result<VoiceSessionController, EngineError> {
        settings.validate()?;

        let metrics = EngineMetrics::new();
        let state = Arc::new(StateManager::new());

        let manager = BackendManager::new(registry).with_metrics_sink(metrics.clone());

        let log = Arc::new(CommandLog::new(settings.command_log_capacity));
        let dispatcher =
            CommandDispatcher::new(log, collaborators).with_metrics_sink(metrics.clone());

        state.transition(EngineState::Ready)?;

        Ok(VoiceSessionController::new(
            settings, state, manager, dispatcher, metrics,
        ))
    }
}
