//! Backend manager
//!
//! Owns at most one active backend. Switching stops the active variant
//! before the target is initialized; a keyword model-load failure falls
//! back to the continuous variant and is reported on the event stream as
//! a non-fatal error.

use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

use voxmap_telemetry::EngineMetrics;

use crate::backend::{BackendRegistry, SpeechBackend, SpeechError};
use crate::types::{BackendKind, EventSink, RecognitionEvent};

pub struct BackendManager {
    registry: BackendRegistry,
    active: Option<(BackendKind, Box<dyn SpeechBackend>)>,
    metrics: Option<EngineMetrics>,
}

impl BackendManager {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry,
            active: None,
            metrics: None,
        }
    }

    pub fn with_metrics_sink(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn active_kind(&self) -> Option<BackendKind> {
        self.active
            .as_ref()
            .filter(|(_, b)| b.is_active())
            .map(|(k, _)| *k)
    }

    pub fn is_listening(&self) -> bool {
        self.active_kind().is_some()
    }

    /// Start capturing with the requested variant. Idempotent: starting
    /// while a backend is already active is a no-op returning the active
    /// kind. When the keyword variant cannot initialize (model load
    /// failure, unsupported), falls back to the continuous variant and
    /// reports the failure on the event stream.
    pub async fn start(
        &mut self,
        kind: BackendKind,
        sink: EventSink,
    ) -> Result<BackendKind, SpeechError> {
        if let Some(active) = self.active_kind() {
            debug!(target: "speech", "start while '{active}' is listening is a no-op");
            return Ok(active);
        }

        match self.try_start(kind, sink.clone()).await {
            Ok(()) => Ok(kind),
            Err(e) if kind == BackendKind::Keyword && e.is_fallback_worthy() => {
                warn!(
                    target: "speech",
                    "Keyword backend failed to start ({e}), falling back to continuous"
                );
                if let Some(m) = &self.metrics {
                    m.model_load_failures.fetch_add(1, Ordering::Relaxed);
                }
                // Non-fatal: report on the event stream, then bring up
                // the continuous variant.
                let _ = sink
                    .send(RecognitionEvent::Error {
                        code: e.code().to_string(),
                        message: format!("{e}; using continuous recognition instead"),
                    })
                    .await;
                self.try_start(BackendKind::Continuous, sink).await?;
                Ok(BackendKind::Continuous)
            }
            Err(e) => Err(e),
        }
    }

    async fn try_start(&mut self, kind: BackendKind, sink: EventSink) -> Result<(), SpeechError> {
        let mut backend = self.registry.create(kind)?;
        backend.start(sink).await?;
        self.active = Some((kind, backend));
        info!(target: "speech", "Backend '{kind}' is listening");
        Ok(())
    }

    /// Stop the active backend. No-op when idle. Buffered utterance
    /// flushing happens downstream in the segmenter, which observes the
    /// backend's final `SessionEnded` event.
    pub async fn stop(&mut self) {
        if let Some((kind, mut backend)) = self.active.take() {
            backend.stop().await;
            info!(target: "speech", "Backend '{kind}' stopped");
        }
    }

    /// Switch variants: always stops the active backend first, then
    /// initializes the target with the provided sink.
    pub async fn switch(
        &mut self,
        target: BackendKind,
        sink: EventSink,
    ) -> Result<BackendKind, SpeechError> {
        self.stop().await;
        if let Some(m) = &self.metrics {
            m.backend_switches.fetch_add(1, Ordering::Relaxed);
        }
        self.start(target, sink).await
    }
}

impl SpeechError {
    /// Failures that justify falling back to the continuous variant
    /// rather than refusing to listen at all. Permission denial is
    /// excluded: no variant can capture without the microphone.
    fn is_fallback_worthy(&self) -> bool {
        matches!(
            self,
            SpeechError::ModelLoadFailed(_)
                | SpeechError::BackendUnavailable(_)
                | SpeechError::NotSupported { .. }
        )
    }
}
