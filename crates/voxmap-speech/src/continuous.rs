//! Continuous (cloud) backend variant
//!
//! Wraps an injected `RecognitionSource` — the seam to the actual cloud
//! recognizer — and pumps its interim/final fragments into the event
//! sink. When a recognition cycle ends on prolonged silence and the
//! config asks for continuous capture, the source is reopened and the
//! next cycle starts without caller involvement.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use voxmap_telemetry::EngineMetrics;

use crate::backend::{BackendCapabilities, BackendInfo, SpeechBackend, SpeechError};
use crate::types::{BackendKind, EventSink, Fragment, RecognitionConfig, RecognitionEvent};

/// Seam to the cloud recognizer. One instance serves one recognition
/// cycle; `open` is called again to begin the next cycle.
#[async_trait]
pub trait RecognitionSource: Send + Debug {
    /// Request microphone access and open a recognition cycle.
    async fn open(&mut self) -> Result<(), SpeechError>;

    /// Next recognizer result. `Ok(None)` means the cycle ended after
    /// prolonged silence.
    async fn next_fragment(&mut self) -> Result<Option<Fragment>, SpeechError>;

    /// Release the microphone and any in-flight recognizer call.
    async fn close(&mut self);
}

pub struct ContinuousBackend<S, F>
where
    S: RecognitionSource + 'static,
    F: Fn() -> S + Send + Sync,
{
    config: RecognitionConfig,
    source_factory: F,
    task: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
    active: Arc<AtomicBool>,
    metrics: Option<EngineMetrics>,
}

impl<S, F> Debug for ContinuousBackend<S, F>
where
    S: RecognitionSource + 'static,
    F: Fn() -> S + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinuousBackend")
            .field("active", &self.active.load(Ordering::SeqCst))
            .field("continuous", &self.config.continuous)
            .finish()
    }
}

impl<S, F> ContinuousBackend<S, F>
where
    S: RecognitionSource + 'static,
    F: Fn() -> S + Send + Sync,
{
    pub fn new(config: RecognitionConfig, source_factory: F) -> Self {
        Self {
            config,
            source_factory,
            task: None,
            stop_tx: None,
            active: Arc::new(AtomicBool::new(false)),
            metrics: None,
        }
    }

    pub fn with_metrics_sink(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn pump(
        mut source: S,
        sink: EventSink,
        mut stop_rx: watch::Receiver<bool>,
        continuous: bool,
        active: Arc<AtomicBool>,
        metrics: Option<EngineMetrics>,
    ) {
        let _ = sink.send(RecognitionEvent::SessionStarted).await;

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    debug!(target: "speech", "Continuous backend stop requested");
                    source.close().await;
                    let _ = sink.send(RecognitionEvent::SessionEnded).await;
                    break;
                }
                result = source.next_fragment() => match result {
                    Ok(Some(fragment)) => {
                        if let Some(m) = &metrics {
                            if fragment.is_final {
                                m.fragments_final.fetch_add(1, Ordering::Relaxed);
                            } else {
                                m.fragments_interim.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        if sink.send(RecognitionEvent::Fragment(fragment)).await.is_err() {
                            debug!(target: "speech", "Event sink closed, stopping pump");
                            source.close().await;
                            break;
                        }
                    }
                    Ok(None) => {
                        // Cycle ended on prolonged silence.
                        let _ = sink.send(RecognitionEvent::SessionEnded).await;
                        if !continuous {
                            info!(target: "speech", "Recognition cycle ended (single-shot mode)");
                            source.close().await;
                            break;
                        }
                        match source.open().await {
                            Ok(()) => {
                                debug!(target: "speech", "Recognition cycle restarted");
                                let _ = sink.send(RecognitionEvent::SessionStarted).await;
                            }
                            Err(e) => {
                                warn!(target: "speech", "Failed to restart recognition: {e}");
                                let _ = sink
                                    .send(RecognitionEvent::Error {
                                        code: e.code().to_string(),
                                        message: e.to_string(),
                                    })
                                    .await;
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(target: "speech", "Recognizer error: {e}");
                        let _ = sink
                            .send(RecognitionEvent::Error {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            })
                            .await;
                        source.close().await;
                        let _ = sink.send(RecognitionEvent::SessionEnded).await;
                        break;
                    }
                }
            }
        }

        active.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S, F> SpeechBackend for ContinuousBackend<S, F>
where
    S: RecognitionSource + 'static,
    F: Fn() -> S + Send + Sync + 'static,
{
    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: BackendKind::Continuous,
            name: "Continuous cloud recognizer".to_string(),
            requires_network: true,
            is_local: false,
        }
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            interim_results: true,
            free_text: true,
            confidence_scores: false,
            auto_restart: self.config.continuous,
        }
    }

    async fn start(&mut self, sink: EventSink) -> Result<(), SpeechError> {
        if self.active.load(Ordering::SeqCst) {
            debug!(target: "speech", "Continuous backend already active, start is a no-op");
            return Ok(());
        }

        let mut source = (self.source_factory)();
        // Permission and availability failures surface here, before any
        // task is spawned.
        source.open().await?;

        let (stop_tx, stop_rx) = watch::channel(false);
        self.active.store(true, Ordering::SeqCst);

        let active = Arc::clone(&self.active);
        let continuous = self.config.continuous;
        let metrics = self.metrics.clone();
        self.task = Some(tokio::spawn(Self::pump(
            source, sink, stop_rx, continuous, active, metrics,
        )));
        self.stop_tx = Some(stop_tx);

        info!(target: "speech", "Continuous backend started (continuous={})", continuous);
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return; // never started, no-op
        };
        let _ = stop_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.active.store(false, Ordering::SeqCst);
        info!(target: "speech", "Continuous backend stopped");
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
