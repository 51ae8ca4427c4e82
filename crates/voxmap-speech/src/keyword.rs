//! On-device keyword-spotting backend variant
//!
//! Classifies short fixed-duration audio windows against a closed
//! vocabulary, entirely offline once the model is loaded. Detections
//! below the configured confidence threshold are discarded. The loaded
//! model is cached in memory for the process lifetime; reloads only
//! happen when the configured model path changes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use voxmap_telemetry::EngineMetrics;

use crate::backend::{BackendCapabilities, BackendInfo, SpeechBackend, SpeechError};
use crate::types::{BackendKind, EventSink, RecognitionConfig, RecognitionEvent};

/// A loaded keyword-spotting model.
#[derive(Debug)]
pub struct KeywordModel {
    pub name: String,
    /// The closed vocabulary this model can detect.
    pub vocabulary: Vec<String>,
}

/// Loads the on-device model from disk (or wherever the host keeps it).
#[async_trait]
pub trait KeywordModelLoader: Send + Sync {
    async fn load(&self, path: &str) -> Result<KeywordModel, SpeechError>;
}

/// A single classification result for one audio window.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub word: String,
    pub confidence: f32,
}

/// Seam to the audio-window classifier.
#[async_trait]
pub trait KeywordSpotter: Send + Debug {
    /// Request microphone access and begin classifying windows.
    async fn open(&mut self, model: Arc<KeywordModel>) -> Result<(), SpeechError>;

    /// Next classified window. `Ok(None)` means the spotter shut down.
    async fn next_detection(&mut self) -> Result<Option<Detection>, SpeechError>;

    async fn close(&mut self);
}

// Process-lifetime model cache, keyed by model path.
static MODEL_CACHE: Mutex<Option<(String, Arc<KeywordModel>)>> = Mutex::new(None);

async fn cached_or_load(
    loader: &dyn KeywordModelLoader,
    path: &str,
) -> Result<Arc<KeywordModel>, SpeechError> {
    if let Some((cached_path, model)) = MODEL_CACHE.lock().as_ref() {
        if cached_path == path {
            debug!(target: "speech", "Keyword model cache hit: {path}");
            return Ok(Arc::clone(model));
        }
    }

    info!(target: "speech", "Loading keyword model from {path}");
    let model = Arc::new(loader.load(path).await?);
    *MODEL_CACHE.lock() = Some((path.to_string(), Arc::clone(&model)));
    info!(
        target: "speech",
        "Keyword model '{}' loaded ({} words)",
        model.name,
        model.vocabulary.len()
    );
    Ok(model)
}

pub struct KeywordBackend<Sp, F>
where
    Sp: KeywordSpotter + 'static,
    F: Fn() -> Sp + Send + Sync,
{
    config: RecognitionConfig,
    spotter_factory: F,
    loader: Arc<dyn KeywordModelLoader>,
    task: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
    active: Arc<AtomicBool>,
    metrics: Option<EngineMetrics>,
}

impl<Sp, F> Debug for KeywordBackend<Sp, F>
where
    Sp: KeywordSpotter + 'static,
    F: Fn() -> Sp + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordBackend")
            .field("active", &self.active.load(Ordering::SeqCst))
            .field("threshold", &self.config.confidence_threshold)
            .finish()
    }
}

impl<Sp, F> KeywordBackend<Sp, F>
where
    Sp: KeywordSpotter + 'static,
    F: Fn() -> Sp + Send + Sync,
{
    pub fn new(
        config: RecognitionConfig,
        spotter_factory: F,
        loader: Arc<dyn KeywordModelLoader>,
    ) -> Self {
        Self {
            config,
            spotter_factory,
            loader,
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
        mut spotter: Sp,
        sink: EventSink,
        mut stop_rx: watch::Receiver<bool>,
        threshold: f32,
        active: Arc<AtomicBool>,
        metrics: Option<EngineMetrics>,
    ) {
        let _ = sink.send(RecognitionEvent::SessionStarted).await;

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    debug!(target: "speech", "Keyword backend stop requested");
                    spotter.close().await;
                    let _ = sink.send(RecognitionEvent::SessionEnded).await;
                    break;
                }
                result = spotter.next_detection() => match result {
                    Ok(Some(detection)) => {
                        if detection.confidence < threshold {
                            debug!(
                                target: "speech",
                                "Discarding '{}' below threshold ({:.2} < {:.2})",
                                detection.word, detection.confidence, threshold
                            );
                            if let Some(m) = &metrics {
                                m.tokens_discarded.fetch_add(1, Ordering::Relaxed);
                            }
                            continue;
                        }
                        if let Some(m) = &metrics {
                            m.tokens_accepted.fetch_add(1, Ordering::Relaxed);
                        }
                        let event = RecognitionEvent::Token {
                            word: detection.word,
                            confidence: detection.confidence,
                        };
                        if sink.send(event).await.is_err() {
                            debug!(target: "speech", "Event sink closed, stopping pump");
                            spotter.close().await;
                            break;
                        }
                    }
                    Ok(None) => {
                        info!(target: "speech", "Keyword spotter shut down");
                        spotter.close().await;
                        let _ = sink.send(RecognitionEvent::SessionEnded).await;
                        break;
                    }
                    Err(e) => {
                        warn!(target: "speech", "Keyword spotter error: {e}");
                        let _ = sink
                            .send(RecognitionEvent::Error {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            })
                            .await;
                        spotter.close().await;
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
impl<Sp, F> SpeechBackend for KeywordBackend<Sp, F>
where
    Sp: KeywordSpotter + 'static,
    F: Fn() -> Sp + Send + Sync + 'static,
{
    fn info(&self) -> BackendInfo {
        BackendInfo {
            kind: BackendKind::Keyword,
            name: "On-device keyword spotter".to_string(),
            requires_network: false,
            is_local: true,
        }
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            interim_results: false,
            free_text: false,
            confidence_scores: true,
            auto_restart: false,
        }
    }

    async fn start(&mut self, sink: EventSink) -> Result<(), SpeechError> {
        if self.active.load(Ordering::SeqCst) {
            debug!(target: "speech", "Keyword backend already active, start is a no-op");
            return Ok(());
        }

        // Lazy model load; cached for the process lifetime. Failure here
        // is what the manager falls back to the continuous variant on.
        let model = cached_or_load(self.loader.as_ref(), &self.config.model_path).await?;

        let mut spotter = (self.spotter_factory)();
        spotter.open(model).await?;

        let (stop_tx, stop_rx) = watch::channel(false);
        self.active.store(true, Ordering::SeqCst);

        let active = Arc::clone(&self.active);
        let threshold = self.config.confidence_threshold;
        let metrics = self.metrics.clone();
        self.task = Some(tokio::spawn(Self::pump(
            spotter, sink, stop_rx, threshold, active, metrics,
        )));
        self.stop_tx = Some(stop_tx);

        info!(
            target: "speech",
            "Keyword backend started (threshold={:.2})",
            threshold
        );
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        let _ = stop_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.active.store(false, Ordering::SeqCst);
        info!(target: "speech", "Keyword backend stopped");
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
