//! Async segmentation driver
//!
//! Owns the engine's only real timer: the trailing-silence deadline,
//! raced against incoming recognition events with `tokio::select!`. The
//! deadline is re-armed on every final fragment (last-fragment-wins) and
//! cleared whenever the state machine says so, so a stale timer can
//! never fire after teardown: the loop exits before the deadline could
//! be polled again.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use voxmap_speech::types::RecognitionEvent;
use voxmap_telemetry::EngineMetrics;

use crate::config::SegmenterConfig;
use crate::segmenter::{SegmentOutput, Utterance, UtteranceSegmenter, UtteranceSource};

/// Events the driver emits downstream to the session controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    /// Live preview of in-progress recognition (non-final fragment).
    InterimTranscript(String),
    /// Preview of the accumulated buffer (final fragment appended).
    AccumulatingTranscript(String),
    /// A finalized utterance, ready for intent parsing.
    Utterance(Utterance),
    /// A non-continuous session finalized; the backend should stop.
    StopBackendRequested,
    /// The recognition session closed.
    SessionEnded,
    /// Backend-level error forwarded off the recognition stream.
    BackendError { code: String, message: String },
}

pub struct SegmentDriver {
    events_rx: mpsc::Receiver<RecognitionEvent>,
    out_tx: mpsc::Sender<SegmentEvent>,
    machine: UtteranceSegmenter,
    config: SegmenterConfig,
    metrics: Option<EngineMetrics>,
}

impl SegmentDriver {
    pub fn new(
        events_rx: mpsc::Receiver<RecognitionEvent>,
        out_tx: mpsc::Sender<SegmentEvent>,
        config: SegmenterConfig,
    ) -> Self {
        Self {
            events_rx,
            out_tx,
            machine: UtteranceSegmenter::new(config.clone()),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics_sink(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let timeout = Duration::from_millis(self.config.silence_timeout_ms);
        let mut deadline: Option<Instant> = None;

        info!(
            target: "segment",
            "Segment driver started (silence timeout {}ms)",
            self.config.silence_timeout_ms
        );

        loop {
            tokio::select! {
                maybe_event = self.events_rx.recv() => match maybe_event {
                    Some(event) => {
                        let (outputs, flushing) = self.handle_event(event).await;
                        if !self.apply(outputs, &mut deadline, timeout, flushing).await {
                            break;
                        }
                    }
                    None => {
                        // Session torn down: flush whatever is buffered
                        // before exiting. Idempotent if an end event
                        // already drained the buffer.
                        debug!(target: "segment", "Event channel closed, flushing");
                        let outputs = self.machine.on_session_end();
                        self.apply(outputs, &mut deadline, timeout, true).await;
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    let outputs = self.machine.on_timer_fired();
                    if !self.apply(outputs, &mut deadline, timeout, false).await {
                        break;
                    }
                }
            }
        }

        info!(target: "segment", "Segment driver stopped");
    }

    /// Translate one recognition event into state-machine outputs. The
    /// bool marks flush-path utterances for the metrics counter.
    async fn handle_event(&mut self, event: RecognitionEvent) -> (Vec<SegmentOutput>, bool) {
        match event {
            RecognitionEvent::SessionStarted => (self.machine.on_session_start(), false),
            RecognitionEvent::Fragment(fragment) => (self.machine.on_fragment(fragment), false),
            RecognitionEvent::Token { word, confidence } => {
                // Keyword detections bypass segmentation: each accepted
                // token is an already-final one-word utterance.
                debug!(target: "segment", "Token '{word}' ({confidence:.2}) bypasses segmentation");
                (
                    vec![SegmentOutput::Utterance(Utterance {
                        text: word,
                        source: UtteranceSource::Keyword,
                    })],
                    false,
                )
            }
            RecognitionEvent::SessionEnded => (self.machine.on_session_end(), true),
            RecognitionEvent::Error { code, message } => {
                let _ = self
                    .out_tx
                    .send(SegmentEvent::BackendError { code, message })
                    .await;
                (Vec::new(), false)
            }
        }
    }

    /// Interpret outputs: timer effects mutate the deadline, everything
    /// else is forwarded. Returns false once the downstream is gone.
    async fn apply(
        &self,
        outputs: Vec<SegmentOutput>,
        deadline: &mut Option<Instant>,
        timeout: Duration,
        flushing: bool,
    ) -> bool {
        for output in outputs {
            let event = match output {
                SegmentOutput::ArmTimer => {
                    *deadline = Some(Instant::now() + timeout);
                    if let Some(m) = &self.metrics {
                        m.timer_rearms.fetch_add(1, Ordering::Relaxed);
                    }
                    continue;
                }
                SegmentOutput::CancelTimer => {
                    *deadline = None;
                    continue;
                }
                SegmentOutput::InterimPreview(text) => SegmentEvent::InterimTranscript(text),
                SegmentOutput::AccumulatingPreview(text) => {
                    SegmentEvent::AccumulatingTranscript(text)
                }
                SegmentOutput::Utterance(utterance) => {
                    if let Some(m) = &self.metrics {
                        m.record_utterance();
                        if flushing {
                            m.utterances_flushed_on_stop.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    info!(target: "segment", "Utterance finalized: \"{}\"", utterance.text);
                    SegmentEvent::Utterance(utterance)
                }
                SegmentOutput::StopBackend => SegmentEvent::StopBackendRequested,
                SegmentOutput::SessionEnded => SegmentEvent::SessionEnded,
            };
            if self.out_tx.send(event).await.is_err() {
                debug!(target: "segment", "Downstream closed");
                return false;
            }
        }
        true
    }
}
