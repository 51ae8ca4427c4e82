//! Voice session controller
//!
//! The façade the host embeds: start/stop listening, switch backends,
//! submit typed commands, subscribe to transcript previews, command
//! status changes, and session-level errors. The manual path feeds the
//! same parser and dispatcher as the spoken path, so identical text
//! yields identical intents either way.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use voxmap_dispatch::dispatcher::{CommandDispatcher, CommandEvent};
use voxmap_dispatch::record::{CommandRecord, CommandSource};
use voxmap_foundation::error::SessionError;
use voxmap_foundation::state::{EngineState, StateManager};
use voxmap_intent::{token_intent, IntentParser};
use voxmap_segment::driver::{SegmentDriver, SegmentEvent};
use voxmap_segment::segmenter::UtteranceSource;
use voxmap_speech::manager::BackendManager;
use voxmap_speech::types::{BackendKind, RecognitionEvent};
use voxmap_telemetry::{engine_metrics::MetricsSnapshot, EngineMetrics};

use crate::config::EngineSettings;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Live transcript previews and finalized utterances.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    /// Non-final recognizer output; display-only.
    Interim(String),
    /// The utterance buffer after a final fragment arrived.
    Accumulating(String),
    /// A finalized utterance, on its way to the parser.
    Finalized(String),
}

pub struct VoiceSessionController {
    settings: EngineSettings,
    state: Arc<StateManager>,
    manager: Arc<tokio::sync::Mutex<BackendManager>>,
    dispatcher: CommandDispatcher,
    parser: Arc<IntentParser>,
    metrics: EngineMetrics,
    transcript_tx: broadcast::Sender<TranscriptEvent>,
    error_tx: broadcast::Sender<SessionError>,
    last_error: Arc<RwLock<Option<SessionError>>>,
    preferred_backend: Arc<RwLock<BackendKind>>,
    route_task: Mutex<Option<JoinHandle<()>>>,
}

/// Everything the routing task needs, cloneable into the spawned loop.
#[derive(Clone)]
struct RouteCtx {
    dispatcher: CommandDispatcher,
    parser: Arc<IntentParser>,
    manager: Arc<tokio::sync::Mutex<BackendManager>>,
    state: Arc<StateManager>,
    metrics: EngineMetrics,
    transcript_tx: broadcast::Sender<TranscriptEvent>,
    error_tx: broadcast::Sender<SessionError>,
    last_error: Arc<RwLock<Option<SessionError>>>,
    error_clear_delay: Duration,
}

impl VoiceSessionController {
    pub(crate) fn new(
        settings: EngineSettings,
        state: Arc<StateManager>,
        manager: BackendManager,
        dispatcher: CommandDispatcher,
        metrics: EngineMetrics,
    ) -> Self {
        let (transcript_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (error_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let preferred_backend = Arc::new(RwLock::new(settings.default_backend));
        Self {
            settings,
            state,
            manager: Arc::new(tokio::sync::Mutex::new(manager)),
            dispatcher,
            parser: Arc::new(IntentParser::new()),
            metrics,
            transcript_tx,
            error_tx,
            last_error: Arc::new(RwLock::new(None)),
            preferred_backend,
            route_task: Mutex::new(None),
        }
    }

    // ─── Listening lifecycle ────────────────────────────────────────

    /// Begin capturing with the preferred backend. Idempotent: calling
    /// while already listening is a no-op, not an error.
    pub async fn start_listening(&self) -> Result<(), SessionError> {
        if self.state.is_listening() {
            debug!(target: "session", "start_listening while listening is a no-op");
            return Ok(());
        }

        let kind = *self.preferred_backend.read();
        let (events_tx, events_rx) = mpsc::channel::<RecognitionEvent>(EVENT_CHANNEL_CAPACITY);

        let started = {
            let mut manager = self.manager.lock().await;
            manager.start(kind, events_tx).await
        };
        let actual = match started {
            Ok(actual) => actual,
            Err(e) => {
                let session_err = e.to_session_error();
                warn!(target: "session", "Failed to start listening: {session_err}");
                self.publish_error(session_err.clone());
                return Err(session_err);
            }
        };

        self.attach_pipeline(actual, events_rx);
        Ok(())
    }

    /// Stop capturing. Flushes any buffered-but-unfinalized utterance
    /// (never drops user speech) and cancels in-flight backend calls.
    /// Already-dispatched command handlers run to completion and still
    /// update the log.
    pub async fn stop_listening(&self) {
        if !self.state.is_listening() {
            debug!(target: "session", "stop_listening while idle is a no-op");
            return;
        }

        {
            let mut manager = self.manager.lock().await;
            manager.stop().await;
        }
        // The backend's final SessionEnded event ran the segmenter's
        // flush; once its channel drains, the routing task exits.
        let task = self.route_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        let _ = self.state.transition(EngineState::Ready);
        info!(target: "session", "Stopped listening");
    }

    /// Switch recognition variants. Stops the active backend first,
    /// then initializes the target; when idle, only the preference
    /// changes.
    pub async fn switch_backend(&self, target: BackendKind) -> Result<(), SessionError> {
        *self.preferred_backend.write() = target;
        if !self.state.is_listening() {
            info!(target: "session", "Preferred backend set to '{target}'");
            return Ok(());
        }

        let (events_tx, events_rx) = mpsc::channel::<RecognitionEvent>(EVENT_CHANNEL_CAPACITY);
        let switched = {
            let mut manager = self.manager.lock().await;
            manager.switch(target, events_tx).await
        };
        match switched {
            Ok(actual) => {
                // The previous routing task winds down on its own as its
                // channels drain.
                self.attach_pipeline(actual, events_rx);
                Ok(())
            }
            Err(e) => {
                let session_err = e.to_session_error();
                self.publish_error(session_err.clone());
                let _ = self.state.transition(EngineState::Ready);
                Err(session_err)
            }
        }
    }

    /// Feed typed text straight into the parser and dispatcher,
    /// bypassing the backend and segmenter. Produces the same intent as
    /// the spoken path for identical text.
    pub fn submit_manual_command(&self, text: &str) -> u64 {
        let intent = self.parser.parse(text);
        self.dispatcher.dispatch(intent, text, CommandSource::Manual)
    }

    // ─── Observers ──────────────────────────────────────────────────

    pub fn transcript_events(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.transcript_tx.subscribe()
    }

    pub fn command_events(&self) -> broadcast::Receiver<CommandEvent> {
        self.dispatcher.subscribe()
    }

    pub fn session_errors(&self) -> broadcast::Receiver<SessionError> {
        self.error_tx.subscribe()
    }

    /// The UI-visible session error, auto-cleared after a short delay.
    pub fn last_error(&self) -> Option<SessionError> {
        self.last_error.read().clone()
    }

    pub fn command_log(&self) -> Vec<CommandRecord> {
        self.dispatcher.log().snapshot()
    }

    pub fn is_listening(&self) -> bool {
        self.state.is_listening()
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        match self.state.current() {
            EngineState::Listening { backend } => match backend.as_str() {
                "keyword" => Some(BackendKind::Keyword),
                _ => Some(BackendKind::Continuous),
            },
            _ => None,
        }
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn attach_pipeline(
        &self,
        backend: BackendKind,
        events_rx: mpsc::Receiver<RecognitionEvent>,
    ) {
        let (segment_tx, segment_rx) = mpsc::channel::<SegmentEvent>(EVENT_CHANNEL_CAPACITY);
        SegmentDriver::new(events_rx, segment_tx, self.settings.segmenter_config())
            .with_metrics_sink(self.metrics.clone())
            .spawn();

        let ctx = RouteCtx {
            dispatcher: self.dispatcher.clone(),
            parser: Arc::clone(&self.parser),
            manager: Arc::clone(&self.manager),
            state: Arc::clone(&self.state),
            metrics: self.metrics.clone(),
            transcript_tx: self.transcript_tx.clone(),
            error_tx: self.error_tx.clone(),
            last_error: Arc::clone(&self.last_error),
            error_clear_delay: Duration::from_millis(self.settings.error_clear_delay_ms),
        };
        let task = tokio::spawn(route_segments(ctx, segment_rx));
        if let Some(previous) = self.route_task.lock().replace(task) {
            // Superseded by a backend switch; it exits as its channel
            // drains.
            drop(previous);
        }

        let _ = self.state.transition(EngineState::Listening {
            backend: backend.to_string(),
        });
        info!(target: "session", "Listening via '{backend}'");
    }

    fn publish_error(&self, error: SessionError) {
        self.metrics.session_errors.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write() = Some(error.clone());
        let _ = self.error_tx.send(error);

        let last_error = Arc::clone(&self.last_error);
        let delay = Duration::from_millis(self.settings.error_clear_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            *last_error.write() = None;
        });
    }
}

/// Consume segment events: previews fan out to observers, utterances
/// become commands, backend errors land on the session error channel.
async fn route_segments(ctx: RouteCtx, mut segment_rx: mpsc::Receiver<SegmentEvent>) {
    while let Some(event) = segment_rx.recv().await {
        match event {
            SegmentEvent::InterimTranscript(text) => {
                let _ = ctx.transcript_tx.send(TranscriptEvent::Interim(text));
            }
            SegmentEvent::AccumulatingTranscript(text) => {
                let _ = ctx.transcript_tx.send(TranscriptEvent::Accumulating(text));
            }
            SegmentEvent::Utterance(utterance) => {
                let _ = ctx
                    .transcript_tx
                    .send(TranscriptEvent::Finalized(utterance.text.clone()));
                let (intent, source) = match utterance.source {
                    UtteranceSource::FreeText => {
                        (ctx.parser.parse(&utterance.text), CommandSource::Voice)
                    }
                    UtteranceSource::Keyword => {
                        (token_intent(&utterance.text), CommandSource::Keyword)
                    }
                };
                ctx.dispatcher.dispatch(intent, &utterance.text, source);
            }
            SegmentEvent::StopBackendRequested => {
                let mut manager = ctx.manager.lock().await;
                manager.stop().await;
                drop(manager);
                let _ = ctx.state.transition(EngineState::Ready);
                info!(target: "session", "Backend stopped after single-shot utterance");
            }
            SegmentEvent::SessionEnded => {
                debug!(target: "session", "Recognition cycle closed");
            }
            SegmentEvent::BackendError { code, message } => {
                ctx.metrics.session_errors.fetch_add(1, Ordering::Relaxed);
                let error = session_error_from_code(&code, &message);
                warn!(target: "session", "Backend error [{code}]: {message}");
                *ctx.last_error.write() = Some(error.clone());
                let _ = ctx.error_tx.send(error);

                let last_error = Arc::clone(&ctx.last_error);
                let delay = ctx.error_clear_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    *last_error.write() = None;
                });
            }
        }
    }
    debug!(target: "session", "Routing task finished");
}

fn session_error_from_code(code: &str, message: &str) -> SessionError {
    match code {
        "permission_denied" => SessionError::PermissionDenied,
        "no_speech" => SessionError::NoSpeechDetected,
        "aborted" => SessionError::RecognitionAborted {
            reason: message.to_string(),
        },
        _ => SessionError::BackendUnavailable {
            reason: message.to_string(),
        },
    }
}
