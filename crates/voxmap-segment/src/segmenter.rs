//! Pure utterance segmentation state machine
//!
//! Two states: `Idle` (no session) and `Accumulating` (session open,
//! buffering final fragments). Timer expiry arrives as an explicit
//! input, so every segmentation decision is data-in/data-out and the
//! flush guarantees are testable without real time.

use voxmap_speech::types::Fragment;

use crate::config::SegmenterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    Idle,
    Accumulating,
}

/// Where a finalized utterance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceSource {
    /// Free-text recognition, finalized by the silence timer or a flush.
    FreeText,
    /// A keyword-spotter token; already final, one word.
    Keyword,
}

/// A complete, silence-delimited segment of speech.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub source: UtteranceSource,
}

/// Effects requested by the state machine. The driver interprets
/// `ArmTimer`/`CancelTimer`; everything else flows downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutput {
    /// Live preview of a non-final fragment. Does not touch the timer.
    InterimPreview(String),
    /// Preview of the buffer after a final fragment was appended.
    AccumulatingPreview(String),
    /// A finalized utterance. Emitted exactly once per buffer content.
    Utterance(Utterance),
    /// (Re)arm the silence timer. Replaces any pending deadline:
    /// last-fragment-wins, the timer can never fire twice for the same
    /// buffer content.
    ArmTimer,
    CancelTimer,
    /// Ask the backend to stop (non-continuous session finalized).
    StopBackend,
    /// The recognition session closed.
    SessionEnded,
}

pub struct UtteranceSegmenter {
    state: SegmenterState,
    buffer: String,
    config: SegmenterConfig,
}

impl UtteranceSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            state: SegmenterState::Idle,
            buffer: String::new(),
            config,
        }
    }

    pub fn state(&self) -> SegmenterState {
        self.state
    }

    pub fn buffered_text(&self) -> &str {
        &self.buffer
    }

    pub fn on_session_start(&mut self) -> Vec<SegmentOutput> {
        self.state = SegmenterState::Accumulating;
        self.buffer.clear();
        vec![SegmentOutput::CancelTimer]
    }

    pub fn on_fragment(&mut self, fragment: Fragment) -> Vec<SegmentOutput> {
        if self.state == SegmenterState::Idle {
            // Fragment outside a session: a late recognizer callback
            // after teardown. Dropped.
            return Vec::new();
        }

        let text = fragment.text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        if fragment.is_final {
            if !self.buffer.is_empty() {
                self.buffer.push(' ');
            }
            self.buffer.push_str(text);
            vec![
                SegmentOutput::AccumulatingPreview(self.buffer.clone()),
                SegmentOutput::ArmTimer,
            ]
        } else {
            let preview = if self.buffer.is_empty() {
                text.to_string()
            } else {
                format!("{} {}", self.buffer, text)
            };
            vec![SegmentOutput::InterimPreview(preview)]
        }
    }

    /// The silence timer expired. Finalizes the buffer if non-empty.
    pub fn on_timer_fired(&mut self) -> Vec<SegmentOutput> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let mut outputs = vec![SegmentOutput::Utterance(self.take_utterance())];
        if !self.config.continuous {
            outputs.push(SegmentOutput::StopBackend);
        }
        outputs
    }

    /// The session closed (backend-initiated or external stop). Flushes
    /// any buffered text immediately: no utterance is silently dropped.
    /// Idempotent once Idle, so a close following an end event cannot
    /// duplicate the flush.
    pub fn on_session_end(&mut self) -> Vec<SegmentOutput> {
        if self.state == SegmenterState::Idle {
            return Vec::new();
        }
        self.state = SegmenterState::Idle;

        let mut outputs = vec![SegmentOutput::CancelTimer];
        if !self.buffer.is_empty() {
            outputs.push(SegmentOutput::Utterance(self.take_utterance()));
        }
        outputs.push(SegmentOutput::SessionEnded);
        outputs
    }

    fn take_utterance(&mut self) -> Utterance {
        let text = std::mem::take(&mut self.buffer);
        Utterance {
            text,
            source: UtteranceSource::FreeText,
        }
    }
}
