//! Scripted mock recognition sources for tests and the demo binary

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{SpeechBackendFactory, SpeechError};
use crate::continuous::{ContinuousBackend, RecognitionSource};
use crate::keyword::{
    Detection, KeywordBackend, KeywordModel, KeywordModelLoader, KeywordSpotter,
};
use crate::types::{BackendKind, Fragment, RecognitionConfig};

/// One step of a scripted recognition cycle.
#[derive(Debug, Clone)]
pub enum SourceStep {
    Fragment {
        text: String,
        is_final: bool,
        delay_ms: u64,
    },
    /// End the cycle, as a real recognizer does after prolonged silence.
    EndCycle,
    Fail {
        message: String,
    },
}

impl SourceStep {
    pub fn interim(text: &str) -> Self {
        SourceStep::Fragment {
            text: text.to_string(),
            is_final: false,
            delay_ms: 0,
        }
    }

    pub fn final_text(text: &str) -> Self {
        SourceStep::Fragment {
            text: text.to_string(),
            is_final: true,
            delay_ms: 0,
        }
    }
}

/// Scripted `RecognitionSource` for tests. Clones restart the script
/// from the beginning, so a factory can hand out fresh cycles.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    steps: VecDeque<SourceStep>,
    pub deny_permission: bool,
}

impl ScriptedSource {
    pub fn new(steps: Vec<SourceStep>) -> Self {
        Self {
            steps: steps.into(),
            deny_permission: false,
        }
    }

    pub fn denying_permission() -> Self {
        Self {
            steps: VecDeque::new(),
            deny_permission: true,
        }
    }
}

#[async_trait]
impl RecognitionSource for ScriptedSource {
    async fn open(&mut self) -> Result<(), SpeechError> {
        if self.deny_permission {
            return Err(SpeechError::PermissionDenied);
        }
        Ok(())
    }

    async fn next_fragment(&mut self) -> Result<Option<Fragment>, SpeechError> {
        match self.steps.pop_front() {
            Some(SourceStep::Fragment {
                text,
                is_final,
                delay_ms,
            }) => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(Some(Fragment { text, is_final }))
            }
            Some(SourceStep::EndCycle) => Ok(None),
            Some(SourceStep::Fail { message }) => Err(SpeechError::Aborted(message)),
            // Script exhausted: hang like a silent microphone until the
            // backend is stopped.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.steps.clear();
    }
}

/// Scripted `KeywordSpotter` emitting a fixed list of detections.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSpotter {
    detections: VecDeque<Detection>,
    pub deny_permission: bool,
}

impl ScriptedSpotter {
    pub fn new(detections: Vec<(&str, f32)>) -> Self {
        Self {
            detections: detections
                .into_iter()
                .map(|(word, confidence)| Detection {
                    word: word.to_string(),
                    confidence,
                })
                .collect(),
            deny_permission: false,
        }
    }
}

#[async_trait]
impl KeywordSpotter for ScriptedSpotter {
    async fn open(&mut self, _model: Arc<KeywordModel>) -> Result<(), SpeechError> {
        if self.deny_permission {
            return Err(SpeechError::PermissionDenied);
        }
        Ok(())
    }

    async fn next_detection(&mut self) -> Result<Option<Detection>, SpeechError> {
        match self.detections.pop_front() {
            Some(detection) => Ok(Some(detection)),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.detections.clear();
    }
}

/// Loader returning a canned vocabulary, or failing on demand to
/// exercise the continuous-fallback path.
pub struct StaticModelLoader {
    pub vocabulary: Vec<String>,
    pub fail_with: Option<String>,
}

impl StaticModelLoader {
    pub fn with_default_vocabulary() -> Self {
        Self {
            vocabulary: ["up", "down", "left", "right", "go", "stop", "yes", "no"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            vocabulary: Vec::new(),
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl KeywordModelLoader for StaticModelLoader {
    async fn load(&self, _path: &str) -> Result<KeywordModel, SpeechError> {
        if let Some(message) = &self.fail_with {
            return Err(SpeechError::ModelLoadFailed(message.clone()));
        }
        Ok(KeywordModel {
            name: "static-test-model".to_string(),
            vocabulary: self.vocabulary.clone(),
        })
    }
}

/// Factory producing continuous backends over a scripted source.
pub struct ScriptedContinuousFactory {
    config: RecognitionConfig,
    prototype: ScriptedSource,
}

impl ScriptedContinuousFactory {
    pub fn new(config: RecognitionConfig, prototype: ScriptedSource) -> Self {
        Self { config, prototype }
    }
}

impl SpeechBackendFactory for ScriptedContinuousFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Continuous
    }

    fn create(&self) -> Result<Box<dyn crate::backend::SpeechBackend>, SpeechError> {
        let prototype = self.prototype.clone();
        Ok(Box::new(ContinuousBackend::new(
            self.config.clone(),
            move || prototype.clone(),
        )))
    }
}

/// Factory producing keyword backends over a scripted spotter.
pub struct ScriptedKeywordFactory {
    config: RecognitionConfig,
    prototype: ScriptedSpotter,
    loader: Arc<dyn KeywordModelLoader>,
}

impl ScriptedKeywordFactory {
    pub fn new(
        config: RecognitionConfig,
        prototype: ScriptedSpotter,
        loader: Arc<dyn KeywordModelLoader>,
    ) -> Self {
        Self {
            config,
            prototype,
            loader,
        }
    }
}

impl SpeechBackendFactory for ScriptedKeywordFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Keyword
    }

    fn create(&self) -> Result<Box<dyn crate::backend::SpeechBackend>, SpeechError> {
        let prototype = self.prototype.clone();
        Ok(Box::new(KeywordBackend::new(
            self.config.clone(),
            move || prototype.clone(),
            Arc::clone(&self.loader),
        )))
    }
}
