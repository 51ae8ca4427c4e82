//! Engine settings
//!
//! Loaded from an optional `voxmap.toml` next to the binary plus
//! `VOXMAP_*` environment overrides. Every field has a validated
//! default so a bare environment works out of the box.

use serde::{Deserialize, Serialize};

use voxmap_foundation::error::EngineError;
use voxmap_segment::SegmenterConfig;
use voxmap_speech::types::{BackendKind, RecognitionConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Trailing silence before an utterance finalizes.
    pub silence_timeout_ms: u64,
    /// Bounded command log capacity.
    pub command_log_capacity: usize,
    /// Minimum confidence for keyword detections.
    pub confidence_threshold: f32,
    /// Auto-restart recognition cycles after silence.
    pub continuous: bool,
    pub default_backend: BackendKind,
    /// How long a session-level error stays visible before auto-clear.
    pub error_clear_delay_ms: u64,
    pub language: String,
    pub model_path: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            silence_timeout_ms: 1500,
            command_log_capacity: 50,
            confidence_threshold: 0.80,
            continuous: true,
            default_backend: BackendKind::Continuous,
            error_clear_delay_ms: 4000,
            language: "en-US".to_string(),
            model_path: "models/keyword-spotter".to_string(),
        }
    }
}

impl EngineSettings {
    /// Load from `voxmap.toml` (optional) and `VOXMAP_*` env overrides.
    pub fn load() -> Result<Self, EngineError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name("voxmap").required(false))
            .add_source(config::Environment::with_prefix("VOXMAP"))
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let settings: EngineSettings = cfg
            .try_deserialize()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.silence_timeout_ms < 100 {
            return Err(EngineError::Config(
                "silence_timeout_ms must be at least 100".to_string(),
            ));
        }
        if self.command_log_capacity == 0 {
            return Err(EngineError::Config(
                "command_log_capacity must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(EngineError::Config(format!(
                "confidence_threshold {} is not within 0.0-1.0",
                self.confidence_threshold
            )));
        }
        Ok(())
    }

    pub fn recognition_config(&self) -> RecognitionConfig {
        RecognitionConfig {
            continuous: self.continuous,
            language: self.language.clone(),
            confidence_threshold: self.confidence_threshold,
            model_path: self.model_path.clone(),
        }
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            silence_timeout_ms: self.silence_timeout_ms,
            continuous: self.continuous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = EngineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.silence_timeout_ms, 1500);
        assert_eq!(settings.default_backend, BackendKind::Continuous);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let settings = EngineSettings {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let settings = EngineSettings {
            command_log_capacity: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
