use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared metrics for cross-task engine monitoring
#[derive(Clone)]
pub struct EngineMetrics {
    // Recognition stage
    pub fragments_interim: Arc<AtomicU64>,
    pub fragments_final: Arc<AtomicU64>,
    pub tokens_accepted: Arc<AtomicU64>,
    pub tokens_discarded: Arc<AtomicU64>, // below confidence threshold

    // Segmentation stage
    pub utterances_finalized: Arc<AtomicU64>,
    pub utterances_flushed_on_stop: Arc<AtomicU64>,
    pub timer_rearms: Arc<AtomicU64>,

    // Dispatch stage
    pub commands_dispatched: Arc<AtomicU64>,
    pub commands_completed: Arc<AtomicU64>,
    pub commands_failed: Arc<AtomicU64>,
    pub commands_evicted: Arc<AtomicU64>,
    pub log_depth: Arc<AtomicUsize>,
    pub last_dispatch_latency_ms: Arc<AtomicU64>,

    // Backend lifecycle
    pub backend_switches: Arc<AtomicU64>,
    pub model_load_failures: Arc<AtomicU64>,
    pub session_errors: Arc<AtomicU64>,

    // Activity indicators
    pub last_utterance_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self {
            fragments_interim: Arc::new(AtomicU64::new(0)),
            fragments_final: Arc::new(AtomicU64::new(0)),
            tokens_accepted: Arc::new(AtomicU64::new(0)),
            tokens_discarded: Arc::new(AtomicU64::new(0)),
            utterances_finalized: Arc::new(AtomicU64::new(0)),
            utterances_flushed_on_stop: Arc::new(AtomicU64::new(0)),
            timer_rearms: Arc::new(AtomicU64::new(0)),
            commands_dispatched: Arc::new(AtomicU64::new(0)),
            commands_completed: Arc::new(AtomicU64::new(0)),
            commands_failed: Arc::new(AtomicU64::new(0)),
            commands_evicted: Arc::new(AtomicU64::new(0)),
            log_depth: Arc::new(AtomicUsize::new(0)),
            last_dispatch_latency_ms: Arc::new(AtomicU64::new(0)),
            backend_switches: Arc::new(AtomicU64::new(0)),
            model_load_failures: Arc::new(AtomicU64::new(0)),
            session_errors: Arc::new(AtomicU64::new(0)),
            last_utterance_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_utterance(&self) {
        self.utterances_finalized.fetch_add(1, Ordering::Relaxed);
        *self.last_utterance_time.write() = Some(Instant::now());
    }

    pub fn record_dispatch_latency(&self, ms: u64) {
        self.last_dispatch_latency_ms.store(ms, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of the counters, for status displays.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fragments_interim: self.fragments_interim.load(Ordering::Relaxed),
            fragments_final: self.fragments_final.load(Ordering::Relaxed),
            tokens_accepted: self.tokens_accepted.load(Ordering::Relaxed),
            tokens_discarded: self.tokens_discarded.load(Ordering::Relaxed),
            utterances_finalized: self.utterances_finalized.load(Ordering::Relaxed),
            utterances_flushed_on_stop: self.utterances_flushed_on_stop.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            commands_completed: self.commands_completed.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            commands_evicted: self.commands_evicted.load(Ordering::Relaxed),
            log_depth: self.log_depth.load(Ordering::Relaxed),
            backend_switches: self.backend_switches.load(Ordering::Relaxed),
            model_load_failures: self.model_load_failures.load(Ordering::Relaxed),
            session_errors: self.session_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fragments_interim: u64,
    pub fragments_final: u64,
    pub tokens_accepted: u64,
    pub tokens_discarded: u64,
    pub utterances_finalized: u64,
    pub utterances_flushed_on_stop: u64,
    pub commands_dispatched: u64,
    pub commands_completed: u64,
    pub commands_failed: u64,
    pub commands_evicted: u64,
    pub log_depth: usize,
    pub backend_switches: u64,
    pub model_load_failures: u64,
    pub session_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = EngineMetrics::new();
        metrics.fragments_final.fetch_add(3, Ordering::Relaxed);
        metrics.record_utterance();
        metrics.commands_dispatched.fetch_add(1, Ordering::Relaxed);

        let snap = metrics.snapshot();
        assert_eq!(snap.fragments_final, 3);
        assert_eq!(snap.utterances_finalized, 1);
        assert_eq!(snap.commands_dispatched, 1);
        assert!(metrics.last_utterance_time.read().is_some());
    }

    #[test]
    fn clones_share_storage() {
        let metrics = EngineMetrics::new();
        let clone = metrics.clone();
        clone.backend_switches.fetch_add(2, Ordering::Relaxed);
        assert_eq!(metrics.snapshot().backend_switches, 2);
    }
}
