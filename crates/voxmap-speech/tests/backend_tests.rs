//! Backend adapter tests
//!
//! Cover the continuous pump (fragments, cycle end, auto-restart), the
//! keyword threshold gate, permission failures, and the manager's
//! stop-before-switch and model-load fallback behavior.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use voxmap_speech::backend::{BackendRegistry, SpeechBackend, SpeechError};
use voxmap_speech::continuous::ContinuousBackend;
use voxmap_speech::manager::BackendManager;
use voxmap_speech::mock::{
    ScriptedContinuousFactory, ScriptedKeywordFactory, ScriptedSource, ScriptedSpotter,
    SourceStep, StaticModelLoader,
};
use voxmap_speech::types::{BackendKind, RecognitionConfig, RecognitionEvent};

fn single_shot_config() -> RecognitionConfig {
    RecognitionConfig {
        continuous: false,
        ..Default::default()
    }
}

async fn recv_timeout(rx: &mut mpsc::Receiver<RecognitionEvent>) -> RecognitionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for recognition event")
        .expect("event channel closed")
}

#[tokio::test]
async fn continuous_pumps_fragments_then_ends_cycle() {
    let source = ScriptedSource::new(vec![
        SourceStep::interim("find"),
        SourceStep::final_text("find coffee"),
        SourceStep::EndCycle,
    ]);
    let mut backend = ContinuousBackend::new(single_shot_config(), move || source.clone());

    let (tx, mut rx) = mpsc::channel(16);
    backend.start(tx).await.unwrap();

    assert_eq!(recv_timeout(&mut rx).await, RecognitionEvent::SessionStarted);
    match recv_timeout(&mut rx).await {
        RecognitionEvent::Fragment(f) => {
            assert_eq!(f.text, "find");
            assert!(!f.is_final);
        }
        other => panic!("expected interim fragment, got {other:?}"),
    }
    match recv_timeout(&mut rx).await {
        RecognitionEvent::Fragment(f) => {
            assert_eq!(f.text, "find coffee");
            assert!(f.is_final);
        }
        other => panic!("expected final fragment, got {other:?}"),
    }
    assert_eq!(recv_timeout(&mut rx).await, RecognitionEvent::SessionEnded);

    // Single-shot: the pump exits after the cycle.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!backend.is_active());
}

#[tokio::test]
async fn continuous_mode_restarts_after_cycle_end() {
    let source = ScriptedSource::new(vec![
        SourceStep::final_text("first cycle"),
        SourceStep::EndCycle,
        SourceStep::final_text("second cycle"),
    ]);
    let config = RecognitionConfig {
        continuous: true,
        ..Default::default()
    };
    let mut backend = ContinuousBackend::new(config, move || source.clone());

    let (tx, mut rx) = mpsc::channel(16);
    backend.start(tx).await.unwrap();

    assert_eq!(recv_timeout(&mut rx).await, RecognitionEvent::SessionStarted);
    match recv_timeout(&mut rx).await {
        RecognitionEvent::Fragment(f) => assert_eq!(f.text, "first cycle"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(recv_timeout(&mut rx).await, RecognitionEvent::SessionEnded);
    // Auto-restart: a new cycle opens without caller involvement.
    assert_eq!(recv_timeout(&mut rx).await, RecognitionEvent::SessionStarted);
    match recv_timeout(&mut rx).await {
        RecognitionEvent::Fragment(f) => assert_eq!(f.text, "second cycle"),
        other => panic!("unexpected {other:?}"),
    }

    backend.stop().await;
    assert!(!backend.is_active());
}

#[tokio::test]
async fn permission_denied_surfaces_before_any_event() {
    let mut backend =
        ContinuousBackend::new(single_shot_config(), ScriptedSource::denying_permission);

    let (tx, mut rx) = mpsc::channel(16);
    let err = backend.start(tx).await.unwrap_err();
    assert!(matches!(err, SpeechError::PermissionDenied));
    assert!(!backend.is_active());
    // No event reached the pipeline.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn stop_on_idle_backend_is_noop() {
    let mut backend =
        ContinuousBackend::new(single_shot_config(), || ScriptedSource::new(vec![]));
    backend.stop().await;
    assert!(!backend.is_active());
}

#[tokio::test]
async fn stop_emits_session_ended() {
    // Script exhausts immediately, leaving the source "listening to
    // silence" until stopped.
    let mut backend =
        ContinuousBackend::new(single_shot_config(), || ScriptedSource::new(vec![]));

    let (tx, mut rx) = mpsc::channel(16);
    backend.start(tx).await.unwrap();
    assert_eq!(recv_timeout(&mut rx).await, RecognitionEvent::SessionStarted);

    backend.stop().await;
    assert_eq!(recv_timeout(&mut rx).await, RecognitionEvent::SessionEnded);
    assert!(!backend.is_active());
}

#[tokio::test]
async fn keyword_backend_gates_on_confidence_threshold() {
    let config = RecognitionConfig {
        confidence_threshold: 0.80,
        model_path: "models/test-threshold".to_string(),
        ..Default::default()
    };
    let spotter = ScriptedSpotter::new(vec![("up", 0.95), ("down", 0.40), ("left", 0.81)]);
    let loader = Arc::new(StaticModelLoader::with_default_vocabulary());
    let factory = ScriptedKeywordFactory::new(config, spotter, loader);

    let mut registry = BackendRegistry::new();
    registry.register(Box::new(factory));
    let mut backend = registry.create(BackendKind::Keyword).unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    backend.start(tx).await.unwrap();

    assert_eq!(recv_timeout(&mut rx).await, RecognitionEvent::SessionStarted);
    match recv_timeout(&mut rx).await {
        RecognitionEvent::Token { word, confidence } => {
            assert_eq!(word, "up");
            assert!(confidence >= 0.80);
        }
        other => panic!("unexpected {other:?}"),
    }
    // "down" at 0.40 is discarded; the next delivered token is "left".
    match recv_timeout(&mut rx).await {
        RecognitionEvent::Token { word, .. } => assert_eq!(word, "left"),
        other => panic!("unexpected {other:?}"),
    }

    backend.stop().await;
}

#[tokio::test]
async fn manager_falls_back_to_continuous_when_model_load_fails() {
    let continuous = ScriptedContinuousFactory::new(
        single_shot_config(),
        ScriptedSource::new(vec![SourceStep::final_text("fallback works")]),
    );
    let keyword = ScriptedKeywordFactory::new(
        RecognitionConfig {
            model_path: "models/test-load-failure".to_string(),
            ..Default::default()
        },
        ScriptedSpotter::new(vec![]),
        Arc::new(StaticModelLoader::failing("model archive corrupt")),
    );

    let mut registry = BackendRegistry::new();
    registry.register(Box::new(continuous));
    registry.register(Box::new(keyword));
    let mut manager = BackendManager::new(registry);

    let (tx, mut rx) = mpsc::channel(16);
    let started = manager.start(BackendKind::Keyword, tx).await.unwrap();
    assert_eq!(started, BackendKind::Continuous);
    assert_eq!(manager.active_kind(), Some(BackendKind::Continuous));

    // The failure is reported as a non-fatal error event before the
    // continuous session opens.
    match recv_timeout(&mut rx).await {
        RecognitionEvent::Error { code, message } => {
            assert_eq!(code, "model_load_failed");
            assert!(message.contains("continuous"));
        }
        other => panic!("expected error event, got {other:?}"),
    }
    assert_eq!(recv_timeout(&mut rx).await, RecognitionEvent::SessionStarted);

    manager.stop().await;
}

#[tokio::test]
async fn manager_start_is_idempotent_while_listening() {
    let factory = ScriptedContinuousFactory::new(
        RecognitionConfig::default(),
        ScriptedSource::new(vec![]),
    );
    let mut registry = BackendRegistry::new();
    registry.register(Box::new(factory));
    let mut manager = BackendManager::new(registry);

    let (tx, _rx) = mpsc::channel(16);
    let first = manager.start(BackendKind::Continuous, tx.clone()).await.unwrap();
    let second = manager.start(BackendKind::Continuous, tx).await.unwrap();
    assert_eq!(first, second);
    assert!(manager.is_listening());

    manager.stop().await;
    assert!(!manager.is_listening());
}

#[tokio::test]
async fn switch_stops_active_backend_before_starting_target() {
    let continuous = ScriptedContinuousFactory::new(
        RecognitionConfig::default(),
        ScriptedSource::new(vec![]),
    );
    let keyword = ScriptedKeywordFactory::new(
        RecognitionConfig {
            model_path: "models/test-switch".to_string(),
            ..Default::default()
        },
        ScriptedSpotter::new(vec![("go", 0.99)]),
        Arc::new(StaticModelLoader::with_default_vocabulary()),
    );

    let mut registry = BackendRegistry::new();
    registry.register(Box::new(continuous));
    registry.register(Box::new(keyword));
    let mut manager = BackendManager::new(registry);

    let (old_tx, mut old_rx) = mpsc::channel(16);
    manager.start(BackendKind::Continuous, old_tx).await.unwrap();
    assert_eq!(
        recv_timeout(&mut old_rx).await,
        RecognitionEvent::SessionStarted
    );

    let (new_tx, mut new_rx) = mpsc::channel(16);
    let active = manager.switch(BackendKind::Keyword, new_tx).await.unwrap();
    assert_eq!(active, BackendKind::Keyword);

    // The old session was shut down cleanly before the target opened.
    assert_eq!(
        recv_timeout(&mut old_rx).await,
        RecognitionEvent::SessionEnded
    );
    assert_eq!(
        recv_timeout(&mut new_rx).await,
        RecognitionEvent::SessionStarted
    );
    match recv_timeout(&mut new_rx).await {
        RecognitionEvent::Token { word, .. } => assert_eq!(word, "go"),
        other => panic!("unexpected {other:?}"),
    }

    manager.stop().await;
}
