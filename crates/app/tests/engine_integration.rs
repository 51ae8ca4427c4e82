//! End-to-end engine tests
//!
//! Drive the full pipeline — scripted recognition source, segmenter,
//! parser, dispatcher, in-memory collaborators — through the controller
//! façade.

use std::sync::Arc;
use std::time::Duration;

use voxmap_app::{EngineRuntime, EngineSettings, VoiceSessionController};
use voxmap_dispatch::collab::{Collaborators, LatLng, MapControl};
use voxmap_dispatch::mock::{
    InMemoryMapControl, MockGeocoder, MockLocationProvider, MockPoiClient, StaticLayerRegistry,
};
use voxmap_dispatch::record::{CommandSource, CommandStatus};
use voxmap_foundation::error::SessionError;
use voxmap_speech::backend::BackendRegistry;
use voxmap_speech::mock::{
    ScriptedContinuousFactory, ScriptedKeywordFactory, ScriptedSource, ScriptedSpotter,
    SourceStep, StaticModelLoader,
};
use voxmap_speech::types::BackendKind;
use voxmap_intent::{CommandIntent, PanDirection};

struct Rig {
    controller: Arc<VoiceSessionController>,
    map: Arc<InMemoryMapControl>,
}

fn build(settings: EngineSettings, registry: BackendRegistry) -> Rig {
    let map = Arc::new(InMemoryMapControl::new());
    let collaborators = Collaborators {
        map: map.clone(),
        geocoder: Arc::new(
            MockGeocoder::new().with_result("coffee", "Roasters Row", LatLng::new(47.6, -122.3)),
        ),
        poi: Arc::new(
            MockPoiClient::new()
                .with_category("restaurant", "restaurant")
                .with_nearby("Corner Bistro", LatLng::new(47.61, -122.33), 0.4),
        ),
        layers: Arc::new(StaticLayerRegistry::with_default_layers()),
        location: Arc::new(MockLocationProvider::new().with_fix(LatLng::new(47.6, -122.3))),
    };
    let controller = Arc::new(EngineRuntime::build(settings, registry, collaborators).unwrap());
    Rig { controller, map }
}

fn continuous_registry(settings: &EngineSettings, script: ScriptedSource) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(Box::new(ScriptedContinuousFactory::new(
        settings.recognition_config(),
        script,
    )));
    registry
}

async fn wait_until(mut check: impl FnMut() -> bool, what: &str) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn spoken_and_manual_paths_yield_identical_intents() {
    let settings = EngineSettings {
        silence_timeout_ms: 150,
        ..Default::default()
    };
    let script = ScriptedSource::new(vec![SourceStep::final_text("zoom to level 15")]);
    let rig = build(settings.clone(), continuous_registry(&settings, script));

    rig.controller.start_listening().await.unwrap();
    wait_until(
        || {
            rig.controller
                .command_log()
                .iter()
                .any(|r| r.source == CommandSource::Voice && r.status.is_terminal())
        },
        "spoken command to finish",
    )
    .await;
    rig.controller.stop_listening().await;

    rig.controller.submit_manual_command("zoom to level 15");
    wait_until(
        || {
            rig.controller
                .command_log()
                .iter()
                .any(|r| r.source == CommandSource::Manual && r.status.is_terminal())
        },
        "manual command to finish",
    )
    .await;

    let log = rig.controller.command_log();
    let spoken = log
        .iter()
        .find(|r| r.source == CommandSource::Voice)
        .unwrap();
    let manual = log
        .iter()
        .find(|r| r.source == CommandSource::Manual)
        .unwrap();

    // Identical kind and parameters; only metadata differs.
    assert_eq!(spoken.intent, manual.intent);
    assert_eq!(spoken.raw_utterance, manual.raw_utterance);
    assert_ne!(spoken.id, manual.id);

    // And the command actually took effect on the map.
    assert_eq!(rig.map.zoom(), 15);
    assert_eq!(spoken.status, CommandStatus::Completed);
}

#[tokio::test]
async fn stopping_flushes_the_buffered_utterance_exactly_once() {
    // Silence timeout far beyond the test horizon: only the stop-flush
    // can finalize the utterance.
    let settings = EngineSettings {
        silence_timeout_ms: 60_000,
        ..Default::default()
    };
    let script = ScriptedSource::new(vec![SourceStep::final_text("find coffee")]);
    let rig = build(settings.clone(), continuous_registry(&settings, script));

    let mut transcripts = rig.controller.transcript_events();
    rig.controller.start_listening().await.unwrap();

    // Wait until the fragment is buffered before stopping.
    loop {
        match transcripts.recv().await.unwrap() {
            voxmap_app::TranscriptEvent::Accumulating(text) => {
                assert_eq!(text, "find coffee");
                break;
            }
            _ => continue,
        }
    }

    rig.controller.stop_listening().await;

    wait_until(
        || {
            rig.controller
                .command_log()
                .iter()
                .any(|r| r.status.is_terminal())
        },
        "flushed command to finish",
    )
    .await;

    let voice_commands: Vec<_> = rig
        .controller
        .command_log()
        .into_iter()
        .filter(|r| r.source == CommandSource::Voice)
        .collect();
    assert_eq!(voice_commands.len(), 1, "no loss, no duplication");
    assert_eq!(voice_commands[0].raw_utterance, "find coffee");
}

#[tokio::test]
async fn permission_denial_disables_listening_with_a_distinct_error() {
    let settings = EngineSettings::default();
    let registry = continuous_registry(&settings, ScriptedSource::denying_permission());
    let rig = build(settings, registry);

    let err = rig.controller.start_listening().await.unwrap_err();
    assert_eq!(err, SessionError::PermissionDenied);
    assert!(!rig.controller.is_listening());
    // No command was formed, so the log stays empty.
    assert!(rig.controller.command_log().is_empty());
    assert_eq!(rig.controller.last_error(), Some(SessionError::PermissionDenied));
}

#[tokio::test]
async fn keyword_tokens_map_to_intents_without_the_parser() {
    let settings = EngineSettings {
        default_backend: BackendKind::Keyword,
        model_path: "models/app-test-keyword".to_string(),
        ..Default::default()
    };
    let mut registry = BackendRegistry::new();
    registry.register(Box::new(ScriptedKeywordFactory::new(
        settings.recognition_config(),
        ScriptedSpotter::new(vec![("up", 0.95)]),
        Arc::new(StaticModelLoader::with_default_vocabulary()),
    )));
    let rig = build(settings, registry);

    rig.controller.start_listening().await.unwrap();
    wait_until(
        || {
            rig.controller
                .command_log()
                .iter()
                .any(|r| r.source == CommandSource::Keyword && r.status.is_terminal())
        },
        "keyword command to finish",
    )
    .await;
    rig.controller.stop_listening().await;

    let log = rig.controller.command_log();
    let token_cmd = log
        .iter()
        .find(|r| r.source == CommandSource::Keyword)
        .unwrap();
    assert_eq!(
        token_cmd.intent,
        CommandIntent::Pan {
            direction: Some(PanDirection::Up)
        }
    );
    assert_eq!(token_cmd.status, CommandStatus::Completed);
}

#[tokio::test]
async fn model_load_failure_falls_back_to_continuous() {
    let settings = EngineSettings {
        default_backend: BackendKind::Keyword,
        model_path: "models/app-test-broken-model".to_string(),
        ..Default::default()
    };
    let mut registry = BackendRegistry::new();
    registry.register(Box::new(ScriptedKeywordFactory::new(
        settings.recognition_config(),
        ScriptedSpotter::new(vec![]),
        Arc::new(StaticModelLoader::failing("model archive corrupt")),
    )));
    registry.register(Box::new(ScriptedContinuousFactory::new(
        settings.recognition_config(),
        ScriptedSource::new(vec![]),
    )));
    let rig = build(settings, registry);

    let mut errors = rig.controller.session_errors();
    rig.controller.start_listening().await.unwrap();

    // The engine is listening via the fallback variant.
    assert!(rig.controller.is_listening());
    assert_eq!(rig.controller.active_backend(), Some(BackendKind::Continuous));

    // The failure surfaced as a non-fatal session error, not a command.
    let err = tokio::time::timeout(Duration::from_secs(2), errors.recv())
        .await
        .unwrap()
        .unwrap();
    match err {
        SessionError::BackendUnavailable { reason } => {
            assert!(reason.contains("model archive corrupt"));
        }
        other => panic!("unexpected session error: {other:?}"),
    }
    assert!(rig.controller.command_log().is_empty());

    rig.controller.stop_listening().await;
}

#[tokio::test]
async fn switch_backend_while_idle_only_changes_preference() {
    let settings = EngineSettings::default();
    let registry = continuous_registry(&settings, ScriptedSource::new(vec![]));
    let rig = build(settings, registry);

    rig.controller
        .switch_backend(BackendKind::Keyword)
        .await
        .unwrap();
    assert!(!rig.controller.is_listening());
}
