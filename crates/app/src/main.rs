//! VoxMap demo binary
//!
//! Runs the voice command engine against scripted recognition sources
//! and in-memory collaborators, with a stdin prompt for manual
//! commands. Type `:help` at the prompt for the control commands.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use voxmap_app::{EngineRuntime, EngineSettings};
use voxmap_dispatch::dispatcher::CommandEvent;
use voxmap_dispatch::mock::demo_collaborators;
use voxmap_speech::backend::BackendRegistry;
use voxmap_speech::mock::{
    ScriptedContinuousFactory, ScriptedKeywordFactory, ScriptedSource, ScriptedSpotter,
    SourceStep, StaticModelLoader,
};
use voxmap_speech::types::BackendKind;

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "voxmap.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

/// A short scripted "spoken" session for the demo's continuous backend.
fn demo_script() -> ScriptedSource {
    ScriptedSource::new(vec![
        SourceStep::interim("find"),
        SourceStep::Fragment {
            text: "find restaurants near me".into(),
            is_final: true,
            delay_ms: 400,
        },
        SourceStep::Fragment {
            text: "zoom to level 15".into(),
            is_final: true,
            delay_ms: 2500,
        },
        SourceStep::EndCycle,
    ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    let original_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("PANIC: {panic_info}");
        original_panic(panic_info);
    }));

    tracing::info!("Starting VoxMap demo");

    let settings = EngineSettings::load()?;
    let (collaborators, _map) = demo_collaborators();

    let mut registry = BackendRegistry::new();
    registry.register(Box::new(ScriptedContinuousFactory::new(
        settings.recognition_config(),
        demo_script(),
    )));
    registry.register(Box::new(ScriptedKeywordFactory::new(
        settings.recognition_config(),
        ScriptedSpotter::new(vec![("up", 0.93), ("go", 0.88), ("reset", 0.91)]),
        Arc::new(StaticModelLoader::with_default_vocabulary()),
    )));

    let controller = Arc::new(
        EngineRuntime::build(settings, registry, collaborators)
            .map_err(|e| anyhow!("engine construction failed: {e}"))?,
    );

    // Echo command lifecycle events to the console.
    let mut command_events = controller.command_events();
    tokio::spawn(async move {
        while let Ok(event) = command_events.recv().await {
            match event {
                CommandEvent::Appended(rec) => {
                    println!("» [{}] \"{}\"", rec.id, rec.raw_utterance);
                }
                CommandEvent::StatusChanged(rec) => {
                    let detail = rec
                        .error_detail
                        .map(|d| format!(" — {d}"))
                        .unwrap_or_default();
                    println!("  [{}] {}{}", rec.id, rec.status, detail);
                }
                CommandEvent::Evicted { id } => {
                    println!("  [{id}] evicted from log");
                }
            }
        }
    });

    println!("VoxMap demo. Type a command (e.g. \"zoom in\"), or:");
    println!("  :listen / :stop      start or stop the scripted voice session");
    println!("  :switch <backend>    continuous | keyword");
    println!("  :log                 dump the command log as JSON");
    println!("  :quit                exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested via Ctrl-C");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line {
                    ":quit" => break,
                    ":listen" => {
                        if let Err(e) = controller.start_listening().await {
                            println!("cannot listen: {e}");
                        }
                    }
                    ":stop" => controller.stop_listening().await,
                    ":log" => {
                        let log = controller.command_log();
                        println!("{}", serde_json::to_string_pretty(&log)?);
                    }
                    ":switch continuous" => {
                        controller.switch_backend(BackendKind::Continuous).await.ok();
                    }
                    ":switch keyword" => {
                        controller.switch_backend(BackendKind::Keyword).await.ok();
                    }
                    text => {
                        controller.submit_manual_command(text);
                    }
                }
            }
        }
    }

    controller.stop_listening().await;
    let snapshot = controller.metrics_snapshot();
    tracing::info!(
        "Session totals: {} utterances, {} commands ({} ok / {} failed)",
        snapshot.utterances_finalized,
        snapshot.commands_dispatched,
        snapshot.commands_completed,
        snapshot.commands_failed
    );
    Ok(())
}
