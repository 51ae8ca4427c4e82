//! Command dispatcher and status tracker
//!
//! `dispatch` is fire-and-forget: the caller gets the command id back
//! immediately and observes completion through the log and the event
//! channel. Handlers never propagate errors out of the dispatcher; every
//! outcome lands on the record as a terminal status.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use voxmap_foundation::clock::{real_clock, SharedClock};
use voxmap_intent::{CommandIntent, CommandKind, LayerAction, PanDirection, ZoomDirective};
use voxmap_telemetry::EngineMetrics;

use crate::collab::{CollabError, Collaborators, GeocodeResult};
use crate::log::{CommandLog, LogError};
use crate::record::{CommandRecord, CommandSource, CommandStatus};

pub const ZOOM_MIN: u8 = 3;
pub const ZOOM_MAX: u8 = 18;
const PAN_STEP_PX: i32 = 100;
const RESET_ZOOM: u8 = 13;
const NAVIGATE_ZOOM: u8 = 14;

/// Terminal failure causes recorded on a command entry.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no results found for \"{0}\"")]
    NoResults(String),

    #[error("Sorry, I didn't understand that. Say \"help\" to see what you can ask for.")]
    NotUnderstood,
}

impl From<CollabError> for CommandError {
    fn from(err: CollabError) -> Self {
        CommandError::Network(err.to_string())
    }
}

/// Observer notifications for log changes.
#[derive(Debug, Clone)]
pub enum CommandEvent {
    Appended(CommandRecord),
    StatusChanged(CommandRecord),
    Evicted { id: u64 },
}

#[derive(Clone)]
pub struct CommandDispatcher {
    log: Arc<CommandLog>,
    collab: Collaborators,
    events_tx: broadcast::Sender<CommandEvent>,
    metrics: EngineMetrics,
    clock: SharedClock,
}

impl CommandDispatcher {
    pub fn new(log: Arc<CommandLog>, collab: Collaborators) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            log,
            collab,
            events_tx,
            metrics: EngineMetrics::new(),
            clock: real_clock(),
        }
    }

    pub fn with_metrics_sink(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.events_tx.subscribe()
    }

    pub fn log(&self) -> &Arc<CommandLog> {
        &self.log
    }

    /// Route an intent to its handler. Fire-and-forget: synchronous
    /// handlers complete before this returns, collaborator-bound ones
    /// run on a spawned task and may overlap with later dispatches.
    pub fn dispatch(&self, intent: CommandIntent, raw: &str, source: CommandSource) -> u64 {
        let record = CommandRecord::new(intent.clone(), raw, source);
        let id = record.id;

        if let Some(evicted) = self.log.append(record.clone()) {
            debug!(target: "dispatch", "Evicted command {evicted} (log at capacity)");
            self.metrics.commands_evicted.fetch_add(1, Ordering::Relaxed);
            self.emit(CommandEvent::Evicted { id: evicted });
        }
        self.metrics.commands_dispatched.fetch_add(1, Ordering::Relaxed);
        self.metrics.log_depth.store(self.log.len(), Ordering::Relaxed);

        info!(target: "dispatch", "Command {id} [{}] \"{raw}\"", intent.kind());
        self.emit(CommandEvent::Appended(record));
        self.set_status(id, CommandStatus::Processing, None);

        let started = self.clock.now();
        match intent.kind() {
            CommandKind::Unknown => {
                // No handler runs for unrecognized commands.
                self.finish(id, started, Err(CommandError::NotUnderstood));
            }
            CommandKind::Layer
            | CommandKind::Zoom
            | CommandKind::Pan
            | CommandKind::Reset
            | CommandKind::Help => {
                let result = self.run_sync_handler(&intent);
                self.finish(id, started, result);
            }
            CommandKind::Search
            | CommandKind::Navigate
            | CommandKind::AddMarker
            | CommandKind::LocationQuery => {
                let this = self.clone();
                tokio::spawn(async move {
                    let result = this.run_async_handler(&intent).await;
                    this.finish(id, started, result);
                });
            }
        }

        id
    }

    fn finish(
        &self,
        id: u64,
        started: std::time::Instant,
        result: Result<(), CommandError>,
    ) {
        let elapsed_ms = (self.clock.now() - started).as_millis() as u64;
        self.metrics.record_dispatch_latency(elapsed_ms);

        match result {
            Ok(()) => {
                self.metrics.commands_completed.fetch_add(1, Ordering::Relaxed);
                self.set_status(id, CommandStatus::Completed, None);
            }
            Err(err) => {
                self.metrics.commands_failed.fetch_add(1, Ordering::Relaxed);
                info!(target: "dispatch", "Command {id} failed: {err}");
                self.set_status(id, CommandStatus::Failed, Some(err.to_string()));
            }
        }
    }

    fn set_status(&self, id: u64, status: CommandStatus, error_detail: Option<String>) {
        match self.log.update_status(id, status, error_detail) {
            Ok(updated) => self.emit(CommandEvent::StatusChanged(updated)),
            // Evicted before its handler finished: completion is
            // tolerated and simply unobservable.
            Err(LogError::NotFound(_)) => {
                debug!(target: "dispatch", "Command {id} left the log before {status}");
            }
            Err(e @ LogError::InvalidTransition { .. }) => {
                warn!(target: "dispatch", "{e}");
            }
        }
    }

    fn emit(&self, event: CommandEvent) {
        // Zero receivers is fine (e.g. headless tests).
        let _ = self.events_tx.send(event);
    }

    // ─── Synchronous handlers (local map-control state only) ────────

    fn run_sync_handler(&self, intent: &CommandIntent) -> Result<(), CommandError> {
        match intent {
            CommandIntent::Layer { action, name } => self.handle_layer(*action, name.as_deref()),
            CommandIntent::Zoom { directive } => self.handle_zoom(*directive),
            CommandIntent::Pan { direction } => self.handle_pan(*direction),
            CommandIntent::Reset => self.handle_reset(),
            CommandIntent::Help => self.handle_help(),
            other => Err(CommandError::Validation(format!(
                "no synchronous handler for {}",
                other.kind()
            ))),
        }
    }

    fn handle_layer(&self, action: LayerAction, name: Option<&str>) -> Result<(), CommandError> {
        let name = name.ok_or_else(|| {
            CommandError::Validation(
                "say which layer, e.g. \"show satellite layer\"".to_string(),
            )
        })?;

        let Some(layer_id) = self.collab.layers.detect_layer(name) else {
            let alternatives = self
                .collab
                .layers
                .all_layers()
                .into_iter()
                .take(3)
                .map(|l| l.name)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CommandError::Validation(format!(
                "unknown layer \"{name}\"; try: {alternatives}"
            )));
        };

        match action {
            LayerAction::Show => self.collab.map.set_layer_active(&layer_id, true),
            LayerAction::Hide => self.collab.map.set_layer_active(&layer_id, false),
            LayerAction::Toggle => {
                let now_active = self.collab.map.toggle_layer(&layer_id);
                debug!(target: "dispatch", "Layer {layer_id} toggled to {now_active}");
            }
        }
        info!(target: "dispatch", "Layer \"{name}\" -> {layer_id} ({action})");
        Ok(())
    }

    fn handle_zoom(&self, directive: Option<ZoomDirective>) -> Result<(), CommandError> {
        let directive = directive.ok_or_else(|| {
            CommandError::Validation(format!(
                "say \"zoom in\", \"zoom out\", or \"zoom to level N\" ({ZOOM_MIN}-{ZOOM_MAX})"
            ))
        })?;

        match directive {
            ZoomDirective::In => {
                // Directional zoom clamps instead of erroring.
                let current = self.collab.map.zoom();
                if current < ZOOM_MAX {
                    self.collab.map.zoom_in(1);
                }
            }
            ZoomDirective::Out => {
                let current = self.collab.map.zoom();
                if current > ZOOM_MIN {
                    self.collab.map.zoom_out(1);
                }
            }
            ZoomDirective::Level(level) => {
                if level < i64::from(ZOOM_MIN) || level > i64::from(ZOOM_MAX) {
                    return Err(CommandError::Validation(format!(
                        "zoom level {level} is out of range ({ZOOM_MIN}-{ZOOM_MAX})"
                    )));
                }
                self.collab.map.set_zoom(level as u8);
            }
        }
        Ok(())
    }

    fn handle_pan(&self, direction: Option<PanDirection>) -> Result<(), CommandError> {
        let direction = direction.ok_or_else(|| {
            CommandError::Validation("say a direction: up, down, left, or right".to_string())
        })?;

        let (dx, dy) = match direction {
            PanDirection::Up => (0, -PAN_STEP_PX),
            PanDirection::Down => (0, PAN_STEP_PX),
            PanDirection::Left => (-PAN_STEP_PX, 0),
            PanDirection::Right => (PAN_STEP_PX, 0),
        };
        self.collab.map.pan_by(dx, dy);
        Ok(())
    }

    /// Always succeeds: re-centers on the last known location when one
    /// exists, otherwise leaves the position alone; clears active layers
    /// and transient search results either way.
    fn handle_reset(&self) -> Result<(), CommandError> {
        if let Some(home) = self.collab.location.last_known() {
            self.collab.map.set_view(home, RESET_ZOOM);
        }
        self.collab.map.clear_layers();
        self.collab.map.clear_search_results();
        info!(target: "dispatch", "Map reset");
        Ok(())
    }

    fn handle_help(&self) -> Result<(), CommandError> {
        info!(
            target: "dispatch",
            "Try: \"find <places>\", \"navigate to <place>\", \"show <layer> layer\", \
             \"zoom in/out\", \"zoom to level N\", \"pan <direction>\", \
             \"add a marker at <place>\", \"where am I\", \"reset the map\""
        );
        Ok(())
    }

    // ─── Asynchronous handlers (collaborator-bound) ─────────────────

    async fn run_async_handler(&self, intent: &CommandIntent) -> Result<(), CommandError> {
        match intent {
            CommandIntent::Search { query } => self.handle_search(query.as_deref()).await,
            CommandIntent::Navigate { destination } => {
                self.handle_navigate(destination.as_deref()).await
            }
            CommandIntent::AddMarker { location } => {
                self.handle_add_marker(location.as_deref()).await
            }
            CommandIntent::LocationQuery => self.handle_location_query().await,
            other => Err(CommandError::Validation(format!(
                "no asynchronous handler for {}",
                other.kind()
            ))),
        }
    }

    async fn handle_search(&self, query: Option<&str>) -> Result<(), CommandError> {
        let query = query
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| CommandError::Validation("say what to search for".to_string()))?;

        let hint = self
            .collab
            .map
            .center()
            .or_else(|| self.collab.location.last_known());

        let results: Vec<GeocodeResult> = match self.collab.poi.detect_category(query) {
            Some(category) => {
                let at = hint.ok_or_else(|| {
                    CommandError::Validation("map position unknown, cannot search nearby".into())
                })?;
                self.collab
                    .poi
                    .find_nearby(at, &category, 5.0, 20)
                    .await?
                    .into_iter()
                    .map(GeocodeResult::from)
                    .collect()
            }
            None => self.collab.geocoder.smart_search(query, hint).await?,
        };

        // Empty results and collaborator failures are distinct outcomes:
        // the latter already returned a Network error above.
        if results.is_empty() {
            return Err(CommandError::NoResults(query.to_string()));
        }

        info!(target: "dispatch", "Search \"{query}\" -> {} results", results.len());
        self.collab.map.show_search_results(results);
        Ok(())
    }

    async fn handle_navigate(&self, destination: Option<&str>) -> Result<(), CommandError> {
        let destination = destination
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| CommandError::Validation("say where to go".to_string()))?;

        let results = self.collab.geocoder.search(destination).await?;
        let Some(target) = results.first() else {
            return Err(CommandError::NoResults(destination.to_string()));
        };

        let zoom = self.collab.map.zoom().max(NAVIGATE_ZOOM);
        self.collab.map.set_view(target.position, zoom);
        info!(target: "dispatch", "Navigating to \"{}\"", target.name);
        Ok(())
    }

    /// Marker location priority: explicit phrase (geocoded) > current
    /// map center > last known device location.
    async fn handle_add_marker(&self, location: Option<&str>) -> Result<(), CommandError> {
        let (position, label) = if let Some(phrase) = location.filter(|l| !l.trim().is_empty()) {
            let results = self.collab.geocoder.search(phrase).await?;
            let Some(hit) = results.first() else {
                return Err(CommandError::NoResults(phrase.to_string()));
            };
            (hit.position, hit.name.clone())
        } else if let Some(center) = self.collab.map.center() {
            (center, "dropped pin".to_string())
        } else if let Some(last) = self.collab.location.last_known() {
            (last, "current location".to_string())
        } else {
            return Err(CommandError::Validation(
                "no location available for the marker".to_string(),
            ));
        };

        self.collab.map.add_marker(position, &label);
        info!(target: "dispatch", "Marker \"{label}\" at {:.4},{:.4}", position.lat, position.lng);
        Ok(())
    }

    async fn handle_location_query(&self) -> Result<(), CommandError> {
        let at = match self.collab.map.center() {
            Some(center) => center,
            None => self.collab.location.current_location().await?,
        };

        match self.collab.geocoder.reverse_geocode(at).await? {
            Some(name) => {
                info!(target: "dispatch", "Current location: {name}");
                Ok(())
            }
            None => Err(CommandError::NoResults("this location".to_string())),
        }
    }
}
