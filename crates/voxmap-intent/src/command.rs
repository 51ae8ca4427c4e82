//! Typed command model
//!
//! `CommandIntent` is the closed set of things the user can ask the map
//! to do, with kind-specific parameters. Parameters a pattern failed to
//! capture stay `None`: the parser never rejects an utterance, the
//! handler reports the usage error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerAction {
    Show,
    Hide,
    Toggle,
}

impl std::fmt::Display for LayerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerAction::Show => f.write_str("show"),
            LayerAction::Hide => f.write_str("hide"),
            LayerAction::Toggle => f.write_str("toggle"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomDirective {
    In,
    Out,
    /// Absolute level. Range validation happens in the handler.
    Level(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanDirection {
    Up,
    Down,
    Left,
    Right,
}

impl PanDirection {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "up" => Some(PanDirection::Up),
            "down" => Some(PanDirection::Down),
            "left" => Some(PanDirection::Left),
            "right" => Some(PanDirection::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandIntent {
    Search {
        query: Option<String>,
    },
    Navigate {
        destination: Option<String>,
    },
    Layer {
        action: LayerAction,
        name: Option<String>,
    },
    Zoom {
        directive: Option<ZoomDirective>,
    },
    Reset,
    Help,
    LocationQuery,
    Pan {
        direction: Option<PanDirection>,
    },
    AddMarker {
        location: Option<String>,
    },
    Unknown {
        text: String,
    },
}

/// Tag-only view of an intent, used for handler lookup and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Search,
    Navigate,
    Layer,
    Zoom,
    Reset,
    Help,
    LocationQuery,
    Pan,
    AddMarker,
    Unknown,
}

impl CommandIntent {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandIntent::Search { .. } => CommandKind::Search,
            CommandIntent::Navigate { .. } => CommandKind::Navigate,
            CommandIntent::Layer { .. } => CommandKind::Layer,
            CommandIntent::Zoom { .. } => CommandKind::Zoom,
            CommandIntent::Reset => CommandKind::Reset,
            CommandIntent::Help => CommandKind::Help,
            CommandIntent::LocationQuery => CommandKind::LocationQuery,
            CommandIntent::Pan { .. } => CommandKind::Pan,
            CommandIntent::AddMarker { .. } => CommandKind::AddMarker,
            CommandIntent::Unknown { .. } => CommandKind::Unknown,
        }
    }
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Search => "search",
            CommandKind::Navigate => "navigate",
            CommandKind::Layer => "layer",
            CommandKind::Zoom => "zoom",
            CommandKind::Reset => "reset",
            CommandKind::Help => "help",
            CommandKind::LocationQuery => "location_query",
            CommandKind::Pan => "pan",
            CommandKind::AddMarker => "add_marker",
            CommandKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
