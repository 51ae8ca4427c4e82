//! Intent parsing for VoxMap voice commands
//!
//! A finalized utterance becomes a typed `CommandIntent` through an
//! ordered table of pattern rules; keyword-spotter tokens take a
//! separate fixed mapping that bypasses the pattern grammar entirely.

pub mod command;
pub mod parser;
pub mod token_map;

pub use command::{CommandIntent, CommandKind, LayerAction, PanDirection, ZoomDirective};
pub use parser::IntentParser;
pub use token_map::token_intent;
