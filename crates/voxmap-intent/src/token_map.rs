//! Fixed vocabulary mapping for the keyword-spotting backend
//!
//! Keyword tokens never see the pattern grammar: each vocabulary word
//! maps directly to an intent. Words the map does not know become
//! Unknown and fail with the standard "not understood" detail.

use crate::command::{CommandIntent, PanDirection, ZoomDirective};

pub fn token_intent(word: &str) -> CommandIntent {
    match word.trim().to_lowercase().as_str() {
        "up" => CommandIntent::Pan {
            direction: Some(PanDirection::Up),
        },
        "down" => CommandIntent::Pan {
            direction: Some(PanDirection::Down),
        },
        "left" => CommandIntent::Pan {
            direction: Some(PanDirection::Left),
        },
        "right" => CommandIntent::Pan {
            direction: Some(PanDirection::Right),
        },
        "go" => CommandIntent::Zoom {
            directive: Some(ZoomDirective::In),
        },
        "stop" => CommandIntent::Zoom {
            directive: Some(ZoomDirective::Out),
        },
        "reset" => CommandIntent::Reset,
        "help" => CommandIntent::Help,
        other => CommandIntent::Unknown {
            text: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_words_map_to_pan() {
        for (word, direction) in [
            ("up", PanDirection::Up),
            ("down", PanDirection::Down),
            ("left", PanDirection::Left),
            ("right", PanDirection::Right),
        ] {
            assert_eq!(
                token_intent(word),
                CommandIntent::Pan {
                    direction: Some(direction)
                }
            );
        }
    }

    #[test]
    fn go_and_stop_map_to_zoom() {
        assert_eq!(
            token_intent("go"),
            CommandIntent::Zoom {
                directive: Some(ZoomDirective::In)
            }
        );
        assert_eq!(
            token_intent("STOP"),
            CommandIntent::Zoom {
                directive: Some(ZoomDirective::Out)
            }
        );
    }

    #[test]
    fn unmapped_vocabulary_becomes_unknown() {
        assert_eq!(
            token_intent("yes"),
            CommandIntent::Unknown { text: "yes".into() }
        );
    }
}
