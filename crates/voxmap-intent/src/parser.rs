//! Pattern-based intent extraction
//!
//! An ordered table of (pattern, constructor) rules, evaluated first
//! match wins. Order is load-bearing: "add marker at ..." must be
//! checked before the generic search rule that would otherwise swallow
//! it, and "show me ..." (search) before "show ..." (layer).

use regex::{Captures, Regex};
use tracing::debug;

use crate::command::{CommandIntent, LayerAction, PanDirection, ZoomDirective};

struct IntentRule {
    name: &'static str,
    pattern: Regex,
    build: fn(&Captures) -> CommandIntent,
}

fn rule(name: &'static str, pattern: &str, build: fn(&Captures) -> CommandIntent) -> IntentRule {
    IntentRule {
        name,
        pattern: Regex::new(pattern).expect("hard-coded intent pattern must compile"),
        build,
    }
}

fn capture(caps: &Captures, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().trim().to_string())
}

/// Pure, deterministic utterance → intent classifier.
///
/// Holds the compiled rule table; `parse` has no side effects and no
/// state, so repeated calls with identical input yield structurally
/// identical intents regardless of call order.
pub struct IntentParser {
    rules: Vec<IntentRule>,
}

impl Default for IntentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentParser {
    pub fn new() -> Self {
        let rules = vec![
            rule(
                "add_marker",
                r"^(?:add|drop|place|put)(?: a| the)? (?:marker|pin)(?: (?:at|on|near) (?P<location>.+))?$",
                |caps| CommandIntent::AddMarker {
                    location: capture(caps, "location"),
                },
            ),
            rule(
                "search",
                r"^(?:search for|search|find|look for|show me) (?P<query>.+)$",
                |caps| CommandIntent::Search {
                    query: capture(caps, "query"),
                },
            ),
            rule(
                "navigate",
                r"^(?:navigate to|take me to|go to|directions to|drive to) (?P<destination>.+)$",
                |caps| CommandIntent::Navigate {
                    destination: capture(caps, "destination"),
                },
            ),
            rule(
                "layer",
                r"^(?P<action>show|hide|toggle)(?: the)? (?P<name>.+?)(?: layer)?$",
                |caps| {
                    let action = match caps.name("action").map(|m| m.as_str()) {
                        Some("hide") => LayerAction::Hide,
                        Some("toggle") => LayerAction::Toggle,
                        _ => LayerAction::Show,
                    };
                    CommandIntent::Layer {
                        action,
                        name: capture(caps, "name"),
                    }
                },
            ),
            rule(
                "zoom",
                r"^(?:set )?zoom(?: to)?(?: level)?(?: (?P<arg>.+))?$",
                |caps| {
                    let directive = match capture(caps, "arg").as_deref() {
                        Some("in") => Some(ZoomDirective::In),
                        Some("out") => Some(ZoomDirective::Out),
                        Some(arg) => arg.parse::<i64>().ok().map(ZoomDirective::Level),
                        None => None,
                    };
                    CommandIntent::Zoom { directive }
                },
            ),
            rule("reset", r"^(?:reset|clear)(?: the)?(?: map| view| everything)?$", |_| {
                CommandIntent::Reset
            }),
            rule("help", r"^(?:help|what can i say|commands)$", |_| CommandIntent::Help),
            rule(
                "location_query",
                r"^(?:where am i|what is here|what's here|my location|current location)$",
                |_| CommandIntent::LocationQuery,
            ),
            rule(
                "pan",
                r"^(?:pan|move|scroll)(?: (?P<direction>up|down|left|right))?$",
                |caps| CommandIntent::Pan {
                    direction: caps
                        .name("direction")
                        .and_then(|m| PanDirection::from_word(m.as_str())),
                },
            ),
        ];
        Self { rules }
    }

    /// Classify a finalized utterance. Case-insensitive; never fails.
    pub fn parse(&self, utterance: &str) -> CommandIntent {
        let text = normalize(utterance);
        if text.is_empty() {
            return CommandIntent::Unknown {
                text: utterance.to_string(),
            };
        }

        for rule in &self.rules {
            if let Some(caps) = rule.pattern.captures(&text) {
                let intent = (rule.build)(&caps);
                debug!(target: "intent", "\"{text}\" matched rule '{}'", rule.name);
                return intent;
            }
        }

        self.fallback(&text)
    }

    /// No rule matched. Search-indicative keywords reclassify the whole
    /// text as a query; everything else is Unknown. (The alternative
    /// navigate-at-low-confidence policy is deliberately not used: it
    /// would geocode arbitrary speech.)
    fn fallback(&self, text: &str) -> CommandIntent {
        const SEARCH_HINTS: [&str; 5] = ["find", "search", "near", "where is", "show me"];
        if SEARCH_HINTS.iter().any(|hint| text.contains(hint)) {
            debug!(target: "intent", "\"{text}\" fell back to search");
            return CommandIntent::Search {
                query: Some(text.to_string()),
            };
        }
        debug!(target: "intent", "\"{text}\" is not a recognized command");
        CommandIntent::Unknown {
            text: text.to_string(),
        }
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> CommandIntent {
        IntentParser::new().parse(text)
    }

    #[test]
    fn parse_is_deterministic_and_pure() {
        let parser = IntentParser::new();
        let a = parser.parse("Find restaurants near me");
        let b = parser.parse("zoom out");
        let c = parser.parse("Find restaurants near me");
        assert_eq!(a, c);
        assert_eq!(b, parser.parse("zoom out"));
    }

    #[test]
    fn search_extracts_query() {
        assert_eq!(
            parse("find restaurants near me"),
            CommandIntent::Search {
                query: Some("restaurants near me".into())
            }
        );
        assert_eq!(
            parse("Search for coffee shops"),
            CommandIntent::Search {
                query: Some("coffee shops".into())
            }
        );
    }

    #[test]
    fn add_marker_wins_over_search() {
        // "place a marker near the station" contains no search verb, but
        // "add a pin at ..." style phrasing must not be swallowed by the
        // generic rules that follow it.
        assert_eq!(
            parse("add a marker at central park"),
            CommandIntent::AddMarker {
                location: Some("central park".into())
            }
        );
        assert_eq!(parse("drop a pin"), CommandIntent::AddMarker { location: None });
    }

    #[test]
    fn navigate_extracts_destination() {
        assert_eq!(
            parse("navigate to the airport"),
            CommandIntent::Navigate {
                destination: Some("the airport".into())
            }
        );
        assert_eq!(
            parse("take me to 221b baker street"),
            CommandIntent::Navigate {
                destination: Some("221b baker street".into())
            }
        );
    }

    #[test]
    fn layer_rule_strips_layer_suffix() {
        assert_eq!(
            parse("show satellite layer"),
            CommandIntent::Layer {
                action: LayerAction::Show,
                name: Some("satellite".into())
            }
        );
        assert_eq!(
            parse("hide the traffic layer"),
            CommandIntent::Layer {
                action: LayerAction::Hide,
                name: Some("traffic".into())
            }
        );
        assert_eq!(
            parse("toggle bike paths"),
            CommandIntent::Layer {
                action: LayerAction::Toggle,
                name: Some("bike paths".into())
            }
        );
    }

    #[test]
    fn show_me_is_search_not_layer() {
        // Rule order: search is evaluated before layer.
        assert_eq!(
            parse("show me parking garages"),
            CommandIntent::Search {
                query: Some("parking garages".into())
            }
        );
    }

    #[test]
    fn zoom_directional_and_absolute() {
        assert_eq!(
            parse("zoom in"),
            CommandIntent::Zoom {
                directive: Some(ZoomDirective::In)
            }
        );
        assert_eq!(
            parse("zoom out"),
            CommandIntent::Zoom {
                directive: Some(ZoomDirective::Out)
            }
        );
        assert_eq!(
            parse("zoom to level 15"),
            CommandIntent::Zoom {
                directive: Some(ZoomDirective::Level(15))
            }
        );
        assert_eq!(
            parse("set zoom to 25"),
            CommandIntent::Zoom {
                directive: Some(ZoomDirective::Level(25))
            }
        );
        assert_eq!(
            parse("set zoom to -1"),
            CommandIntent::Zoom {
                directive: Some(ZoomDirective::Level(-1))
            }
        );
        // Unintelligible argument: the intent is still produced, the
        // handler reports the usage error.
        assert_eq!(parse("zoom to banana"), CommandIntent::Zoom { directive: None });
        assert_eq!(parse("zoom"), CommandIntent::Zoom { directive: None });
    }

    #[test]
    fn reset_help_location_query() {
        assert_eq!(parse("reset the map"), CommandIntent::Reset);
        assert_eq!(parse("clear everything"), CommandIntent::Reset);
        assert_eq!(parse("help"), CommandIntent::Help);
        assert_eq!(parse("where am I"), CommandIntent::LocationQuery);
    }

    #[test]
    fn pan_directions() {
        assert_eq!(
            parse("pan left"),
            CommandIntent::Pan {
                direction: Some(PanDirection::Left)
            }
        );
        assert_eq!(
            parse("move up"),
            CommandIntent::Pan {
                direction: Some(PanDirection::Up)
            }
        );
        assert_eq!(parse("pan"), CommandIntent::Pan { direction: None });
    }

    #[test]
    fn fallback_search_on_indicative_keywords() {
        assert_eq!(
            parse("pizza near downtown"),
            CommandIntent::Search {
                query: Some("pizza near downtown".into())
            }
        );
        assert_eq!(
            parse("where is the nearest pharmacy"),
            CommandIntent::Search {
                query: Some("where is the nearest pharmacy".into())
            }
        );
    }

    #[test]
    fn fallback_unknown_otherwise() {
        assert_eq!(
            parse("purple elephant shoes"),
            CommandIntent::Unknown {
                text: "purple elephant shoes".into()
            }
        );
        assert_eq!(parse("   "), CommandIntent::Unknown { text: "   ".into() });
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(parse("ZOOM IN"), parse("zoom in"));
        assert_eq!(parse("Show Satellite Layer"), parse("show satellite layer"));
    }
}
