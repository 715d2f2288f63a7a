//! Operating modes.
//!
//! A mode frames how the backend interprets every query in a session. It is
//! chosen once and stays locked until the session is reset.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    #[serde(rename = "NONE")]
    Unset,
    #[serde(rename = "MODE 1: STORYTELLING")]
    Storytelling,
    #[serde(rename = "MODE 2: CHART INTERPRETATION")]
    ChartInterpretation,
    #[serde(rename = "MODE 3: GENERAL IMAGE ANALYSIS")]
    GeneralAnalysis,
    #[serde(rename = "MODE 4: LEARNING / DIAGRAM EXPLANATION")]
    DiagramExplanation,
}

impl Mode {
    /// Every concrete (selectable) mode, in menu order.
    pub const ALL: [Mode; 4] = [
        Mode::Storytelling,
        Mode::ChartInterpretation,
        Mode::GeneralAnalysis,
        Mode::DiagramExplanation,
    ];

    /// Value sent in the `mode` form field.
    pub fn wire_value(self) -> &'static str {
        match self {
            Mode::Unset => "NONE",
            Mode::Storytelling => "MODE 1: STORYTELLING",
            Mode::ChartInterpretation => "MODE 2: CHART INTERPRETATION",
            Mode::GeneralAnalysis => "MODE 3: GENERAL IMAGE ANALYSIS",
            Mode::DiagramExplanation => "MODE 4: LEARNING / DIAGRAM EXPLANATION",
        }
    }

    /// Short name used on the command line.
    pub fn short_name(self) -> &'static str {
        match self {
            Mode::Unset => "none",
            Mode::Storytelling => "story",
            Mode::ChartInterpretation => "chart",
            Mode::GeneralAnalysis => "general",
            Mode::DiagramExplanation => "diagram",
        }
    }

    pub fn is_set(self) -> bool {
        self != Mode::Unset
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_value())
    }
}

impl FromStr for Mode {
    type Err = String;

    /// Accepts wire values and short names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        [Mode::Unset]
            .into_iter()
            .chain(Mode::ALL)
            .find(|m| {
                m.wire_value().eq_ignore_ascii_case(needle)
                    || m.short_name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| format!("Unknown mode: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unset() {
        assert_eq!(Mode::default(), Mode::Unset);
        assert!(!Mode::default().is_set());
    }

    #[test]
    fn parses_short_names_and_wire_values() {
        assert_eq!("story".parse::<Mode>().unwrap(), Mode::Storytelling);
        assert_eq!("CHART".parse::<Mode>().unwrap(), Mode::ChartInterpretation);
        assert_eq!(
            "MODE 4: LEARNING / DIAGRAM EXPLANATION".parse::<Mode>().unwrap(),
            Mode::DiagramExplanation
        );
        assert_eq!("NONE".parse::<Mode>().unwrap(), Mode::Unset);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = "poetry".parse::<Mode>().unwrap_err();
        assert!(err.contains("poetry"));
    }

    #[test]
    fn serializes_to_wire_value() {
        let json = serde_json::to_string(&Mode::GeneralAnalysis).unwrap();
        assert_eq!(json, "\"MODE 3: GENERAL IMAGE ANALYSIS\"");
        let back: Mode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Mode::GeneralAnalysis);
    }

    #[test]
    fn display_matches_wire_value() {
        for mode in Mode::ALL {
            assert_eq!(mode.to_string(), mode.wire_value());
        }
    }
}
