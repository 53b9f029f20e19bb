use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ClientInputError;

/// Voice the copy generator is asked to write in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Neutral,
    Formal,
    Playful,
    Luxury,
    Minimalist,
}

pub const CANONICAL_TONES: [Tone; 5] = [
    Tone::Neutral,
    Tone::Formal,
    Tone::Playful,
    Tone::Luxury,
    Tone::Minimalist,
];

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::Formal => "formal",
            Tone::Playful => "playful",
            Tone::Luxury => "luxury",
            Tone::Minimalist => "minimalist",
        }
    }

    /// Case-insensitive lookup over the canonical names and their aliases.
    pub fn parse_alias(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        let tone = match normalized.as_str() {
            "neutral" => Tone::Neutral,
            "formal" | "professional" | "technical" => Tone::Formal,
            "playful" | "casual" => Tone::Playful,
            "luxury" => Tone::Luxury,
            "minimalist" => Tone::Minimalist,
            _ => return None,
        };
        Some(tone)
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = ClientInputError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Tone::parse_alias(raw).ok_or_else(|| ClientInputError::UnknownTone(raw.trim().to_string()))
    }
}
