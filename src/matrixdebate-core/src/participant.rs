//! Debate participants.
//!
//! The cast is a closed set: three debaters and the Oracle who delivers the
//! verdict. Stream events name speakers by free text, so lookups go through
//! [`Participant::from_speaker`] and fall back when the name is unknown.

use serde::{Deserialize, Serialize};

/// Which side of the comic strip a participant's panel sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelSide {
    Left,
    Right,
    Center,
}

/// A participant in the debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    /// Argues in favour, from an optimistic angle.
    Neo,
    /// Questions the question itself.
    Morpheus,
    /// Argues against, cynically.
    Smith,
    /// Delivers the verdict; also the narrator voice.
    Oracle,
}

impl Participant {
    /// The three debaters in grid column order.
    pub const DEBATERS: [Participant; 3] =
        [Participant::Neo, Participant::Morpheus, Participant::Smith];

    /// Resolve a speaker name from the stream.
    ///
    /// Matching is case-insensitive and accepts the "Agent Smith" /
    /// "The Oracle" forms the server uses.
    pub fn from_speaker(speaker: &str) -> Option<Self> {
        let name = speaker.trim().to_lowercase();
        let name = name
            .strip_prefix("agent ")
            .or_else(|| name.strip_prefix("the "))
            .unwrap_or(name.as_str());

        match name {
            "neo" => Some(Participant::Neo),
            "morpheus" => Some(Participant::Morpheus),
            "smith" => Some(Participant::Smith),
            "oracle" => Some(Participant::Oracle),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Participant::Neo => "Neo",
            Participant::Morpheus => "Morpheus",
            Participant::Smith => "Agent Smith",
            Participant::Oracle => "The Oracle",
        }
    }

    pub fn side(&self) -> PanelSide {
        match self {
            Participant::Neo | Participant::Morpheus => PanelSide::Left,
            Participant::Smith => PanelSide::Right,
            Participant::Oracle => PanelSide::Center,
        }
    }

    /// Grid column for debaters; the Oracle has none.
    pub fn column(&self) -> Option<usize> {
        Self::DEBATERS.iter().position(|p| p == self)
    }

    /// Default synthesis voice.
    pub fn default_voice(&self) -> &'static str {
        match self {
            Participant::Neo => "en-US-Neural2-D",
            Participant::Smith => "en-US-Neural2-A",
            Participant::Morpheus => "en-US-Neural2-J",
            Participant::Oracle => "en-US-Neural2-F",
        }
    }

    /// Default character artwork.
    pub fn default_avatar(&self) -> &'static str {
        match self {
            Participant::Neo => "/Neo.png",
            Participant::Smith => {
                "https://api.dicebear.com/7.x/avataaars/svg?seed=Smith&clothing=suit&eyes=squint&eyebrows=angry"
            }
            Participant::Morpheus => {
                "https://api.dicebear.com/7.x/avataaars/svg?seed=Morpheus&clothing=shirtCrewNeck&eyes=default&eyebrows=default"
            }
            Participant::Oracle => {
                "https://api.dicebear.com/7.x/avataaars/svg?seed=Oracle&clothing=overall&eyes=happy"
            }
        }
    }
}
