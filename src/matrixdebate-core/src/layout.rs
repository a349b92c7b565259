//! View layouts derived from the transcript.
//!
//! Nothing here holds state: both layouts are recomputed from the
//! transcript whenever it changes.

use crate::config::AvatarsConfig;
use crate::participant::{PanelSide, Participant};
use crate::state::{DebateResult, DebateTurn};

/// One comic-strip panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel<'a> {
    pub side: PanelSide,
    pub speaker: &'a str,
    pub avatar: &'a str,
    pub content: &'a str,
}

/// Panels for every turn, alternating sides by speaker.
///
/// Only Neo and Morpheus sit on the left; everyone else, including
/// speakers outside the known cast, sits on the right.
pub fn comic_panels<'a>(transcript: &'a [DebateTurn], avatars: &'a AvatarsConfig) -> Vec<Panel<'a>> {
    transcript
        .iter()
        .map(|turn| comic_panel(turn, avatars))
        .collect()
}

pub fn comic_panel<'a>(turn: &'a DebateTurn, avatars: &'a AvatarsConfig) -> Panel<'a> {
    let side = Participant::from_speaker(&turn.speaker)
        .map(|p| p.side())
        .unwrap_or(PanelSide::Right);
    Panel {
        side,
        speaker: &turn.speaker,
        avatar: avatars.avatar_for_speaker(&turn.speaker),
        content: &turn.content,
    }
}

/// The Oracle's closing panel, once a winner is known.
pub fn verdict_panel<'a>(result: &'a DebateResult, avatars: &'a AvatarsConfig) -> Option<Panel<'a>> {
    if !result.has_verdict() {
        return None;
    }
    Some(Panel {
        side: PanelSide::Center,
        speaker: Participant::Oracle.display_name(),
        avatar: &avatars.oracle,
        content: &result.reason,
    })
}

/// One round of the three-column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRound<'a> {
    pub round: u32,
    /// Turns per debater, in [`Participant::DEBATERS`] order.
    pub columns: [Vec<&'a DebateTurn>; 3],
    /// Column headers are shown only above the first round.
    pub show_headers: bool,
    /// A "FIGHT" separator goes before every round after the first.
    pub separator_before: bool,
}

/// Group the transcript into rounds of three columns.
///
/// Only rounds that already have a turn appear, so a later round (and its
/// separator) shows up as soon as its first turn arrives. Turns from
/// speakers outside the three debaters have no column and are left out.
pub fn grid_rounds(transcript: &[DebateTurn]) -> Vec<GridRound<'_>> {
    crate::state::group_by_round(transcript)
        .into_iter()
        .enumerate()
        .map(|(i, (round, turns))| {
            let mut columns: [Vec<&DebateTurn>; 3] = Default::default();
            for turn in turns {
                if let Some(column) = Participant::from_speaker(&turn.speaker).and_then(|p| p.column()) {
                    columns[column].push(turn);
                }
            }
            GridRound {
                round,
                columns,
                show_headers: i == 0,
                separator_before: i > 0,
            }
        })
        .collect()
}
