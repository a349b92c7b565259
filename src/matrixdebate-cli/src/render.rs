//! Terminal views of a running debate.

use colored::{ColoredString, Colorize};
use matrixdebate_core::config::{AvatarsConfig, DisplayConfig};
use matrixdebate_core::layout::{self, GridRound, Panel};
use matrixdebate_core::{DebateResult, DebateTurn, PanelSide, Participant, SessionUpdate, ViewKind};
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::typewriter::Typewriter;

const WIDTH: usize = 72;
const PANEL_WIDTH: usize = 56;
const COLUMN_WIDTH: usize = 22;
const COLUMN_GAP: &str = "  ";

/// Renders session updates as they arrive.
pub struct Renderer<W> {
    out: W,
    view: ViewKind,
    delay: Duration,
    avatars: AvatarsConfig,
    /// Turns seen since the last reset, for the grid layout.
    transcript: Vec<DebateTurn>,
    /// Highest round shown in the grid so far.
    latest_round: Option<u32>,
}

impl<W: Write + Send> Renderer<W> {
    pub fn new(out: W, display: &DisplayConfig, avatars: AvatarsConfig) -> Self {
        Self {
            out,
            view: display.view,
            delay: Duration::from_millis(display.typewriter_ms),
            avatars,
            transcript: Vec::new(),
            latest_round: None,
        }
    }

    /// Render until the session drops its sender; returns the writer.
    pub async fn run(mut self, mut updates: mpsc::UnboundedReceiver<SessionUpdate>) -> io::Result<W> {
        while let Some(update) = updates.recv().await {
            self.render(update).await?;
        }
        Ok(self.out)
    }

    pub async fn render(&mut self, update: SessionUpdate) -> io::Result<()> {
        match update {
            SessionUpdate::Reset { topic } => {
                self.transcript.clear();
                self.latest_round = None;
                self.header(&topic)
            }
            SessionUpdate::Status(message) => {
                writeln!(self.out, "{} {}", "»".bright_green(), message.green().dimmed())
            }
            SessionUpdate::TurnAdded { turn, .. } => match self.view {
                ViewKind::Comic => {
                    let panel = layout::comic_panel(&turn, &self.avatars);
                    let (header, body) = (panel_header(&panel), panel_body(&panel));
                    writeln!(self.out)?;
                    writeln!(self.out, "{}", header)?;
                    self.type_out(&body).await
                }
                ViewKind::Grid => self.grid_turn(turn),
            },
            SessionUpdate::Verdict(result) => self.verdict(&result).await,
            SessionUpdate::Failed(message) => {
                writeln!(self.out, "{} {}", "Error:".red().bold(), message.red())
            }
            SessionUpdate::StreamEnded => {
                writeln!(self.out)?;
                writeln!(self.out, "{}", "═".repeat(WIDTH).bright_green())?;
                writeln!(self.out, "{}", "  Debate concluded.".bright_green().bold())?;
                writeln!(self.out, "{}", "═".repeat(WIDTH).bright_green())
            }
        }
    }

    fn header(&mut self, topic: &str) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", "═".repeat(WIDTH).bright_green())?;
        writeln!(
            self.out,
            "{}",
            format!("  {} - Enter the Matrix Debate", "FUTURIS 2.0".bold()).bright_green()
        )?;
        writeln!(self.out, "{}", "═".repeat(WIDTH).bright_green())?;
        writeln!(self.out, "{} {}", "Topic:".bold(), topic.bright_white())?;
        writeln!(self.out)
    }

    async fn verdict(&mut self, result: &DebateResult) -> io::Result<()> {
        let Some(panel) = layout::verdict_panel(result, &self.avatars) else {
            return Ok(());
        };

        writeln!(self.out)?;
        writeln!(self.out, "{}", "═".repeat(WIDTH).bright_yellow())?;
        writeln!(self.out, "{}", panel_header(&panel))?;
        writeln!(
            self.out,
            "  {} {}",
            "VERDICT:".bright_yellow().bold(),
            result.winner.bright_white().bold()
        )?;
        let body = panel_body(&panel);
        self.type_out(&body).await?;
        writeln!(
            self.out,
            "  {}",
            format!("Confidence: {}%", result.confidence_percent()).bright_green()
        )?;
        writeln!(self.out, "{}", "═".repeat(WIDTH).bright_yellow())
    }

    async fn type_out(&mut self, text: &str) -> io::Result<()> {
        let mut typewriter = Typewriter::new(self.delay)
            .with_on_complete(|| tracing::trace!("panel revealed"));
        typewriter.set_text(text);
        typewriter.type_out(&mut self.out).await?;
        tracing::trace!(
            chars = typewriter.displayed().chars().count(),
            complete = typewriter.is_complete(),
            "typewriter done"
        );
        writeln!(self.out)
    }

    /// Show one grid turn as soon as it arrives.
    ///
    /// A turn in the newest round prints as a row in its column, behind a
    /// FIGHT separator when it opens a new round. A turn for an earlier
    /// round reprints that whole round.
    fn grid_turn(&mut self, turn: DebateTurn) -> io::Result<()> {
        let Some(column) = Participant::from_speaker(&turn.speaker).and_then(|p| p.column()) else {
            tracing::debug!(speaker = %turn.speaker, "speaker has no grid column");
            return Ok(());
        };

        let mut lines = Vec::new();
        if self.transcript.is_empty() {
            lines.extend(grid_header());
        }

        let round = turn.round;
        self.transcript.push(turn);
        match self.latest_round {
            Some(latest) if round < latest => {
                let rounds = layout::grid_rounds(&self.transcript);
                if let Some(block) = rounds.iter().find(|r| r.round == round) {
                    lines.push(format!("  ↺ ROUND {} (updated)", round).dimmed().to_string());
                    lines.extend(grid_rows(&round_cells(block)));
                }
            }
            latest => {
                if latest.is_some_and(|latest| round > latest) {
                    lines.push(fight_separator(round));
                }
                self.latest_round = Some(latest.map_or(round, |latest| latest.max(round)));

                let mut cells: [Vec<String>; 3] = Default::default();
                if let Some(turn) = self.transcript.last() {
                    cells[column] = wrap(&turn.content, COLUMN_WIDTH);
                }
                lines.extend(grid_rows(&cells));
            }
        }

        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }
}

fn speaker_color(speaker: &str, text: &str) -> ColoredString {
    match Participant::from_speaker(speaker) {
        Some(Participant::Neo) => text.bright_green(),
        Some(Participant::Morpheus) => text.bright_cyan(),
        Some(Participant::Smith) => text.bright_red(),
        Some(Participant::Oracle) => text.bright_yellow(),
        None => text.white(),
    }
}

fn panel_header(panel: &Panel<'_>) -> String {
    let name = panel.speaker.to_uppercase();
    match panel.side {
        PanelSide::Left => format!(
            "{} {}  {}",
            "▶".bright_green(),
            speaker_color(panel.speaker, &name).bold(),
            format!("[{}]", panel.avatar).dimmed()
        ),
        PanelSide::Right => {
            let label = format!("[{}]  {} ◀", panel.avatar, name);
            let pad = WIDTH.saturating_sub(label.chars().count());
            format!(
                "{}{}  {} {}",
                " ".repeat(pad),
                format!("[{}]", panel.avatar).dimmed(),
                speaker_color(panel.speaker, &name).bold(),
                "◀".bright_green()
            )
        }
        PanelSide::Center => format!(
            "{}{}  {}",
            " ".repeat((WIDTH.saturating_sub(name.chars().count())) / 2),
            speaker_color(panel.speaker, &name).bold(),
            format!("[{}]", panel.avatar).dimmed()
        ),
    }
}

/// Wrapped panel text, indented for its side.
fn panel_body(panel: &Panel<'_>) -> String {
    let indent = match panel.side {
        PanelSide::Left | PanelSide::Center => "  ".to_string(),
        PanelSide::Right => " ".repeat(WIDTH - PANEL_WIDTH),
    };
    wrap(panel.content, PANEL_WIDTH - 2)
        .iter()
        .map(|line| format!("{}{}", indent, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn fight_separator(round: u32) -> String {
    let label = format!(" FIGHT · ROUND {} ", round);
    let side = WIDTH.saturating_sub(label.chars().count()) / 2;
    format!(
        "{}{}{}",
        "─".repeat(side).bright_red(),
        label.bright_red().bold(),
        "─".repeat(side).bright_red()
    )
}

fn grid_header() -> Vec<String> {
    let headers: Vec<String> = Participant::DEBATERS
        .iter()
        .map(|p| {
            let name = format!("{:<width$}", p.display_name(), width = COLUMN_WIDTH);
            speaker_color(p.display_name(), &name).bold().to_string()
        })
        .collect();
    vec![
        headers.join(COLUMN_GAP),
        std::iter::repeat_n("─".repeat(COLUMN_WIDTH), 3)
            .collect::<Vec<_>>()
            .join(COLUMN_GAP),
    ]
}

/// Wrapped cell lines per column for a whole round.
fn round_cells(round: &GridRound<'_>) -> [Vec<String>; 3] {
    round.columns.clone().map(|turns| {
        let mut cells = Vec::new();
        for (i, turn) in turns.iter().enumerate() {
            if i > 0 {
                cells.push(String::new());
            }
            cells.extend(wrap(&turn.content, COLUMN_WIDTH));
        }
        cells
    })
}

/// Three columns of cell lines, laid side by side.
fn grid_rows(columns: &[Vec<String>; 3]) -> Vec<String> {
    let height = columns.iter().map(Vec::len).max().unwrap_or(0);
    let mut lines: Vec<String> = (0..height)
        .map(|row| {
            let cells: Vec<String> = columns
                .iter()
                .zip(Participant::DEBATERS)
                .map(|(cells, participant)| {
                    let cell = cells.get(row).map(String::as_str).unwrap_or("");
                    let cell = format!("{:<width$}", cell, width = COLUMN_WIDTH);
                    speaker_color(participant.display_name(), &cell).to_string()
                })
                .collect();
            cells.join(COLUMN_GAP).trim_end().to_string()
        })
        .collect();
    lines.push(String::new());
    lines
}

/// Word-wrap `text` into lines of at most `width` characters.
///
/// Words longer than a line are split so grid columns stay aligned.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > width {
            if line_len > 0 {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            lines.push(chars.drain(..width).collect());
        }
        if chars.is_empty() {
            continue;
        }

        if line_len > 0 && line_len + 1 + chars.len() > width {
            lines.push(std::mem::take(&mut line));
            line_len = 0;
        }
        if line_len > 0 {
            line.push(' ');
            line_len += 1;
        }
        line_len += chars.len();
        line.extend(chars);
    }

    if line_len > 0 {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrixdebate_core::config::default_config;

    fn renderer(view: ViewKind) -> Renderer<Vec<u8>> {
        colored::control::set_override(false);
        let mut display = default_config().display;
        display.view = view;
        display.typewriter_ms = 0;
        Renderer::new(Vec::new(), &display, AvatarsConfig::default())
    }

    fn turn(speaker: &str, content: &str, round: u32) -> SessionUpdate {
        SessionUpdate::TurnAdded {
            index: 0,
            turn: DebateTurn {
                speaker: speaker.to_string(),
                content: content.to_string(),
                round,
            },
        }
    }

    async fn render_all(view: ViewKind, updates: Vec<SessionUpdate>) -> String {
        let (tx, rx) = mpsc::unbounded_channel();
        for update in updates {
            tx.send(update).unwrap();
        }
        drop(tx);
        let out = renderer(view).run(rx).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    fn verdict() -> SessionUpdate {
        SessionUpdate::Verdict(DebateResult {
            transcript: Vec::new(),
            winner: "Neo".to_string(),
            confidence: 0.87,
            reason: "Logic prevails.".to_string(),
        })
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("one two three four five", 9), vec!["one two", "three", "four five"]);
        assert_eq!(wrap("abcdefghij xy", 4), vec!["abcd", "efgh", "ij", "xy"]);
        assert!(wrap("   ", 10).is_empty());
    }

    #[tokio::test]
    async fn test_comic_view() {
        let output = render_all(
            ViewKind::Comic,
            vec![
                SessionUpdate::Reset {
                    topic: "Is the Matrix real?".to_string(),
                },
                SessionUpdate::Status("Round 1".to_string()),
                turn("Neo", "Yes.", 1),
                turn("Agent Smith", "No, Mr. Anderson.", 1),
                verdict(),
                SessionUpdate::StreamEnded,
            ],
        )
        .await;

        assert!(output.contains("Topic: Is the Matrix real?"));
        assert!(output.contains("» Round 1"));
        assert!(output.contains("▶ NEO  [/Neo.png]"));
        assert!(output.contains("  Yes.\n"));
        assert!(output.contains("AGENT SMITH ◀"));
        let indent = " ".repeat(WIDTH - PANEL_WIDTH);
        assert!(output.contains(&format!("{}No, Mr. Anderson.", indent)));
        assert!(output.contains("VERDICT: Neo"));
        assert!(output.contains("Logic prevails."));
        assert!(output.contains("Confidence: 87%"));
        assert!(output.contains("Debate concluded."));
    }

    fn row(cells: [&str; 3]) -> String {
        format!(
            "{:<w$}{}{:<w$}{}{}",
            cells[0],
            COLUMN_GAP,
            cells[1],
            COLUMN_GAP,
            cells[2],
            w = COLUMN_WIDTH
        )
        .trim_end()
        .to_string()
    }

    #[tokio::test]
    async fn test_grid_view_shows_turns_as_they_arrive() {
        let mut renderer = renderer(ViewKind::Grid);
        renderer.render(turn("Neo", "n1", 1)).await.unwrap();
        let output = String::from_utf8(renderer.out.clone()).unwrap();
        assert!(output.contains("Neo"));
        assert!(output.lines().any(|line| line == "n1"));
        assert!(!output.contains("FIGHT"));

        renderer.render(turn("Morpheus", "m1", 1)).await.unwrap();
        renderer.render(turn("Agent Smith", "s2", 2)).await.unwrap();
        let output = String::from_utf8(renderer.out.clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines.contains(&row(["", "m1", ""]).as_str()));

        let separator = lines.iter().position(|line| line.contains("FIGHT · ROUND 2")).unwrap();
        let smith = lines.iter().position(|line| *line == row(["", "", "s2"])).unwrap();
        assert!(separator < smith);

        renderer.render(turn("Neo", "n2", 2)).await.unwrap();
        renderer.render(SessionUpdate::StreamEnded).await.unwrap();
        let output = String::from_utf8(renderer.out.clone()).unwrap();
        assert_eq!(output.matches("FIGHT").count(), 1);
        assert_eq!(output.matches("Agent Smith").count(), 1);
    }

    #[tokio::test]
    async fn test_grid_view_late_turn_reprints_its_round() {
        let output = render_all(
            ViewKind::Grid,
            vec![
                turn("Neo", "n1", 1),
                turn("Morpheus", "m2", 2),
                turn("Agent Smith", "late", 1),
                SessionUpdate::StreamEnded,
            ],
        )
        .await;

        let lines: Vec<&str> = output.lines().collect();
        let marker = lines.iter().position(|line| line.contains("ROUND 1 (updated)")).unwrap();
        assert_eq!(lines[marker + 1], row(["n1", "", "late"]));
        assert_eq!(output.matches("FIGHT").count(), 1);
    }

    #[tokio::test]
    async fn test_grid_view_skips_unknown_speakers() {
        let output = render_all(
            ViewKind::Grid,
            vec![turn("Trinity", "t1", 1), turn("Agent Smith", "s1", 1)],
        )
        .await;
        assert!(!output.contains("t1"));
        assert!(output.lines().any(|line| line == row(["", "", "s1"])));
    }

    #[tokio::test]
    async fn test_failure_is_shown() {
        let output = render_all(
            ViewKind::Comic,
            vec![SessionUpdate::Failed("server returned 500".to_string())],
        )
        .await;
        assert!(output.contains("Error: server returned 500"));
    }
}
