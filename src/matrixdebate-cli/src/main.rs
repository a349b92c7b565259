//! Matrix Debate CLI
//!
//! Streams a debate between Neo, Morpheus and Agent Smith from the debate
//! service, renders it in the terminal and reads every turn aloud.

mod render;
mod typewriter;

use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use matrixdebate_core::config::{self, Config};
use matrixdebate_core::playback::generate_output_filename;
use matrixdebate_core::{
    AudioQueueHandle, CommandSink, DebateClient, DebateSession, PlaybackSummary, PlaybackWorker,
    SinkChain, SpeechClient, TrailingFragment, ViewKind, WavRecorder,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use render::Renderer;

/// Config file picked up from the working directory when `--config` is absent.
const LOCAL_CONFIG: &str = "matrixdebate.toml";

#[derive(Parser)]
#[command(
    name = "matrixdebate",
    version,
    about = "Matrix Debate - watch Neo, Morpheus and Agent Smith argue a topic",
    long_about = "Streams a simulated debate from the debate service, renders it as a comic strip or a three-column grid, and reads every turn aloud."
)]
struct Cli {
    /// The topic to debate
    #[arg(value_name = "TOPIC", required_unless_present = "interactive")]
    topic: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Base URL of the debate service
    #[arg(long, env = "DEBATE_API_URL", value_name = "URL")]
    api_url: Option<String>,

    /// Layout to render the debate with
    #[arg(long, value_enum, value_name = "VIEW")]
    view: Option<ViewArg>,

    /// Typewriter delay per character, in milliseconds
    #[arg(long, value_name = "MS")]
    speed: Option<u64>,

    /// Do not synthesize or play any speech
    #[arg(long)]
    no_audio: bool,

    /// Synthesize speech but do not play it (useful with --save-wav)
    #[arg(long)]
    no_speakers: bool,

    /// Also record all speech into a WAV file
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    save_wav: Option<Option<PathBuf>>,

    /// Read topics from stdin; each new line replaces the running debate
    #[arg(short, long)]
    interactive: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Comic,
    Grid,
}

impl From<ViewArg> for ViewKind {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Comic => ViewKind::Comic,
            ViewArg::Grid => ViewKind::Grid,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    tracing::debug!(base_url = %config.api.base_url, view = ?config.display.view, "configuration loaded");

    let (audio, playback) = start_playback(&cli, &config)?;

    let trailing = if config.stream.flush_trailing_fragment {
        TrailingFragment::Flush
    } else {
        TrailingFragment::Drop
    };
    let client = DebateClient::new(&config.api.base_url)?.with_trailing_fragment(trailing);

    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let renderer = Renderer::new(std::io::stdout(), &config.display, config.avatars.clone());
    let render_task = tokio::spawn(renderer.run(updates_rx));

    let session = DebateSession::with_callback(
        client,
        config.voices.clone(),
        audio,
        Box::new(move |update| {
            let _ = updates_tx.send(update);
        }),
    );

    let failed = if cli.interactive {
        run_interactive(&session, cli.topic.as_deref()).await?
    } else {
        let topic = cli.topic.as_deref().unwrap_or_default();
        match session.submit(topic).await {
            Ok(()) => false,
            Err(e) => {
                tracing::error!("debate failed: {e}");
                true
            }
        }
    };

    // Dropping the session closes the render channel and the audio queue.
    drop(session);
    if let Err(e) = render_task.await? {
        tracing::warn!("terminal output failed: {e}");
    }

    if let Some(playback) = playback {
        println!("{}", "Waiting for speech playback to finish...".dimmed());
        report_playback(playback.await?, &cli, &config);
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file, then command-line overrides.
fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None if Path::new(LOCAL_CONFIG).exists() => Config::load(LOCAL_CONFIG)?,
        None => config::default_config(),
    };

    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url.trim_end_matches('/'));
    }
    if let Some(view) = cli.view {
        config.display.view = view.into();
    }
    if let Some(ms) = cli.speed {
        config.display.typewriter_ms = ms;
    }
    Ok(config)
}

type PlaybackTask = JoinHandle<Result<PlaybackSummary, matrixdebate_core::DebateError>>;

/// Spawn the speech worker, unless audio is off or has nowhere to go.
fn start_playback(
    cli: &Cli,
    config: &Config,
) -> Result<(AudioQueueHandle, Option<PlaybackTask>), Box<dyn std::error::Error>> {
    if cli.no_audio {
        return Ok((AudioQueueHandle::disabled(), None));
    }

    let mut sinks = SinkChain::new();
    if !cli.no_speakers {
        sinks = sinks.with(CommandSink::new(&config.playback.player)?);
    }
    if let Some(path) = wav_path(cli) {
        sinks = sinks.with(WavRecorder::new(path, config.playback.gap_seconds));
    }
    if sinks.is_empty() {
        tracing::info!("no audio output selected; speech disabled");
        return Ok((AudioQueueHandle::disabled(), None));
    }

    let speech = SpeechClient::new(&config.api.base_url)?;
    tracing::debug!(endpoint = speech.endpoint(), "speech enabled");
    let (handle, task) = PlaybackWorker::spawn(speech, sinks);
    Ok((handle, Some(task)))
}

fn wav_path(cli: &Cli) -> Option<PathBuf> {
    let requested = cli.save_wav.as_ref()?;
    Some(requested.clone().unwrap_or_else(|| {
        let topic = cli.topic.as_deref().unwrap_or("session");
        PathBuf::from(generate_output_filename(topic))
    }))
}

fn report_playback(
    result: Result<PlaybackSummary, matrixdebate_core::DebateError>,
    cli: &Cli,
    config: &Config,
) {
    match result {
        Ok(summary) => {
            tracing::info!(played = summary.played, failed = summary.failed, "speech playback finished");
            if summary.failed > 0 {
                eprintln!(
                    "{}",
                    format!("Warning: {} speech clip(s) could not be played.", summary.failed).yellow()
                );
            }
            if summary.played > 0 {
                if let Some(path) = wav_path(cli) {
                    println!("{} {}", "Audio saved to:".green(), path.display());
                }
            }
        }
        Err(e) => {
            tracing::error!(player = ?config.playback.player, "speech playback failed: {e}");
            eprintln!("{} {}", "Error:".red().bold(), e);
        }
    }
}

/// Run one debate per stdin line; a new line cancels the running debate.
///
/// Returns whether the last debate failed.
async fn run_interactive(
    session: &DebateSession,
    first: Option<&str>,
) -> Result<bool, Box<dyn std::error::Error>> {
    println!(
        "{}",
        "Enter a topic and press Enter. A new topic replaces the running debate; Ctrl-D quits."
            .dimmed()
    );

    let mut current: Option<JoinHandle<bool>> = None;
    if let Some(topic) = first {
        current = Some(spawn_debate(session, topic));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let topic = line.trim();
        if topic.is_empty() {
            continue;
        }
        if let Some(previous) = current.take() {
            previous.abort();
            let _ = previous.await;
        }
        current = Some(spawn_debate(session, topic));
    }

    match current {
        Some(task) => Ok(task.await.unwrap_or(false)),
        None => Ok(false),
    }
}

fn spawn_debate(session: &DebateSession, topic: &str) -> JoinHandle<bool> {
    let session = session.clone();
    let topic = topic.to_string();
    tokio::spawn(async move {
        match session.submit(&topic).await {
            Ok(()) => false,
            Err(e) => {
                tracing::error!("debate failed: {e}");
                true
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "matrixdebate",
            "Is the Matrix real?",
            "--api-url",
            "http://debate.local:9000/",
            "--view",
            "grid",
            "--speed",
            "0",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.api.base_url, "http://debate.local:9000");
        assert_eq!(config.display.view, ViewKind::Grid);
        assert_eq!(config.display.typewriter_ms, 0);
    }

    #[test]
    fn test_topic_required_unless_interactive() {
        assert!(Cli::try_parse_from(["matrixdebate"]).is_err());
        assert!(Cli::try_parse_from(["matrixdebate", "--interactive"]).is_ok());
    }

    #[test]
    fn test_wav_path() {
        let cli = Cli::parse_from(["matrixdebate", "Free will", "--save-wav"]);
        assert_eq!(wav_path(&cli), Some(PathBuf::from("Matrix Debate - Free will.wav")));

        let cli = Cli::parse_from(["matrixdebate", "Free will", "--save-wav", "out.wav"]);
        assert_eq!(wav_path(&cli), Some(PathBuf::from("out.wav")));

        let cli = Cli::parse_from(["matrixdebate", "Free will"]);
        assert_eq!(wav_path(&cli), None);
    }

    #[tokio::test]
    async fn test_no_audio_disables_queue() {
        let cli = Cli::parse_from(["matrixdebate", "topic", "--no-audio"]);
        let (handle, task) = start_playback(&cli, &config::default_config()).unwrap();
        assert!(!handle.is_enabled());
        assert!(task.is_none());

        let cli = Cli::parse_from(["matrixdebate", "topic", "--no-speakers"]);
        let (handle, task) = start_playback(&cli, &config::default_config()).unwrap();
        assert!(!handle.is_enabled());
        assert!(task.is_none());
    }
}
