//! Audio sinks: where synthesized clips go once they arrive.

use async_trait::async_trait;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::DebateError;
use crate::tts::AudioClip;

/// Plays clips one at a time; `play` returns once the clip has finished.
#[async_trait]
pub trait AudioSink: Send {
    async fn play(&mut self, clip: &AudioClip) -> Result<(), DebateError>;

    /// Called once after the last clip.
    async fn finish(&mut self) -> Result<(), DebateError> {
        Ok(())
    }
}

/// Pipes each clip into an external player process and waits for it to exit.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    /// `command` is the program followed by its arguments.
    pub fn new(command: &[String]) -> Result<Self, DebateError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| DebateError::ConfigError("playback.player is empty".to_string()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl AudioSink for CommandSink {
    async fn play(&mut self, clip: &AudioClip) -> Result<(), DebateError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&clip.mp3).await?;
            stdin.shutdown().await?;
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(DebateError::Audio(format!(
                "player '{}' exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}

/// Records every clip and writes the whole debate to a WAV file on finish.
pub struct WavRecorder {
    path: PathBuf,
    gap_seconds: f32,
    /// Rate of the first clip; later clips are resampled to it.
    sample_rate: Option<u32>,
    /// Every clip so far, already separated by silence.
    samples: Vec<f32>,
    clips: usize,
}

impl WavRecorder {
    pub fn new(path: impl Into<PathBuf>, gap_seconds: f32) -> Self {
        Self {
            path: path.into(),
            gap_seconds,
            sample_rate: None,
            samples: Vec::new(),
            clips: 0,
        }
    }

    pub fn clip_count(&self) -> usize {
        self.clips
    }

    /// Append decoded mono samples after a gap of silence.
    fn push_samples(&mut self, samples: Vec<f32>, sample_rate: u32) {
        let target = *self.sample_rate.get_or_insert(sample_rate);
        let samples = if sample_rate == target {
            samples
        } else {
            resample_linear(samples, sample_rate as f32 / target as f32)
        };

        if self.clips > 0 {
            let gap = (self.gap_seconds * target as f32) as usize;
            self.samples.extend(std::iter::repeat_n(0.0, gap));
        }
        self.samples.extend(samples);
        self.clips += 1;
    }
}

#[async_trait]
impl AudioSink for WavRecorder {
    async fn play(&mut self, clip: &AudioClip) -> Result<(), DebateError> {
        let (samples, sample_rate) = decode_mp3(&clip.mp3)?;
        self.push_samples(samples, sample_rate);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), DebateError> {
        let Some(sample_rate) = self.sample_rate else {
            tracing::info!("no audio recorded; skipping WAV output");
            return Ok(());
        };

        save_wav(&self.path, &self.samples, sample_rate)?;
        tracing::info!(
            path = %self.path.display(),
            clips = self.clips,
            samples = self.samples.len(),
            "debate audio saved"
        );
        Ok(())
    }
}

/// Plays each clip through several sinks in order.
#[derive(Default)]
pub struct SinkChain {
    sinks: Vec<Box<dyn AudioSink>>,
}

impl SinkChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl AudioSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AudioSink for SinkChain {
    /// Every sink sees the clip even if an earlier one fails; the first
    /// error is returned.
    async fn play(&mut self, clip: &AudioClip) -> Result<(), DebateError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.play(clip).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn finish(&mut self) -> Result<(), DebateError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.finish().await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Decode MP3 bytes to mono f32 samples and their sample rate.
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32), DebateError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate.get_or_insert(frame.sample_rate as u32);
                let channels = frame.channels.max(1);
                // Downmix interleaved channels to mono.
                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    chunk.iter().map(|&s| f32::from(s) / 32768.0).sum::<f32>() / chunk.len() as f32
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(DebateError::Audio(format!("MP3 decode error: {}", e))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| DebateError::Audio("no MP3 frames in clip".to_string()))?;
    Ok((samples, sample_rate))
}

/// Write mono samples as 16-bit PCM.
pub fn save_wav(path: &std::path::Path, samples: &[f32], sample_rate: u32) -> Result<(), DebateError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let wav_err = |e: hound::Error| DebateError::Audio(format!("Failed to save WAV: {}", e));
    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(value).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}

/// Resample by linear interpolation.
/// Ratio > 1.0 shortens the signal (source rate above target rate).
pub fn resample_linear(samples: Vec<f32>, ratio: f32) -> Vec<f32> {
    if (ratio - 1.0).abs() < 0.001 {
        return samples;
    }

    let new_len = (samples.len() as f32 / ratio) as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f32 * ratio;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f32;

        if src_idx + 1 < samples.len() {
            result.push(samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac);
        } else if src_idx < samples.len() {
            result.push(samples[src_idx]);
        }
    }

    result
}

/// Generate a WAV file name for a debate topic.
pub fn generate_output_filename(topic: &str) -> String {
    let sanitized: String = topic
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(50)
        .collect();

    format!("Matrix Debate - {}.wav", sanitized.trim())
}
