use crate::{ReelError, Result};
use log::{debug, warn};
use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// Produces a playable audio file from a video container
pub trait AudioExtractor {
    fn extract(&self, video: &Path, audio: &Path) -> Result<()>;
}

/// Extracts audio with the `ffmpeg` command-line tool
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    program: PathBuf,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl AudioExtractor for FfmpegExtractor {
    fn extract(&self, video: &Path, audio: &Path) -> Result<()> {
        debug!("Running {} on {}", self.program.display(), video.display());
        let output = Command::new(&self.program)
            .arg("-i")
            .arg(video)
            .args(["-vn", "-y", "-loglevel", "error"])
            .arg(audio)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ReelError::Audio(format!("failed to run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            // don't leave a truncated file that would be mistaken for a finished extraction
            let _ = std::fs::remove_file(audio);
            return Err(ReelError::Audio(format!(
                "audio extraction from '{}' failed: {}",
                video.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Starts audio playback without waiting for it
pub trait AudioOutput {
    fn play_detached(&self, path: &Path);
}

/// Plays audio through the default output device on a detached thread
#[derive(Debug, Clone, Copy)]
pub struct RodioOutput {
    pub volume: f32,
}

impl Default for RodioOutput {
    fn default() -> Self {
        Self { volume: 1.0 }
    }
}

impl RodioOutput {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
        }
    }

    fn play_blocking(path: &Path, volume: f32) -> Result<()> {
        let (_stream, handle) = OutputStream::try_default()
            .map_err(|e| ReelError::Audio(format!("failed to open audio output: {}", e)))?;
        let sink = Sink::try_new(&handle).map_err(|e| ReelError::Audio(format!("failed to create audio sink: {}", e)))?;

        let file = File::open(path)?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| ReelError::Audio(format!("failed to decode {}: {}", path.display(), e)))?;

        sink.set_volume(volume);
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

impl AudioOutput for RodioOutput {
    fn play_detached(&self, path: &Path) {
        let path = path.to_path_buf();
        let volume = self.volume;
        let spawned = thread::Builder::new().name("audio".into()).spawn(move || {
            if let Err(e) = Self::play_blocking(&path, volume) {
                warn!("Audio playback failed: {}", e);
            }
        });
        if let Err(e) = spawned {
            warn!("Failed to start audio thread: {}", e);
        }
    }
}

/// Discards audio; used when playback should be silent
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAudio;

impl AudioOutput for NoAudio {
    fn play_detached(&self, path: &Path) {
        debug!("Audio disabled, not playing {}", path.display());
    }
}
