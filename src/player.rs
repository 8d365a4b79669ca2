use crate::audio::AudioOutput;
use crate::signal::CancelToken;
use crate::{ReelError, Result};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Print, ResetColor},
    terminal::{Clear, ClearType},
};
use log::{debug, info, warn};
use std::io::{stdout, Stdout, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Playback lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Preparing,
    Loaded,
    Playing,
    Interrupted,
    Terminated,
}

/// Fixed-rate frame pacing.
///
/// Each call to [`sleep`](Self::sleep) waits out whatever is left of one frame
/// interval since the previous call. Lateness is not carried over to later frames.
#[derive(Debug)]
pub struct FrameTimer {
    interval: Duration,
    last_tick: Instant,
}

impl FrameTimer {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            interval: frame_interval(frame_rate),
            last_tick: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Slack left in the current frame after `elapsed` of display work
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }

    pub async fn sleep(&mut self) {
        let slack = self.remaining(self.last_tick.elapsed());
        if !slack.is_zero() {
            tokio::time::sleep(slack).await;
        }
        self.last_tick = Instant::now();
    }
}

/// Duration of one frame at `frame_rate` frames per second
pub fn frame_interval(frame_rate: u32) -> Duration {
    Duration::from_secs(1) / frame_rate.max(1)
}

/// What a finished playback run did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub frames_shown: u64,
    pub passes_completed: u64,
}

/// Draws frames to a terminal and loops them until cancelled
pub struct Player<W: Write> {
    out: W,
    state: PlaybackState,
}

impl Player<Stdout> {
    pub fn stdout() -> Self {
        Self::new(stdout())
    }
}

impl<W: Write> Player<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: PlaybackState::Preparing,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Mark frames as loaded and ready to play
    pub fn set_loaded(&mut self) {
        self.state = PlaybackState::Loaded;
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Loop `frames` at `frame_rate` until `cancel` fires, restarting the audio at
    /// the top of every pass. Always restores the terminal before returning.
    pub async fn play<A>(
        &mut self,
        frames: &[String],
        frame_rate: u32,
        audio_path: &Path,
        audio: &A,
        cancel: &CancelToken,
    ) -> Result<PlaybackSummary>
    where
        A: AudioOutput + ?Sized,
    {
        if frames.is_empty() {
            return Err(ReelError::InvalidConfig("no frames to play".into()));
        }

        let result = self.run(frames, frame_rate, audio_path, audio, cancel).await;
        self.state = PlaybackState::Interrupted;
        let restored = self.restore();
        self.state = PlaybackState::Terminated;
        match (result, restored) {
            (Err(e), Err(restore_err)) => {
                warn!("Failed to restore terminal: {}", restore_err);
                Err(e)
            }
            (Ok(_), Err(restore_err)) => Err(restore_err),
            (result, Ok(())) => result,
        }
    }

    async fn run<A>(
        &mut self,
        frames: &[String],
        frame_rate: u32,
        audio_path: &Path,
        audio: &A,
        cancel: &CancelToken,
    ) -> Result<PlaybackSummary>
    where
        A: AudioOutput + ?Sized,
    {
        let mut summary = PlaybackSummary::default();
        let mut timer = FrameTimer::new(frame_rate);

        queue!(self.out, Hide, Clear(ClearType::All))?;
        self.out.flush()?;
        self.state = PlaybackState::Playing;
        info!("Playing {} frames at {} FPS", frames.len(), frame_rate);

        'passes: loop {
            if cancel.is_cancelled() {
                break;
            }
            audio.play_detached(audio_path);

            for frame in frames {
                if cancel.is_cancelled() {
                    break 'passes;
                }
                self.draw(frame)?;
                summary.frames_shown += 1;

                tokio::select! {
                    _ = cancel.cancelled() => break 'passes,
                    _ = timer.sleep() => {}
                }
            }

            summary.passes_completed += 1;
            debug!("Completed pass {}", summary.passes_completed);
        }

        info!(
            "Playback interrupted after {} frames ({} full passes)",
            summary.frames_shown, summary.passes_completed
        );
        Ok(summary)
    }

    fn draw(&mut self, frame: &str) -> Result<()> {
        queue!(self.out, MoveTo(0, 0), Print(frame), ResetColor)?;
        self.out.flush()?;
        Ok(())
    }

    /// Show the cursor and clear the screen
    pub fn restore(&mut self) -> Result<()> {
        queue!(self.out, ResetColor, Clear(ClearType::All), MoveTo(0, 0), Show)?;
        self.out.flush()?;
        debug!("Terminal restored");
        Ok(())
    }
}
