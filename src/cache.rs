use crate::audio::AudioExtractor;
use crate::catalog::SourceDescriptor;
use crate::decoder::FrameSource;
use crate::raster::Rasterizer;
use crate::signal::CancelToken;
use crate::{ReelError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk directory of rendered frames for one (source, scale) pair.
///
/// A populated directory holds `0.txt ..= (frame_count - 1).txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCache {
    dir: PathBuf,
}

impl FrameCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frame_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("{}.txt", index))
    }

    /// True iff the cache directory exists
    pub fn is_populated(&self) -> bool {
        self.dir.is_dir()
    }

    /// True iff every frame file `0..frame_count` exists and nothing else does
    pub fn is_complete(&self, frame_count: u32) -> bool {
        if !self.is_populated() {
            return false;
        }
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries.count(),
            Err(_) => return false,
        };
        entries == frame_count as usize && (0..frame_count).all(|index| self.frame_path(index).is_file())
    }

    /// Render every frame of `frames` at `scale` into the cache directory.
    ///
    /// On any failure, including cancellation, the directory is removed before
    /// the error is returned.
    pub fn populate<S, R>(
        &self,
        frames: &mut S,
        rasterizer: &R,
        scale: u32,
        aspect_multiplier: f64,
        progress: &ProgressBar,
        cancel: &CancelToken,
    ) -> Result<()>
    where
        S: FrameSource + ?Sized,
        R: Rasterizer + ?Sized,
    {
        let frame_count = frames.frame_count();
        info!("Rendering {} frames at downscale {} into {}", frame_count, scale, self.dir.display());

        let result = self.render_all(frames, rasterizer, scale, aspect_multiplier, progress, cancel);
        if let Err(ref e) = result {
            warn!("Rendering failed ({}), removing {}", e, self.dir.display());
            if let Err(cleanup) = self.discard() {
                warn!("Failed to remove {}: {}", self.dir.display(), cleanup);
            }
            progress.abandon();
        } else {
            progress.finish();
        }
        result
    }

    fn render_all<S, R>(
        &self,
        frames: &mut S,
        rasterizer: &R,
        scale: u32,
        aspect_multiplier: f64,
        progress: &ProgressBar,
        cancel: &CancelToken,
    ) -> Result<()>
    where
        S: FrameSource + ?Sized,
        R: Rasterizer + ?Sized,
    {
        fs::create_dir_all(&self.dir)?;
        progress.set_length(frames.frame_count() as u64);

        for index in 0..frames.frame_count() {
            if cancel.is_cancelled() {
                return Err(ReelError::Cancelled);
            }

            let image = frames.frame(index)?;
            let text = rasterizer.to_colored_text(&image, scale, aspect_multiplier)?;
            fs::write(self.frame_path(index), text)?;

            progress.inc(1);
        }
        Ok(())
    }

    /// Read every frame in index order
    pub fn load(&self, frame_count: u32) -> Result<Vec<String>> {
        debug!("Loading {} frames from {}", frame_count, self.dir.display());
        (0..frame_count)
            .map(|index| {
                let path = self.frame_path(index);
                fs::read_to_string(&path).map_err(|e| {
                    ReelError::Io(std::io::Error::new(
                        e.kind(),
                        format!("failed to read frame {}: {}", path.display(), e),
                    ))
                })
            })
            .collect()
    }

    /// Remove the directory and everything in it. Missing directories are fine.
    pub fn discard(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Progress bar for cache population, hidden when stderr is not a terminal
pub fn progress_bar(source: &SourceDescriptor, scale: u32) -> ProgressBar {
    if !atty::is(atty::Stream::Stderr) {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(source.frame_count() as u64);
    if let Ok(style) = ProgressStyle::with_template("{msg} {bar:40.red/white} {pos}/{len} [{elapsed_precise}<{eta_precise}]") {
        bar.set_style(style.progress_chars("##-"));
    }
    bar.set_message(format!("Rendering {} at downscale {}", source.id(), scale));
    bar
}

/// Extract the audio track once per source; the result is shared by every scale
pub fn ensure_audio<A>(source: &SourceDescriptor, extractor: &A) -> Result<()>
where
    A: AudioExtractor + ?Sized,
{
    let audio = source.audio_path();
    if audio.exists() {
        debug!("Audio already extracted: {}", audio.display());
        return Ok(());
    }
    if let Some(parent) = audio.parent() {
        fs::create_dir_all(parent)?;
    }
    info!("Extracting audio for {}", source.id());
    extractor.extract(source.video_path(), audio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::cell::Cell;
    use tempfile::tempdir;

    /// Each frame is a 1x1 image whose red channel is the frame index
    struct CountingFrames {
        count: u32,
        fail_at: Option<u32>,
    }

    impl FrameSource for CountingFrames {
        fn frame_count(&self) -> u32 {
            self.count
        }

        fn frame_rate(&self) -> u32 {
            30
        }

        fn frame(&mut self, index: u32) -> Result<RgbImage> {
            if Some(index) == self.fail_at {
                return Err(ReelError::Render {
                    index,
                    reason: "simulated decode error".into(),
                });
            }
            Ok(RgbImage::from_pixel(1, 1, Rgb([index as u8, 0, 0])))
        }
    }

    struct EchoRasterizer;

    impl Rasterizer for EchoRasterizer {
        fn to_colored_text(&self, image: &RgbImage, scale: u32, _aspect: f64) -> Result<String> {
            Ok(format!("\x1b[31mframe {} @ {}\n✓", image.get_pixel(0, 0).0[0], scale))
        }
    }

    struct FakeExtractor {
        calls: Cell<u32>,
    }

    impl AudioExtractor for FakeExtractor {
        fn extract(&self, _video: &Path, audio: &Path) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            fs::write(audio, b"mp3")?;
            Ok(())
        }
    }

    fn populate(cache: &FrameCache, frames: &mut CountingFrames, cancel: &CancelToken) -> Result<()> {
        cache.populate(frames, &EchoRasterizer, 7, 1.0, &ProgressBar::hidden(), cancel)
    }

    #[test]
    fn test_populate_then_load() {
        let root = tempdir().unwrap();
        let cache = FrameCache::new(root.path().join("frames").join("7"));
        assert!(!cache.is_populated());

        let mut frames = CountingFrames { count: 12, fail_at: None };
        populate(&cache, &mut frames, &CancelToken::new()).unwrap();

        assert!(cache.is_populated());
        assert!(cache.is_complete(12));
        for index in 0..12 {
            assert!(cache.frame_path(index).is_file());
        }

        let loaded = cache.load(12).unwrap();
        assert_eq!(loaded.len(), 12);
        for (index, frame) in loaded.iter().enumerate() {
            assert_eq!(frame, &format!("\x1b[31mframe {} @ 7\n✓", index));
        }

        // reloading without repopulating yields the same frames
        assert_eq!(cache.load(12).unwrap(), loaded);
    }

    #[test]
    fn test_failure_rolls_back() {
        let root = tempdir().unwrap();
        let cache = FrameCache::new(root.path().join("frames").join("7"));

        let mut frames = CountingFrames { count: 10, fail_at: Some(4) };
        let err = populate(&cache, &mut frames, &CancelToken::new()).unwrap_err();

        assert!(matches!(err, ReelError::Render { index: 4, .. }));
        assert!(!cache.dir().exists());
        assert!(!cache.is_populated());
    }

    #[test]
    fn test_cancel_rolls_back() {
        let root = tempdir().unwrap();
        let cache = FrameCache::new(root.path().join("7"));
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut frames = CountingFrames { count: 3, fail_at: None };
        let err = populate(&cache, &mut frames, &cancel).unwrap_err();

        assert!(matches!(err, ReelError::Cancelled));
        assert!(!cache.dir().exists());
    }

    #[test]
    fn test_load_missing_frame_fails() {
        let root = tempdir().unwrap();
        let cache = FrameCache::new(root.path());
        fs::write(cache.frame_path(0), "a").unwrap();
        fs::write(cache.frame_path(2), "c").unwrap();

        assert!(cache.load(1).is_ok());
        assert!(cache.load(3).is_err());
    }

    #[test]
    fn test_existing_but_incomplete() {
        let root = tempdir().unwrap();
        let cache = FrameCache::new(root.path().join("33"));
        fs::create_dir_all(cache.dir()).unwrap();
        fs::write(cache.frame_path(0), "a").unwrap();

        assert!(cache.is_populated());
        assert!(!cache.is_complete(2));

        cache.discard().unwrap();
        assert!(!cache.is_populated());
        // discarding twice is fine
        cache.discard().unwrap();
    }

    #[test]
    fn test_scales_cached_side_by_side() {
        let root = tempdir().unwrap();
        let low = FrameCache::new(root.path().join("19"));
        let high = FrameCache::new(root.path().join("45"));

        let mut frames = CountingFrames { count: 2, fail_at: None };
        low.populate(&mut frames, &EchoRasterizer, 19, 1.0, &ProgressBar::hidden(), &CancelToken::new()).unwrap();
        high.populate(&mut frames, &EchoRasterizer, 45, 1.0, &ProgressBar::hidden(), &CancelToken::new()).unwrap();

        assert_eq!(low.load(2).unwrap()[1], "\x1b[31mframe 1 @ 19\n✓");
        assert_eq!(high.load(2).unwrap()[1], "\x1b[31mframe 1 @ 45\n✓");
    }

    #[test]
    fn test_audio_extracted_once() {
        let root = tempdir().unwrap();
        let source = SourceDescriptor::new(root.path(), "clip", "clip.mp4", (4, 4), 1, 1, 1).unwrap();
        let extractor = FakeExtractor { calls: Cell::new(0) };

        ensure_audio(&source, &extractor).unwrap();
        ensure_audio(&source, &extractor).unwrap();

        assert_eq!(extractor.calls.get(), 1);
        assert!(source.audio_path().is_file());
    }
}
