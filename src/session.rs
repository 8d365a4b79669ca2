use crate::audio::AudioExtractor;
use crate::cache::{ensure_audio, progress_bar, FrameCache};
use crate::catalog::{Catalog, SourceDescriptor};
use crate::decoder::FrameSource;
use crate::raster::Rasterizer;
use crate::scale::ScaleDecision;
use crate::signal::CancelToken;
use crate::Result;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything one run needs to play: the title, the resolved scale and the
/// frames loaded from that scale's cache.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    source: Arc<SourceDescriptor>,
    chosen_scale: u32,
    frames_path: PathBuf,
    frames: Arc<[String]>,
}

impl PlaybackSession {
    /// Extract audio and render frames as needed, then load the frames.
    ///
    /// `open_frames` is only called when the cache has to be (re)built.
    pub fn prepare<F, S, R, E>(
        source: Arc<SourceDescriptor>,
        decision: ScaleDecision,
        open_frames: F,
        rasterizer: &R,
        extractor: &E,
        cancel: &CancelToken,
    ) -> Result<Self>
    where
        F: FnOnce(&SourceDescriptor) -> Result<S>,
        S: FrameSource,
        R: Rasterizer + ?Sized,
        E: AudioExtractor + ?Sized,
    {
        if let Some(shortfall) = &decision.shortfall {
            warn!("{}", shortfall);
        }
        info!("Playing '{}' at downscale {}", source.id(), decision.scale);

        ensure_audio(&source, extractor)?;

        let cache = FrameCache::new(&decision.cache_dir);
        ensure_frames(&source, &cache, decision.scale, open_frames, rasterizer, cancel)?;
        let frames = cache.load(source.frame_count())?;

        Ok(Self {
            source,
            chosen_scale: decision.scale,
            frames_path: decision.cache_dir,
            frames: frames.into(),
        })
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn chosen_scale(&self) -> u32 {
        self.chosen_scale
    }

    pub fn frames_path(&self) -> &Path {
        &self.frames_path
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Shared handle to the loaded frames
    pub fn shared_frames(&self) -> Arc<[String]> {
        Arc::clone(&self.frames)
    }
}

/// Make sure `cache` holds a full render of `source` at `scale`.
///
/// A directory that exists but does not hold exactly `frame_count` frames is
/// treated as left over from an interrupted run and rebuilt.
pub fn ensure_frames<F, S, R>(
    source: &SourceDescriptor,
    cache: &FrameCache,
    scale: u32,
    open_frames: F,
    rasterizer: &R,
    cancel: &CancelToken,
) -> Result<()>
where
    F: FnOnce(&SourceDescriptor) -> Result<S>,
    S: FrameSource,
    R: Rasterizer + ?Sized,
{
    if cache.is_populated() {
        if cache.is_complete(source.frame_count()) {
            info!("Using cached frames in {}", cache.dir().display());
            return Ok(());
        }
        warn!("Cache {} is incomplete, rendering it again", cache.dir().display());
        cache.discard()?;
    }

    let mut frames = open_frames(source)?;
    let progress = progress_bar(source, scale);
    cache.populate(&mut frames, rasterizer, scale, source.aspect_multiplier(), &progress, cancel)
}

/// Pre-render every title at its base scale and extract its audio
pub fn prepare_catalog<F, S, R, E>(
    catalog: &Catalog,
    mut open_frames: F,
    rasterizer: &R,
    extractor: &E,
    cancel: &CancelToken,
) -> Result<()>
where
    F: FnMut(&SourceDescriptor) -> Result<S>,
    S: FrameSource,
    R: Rasterizer + ?Sized,
    E: AudioExtractor + ?Sized,
{
    for source in catalog.iter() {
        info!("Preparing '{}'", source.id());
        ensure_audio(source, extractor)?;
        let scale = source.base_scale();
        let cache = FrameCache::new(source.frames_dir(scale));
        ensure_frames(source, &cache, scale, &mut open_frames, rasterizer, cancel)?;
    }
    Ok(())
}
