use crate::{ReelError, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the optional catalog file inside the data root
pub const CATALOG_FILE: &str = "catalog.json";

/// File name of the extracted audio track inside a title's directory
pub const AUDIO_FILE: &str = "audio.mp3";

/// Immutable description of one playable title.
///
/// `aspect_multiplier` is always derived from `resolution`; there is no way to
/// set it independently.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    id: String,
    aliases: Vec<String>,
    video_path: PathBuf,
    audio_path: PathBuf,
    frames_root: PathBuf,
    resolution: (u32, u32),
    frame_count: u32,
    frame_rate: u32,
    base_scale: u32,
}

impl SourceDescriptor {
    /// Build a descriptor rooted at `<data_root>/<id>/`
    pub fn new(
        data_root: &Path,
        id: &str,
        video_file: &str,
        resolution: (u32, u32),
        base_scale: u32,
        frame_count: u32,
        frame_rate: u32,
    ) -> Result<Self> {
        let (width, height) = resolution;
        if width == 0 || height == 0 {
            return Err(ReelError::InvalidConfig(format!(
                "'{}': resolution must be positive, got {}x{}",
                id, width, height
            )));
        }
        if base_scale == 0 {
            return Err(ReelError::InvalidConfig(format!("'{}': base scale must be at least 1", id)));
        }
        if frame_count == 0 || frame_rate == 0 {
            return Err(ReelError::InvalidConfig(format!(
                "'{}': frame count and frame rate must be positive",
                id
            )));
        }

        let dir = data_root.join(id);
        Ok(Self {
            id: id.to_string(),
            aliases: Vec::new(),
            video_path: dir.join(video_file),
            audio_path: dir.join(AUDIO_FILE),
            frames_root: dir.join("frames"),
            resolution,
            frame_count,
            frame_rate,
            base_scale,
        })
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    pub fn frames_root(&self) -> &Path {
        &self.frames_root
    }

    /// Native (width, height) in pixels
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Width divided by height
    pub fn aspect_multiplier(&self) -> f64 {
        self.resolution.0 as f64 / self.resolution.1 as f64
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn base_scale(&self) -> u32 {
        self.base_scale
    }

    /// Cache directory for frames rendered at `scale`
    pub fn frames_dir(&self, scale: u32) -> PathBuf {
        self.frames_root.join(scale.to_string())
    }

    fn answers_to(&self, name: &str) -> bool {
        let wanted = normalize(name);
        normalize(&self.id) == wanted || self.aliases.iter().any(|alias| normalize(alias) == wanted)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

/// One entry of `catalog.json`
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    video: String,
    resolution: (u32, u32),
    base_scale: u32,
    #[serde(default)]
    frame_count: Option<u32>,
    #[serde(default)]
    frame_rate: Option<u32>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Frame count and rate of a video, as reported by the decoder
pub type ProbeFn<'a> = dyn Fn(&Path) -> Result<(u32, u32)> + 'a;

/// Built-in titles: id, video file, resolution, base scale, frame count, frame rate.
/// Count and rate are used only when the video is not on disk to be probed.
const BUILTIN: &[(&str, &str, (u32, u32), u32, u32, u32)] = &[
    ("chipi-chipi", "chipichipi.mp4", (1920, 1080), 33, 740, 30),
    ("shikonoko", "shikonoko.mp4", (1920, 1080), 19, 334, 30),
    ("kiss-me", "kiss_me.mp4", (1920, 1080), 19, 1032, 30),
    ("shigure-loli", "loli.mp4", (1920, 1080), 24, 850, 30),
    ("shigure-catcher", "catcher.mp4", (480, 854), 33, 781, 30),
    ("02", "02.mp4", (720, 1280), 33, 1368, 30),
];

/// Read-only set of titles, loaded once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct Catalog {
    data_root: PathBuf,
    sources: BTreeMap<String, Arc<SourceDescriptor>>,
}

impl Catalog {
    /// Build a catalog from already-constructed descriptors
    pub fn from_sources<I>(data_root: &Path, sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = SourceDescriptor>,
    {
        let mut map = BTreeMap::new();
        for source in sources {
            let id = source.id().to_string();
            if map.insert(id.clone(), Arc::new(source)).is_some() {
                return Err(ReelError::InvalidConfig(format!("duplicate animation id '{}'", id)));
            }
        }
        Ok(Self {
            data_root: data_root.to_path_buf(),
            sources: map,
        })
    }

    /// The compiled-in title table, with frame count and rate read from each
    /// video that is present
    pub fn builtin(data_root: &Path, probe: &ProbeFn<'_>) -> Result<Self> {
        let sources = BUILTIN
            .iter()
            .map(|&(id, video, resolution, scale, frames, fps)| {
                let path = data_root.join(id).join(video);
                let (frames, fps) = if path.is_file() {
                    match probe(&path) {
                        Ok((probed_frames, probed_fps)) => (
                            if probed_frames > 0 { probed_frames } else { frames },
                            if probed_fps > 0 { probed_fps } else { fps },
                        ),
                        Err(e) => {
                            warn!("Failed to probe {}: {}", path.display(), e);
                            (frames, fps)
                        }
                    }
                } else {
                    (frames, fps)
                };
                SourceDescriptor::new(data_root, id, video, resolution, scale, frames, fps)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_sources(data_root, sources)
    }

    /// Parse a JSON catalog. Entries without `frame_count`/`frame_rate` are probed.
    pub fn from_json(data_root: &Path, json: &str, probe: &ProbeFn<'_>) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        let mut sources = Vec::with_capacity(entries.len());

        for entry in entries {
            let (frame_count, frame_rate) = match (entry.frame_count, entry.frame_rate) {
                (Some(count), Some(rate)) => (count, rate),
                (count, rate) => {
                    let video = data_root.join(&entry.id).join(&entry.video);
                    debug!("Probing {} for frame count/rate", video.display());
                    let (probed_count, probed_rate) = probe(&video)?;
                    (count.unwrap_or(probed_count), rate.unwrap_or(probed_rate))
                }
            };

            let source = SourceDescriptor::new(
                data_root,
                &entry.id,
                &entry.video,
                entry.resolution,
                entry.base_scale,
                frame_count,
                frame_rate,
            )?
            .with_aliases(entry.aliases);
            sources.push(source);
        }

        Self::from_sources(data_root, sources)
    }

    /// Load `<data_root>/catalog.json` if present, the built-in table otherwise
    pub fn load(data_root: &Path, probe: &ProbeFn<'_>) -> Result<Self> {
        let path = data_root.join(CATALOG_FILE);
        if path.is_file() {
            info!("Loading catalog from {}", path.display());
            let json = std::fs::read_to_string(&path)?;
            Self::from_json(data_root, &json, probe)
        } else {
            debug!("No {} in {}, using built-in catalog", CATALOG_FILE, data_root.display());
            Self::builtin(data_root, probe)
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Find a title by id or alias
    pub fn get(&self, name: &str) -> Result<Arc<SourceDescriptor>> {
        self.sources
            .values()
            .find(|source| source.answers_to(name))
            .cloned()
            .ok_or_else(|| ReelError::UnknownSource(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SourceDescriptor>> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
