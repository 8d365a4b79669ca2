//! ASCII Reel - loops pre-rendered, color ASCII video clips in the terminal
//!
//! Each title in the catalog is rendered once per downscale factor into a
//! directory of per-frame text files. Playback picks the factor that fits the
//! current terminal, renders the cache if it is missing, and then loops the
//! frames at the video's native rate while the extracted audio plays alongside.

pub mod audio;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod decoder;
pub mod player;
pub mod raster;
pub mod scale;
pub mod session;
pub mod signal;

pub use audio::{AudioExtractor, AudioOutput, RodioOutput};
pub use cache::{ensure_audio, FrameCache};
pub use catalog::{Catalog, SourceDescriptor};
pub use cli::Cli;
pub use decoder::{FrameSource, VideoDecoder, VideoFrameSource};
pub use player::{FrameTimer, Player};
pub use raster::{ColoredRasterizer, Rasterizer};
pub use scale::{ScaleDecision, ScaleResolver, Shortfall, TerminalSize};
pub use session::PlaybackSession;
pub use signal::CancelToken;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default ASCII character ramp for luminance mapping
pub const DEFAULT_ASCII_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Downscale factor the shortfall diagnostic measures "needed" sizes against
pub const REFERENCE_SCALE: u32 = 33;

/// Error types used throughout the crate
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    #[error("Unknown animation '{0}'")]
    UnknownSource(String),

    #[error("Failed to render frame {index}: {reason}")]
    Render { index: u32, reason: String },

    #[error("Interrupted")]
    Cancelled,

    #[error("Video decoding error: {0}")]
    VideoDecoding(#[from] ffmpeg_next::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Audio error: {0}")]
    Audio(String),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, ReelError>;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Catalog, SourceDescriptor,
        ScaleDecision, ScaleResolver, Shortfall, TerminalSize,
        FrameCache, FrameSource, Rasterizer, ColoredRasterizer,
        AudioOutput, FrameTimer, Player, PlaybackSession, CancelToken,
        ReelError, Result, REFERENCE_SCALE,
    };
}
