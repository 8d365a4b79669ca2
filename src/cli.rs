use clap::Parser;
use std::path::PathBuf;

/// Default title when none is chosen
pub const DEFAULT_ANIMATION: &str = "chipi-chipi";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Animation to play, by name or alias
    #[arg(short, long, default_value = DEFAULT_ANIMATION)]
    pub animation: String,

    /// Downscale value; higher is smaller and coarser (overrides terminal fitting)
    #[arg(short, long)]
    pub scale: Option<u32>,

    /// Render every animation at its default scale and exit
    #[arg(short, long)]
    pub prepare: bool,

    /// List the available animations and exit
    #[arg(short, long)]
    pub list: bool,

    /// Directory holding videos, audio and rendered frames
    #[arg(short, long, env = "ASCII_REEL_DATA", default_value = "data")]
    pub data_dir: PathBuf,

    /// Play without sound
    #[arg(short, long)]
    pub mute: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.scale == Some(0) {
            return Err("Scale must be at least 1".to_string());
        }

        if self.prepare && self.list {
            return Err("--prepare and --list cannot be used together".to_string());
        }

        if self.animation.trim().is_empty() {
            return Err("Animation name must not be empty".to_string());
        }

        Ok(())
    }

    /// Default `env_logger` filter directive; `RUST_LOG` still takes precedence
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
