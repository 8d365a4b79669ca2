//! Terminal-fit downscale negotiation.
//!
//! A downscale factor `s` turns `s` pixel rows into one character row and
//! `s / aspect` pixel columns into one character column, so a frame rendered
//! at `s` occupies `aspect * width / s` columns and `height / s` rows.

use crate::catalog::SourceDescriptor;
use crate::REFERENCE_SCALE;
use log::{debug, info};
use std::fmt;
use std::path::PathBuf;

/// Character-grid size of a terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub columns: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self { columns, rows }
    }

    /// Measure stdout. `None` when stdout is not a terminal or the size is unknown.
    pub fn measure() -> Option<Self> {
        if !atty::is(atty::Stream::Stdout) {
            debug!("stdout is not a terminal");
            return None;
        }
        match crossterm::terminal::size() {
            Ok((columns, rows)) => Some(Self { columns, rows }),
            Err(e) => {
                debug!("Failed to query terminal size: {}", e);
                None
            }
        }
    }

    fn is_usable(&self) -> bool {
        self.columns > 0 && self.rows > 0
    }
}

/// Terminal is smaller than the default density needs
#[derive(Debug, Clone, PartialEq)]
pub struct Shortfall {
    pub actual_columns: u16,
    pub actual_rows: u16,
    /// Columns needed at [`REFERENCE_SCALE`]
    pub needed_columns: u32,
    /// Rows needed at [`REFERENCE_SCALE`]
    pub needed_rows: u32,
    pub scale: u32,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Terminal is too small for the default scale (width: actual {}, needed {}; height: actual {}, needed {}). Falling back to downscale {}",
            self.actual_columns, self.needed_columns, self.actual_rows, self.needed_rows, self.scale
        )
    }
}

/// Outcome of scale resolution for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleDecision {
    pub scale: u32,
    pub cache_dir: PathBuf,
    /// Present only when the fallback path was taken
    pub shortfall: Option<Shortfall>,
}

/// Picks the downscale factor for a title and terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct ScaleResolver;

impl ScaleResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve against a known terminal size.
    ///
    /// `terminal` of `None` (or a zero dimension) means the size could not be
    /// measured, e.g. output is redirected.
    pub fn resolve(
        &self,
        source: &SourceDescriptor,
        requested: Option<u32>,
        terminal: Option<TerminalSize>,
    ) -> ScaleDecision {
        self.resolve_with(source, requested, || terminal)
    }

    /// Resolve, measuring the terminal lazily. `measure` is not called when an
    /// explicit scale different from the base scale was requested.
    pub fn resolve_with<F>(&self, source: &SourceDescriptor, requested: Option<u32>, measure: F) -> ScaleDecision
    where
        F: FnOnce() -> Option<TerminalSize>,
    {
        let base = source.base_scale();

        if let Some(scale) = requested.filter(|&s| s != base) {
            let scale = scale.max(1);
            info!("Chosen downscale: {}", scale);
            return self.decide(source, scale, None);
        }

        let terminal = match measure().filter(TerminalSize::is_usable) {
            Some(terminal) => terminal,
            None => {
                debug!("Terminal size unavailable, using base scale {}", base);
                return self.decide(source, base, None);
            }
        };

        let required = required_scale(source, terminal);
        debug!(
            "Terminal {}x{} requires downscale {} (base {})",
            terminal.columns, terminal.rows, required, base
        );

        if required > base {
            let (width, height) = source.resolution();
            let shortfall = Shortfall {
                actual_columns: terminal.columns,
                actual_rows: terminal.rows,
                needed_columns: (source.aspect_multiplier() * width as f64 / REFERENCE_SCALE as f64) as u32,
                needed_rows: height / REFERENCE_SCALE,
                scale: required,
            };
            self.decide(source, required, Some(shortfall))
        } else {
            self.decide(source, base, None)
        }
    }

    fn decide(&self, source: &SourceDescriptor, scale: u32, shortfall: Option<Shortfall>) -> ScaleDecision {
        ScaleDecision {
            scale,
            cache_dir: source.frames_dir(scale),
            shortfall,
        }
    }
}

/// Smallest scale at which the whole frame fits `terminal` in both dimensions.
/// `terminal` must have non-zero columns and rows.
pub fn required_scale(source: &SourceDescriptor, terminal: TerminalSize) -> u32 {
    let (width, height) = source.resolution();
    let for_width = (source.aspect_multiplier() * width as f64 / terminal.columns as f64).ceil() as u32;
    let for_height = height.div_ceil(terminal.rows as u32);
    for_width.max(for_height).max(1)
}
