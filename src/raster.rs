use crate::{ReelError, Result, DEFAULT_ASCII_RAMP};
use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use image::RgbImage;

/// Turns a raw frame into colored text art.
///
/// Implementations must be pure: the same inputs always produce the same text.
pub trait Rasterizer {
    fn to_colored_text(&self, image: &RgbImage, scale: u32, aspect_multiplier: f64) -> Result<String>;
}

/// Block-averaging rasterizer emitting 24-bit foreground colors.
///
/// Every character cell covers `scale` pixel rows and `scale / aspect_multiplier`
/// pixel columns, so the output is `aspect * width / scale` columns wide and
/// `height / scale` rows tall.
#[derive(Debug, Clone)]
pub struct ColoredRasterizer {
    ramp: Vec<char>,
}

impl Default for ColoredRasterizer {
    fn default() -> Self {
        Self {
            ramp: DEFAULT_ASCII_RAMP.to_vec(),
        }
    }
}

impl ColoredRasterizer {
    pub fn new(ramp: Vec<char>) -> Result<Self> {
        if ramp.is_empty() {
            return Err(ReelError::InvalidConfig("character ramp must not be empty".into()));
        }
        Ok(Self { ramp })
    }

    /// Output grid for an image of `width` x `height` pixels
    pub fn grid_size(width: u32, height: u32, scale: u32, aspect_multiplier: f64) -> (u32, u32) {
        let scale = scale.max(1) as f64;
        let columns = (aspect_multiplier * width as f64 / scale) as u32;
        let rows = (height as f64 / scale) as u32;
        (columns.max(1), rows.max(1))
    }

    /// Average color over the pixel block [x0, x1) x [y0, y1)
    fn average(image: &RgbImage, x0: u32, x1: u32, y0: u32, y1: u32) -> (u8, u8, u8) {
        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                let pixel = image.get_pixel(x, y);
                for (sum, channel) in sums.iter_mut().zip(pixel.0) {
                    *sum += channel as u64;
                }
                count += 1;
            }
        }
        if count == 0 {
            return (0, 0, 0);
        }
        (
            (sums[0] / count) as u8,
            (sums[1] / count) as u8,
            (sums[2] / count) as u8,
        )
    }

    /// ITU-R BT.709 luma
    fn luminance(r: u8, g: u8, b: u8) -> u8 {
        let luminance = 0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64;
        luminance.round().clamp(0.0, 255.0) as u8
    }

    fn char_for(&self, luminance: u8) -> char {
        let last = self.ramp.len() - 1;
        let index = (luminance as f64 / 255.0 * last as f64).round() as usize;
        self.ramp[index.min(last)]
    }
}

impl Rasterizer for ColoredRasterizer {
    fn to_colored_text(&self, image: &RgbImage, scale: u32, aspect_multiplier: f64) -> Result<String> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ReelError::InvalidConfig("cannot rasterize an empty image".into()));
        }
        let (columns, rows) = Self::grid_size(width, height, scale, aspect_multiplier);

        let mut out: Vec<u8> = Vec::with_capacity((columns as usize * 20 + 1) * rows as usize);
        let mut current: Option<(u8, u8, u8)> = None;

        for row in 0..rows {
            let y0 = (row as u64 * height as u64 / rows as u64) as u32;
            let y1 = (((row as u64 + 1) * height as u64 / rows as u64) as u32)
                .max(y0 + 1)
                .min(height);
            for column in 0..columns {
                let x0 = (column as u64 * width as u64 / columns as u64) as u32;
                let x1 = (((column as u64 + 1) * width as u64 / columns as u64) as u32)
                    .max(x0 + 1)
                    .min(width);

                let (r, g, b) = Self::average(image, x0, x1, y0, y1);
                if current != Some((r, g, b)) {
                    queue!(out, SetForegroundColor(Color::Rgb { r, g, b }))?;
                    current = Some((r, g, b));
                }
                queue!(out, Print(self.char_for(Self::luminance(r, g, b))))?;
            }
            if row + 1 < rows {
                queue!(out, Print('\n'))?;
            }
        }
        queue!(out, ResetColor)?;

        String::from_utf8(out).map_err(|e| ReelError::InvalidConfig(format!("rasterizer produced invalid UTF-8: {}", e)))
    }
}
