use crate::{ReelError, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Supplies decoded frames by index.
///
/// The same index must always yield the same image for a given video.
pub trait FrameSource {
    fn frame_count(&self) -> u32;
    fn frame_rate(&self) -> u32;
    fn frame(&mut self, index: u32) -> Result<RgbImage>;
}

/// Sequential video decoder that produces RGB frames
pub struct VideoDecoder {
    input_context: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: Option<ffmpeg::software::scaling::Context>,
    eof_sent: bool,
    frames_decoded: u32,
    frame_count: u32,
    fps: f64,
}

impl VideoDecoder {
    /// Open a video file and prepare its best video stream for decoding
    pub fn new(path: &Path) -> Result<Self> {
        if let Err(e) = ffmpeg::init() {
            debug!("FFmpeg init error: {:?}", e);
        }

        debug!("Opening video file: {}", path.display());
        let input_context = ffmpeg::format::input(&path)?;

        let stream = input_context
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| ReelError::InvalidConfig(format!("no video stream in '{}'", path.display())))?;
        let stream_index = stream.index();

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context_decoder.decoder().video()?;

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 && rate.numerator() > 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            25.0
        };

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u32
        } else if stream.duration() != ffmpeg::ffi::AV_NOPTS_VALUE {
            let time_base = stream.time_base();
            let seconds = stream.duration() as f64 * time_base.numerator() as f64 / time_base.denominator() as f64;
            (seconds * fps).round() as u32
        } else {
            0
        };

        info!(
            "Opened '{}': {}x{}, {:.2} FPS, {} frames",
            path.display(),
            decoder.width(),
            decoder.height(),
            fps,
            frame_count
        );

        Ok(Self {
            input_context,
            stream_index,
            decoder,
            scaler: None,
            eof_sent: false,
            frames_decoded: 0,
            frame_count,
            fps,
        })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Frame count reported by the container (0 if unknown)
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    /// Number of frames returned by [`next_frame`](Self::next_frame) so far
    pub fn position(&self) -> u32 {
        self.frames_decoded
    }

    /// Decode the next frame, `None` at end of stream
    pub fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    self.frames_decoded += 1;
                    return self.convert_frame(&decoded).map(Some);
                }
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::ffi::EAGAIN => {}
                Err(e) => return Err(e.into()),
            }

            if self.eof_sent {
                return Ok(None);
            }

            let stream_index = self.stream_index;
            let packet = self
                .input_context
                .packets()
                .find(|(stream, _)| stream.index() == stream_index)
                .map(|(_, packet)| packet);

            match packet {
                Some(packet) => self.decoder.send_packet(&packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn convert_frame(&mut self, frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
        let width = frame.width();
        let height = frame.height();

        if self.scaler.is_none() {
            self.scaler = Some(ffmpeg::software::scaling::Context::get(
                frame.format(),
                width,
                height,
                ffmpeg::format::Pixel::RGB24,
                width,
                height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )?);
        }

        let mut rgb_frame = ffmpeg::frame::Video::empty();
        if let Some(ref mut scaler) = self.scaler {
            scaler.run(frame, &mut rgb_frame)?;
        }

        // rows in the scaled frame may be padded past width * 3
        let stride = rgb_frame.stride(0);
        let row_bytes = width as usize * 3;
        let data = rgb_frame.data(0);
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }

        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| ReelError::InvalidConfig(format!("frame buffer does not match {}x{}", width, height)))
    }
}

/// Index-addressable frames backed by a [`VideoDecoder`].
///
/// Frames are decoded forward; asking for an earlier index reopens the file.
pub struct VideoFrameSource {
    path: PathBuf,
    decoder: VideoDecoder,
    frame_count: u32,
    frame_rate: u32,
}

impl VideoFrameSource {
    pub fn open(path: &Path, frame_count: u32, frame_rate: u32) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            decoder: VideoDecoder::new(path)?,
            frame_count,
            frame_rate,
        })
    }
}

impl FrameSource for VideoFrameSource {
    fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn frame(&mut self, index: u32) -> Result<RgbImage> {
        if index < self.decoder.position() {
            debug!("Rewinding {} to reach frame {}", self.path.display(), index);
            self.decoder = VideoDecoder::new(&self.path)?;
        }

        loop {
            let position = self.decoder.position();
            match self.decoder.next_frame()? {
                Some(image) if position == index => return Ok(image),
                Some(_) => continue,
                None => {
                    return Err(ReelError::Render {
                        index,
                        reason: format!("video ended after {} frames", position),
                    })
                }
            }
        }
    }
}

/// Frame count and integer frame rate of a video file
pub fn probe(path: &Path) -> Result<(u32, u32)> {
    let decoder = VideoDecoder::new(path)?;
    let frame_rate = decoder.fps().round().max(1.0) as u32;
    Ok((decoder.frame_count(), frame_rate))
}
