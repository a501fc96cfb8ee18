//! Image loading and per-frame access.
//!
//! Files decode into top-left-origin RGBA8888 frames. GIF files are detected
//! by their magic bytes and keep every frame plus the native frame delay;
//! everything else decodes as a single frame.

use std::io::Cursor;
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;

use crate::error::{YavError, YavResult};

/// Inter-frame delay used when the file itself does not carry one (~24 fps).
pub const DEFAULT_FRAME_DELAY_MS: u64 = 42;

/// A decoded image plus the placement state the compositor consumes.
#[derive(Clone, Debug)]
pub struct Image {
    width: u32,
    height: u32,
    frames: Vec<Vec<u8>>,

    /// Placement anchor, conceptually 0..=1 per axis.
    pub anchor: (f32, f32),
    /// Placement fine-tune in pixels.
    pub offset: (i32, i32),
    /// Alpha-blend against existing screen content instead of overwriting.
    pub blend: bool,
    /// Delay between animation frames, in milliseconds.
    pub frame_delay_ms: u64,
    /// Number of passes over the frame sequence; -1 plays until cancelled,
    /// 0 renders nothing.
    pub loops: i64,
}

impl Image {
    /// Decode an image file.
    pub fn open(path: impl AsRef<Path>) -> YavResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| YavError::decode(format!("failed to read '{}': {e}", path.display())))?;

        if is_gif(&bytes) {
            Self::decode_gif(&bytes)
        } else {
            Self::decode_still(&bytes)
        }
        .map_err(|e| YavError::decode(format!("failed to load '{}': {e}", path.display())))
    }

    /// Wrap raw RGBA8888 pixels as a single-frame image.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> YavResult<Self> {
        if pixels.len() != (width as usize) * (height as usize) * 4 {
            return Err(YavError::decode(format!(
                "pixel buffer is {} bytes, expected {}x{}x4",
                pixels.len(),
                width,
                height
            )));
        }

        Ok(Self::with_frames(width, height, vec![pixels], DEFAULT_FRAME_DELAY_MS))
    }

    fn with_frames(width: u32, height: u32, frames: Vec<Vec<u8>>, delay_ms: u64) -> Self {
        Self {
            width,
            height,
            frames,
            anchor: (0.0, 0.0),
            offset: (0, 0),
            blend: false,
            frame_delay_ms: delay_ms,
            loops: 1,
        }
    }

    fn decode_still(bytes: &[u8]) -> YavResult<Self> {
        let rgba = image::load_from_memory(bytes)
            .map_err(|e| YavError::decode(e.to_string()))?
            .to_rgba8();

        let (width, height) = rgba.dimensions();
        Ok(Self::with_frames(width, height, vec![rgba.into_raw()], DEFAULT_FRAME_DELAY_MS))
    }

    fn decode_gif(bytes: &[u8]) -> YavResult<Self> {
        let decoder =
            GifDecoder::new(Cursor::new(bytes)).map_err(|e| YavError::decode(e.to_string()))?;

        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| YavError::decode(e.to_string()))?;

        let first = frames
            .first()
            .ok_or_else(|| YavError::decode("gif contains no frames"))?;

        let (width, height) = first.buffer().dimensions();
        let (numer, denom) = first.delay().numer_denom_ms();
        let delay_ms = if numer == 0 || denom == 0 {
            DEFAULT_FRAME_DELAY_MS
        } else {
            u64::from(numer / denom)
        };

        let mut data = Vec::with_capacity(frames.len());
        for frame in frames {
            let buffer = frame.into_buffer();
            if buffer.dimensions() != (width, height) {
                return Err(YavError::decode("gif frames disagree on dimensions"));
            }
            data.push(buffer.into_raw());
        }

        Ok(Self::with_frames(width, height, data, delay_ms))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Drop everything but the first frame and play it once.
    pub fn make_static(&mut self) {
        self.frames.truncate(1);
        self.loops = 1;
    }

    /// RGBA8888 bytes of one frame, row-major, 4 bytes per pixel.
    pub fn frame(&self, index: usize) -> YavResult<&[u8]> {
        self.frames
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| YavError::decode(format!("frame {index} out of range")))
    }
}

fn is_gif(bytes: &[u8]) -> bool {
    bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_rgba_round_trips() {
        let img = Image::from_rgba8(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(img.width(), 2);
        assert_eq!(img.height(), 1);
        assert_eq!(img.frame_count(), 1);
        assert_eq!(img.frame(0).unwrap(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(img.frame(1).is_err());
    }

    #[test]
    fn raw_rgba_size_is_validated() {
        assert!(Image::from_rgba8(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn gif_magic_is_detected() {
        assert!(is_gif(b"GIF89a\x01\x00"));
        assert!(is_gif(b"GIF87a\x01\x00"));
        assert!(!is_gif(b"\x89PNG\r\n"));
    }

    #[test]
    fn png_bytes_decode_as_single_frame() {
        // 1x1 opaque red pixel
        let mut png = Vec::new();
        let rgba = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 255]));
        image::DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let img = Image::decode_still(&png).unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
        assert_eq!(img.frame(0).unwrap(), &[255, 0, 0, 255]);
    }
}
