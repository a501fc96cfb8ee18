//! In-memory `Screen` used to exercise the compositor without hardware.

use yav::format::{Channel, PixelFormat};
use yav::{Screen, Viewport, YavResult};

pub struct MemoryScreen {
    width: u32,
    height: u32,
    format: PixelFormat,
    pub data: Vec<u8>,
    viewport: Option<Viewport>,
    pub presented: usize,
}

impl MemoryScreen {
    /// Little-endian RGBA8888 surface.
    pub fn rgba(width: u32, height: u32) -> Self {
        let format = PixelFormat::new(
            32,
            Channel::new(8, 0),
            Channel::new(8, 8),
            Channel::new(8, 16),
            Channel::new(8, 24),
        );
        Self::with_format(width, height, format)
    }

    pub fn with_format(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; (width * height) as usize * format.bytes()],
            viewport: None,
            presented: 0,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> u64 {
        let bytes = self.format.bytes();
        let at = (y * self.width + x) as usize * bytes;

        let mut buf = [0u8; 8];
        buf[..bytes].copy_from_slice(&self.data[at..at + bytes]);
        u64::from_le_bytes(buf)
    }
}

impl Screen for MemoryScreen {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn data(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn present(&mut self) -> YavResult<()> {
        self.presented += 1;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    fn describe(&self) -> String {
        format!("memory ({}x{})", self.width, self.height)
    }
}

/// Single-frame image filled with one RGBA value.
pub fn solid_image(w: u32, h: u32, rgba: [u8; 4]) -> yav::Image {
    let pixels = rgba
        .iter()
        .copied()
        .cycle()
        .take((w * h) as usize * 4)
        .collect();
    yav::Image::from_rgba8(w, h, pixels).unwrap()
}
