//! Composites a still or animated raster image onto a raw Linux display
//! surface (a memory-mapped framebuffer device or a mode-set display
//! plane) with pixel-format conversion, viewport placement, clipping and
//! alpha blending, and no windowing system in between.

pub mod color;
pub mod compositor;
pub mod error;
pub mod format;
pub mod geometry;
pub mod image;
pub mod interrupt;
pub mod screen;

pub use color::Color;
pub use error::{YavError, YavResult};
pub use format::{Channel, PixelFormat};
pub use geometry::{place, Constraint, Position, Viewport};
pub use image::Image;
pub use screen::{DeviceKind, DeviceSpec, Screen};
