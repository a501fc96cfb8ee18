//! The blit engine.
//!
//! Composites an animated image onto a [`Screen`], clipping against the
//! screen bounds, the active viewport and the image's own placement box,
//! converting RGBA8888 source pixels into the screen's packed format with
//! optional alpha blending. Owns the animation loop and its cancellation
//! check.

use std::thread;
use std::time::Duration;

use crate::color::Color;
use crate::error::YavResult;
use crate::geometry::{place, Constraint, Position};
use crate::image::Image;
use crate::interrupt;
use crate::screen::Screen;

/// Play the image's whole frame sequence onto the screen.
///
/// A loop count of -1 plays until cancelled, N >= 0 plays the sequence N
/// times. Frames present strictly in index order; the cancellation flag is
/// polled once per frame, after present, so a cancelled run always leaves a
/// complete frame visible. Any present-time error aborts the remaining
/// sequence.
pub fn blit(screen: &mut dyn Screen, image: &Image) -> YavResult<()> {
    let mut remaining = image.loops;

    while remaining != 0 {
        let last = image.frame_count() - 1;

        for frame in 0..=last {
            blit_frame(screen, image, frame)?;

            if interrupt::interrupted() {
                return Ok(());
            }

            // only sleep when another frame follows
            if frame != last {
                thread::sleep(Duration::from_millis(image.frame_delay_ms));
            }
        }

        // negative counts loop forever
        if remaining > 0 {
            remaining -= 1;
        }
    }

    Ok(())
}

/// Composite one frame and present it.
fn blit_frame(screen: &mut dyn Screen, image: &Image, frame: usize) -> YavResult<()> {
    let (bounds, canvas) = resolve_canvas(screen);
    let fmt = screen.format();

    let img_w = image.width() as i32;
    let img_h = image.height() as i32;

    let pos = place(img_w, img_h, canvas, image.anchor, image.offset);
    let image_box = Constraint {
        min: pos,
        max: Position { x: pos.x + img_w, y: pos.y + img_h },
    };

    let area = bounds.intersect(&[canvas, image_box]);

    if !area.is_empty() {
        let src = image.frame(frame)?;

        // encode alpha once, every written pixel is fully opaque
        let alpha = fmt.encode_alpha(255);
        let bytes = fmt.bytes();
        let stride = screen.width() as usize;
        let blending = image.blend;
        let data = screen.data();

        for y in area.min.y..area.max.y {
            let sy = (y - pos.y) as usize;

            for x in area.min.x..area.max.x {
                let sx = (x - pos.x) as usize;
                let sp = (sy * img_w as usize + sx) * 4;

                let sa = src[sp + 3];
                if sa == 0 {
                    continue;
                }

                let (mut r, mut g, mut b) = (src[sp], src[sp + 1], src[sp + 2]);

                let di = (y as usize * stride + x as usize) * bytes;
                let dst = &mut data[di..di + bytes];

                if blending && sa != 255 {
                    let (dr, dg, db) = fmt.decode_rgb(read_word(dst));
                    r = lerp(r, dr, sa);
                    g = lerp(g, dg, sa);
                    b = lerp(b, db, sa);
                }

                let word = fmt.encode_rgb(r, g, b) | alpha;
                dst.copy_from_slice(&word.to_le_bytes()[..bytes]);
            }
        }
    }

    screen.present()
}

/// Fill the viewport-clipped surface with `color`.
///
/// Alpha 0 is a no-op, alpha 255 overwrites, anything between blends against
/// the existing content.
pub fn clear(screen: &mut dyn Screen, color: Color) -> YavResult<()> {
    if color.a == 0 {
        return Ok(());
    }

    let (bounds, canvas) = resolve_canvas(screen);
    let area = bounds.intersect(&[canvas]);

    if !area.is_empty() {
        let fmt = screen.format();
        let alpha = fmt.encode_alpha(255);
        let bytes = fmt.bytes();
        let stride = screen.width() as usize;
        let data = screen.data();

        let solid = (fmt.encode_rgb(color.r, color.g, color.b) | alpha).to_le_bytes();

        for y in area.min.y..area.max.y {
            for x in area.min.x..area.max.x {
                let di = (y as usize * stride + x as usize) * bytes;
                let dst = &mut data[di..di + bytes];

                if color.a == 255 {
                    dst.copy_from_slice(&solid[..bytes]);
                } else {
                    let (dr, dg, db) = fmt.decode_rgb(read_word(dst));
                    let r = lerp(color.r, dr, color.a);
                    let g = lerp(color.g, dg, color.a);
                    let b = lerp(color.b, db, color.a);
                    let word = fmt.encode_rgb(r, g, b) | alpha;
                    dst.copy_from_slice(&word.to_le_bytes()[..bytes]);
                }
            }
        }
    }

    screen.present()
}

/// Screen bounds plus the resolved placement canvas (the viewport when one
/// is set, else the full screen).
fn resolve_canvas(screen: &dyn Screen) -> (Constraint, Constraint) {
    let bounds = Constraint::new(0, 0, screen.width() as i32, screen.height() as i32);
    let canvas = match screen.viewport() {
        Some(viewport) => viewport.constraint(bounds),
        None => bounds,
    };
    (bounds, canvas)
}

fn read_word(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

/// `src * a/255 + dst * (1 - a/255)`, rounded; exact at a = 0 and a = 255.
fn lerp(src: u8, dst: u8, a: u8) -> u8 {
    (mul_div255(src, a) + mul_div255(dst, 255 - a)).min(255) as u8
}

fn mul_div255(x: u8, y: u8) -> u32 {
    (u32::from(x) * u32::from(y) + 127) / 255
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Channel, PixelFormat};
    use crate::geometry::Viewport;
    use crate::image::Image;

    /// RGBA8888 screen held in plain memory, for exercising the engine
    /// without hardware.
    struct TestScreen {
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
        viewport: Option<Viewport>,
        presented: usize,
    }

    impl TestScreen {
        fn rgba(width: u32, height: u32) -> Self {
            let format = PixelFormat::new(
                32,
                Channel::new(8, 0),
                Channel::new(8, 8),
                Channel::new(8, 16),
                Channel::new(8, 24),
            );
            Self::with_format(width, height, format)
        }

        fn with_format(width: u32, height: u32, format: PixelFormat) -> Self {
            Self {
                width,
                height,
                format,
                data: vec![0; (width * height) as usize * format.bytes()],
                viewport: None,
                presented: 0,
            }
        }

        fn pixel(&self, x: u32, y: u32) -> u64 {
            let bytes = self.format.bytes();
            let at = (y * self.width + x) as usize * bytes;
            read_word(&self.data[at..at + bytes])
        }
    }

    impl Screen for TestScreen {
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
            format!("test ({}x{})", self.width, self.height)
        }
    }

    fn solid_image(w: u32, h: u32, rgba: [u8; 4]) -> Image {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take((w * h) as usize * 4)
            .collect();
        Image::from_rgba8(w, h, pixels).unwrap()
    }

    #[test]
    fn top_left_blit_reencodes_source() {
        let mut screen = TestScreen::rgba(4, 4);
        let img = solid_image(2, 2, [10, 20, 30, 255]);

        blit(&mut screen, &img).unwrap();

        let expected = screen.format.encode_rgb(10, 20, 30) | screen.format.encode_alpha(255);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(screen.pixel(x, y), expected);
        }
        // the rest of the surface is untouched
        assert_eq!(screen.pixel(2, 0), 0);
        assert_eq!(screen.pixel(3, 3), 0);
        assert_eq!(screen.presented, 1);
    }

    #[test]
    fn blit_respects_destination_precision() {
        let rgb565 = PixelFormat::new(
            16,
            Channel::new(5, 11),
            Channel::new(6, 5),
            Channel::new(5, 0),
            Channel::unused(),
        );
        let mut screen = TestScreen::with_format(2, 2, rgb565);
        let img = solid_image(1, 1, [255, 125, 0, 255]);

        blit(&mut screen, &img).unwrap();
        assert_eq!(screen.pixel(0, 0), 0b11111_011110_00000);
    }

    #[test]
    fn transparent_pixels_leave_destination_untouched() {
        let mut screen = TestScreen::rgba(2, 2);
        screen.data.fill(0xaa);

        let img = solid_image(2, 2, [255, 255, 255, 0]);
        blit(&mut screen, &img).unwrap();

        assert!(screen.data.iter().all(|&b| b == 0xaa));
    }

    #[test]
    fn opaque_blend_is_exactly_the_source() {
        let mut screen = TestScreen::rgba(1, 1);
        screen.data.fill(0x55);

        let mut img = solid_image(1, 1, [1, 2, 3, 255]);
        img.blend = true;
        blit(&mut screen, &img).unwrap();

        let fmt = screen.format;
        assert_eq!(screen.pixel(0, 0), fmt.encode_rgb(1, 2, 3) | fmt.encode_alpha(255));
    }

    #[test]
    fn half_alpha_blend_mixes_with_destination() {
        let mut screen = TestScreen::rgba(1, 1);
        // destination starts black

        let mut img = solid_image(1, 1, [200, 100, 50, 128]);
        img.blend = true;
        blit(&mut screen, &img).unwrap();

        let word = screen.pixel(0, 0);
        let (r, g, b) = screen.format.decode_rgb(word);
        // src * 128/255 within a rounding step
        assert!((i32::from(r) - 100).abs() <= 1, "r={r}");
        assert!((i32::from(g) - 50).abs() <= 1, "g={g}");
        assert!((i32::from(b) - 25).abs() <= 1, "b={b}");
        // alpha channel written fully opaque
        assert_eq!(word >> 24, 0xff);
    }

    #[test]
    fn without_blend_flag_alpha_is_ignored() {
        let mut screen = TestScreen::rgba(1, 1);

        let img = solid_image(1, 1, [200, 100, 50, 128]);
        blit(&mut screen, &img).unwrap();

        let (r, g, b) = screen.format.decode_rgb(screen.pixel(0, 0));
        assert_eq!((r, g, b), (200, 100, 50));
    }

    #[test]
    fn offscreen_placement_writes_nothing_but_presents() {
        let mut screen = TestScreen::rgba(4, 4);
        let mut img = solid_image(2, 2, [255, 255, 255, 255]);
        img.offset = (100, 100);

        blit(&mut screen, &img).unwrap();

        assert!(screen.data.iter().all(|&b| b == 0));
        assert_eq!(screen.presented, 1);
    }

    #[test]
    fn partially_clipped_image_keeps_visible_part() {
        let mut screen = TestScreen::rgba(4, 4);
        let mut img = solid_image(2, 2, [9, 9, 9, 255]);
        img.offset = (-1, -1);

        blit(&mut screen, &img).unwrap();

        // only the bottom-right quarter of the image lands on screen
        assert_ne!(screen.pixel(0, 0), 0);
        assert_eq!(screen.pixel(1, 0), 0);
        assert_eq!(screen.pixel(0, 1), 0);
    }

    #[test]
    fn viewport_clips_and_anchors_placement() {
        let mut screen = TestScreen::rgba(8, 8);
        screen.set_viewport(Some(Viewport {
            size: Some((4, 4)),
            anchor: (0.0, 0.0),
            offset: (2, 2),
        }));

        let img = solid_image(8, 8, [7, 7, 7, 255]);
        blit(&mut screen, &img).unwrap();

        // content is confined to the viewport box
        assert_eq!(screen.pixel(1, 1), 0);
        assert_ne!(screen.pixel(2, 2), 0);
        assert_ne!(screen.pixel(5, 5), 0);
        assert_eq!(screen.pixel(6, 6), 0);
    }

    #[test]
    fn loop_count_zero_renders_nothing() {
        let mut screen = TestScreen::rgba(2, 2);
        let mut img = solid_image(2, 2, [255, 255, 255, 255]);
        img.loops = 0;

        blit(&mut screen, &img).unwrap();

        assert!(screen.data.iter().all(|&b| b == 0));
        assert_eq!(screen.presented, 0);
    }

    #[test]
    fn positive_loop_count_presents_each_frame_each_pass() {
        let mut screen = TestScreen::rgba(2, 2);
        let mut img = solid_image(2, 2, [255, 0, 0, 255]);
        img.loops = 3;
        img.frame_delay_ms = 0;

        blit(&mut screen, &img).unwrap();
        assert_eq!(screen.presented, 3);
    }

    #[test]
    fn clear_with_zero_alpha_is_a_noop() {
        let mut screen = TestScreen::rgba(2, 2);
        screen.data.fill(0x11);

        clear(&mut screen, Color { r: 9, g: 9, b: 9, a: 0 }).unwrap();

        assert!(screen.data.iter().all(|&b| b == 0x11));
        assert_eq!(screen.presented, 0);
    }

    #[test]
    fn opaque_clear_fills_the_viewport_only() {
        let mut screen = TestScreen::rgba(4, 4);
        screen.set_viewport(Some(Viewport {
            size: Some((2, 2)),
            anchor: (0.0, 0.0),
            offset: (1, 1),
        }));

        clear(&mut screen, Color { r: 255, g: 0, b: 0, a: 255 }).unwrap();

        assert_eq!(screen.pixel(0, 0), 0);
        let expected = screen.format.encode_rgb(255, 0, 0) | screen.format.encode_alpha(255);
        assert_eq!(screen.pixel(1, 1), expected);
        assert_eq!(screen.pixel(2, 2), expected);
        assert_eq!(screen.pixel(3, 3), 0);
        assert_eq!(screen.presented, 1);
    }

    #[test]
    fn translucent_clear_blends_against_content() {
        let mut screen = TestScreen::rgba(1, 1);
        // white background
        let white = screen.format.encode_rgb(255, 255, 255) | screen.format.encode_alpha(255);
        let bytes = white.to_le_bytes();
        screen.data.copy_from_slice(&bytes[..4]);

        clear(&mut screen, Color { r: 0, g: 0, b: 0, a: 128 }).unwrap();

        let (r, g, b) = screen.format.decode_rgb(screen.pixel(0, 0));
        for v in [r, g, b] {
            assert!((i32::from(v) - 127).abs() <= 1, "v={v}");
        }
    }
}
