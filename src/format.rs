//! Bit-field pixel packing.
//!
//! A hardware pixel is a little-endian word of up to 8 bytes; each color
//! component occupies a contiguous bit field inside it. The layout is
//! discovered from the device at runtime, never assumed.

/// Bit-field description of one color/alpha component within a packed pixel
/// word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Channel {
    length: u32,
    offset: u32,
    mask: u64,
}

impl Channel {
    /// Describe a field of `length` bits starting `offset` bits into the
    /// pixel word.
    pub fn new(length: u32, offset: u32) -> Self {
        let mask = if length == 0 { 0 } else { (1u64 << length) - 1 };
        Self { length, offset, mask }
    }

    /// An absent channel. Encodes to 0 and decodes to 0.
    pub fn unused() -> Self {
        Self::default()
    }

    /// Whether this channel contributes to the format (non-zero mask).
    pub fn is_used(self) -> bool {
        self.mask != 0
    }

    pub fn length(self) -> u32 {
        self.length
    }

    pub fn offset(self) -> u32 {
        self.offset
    }

    pub fn mask(self) -> u64 {
        self.mask
    }

    /// Scale an 8-bit value into this channel's bit width and shift it into
    /// place. Quantization is lossy by design; `decode` reverses it within
    /// `255 / mask` per output byte.
    pub fn encode(self, value: u8) -> u64 {
        if self.mask == 0 {
            return 0;
        }
        let mapped = (u64::from(value) * self.mask) / 255;
        (mapped & self.mask) << self.offset
    }

    /// Extract this channel's field from a packed word and rescale to 0-255.
    ///
    /// The field bits are isolated (shift, then mask) before rescaling;
    /// rescaling a raw unshifted word is wrong for any non-zero offset.
    pub fn decode(self, word: u64) -> u8 {
        if self.mask == 0 {
            return 0;
        }
        let field = (word >> self.offset) & self.mask;
        ((field * 255) / self.mask) as u8
    }

    /// One-line `name=mask@offset` description for diagnostics.
    pub fn describe(self, name: &str) -> String {
        format!("{}={:02x}@{}", name, self.mask, self.offset)
    }
}

/// Data layout of a single packed pixel: word width plus the four channel
/// fields. Derived fresh from device state whenever it is queried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    bits_per_pixel: u32,
    pub r: Channel,
    pub g: Channel,
    pub b: Channel,
    pub a: Channel,
}

impl PixelFormat {
    pub fn new(bits_per_pixel: u32, r: Channel, g: Channel, b: Channel, a: Channel) -> Self {
        Self { bits_per_pixel, r, g, b, a }
    }

    pub fn bits_per_pixel(self) -> u32 {
        self.bits_per_pixel
    }

    /// Bytes a single pixel occupies, capped at 8 for any single write.
    pub fn bytes(self) -> usize {
        ((self.bits_per_pixel / 8) as usize).min(8)
    }

    /// Whether r, g and b are all present, ignoring whether they overlap.
    pub fn pseudocolor(self) -> bool {
        self.r.is_used() && self.g.is_used() && self.b.is_used()
    }

    /// Whether r, g and b are all present at pairwise distinct offsets.
    ///
    /// Indexed and grayscale configurations fail this check; the compositor
    /// cannot blend into them.
    pub fn color(self) -> bool {
        self.pseudocolor()
            && self.r.offset() != self.g.offset()
            && self.g.offset() != self.b.offset()
            && self.r.offset() != self.b.offset()
    }

    /// OR of the three color channel encodings.
    pub fn encode_rgb(self, r: u8, g: u8, b: u8) -> u64 {
        self.r.encode(r) | self.g.encode(g) | self.b.encode(b)
    }

    /// Encode a transparency value into the alpha field.
    pub fn encode_alpha(self, alpha: u8) -> u64 {
        self.a.encode(alpha)
    }

    /// Decode each color channel of a packed word independently.
    pub fn decode_rgb(self, word: u64) -> (u8, u8, u8) {
        (self.r.decode(word), self.g.decode(word), self.b.decode(word))
    }

    /// Channel layout overview for diagnostics.
    pub fn describe(self) -> String {
        format!(
            "{} {} {} {}",
            self.r.describe("red"),
            self.g.describe("green"),
            self.b.describe("blue"),
            self.a.describe("alpha"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_encode_decode_known_values() {
        let ch = Channel::new(6, 3);

        assert!(ch.is_used());

        assert_eq!(ch.decode(0b111111_101), 255);
        assert_eq!(ch.decode(0b011111_101), 125);
        assert_eq!(ch.decode(0b111_000000_111), 0);

        assert_eq!(ch.encode(255), 0b111111_000);
        assert_eq!(ch.encode(125), 0b011110_000);
        assert_eq!(ch.encode(0), 0);
    }

    #[test]
    fn encode_extremes_for_all_widths() {
        for length in 1..=8u32 {
            for offset in [0u32, 3, 11, 24] {
                let ch = Channel::new(length, offset);
                assert_eq!(ch.encode(0), 0);
                assert_eq!(ch.encode(255), ch.mask() << offset);
            }
        }
    }

    #[test]
    fn round_trip_within_quantization_error() {
        for length in 1..=8u32 {
            let ch = Channel::new(length, 5);
            let step = 255u32.div_ceil(ch.mask() as u32);
            for v in 0..=255u8 {
                let back = ch.decode(ch.encode(v));
                let diff = (i32::from(back) - i32::from(v)).unsigned_abs();
                assert!(
                    diff <= step,
                    "length={length} v={v} back={back} step={step}"
                );
            }
        }
    }

    #[test]
    fn unused_channel_contributes_nothing() {
        let ch = Channel::unused();
        assert!(!ch.is_used());
        assert_eq!(ch.encode(255), 0);
        assert_eq!(ch.decode(u64::MAX), 0);
    }

    fn rgb565() -> PixelFormat {
        PixelFormat::new(
            16,
            Channel::new(5, 11),
            Channel::new(6, 5),
            Channel::new(5, 0),
            Channel::unused(),
        )
    }

    #[test]
    fn rgb565_is_a_color_format() {
        let fmt = rgb565();
        assert!(fmt.color());
        assert_eq!(fmt.encode_rgb(255, 125, 0), 0b11111_011110_00000);
    }

    #[test]
    fn rgb565_decodes_channels_independently() {
        let (r, g, b) = rgb565().decode_rgb(0b11111_011111_00000);
        assert_eq!((r, g, b), (255, 125, 0));
    }

    #[test]
    fn overlapping_offsets_are_not_color() {
        let gray = PixelFormat::new(
            8,
            Channel::new(8, 0),
            Channel::new(8, 0),
            Channel::new(8, 0),
            Channel::unused(),
        );
        assert!(gray.pseudocolor());
        assert!(!gray.color());
    }

    #[test]
    fn bytes_is_capped_at_eight() {
        let wide = PixelFormat::new(
            128,
            Channel::new(8, 0),
            Channel::new(8, 8),
            Channel::new(8, 16),
            Channel::unused(),
        );
        assert_eq!(wide.bytes(), 8);
    }
}
