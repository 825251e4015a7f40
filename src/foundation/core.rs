use std::time::Duration;

use crate::foundation::error::{StickerError, StickerResult};

pub use kurbo::Size;

/// Absolute 0-based frame index within an animation's fixed frame count.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// Next frame index, wrapping at `frame_count`.
    ///
    /// `frame_count == 0` wraps to frame 0.
    pub fn next_wrapping(self, frame_count: u64) -> Self {
        if frame_count == 0 {
            return Self(0);
        }
        Self(self.0.saturating_add(1) % frame_count)
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> StickerResult<Self> {
        if den == 0 {
            return Err(StickerError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(StickerError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Validate a value that may have been deserialized without going through [`Fps::new`].
    pub fn validate(self) -> StickerResult<Self> {
        Self::new(self.num, self.den)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Duration of one frame as a timer interval.
    pub fn frame_interval(self) -> Duration {
        Duration::from_secs_f64(self.frame_duration_secs())
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 60, den: 1 }
    }
}

/// Pixel formats produced by decoders.
///
/// There is exactly one layout for the whole system: tightly packed, row-major RGBA8 with
/// premultiplied alpha (byte order `R, G, B, A`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// Premultiplied RGBA8.
    Rgba8Premul,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8Premul => 4,
        }
    }
}

/// Render target dimensions in device pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelSize {
    /// Construct a pixel size. Zero sides are allowed here and rejected at render time.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Return `true` when either side is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of bytes needed for one frame in [`PixelFormat::Rgba8Premul`].
    pub fn byte_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(PixelFormat::Rgba8Premul.bytes_per_pixel())
    }

    /// Largest side length a frame may have.
    pub const MAX_SIDE: u32 = 16_384;

    /// Like [`PixelSize::byte_len`], but `None` when a side exceeds [`PixelSize::MAX_SIDE`] or
    /// the length does not fit in `isize`.
    pub fn checked_byte_len(self) -> Option<usize> {
        if self.width > Self::MAX_SIDE || self.height > Self::MAX_SIDE {
            return None;
        }
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(PixelFormat::Rgba8Premul.bytes_per_pixel())
            .filter(|&n| isize::try_from(n).is_ok())
    }

    /// `true` when a frame of this size can be allocated and rendered.
    pub fn is_renderable(self) -> bool {
        !self.is_empty() && self.checked_byte_len().is_some()
    }

    /// Convert a size in points to device pixels.
    ///
    /// Each side is rounded and kept at least one pixel, unless the point size itself is not
    /// positive, in which case that side is zero.
    pub fn from_points(points: Size, pixel_density: f64) -> Self {
        fn side(v: f64, density: f64) -> u32 {
            if v.is_nan() || v <= 0.0 || density.is_nan() || density <= 0.0 {
                return 0;
            }
            (v * density).round().clamp(1.0, f64::from(u32::MAX)) as u32
        }

        Self {
            width: side(points.width, pixel_density),
            height: side(points.height, pixel_density),
        }
    }

    /// Scale down so the larger side is at most `max_side`, preserving aspect ratio.
    ///
    /// Never scales up. Sides stay at least one pixel unless already zero.
    pub fn clamp_max_side(self, max_side: u32) -> Self {
        let largest = self.width.max(self.height);
        if max_side == 0 || largest <= max_side {
            return self;
        }
        let scale = f64::from(max_side) / f64::from(largest);
        let shrink = |v: u32| -> u32 {
            if v == 0 {
                0
            } else {
                ((f64::from(v) * scale).round() as u32).clamp(1, max_side)
            }
        };
        Self {
            width: shrink(self.width),
            height: shrink(self.height),
        }
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Bytes in system pixel order.
    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
