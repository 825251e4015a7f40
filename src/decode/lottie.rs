use crate::decode::handle::FrameDecoder;
use crate::foundation::core::{Fps, FrameIndex, PixelSize, Rgba8Premul};
use crate::foundation::error::DecodeError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Top-level Lottie document fields needed to schedule playback.
#[derive(Debug, Clone, serde::Deserialize)]
struct LottieHeader {
    /// Frame rate.
    fr: f64,
    /// In point (first frame, inclusive).
    ip: f64,
    /// Out point (exclusive).
    op: f64,
    /// Canvas width.
    w: u32,
    /// Canvas height.
    h: u32,
}

/// Built-in decoder for Lottie-JSON payloads.
///
/// It reads the document header (timing and canvas) and renders a deterministic placeholder:
/// a transparent frame with an opaque band whose width tracks playback progress. Vector
/// rasterization is provided by native decoders plugged in through [`FrameDecoder`].
#[derive(Debug, Clone)]
pub struct LottieDecoder {
    frame_count: u64,
    frame_rate: Option<Fps>,
    canvas: PixelSize,
    band: Rgba8Premul,
}

impl LottieDecoder {
    /// Parse a decompressed Lottie-JSON payload.
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.starts_with(&GZIP_MAGIC) {
            return Err(DecodeError::Malformed(
                "payload is gzip-compressed; decompress the container first".to_string(),
            ));
        }
        let header: LottieHeader = serde_json::from_slice(payload)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let span = header.op - header.ip;
        let frame_count = if span.is_finite() && span > 0.0 {
            span.ceil() as u64
        } else {
            0
        };

        Ok(Self {
            frame_count,
            frame_rate: fps_from_f64(header.fr),
            canvas: PixelSize::new(header.w, header.h),
            band: Rgba8Premul::from_straight_rgba(0x2a, 0x9d, 0xf4, 0xff),
        })
    }
}

fn fps_from_f64(fr: f64) -> Option<Fps> {
    if !fr.is_finite() || fr <= 0.0 || fr > f64::from(u32::MAX) {
        return None;
    }
    if fr.fract() == 0.0 {
        return Fps::new(fr as u32, 1).ok();
    }
    Fps::new((fr * 1000.0).round() as u32, 1000).ok()
}

impl FrameDecoder for LottieDecoder {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame_rate(&self) -> Option<Fps> {
        self.frame_rate
    }

    fn intrinsic_size(&self) -> Option<PixelSize> {
        (!self.canvas.is_empty()).then_some(self.canvas)
    }

    fn render_into(&mut self, frame: FrameIndex, size: PixelSize, dst: &mut [u8]) {
        let width = size.width as usize;
        let filled = ((frame.0 + 1) as u128 * width as u128).div_ceil(self.frame_count as u128);
        let filled = (filled as usize).min(width);

        let band = self.band.to_bytes();
        let clear = Rgba8Premul::transparent().to_bytes();
        for row in dst.chunks_exact_mut(width * 4) {
            let (on, off) = row.split_at_mut(filled * 4);
            for px in on.chunks_exact_mut(4) {
                px.copy_from_slice(&band);
            }
            for px in off.chunks_exact_mut(4) {
                px.copy_from_slice(&clear);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/lottie.rs"]
mod tests;
