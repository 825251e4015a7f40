use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::decode::lottie::LottieDecoder;
use crate::foundation::core::{Fps, FrameIndex, PixelSize};
use crate::foundation::error::{DecodeError, RenderError};

/// A loaded animation's decoding context.
///
/// Implementations are the seam for native decoders. They are `Send` (moved onto the render
/// worker) but never required to be `Sync`: the scheduler guarantees at most one call at a time,
/// process-wide.
pub trait FrameDecoder: Send {
    /// Total frame count, fixed at load time.
    fn frame_count(&self) -> u64;

    /// Native frame rate, when the payload declares one.
    fn frame_rate(&self) -> Option<Fps> {
        None
    }

    /// Native canvas size, when the payload declares one.
    fn intrinsic_size(&self) -> Option<PixelSize> {
        None
    }

    /// Write exactly `size.byte_len()` bytes of premultiplied RGBA8 into `dst`.
    ///
    /// Arguments are validated by [`DecoderHandle`] before this is called: `frame` is in range,
    /// `size` is non-empty and `dst.len() == size.byte_len()`.
    fn render_into(&mut self, frame: FrameIndex, size: PixelSize, dst: &mut [u8]);
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Process-unique decoder handle identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl HandleId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Proof of exclusive execution rights over all decoders.
///
/// Only the render worker constructs one, so `render_frame` cannot be reached from anywhere else.
#[derive(Debug)]
pub(crate) struct Exclusive(());

impl Exclusive {
    pub(crate) fn acquire() -> Self {
        Self(())
    }
}

/// Owner of one loaded animation.
///
/// The native context is released by `release`, which the scheduler only performs after a drain
/// (see [`RenderScheduler::release_handle`](crate::RenderScheduler::release_handle)). The inner
/// mutex is never contended: all renders come from the single worker, and release waits for the
/// drain first. The lock only makes the handle `Sync`. It is never held together with the
/// scheduler's queue lock, and `release` takes it only after the drain has observed that no
/// render against this handle is in progress.
pub struct DecoderHandle {
    id: HandleId,
    frame_count: u64,
    frame_rate: Option<Fps>,
    intrinsic_size: Option<PixelSize>,
    live: AtomicBool,
    ctx: Mutex<Option<Box<dyn FrameDecoder>>>,
}

impl DecoderHandle {
    /// Parse a Lottie-JSON payload with the built-in decoder.
    ///
    /// Container formats (gzip `.tgs`) must be decompressed by the caller first.
    pub fn load(payload: &[u8]) -> Result<Self, DecodeError> {
        let decoder = LottieDecoder::parse(payload)?;
        Self::from_decoder(Box::new(decoder))
    }

    /// Wrap an already-loaded decoder.
    ///
    /// A decoder reporting zero frames is dropped immediately and never returned.
    pub fn from_decoder(decoder: Box<dyn FrameDecoder>) -> Result<Self, DecodeError> {
        let frame_count = decoder.frame_count();
        if frame_count == 0 {
            drop(decoder);
            return Err(DecodeError::EmptyAnimation);
        }
        let id = HandleId::next();
        tracing::debug!(handle = id.0, frame_count, "decoder handle loaded");
        Ok(Self {
            id,
            frame_count,
            frame_rate: decoder.frame_rate(),
            intrinsic_size: decoder.intrinsic_size(),
            live: AtomicBool::new(true),
            ctx: Mutex::new(Some(decoder)),
        })
    }

    /// Handle identity.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Total frame count (always positive).
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Native frame rate, if declared by the payload.
    pub fn frame_rate(&self) -> Option<Fps> {
        self.frame_rate
    }

    /// Native canvas size, if declared by the payload.
    pub fn intrinsic_size(&self) -> Option<PixelSize> {
        self.intrinsic_size
    }

    /// `false` once the handle has been released.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Render one frame into `dst`, which must hold exactly `size.byte_len()` bytes.
    pub(crate) fn render_frame(
        &self,
        _exclusive: &Exclusive,
        index: FrameIndex,
        size: PixelSize,
        dst: &mut [u8],
    ) -> Result<(), RenderError> {
        if !self.is_live() {
            return Err(RenderError::Released);
        }
        if index.0 >= self.frame_count {
            return Err(RenderError::InvalidFrame {
                index: index.0,
                frame_count: self.frame_count,
            });
        }
        if !size.is_renderable() {
            return Err(RenderError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }
        let needed = size.byte_len();
        if dst.len() < needed {
            return Err(RenderError::BufferTooSmall {
                needed,
                actual: dst.len(),
            });
        }

        let mut ctx = self.ctx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(decoder) = ctx.as_mut() else {
            return Err(RenderError::Released);
        };
        let dst = &mut dst[..needed];
        catch_unwind(AssertUnwindSafe(|| decoder.render_into(index, size, dst)))
            .map_err(|payload| RenderError::DecoderPanicked(panic_message(payload.as_ref())))
    }

    /// Clear liveness. New renders fail with [`RenderError::Released`]; the native context
    /// stays allocated until `release`.
    pub(crate) fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Clear liveness and drop the native context. Idempotent; returns `true` the first time.
    ///
    /// Callers must have drained the scheduler for this handle first.
    pub(crate) fn release(&self) -> bool {
        self.retire();
        let ctx = self
            .ctx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let released = ctx.is_some();
        drop(ctx);
        if released {
            tracing::debug!(handle = self.id.0, "decoder handle released");
        }
        released
    }
}

impl std::fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("id", &self.id)
            .field("frame_count", &self.frame_count)
            .field("frame_rate", &self.frame_rate)
            .field("intrinsic_size", &self.intrinsic_size)
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/handle.rs"]
mod tests;
