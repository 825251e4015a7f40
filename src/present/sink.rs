use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};

use crate::foundation::core::{FrameIndex, PixelSize};
use crate::foundation::error::{StickerError, StickerResult};

/// A rendered frame as RGBA8 pixels.
///
/// Frames are **premultiplied alpha**. The `premultiplied` flag is included to make this explicit
/// at API boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Copy a borrowed pixel buffer.
    pub fn from_pixels(size: PixelSize, pixels: &[u8]) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: pixels.to_vec(),
            premultiplied: true,
        }
    }
}

/// One delivered frame, borrowed from the session's buffer for the duration of `present`.
#[derive(Clone, Copy, Debug)]
pub struct PresentedFrame<'a> {
    /// Frame index within the animation.
    pub frame: FrameIndex,
    /// Pixel dimensions of `pixels`.
    pub size: PixelSize,
    /// Session generation that produced this frame.
    pub generation: u64,
    /// Premultiplied RGBA8, `size.byte_len()` bytes.
    pub pixels: &'a [u8],
}

/// An owned copy of a [`PresentedFrame`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Frame index within the animation.
    pub frame: FrameIndex,
    /// Session generation that produced this frame.
    pub generation: u64,
    /// Pixels.
    pub image: FrameRGBA,
}

impl From<PresentedFrame<'_>> for CapturedFrame {
    fn from(f: PresentedFrame<'_>) -> Self {
        Self {
            frame: f.frame,
            generation: f.generation,
            image: FrameRGBA::from_pixels(f.size, f.pixels),
        }
    }
}

/// Consumer of rendered frames.
///
/// Ordering contract: within one session, `present` is only called with the generation the
/// session currently expects; stale results never reach the sink.
pub trait PresentationSink: Send {
    /// Display one frame.
    fn present(&mut self, frame: PresentedFrame<'_>) -> StickerResult<()>;

    /// The owning session was invalidated; drop whatever is displayed.
    fn clear(&mut self) -> StickerResult<()> {
        Ok(())
    }
}

/// In-memory sink for tests and debugging. Clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    frames: Arc<Mutex<Vec<CapturedFrame>>>,
    clears: Arc<Mutex<u32>>,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured frames, in presentation order.
    pub fn frames(&self) -> Vec<CapturedFrame> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of captured frames.
    pub fn len(&self) -> usize {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// `true` when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times `clear` was called.
    pub fn clears(&self) -> u32 {
        *self.clears.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PresentationSink for InMemorySink {
    fn present(&mut self, frame: PresentedFrame<'_>) -> StickerResult<()> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.into());
        Ok(())
    }

    fn clear(&mut self) -> StickerResult<()> {
        *self.clears.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

/// Sink that only counts frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink {
    /// Frames presented so far.
    pub presented: u64,
}

impl PresentationSink for NullSink {
    fn present(&mut self, _frame: PresentedFrame<'_>) -> StickerResult<()> {
        self.presented += 1;
        Ok(())
    }
}

/// Forwards owned frames to another thread (typically the UI owner).
///
/// When the receiver falls behind and the channel is full, the frame is skipped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: SyncSender<CapturedFrame>,
}

impl ChannelSink {
    /// Wrap the sending half of a bounded channel.
    pub fn new(tx: SyncSender<CapturedFrame>) -> Self {
        Self { tx }
    }
}

impl PresentationSink for ChannelSink {
    fn present(&mut self, frame: PresentedFrame<'_>) -> StickerResult<()> {
        match self.tx.try_send(frame.into()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(skipped)) => {
                tracing::debug!(frame = skipped.frame.0, "presentation channel full; frame skipped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(StickerError::validation(
                "presentation channel receiver disconnected",
            )),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/present/sink.rs"]
mod tests;
