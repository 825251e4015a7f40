/// Convenience result type used across the crate.
pub type StickerResult<T> = Result<T, StickerError>;

/// Top-level error taxonomy used by crate APIs.
#[derive(thiserror::Error, Debug)]
pub enum StickerError {
    /// Invalid caller-provided data or options.
    #[error("validation error: {0}")]
    Validation(String),

    /// The animation payload could not be turned into a decoder handle.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A render request failed.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StickerError {
    /// Build a [`StickerError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StickerError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Failures while loading an animation payload. Both are fatal to session creation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload could not be parsed.
    #[error("malformed animation payload: {0}")]
    Malformed(String),

    /// The payload parsed but contains no frames.
    #[error("animation has no frames")]
    EmptyAnimation,
}

/// Failures delivered through a render request's completion channel.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Frame index outside `[0, frame_count)`.
    #[error("frame {index} out of range (frame count {frame_count})")]
    InvalidFrame {
        /// Requested frame.
        index: u64,
        /// Frame count of the target animation.
        frame_count: u64,
    },

    /// Destination width or height is zero.
    #[error("invalid render size {width}x{height}")]
    InvalidSize {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// Destination buffer cannot hold `width * height * 4` bytes.
    #[error("destination buffer too small: need {needed} bytes, have {actual}")]
    BufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Removed from the pending queue to admit a more urgent request.
    #[error("request evicted from a full render queue")]
    Evicted,

    /// Rejected at submission: the queue is full of requests that all outrank it.
    #[error("render queue full")]
    QueueFull,

    /// The target decoder handle was released before the request executed.
    #[error("decoder handle released")]
    Released,

    /// The scheduler shut down before the request executed.
    #[error("render scheduler stopped")]
    SchedulerStopped,

    /// The decoder panicked while rendering; the worker survived.
    #[error("decoder panicked: {0}")]
    DecoderPanicked(String),
}

impl RenderError {
    /// `true` for failures that are expected under load and mean "frame skipped".
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::Evicted | Self::QueueFull)
    }

    /// `true` for failures that indicate a caller bug rather than load or lifecycle.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFrame { .. } | Self::InvalidSize { .. } | Self::BufferTooSmall { .. }
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
