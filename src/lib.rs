//! Serialized render scheduling for animated sticker decoders.
//!
//! Animation decoders (Lottie, TGS) are not safe to call from two threads at once, yet a
//! scrolling grid has many visible animations asking for frames concurrently. This crate
//! funnels every decode call through one worker:
//!
//! - Load a payload into a [`DecoderHandle`]
//! - Wrap it in an [`AnimationSession`] that submits requests to a shared [`RenderScheduler`]
//! - Drive the session with a [`FrameClock`] and receive frames in a [`PresentationSink`]
//!
//! Key constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **One decode at a time, process-wide**: only the scheduler worker can call a decoder.
//! - **Bounded queue**: pending depth is capped; the least urgent request is evicted.
//! - **Drain before release**: a decoder is freed only once nothing can run against it.
//! - **Premultiplied RGBA8** end-to-end.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Playback pacing.
pub mod clock;
/// Configuration surface.
pub mod config;
/// Decoder handles and the built-in Lottie decoder.
pub mod decode;
/// Presentation sinks.
pub mod present;
/// Render requests and the scheduler.
pub mod schedule;
/// Animation sessions.
pub mod session;

pub use crate::foundation::core::{Fps, FrameIndex, PixelFormat, PixelSize, Rgba8Premul, Size};
pub use crate::foundation::error::{DecodeError, RenderError, StickerError, StickerResult};

pub use crate::clock::frame_clock::{ClockState, FrameClock};
pub use crate::config::RenderConfig;
pub use crate::decode::handle::{DecoderHandle, FrameDecoder, HandleId};
pub use crate::decode::lottie::LottieDecoder;
pub use crate::present::sink::{
    CapturedFrame, ChannelSink, FrameRGBA, InMemorySink, NullSink, PresentationSink,
    PresentedFrame,
};
pub use crate::schedule::request::{
    Priority, RenderReply, RenderRequest, RenderTicket, RequestId, TicketStatus,
};
pub use crate::schedule::scheduler::{CancelOutcome, RenderScheduler, SchedulerOpts, SchedulerStats};
pub use crate::session::animation_session::{
    AnimationSession, SessionOpts, SessionStats, TickOutcome,
};
pub use crate::session::buffer::{BufferStats, FrameBuffer};
