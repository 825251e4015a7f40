use std::sync::Arc;
use std::time::Duration;

use crate::decode::handle::{DecoderHandle, HandleId};
use crate::foundation::core::{Fps, FrameIndex, PixelSize, Size};
use crate::foundation::error::{RenderError, StickerError, StickerResult};
use crate::present::sink::{FrameRGBA, PresentationSink, PresentedFrame};
use crate::schedule::request::{Priority, RenderReply, RenderRequest, RenderTicket, TicketStatus};
use crate::schedule::scheduler::{CancelOutcome, RenderScheduler};
use crate::session::buffer::{BufferStats, FrameBuffer};

/// Display size used before the host has reported one.
const FALLBACK_POINT_SIZE: Size = Size::new(256.0, 256.0);

/// Options for an [`AnimationSession`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionOpts {
    /// Queue tier for this session's requests.
    pub priority: Priority,
    /// Device pixels per point.
    pub pixel_density: f64,
    /// Playback rate for a [`FrameClock`](crate::FrameClock) driving this session.
    pub target_fps: Fps,
    /// Cap on the larger render side in pixels. `None` disables clamping.
    pub max_pixel_dimension: Option<u32>,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            priority: Priority::Interactive,
            pixel_density: 2.0,
            target_fps: Fps::default(),
            max_pixel_dimension: Some(512),
        }
    }
}

impl SessionOpts {
    /// Check option consistency.
    pub fn validate(&self) -> StickerResult<()> {
        if !(self.pixel_density.is_finite() && self.pixel_density > 0.0) {
            return Err(StickerError::validation(
                "session pixel_density must be finite and > 0",
            ));
        }
        self.target_fps.validate()?;
        if self.max_pixel_dimension == Some(0) {
            return Err(StickerError::validation(
                "session max_pixel_dimension must be >= 1",
            ));
        }
        Ok(())
    }

    /// Device pixel size for a size in points.
    pub fn pixel_size(&self, points: Size) -> PixelSize {
        let px = PixelSize::from_points(points, self.pixel_density);
        match self.max_pixel_dimension {
            Some(max) => px.clamp_max_side(max),
            None => px,
        }
    }
}

/// Session counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SessionStats {
    /// Frames submitted to the scheduler.
    pub requested: u64,
    /// Frames handed to the sink.
    pub delivered: u64,
    /// In-flight requests cancelled because a newer frame was requested.
    pub superseded: u64,
    /// Replies discarded because their generation was no longer current.
    pub stale_dropped: u64,
    /// Frames lost to eviction or a full queue.
    pub skipped: u64,
    /// Frames that failed for any other reason.
    pub failed: u64,
    /// Clock ticks observed.
    pub ticks: u64,
    /// Clock ticks ignored because a render was still in flight.
    pub ticks_dropped: u64,
}

/// What one clock tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new frame was requested.
    Requested(FrameIndex),
    /// The previous render is still in flight; nothing was requested.
    Dropped,
    /// The session is invalidated; the clock should stop.
    Dead,
}

struct InFlight {
    ticket: RenderTicket,
    frame: FrameIndex,
}

/// One consumer of one animation (typically a visible grid cell).
///
/// Owns its [`DecoderHandle`] and turns "show frame N at size S" into render requests. At most
/// one request is in flight; asking for a new frame cancels the previous one. Every request is
/// tagged with the session generation, and replies from an older generation never reach the sink.
pub struct AnimationSession {
    handle: Arc<DecoderHandle>,
    scheduler: RenderScheduler,
    sink: Box<dyn PresentationSink>,
    opts: SessionOpts,

    live: bool,
    generation: u64,
    last_requested: Option<FrameIndex>,
    last_delivered: Option<FrameIndex>,
    display_size: Option<Size>,
    in_flight: Option<InFlight>,
    buffer: FrameBuffer,
    stats: SessionStats,
}

impl AnimationSession {
    /// Create a session around a loaded handle.
    pub fn new(
        scheduler: RenderScheduler,
        handle: DecoderHandle,
        sink: Box<dyn PresentationSink>,
        opts: SessionOpts,
    ) -> StickerResult<Self> {
        opts.validate()?;
        Ok(Self {
            handle: Arc::new(handle),
            scheduler,
            sink,
            opts,
            live: true,
            generation: 0,
            last_requested: None,
            last_delivered: None,
            display_size: None,
            in_flight: None,
            buffer: FrameBuffer::new(),
            stats: SessionStats::default(),
        })
    }

    /// Parse `payload` and create a session. A malformed or empty payload yields no session.
    pub fn load(
        scheduler: RenderScheduler,
        payload: &[u8],
        sink: Box<dyn PresentationSink>,
        opts: SessionOpts,
    ) -> StickerResult<Self> {
        let handle = DecoderHandle::load(payload)?;
        Self::new(scheduler, handle, sink, opts)
    }

    /// Identity of the owned decoder handle.
    pub fn handle_id(&self) -> HandleId {
        self.handle.id()
    }

    /// Total frames of the animation.
    pub fn frame_count(&self) -> u64 {
        self.handle.frame_count()
    }

    /// Native frame rate, if the payload declares one.
    pub fn native_fps(&self) -> Option<Fps> {
        self.handle.frame_rate()
    }

    /// Session options.
    pub fn opts(&self) -> &SessionOpts {
        &self.opts
    }

    /// `false` after [`AnimationSession::invalidate`].
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Current generation; bumps with every request.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Most recently requested frame.
    pub fn last_requested(&self) -> Option<FrameIndex> {
        self.last_requested
    }

    /// Most recently presented frame.
    pub fn last_delivered(&self) -> Option<FrameIndex> {
        self.last_delivered
    }

    /// `true` while a request is outstanding.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Buffer reuse counters.
    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    /// Record the size (in points) the host displays this animation at.
    pub fn set_display_size(&mut self, size: Size) {
        self.display_size = Some(size);
    }

    fn display_size(&self) -> Size {
        if let Some(size) = self.display_size {
            return size;
        }
        match self.handle.intrinsic_size() {
            Some(px) => Size::new(
                f64::from(px.width) / self.opts.pixel_density,
                f64::from(px.height) / self.opts.pixel_density,
            ),
            None => FALLBACK_POINT_SIZE,
        }
    }

    /// Cancel the in-flight request, reclaiming its storage where possible.
    fn supersede(&mut self) {
        let Some(prev) = self.in_flight.take() else {
            return;
        };
        self.stats.superseded += 1;
        match self.scheduler.cancel(&prev.ticket) {
            CancelOutcome::Removed(buf) => self.buffer.checkin(buf),
            CancelOutcome::Completed(Some(reply)) => self.buffer.checkin(reply.buffer),
            CancelOutcome::Suppressed | CancelOutcome::Completed(None) => {}
        }
        tracing::trace!(frame = prev.frame.0, "superseded in-flight frame");
    }

    fn build_request(
        &mut self,
        index: FrameIndex,
        size: Size,
    ) -> Result<RenderRequest, RenderError> {
        self.supersede();
        self.generation += 1;
        self.last_requested = Some(index);
        self.display_size = Some(size);
        self.stats.requested += 1;

        let px = self.opts.pixel_size(size);
        if px.checked_byte_len().is_none() {
            let err = RenderError::InvalidSize {
                width: px.width,
                height: px.height,
            };
            self.note_failure(index, &err);
            return Err(err);
        }
        let buf = self.buffer.checkout(px);
        Ok(RenderRequest::new(self.handle.clone(), index, px, self.opts.priority)
            .with_generation(self.generation)
            .with_buffer(buf))
    }

    /// Ask for frame `index` at `size` points. Never blocks.
    ///
    /// Any in-flight request is cancelled first. The result reaches the sink through
    /// [`AnimationSession::poll`]. A size too large to allocate is counted as a failed frame
    /// and nothing is submitted.
    pub fn request_frame(&mut self, index: FrameIndex, size: Size) {
        if !self.live {
            tracing::debug!(frame = index.0, "request on invalidated session ignored");
            return;
        }
        let Ok(request) = self.build_request(index, size) else {
            return;
        };
        let ticket = self.scheduler.submit(request);
        self.in_flight = Some(InFlight {
            ticket,
            frame: index,
        });
    }

    /// Deliver a completed request, if any. Returns the frame presented.
    pub fn poll(&mut self) -> Option<FrameIndex> {
        let inflight = self.in_flight.take()?;
        match inflight.ticket.try_take() {
            TicketStatus::Pending => {
                self.in_flight = Some(inflight);
                None
            }
            TicketStatus::Ready(reply) => self.accept(reply),
            TicketStatus::Cancelled => None,
        }
    }

    /// Block up to `timeout` for the in-flight request, then deliver it.
    pub fn wait_delivery(&mut self, timeout: Duration) -> Option<FrameIndex> {
        let inflight = self.in_flight.take()?;
        match inflight.ticket.wait_timeout(timeout) {
            TicketStatus::Pending => {
                self.in_flight = Some(inflight);
                None
            }
            TicketStatus::Ready(reply) => self.accept(reply),
            TicketStatus::Cancelled => None,
        }
    }

    fn accept(&mut self, reply: RenderReply) -> Option<FrameIndex> {
        let RenderReply {
            frame,
            size,
            generation,
            buffer,
            result,
            ..
        } = reply;

        let presented = if !self.live || generation != self.generation {
            self.stats.stale_dropped += 1;
            tracing::trace!(frame = frame.0, generation, "stale frame dropped");
            None
        } else {
            match result {
                Ok(()) => {
                    self.present(frame, size, generation, &buffer);
                    Some(frame)
                }
                Err(err) => {
                    self.note_failure(frame, &err);
                    None
                }
            }
        };
        self.buffer.checkin(buffer);
        presented
    }

    fn present(&mut self, frame: FrameIndex, size: PixelSize, generation: u64, pixels: &[u8]) {
        let presented = PresentedFrame {
            frame,
            size,
            generation,
            pixels,
        };
        if let Err(err) = self.sink.present(presented) {
            tracing::warn!(frame = frame.0, error = %err, "presentation sink failed");
            self.stats.failed += 1;
            return;
        }
        self.last_delivered = Some(frame);
        self.stats.delivered += 1;
    }

    fn note_failure(&mut self, frame: FrameIndex, err: &RenderError) {
        if err.is_backpressure() {
            self.stats.skipped += 1;
            tracing::debug!(frame = frame.0, error = %err, "frame skipped");
        } else {
            self.stats.failed += 1;
            if err.is_caller_error() {
                tracing::warn!(frame = frame.0, error = %err, "frame render failed");
            } else {
                tracing::debug!(frame = frame.0, error = %err, "frame render failed");
            }
        }
    }

    /// Render `index` and wait for it on this thread, then present it.
    ///
    /// Goes through the scheduler like any other request.
    pub fn render_sync(&mut self, index: FrameIndex, size: Size) -> Result<FrameRGBA, RenderError> {
        if !self.live {
            return Err(RenderError::Released);
        }
        let request = self.build_request(index, size)?;
        let reply = self.scheduler.render_blocking(request);
        let out = match &reply.result {
            Ok(()) => Ok(FrameRGBA::from_pixels(reply.size, &reply.buffer)),
            Err(err) => Err(err.clone()),
        };
        self.accept(reply);
        out
    }

    /// Render and present frame 0 immediately, before any clock starts.
    pub fn prime(&mut self, size: Size) -> Result<(), RenderError> {
        self.render_sync(FrameIndex(0), size).map(|_| ())
    }

    /// One clock tick: deliver what finished, then request the next frame unless one is still
    /// in flight.
    pub fn advance(&mut self) -> TickOutcome {
        self.stats.ticks += 1;
        self.poll();
        if !self.live {
            return TickOutcome::Dead;
        }
        if self.in_flight.is_some() {
            self.stats.ticks_dropped += 1;
            return TickOutcome::Dropped;
        }
        let next = self
            .last_requested
            .map_or(FrameIndex(0), |f| f.next_wrapping(self.frame_count()));
        let size = self.display_size();
        self.request_frame(next, size);
        TickOutcome::Requested(next)
    }

    /// Tear down: cancel in-flight work, drain the scheduler for this handle, release the
    /// decoder and clear the sink. Idempotent.
    pub fn invalidate(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.supersede();
        self.scheduler.release_handle(&self.handle);
        self.buffer.clear();
        if let Err(err) = self.sink.clear() {
            tracing::warn!(error = %err, "presentation sink failed to clear");
        }
        tracing::info!(
            handle = self.handle.id().0,
            delivered = self.stats.delivered,
            "animation session invalidated"
        );
    }
}

impl Drop for AnimationSession {
    fn drop(&mut self) {
        self.invalidate();
    }
}

impl std::fmt::Debug for AnimationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationSession")
            .field("handle", &self.handle.id())
            .field("live", &self.live)
            .field("generation", &self.generation)
            .field("last_requested", &self.last_requested)
            .field("last_delivered", &self.last_delivered)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/animation_session.rs"]
mod tests;
