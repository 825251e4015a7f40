use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::decode::handle::{DecoderHandle, HandleId};
use crate::foundation::core::{FrameIndex, PixelSize};
use crate::foundation::error::RenderError;

/// Urgency tier of a render request. Lower rank is more urgent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Currently visible content; served before anything else.
    #[default]
    Interactive,
    /// Prefetch work; may be starved while interactive work keeps arriving.
    Background,
    /// Explicit rank for callers that need finer tiers.
    Custom(u8),
}

impl Priority {
    /// Numeric rank used for queue ordering.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Interactive => 0,
            Self::Background => 1,
            Self::Custom(rank) => rank,
        }
    }
}

/// Scheduler-assigned submission sequence number. Monotonically increasing per scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// A unit of render work.
pub struct RenderRequest {
    /// Target decoder.
    pub handle: Arc<DecoderHandle>,
    /// Frame to render.
    pub frame: FrameIndex,
    /// Destination size in pixels.
    pub size: PixelSize,
    /// Queue tier.
    pub priority: Priority,
    /// Caller staleness tag, echoed back in the reply.
    pub generation: u64,
    /// Destination storage. Resized to `size.byte_len()` before execution and always handed
    /// back in the reply so the caller can reuse it.
    pub buffer: Vec<u8>,
}

impl RenderRequest {
    /// Build a request with an empty buffer and generation `0`.
    pub fn new(
        handle: Arc<DecoderHandle>,
        frame: FrameIndex,
        size: PixelSize,
        priority: Priority,
    ) -> Self {
        Self {
            handle,
            frame,
            size,
            priority,
            generation: 0,
            buffer: Vec::new(),
        }
    }

    /// Set the staleness tag.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Provide reusable destination storage.
    pub fn with_buffer(mut self, buffer: Vec<u8>) -> Self {
        self.buffer = buffer;
        self
    }
}

impl std::fmt::Debug for RenderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRequest")
            .field("handle", &self.handle.id())
            .field("frame", &self.frame)
            .field("size", &self.size)
            .field("priority", &self.priority)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Completion of one request, delivered exactly once.
#[derive(Debug)]
pub struct RenderReply {
    /// Request identity.
    pub id: RequestId,
    /// Target decoder identity.
    pub handle: HandleId,
    /// Requested frame.
    pub frame: FrameIndex,
    /// Requested size.
    pub size: PixelSize,
    /// Caller staleness tag from the request.
    pub generation: u64,
    /// The request's storage. Holds `size.byte_len()` rendered bytes on success.
    pub buffer: Vec<u8>,
    /// Outcome.
    pub result: Result<(), RenderError>,
}

impl RenderReply {
    /// `true` when the frame was rendered.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// What a ticket currently observes.
#[derive(Debug)]
pub enum TicketStatus {
    /// Not completed yet.
    Pending,
    /// Completed; the reply is handed over once.
    Ready(RenderReply),
    /// Cancelled, suppressed, or the reply was already taken.
    Cancelled,
}

/// Receiving side of one request's completion channel.
///
/// Dropping a ticket tombstones its request: it is skipped if still pending and its completion
/// is suppressed if executing.
pub struct RenderTicket {
    pub(crate) id: RequestId,
    pub(crate) handle: HandleId,
    pub(crate) frame: FrameIndex,
    pub(crate) size: PixelSize,
    pub(crate) generation: u64,
    pub(crate) rx: Receiver<RenderReply>,
    pub(crate) tombstone: Arc<AtomicBool>,
}

impl RenderTicket {
    /// Request identity.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Target decoder identity.
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Requested frame.
    pub fn frame(&self) -> FrameIndex {
        self.frame
    }

    /// Caller staleness tag.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Non-blocking check.
    pub fn try_take(&self) -> TicketStatus {
        match self.rx.try_recv() {
            Ok(reply) => TicketStatus::Ready(reply),
            Err(TryRecvError::Empty) => TicketStatus::Pending,
            Err(TryRecvError::Disconnected) => TicketStatus::Cancelled,
        }
    }

    /// Block this thread for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> TicketStatus {
        match self.rx.recv_timeout(timeout) {
            Ok(reply) => TicketStatus::Ready(reply),
            Err(RecvTimeoutError::Timeout) => TicketStatus::Pending,
            Err(RecvTimeoutError::Disconnected) => TicketStatus::Cancelled,
        }
    }

    /// Block this thread until completion. `None` when the request was cancelled.
    pub fn wait(self) -> Option<RenderReply> {
        self.rx.recv().ok()
    }

    /// Synthesize a failed reply for a request whose completion never arrived.
    pub(crate) fn orphaned(&self, error: RenderError) -> RenderReply {
        RenderReply {
            id: self.id,
            handle: self.handle,
            frame: self.frame,
            size: self.size,
            generation: self.generation,
            buffer: Vec::new(),
            result: Err(error),
        }
    }
}

impl Drop for RenderTicket {
    fn drop(&mut self) {
        self.tombstone.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for RenderTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTicket")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("frame", &self.frame)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
