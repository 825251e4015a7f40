use crate::foundation::core::PixelSize;

/// Reuse counters for a [`FrameBuffer`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BufferStats {
    /// Fresh allocations.
    pub allocations: u64,
    /// Bytes requested across fresh allocations.
    pub alloc_bytes: u64,
    /// Checkouts served from retained storage.
    pub reuses: u64,
}

/// One capacity-tracked pixel buffer, exclusively owned by a session.
///
/// The storage moves into a render request on checkout and comes back with the reply. It is
/// reallocated only when a larger frame is needed.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    retained: Option<Vec<u8>>,
    stats: BufferStats,
}

impl FrameBuffer {
    /// Create an empty buffer slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take storage able to hold one frame of `size`.
    ///
    /// Sizes that cannot be rendered get no preallocation.
    pub fn checkout(&mut self, size: PixelSize) -> Vec<u8> {
        let needed = size.checked_byte_len().unwrap_or(0);
        if let Some(buf) = self.retained.take()
            && buf.capacity() >= needed
        {
            self.stats.reuses += 1;
            return buf;
        }
        self.stats.allocations += 1;
        self.stats.alloc_bytes += needed as u64;
        Vec::with_capacity(needed)
    }

    /// Return storage. The larger of the retained and returned buffers is kept.
    pub fn checkin(&mut self, buf: Vec<u8>) {
        match &self.retained {
            Some(kept) if kept.capacity() >= buf.capacity() => {}
            _ => self.retained = Some(buf),
        }
    }

    /// Capacity of the retained storage, `0` when checked out.
    pub fn retained_capacity(&self) -> usize {
        self.retained.as_ref().map_or(0, Vec::capacity)
    }

    /// Drop retained storage.
    pub fn clear(&mut self) {
        self.retained = None;
    }

    /// Counter snapshot.
    pub fn stats(&self) -> BufferStats {
        self.stats
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/buffer.rs"]
mod tests;
