//! Per-consumer animation sessions.

/// Session-owned reusable pixel storage.
pub mod buffer;
/// Frame requests, staleness and teardown for one visible animation.
pub mod animation_session;
