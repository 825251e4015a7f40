//! Playback pacing.

/// Fixed-interval ticker driving one animation session.
pub mod frame_clock;
