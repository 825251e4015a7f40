//! Presentation sinks.
//!
//! Sinks receive successfully rendered frames from an animation session and turn them into
//! whatever the host displays. The core treats them as opaque.

/// Sink trait and built-in sinks.
pub mod sink;
