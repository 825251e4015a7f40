//! Decoder handles.
//!
//! A [`DecoderHandle`](handle::DecoderHandle) owns one loaded animation. Decoders are not safe to
//! call concurrently, so rendering goes exclusively through the render scheduler.

/// Handle ownership, liveness and the native decoder seam.
pub mod handle;
/// Built-in Lottie-JSON header decoder.
pub mod lottie;
