//! Serialized render scheduling.
//!
//! Every call into a decoder goes through one [`RenderScheduler`](scheduler::RenderScheduler)
//! worker. Callers submit [`RenderRequest`](request::RenderRequest)s from any thread and observe
//! completion through a per-request [`RenderTicket`](request::RenderTicket).

/// Request, reply and ticket types.
pub mod request;
/// The single-worker priority scheduler.
pub mod scheduler;
