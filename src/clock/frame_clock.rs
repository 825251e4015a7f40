use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::foundation::core::Fps;
use crate::foundation::error::{StickerError, StickerResult};
use crate::session::animation_session::{AnimationSession, TickOutcome};

/// Clock state. There are no other states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    /// Not ticking.
    Stopped,
    /// Ticking at the configured rate.
    Running,
}

struct Ticker {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
    exited: Arc<AtomicBool>,
}

/// Drives "advance to next frame" ticks for one session at a fixed rate.
///
/// Ticks run on a dedicated timer thread. A tick never queues backlog: if the previous frame is
/// still rendering, the tick is dropped, and a late timer skips missed deadlines instead of
/// catching up. The clock stops by itself once its session is invalidated.
///
/// Do not hold the session lock while calling [`FrameClock::stop`].
pub struct FrameClock {
    session: Arc<Mutex<AnimationSession>>,
    ticker: Option<Ticker>,
    ticks: Arc<AtomicU64>,
}

impl FrameClock {
    /// Create a stopped clock for `session`.
    pub fn new(session: Arc<Mutex<AnimationSession>>) -> Self {
        Self {
            session,
            ticker: None,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current state.
    pub fn state(&self) -> ClockState {
        match &self.ticker {
            Some(t) if !t.exited.load(Ordering::Acquire) => ClockState::Running,
            _ => ClockState::Stopped,
        }
    }

    /// Ticks fired since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Start ticking at `target_fps`, restarting if already running.
    pub fn start(&mut self, target_fps: Fps) -> StickerResult<()> {
        let fps = target_fps.validate()?;
        self.stop();

        let interval = fps.frame_interval();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let exited = Arc::new(AtomicBool::new(false));
        let session = self.session.clone();
        let ticks = self.ticks.clone();
        let thread_exited = exited.clone();

        let thread = std::thread::Builder::new()
            .name("sticker-frame-clock".to_string())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                loop {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    ticks.fetch_add(1, Ordering::Relaxed);
                    let outcome = session
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .advance();
                    if outcome == TickOutcome::Dead {
                        tracing::debug!("frame clock stopping: session invalidated");
                        break;
                    }

                    deadline += interval;
                    let now = Instant::now();
                    if deadline <= now {
                        deadline = now + interval;
                    }
                }
                thread_exited.store(true, Ordering::Release);
            })
            .map_err(|e| StickerError::Other(anyhow::Error::new(e).context("spawn frame clock")))?;

        tracing::debug!(fps = fps.as_f64(), "frame clock started");
        self.ticker = Some(Ticker {
            stop_tx,
            thread,
            exited,
        });
        Ok(())
    }

    /// Halt ticking. Returns once no further tick can fire. Idempotent.
    pub fn stop(&mut self) {
        let Some(ticker) = self.ticker.take() else {
            return;
        };
        let _ = ticker.stop_tx.send(());
        if ticker.thread.join().is_err() {
            tracing::warn!("frame clock thread panicked");
        }
        tracing::debug!(ticks = self.ticks(), "frame clock stopped");
    }
}

impl Drop for FrameClock {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClock")
            .field("state", &self.state())
            .field("ticks", &self.ticks())
            .finish_non_exhaustive()
    }
}
