#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use sticker_render::{
    DecoderHandle, FrameDecoder, FrameIndex, PixelSize, Priority, RenderRequest, RenderScheduler,
    RenderTicket,
};

pub const WAIT: Duration = Duration::from_secs(10);

/// Lottie-JSON payload with `frames` frames at 30 fps.
pub fn lottie(frames: u32) -> Vec<u8> {
    format!(r#"{{"v":"5.7.4","fr":30,"ip":0,"op":{frames},"w":512,"h":512,"layers":[]}}"#)
        .into_bytes()
}

/// Park the worker of `sched` inside a gated decode call. Returns the gate and the parked ticket.
pub fn park(sched: &RenderScheduler, log: &Arc<ProbeLog>) -> (Arc<Gate>, RenderTicket) {
    let gate = Gate::new();
    let blocker = Probe::new("blocker", 1, log).gated(&gate).into_handle();
    let ticket = sched.submit(RenderRequest::new(
        blocker,
        FrameIndex(0),
        PixelSize::new(1, 1),
        Priority::Interactive,
    ));
    gate.wait_entered();
    (gate, ticket)
}

/// Holds the render worker inside a decode call until opened.
#[derive(Default)]
pub struct Gate {
    state: Mutex<(bool, bool)>,
    cv: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn pass(&self) {
        let mut st = self.state.lock().unwrap();
        st.0 = true;
        self.cv.notify_all();
        while !st.1 {
            st = self.cv.wait(st).unwrap();
        }
    }

    pub fn wait_entered(&self) {
        let mut st = self.state.lock().unwrap();
        while !st.0 {
            st = self.cv.wait(st).unwrap();
        }
    }

    pub fn open(&self) {
        let mut st = self.state.lock().unwrap();
        st.1 = true;
        self.cv.notify_all();
    }
}

/// Shared record of every decode call across probes.
#[derive(Default)]
pub struct ProbeLog {
    inside: AtomicBool,
    pub reentered: AtomicBool,
    pub used_after_release: AtomicBool,
    pub released: AtomicUsize,
    order: Mutex<Vec<(&'static str, u64)>>,
}

impl ProbeLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn order(&self) -> Vec<(&'static str, u64)> {
        self.order.lock().unwrap().clone()
    }

    pub fn frames_of(&self, label: &str) -> Vec<u64> {
        self.order()
            .into_iter()
            .filter(|(l, _)| *l == label)
            .map(|(_, f)| f)
            .collect()
    }
}

/// Instrumented decoder: detects re-entrant calls and calls after release.
pub struct Probe {
    label: &'static str,
    frames: u64,
    log: Arc<ProbeLog>,
    gate: Option<Arc<Gate>>,
    delay: Duration,
    released: Arc<AtomicBool>,
}

impl Probe {
    pub fn new(label: &'static str, frames: u64, log: &Arc<ProbeLog>) -> Self {
        Self {
            label,
            frames,
            log: log.clone(),
            gate: None,
            delay: Duration::ZERO,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn gated(mut self, gate: &Arc<Gate>) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn into_handle(self) -> Arc<DecoderHandle> {
        Arc::new(self.into_owned_handle())
    }

    pub fn into_owned_handle(self) -> DecoderHandle {
        DecoderHandle::from_decoder(Box::new(self)).unwrap()
    }
}

impl FrameDecoder for Probe {
    fn frame_count(&self) -> u64 {
        self.frames
    }

    fn render_into(&mut self, frame: FrameIndex, _size: PixelSize, dst: &mut [u8]) {
        if self.log.inside.swap(true, Ordering::SeqCst) {
            self.log.reentered.store(true, Ordering::SeqCst);
        }
        if self.released.load(Ordering::SeqCst) {
            self.log.used_after_release.store(true, Ordering::SeqCst);
        }
        if let Some(gate) = self.gate.take() {
            gate.pass();
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        dst.fill(frame.0 as u8);
        self.log.order.lock().unwrap().push((self.label, frame.0));
        self.log.inside.store(false, Ordering::SeqCst);
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        // Canary: any later decode through this context would trip `used_after_release`.
        self.released.store(true, Ordering::SeqCst);
        self.log.released.fetch_add(1, Ordering::SeqCst);
    }
}
