use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::decode::handle::{DecoderHandle, Exclusive, HandleId, panic_message};
use crate::foundation::error::{RenderError, StickerError, StickerResult};
use crate::schedule::request::{
    RenderReply, RenderRequest, RenderTicket, RequestId, TicketStatus,
};

/// Options controlling a [`RenderScheduler`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SchedulerOpts {
    /// Maximum number of pending (not executing) requests.
    pub max_pending: usize,
    /// Name of the worker thread.
    pub worker_name: String,
}

impl Default for SchedulerOpts {
    fn default() -> Self {
        Self {
            max_pending: 50,
            worker_name: "sticker-render".to_string(),
        }
    }
}

impl SchedulerOpts {
    /// Check option consistency.
    pub fn validate(&self) -> StickerResult<()> {
        if self.max_pending == 0 {
            return Err(StickerError::validation(
                "scheduler max_pending must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Scheduler counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SchedulerStats {
    /// Requests passed to `submit`.
    pub submitted: u64,
    /// Requests the worker ran against a decoder handle.
    pub executed: u64,
    /// Executed requests whose result was an error.
    pub failed: u64,
    /// Pending requests displaced by a more urgent one.
    pub evicted: u64,
    /// Requests refused at submission because the queue was full.
    pub rejected: u64,
    /// Pending requests removed by cancellation or tombstoning.
    pub cancelled: u64,
    /// Executed requests whose completion was suppressed.
    pub suppressed: u64,
    /// Pending requests failed by a drain or shutdown.
    pub discarded: u64,
    /// Highest pending depth observed.
    pub max_depth: usize,
}

/// Result of [`RenderScheduler::cancel`].
#[derive(Debug)]
pub enum CancelOutcome {
    /// Removed while pending; its storage is handed back.
    Removed(Vec<u8>),
    /// Currently executing; the render finishes but its completion is suppressed.
    Suppressed,
    /// Already finished. Carries the reply if it had arrived and was not taken yet.
    Completed(Option<RenderReply>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RankKey {
    rank: u8,
    seq: u64,
}

struct Job {
    id: RequestId,
    request: RenderRequest,
    tx: SyncSender<RenderReply>,
    tombstone: Arc<AtomicBool>,
}

impl Job {
    fn is_tombstoned(&self) -> bool {
        self.tombstone.load(Ordering::Acquire)
    }

    fn reply(self, result: Result<(), RenderError>) -> (RenderReply, SyncSender<RenderReply>) {
        let Job { id, request, tx, .. } = self;
        let reply = RenderReply {
            id,
            handle: request.handle.id(),
            frame: request.frame,
            size: request.size,
            generation: request.generation,
            buffer: request.buffer,
            result,
        };
        (reply, tx)
    }

    fn deliver(self, result: Result<(), RenderError>) {
        let (reply, tx) = self.reply(result);
        // Capacity 1 and a single send per job: this never blocks. A closed receiver is fine.
        let _ = tx.try_send(reply);
    }
}

struct Executing {
    id: RequestId,
    handle: HandleId,
    suppressed: bool,
}

#[derive(Default)]
struct QueueState {
    pending: BTreeMap<RankKey, Job>,
    keys: HashMap<RequestId, RankKey>,
    executing: Option<Executing>,
    next_seq: u64,
    shutdown: bool,
    stats: SchedulerStats,
}

impl QueueState {
    fn remove(&mut self, id: RequestId) -> Option<Job> {
        let key = self.keys.remove(&id)?;
        self.pending.remove(&key)
    }

    fn purge_tombstoned(&mut self) {
        let dead: Vec<RequestId> = self
            .pending
            .values()
            .filter(|job| job.is_tombstoned())
            .map(|job| job.id)
            .collect();
        for id in dead {
            if self.remove(id).is_some() {
                self.stats.cancelled += 1;
            }
        }
    }

    fn take_where(&mut self, pred: impl Fn(&Job) -> bool) -> Vec<Job> {
        let ids: Vec<RequestId> = self
            .pending
            .values()
            .filter(|job| pred(job))
            .map(|job| job.id)
            .collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    fn is_busy_with(&self, handle: HandleId) -> bool {
        self.executing.as_ref().is_some_and(|ex| ex.handle == handle)
    }
}

struct Shared {
    opts: SchedulerOpts,
    state: Mutex<QueueState>,
    work_ready: Condvar,
    progress: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_job(&self) -> Option<Job> {
        let mut st = self.lock();
        loop {
            while let Some((_, job)) = st.pending.pop_first() {
                st.keys.remove(&job.id);
                if job.is_tombstoned() {
                    st.stats.cancelled += 1;
                    continue;
                }
                st.executing = Some(Executing {
                    id: job.id,
                    handle: job.request.handle.id(),
                    suppressed: false,
                });
                return Some(job);
            }
            self.progress.notify_all();
            if st.shutdown {
                return None;
            }
            st = self
                .work_ready
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn finish(&self, job: Job, result: Result<(), RenderError>) {
        if let Err(err) = &result {
            if err.is_caller_error() {
                tracing::warn!(request = job.id.0, error = %err, "render request failed");
            } else {
                tracing::debug!(request = job.id.0, error = %err, "render request failed");
            }
        }

        let mut st = self.lock();
        let executing = st.executing.take();
        st.stats.executed += 1;
        if result.is_err() {
            st.stats.failed += 1;
        }
        let suppressed =
            executing.is_some_and(|ex| ex.id == job.id && ex.suppressed) || job.is_tombstoned();
        if suppressed {
            st.stats.suppressed += 1;
        } else {
            // The reply is in the channel before anyone can observe the executing slot empty.
            job.deliver(result);
        }
        self.progress.notify_all();
    }
}

fn execute(exclusive: &Exclusive, request: &mut RenderRequest) -> Result<(), RenderError> {
    let size = request.size;
    if !size.is_renderable() {
        return Err(RenderError::InvalidSize {
            width: size.width,
            height: size.height,
        });
    }
    request.buffer.resize(size.byte_len(), 0);
    request
        .handle
        .render_frame(exclusive, request.frame, size, &mut request.buffer)
}

fn run_worker(shared: Arc<Shared>) {
    let exclusive = Exclusive::acquire();
    tracing::info!(worker = %shared.opts.worker_name, "render worker started");
    while let Some(mut job) = shared.next_job() {
        // Every popped job must reach `finish`, or the executing slot stays occupied.
        let result = catch_unwind(AssertUnwindSafe(|| execute(&exclusive, &mut job.request)))
            .unwrap_or_else(|payload| {
                tracing::error!(request = job.id.0, "render worker caught a panic");
                Err(RenderError::DecoderPanicked(panic_message(payload.as_ref())))
            });
        shared.finish(job, result);
    }
    tracing::info!(worker = %shared.opts.worker_name, "render worker stopped");
}

struct Inner {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl Inner {
    fn shutdown(&self) {
        let discarded = {
            let mut st = self.shared.lock();
            if st.shutdown {
                Vec::new()
            } else {
                st.shutdown = true;
                let jobs = st.take_where(|_| true);
                st.stats.discarded += jobs.len() as u64;
                jobs
            }
        };
        self.shared.work_ready.notify_all();
        for job in discarded {
            job.deliver(Err(RenderError::SchedulerStopped));
        }

        if std::thread::current().id() == self.worker_id {
            return;
        }
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::warn!("render worker panicked");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Process-wide serial render queue.
///
/// One worker thread owns every call into every [`DecoderHandle`]. Submission and cancellation
/// are safe from any number of threads. Pending requests are ordered by
/// `(priority rank, submission sequence)`; depth is bounded by [`SchedulerOpts::max_pending`].
///
/// Clones share the same worker; it stops when [`RenderScheduler::shutdown`] is called or the
/// last clone is dropped.
#[derive(Clone)]
pub struct RenderScheduler {
    inner: Arc<Inner>,
}

impl RenderScheduler {
    /// Validate options and start the worker thread.
    pub fn new(opts: SchedulerOpts) -> StickerResult<Self> {
        opts.validate()?;
        let shared = Arc::new(Shared {
            opts,
            state: Mutex::new(QueueState::default()),
            work_ready: Condvar::new(),
            progress: Condvar::new(),
        });
        let worker_shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name(shared.opts.worker_name.clone())
            .spawn(move || run_worker(worker_shared))
            .map_err(|e| StickerError::Other(anyhow::Error::new(e).context("spawn render worker")))?;
        let worker_id = handle.thread().id();
        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                worker: Mutex::new(Some(handle)),
                worker_id,
            }),
        })
    }

    fn shared(&self) -> &Shared {
        &self.inner.shared
    }

    /// Scheduler options.
    pub fn opts(&self) -> &SchedulerOpts {
        &self.shared().opts
    }

    /// Admit a request and return its ticket. Never blocks on execution.
    ///
    /// When the queue is full, the worst-ranked pending request is evicted with
    /// [`RenderError::Evicted`], unless the new request ranks worse than everything pending, in
    /// which case it completes immediately with [`RenderError::QueueFull`].
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn submit(&self, request: RenderRequest) -> RenderTicket {
        let shared = self.shared();
        let (tx, rx) = mpsc::sync_channel(1);
        let tombstone = Arc::new(AtomicBool::new(false));

        let mut st = shared.lock();
        st.next_seq += 1;
        let id = RequestId(st.next_seq);
        st.stats.submitted += 1;

        let ticket = RenderTicket {
            id,
            handle: request.handle.id(),
            frame: request.frame,
            size: request.size,
            generation: request.generation,
            rx,
            tombstone: tombstone.clone(),
        };
        let key = RankKey {
            rank: request.priority.rank(),
            seq: id.0,
        };
        let job = Job {
            id,
            request,
            tx,
            tombstone,
        };

        if st.shutdown {
            drop(st);
            job.deliver(Err(RenderError::SchedulerStopped));
            return ticket;
        }

        let max = shared.opts.max_pending;
        if st.pending.len() >= max {
            st.purge_tombstoned();
        }
        let mut evicted = None;
        if st.pending.len() >= max {
            let worst = st.pending.last_key_value().map(|(k, _)| *k);
            if worst.is_none_or(|worst| key > worst) {
                st.stats.rejected += 1;
                drop(st);
                tracing::debug!(request = id.0, "render queue full; request rejected");
                job.deliver(Err(RenderError::QueueFull));
                return ticket;
            }
            if let Some((_, victim)) = st.pending.pop_last() {
                st.keys.remove(&victim.id);
                st.stats.evicted += 1;
                evicted = Some(victim);
            }
        }

        st.keys.insert(id, key);
        st.pending.insert(key, job);
        st.stats.max_depth = st.stats.max_depth.max(st.pending.len());
        drop(st);
        shared.work_ready.notify_one();

        if let Some(victim) = evicted {
            tracing::debug!(request = victim.id.0, by = id.0, "render request evicted");
            victim.deliver(Err(RenderError::Evicted));
        }
        ticket
    }

    /// Cancel a request.
    ///
    /// A pending request is removed and never completes. An executing request runs to the end
    /// but its completion is suppressed.
    pub fn cancel(&self, ticket: &RenderTicket) -> CancelOutcome {
        let mut st = self.shared().lock();
        if let Some(job) = st.remove(ticket.id) {
            st.stats.cancelled += 1;
            drop(st);
            self.shared().progress.notify_all();
            job.tombstone.store(true, Ordering::Release);
            let Job { request, .. } = job;
            return CancelOutcome::Removed(request.buffer);
        }
        if let Some(ex) = st.executing.as_mut()
            && ex.id == ticket.id
        {
            ex.suppressed = true;
            return CancelOutcome::Suppressed;
        }
        drop(st);
        match ticket.try_take() {
            TicketStatus::Ready(reply) => CancelOutcome::Completed(Some(reply)),
            TicketStatus::Pending | TicketStatus::Cancelled => CancelOutcome::Completed(None),
        }
    }

    /// Remove every pending request. Returns how many were removed.
    pub fn cancel_all(&self) -> usize {
        let jobs = {
            let mut st = self.shared().lock();
            let jobs = st.take_where(|_| true);
            st.stats.cancelled += jobs.len() as u64;
            jobs
        };
        self.shared().progress.notify_all();
        let n = jobs.len();
        for job in jobs {
            job.tombstone.store(true, Ordering::Release);
        }
        n
    }

    /// Submit and block this thread until the request completes.
    ///
    /// Serialization is never bypassed: the request queues like any other.
    pub fn render_blocking(&self, request: RenderRequest) -> RenderReply {
        let ticket = self.submit(request);
        let fallback = ticket.orphaned(RenderError::SchedulerStopped);
        ticket.wait().unwrap_or(fallback)
    }

    /// Ensure nothing will run against `handle`.
    ///
    /// Pending requests for it complete with [`RenderError::Released`]; then this blocks until
    /// no execution against it is outstanding. Returns the number of pending requests discarded.
    pub fn drain(&self, handle: HandleId) -> usize {
        let shared = self.shared();
        let mut st = shared.lock();
        let jobs = st.take_where(|job| job.request.handle.id() == handle);
        st.stats.discarded += jobs.len() as u64;
        let n = jobs.len();
        shared.progress.notify_all();
        if std::thread::current().id() != self.inner.worker_id {
            while st.is_busy_with(handle) {
                st = shared
                    .progress
                    .wait(st)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        drop(st);
        for job in jobs {
            job.deliver(Err(RenderError::Released));
        }
        n
    }

    /// Retire `handle`, drain it, then release its native context.
    ///
    /// Returns `true` if this call performed the release.
    pub fn release_handle(&self, handle: &DecoderHandle) -> bool {
        handle.retire();
        let discarded = self.drain(handle.id());
        let released = handle.release();
        if released {
            tracing::debug!(handle = handle.id().0, discarded, "decoder handle drained");
        }
        released
    }

    /// Number of pending requests (excluding the executing one).
    pub fn pending_len(&self) -> usize {
        self.shared().lock().pending.len()
    }

    /// Pending plus executing requests that target `handle`.
    pub fn outstanding_for(&self, handle: HandleId) -> usize {
        let st = self.shared().lock();
        let pending = st
            .pending
            .values()
            .filter(|job| job.request.handle.id() == handle)
            .count();
        pending + usize::from(st.is_busy_with(handle))
    }

    /// `true` when nothing is pending or executing.
    pub fn is_idle(&self) -> bool {
        let st = self.shared().lock();
        st.pending.is_empty() && st.executing.is_none()
    }

    /// Block until idle or until `timeout` elapses. Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let shared = self.shared();
        let deadline = Instant::now() + timeout;
        let mut st = shared.lock();
        while !(st.pending.is_empty() && st.executing.is_none()) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            st = shared
                .progress
                .wait_timeout(st, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Counter snapshot.
    pub fn stats(&self) -> SchedulerStats {
        self.shared().lock().stats
    }

    /// Stop the worker. Pending requests complete with [`RenderError::SchedulerStopped`];
    /// an executing request finishes first. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// `true` after [`RenderScheduler::shutdown`].
    pub fn is_shut_down(&self) -> bool {
        self.shared().lock().shutdown
    }
}

impl std::fmt::Debug for RenderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("opts", self.opts())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scheduler.rs"]
mod tests;
