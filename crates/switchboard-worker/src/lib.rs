//! Optional priority job queue (§4.8, "Job Worker").
//!
//! Not carried from any single teacher module — no crate in the
//! pack runs a priority work queue — but built from the teacher's own
//! async shutdown idiom: `tokio::sync::Notify` plus a
//! `tokio_util::sync::CancellationToken` are exactly what its server
//! crate already uses to coordinate graceful shutdown, generalized
//! here into a bounded three-lane `VecDeque` queue drained by a pool
//! of worker tasks. Each job tracks its own status and an independent
//! cancellation token so a caller holding a [`JobHandle`] can cancel a
//! job whether it's still queued or already running.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue is at capacity ({0})")]
    QueueFull(usize),
}

/// Lifecycle of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Failed => 3,
            Self::Cancelled => 4,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Failed,
            4 => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

/// Shared state behind a [`JobHandle`], also held by the queue entry
/// itself so both sides observe the same status and cancellation
/// signal regardless of which one mutates it first.
struct JobState {
    status: AtomicU8,
    created_at: Instant,
    ttl: Option<Duration>,
    cancel: CancellationToken,
}

impl JobState {
    fn new(ttl: Option<Duration>) -> Self {
        Self {
            status: AtomicU8::new(JobStatus::Pending.as_u8()),
            created_at: Instant::now(),
            ttl,
            cancel: CancellationToken::new(),
        }
    }

    fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: JobStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }

    fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| self.created_at.elapsed() >= ttl)
    }
}

/// A caller's handle to a submitted job: its id plus a view onto its
/// status and cancellation, independent of whether the job is still
/// queued or already being worked.
#[derive(Clone)]
pub struct JobHandle {
    id: Uuid,
    state: Arc<JobState>,
}

impl JobHandle {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Cancel this job. If it is still `Pending`, [`JobQueue::dequeue`]
    /// will skip it without invoking the handler and mark it
    /// `Cancelled`. If it is `Running`, this only flips the cooperative
    /// cancellation token — the handler must observe
    /// [`JobHandle::cancellation`] itself to stop early; the status
    /// becomes `Cancelled` only once it does and reports back.
    pub fn cancel(&self) {
        self.state.cancel.cancel();
        let current = self.state.status();
        if current == JobStatus::Pending {
            self.state.set_status(JobStatus::Cancelled);
        }
    }

    /// The cancellation signal a running handler should select on.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.state.cancel.clone()
    }
}

struct Job<T> {
    priority: Priority,
    payload: T,
    state: Arc<JobState>,
}

struct Lanes<T> {
    high: VecDeque<Job<T>>,
    normal: VecDeque<Job<T>>,
    low: VecDeque<Job<T>>,
}

impl<T> Lanes<T> {
    fn new() -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
        }
    }

    fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    fn push(&mut self, job: Job<T>) {
        match job.priority {
            Priority::High => self.high.push_back(job),
            Priority::Normal => self.normal.push_back(job),
            Priority::Low => self.low.push_back(job),
        }
    }

    fn pop(&mut self) -> Option<Job<T>> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }
}

/// A bounded, priority-ordered, FIFO-within-lane job queue.
pub struct JobQueue<T> {
    lanes: Mutex<Lanes<T>>,
    notify: Notify,
    capacity: usize,
    len: AtomicUsize,
}

impl<T: Send + 'static> JobQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            lanes: Mutex::new(Lanes::new()),
            notify: Notify::new(),
            capacity,
            len: AtomicUsize::new(0),
        })
    }

    /// Submit `payload` with `priority`, optionally expiring after
    /// `ttl` if it hasn't started running yet. Returns a handle the
    /// caller can poll for status or use to cancel the job.
    pub async fn submit(&self, priority: Priority, payload: T, ttl: Option<Duration>) -> Result<JobHandle, WorkerError> {
        let mut lanes = self.lanes.lock().await;
        if lanes.len() >= self.capacity {
            return Err(WorkerError::QueueFull(self.capacity));
        }
        let state = Arc::new(JobState::new(ttl));
        let handle = JobHandle {
            id: Uuid::new_v4(),
            state: Arc::clone(&state),
        };
        lanes.push(Job {
            priority,
            payload,
            state,
        });
        self.len.store(lanes.len(), Ordering::Relaxed);
        self.notify.notify_one();
        Ok(handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pop the next runnable job, skipping (and marking `Cancelled`)
    /// any that were cancelled or expired while still queued.
    async fn dequeue(&self) -> Option<(T, Arc<JobState>)> {
        loop {
            let popped = {
                let mut lanes = self.lanes.lock().await;
                let job = lanes.pop();
                self.len.store(lanes.len(), Ordering::Relaxed);
                job
            };

            match popped {
                Some(job) => {
                    let status = job.state.status();
                    if status == JobStatus::Cancelled || job.state.cancel.is_cancelled() {
                        job.state.set_status(JobStatus::Cancelled);
                        continue;
                    }
                    if job.state.is_expired() {
                        job.state.set_status(JobStatus::Cancelled);
                        continue;
                    }
                    job.state.set_status(JobStatus::Running);
                    return Some((job.payload, job.state));
                }
                None => self.notify.notified().await,
            }
        }
    }

    /// Spawn `worker_count` tasks, each looping on `dequeue` and
    /// invoking `handler` until `shutdown` fires. `handler` returns
    /// whether the job succeeded; the job's status is set to
    /// `Completed`/`Failed` accordingly once it returns, or left
    /// `Cancelled` if `handler` observed the job's cancellation token
    /// and bailed early.
    pub fn spawn_workers<F, Fut>(self: &Arc<Self>, worker_count: usize, shutdown: CancellationToken, handler: F)
    where
        F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let handler = Arc::new(handler);
        for _ in 0..worker_count {
            let queue = Arc::clone(self);
            let shutdown = shutdown.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        job = queue.dequeue() => {
                            match job {
                                Some((payload, state)) => {
                                    let cancellation = state.cancel.clone();
                                    let succeeded = handler(payload, cancellation).await;
                                    if state.status() != JobStatus::Cancelled {
                                        state.set_status(if succeeded { JobStatus::Completed } else { JobStatus::Failed });
                                    }
                                }
                                None => break,
                            }
                        }
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn high_priority_drains_before_low() {
        let queue = JobQueue::new(10);
        queue.submit(Priority::Low, 1, None).await.unwrap();
        queue.submit(Priority::High, 2, None).await.unwrap();
        queue.submit(Priority::Normal, 3, None).await.unwrap();

        assert_eq!(queue.dequeue().await.map(|(v, _)| v), Some(2));
        assert_eq!(queue.dequeue().await.map(|(v, _)| v), Some(3));
        assert_eq!(queue.dequeue().await.map(|(v, _)| v), Some(1));
    }

    #[tokio::test]
    async fn submit_rejects_when_full() {
        let queue = JobQueue::new(1);
        queue.submit(Priority::Normal, 1, None).await.unwrap();
        let result = queue.submit(Priority::Normal, 2, None).await;
        assert!(matches!(result, Err(WorkerError::QueueFull(1))));
    }

    #[tokio::test]
    async fn workers_drain_submitted_jobs() {
        let queue: Arc<JobQueue<u32>> = JobQueue::new(10);
        let shutdown = CancellationToken::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        queue.spawn_workers(2, shutdown.clone(), move |job, _cancel| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(job);
                true
            }
        });

        for i in 0..5 {
            queue.submit(Priority::Normal, i, None).await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn cancelling_a_pending_job_removes_it_before_it_runs() {
        let queue: Arc<JobQueue<u32>> = JobQueue::new(10);
        let handle = queue.submit(Priority::Normal, 1, None).await.unwrap();
        handle.cancel();
        assert_eq!(handle.status(), JobStatus::Cancelled);

        queue.submit(Priority::Normal, 2, None).await.unwrap();
        let (payload, state) = queue.dequeue().await.unwrap();
        assert_eq!(payload, 2);
        assert_eq!(state.status(), JobStatus::Running);
    }

    #[tokio::test]
    async fn expired_job_is_skipped_on_dequeue() {
        let queue: Arc<JobQueue<u32>> = JobQueue::new(10);
        queue
            .submit(Priority::Normal, 1, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.submit(Priority::Normal, 2, None).await.unwrap();

        let (payload, _) = queue.dequeue().await.unwrap();
        assert_eq!(payload, 2);
    }

    #[tokio::test]
    async fn running_job_status_reflects_handler_outcome() {
        let queue: Arc<JobQueue<u32>> = JobQueue::new(10);
        let shutdown = CancellationToken::new();
        let handle = queue.submit(Priority::Normal, 1, None).await.unwrap();

        let handle_for_check = handle.clone();
        queue.spawn_workers(1, shutdown.clone(), |job, _cancel| async move { job % 2 == 0 });

        for _ in 0..50 {
            if handle_for_check.status() == JobStatus::Failed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handle_for_check.status(), JobStatus::Failed);
        shutdown.cancel();
    }
}
