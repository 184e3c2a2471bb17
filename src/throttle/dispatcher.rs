use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::throttle::config::ThrottlerConfig;

/// Request priority. Lower number dispatches first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High = 0,
    Medium = 1,
    #[default]
    Low = 2,
}

/// Errors from submitting work to the throttler.
#[derive(Debug, Clone, Error)]
pub enum ThrottleError {
    /// The dispatcher task is gone; the job was never run.
    #[error("throttler dispatcher terminated")]
    Closed,
}

/// Point-in-time snapshot of the throttler, shaped for a health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ThrottlerStatus {
    pub queue_size: usize,
    /// Admissions recorded inside the current rolling window.
    pub recent_requests: usize,
    pub window_size: Duration,
    pub max_requests: usize,
    /// Admissions per second over the window.
    pub current_rate: f64,
}

struct QueuedJob<T> {
    priority: Priority,
    seq: u64,
    job: BoxFuture<'static, T>,
    reply: oneshot::Sender<T>,
}

impl<T> PartialEq for QueuedJob<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for QueuedJob<T> {}

impl<T> PartialOrd for QueuedJob<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueuedJob<T> {
    // BinaryHeap is a max-heap; reverse so pop() yields the lowest
    // (priority, seq) pair, i.e. highest priority, FIFO among ties.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct PendingQueue<T> {
    heap: BinaryHeap<QueuedJob<T>>,
    next_seq: u64,
}

struct Shared<T> {
    queue: Mutex<PendingQueue<T>>,
    /// Admission timestamps inside the rolling window; dispatcher is the
    /// sole writer of new entries, pruning happens on every admission check.
    ledger: Mutex<VecDeque<Instant>>,
    notify: Notify,
    config: ThrottlerConfig,
}

/// Priority queue + sliding-window rate limiter with a single dispatcher.
///
/// Generic over the job output so the same machinery serves plain values and
/// `Result`s; the caller gets the output back verbatim and re-raises any
/// error itself.
pub struct Throttler<T> {
    shared: Arc<Shared<T>>,
    dispatcher: JoinHandle<()>,
}

impl<T: Send + 'static> Throttler<T> {
    /// Creates a throttler and spawns its dispatcher task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ThrottlerConfig) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(PendingQueue {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            ledger: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            config,
        });
        let dispatcher = tokio::spawn(run_dispatcher(Arc::clone(&shared)));
        Self { shared, dispatcher }
    }

    /// Enqueues `job` at `priority` and blocks until the dispatcher has run
    /// it, returning the job's output.
    ///
    /// May wait arbitrarily long while the rate budget is exhausted or
    /// higher-priority work keeps arriving.
    pub async fn submit<F>(&self, priority: Priority, job: F) -> Result<T, ThrottleError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        {
            let mut queue = self.shared.queue.lock().unwrap();
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.heap.push(QueuedJob {
                priority,
                seq,
                job: Box::pin(job),
                reply,
            });
        }
        self.shared.notify.notify_one();
        rx.await.map_err(|_| ThrottleError::Closed)
    }

    /// [`submit`](Self::submit) at [`Priority::High`].
    pub async fn submit_high<F>(&self, job: F) -> Result<T, ThrottleError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.submit(Priority::High, job).await
    }

    /// [`submit`](Self::submit) at [`Priority::Medium`].
    pub async fn submit_medium<F>(&self, job: F) -> Result<T, ThrottleError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.submit(Priority::Medium, job).await
    }

    /// [`submit`](Self::submit) at [`Priority::Low`].
    pub async fn submit_low<F>(&self, job: F) -> Result<T, ThrottleError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.submit(Priority::Low, job).await
    }

    /// Returns a snapshot of queue depth and window occupancy.
    pub fn status(&self) -> ThrottlerStatus {
        let queue_size = self.shared.queue.lock().unwrap().heap.len();
        let recent_requests = {
            let mut ledger = self.shared.ledger.lock().unwrap();
            prune(&mut ledger, Instant::now(), self.shared.config.window);
            ledger.len()
        };
        let window_secs = self.shared.config.window.as_secs_f64();
        ThrottlerStatus {
            queue_size,
            recent_requests,
            window_size: self.shared.config.window,
            max_requests: self.shared.config.max_requests,
            current_rate: if window_secs > 0.0 {
                recent_requests as f64 / window_secs
            } else {
                0.0
            },
        }
    }
}

impl<T> Drop for Throttler<T> {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

fn prune(ledger: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = ledger.front() {
        if now.duration_since(*oldest) >= window {
            ledger.pop_front();
        } else {
            break;
        }
    }
}

async fn run_dispatcher<T: Send>(shared: Arc<Shared<T>>) {
    loop {
        // Wait for at least one queued job.
        loop {
            let has_pending = { !shared.queue.lock().unwrap().heap.is_empty() };
            if has_pending {
                break;
            }
            shared.notify.notified().await;
        }

        // Wait for a slot in the rolling window. The priority decision is
        // made *after* the wait, so high-priority work arriving while the
        // window is saturated still preempts queued low-priority work.
        loop {
            let wait = {
                let mut ledger = shared.ledger.lock().unwrap();
                let now = Instant::now();
                prune(&mut ledger, now, shared.config.window);
                if ledger.len() < shared.config.max_requests {
                    break;
                }
                shared
                    .config
                    .window
                    .saturating_sub(now.duration_since(ledger[0]))
            };
            tracing::debug!(
                throttler = %shared.config.name,
                wait_ms = wait.as_millis() as u64,
                "window saturated, waiting for oldest admission to expire"
            );
            sleep(wait.max(Duration::from_millis(1))).await;
        }

        let entry = shared.queue.lock().unwrap().heap.pop();
        let Some(entry) = entry else { continue };

        shared.ledger.lock().unwrap().push_back(Instant::now());
        tracing::trace!(
            throttler = %shared.config.name,
            priority = ?entry.priority,
            seq = entry.seq,
            "job admitted"
        );

        // The job runs under dispatch control and is never preempted
        // mid-flight. A dropped receiver means the caller abandoned its
        // wait; the output is discarded.
        let output = entry.job.await;
        let _ = entry.reply.send(output);
    }
}
