use crate::BoxedJob;
use crate::error::{ErrorKind, Result};
use crate::worker::{Worker, WorkerId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Reconciliation period.
pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Initial target number of workers.
    pub size: usize,
    /// Jobs that may wait in the queue before `submit()` blocks.
    pub queue_capacity: usize,
}
impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 1, queue_capacity: 32 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Running,
    /// Stopped, with workers still finishing.
    Stopping,
    Stopped,
}

struct Shared {
    target: AtomicUsize,
    workers: RwLock<HashMap<WorkerId, CancellationToken>>,
}

/// A bounded job queue and the workers serving it.
///
/// Workers are only ever created and removed by the control loop spawned in
/// [`new`](Self::new), which runs every [`TICK`] and moves the live count at
/// most one step towards the target.
///
/// Call [`stop`](Self::stop) then [`wait`](Self::wait) to shut down: every
/// job accepted before `stop()` runs before `wait()` returns. Cancelling the
/// parent token instead abandons whatever is still queued.
pub struct WorkerPool {
    queue: async_channel::Sender<BoxedJob>,
    shared: Arc<Shared>,
    lifetime: CancellationToken,
    tracker: TaskTracker,
}
impl WorkerPool {
    /// Must be called from within a Tokio runtime. Starts with no workers;
    /// the first reconciliation tick happens immediately.
    pub fn new(config: PoolConfig, parent: &CancellationToken) -> Result<Self> {
        if config.queue_capacity == 0 {
            exn::bail!(ErrorKind::InvalidCapacity);
        }
        let (sender, receiver) = async_channel::bounded(config.queue_capacity);
        let shared = Arc::new(Shared { target: AtomicUsize::new(config.size), workers: RwLock::new(HashMap::new()) });
        let lifetime = parent.child_token();
        let tracker = TaskTracker::new();

        let control = ControlLoop {
            shared: Arc::clone(&shared),
            sender: sender.clone(),
            receiver,
            parent: parent.clone(),
            lifetime: lifetime.clone(),
            tracker: tracker.clone(),
        };
        tracker.spawn(control.run());
        tracing::info!(size = config.size, queue_capacity = config.queue_capacity, "Worker pool created");

        Ok(Self { queue: sender, shared, lifetime, tracker })
    }

    /// Enqueue a job, waiting for space if the queue is full.
    ///
    /// Fails with [`Closed`](ErrorKind::Closed) once the pool is stopping,
    /// including for callers already waiting for space.
    pub async fn submit(&self, job: BoxedJob) -> Result<()> {
        if self.lifetime.is_cancelled() {
            exn::bail!(ErrorKind::Closed);
        }
        let label = job.describe();
        match self.queue.send(job).await {
            Ok(()) => {
                tracing::trace!(job = %label, queued = self.queue.len(), "Job submitted");
                Ok(())
            },
            Err(_) => exn::bail!(ErrorKind::Closed),
        }
    }

    /// Set the target number of workers. Takes effect over the next ticks.
    pub fn scale(&self, size: usize) {
        let previous = self.shared.target.swap(size, Ordering::SeqCst);
        if previous != size {
            tracing::info!(from = previous, to = size, "Worker pool rescaled");
        }
    }

    pub fn target(&self) -> usize {
        self.shared.target.load(Ordering::SeqCst)
    }

    /// Snapshot of the live worker set.
    pub async fn current_workers(&self) -> Vec<WorkerId> {
        self.shared.workers.read().await.keys().copied().collect()
    }

    /// Stop accepting jobs and let the workers drain the queue. Idempotent.
    pub fn stop(&self) {
        if self.lifetime.is_cancelled() && self.queue.is_closed() {
            return;
        }
        // Close first: workers only drain when they see a closed queue.
        self.queue.close();
        self.lifetime.cancel();
        self.tracker.close();
        tracing::info!(backlog = self.queue.len(), "Worker pool stopping");
    }

    /// Wait for the control loop and every worker to exit.
    ///
    /// Only returns after [`stop`](Self::stop) or once the parent token is
    /// cancelled.
    pub async fn wait(&self) {
        self.tracker.wait().await;
        tracing::info!("Worker pool stopped");
    }

    pub fn state(&self) -> PoolState {
        match (self.lifetime.is_cancelled(), self.tracker.is_empty()) {
            (false, _) => PoolState::Running,
            (true, false) => PoolState::Stopping,
            (true, true) => PoolState::Stopped,
        }
    }
}

struct ControlLoop {
    shared: Arc<Shared>,
    sender: async_channel::Sender<BoxedJob>,
    receiver: async_channel::Receiver<BoxedJob>,
    parent: CancellationToken,
    lifetime: CancellationToken,
    tracker: TaskTracker,
}
impl ControlLoop {
    async fn run(self) {
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => break,
                _ = interval.tick() => self.reconcile().await,
            }
        }
        self.shutdown().await;
    }

    /// Move the live worker count one step towards the target.
    async fn reconcile(&self) {
        let target = self.shared.target.load(Ordering::SeqCst);
        let mut workers = self.shared.workers.write().await;
        if workers.len() < target {
            let id = self.spawn_worker(&mut workers);
            tracing::info!(worker = %id, live = workers.len(), target, "Worker admitted");
        } else if workers.len() > target {
            // No ordering between workers; any of them will do.
            if let Some(id) = workers.keys().next().copied()
                && let Some(token) = workers.remove(&id)
            {
                token.cancel();
                tracing::info!(worker = %id, live = workers.len(), target, "Worker retired");
            }
        }
    }

    fn spawn_worker(&self, workers: &mut HashMap<WorkerId, CancellationToken>) -> WorkerId {
        let id = WorkerId::new();
        let token = self.lifetime.child_token();
        workers.insert(id, token.clone());
        let worker = Worker { id, queue: self.receiver.clone(), token, parent: self.parent.clone() };
        self.tracker.spawn(worker.run());
        id
    }

    async fn shutdown(self) {
        let mut workers = self.shared.workers.write().await;
        let graceful = !self.parent.is_cancelled();
        if graceful && workers.is_empty() && !self.receiver.is_empty() {
            // Someone has to run what was accepted before stop().
            let count = self.shared.target.load(Ordering::SeqCst).max(1);
            for _ in 0..count {
                self.spawn_worker(&mut workers);
            }
            tracing::debug!(workers = count, backlog = self.receiver.len(), "Spawned workers to drain queue");
        }
        self.sender.close();
        for (_, token) in workers.drain() {
            token.cancel();
        }
        self.tracker.close();
        if graceful {
            tracing::debug!("Control loop stopped");
        } else {
            tracing::warn!(dropped = self.receiver.len(), "Worker pool aborted by parent");
        }
    }
}
