use crate::BoxedJob;
use crate::error::ErrorKind;
use derive_more::Display;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(Uuid);
impl WorkerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

pub(crate) struct Worker {
    pub(crate) id: WorkerId,
    pub(crate) queue: async_channel::Receiver<BoxedJob>,
    /// Cancelled on scale-down, and (as a child token) whenever the pool
    /// stops or its parent lifetime ends.
    pub(crate) token: CancellationToken,
    pub(crate) parent: CancellationToken,
}
impl Worker {
    pub(crate) async fn run(self) {
        let span = tracing::debug_span!("worker", worker = %self.id);
        self.serve().instrument(span).await
    }

    async fn serve(self) {
        tracing::debug!("Worker started");
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                job = self.queue.recv() => match job {
                    Ok(job) => execute(job).await,
                    // Closed and empty.
                    Err(_) => {
                        tracing::debug!("Queue closed, worker exiting");
                        return;
                    },
                },
            }
        }

        // A closed queue means the pool was stopped gracefully: finish the
        // backlog. A cancelled parent means nobody wants the results.
        if self.queue.is_closed() && !self.parent.is_cancelled() {
            let mut drained = 0usize;
            while let Ok(job) = self.queue.recv().await {
                execute(job).await;
                drained += 1;
            }
            tracing::debug!(drained, "Worker drained queue and exited");
        } else {
            tracing::debug!("Worker cancelled");
        }
    }
}

/// Run one job, containing both error returns and panics.
async fn execute(job: BoxedJob) {
    let label = job.describe();
    match AssertUnwindSafe(job.run()).catch_unwind().await {
        Ok(Ok(())) => tracing::debug!(job = %label, "Job finished"),
        Ok(Err(err)) => tracing::warn!(job = %label, error = ?err, "Job failed"),
        Err(payload) => {
            let err = ErrorKind::Panicked(panic_message(payload.as_ref()));
            tracing::error!(job = %label, error = %err, "Job panicked");
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
