//! A bounded job queue drained by a self-scaling set of workers.
//!
//! Producers [`submit`](WorkerPool::submit) boxed [`Job`]s; a single control
//! loop moves the number of live workers one step per second towards the
//! configured target. Each job runs exactly once, on one worker, and a job
//! that errors or panics only takes itself down.

pub mod error;
mod pool;
mod worker;

pub use crate::pool::{PoolConfig, PoolState, TICK, WorkerPool};
pub use crate::worker::WorkerId;
use crate::error::Result;
use async_trait::async_trait;

pub type BoxedJob = Box<dyn Job>;

/// A unit of background work.
#[async_trait]
pub trait Job: Send + 'static {
    /// Short human-readable label used in log lines.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    async fn run(self: Box<Self>) -> Result<()>;
}
