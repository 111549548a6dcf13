//! Chunk and job scheduling.
//!
//! Two levels of concurrency: within a job, [`download_chunks`] keeps at most
//! `max_in_flight` ranged GETs running behind a semaphore; across jobs,
//! [`DownloadPool`] runs a fixed number of workers fed by a bounded queue.

mod chunks;
mod pool;

pub use chunks::download_chunks;
pub use pool::{default_worker_count, DownloadPool, JobReport, PoolReport};
