//! Expression scheduler: task store, dispatch and restart recovery.
//!
//! Each submitted expression is compiled into a tree of binary tasks. Workers
//! pull runnable tasks one at a time and post results back; a result is
//! substituted into the task waiting on it, and the expression is finished and
//! evicted once its root task completes or any task fails.

pub mod error;
pub mod metrics;
pub mod runner;
pub mod store;

pub use error::SchedulerError;
pub use metrics::SchedulerMetrics;
pub use runner::{RecoveryReport, Scheduler, SchedulerSnapshot};
pub use store::{Completion, StoreStats, TaskStore};
