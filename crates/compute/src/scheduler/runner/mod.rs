//! Scheduler runner -- owns the task store and drives every state change.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor, submission and accessors
//! - `dispatch`: claiming runnable tasks and applying worker results
//! - `recovery`: replaying unfinished expressions after a restart

mod core;
mod dispatch;
mod recovery;

pub use self::core::{Scheduler, SchedulerSnapshot};
pub use self::recovery::RecoveryReport;
