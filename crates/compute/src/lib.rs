pub mod graph;
pub mod postfix;
pub mod repository;
pub mod scheduler;
pub mod worker;

pub use graph::{GraphError, TaskPlan};
pub use postfix::{to_postfix, ParseError};
pub use repository::{ExpressionRepository, MemoryExpressionRepository};
pub use scheduler::{
    RecoveryReport, Scheduler, SchedulerError, SchedulerMetrics, SchedulerSnapshot, StoreStats,
};
