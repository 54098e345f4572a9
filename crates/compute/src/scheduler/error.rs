use thiserror::Error;

use abacus_core::{AbacusError, Status, TaskId};

use crate::graph::GraphError;
use crate::postfix::ParseError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to parse expression: {0}")]
    Parse(#[from] ParseError),

    #[error("failed to create tasks: {0}")]
    Graph(#[from] GraphError),

    #[error("no tasks available")]
    NoTaskAvailable,

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// A result arrived for a task that is not currently handed out.
    #[error("task {id} is {status}, not computing")]
    TaskNotClaimed { id: TaskId, status: Status },

    #[error(transparent)]
    Repository(#[from] AbacusError),
}
