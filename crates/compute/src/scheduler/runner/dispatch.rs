use tracing::{debug, info, warn};

use abacus_core::{Task, TaskResult};

use crate::scheduler::error::SchedulerError;
use crate::scheduler::store::Completion;

use super::Scheduler;

impl Scheduler {
    /// Hand the lowest-id runnable task to a worker.
    ///
    /// Never waits for work: with nothing runnable this returns
    /// [`SchedulerError::NoTaskAvailable`] at once.
    pub async fn claim_next_task(&self) -> Result<Task, SchedulerError> {
        let mut store = self.store.lock().await;

        let expression_id = store
            .peek_runnable()
            .map(|t| t.expression_id)
            .ok_or(SchedulerError::NoTaskAvailable)?;

        // Persist first: if the write fails the task stays claimable.
        self.repository.mark_computing(expression_id).await?;

        let task = store.claim_next().ok_or(SchedulerError::NoTaskAvailable)?;

        if let Ok(mut m) = self.metrics.write() {
            m.record_dispatch(task.id);
        }
        debug!(
            task_id = task.id,
            expression_id,
            operation = %task.operation,
            "Task dispatched"
        );
        Ok(task)
    }

    /// Apply a worker's result report.
    ///
    /// When the report finishes its expression the outcome is persisted and
    /// the expression's tasks are evicted, even if the write fails, so the
    /// store never holds a finished expression.
    pub async fn post_result(&self, report: TaskResult) -> Result<(), SchedulerError> {
        let mut store = self.store.lock().await;

        let completion = store.complete(&report)?;
        if let Ok(mut m) = self.metrics.write() {
            m.record_result(report.id, report.error_message().is_some());
        }

        match completion {
            Completion::Progressed { unblocked } => {
                debug!(task_id = report.id, unblocked = ?unblocked, "Task result accepted");
                Ok(())
            }
            Completion::Finished {
                expression_id,
                outcome,
            } => {
                let persisted = self.repository.finish(expression_id, &outcome).await;
                let evicted = store.evict(expression_id);

                if let Ok(mut m) = self.metrics.write() {
                    m.forget(&evicted);
                    m.record_finish(&outcome);
                }

                match &persisted {
                    Ok(()) => info!(
                        expression_id,
                        status = %outcome.status(),
                        result = outcome.result(),
                        evicted = evicted.len(),
                        "Expression finished"
                    ),
                    Err(e) => warn!(
                        expression_id,
                        error = %e,
                        "Failed to persist expression outcome"
                    ),
                }
                persisted.map_err(SchedulerError::from)
            }
        }
    }
}
