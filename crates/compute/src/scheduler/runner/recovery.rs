use serde::Serialize;
use tracing::{info, warn};

use abacus_core::Outcome;

use crate::graph::TaskPlan;
use crate::postfix::to_postfix;
use crate::scheduler::error::SchedulerError;

use super::Scheduler;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Expressions whose tasks were rebuilt.
    pub replayed: usize,
    /// Expressions that no longer compile and were marked failed.
    pub rejected: usize,
    /// Expressions skipped because their tasks are already live.
    pub skipped: usize,
}

impl Scheduler {
    /// Rebuild tasks for every expression the repository still lists as
    /// pending or computing.
    ///
    /// Expressions are replayed from scratch in id order. Anything a worker
    /// computed before the restart is discarded.
    pub async fn recover(&self) -> Result<RecoveryReport, SchedulerError> {
        let mut store = self.store.lock().await;
        let unfinished = self.repository.list_unfinished().await?;
        let mut report = RecoveryReport::default();

        for expr in unfinished {
            if store.contains_expression(expr.id) {
                report.skipped += 1;
                continue;
            }

            let plan = to_postfix(&expr.expression)
                .map_err(SchedulerError::from)
                .and_then(|tokens| TaskPlan::from_postfix(&tokens).map_err(SchedulerError::from));

            match plan {
                Ok(plan) => {
                    self.enqueue(&mut store, expr.id, &plan).await?;
                    report.replayed += 1;
                }
                Err(e) => {
                    warn!(
                        expression_id = expr.id,
                        error = %e,
                        "Stored expression no longer compiles"
                    );
                    let outcome = Outcome::Failed {
                        result: 0.0,
                        error: e.to_string(),
                    };
                    self.repository.finish(expr.id, &outcome).await?;
                    report.rejected += 1;
                }
            }
        }

        if let Ok(mut m) = self.metrics.write() {
            m.record_recovery(report.replayed as u64);
        }
        info!(
            replayed = report.replayed,
            rejected = report.rejected,
            skipped = report.skipped,
            next_task_id = store.next_task_id(),
            "Recovery complete"
        );
        Ok(report)
    }
}
