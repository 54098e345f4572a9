use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use abacus_core::config::OperationTimings;
use abacus_core::{ExpressionId, NewExpression, Outcome, UserId};

use crate::graph::TaskPlan;
use crate::postfix::to_postfix;
use crate::repository::ExpressionRepository;
use crate::scheduler::error::SchedulerError;
use crate::scheduler::metrics::SchedulerMetrics;
use crate::scheduler::store::{StoreStats, TaskStore};

/// The dispatch engine. Splits expressions into tasks, hands runnable tasks
/// to workers and folds their results back into the expression repository.
///
/// All scheduling state sits behind one async mutex that is held across
/// repository calls, so submission, claim, result and recovery are
/// serialized with respect to each other.
pub struct Scheduler {
    pub(super) repository: Arc<dyn ExpressionRepository>,
    /// Per-operator cost stamped on new tasks.
    pub(super) timings: OperationTimings,
    pub(super) store: Mutex<TaskStore>,
    pub(super) metrics: Arc<RwLock<SchedulerMetrics>>,
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    #[serde(flatten)]
    pub store: StoreStats,
    pub metrics: SchedulerMetrics,
}

impl Scheduler {
    pub fn new(repository: Arc<dyn ExpressionRepository>, timings: OperationTimings) -> Self {
        Self {
            repository,
            timings,
            store: Mutex::new(TaskStore::new()),
            metrics: Arc::new(RwLock::new(SchedulerMetrics::default())),
        }
    }

    pub fn repository(&self) -> Arc<dyn ExpressionRepository> {
        Arc::clone(&self.repository)
    }

    pub fn timings(&self) -> &OperationTimings {
        &self.timings
    }

    /// Compile, persist and enqueue a new expression.
    ///
    /// The text is fully validated before anything is written, so a rejected
    /// expression leaves no trace in the repository.
    pub async fn submit(
        &self,
        expression: &str,
        user_id: UserId,
    ) -> Result<ExpressionId, SchedulerError> {
        let tokens = to_postfix(expression)?;
        let plan = TaskPlan::from_postfix(&tokens)?;

        let mut store = self.store.lock().await;
        let id = self
            .repository
            .insert(NewExpression {
                expression: expression.to_string(),
                user_id,
            })
            .await?;

        self.enqueue(&mut store, id, &plan).await?;

        if let Ok(mut m) = self.metrics.write() {
            m.record_submission();
        }
        info!(expression_id = id, user_id, tasks = plan.len(), "Expression accepted");
        Ok(id)
    }

    /// Put a validated plan into the store, or finish it straight away when
    /// there is nothing to compute.
    pub(super) async fn enqueue(
        &self,
        store: &mut TaskStore,
        expression_id: ExpressionId,
        plan: &TaskPlan,
    ) -> Result<(), SchedulerError> {
        if let Some(value) = plan.constant() {
            let outcome = Outcome::Done(value);
            self.repository.finish(expression_id, &outcome).await?;
            if let Ok(mut m) = self.metrics.write() {
                m.record_finish(&outcome);
            }
            debug!(expression_id, value, "Constant expression finished without tasks");
            return Ok(());
        }

        let ids = store.admit(expression_id, plan, &self.timings);
        debug!(
            expression_id,
            first_task = ids.first().copied(),
            count = ids.len(),
            "Tasks created"
        );
        Ok(())
    }

    /// Current store statistics and counters.
    pub async fn snapshot(&self) -> SchedulerSnapshot {
        let store = self.store.lock().await.stats();
        let metrics = self.metrics();
        SchedulerSnapshot { store, metrics }
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.metrics
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}
