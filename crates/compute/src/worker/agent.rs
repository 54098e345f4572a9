//! Worker agent: pulls tasks, simulates their cost, reports results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info, warn};

use abacus_core::config::AgentConfig;
use abacus_core::{Task, TaskId, TaskResult};

use super::evaluate::evaluate;
use crate::scheduler::{Scheduler, SchedulerError};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("orchestrator returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The task payload could not be decoded. `id` is set when the task can
    /// still be reported back as failed.
    #[error("malformed task: {reason}")]
    Malformed { id: Option<TaskId>, reason: String },

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Where an agent gets its work from.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Claim one runnable task. `Ok(None)` means nothing is runnable right now.
    async fn fetch_task(&self) -> Result<Option<Task>, AgentError>;

    async fn submit_result(&self, report: &TaskResult) -> Result<(), AgentError>;
}

// ── HTTP source ───────────────────────────────────────────────

/// Talks to an orchestrator over `GET`/`POST /internal/task`.
#[derive(Debug, Clone)]
pub struct HttpTaskSource {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTaskSource {
    pub fn new(orchestrator_url: &str) -> Self {
        Self {
            endpoint: format!("{}/internal/task", orchestrator_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn status_error(response: reqwest::Response) -> AgentError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        AgentError::Status { status, body }
    }
}

/// Decode a task payload, keeping the id when only the rest is malformed.
fn decode_task(value: serde_json::Value) -> Result<Task, AgentError> {
    let id = value.get("id").and_then(|v| v.as_i64());
    serde_json::from_value(value).map_err(|e| AgentError::Malformed {
        id,
        reason: e.to_string(),
    })
}

#[async_trait]
impl TaskSource for HttpTaskSource {
    async fn fetch_task(&self) -> Result<Option<Task>, AgentError> {
        let response = self.client.get(&self.endpoint).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value: serde_json::Value = response.json().await?;
                decode_task(value).map(Some)
            }
            _ => Err(Self::status_error(response).await),
        }
    }

    async fn submit_result(&self, report: &TaskResult) -> Result<(), AgentError> {
        let response = self.client.post(&self.endpoint).json(report).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error(response).await)
        }
    }
}

// ── In-process source ─────────────────────────────────────────

#[async_trait]
impl TaskSource for Scheduler {
    async fn fetch_task(&self) -> Result<Option<Task>, AgentError> {
        match self.claim_next_task().await {
            Ok(task) => Ok(Some(task)),
            Err(SchedulerError::NoTaskAvailable) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn submit_result(&self, report: &TaskResult) -> Result<(), AgentError> {
        self.post_result(report.clone()).await.map_err(AgentError::from)
    }
}

// ── Agent ─────────────────────────────────────────────────────

/// Sleep for the task's simulated cost, then compute it.
pub async fn execute(task: &Task) -> TaskResult {
    tokio::time::sleep(Duration::from_millis(task.operation_time_ms)).await;
    match evaluate(task) {
        Ok(value) => TaskResult::success(task.id, value),
        Err(e) => TaskResult::failure(task.id, e.to_string()),
    }
}

/// A pool of `computing_power` loops sharing one task source.
pub struct Agent<S> {
    source: Arc<S>,
    config: AgentConfig,
    shutdown: Arc<AtomicBool>,
}

impl<S: TaskSource + 'static> Agent<S> {
    pub fn new(source: Arc<S>, config: AgentConfig) -> Self {
        Self {
            source,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ask every loop to stop after its current task.
    pub fn shutdown(&self) {
        info!("Agent shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Fetch, execute and report a single task.
    ///
    /// Returns `Ok(false)` when there was nothing to do.
    pub async fn run_once(&self) -> Result<bool, AgentError> {
        let task = match self.source.fetch_task().await {
            Ok(Some(task)) => task,
            Ok(None) => return Ok(false),
            Err(AgentError::Malformed { id: Some(id), reason }) => {
                warn!(task_id = id, reason = %reason, "Rejecting malformed task");
                self.source
                    .submit_result(&TaskResult::failure(id, reason))
                    .await?;
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        debug!(
            task_id = task.id,
            expression_id = task.expression_id,
            "Received {} {} {}",
            task.arg1,
            task.operation,
            task.arg2
        );

        let report = execute(&task).await;
        if let Some(error) = report.error_message() {
            warn!(task_id = task.id, error = %error, "Task failed");
        }
        self.source.submit_result(&report).await?;
        debug!(task_id = task.id, "Result sent");
        Ok(true)
    }

    async fn work_loop(self: Arc<Self>, worker_id: usize) {
        let idle = Duration::from_millis(self.config.poll_interval_ms);
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.run_once().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => warn!(worker_id, error = %e, "Worker iteration failed"),
            }
            tokio::time::sleep(idle).await;
        }
        debug!(worker_id, "Worker loop stopped");
    }

    /// Run `computing_power` loops until [`shutdown`](Self::shutdown) is called.
    pub async fn run(self: Arc<Self>) {
        let workers = self.config.computing_power.max(1);
        info!(workers, poll_interval_ms = self.config.poll_interval_ms, "Agent starting");

        let handles: Vec<_> = (1..=workers)
            .map(|worker_id| tokio::spawn(Arc::clone(&self).work_loop(worker_id)))
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker loop panicked");
            }
        }
        info!("Agent stopped");
    }
}

#[cfg(test)]
mod tests {
    use abacus_core::config::OperationTimings;

    use super::*;
    use crate::repository::{ExpressionRepository, MemoryExpressionRepository};
    use abacus_core::Status;

    fn agent_config(computing_power: usize) -> AgentConfig {
        AgentConfig {
            orchestrator_url: "http://localhost:0".into(),
            computing_power,
            poll_interval_ms: 5,
        }
    }

    #[test]
    fn endpoint_joins_cleanly() {
        let source = HttpTaskSource::new("http://localhost:8080/");
        assert_eq!(source.endpoint(), "http://localhost:8080/internal/task");
    }

    #[test]
    fn unknown_operator_keeps_id() {
        let value = serde_json::json!({
            "id": 9, "expression_id": 1, "arg1": "1", "arg2": "2",
            "operation": "^", "operation_time_ms": 0, "status": "computing"
        });
        match decode_task(value) {
            Err(AgentError::Malformed { id, .. }) => assert_eq!(id, Some(9)),
            other => panic!("expected malformed task, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn execute_reports_division_by_zero() {
        let task = Task {
            id: 3,
            expression_id: 1,
            arg1: abacus_core::Operand::Literal("1".into()),
            arg2: abacus_core::Operand::Literal("0".into()),
            operation: abacus_core::Operator::Divide,
            operation_time_ms: 0,
            status: Status::Computing,
            result: None,
            error: None,
        };
        let report = execute(&task).await;
        assert_eq!(report.error_message(), Some("division by zero"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn agent_drains_in_process_scheduler() {
        let repo = Arc::new(MemoryExpressionRepository::new());
        let scheduler = Arc::new(Scheduler::new(repo.clone(), OperationTimings::uniform(0)));
        let id = scheduler.submit("(1+2)*(3+4)-10/4", 1).await.unwrap();

        let agent = Agent::new(Arc::clone(&scheduler), agent_config(1));
        while agent.run_once().await.unwrap() {}

        let expr = repo.get(id).await.unwrap().unwrap();
        assert_eq!(expr.status, Status::Done);
        assert_eq!(expr.result, 18.5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn run_stops_on_shutdown() {
        let repo = Arc::new(MemoryExpressionRepository::new());
        let scheduler = Arc::new(Scheduler::new(repo.clone(), OperationTimings::uniform(1)));
        let id = scheduler.submit("1+2+3+4", 1).await.unwrap();

        let agent = Arc::new(Agent::new(Arc::clone(&scheduler), agent_config(3)));
        let runner = tokio::spawn(Arc::clone(&agent).run());

        for _ in 0..200 {
            if repo.get(id).await.unwrap().unwrap().is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        agent.shutdown();
        runner.await.unwrap();

        assert_eq!(repo.get(id).await.unwrap().unwrap().result, 10.0);
    }
}
