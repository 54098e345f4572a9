use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use abacus_core::{Outcome, TaskId};

/// Dispatch counters exposed on the health endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    pub expressions_submitted: u64,
    pub expressions_recovered: u64,
    pub expressions_done: u64,
    pub expressions_failed: u64,
    pub tasks_dispatched: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Mean time between a claim and its result report.
    pub avg_turnaround: Duration,
    pub last_dispatch: Option<DateTime<Utc>>,
    pub last_result: Option<DateTime<Utc>>,
    /// Claim instants of tasks currently out with a worker.
    ///
    /// Tasks have no timeout, so an entry whose worker never reports stays
    /// here until its expression is evicted or the process restarts.
    #[serde(skip)]
    in_flight: HashMap<TaskId, Instant>,
}

impl SchedulerMetrics {
    pub fn record_submission(&mut self) {
        self.expressions_submitted += 1;
    }

    pub fn record_recovery(&mut self, expressions: u64) {
        self.expressions_recovered += expressions;
    }

    pub fn record_dispatch(&mut self, task_id: TaskId) {
        self.tasks_dispatched += 1;
        self.last_dispatch = Some(Utc::now());
        self.in_flight.insert(task_id, Instant::now());
    }

    /// Record an accepted result report.
    pub fn record_result(&mut self, task_id: TaskId, failed: bool) {
        if failed {
            self.tasks_failed += 1;
        } else {
            self.tasks_completed += 1;
        }
        self.last_result = Some(Utc::now());

        if let Some(claimed_at) = self.in_flight.remove(&task_id) {
            self.record_turnaround(claimed_at.elapsed());
        }
    }

    fn record_turnaround(&mut self, duration: Duration) {
        let count = self.tasks_completed + self.tasks_failed;
        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_turnaround = if count <= 1 {
            duration
        } else {
            let prev_nanos = self.avg_turnaround.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }

    pub fn record_finish(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Done(_) => self.expressions_done += 1,
            Outcome::Failed { .. } => self.expressions_failed += 1,
        }
    }

    /// Stop tracking tasks that were evicted while still out with a worker.
    pub fn forget(&mut self, task_ids: &[TaskId]) {
        for id in task_ids {
            self.in_flight.remove(id);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
