//! In-memory registry of live tasks.
//!
//! `TaskStore` is plain synchronous state. The [`Scheduler`](super::Scheduler)
//! owns it behind a single async mutex, so every method here runs with
//! exclusive access.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use abacus_core::config::OperationTimings;
use abacus_core::{ExpressionId, Operand, Outcome, Status, Task, TaskId, TaskResult};

use super::error::SchedulerError;
use crate::graph::TaskPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    First,
    Second,
}

/// The operand a finished task feeds into.
#[derive(Debug, Clone, Copy)]
struct Waiter {
    task: TaskId,
    slot: Slot,
}

/// What a posted result did to its expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// More tasks remain. `unblocked` is the dependent made runnable, if any.
    Progressed { unblocked: Option<TaskId> },
    /// The expression reached a terminal outcome and its tasks may be evicted.
    Finished {
        expression_id: ExpressionId,
        outcome: Outcome,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub live_tasks: usize,
    pub runnable_tasks: usize,
    pub computing_tasks: usize,
    pub live_expressions: usize,
}

pub struct TaskStore {
    /// Live tasks keyed by id; iteration order is creation order.
    tasks: BTreeMap<TaskId, Task>,
    /// Pending tasks whose operands are both literals.
    ready: BTreeSet<TaskId>,
    /// Dependency id -> the operand waiting for its result.
    waiters: HashMap<TaskId, Waiter>,
    /// Non-terminal task count per live expression.
    remaining: HashMap<ExpressionId, usize>,
    next_task_id: TaskId,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            ready: BTreeSet::new(),
            waiters: HashMap::new(),
            remaining: HashMap::new(),
            next_task_id: 1,
        }
    }

    /// Id the next admitted task will receive.
    pub fn next_task_id(&self) -> TaskId {
        self.next_task_id
    }

    pub fn contains_expression(&self, expression_id: ExpressionId) -> bool {
        self.remaining.contains_key(&expression_id)
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Live tasks of one expression in creation order.
    pub fn tasks_for(&self, expression_id: ExpressionId) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| t.expression_id == expression_id)
            .cloned()
            .collect()
    }

    /// Stamp `plan` with fresh ids and register its tasks. Returns the new ids.
    pub fn admit(
        &mut self,
        expression_id: ExpressionId,
        plan: &TaskPlan,
        timings: &OperationTimings,
    ) -> Vec<TaskId> {
        let tasks = plan.instantiate(expression_id, self.next_task_id, timings);
        self.next_task_id += tasks.len() as TaskId;

        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            for (operand, slot) in [(&task.arg1, Slot::First), (&task.arg2, Slot::Second)] {
                if let Some(dep) = operand.dependency() {
                    self.waiters.insert(dep, Waiter { task: task.id, slot });
                }
            }
            if task.is_runnable() {
                self.ready.insert(task.id);
            }
            ids.push(task.id);
            self.tasks.insert(task.id, task);
        }

        if !ids.is_empty() {
            self.remaining.insert(expression_id, ids.len());
        }
        ids
    }

    /// Lowest-id runnable task, without claiming it.
    pub fn peek_runnable(&self) -> Option<&Task> {
        self.ready.first().and_then(|id| self.tasks.get(id))
    }

    /// Hand out the lowest-id runnable task, moving it to `Computing`.
    pub fn claim_next(&mut self) -> Option<Task> {
        let id = self.ready.pop_first()?;
        let task = self.tasks.get_mut(&id)?;
        task.status = Status::Computing;
        Some(task.clone())
    }

    /// Apply a worker's result report.
    ///
    /// A successful result is substituted into its dependent's operand. An
    /// error finishes the whole expression at once, since no dependent can
    /// ever become runnable.
    pub fn complete(&mut self, report: &TaskResult) -> Result<Completion, SchedulerError> {
        let task = self
            .tasks
            .get_mut(&report.id)
            .ok_or(SchedulerError::TaskNotFound(report.id))?;

        if task.status != Status::Computing {
            return Err(SchedulerError::TaskNotClaimed {
                id: task.id,
                status: task.status,
            });
        }

        let expression_id = task.expression_id;

        if let Some(error) = report.error_message() {
            task.status = Status::Error;
            task.result = Some(report.result);
            task.error = Some(error.to_string());
            return Ok(Completion::Finished {
                expression_id,
                outcome: Outcome::Failed {
                    result: report.result,
                    error: error.to_string(),
                },
            });
        }

        task.status = Status::Done;
        task.result = Some(report.result);

        let remaining = self.remaining.entry(expression_id).or_insert(1);
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            return Ok(Completion::Finished {
                expression_id,
                outcome: Outcome::Done(report.result),
            });
        }

        let unblocked = self.resolve(report.id, report.result);
        Ok(Completion::Progressed { unblocked })
    }

    /// Substitute a finished dependency's value into the task waiting on it.
    fn resolve(&mut self, dependency: TaskId, value: f64) -> Option<TaskId> {
        let waiter = self.waiters.remove(&dependency)?;
        let dependent = self.tasks.get_mut(&waiter.task)?;
        match waiter.slot {
            Slot::First => dependent.arg1 = Operand::resolved(value),
            Slot::Second => dependent.arg2 = Operand::resolved(value),
        }
        if dependent.is_runnable() {
            self.ready.insert(dependent.id);
            Some(dependent.id)
        } else {
            None
        }
    }

    /// Drop every task of a finished expression, returning the removed ids.
    pub fn evict(&mut self, expression_id: ExpressionId) -> Vec<TaskId> {
        let ids: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| t.expression_id == expression_id)
            .map(|t| t.id)
            .collect();

        for id in &ids {
            self.tasks.remove(id);
            self.ready.remove(id);
            self.waiters.remove(id);
        }
        self.remaining.remove(&expression_id);
        ids
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            live_tasks: self.tasks.len(),
            runnable_tasks: self.ready.len(),
            computing_tasks: self
                .tasks
                .values()
                .filter(|t| t.status == Status::Computing)
                .count(),
            live_expressions: self.remaining.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postfix::to_postfix;

    fn admit(store: &mut TaskStore, expression_id: ExpressionId, expr: &str) -> Vec<TaskId> {
        let plan = TaskPlan::from_postfix(&to_postfix(expr).unwrap()).unwrap();
        store.admit(expression_id, &plan, &OperationTimings::uniform(0))
    }

    #[test]
    fn ids_keep_increasing_across_expressions() {
        let mut store = TaskStore::new();
        assert_eq!(admit(&mut store, 1, "1+2*3"), vec![1, 2]);
        assert_eq!(admit(&mut store, 2, "4-5"), vec![3]);
        store.evict(1);
        assert_eq!(admit(&mut store, 3, "6/7"), vec![4]);
        assert_eq!(store.next_task_id(), 5);
    }

    #[test]
    fn claim_skips_blocked_tasks() {
        let mut store = TaskStore::new();
        admit(&mut store, 1, "(1+2)*3");
        admit(&mut store, 2, "4+5");

        assert_eq!(store.claim_next().unwrap().id, 1);
        // task2 waits on task1, so the next runnable is expression 2's task.
        assert_eq!(store.claim_next().unwrap().id, 3);
        assert!(store.claim_next().is_none());
    }

    #[test]
    fn result_unblocks_dependent() {
        let mut store = TaskStore::new();
        admit(&mut store, 1, "(1+2)*3");
        store.claim_next();

        let completion = store.complete(&TaskResult::success(1, 3.0)).unwrap();
        assert_eq!(completion, Completion::Progressed { unblocked: Some(2) });

        let task = store.claim_next().unwrap();
        assert_eq!(task.arg1, Operand::Literal("3.000000".into()));
        assert_eq!(task.arg2, Operand::Literal("3".into()));
    }

    #[test]
    fn last_result_finishes_expression() {
        let mut store = TaskStore::new();
        admit(&mut store, 7, "2+2");
        store.claim_next();

        let completion = store.complete(&TaskResult::success(1, 4.0)).unwrap();
        assert_eq!(
            completion,
            Completion::Finished {
                expression_id: 7,
                outcome: Outcome::Done(4.0)
            }
        );
        assert_eq!(store.evict(7), vec![1]);
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn error_finishes_expression_immediately() {
        let mut store = TaskStore::new();
        admit(&mut store, 1, "1/0+(2*3)");
        // task1 = 1/0, task2 = 2*3, task3 = task1 + task2
        assert_eq!(store.claim_next().unwrap().id, 1);
        assert_eq!(store.claim_next().unwrap().id, 2);

        let completion = store
            .complete(&TaskResult::failure(1, "division by zero"))
            .unwrap();
        assert!(matches!(
            completion,
            Completion::Finished { expression_id: 1, outcome: Outcome::Failed { ref error, .. } }
                if error == "division by zero"
        ));

        store.evict(1);
        assert!(matches!(
            store.complete(&TaskResult::success(2, 6.0)),
            Err(SchedulerError::TaskNotFound(2))
        ));
    }

    #[test]
    fn unclaimed_or_repeated_results_are_rejected() {
        let mut store = TaskStore::new();
        admit(&mut store, 1, "(1+2)*3");

        assert!(matches!(
            store.complete(&TaskResult::success(1, 3.0)),
            Err(SchedulerError::TaskNotClaimed { id: 1, status: Status::Pending })
        ));

        store.claim_next();
        store.complete(&TaskResult::success(1, 3.0)).unwrap();
        assert!(matches!(
            store.complete(&TaskResult::success(1, 3.0)),
            Err(SchedulerError::TaskNotClaimed { id: 1, status: Status::Done })
        ));
    }

    #[test]
    fn stats_track_claims() {
        let mut store = TaskStore::new();
        admit(&mut store, 1, "1+2+3");
        admit(&mut store, 2, "4*5");
        store.claim_next();

        let stats = store.stats();
        assert_eq!(stats.live_tasks, 3);
        assert_eq!(stats.runnable_tasks, 1);
        assert_eq!(stats.computing_tasks, 1);
        assert_eq!(stats.live_expressions, 2);
    }
}
