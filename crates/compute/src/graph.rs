//! Task graph construction from postfix tokens.
//!
//! Building happens in two steps. [`TaskPlan::from_postfix`] validates the
//! token stream and produces a plan whose nodes refer to each other by local
//! index. [`TaskPlan::instantiate`] then stamps the plan with global task ids,
//! so a malformed expression never consumes ids or touches the task store.

use thiserror::Error;

use abacus_core::config::OperationTimings;
use abacus_core::{ExpressionId, Operand, Operator, Status, Task, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("not enough operands for operator: {0}")]
    InsufficientOperands(Operator),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("expected a single result, found {0} operands")]
    UnbalancedOperands(usize),
}

/// Operand of a planned task: a literal or the output of an earlier node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedOperand {
    Literal(String),
    Node(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub arg1: PlannedOperand,
    pub arg2: PlannedOperand,
    pub operation: Operator,
}

/// Validated, id-free shape of an expression's task graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    nodes: Vec<PlannedTask>,
    root: PlannedOperand,
}

/// A literal must parse as a finite decimal number.
fn is_numeric(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

impl TaskPlan {
    pub fn from_postfix<S: AsRef<str>>(tokens: &[S]) -> Result<Self, GraphError> {
        let mut nodes: Vec<PlannedTask> = Vec::new();
        let mut stack: Vec<PlannedOperand> = Vec::new();

        for token in tokens {
            let token = token.as_ref();
            if let Some(operation) = Operator::from_token(token) {
                // Popped in reverse: the top of the stack is the right-hand side.
                let (arg2, arg1) = match (stack.pop(), stack.pop()) {
                    (Some(arg2), Some(arg1)) => (arg2, arg1),
                    _ => return Err(GraphError::InsufficientOperands(operation)),
                };
                nodes.push(PlannedTask {
                    arg1,
                    arg2,
                    operation,
                });
                stack.push(PlannedOperand::Node(nodes.len() - 1));
            } else if is_numeric(token) {
                stack.push(PlannedOperand::Literal(token.to_string()));
            } else {
                return Err(GraphError::InvalidToken(token.to_string()));
            }
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(root), true) => Ok(Self { nodes, root }),
            (Some(_), false) => Err(GraphError::UnbalancedOperands(stack.len() + 1)),
            (None, _) => Err(GraphError::UnbalancedOperands(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[PlannedTask] {
        &self.nodes
    }

    /// Value of an operator-free expression such as `"42"`.
    pub fn constant(&self) -> Option<f64> {
        match &self.root {
            PlannedOperand::Literal(text) => text.parse().ok(),
            PlannedOperand::Node(_) => None,
        }
    }

    /// Assign global ids `first_id..first_id + len()` in creation order.
    pub fn instantiate(
        &self,
        expression_id: ExpressionId,
        first_id: TaskId,
        timings: &OperationTimings,
    ) -> Vec<Task> {
        let operand = |planned: &PlannedOperand| match planned {
            PlannedOperand::Literal(text) => Operand::Literal(text.clone()),
            PlannedOperand::Node(index) => Operand::Pending(first_id + *index as TaskId),
        };

        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| Task {
                id: first_id + index as TaskId,
                expression_id,
                arg1: operand(&node.arg1),
                arg2: operand(&node.arg2),
                operation: node.operation,
                operation_time_ms: timings.for_operator(node.operation),
                status: Status::Pending,
                result: None,
                error: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::postfix::to_postfix;

    fn plan(expr: &str) -> Result<TaskPlan, GraphError> {
        TaskPlan::from_postfix(&to_postfix(expr).unwrap())
    }

    #[test]
    fn one_task_per_operator() {
        let p = plan("2+3*4-1").unwrap();
        assert_eq!(p.len(), 3);

        let tasks = p.instantiate(1, 10, &OperationTimings::default());
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert!(tasks.iter().all(|t| t.expression_id == 1));
    }

    #[test]
    fn references_point_backwards_to_unique_consumers() {
        let tasks = plan("(1+2)*(3+4)/5")
            .unwrap()
            .instantiate(1, 1, &OperationTimings::default());

        let mut seen = HashSet::new();
        for task in &tasks {
            for dep in [task.arg1.dependency(), task.arg2.dependency()].into_iter().flatten() {
                assert!(dep < task.id, "task{} references later task{}", task.id, dep);
                assert!(seen.insert(dep), "task{} referenced twice", dep);
            }
        }
        // Every task except the root feeds exactly one other task.
        assert_eq!(seen.len(), tasks.len() - 1);
    }

    #[test]
    fn operands_keep_left_right_order() {
        let tasks = plan("8-3").unwrap().instantiate(4, 1, &OperationTimings::default());
        assert_eq!(tasks[0].arg1, Operand::Literal("8".into()));
        assert_eq!(tasks[0].arg2, Operand::Literal("3".into()));
        assert_eq!(tasks[0].operation, Operator::Subtract);
    }

    #[test]
    fn nested_operand_becomes_reference() {
        let tasks = plan("2+3*4").unwrap().instantiate(1, 5, &OperationTimings::default());
        assert_eq!(tasks[0].operation, Operator::Multiply);
        assert_eq!(tasks[1].arg1, Operand::Literal("2".into()));
        assert_eq!(tasks[1].arg2, Operand::Pending(5));
        assert!(tasks[0].is_runnable());
        assert!(!tasks[1].is_runnable());
    }

    #[test]
    fn timing_follows_operator() {
        let timings = OperationTimings {
            addition_ms: 1,
            subtraction_ms: 2,
            multiplication_ms: 3,
            division_ms: 4,
        };
        let tasks = plan("1/2").unwrap().instantiate(1, 1, &timings);
        assert_eq!(tasks[0].operation_time_ms, 4);
    }

    #[test]
    fn instantiation_is_repeatable() {
        let p = plan("(2+3)*4").unwrap();
        let timings = OperationTimings::default();
        assert_eq!(p.instantiate(9, 3, &timings), p.instantiate(9, 3, &timings));
    }

    #[test]
    fn trailing_operator_lacks_operands() {
        let err = plan("2+2-").unwrap_err();
        assert_eq!(err, GraphError::InsufficientOperands(Operator::Subtract));
        assert_eq!(err.to_string(), "not enough operands for operator: -");
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert_eq!(
            TaskPlan::from_postfix(&["1.2.3", "4", "+"]),
            Err(GraphError::InvalidToken("1.2.3".into()))
        );
        assert!(TaskPlan::from_postfix(&["inf", "1", "+"]).is_err());
    }

    #[test]
    fn leftover_operands_are_rejected() {
        assert_eq!(
            TaskPlan::from_postfix(&["1", "2"]),
            Err(GraphError::UnbalancedOperands(2))
        );
        assert_eq!(
            TaskPlan::from_postfix::<&str>(&[]),
            Err(GraphError::UnbalancedOperands(0))
        );
    }

    #[test]
    fn lone_number_is_a_constant() {
        let p = plan("42").unwrap();
        assert!(p.is_empty());
        assert_eq!(p.constant(), Some(42.0));
    }
}
