use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::expression::{ExpressionId, Status};

/// Process-wide task identifier. Never reused, so `task<N>` is unambiguous.
pub type TaskId = i64;

/// Prefix of a symbolic operand that points at another task's result.
pub const REFERENCE_PREFIX: &str = "task";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Subtract),
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            _ => None,
        }
    }

    /// Parse a whole token; `"+"` is an operator, `"+1"` is not.
    pub fn from_token(token: &str) -> Option<Self> {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => None,
        }
    }

    /// Binding strength: `*` and `/` bind tighter than `+` and `-`.
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Add | Operator::Subtract => 1,
            Operator::Multiply | Operator::Divide => 2,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One side of a binary task.
///
/// On the wire both variants are plain strings: a literal keeps its decimal
/// text, a pending operand is rendered as `task<N>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Literal(String),
    Pending(TaskId),
}

impl Operand {
    /// Literal text produced when a dependency resolves, e.g. `12.000000`.
    pub fn resolved(value: f64) -> Self {
        Operand::Literal(format!("{:.6}", value))
    }

    pub fn parse(text: &str) -> Self {
        match text
            .strip_prefix(REFERENCE_PREFIX)
            .and_then(|rest| rest.parse::<TaskId>().ok())
        {
            Some(id) => Operand::Pending(id),
            None => Operand::Literal(text.to_string()),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::Literal(_))
    }

    pub fn dependency(&self) -> Option<TaskId> {
        match self {
            Operand::Pending(id) => Some(*id),
            Operand::Literal(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(text) => f.write_str(text),
            Operand::Pending(id) => write!(f, "{}{}", REFERENCE_PREFIX, id),
        }
    }
}

impl Serialize for Operand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Operand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Operand::parse(&text))
    }
}

/// A single binary operation dispatched to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub expression_id: ExpressionId,
    pub arg1: Operand,
    pub arg2: Operand,
    pub operation: Operator,
    /// Simulated execution cost the worker sleeps for.
    #[serde(alias = "operation_time")]
    pub operation_time_ms: u64,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Pending with both operands resolved.
    pub fn is_runnable(&self) -> bool {
        self.status == Status::Pending && self.arg1.is_literal() && self.arg2.is_literal()
    }
}

/// Result report a worker posts back after executing a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: TaskId,
    #[serde(default)]
    pub result: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(id: TaskId, result: f64) -> Self {
        Self { id, result, error: None }
    }

    pub fn failure(id: TaskId, error: impl Into<String>) -> Self {
        Self {
            id,
            result: 0.0,
            error: Some(error.into()),
        }
    }

    /// The reported error, treating an empty string as success.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}
