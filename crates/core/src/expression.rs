use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AbacusError;

/// Identifier assigned by the expression repository on insert.
pub type ExpressionId = i64;

/// Identifier of a registered user.
pub type UserId = i64;

/// Lifecycle status shared by expressions and their tasks.
///
/// Both move `Pending -> Computing -> {Done | Error}` and never leave a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Computing,
    Done,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Computing => "computing",
            Status::Done => "done",
            Status::Error => "error",
        }
    }

    /// `Done` and `Error` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Error)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = AbacusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "computing" => Ok(Status::Computing),
            "done" => Ok(Status::Done),
            "error" => Ok(Status::Error),
            other => Err(AbacusError::Serialize(format!("unknown status: {}", other))),
        }
    }
}

/// A user-submitted arithmetic formula and its evaluation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub id: ExpressionId,
    pub expression: String,
    pub status: Status,
    pub result: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing)]
    pub user_id: UserId,
}

impl Expression {
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Insert payload; the repository assigns the id and starts it as `Pending`.
#[derive(Debug, Clone)]
pub struct NewExpression {
    pub expression: String,
    pub user_id: UserId,
}

/// Terminal outcome written back once the last task of an expression finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done(f64),
    Failed { result: f64, error: String },
}

impl Outcome {
    pub fn status(&self) -> Status {
        match self {
            Outcome::Done(_) => Status::Done,
            Outcome::Failed { .. } => Status::Error,
        }
    }

    pub fn result(&self) -> f64 {
        match self {
            Outcome::Done(value) => *value,
            Outcome::Failed { result, .. } => *result,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Done(_) => None,
            Outcome::Failed { error, .. } => Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [Status::Pending, Status::Computing, Status::Done, Status::Error] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("finished".parse::<Status>().is_err());
    }

    #[test]
    fn only_done_and_error_are_terminal() {
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::Computing.is_terminal());
        assert!(Status::Done.is_terminal());
        assert!(Status::Error.is_terminal());
    }

    #[test]
    fn expression_json_hides_owner_and_empty_error() {
        let expr = Expression {
            id: 7,
            expression: "2+2".into(),
            status: Status::Done,
            result: 4.0,
            error: None,
            user_id: 42,
        };
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 7, "expression": "2+2", "status": "done", "result": 4.0})
        );
    }

    #[test]
    fn failed_outcome_carries_error_status() {
        let outcome = Outcome::Failed {
            result: 0.0,
            error: "division by zero".into(),
        };
        assert_eq!(outcome.status(), Status::Error);
        assert_eq!(outcome.error(), Some("division by zero"));
        assert_eq!(Outcome::Done(14.0).result(), 14.0);
    }
}
