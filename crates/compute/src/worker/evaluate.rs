use thiserror::Error;

use abacus_core::{Operand, Operator, Task};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("unresolved operand: {0}")]
    UnresolvedOperand(String),

    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// The operation produced an infinite or NaN value.
    #[error("result overflow")]
    Overflow,
}

fn operand_value(operand: &Operand) -> Result<f64, EvalError> {
    match operand {
        Operand::Pending(_) => Err(EvalError::UnresolvedOperand(operand.to_string())),
        Operand::Literal(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| EvalError::InvalidOperand(text.clone())),
    }
}

/// Compute a single binary task. Both operands must already be literals.
///
/// Only finite values are returned; anything else cannot be reported over
/// JSON or stored.
pub fn evaluate(task: &Task) -> Result<f64, EvalError> {
    let a = operand_value(&task.arg1)?;
    let b = operand_value(&task.arg2)?;

    let value = match task.operation {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        Operator::Divide if b == 0.0 => return Err(EvalError::DivisionByZero),
        Operator::Divide => a / b,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::Overflow)
    }
}
