//! Compute worker: evaluates single tasks and polls an orchestrator for them.

pub mod agent;
pub mod evaluate;

pub use agent::{execute, Agent, AgentError, HttpTaskSource, TaskSource};
pub use evaluate::{evaluate, EvalError};
