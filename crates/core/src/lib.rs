pub mod config;
pub mod error;
pub mod expression;
pub mod task;

pub use config::Config;
pub use error::*;
pub use expression::*;
pub use task::*;
