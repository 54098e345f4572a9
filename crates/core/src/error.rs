use thiserror::Error;

#[derive(Error, Debug)]
pub enum AbacusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Expression not found: {0}")]
    ExpressionNotFound(i64),

    #[error("user already exists")]
    UserExists,

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}
