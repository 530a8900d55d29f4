use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<clinicq_model::ModelError> for QueueError {
    fn from(err: clinicq_model::ModelError) -> Self {
        QueueError::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
