use std::fmt::{self, Display};

/// Errors produced by id parsing.
#[derive(Debug)]
pub enum ModelError {
    InvalidId { kind: &'static str, value: String },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidId { kind, value } => {
                write!(f, "invalid {kind} id: {value:?}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
