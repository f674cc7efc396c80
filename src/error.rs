use thiserror::Error;

use crate::types::Difficulty;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("item pool exhausted: no items at difficulty {0}")]
    PoolExhausted(Difficulty),
    #[error("item pool is empty")]
    EmptyPool,
    #[error("insufficient data for {metric}: {group} has {available} sessions, need at least {required}")]
    InsufficientData {
        metric: String,
        group: String,
        available: usize,
        required: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SimError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
