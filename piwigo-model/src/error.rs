use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidPrivacyLevel(i64),
    InvalidSortParam(String),
    InvalidDate(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidPrivacyLevel(level) => {
                write!(f, "invalid privacy level: {level}")
            }
            ModelError::InvalidSortParam(param) => {
                write!(f, "invalid sort parameter: {param}")
            }
            ModelError::InvalidDate(raw) => write!(f, "invalid date: {raw}"),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
