use thiserror::Error;

/// Errors that can occur in type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid voter id: {0}")]
    InvalidVoterId(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Basis points out of range: {0} > 10000")]
    BasisPointsOutOfRange(u32),

    #[error("Amount overflow")]
    AmountOverflow,

    #[error("Amount underflow")]
    AmountUnderflow,

    #[error("Invalid amount string: {0}")]
    InvalidAmountString(String),
}

impl From<std::num::ParseIntError> for TypesError {
    fn from(e: std::num::ParseIntError) -> Self {
        TypesError::InvalidAmountString(e.to_string())
    }
}
