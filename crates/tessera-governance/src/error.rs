use tessera_storage::StorageError;
use tessera_types::{Amount, OptionId, ProposalId, TypesError, VoterId};
use thiserror::Error;

/// Errors that can occur in governance operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("Insufficient stake for {voter}: requested {requested}, available {available}")]
    InsufficientStake {
        voter: VoterId,
        requested: Amount,
        available: Amount,
    },

    #[error("Insufficient voting power for {voter}: cost {cost}, power {power}")]
    InsufficientVotingPower {
        voter: VoterId,
        cost: Amount,
        power: Amount,
    },

    #[error("Invalid vote weight: {0}")]
    InvalidWeight(String),

    #[error("Delegation cycle detected: {delegate} already delegates back to {delegator}")]
    CycleDetected { delegator: VoterId, delegate: VoterId },

    #[error("Invalid delegation fraction: {0} bps is outside (0, 10000]")]
    InvalidFraction(u32),

    #[error("Self-delegation not allowed")]
    SelfDelegation,

    #[error("Proposal {0} is not accepting votes")]
    ProposalNotActive(ProposalId),

    #[error("Proposal {0} is still open")]
    ProposalStillOpen(ProposalId),

    #[error("Proposal {0} not found")]
    ProposalNotFound(ProposalId),

    #[error("Unknown option {option} on proposal {proposal}")]
    UnknownOption { proposal: ProposalId, option: OptionId },

    #[error("Proposal {0} is not a draft")]
    NotDraft(ProposalId),

    #[error("Invalid proposal configuration: {0}")]
    InvalidConfig(String),

    #[error("Stake {offered} below required minimum {minimum}")]
    StakeBelowMinimum { offered: Amount, minimum: Amount },

    #[error("Voter {0} is archived")]
    VoterArchived(VoterId),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl GovernanceError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GovernanceError::Storage(_))
    }
}

impl From<StorageError> for GovernanceError {
    fn from(e: StorageError) -> Self {
        GovernanceError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GovernanceError::InsufficientStake {
            voter: VoterId::new("alice").unwrap(),
            requested: Amount::new(16),
            available: Amount::new(10),
        };
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("16"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_storage_errors_are_transient() {
        let err: GovernanceError = StorageError::Unavailable("disk".to_string()).into();
        assert!(err.is_transient());
        assert!(!GovernanceError::SelfDelegation.is_transient());
    }

    #[test]
    fn test_types_error_conversion() {
        let err: GovernanceError = TypesError::AmountOverflow.into();
        assert_eq!(err.to_string(), "Amount overflow");
    }
}
