//! RPC error types.

use jsonrpsee::types::error::ErrorObjectOwned;
use tessera_governance::GovernanceError;
use thiserror::Error;

/// JSON-RPC error codes. Governance rejections use the -32010 block so
/// callers can branch on the code without parsing messages.
pub mod error_codes {
    /// Parse error
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Resource not found
    pub const RESOURCE_NOT_FOUND: i32 = -32001;
    /// Resource unavailable
    pub const RESOURCE_UNAVAILABLE: i32 = -32002;

    pub const INSUFFICIENT_STAKE: i32 = -32010;
    pub const INSUFFICIENT_VOTING_POWER: i32 = -32011;
    pub const INVALID_WEIGHT: i32 = -32012;
    pub const CYCLE_DETECTED: i32 = -32013;
    pub const INVALID_FRACTION: i32 = -32014;
    pub const PROPOSAL_NOT_ACTIVE: i32 = -32015;
    pub const PROPOSAL_STILL_OPEN: i32 = -32016;
    pub const UNKNOWN_OPTION: i32 = -32017;
    pub const NOT_DRAFT: i32 = -32018;
    pub const INVALID_CONFIG: i32 = -32019;
    pub const SELF_DELEGATION: i32 = -32020;
    pub const STAKE_BELOW_MINIMUM: i32 = -32021;
    pub const VOTER_ARCHIVED: i32 = -32022;
}

/// RPC errors.
#[derive(Debug, Error, Clone)]
pub enum RpcError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Governance(#[from] GovernanceError),
}

impl RpcError {
    /// Get the error code.
    pub fn code(&self) -> i32 {
        match self {
            RpcError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            RpcError::InternalError(_) => error_codes::INTERNAL_ERROR,
            RpcError::Governance(e) => governance_code(e),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::InvalidParams(_) => "invalid_params",
            RpcError::InternalError(_) => "internal_error",
            RpcError::Governance(e) => match e {
                GovernanceError::InsufficientStake { .. } => "insufficient_stake",
                GovernanceError::InsufficientVotingPower { .. } => "insufficient_voting_power",
                GovernanceError::InvalidWeight(_) => "invalid_weight",
                GovernanceError::CycleDetected { .. } => "cycle_detected",
                GovernanceError::InvalidFraction(_) => "invalid_fraction",
                GovernanceError::SelfDelegation => "self_delegation",
                GovernanceError::ProposalNotActive(_) => "proposal_not_active",
                GovernanceError::ProposalStillOpen(_) => "proposal_still_open",
                GovernanceError::ProposalNotFound(_) => "proposal_not_found",
                GovernanceError::UnknownOption { .. } => "unknown_option",
                GovernanceError::NotDraft(_) => "not_draft",
                GovernanceError::InvalidConfig(_) => "invalid_config",
                GovernanceError::StakeBelowMinimum { .. } => "stake_below_minimum",
                GovernanceError::VoterArchived(_) => "voter_archived",
                GovernanceError::Storage(_) => "storage",
                GovernanceError::Types(_) => "invalid_params",
            },
        }
    }

    /// Convert to JSON-RPC error object. The kind travels in `data`.
    pub fn to_error_object(&self) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(self.code(), self.to_string(), Some(self.kind()))
    }
}

fn governance_code(error: &GovernanceError) -> i32 {
    use error_codes::*;
    match error {
        GovernanceError::InsufficientStake { .. } => INSUFFICIENT_STAKE,
        GovernanceError::InsufficientVotingPower { .. } => INSUFFICIENT_VOTING_POWER,
        GovernanceError::InvalidWeight(_) => INVALID_WEIGHT,
        GovernanceError::CycleDetected { .. } => CYCLE_DETECTED,
        GovernanceError::InvalidFraction(_) => INVALID_FRACTION,
        GovernanceError::SelfDelegation => SELF_DELEGATION,
        GovernanceError::ProposalNotActive(_) => PROPOSAL_NOT_ACTIVE,
        GovernanceError::ProposalStillOpen(_) => PROPOSAL_STILL_OPEN,
        GovernanceError::ProposalNotFound(_) => RESOURCE_NOT_FOUND,
        GovernanceError::UnknownOption { .. } => UNKNOWN_OPTION,
        GovernanceError::NotDraft(_) => NOT_DRAFT,
        GovernanceError::InvalidConfig(_) => INVALID_CONFIG,
        GovernanceError::StakeBelowMinimum { .. } => STAKE_BELOW_MINIMUM,
        GovernanceError::VoterArchived(_) => VOTER_ARCHIVED,
        GovernanceError::Storage(_) => RESOURCE_UNAVAILABLE,
        GovernanceError::Types(_) => INVALID_PARAMS,
    }
}

impl From<RpcError> for ErrorObjectOwned {
    fn from(err: RpcError) -> Self {
        err.to_error_object()
    }
}

/// Standard RPC result type.
pub type RpcResult<T> = Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::{Amount, ProposalId, TypesError, VoterId};

    #[test]
    fn test_error_codes() {
        assert_eq!(error_codes::PARSE_ERROR, -32700);
        assert_eq!(error_codes::INVALID_PARAMS, -32602);
        assert_eq!(error_codes::INSUFFICIENT_STAKE, -32010);
    }

    #[test]
    fn test_governance_error_code() {
        let err = RpcError::from(GovernanceError::InsufficientStake {
            voter: VoterId::new("alice").unwrap(),
            requested: Amount::new(16),
            available: Amount::new(10),
        });
        assert_eq!(err.code(), error_codes::INSUFFICIENT_STAKE);
        assert_eq!(err.kind(), "insufficient_stake");
        assert!(err.to_string().contains("requested 16"));

        let err = RpcError::from(GovernanceError::ProposalNotFound(ProposalId::new(9)));
        assert_eq!(err.code(), error_codes::RESOURCE_NOT_FOUND);

        let err = RpcError::from(GovernanceError::Storage("disk".to_string()));
        assert_eq!(err.code(), error_codes::RESOURCE_UNAVAILABLE);

        let err = RpcError::from(GovernanceError::Types(TypesError::AmountOverflow));
        assert_eq!(err.code(), error_codes::INVALID_PARAMS);
    }

    #[test]
    fn test_to_error_object() {
        let err = RpcError::from(GovernanceError::SelfDelegation);
        let obj = err.to_error_object();
        assert_eq!(obj.code(), error_codes::SELF_DELEGATION);
        assert_eq!(obj.message(), "Self-delegation not allowed");
        assert_eq!(obj.data().map(|d| d.get()), Some("\"self_delegation\""));
    }
}
