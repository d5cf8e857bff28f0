//! Governance JSON-RPC methods.
//!
//! Each `gov_*` method is a thin binding over one `VotingEngine` command or
//! query. Engine errors are passed through with their stable codes.

use crate::error::{RpcError, RpcResult};
use jsonrpsee::proc_macros::rpc;
use std::sync::Arc;
use tessera_governance::{
    Ballot, CastVote, Delegation, OptionSpec, ProposalSpec, ProposalState, ProposalView,
    SettlementReport, TallyReporter, VoterAccount, VotingEngine,
};
use tessera_types::{Amount, OptionId, ProposalId, Timestamp, VoterId};
use tracing::debug;

#[rpc(server)]
pub trait GovernanceApi {
    // Proposal lifecycle
    #[method(name = "gov_createProposal")]
    fn create_proposal(&self, spec: ProposalSpec) -> RpcResult<ProposalId>;

    #[method(name = "gov_addOption")]
    fn add_option(&self, proposal: ProposalId, option: OptionSpec) -> RpcResult<OptionId>;

    #[method(name = "gov_setDeadline")]
    fn set_deadline(&self, proposal: ProposalId, deadline: Timestamp) -> RpcResult<ProposalView>;

    #[method(name = "gov_activateProposal")]
    fn activate_proposal(&self, proposal: ProposalId) -> RpcResult<ProposalView>;

    #[method(name = "gov_cancelProposal")]
    fn cancel_proposal(&self, proposal: ProposalId) -> RpcResult<ProposalView>;

    #[method(name = "gov_settleProposal")]
    fn settle_proposal(&self, proposal: ProposalId) -> RpcResult<SettlementReport>;

    // Stake
    #[method(name = "gov_deposit")]
    fn deposit(&self, voter: VoterId, amount: Amount) -> RpcResult<Amount>;

    #[method(name = "gov_withdraw")]
    fn withdraw(&self, voter: VoterId, amount: Amount) -> RpcResult<Amount>;

    #[method(name = "gov_archiveVoter")]
    fn archive_voter(&self, voter: VoterId) -> RpcResult<bool>;

    // Delegation
    #[method(name = "gov_delegate")]
    fn delegate(&self, from: VoterId, to: VoterId, fraction_bps: u32) -> RpcResult<Delegation>;

    #[method(name = "gov_revokeDelegation")]
    fn revoke_delegation(&self, from: VoterId) -> RpcResult<bool>;

    // Voting
    #[method(name = "gov_castVote")]
    fn cast_vote(&self, request: CastVote) -> RpcResult<Ballot>;

    // Queries
    #[method(name = "gov_getProposal")]
    fn get_proposal(&self, proposal: ProposalId) -> RpcResult<ProposalView>;

    #[method(name = "gov_listProposals")]
    fn list_proposals(&self, state: Option<ProposalState>) -> RpcResult<Vec<ProposalView>>;

    #[method(name = "gov_getVoterBallot")]
    fn get_voter_ballot(&self, voter: VoterId, proposal: ProposalId) -> RpcResult<Option<Ballot>>;

    #[method(name = "gov_getEffectivePower")]
    fn get_effective_power(&self, voter: VoterId) -> RpcResult<Amount>;

    #[method(name = "gov_getAvailableStake")]
    fn get_available_stake(&self, voter: VoterId) -> RpcResult<Amount>;

    #[method(name = "gov_getAccount")]
    fn get_account(&self, voter: VoterId) -> RpcResult<Option<VoterAccount>>;

    #[method(name = "gov_getDelegation")]
    fn get_delegation(&self, voter: VoterId) -> RpcResult<Option<Delegation>>;

    /// Every voter whose power reaches `voter`, directly or transitively.
    #[method(name = "gov_getDelegators")]
    fn get_delegators(&self, voter: VoterId) -> RpcResult<Vec<VoterId>>;

    #[method(name = "gov_maxAffordableWeight")]
    fn max_affordable_weight(&self, voter: VoterId, proposal: ProposalId) -> RpcResult<u64>;

    #[method(name = "gov_rewardPool")]
    fn reward_pool(&self) -> RpcResult<Amount>;
}

/// Handler backing the governance namespace.
#[derive(Debug, Clone)]
pub struct GovernanceRpc {
    engine: Arc<VotingEngine>,
}

impl GovernanceRpc {
    pub fn new(engine: Arc<VotingEngine>) -> Self {
        Self { engine }
    }
}

impl GovernanceApiServer for GovernanceRpc {
    fn create_proposal(&self, spec: ProposalSpec) -> RpcResult<ProposalId> {
        debug!(title = %spec.title, "gov_createProposal");
        Ok(self.engine.create_proposal(spec)?)
    }

    fn add_option(&self, proposal: ProposalId, option: OptionSpec) -> RpcResult<OptionId> {
        Ok(self.engine.add_option(proposal, option)?)
    }

    fn set_deadline(&self, proposal: ProposalId, deadline: Timestamp) -> RpcResult<ProposalView> {
        self.engine.set_deadline(proposal, deadline)?;
        Ok(self.engine.get_proposal(proposal)?)
    }

    fn activate_proposal(&self, proposal: ProposalId) -> RpcResult<ProposalView> {
        self.engine.activate_proposal(proposal)?;
        Ok(self.engine.get_proposal(proposal)?)
    }

    fn cancel_proposal(&self, proposal: ProposalId) -> RpcResult<ProposalView> {
        self.engine.cancel_proposal(proposal)?;
        Ok(self.engine.get_proposal(proposal)?)
    }

    fn settle_proposal(&self, proposal: ProposalId) -> RpcResult<SettlementReport> {
        Ok(self.engine.settle_proposal(proposal)?)
    }

    fn deposit(&self, voter: VoterId, amount: Amount) -> RpcResult<Amount> {
        if amount.is_zero() {
            return Err(RpcError::InvalidParams("deposit amount must be positive".to_string()));
        }
        Ok(self.engine.deposit(&voter, amount)?)
    }

    fn withdraw(&self, voter: VoterId, amount: Amount) -> RpcResult<Amount> {
        if amount.is_zero() {
            return Err(RpcError::InvalidParams("withdraw amount must be positive".to_string()));
        }
        Ok(self.engine.withdraw(&voter, amount)?)
    }

    fn archive_voter(&self, voter: VoterId) -> RpcResult<bool> {
        self.engine.archive_voter(&voter)?;
        Ok(true)
    }

    fn delegate(&self, from: VoterId, to: VoterId, fraction_bps: u32) -> RpcResult<Delegation> {
        self.engine.delegate(&from, &to, fraction_bps)?;
        self.engine
            .delegation_of(&from)
            .ok_or_else(|| RpcError::InternalError(format!("delegation of {} not recorded", from)))
    }

    fn revoke_delegation(&self, from: VoterId) -> RpcResult<bool> {
        Ok(self.engine.revoke_delegation(&from)?)
    }

    fn cast_vote(&self, request: CastVote) -> RpcResult<Ballot> {
        debug!(voter = %request.voter, proposal = %request.proposal, "gov_castVote");
        Ok(self.engine.cast_vote(request)?)
    }

    fn get_proposal(&self, proposal: ProposalId) -> RpcResult<ProposalView> {
        Ok(self.engine.get_proposal(proposal)?)
    }

    fn list_proposals(&self, state: Option<ProposalState>) -> RpcResult<Vec<ProposalView>> {
        Ok(TallyReporter::new(self.engine.proposals()).list(state, self.engine.now()))
    }

    fn get_voter_ballot(&self, voter: VoterId, proposal: ProposalId) -> RpcResult<Option<Ballot>> {
        Ok(self.engine.voter_ballot(&voter, proposal)?)
    }

    fn get_effective_power(&self, voter: VoterId) -> RpcResult<Amount> {
        Ok(self.engine.effective_power(&voter))
    }

    fn get_available_stake(&self, voter: VoterId) -> RpcResult<Amount> {
        Ok(self.engine.available_stake(&voter))
    }

    fn get_account(&self, voter: VoterId) -> RpcResult<Option<VoterAccount>> {
        Ok(self.engine.account(&voter))
    }

    fn get_delegation(&self, voter: VoterId) -> RpcResult<Option<Delegation>> {
        Ok(self.engine.delegation_of(&voter))
    }

    fn get_delegators(&self, voter: VoterId) -> RpcResult<Vec<VoterId>> {
        Ok(self.engine.all_delegators(&voter))
    }

    fn max_affordable_weight(&self, voter: VoterId, proposal: ProposalId) -> RpcResult<u64> {
        Ok(self.engine.max_affordable_weight(&voter, proposal)?)
    }

    fn reward_pool(&self) -> RpcResult<Amount> {
        Ok(self.engine.reward_pool())
    }
}
