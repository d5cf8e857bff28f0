//! Read-side aggregates over proposals.

use crate::cost::VotingMode;
use crate::error::GovernanceError;
use crate::proposal::{
    Outcome, Proposal, ProposalState, ProposalStore, ProposalType, SettlementReport,
};
use serde::{Deserialize, Serialize};
use tessera_types::{Amount, BasisPoints, OptionId, ProposalId, Timestamp};

/// Per-option totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    pub id: OptionId,
    pub label: String,
    pub abstain: bool,
    pub weight: Amount,
    /// Share of all participating weight
    pub share: BasisPoints,
}

/// Aggregate view of one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalView {
    pub id: ProposalId,
    pub title: String,
    pub description: String,
    pub proposal_type: ProposalType,
    pub state: ProposalState,
    pub voting_mode: VotingMode,
    pub options: Vec<OptionView>,
    pub ballots: usize,
    pub total_weight: Amount,
    pub quorum_required: Amount,
    /// Participation relative to the quorum, capped at 100%
    pub quorum_progress: BasisPoints,
    pub quorum_reached: bool,
    pub required_majority: BasisPoints,
    /// Leading option's share of non-abstain weight
    pub approval_rate: BasisPoints,
    pub leading_option: Option<OptionId>,
    pub deadline: Timestamp,
    /// Zero once the deadline has passed
    pub time_remaining_secs: u64,
    pub outcome: Option<Outcome>,
    pub settlement: Option<SettlementReport>,
}

/// Builds views from the proposal store.
#[derive(Debug, Clone, Copy)]
pub struct TallyReporter<'a> {
    store: &'a ProposalStore,
}

impl<'a> TallyReporter<'a> {
    pub fn new(store: &'a ProposalStore) -> Self {
        Self { store }
    }

    pub fn view(&self, id: ProposalId, now: Timestamp) -> Result<ProposalView, GovernanceError> {
        let handle = self.store.handle(id)?;
        let record = handle.lock();
        Ok(Self::summarize(&record.proposal, record.ballots.len(), now))
    }

    /// Views of every proposal in `state` (all when `None`).
    pub fn list(&self, state: Option<ProposalState>, now: Timestamp) -> Vec<ProposalView> {
        self.store
            .list(state)
            .into_iter()
            .filter_map(|p| self.view(p.id, now).ok())
            .collect()
    }

    /// Pure summary of a proposal at `now`.
    pub fn summarize(proposal: &Proposal, ballots: usize, now: Timestamp) -> ProposalView {
        let total = proposal.participation();
        let decisive = proposal.decisive_weight();
        let quorum_required = proposal.required_quorum();
        let leader = proposal.leader();

        let options = proposal
            .options
            .iter()
            .map(|o| OptionView {
                id: o.id,
                label: o.label.clone(),
                abstain: o.abstain,
                weight: o.weight,
                share: BasisPoints::ratio(o.weight, total),
            })
            .collect();

        let quorum_progress = if quorum_required.is_zero() {
            BasisPoints::MAX
        } else {
            BasisPoints::ratio(total, quorum_required)
        };

        let time_remaining_secs = match proposal.state {
            ProposalState::Draft | ProposalState::Active => now.secs_until(proposal.deadline),
            _ => 0,
        };

        ProposalView {
            id: proposal.id,
            title: proposal.title.clone(),
            description: proposal.description.clone(),
            proposal_type: proposal.proposal_type,
            state: proposal.state,
            voting_mode: proposal.voting_mode,
            options,
            ballots,
            total_weight: total,
            quorum_required,
            quorum_progress,
            quorum_reached: total >= quorum_required,
            required_majority: proposal.majority,
            approval_rate: leader
                .map(|(_, weight)| BasisPoints::ratio(weight, decisive))
                .unwrap_or(BasisPoints::ZERO),
            leading_option: leader.map(|(id, _)| id),
            deadline: proposal.deadline,
            time_remaining_secs,
            outcome: proposal.outcome.clone(),
            settlement: proposal.settlement.clone(),
        }
    }
}
