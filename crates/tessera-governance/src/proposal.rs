//! Proposal lifecycle management.
//!
//! Proposals go through states: Draft -> Active -> Passed/Rejected/Expired.
//! A draft may also be Cancelled. Terminal states never transition again.

use crate::cost::VotingMode;
use crate::error::GovernanceError;
use crate::ledger::SettlementOutcome;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_types::{Amount, BasisPoints, LockId, OptionId, ProposalId, Timestamp, VoterId};

const DAY: u64 = 24 * 60 * 60;

/// Proposal state in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    /// Editable, not yet accepting ballots
    Draft,
    /// Voting is open until the deadline
    Active,
    Passed,
    Rejected,
    /// Quorum was not reached
    Expired,
    /// Withdrawn while still a draft
    Cancelled,
}

impl ProposalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalState::Passed
                | ProposalState::Rejected
                | ProposalState::Expired
                | ProposalState::Cancelled
        )
    }

    /// Terminal states reached through voting, the ones that settle stake.
    pub fn is_voting_outcome(&self) -> bool {
        matches!(
            self,
            ProposalState::Passed | ProposalState::Rejected | ProposalState::Expired
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProposalState::Draft => "draft",
            ProposalState::Active => "active",
            ProposalState::Passed => "passed",
            ProposalState::Rejected => "rejected",
            ProposalState::Expired => "expired",
            ProposalState::Cancelled => "cancelled",
        }
    }
}

/// Type of governance proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    /// Protocol parameter change
    #[default]
    ParameterChange,
    /// Treasury spending
    TreasurySpending,
    /// Contract upgrade
    ContractUpgrade,
    /// Emergency action
    Emergency,
    /// Custom action
    Custom { code: u16 },
}

impl ProposalType {
    /// Default voting period in seconds.
    pub fn default_voting_period(&self) -> u64 {
        match self {
            ProposalType::ParameterChange => 7 * DAY,
            ProposalType::TreasurySpending => 7 * DAY,
            ProposalType::ContractUpgrade => 14 * DAY,
            ProposalType::Emergency => DAY,
            ProposalType::Custom { .. } => 7 * DAY,
        }
    }

    /// Default required majority.
    pub fn default_majority(&self) -> BasisPoints {
        let bps = match self {
            ProposalType::ParameterChange => 5_000,
            ProposalType::TreasurySpending => 5_000,
            ProposalType::ContractUpgrade => 6_000,
            ProposalType::Emergency => 6_600,
            ProposalType::Custom { .. } => 5_000,
        };
        BasisPoints::new(bps).unwrap_or(BasisPoints::HALF)
    }
}

/// Minimum participation, fixed when the proposal is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quorum {
    /// Total participating weight
    Absolute(Amount),
    /// Share of the eligible power snapshotted at activation
    Percentage(BasisPoints),
}

/// Whether ballots must lock stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingRequirement {
    #[default]
    None,
    /// Every ballot locks at least this much (and at least its cost)
    MinimumStake(Amount),
}

impl StakingRequirement {
    pub fn is_required(&self) -> bool {
        matches!(self, StakingRequirement::MinimumStake(_))
    }
}

/// Option as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub label: String,
    #[serde(default)]
    pub abstain: bool,
}

impl OptionSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            abstain: false,
        }
    }

    pub fn abstain(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            abstain: true,
        }
    }
}

/// Input to `create_proposal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub proposal_type: ProposalType,
    /// Defaults to creation time plus the type's voting period
    #[serde(default)]
    pub deadline: Option<Timestamp>,
    pub quorum: Quorum,
    /// Defaults to the type's majority: 50% for the default
    /// `ParameterChange`, higher for upgrades and emergencies
    #[serde(default)]
    pub majority: Option<BasisPoints>,
    #[serde(default)]
    pub voting_mode: VotingMode,
    #[serde(default)]
    pub staking: StakingRequirement,
    /// Share of a losing stake forfeited on settlement
    #[serde(default)]
    pub stake_at_risk: BasisPoints,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
}

impl ProposalSpec {
    pub fn new(title: impl Into<String>, quorum: Quorum) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            proposal_type: ProposalType::default(),
            deadline: None,
            quorum,
            majority: None,
            voting_mode: VotingMode::Simple,
            staking: StakingRequirement::None,
            stake_at_risk: BasisPoints::ZERO,
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_deadline(mut self, deadline: Timestamp) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_majority(mut self, majority: BasisPoints) -> Self {
        self.majority = Some(majority);
        self
    }

    pub fn with_mode(mut self, mode: VotingMode) -> Self {
        self.voting_mode = mode;
        self
    }

    pub fn with_staking(mut self, staking: StakingRequirement, stake_at_risk: BasisPoints) -> Self {
        self.staking = staking;
        self.stake_at_risk = stake_at_risk;
        self
    }

    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.title.trim().is_empty() {
            return Err(GovernanceError::InvalidConfig("title is empty".to_string()));
        }
        if self.majority.map(|m| m.is_zero()).unwrap_or(false) {
            return Err(GovernanceError::InvalidConfig(
                "required majority must be above 0%".to_string(),
            ));
        }
        if !self.stake_at_risk.is_zero() && !self.staking.is_required() {
            return Err(GovernanceError::InvalidConfig(
                "stake at risk requires a minimum stake".to_string(),
            ));
        }
        for option in &self.options {
            validate_label(&option.label)?;
        }
        Ok(())
    }
}

fn validate_label(label: &str) -> Result<(), GovernanceError> {
    if label.trim().is_empty() {
        return Err(GovernanceError::InvalidConfig("option label is empty".to_string()));
    }
    Ok(())
}

/// One choice on a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalOption {
    pub id: OptionId,
    pub label: String,
    pub abstain: bool,
    /// Accumulated weight of active ballots
    pub weight: Amount,
}

/// Result of evaluating a closed proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed {
        winner: OptionId,
        share: BasisPoints,
    },
    Rejected {
        /// `None` on a tie for the lead or when nobody voted decisively
        leader: Option<OptionId>,
        share: BasisPoints,
    },
    Expired {
        participation: Amount,
        quorum: Amount,
    },
}

impl Outcome {
    pub fn state(&self) -> ProposalState {
        match self {
            Outcome::Passed { .. } => ProposalState::Passed,
            Outcome::Rejected { .. } => ProposalState::Rejected,
            Outcome::Expired { .. } => ProposalState::Expired,
        }
    }
}

/// One voter's choice on one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter: VoterId,
    pub proposal: ProposalId,
    pub option: OptionId,
    pub weight: u64,
    pub cost: Amount,
    /// Zero when the proposal does not require staking
    pub stake: Amount,
    pub lock: Option<LockId>,
    pub submitted_at: Timestamp,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Totals returned by settlement, identical on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub state: ProposalState,
    /// Ballots that had stake locked
    pub ballots_settled: usize,
    pub refunded: Amount,
    pub forfeited: Amount,
}

/// Per-ballot settlement instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementEntry {
    pub voter: VoterId,
    pub lock: LockId,
    pub stake: Amount,
    pub outcome: SettlementOutcome,
    pub reputation_delta: i32,
}

/// Governance proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub title: String,
    pub description: String,
    pub proposal_type: ProposalType,
    pub created_at: Timestamp,
    pub deadline: Timestamp,
    pub quorum: Quorum,
    pub majority: BasisPoints,
    pub voting_mode: VotingMode,
    pub staking: StakingRequirement,
    pub stake_at_risk: BasisPoints,
    pub options: Vec<ProposalOption>,
    pub state: ProposalState,
    pub activated_at: Option<Timestamp>,
    /// Total stake at activation, the base of percentage quorums
    pub eligible_power: Option<Amount>,
    pub outcome: Option<Outcome>,
    pub settlement: Option<SettlementReport>,
}

impl Proposal {
    /// Create a draft from a validated spec.
    pub fn from_spec(
        id: ProposalId,
        spec: ProposalSpec,
        created_at: Timestamp,
    ) -> Result<Self, GovernanceError> {
        spec.validate()?;
        let deadline = spec
            .deadline
            .unwrap_or_else(|| created_at.plus_secs(spec.proposal_type.default_voting_period()));
        let majority = spec
            .majority
            .unwrap_or_else(|| spec.proposal_type.default_majority());

        let mut proposal = Self {
            id,
            title: spec.title,
            description: spec.description,
            proposal_type: spec.proposal_type,
            created_at,
            deadline,
            quorum: spec.quorum,
            majority,
            voting_mode: spec.voting_mode,
            staking: spec.staking,
            stake_at_risk: spec.stake_at_risk,
            options: Vec::new(),
            state: ProposalState::Draft,
            activated_at: None,
            eligible_power: None,
            outcome: None,
            settlement: None,
        };
        for option in spec.options {
            proposal.push_option(option);
        }
        Ok(proposal)
    }

    fn push_option(&mut self, option: OptionSpec) -> OptionId {
        let id = OptionId::new(self.options.len() as u32);
        self.options.push(ProposalOption {
            id,
            label: option.label,
            abstain: option.abstain,
            weight: Amount::ZERO,
        });
        id
    }

    fn ensure_draft(&self) -> Result<(), GovernanceError> {
        if self.state != ProposalState::Draft {
            return Err(GovernanceError::NotDraft(self.id));
        }
        Ok(())
    }

    /// Append an option to a draft.
    pub fn add_option(&mut self, option: OptionSpec) -> Result<OptionId, GovernanceError> {
        self.ensure_draft()?;
        validate_label(&option.label)?;
        Ok(self.push_option(option))
    }

    pub fn set_deadline(&mut self, deadline: Timestamp) -> Result<(), GovernanceError> {
        self.ensure_draft()?;
        self.deadline = deadline;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), GovernanceError> {
        self.ensure_draft()?;
        self.state = ProposalState::Cancelled;
        Ok(())
    }

    /// Open the proposal for voting.
    pub fn activate(
        &mut self,
        now: Timestamp,
        eligible_power: Amount,
    ) -> Result<(), GovernanceError> {
        self.ensure_draft()?;
        if self.options.len() < 2 {
            return Err(GovernanceError::InvalidConfig(format!(
                "at least 2 options required, found {}",
                self.options.len()
            )));
        }
        if self.options.iter().all(|o| o.abstain) {
            return Err(GovernanceError::InvalidConfig(
                "at least one non-abstain option required".to_string(),
            ));
        }
        if self.deadline <= now {
            return Err(GovernanceError::InvalidConfig(format!(
                "deadline {} is not in the future",
                self.deadline
            )));
        }

        self.state = ProposalState::Active;
        self.activated_at = Some(now);
        self.eligible_power = Some(eligible_power);
        Ok(())
    }

    /// Whether ballots are accepted at `now`.
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.state == ProposalState::Active && now < self.deadline
    }

    pub fn option(&self, option: OptionId) -> Result<&ProposalOption, GovernanceError> {
        self.options
            .get(option.get() as usize)
            .ok_or(GovernanceError::UnknownOption {
                proposal: self.id,
                option,
            })
    }

    fn option_mut(&mut self, option: OptionId) -> Result<&mut ProposalOption, GovernanceError> {
        let proposal = self.id;
        self.options
            .get_mut(option.get() as usize)
            .ok_or(GovernanceError::UnknownOption { proposal, option })
    }

    /// Add weight to an option.
    pub fn record_vote(&mut self, option: OptionId, weight: Amount) -> Result<(), GovernanceError> {
        if self.state != ProposalState::Active {
            return Err(GovernanceError::ProposalNotActive(self.id));
        }
        let entry = self.option_mut(option)?;
        entry.weight = entry.weight.try_add(weight)?;
        Ok(())
    }

    /// Remove weight previously recorded by a replaced ballot.
    pub fn retract_vote(&mut self, option: OptionId, weight: Amount) -> Result<(), GovernanceError> {
        if self.state != ProposalState::Active {
            return Err(GovernanceError::ProposalNotActive(self.id));
        }
        let entry = self.option_mut(option)?;
        entry.weight = entry.weight.try_sub(weight)?;
        Ok(())
    }

    /// Total participating weight, abstain included.
    pub fn participation(&self) -> Amount {
        self.options.iter().map(|o| o.weight).sum()
    }

    /// Weight on non-abstain options.
    pub fn decisive_weight(&self) -> Amount {
        self.options
            .iter()
            .filter(|o| !o.abstain)
            .map(|o| o.weight)
            .sum()
    }

    /// Participation needed to avoid expiry.
    pub fn required_quorum(&self) -> Amount {
        match self.quorum {
            Quorum::Absolute(amount) => amount,
            Quorum::Percentage(bps) => bps.apply(self.eligible_power.unwrap_or(Amount::ZERO)),
        }
    }

    /// Leading non-abstain option and its weight, `None` on a tie for the
    /// lead or when no decisive weight was cast.
    pub fn leader(&self) -> Option<(OptionId, Amount)> {
        let mut best: Option<(OptionId, Amount)> = None;
        let mut tied = false;
        for option in self.options.iter().filter(|o| !o.abstain && !o.weight.is_zero()) {
            match best {
                Some((_, weight)) if option.weight == weight => tied = true,
                Some((_, weight)) if option.weight < weight => {}
                _ => {
                    best = Some((option.id, option.weight));
                    tied = false;
                }
            }
        }
        if tied {
            None
        } else {
            best
        }
    }

    /// Compute the outcome. Pure given the tallies and `now`.
    pub fn evaluate(&self, now: Timestamp) -> Result<Outcome, GovernanceError> {
        match self.state {
            ProposalState::Active => {}
            ProposalState::Draft | ProposalState::Cancelled => {
                return Err(GovernanceError::ProposalNotActive(self.id));
            }
            _ => {
                if let Some(outcome) = &self.outcome {
                    return Ok(outcome.clone());
                }
            }
        }
        if now < self.deadline {
            return Err(GovernanceError::ProposalStillOpen(self.id));
        }

        let participation = self.participation();
        let quorum = self.required_quorum();
        if participation < quorum {
            return Ok(Outcome::Expired {
                participation,
                quorum,
            });
        }

        let decisive = self.decisive_weight();
        Ok(match self.leader() {
            Some((winner, weight)) if self.majority.is_met_by(weight, decisive) => Outcome::Passed {
                winner,
                share: BasisPoints::ratio(weight, decisive),
            },
            Some((leader, weight)) => Outcome::Rejected {
                leader: Some(leader),
                share: BasisPoints::ratio(weight, decisive),
            },
            None => Outcome::Rejected {
                leader: None,
                share: BasisPoints::ZERO,
            },
        })
    }

    /// Move an active proposal into the state given by `outcome`.
    pub fn finalize(&mut self, outcome: Outcome) -> Result<(), GovernanceError> {
        if self.state != ProposalState::Active {
            return Err(GovernanceError::ProposalNotActive(self.id));
        }
        self.state = outcome.state();
        self.outcome = Some(outcome);
        Ok(())
    }

    /// How a ballot's stake is settled under the final outcome.
    ///
    /// Ballots on the losing side lose `stake_at_risk`; everyone else is
    /// refunded in full. Expired proposals and leaderless rejections have no
    /// losing side.
    pub fn settlement_for(&self, ballot: &Ballot) -> SettlementOutcome {
        if !self.is_loser(ballot.option) || self.stake_at_risk.is_zero() {
            SettlementOutcome::RefundFull
        } else if self.stake_at_risk == BasisPoints::MAX {
            SettlementOutcome::Forfeit
        } else {
            SettlementOutcome::RefundPartial(self.stake_at_risk.complement())
        }
    }

    fn is_abstain(&self, option: OptionId) -> bool {
        self.option(option).map(|o| o.abstain).unwrap_or(false)
    }

    /// A passed proposal's losers backed any other option. A rejected
    /// proposal's losers backed the leader that missed the majority.
    fn is_loser(&self, option: OptionId) -> bool {
        if self.is_abstain(option) {
            return false;
        }
        match &self.outcome {
            Some(Outcome::Passed { winner, .. }) => option != *winner,
            Some(Outcome::Rejected { leader: Some(leader), .. }) => option == *leader,
            _ => false,
        }
    }

    /// Ballots on the side that determined the outcome.
    fn is_winner(&self, option: OptionId) -> bool {
        if self.is_abstain(option) {
            return false;
        }
        match &self.outcome {
            Some(Outcome::Passed { winner, .. }) => option == *winner,
            Some(Outcome::Rejected { leader: Some(leader), .. }) => option != *leader,
            _ => false,
        }
    }
}

/// A proposal with its active ballots, keyed by voter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRecord {
    pub proposal: Proposal,
    pub ballots: BTreeMap<VoterId, Ballot>,
}

impl ProposalRecord {
    pub fn new(proposal: Proposal) -> Self {
        Self {
            proposal,
            ballots: BTreeMap::new(),
        }
    }

    /// Sum of active ballot weights.
    pub fn ballot_weight(&self) -> Amount {
        self.ballots.values().map(|b| Amount::from(b.weight)).sum()
    }

    /// Settlement instructions for every staked ballot, ordered by voter.
    pub fn settlement_plan(&self) -> Vec<SettlementEntry> {
        self.ballots
            .values()
            .filter_map(|ballot| {
                let lock = ballot.lock?;
                let outcome = self.proposal.settlement_for(ballot);
                let (_, forfeited) = outcome.split(ballot.stake);
                let reputation_delta = if !forfeited.is_zero() {
                    -1
                } else if self.proposal.is_winner(ballot.option) {
                    1
                } else {
                    0
                };
                Some(SettlementEntry {
                    voter: ballot.voter.clone(),
                    lock,
                    stake: ballot.stake,
                    outcome,
                    reputation_delta,
                })
            })
            .collect()
    }

    /// Totals of a settlement plan.
    pub fn settlement_report(&self, plan: &[SettlementEntry]) -> SettlementReport {
        let mut refunded = Amount::ZERO;
        let mut forfeited = Amount::ZERO;
        for entry in plan {
            let (r, f) = entry.outcome.split(entry.stake);
            refunded = refunded.saturating_add(r);
            forfeited = forfeited.saturating_add(f);
        }
        SettlementReport {
            state: self.proposal.state,
            ballots_settled: plan.len(),
            refunded,
            forfeited,
        }
    }
}

/// Owns every proposal record. Each record sits behind its own mutex, which
/// is the unit of serialization for votes and settlement.
#[derive(Debug)]
pub struct ProposalStore {
    records: RwLock<HashMap<ProposalId, Arc<Mutex<ProposalRecord>>>>,
    next_id: AtomicU64,
}

impl Default for ProposalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn restore(records: impl IntoIterator<Item = ProposalRecord>) -> Self {
        let store = Self::new();
        let mut next = 1;
        {
            let mut map = store.records.write();
            for record in records {
                next = next.max(record.proposal.id.get().saturating_add(1));
                map.insert(record.proposal.id, Arc::new(Mutex::new(record)));
            }
        }
        store.next_id.store(next, Ordering::SeqCst);
        store
    }

    pub fn allocate_id(&self) -> ProposalId {
        ProposalId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn insert(&self, record: ProposalRecord) {
        self.records
            .write()
            .insert(record.proposal.id, Arc::new(Mutex::new(record)));
    }

    /// Shared handle to a record. Lock it to read or mutate.
    pub fn handle(&self, id: ProposalId) -> Result<Arc<Mutex<ProposalRecord>>, GovernanceError> {
        self.records
            .read()
            .get(&id)
            .cloned()
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    pub fn get(&self, id: ProposalId) -> Result<Proposal, GovernanceError> {
        Ok(self.handle(id)?.lock().proposal.clone())
    }

    pub fn ballot(&self, id: ProposalId, voter: &VoterId) -> Result<Option<Ballot>, GovernanceError> {
        Ok(self.handle(id)?.lock().ballots.get(voter).cloned())
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn handles(&self) -> Vec<Arc<Mutex<ProposalRecord>>> {
        self.records.read().values().cloned().collect()
    }

    /// Proposals, optionally filtered by state, ordered by id.
    pub fn list(&self, state: Option<ProposalState>) -> Vec<Proposal> {
        let mut proposals: Vec<Proposal> = self
            .handles()
            .iter()
            .map(|h| h.lock().proposal.clone())
            .filter(|p| state.map(|s| p.state == s).unwrap_or(true))
            .collect();
        proposals.sort_by_key(|p| p.id);
        proposals
    }

    /// Proposals the scheduler must handle: active past their deadline, or
    /// closed by a vote outcome but not yet settled.
    pub fn due(&self, now: Timestamp) -> Vec<ProposalId> {
        let mut due: Vec<ProposalId> = self
            .handles()
            .iter()
            .filter_map(|h| {
                let record = h.lock();
                let p = &record.proposal;
                let expired = p.state == ProposalState::Active && now >= p.deadline;
                let unsettled = p.state.is_voting_outcome() && p.settlement.is_none();
                (expired || unsettled).then_some(p.id)
            })
            .collect();
        due.sort();
        due
    }

    pub fn activate(
        &self,
        id: ProposalId,
        now: Timestamp,
        eligible_power: Amount,
    ) -> Result<(), GovernanceError> {
        self.handle(id)?.lock().proposal.activate(now, eligible_power)
    }

    pub fn record_vote(
        &self,
        id: ProposalId,
        option: OptionId,
        weight: Amount,
    ) -> Result<(), GovernanceError> {
        self.handle(id)?.lock().proposal.record_vote(option, weight)
    }

    pub fn evaluate(&self, id: ProposalId, now: Timestamp) -> Result<Outcome, GovernanceError> {
        self.handle(id)?.lock().proposal.evaluate(now)
    }
}
