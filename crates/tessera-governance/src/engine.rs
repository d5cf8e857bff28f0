//! Voting engine.
//!
//! Orchestrates every command against the proposal store, the stake ledger
//! and the delegation graph, writing each change through to the durable
//! store before it becomes visible in memory.
//!
//! Lock order, outermost first: proposal record, delegation graph, voter
//! account, reward pool.

use crate::config::GovernanceConfig;
use crate::cost::CostModel;
use crate::delegation::{parse_fraction, Delegation, DelegationGraph};
use crate::error::GovernanceError;
use crate::ledger::{StakeLedger, VoterAccount};
use crate::persist;
use crate::proposal::{
    Ballot, OptionSpec, Proposal, ProposalRecord, ProposalSpec, ProposalState, ProposalStore,
    SettlementReport, StakingRequirement,
};
use crate::tally::{ProposalView, TallyReporter};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_storage::{KeyValueStore, MemoryStore, WriteBatch};
use tessera_types::{Amount, Clock, OptionId, ProposalId, Timestamp, VoterId};
use tracing::{debug, info, warn};

/// Hooks for operational metrics. Every method defaults to a no-op.
pub trait EngineObserver: Send + Sync {
    fn proposal_created(&self, _id: ProposalId) {}
    fn proposal_activated(&self, _id: ProposalId) {}
    fn ballot_cast(&self, _id: ProposalId, _replaced: bool) {}
    fn proposal_finalized(&self, _id: ProposalId, _state: ProposalState) {}
    fn proposal_settled(&self, _id: ProposalId, _report: &SettlementReport) {}
    fn settlement_failed(&self, _id: ProposalId, _error: &GovernanceError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}

/// A ballot submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    pub voter: VoterId,
    pub proposal: ProposalId,
    pub option: OptionId,
    pub weight: u64,
    /// Stake to lock. Defaults to the larger of the cost and the minimum
    #[serde(default)]
    pub stake_amount: Option<Amount>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl CastVote {
    pub fn new(voter: VoterId, proposal: ProposalId, option: OptionId, weight: u64) -> Self {
        Self {
            voter,
            proposal,
            option,
            weight,
            stake_amount: None,
            comment: None,
        }
    }

    pub fn with_stake(mut self, amount: Amount) -> Self {
        self.stake_amount = Some(amount);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Governance voting engine.
pub struct VotingEngine {
    config: GovernanceConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn KeyValueStore>,
    proposals: ProposalStore,
    ledger: StakeLedger,
    delegations: RwLock<DelegationGraph>,
    observer: Arc<dyn EngineObserver>,
}

impl std::fmt::Debug for VotingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VotingEngine")
            .field("config", &self.config)
            .field("proposals", &self.proposals.len())
            .field("delegations", &self.delegations.read().len())
            .finish()
    }
}

impl VotingEngine {
    /// Engine backed by a fresh in-memory store.
    pub fn new(config: GovernanceConfig, clock: Arc<dyn Clock>) -> Self {
        let depth = config.max_delegation_depth;
        Self {
            config,
            clock,
            store: Arc::new(MemoryStore::new()),
            proposals: ProposalStore::new(),
            ledger: StakeLedger::new(),
            delegations: RwLock::new(DelegationGraph::new().with_max_depth(depth)),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Rebuild an engine from everything recorded in `store`.
    pub fn open(
        config: GovernanceConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, GovernanceError> {
        config.validate().map_err(GovernanceError::InvalidConfig)?;
        let snapshot = persist::load(store.as_ref())?;
        info!(
            proposals = snapshot.proposals.len(),
            voters = snapshot.accounts.len(),
            delegations = snapshot.delegations.len(),
            "governance state loaded"
        );

        let depth = config.max_delegation_depth;
        Ok(Self {
            config,
            clock,
            store,
            proposals: ProposalStore::restore(snapshot.proposals),
            ledger: StakeLedger::restore(snapshot.accounts, snapshot.next_lock, snapshot.reward_pool),
            delegations: RwLock::new(DelegationGraph::restore(snapshot.delegations, depth)),
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn EngineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn proposals(&self) -> &ProposalStore {
        &self.proposals
    }

    pub fn ledger(&self) -> &StakeLedger {
        &self.ledger
    }

    fn write(&self, batch: WriteBatch) -> Result<(), GovernanceError> {
        self.store.write(batch)?;
        Ok(())
    }

    /// Write a single updated proposal and install it.
    fn commit_proposal(
        &self,
        record: &mut ProposalRecord,
        proposal: Proposal,
    ) -> Result<(), GovernanceError> {
        let mut batch = WriteBatch::new();
        persist::put_proposal(&mut batch, &proposal)?;
        self.write(batch)?;
        record.proposal = proposal;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Proposals
    // ---------------------------------------------------------------

    /// Create a draft proposal.
    pub fn create_proposal(&self, spec: ProposalSpec) -> Result<ProposalId, GovernanceError> {
        spec.validate()?;
        let id = self.proposals.allocate_id();
        let proposal = Proposal::from_spec(id, spec, self.clock.now())?;

        let mut batch = WriteBatch::new();
        persist::put_proposal(&mut batch, &proposal)?;
        self.write(batch)?;

        info!(proposal = %id, title = %proposal.title, deadline = %proposal.deadline, "proposal created");
        self.proposals.insert(ProposalRecord::new(proposal));
        self.observer.proposal_created(id);
        Ok(id)
    }

    /// Open a draft for voting.
    pub fn activate_proposal(&self, id: ProposalId) -> Result<(), GovernanceError> {
        let handle = self.proposals.handle(id)?;
        let mut record = handle.lock();
        let mut proposal = record.proposal.clone();
        proposal.activate(self.clock.now(), self.ledger.total_stake())?;
        self.commit_proposal(&mut record, proposal)?;

        info!(
            proposal = %id,
            quorum = %record.proposal.required_quorum(),
            deadline = %record.proposal.deadline,
            "proposal activated"
        );
        self.observer.proposal_activated(id);
        Ok(())
    }

    /// Add an option to a draft.
    pub fn add_option(&self, id: ProposalId, option: OptionSpec) -> Result<OptionId, GovernanceError> {
        let handle = self.proposals.handle(id)?;
        let mut record = handle.lock();
        let mut proposal = record.proposal.clone();
        let option_id = proposal.add_option(option)?;
        self.commit_proposal(&mut record, proposal)?;
        debug!(proposal = %id, option = %option_id, "option added");
        Ok(option_id)
    }

    /// Move the deadline of a draft.
    pub fn set_deadline(&self, id: ProposalId, deadline: Timestamp) -> Result<(), GovernanceError> {
        let handle = self.proposals.handle(id)?;
        let mut record = handle.lock();
        let mut proposal = record.proposal.clone();
        proposal.set_deadline(deadline)?;
        self.commit_proposal(&mut record, proposal)
    }

    /// Withdraw a draft.
    pub fn cancel_proposal(&self, id: ProposalId) -> Result<(), GovernanceError> {
        let handle = self.proposals.handle(id)?;
        let mut record = handle.lock();
        let mut proposal = record.proposal.clone();
        proposal.cancel()?;
        self.commit_proposal(&mut record, proposal)?;
        info!(proposal = %id, "proposal cancelled");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Stake
    // ---------------------------------------------------------------

    /// Run a ledger transaction that persists the resulting account.
    fn account_transaction<T>(
        &self,
        voter: &VoterId,
        f: impl FnOnce(&mut VoterAccount) -> Result<T, GovernanceError>,
    ) -> Result<T, GovernanceError> {
        self.ledger.transact(voter, f, |account, _| {
            let mut batch = WriteBatch::new();
            persist::put_account(&mut batch, account)?;
            self.write(batch)
        })
    }

    /// Add stake to a voter's balance. Returns the new balance.
    pub fn deposit(&self, voter: &VoterId, amount: Amount) -> Result<Amount, GovernanceError> {
        let balance = self.account_transaction(voter, |a| a.deposit(amount))?;
        debug!(%voter, %amount, %balance, "stake deposited");
        Ok(balance)
    }

    /// Take unlocked stake out of a voter's balance. Returns the new balance.
    pub fn withdraw(&self, voter: &VoterId, amount: Amount) -> Result<Amount, GovernanceError> {
        let balance = self.account_transaction(voter, |a| a.withdraw(amount))?;
        debug!(%voter, %amount, %balance, "stake withdrawn");
        Ok(balance)
    }

    /// Archive a voter. History is kept; new deposits, locks and votes are
    /// refused.
    pub fn archive_voter(&self, voter: &VoterId) -> Result<(), GovernanceError> {
        self.account_transaction(voter, |a| {
            a.archived = true;
            Ok(())
        })?;
        info!(%voter, "voter archived");
        Ok(())
    }

    pub fn available_stake(&self, voter: &VoterId) -> Amount {
        self.ledger.available_stake(voter)
    }

    pub fn account(&self, voter: &VoterId) -> Option<VoterAccount> {
        self.ledger.account(voter)
    }

    pub fn reward_pool(&self) -> Amount {
        self.ledger.reward_pool()
    }

    // ---------------------------------------------------------------
    // Delegation
    // ---------------------------------------------------------------

    /// Delegate `fraction_bps` basis points of `from`'s power to `to`,
    /// replacing any existing delegation of `from`.
    pub fn delegate(
        &self,
        from: &VoterId,
        to: &VoterId,
        fraction_bps: u32,
    ) -> Result<(), GovernanceError> {
        let fraction = parse_fraction(fraction_bps)?;
        let now = self.clock.now();
        let mut graph = self.delegations.write();
        let previous = graph.delegate_with(from, to, fraction, now, |delegation| {
            let mut batch = WriteBatch::new();
            persist::put_delegation(&mut batch, delegation)?;
            self.write(batch)
        })?;

        match previous {
            Some(old) => info!(%from, %to, %fraction, replaced = %old.delegate, "delegation replaced"),
            None => info!(%from, %to, %fraction, "delegation created"),
        }
        Ok(())
    }

    /// Remove `from`'s delegation. Returns whether one existed.
    pub fn revoke_delegation(&self, from: &VoterId) -> Result<bool, GovernanceError> {
        let mut graph = self.delegations.write();
        let removed = graph.revoke_with(from, |delegation| {
            let mut batch = WriteBatch::new();
            persist::delete_delegation(&mut batch, &delegation.delegator);
            self.write(batch)
        })?;
        if let Some(old) = &removed {
            info!(%from, to = %old.delegate, "delegation revoked");
        }
        Ok(removed.is_some())
    }

    pub fn delegation_of(&self, voter: &VoterId) -> Option<Delegation> {
        self.delegations.read().delegate_of(voter).cloned()
    }

    pub fn delegators_of(&self, voter: &VoterId) -> Vec<VoterId> {
        self.delegations.read().delegators_of(voter)
    }

    pub fn all_delegators(&self, voter: &VoterId) -> Vec<VoterId> {
        self.delegations.read().all_delegators(voter)
    }

    /// Voting power after following delegation chains.
    pub fn effective_power(&self, voter: &VoterId) -> Amount {
        self.delegations
            .read()
            .effective_power(voter, |v| self.ledger.balance(v))
    }

    // ---------------------------------------------------------------
    // Voting
    // ---------------------------------------------------------------

    /// Cast or replace a ballot.
    ///
    /// Runs under the proposal's lock. Either the ballot, the tally change
    /// and the stake lock are all recorded, or nothing is.
    pub fn cast_vote(&self, request: CastVote) -> Result<Ballot, GovernanceError> {
        let CastVote {
            voter,
            proposal: id,
            option,
            weight,
            stake_amount,
            comment,
        } = request;

        let handle = self.proposals.handle(id)?;
        let mut record = handle.lock();
        let now = self.clock.now();

        if !record.proposal.is_open(now) {
            return Err(GovernanceError::ProposalNotActive(id));
        }
        record.proposal.option(option)?;
        if self.ledger.is_archived(&voter) {
            return Err(GovernanceError::VoterArchived(voter));
        }

        let cost = CostModel::cost(record.proposal.voting_mode, weight)?;
        let prior = record.ballots.get(&voter).cloned();
        let prior_lock = prior.as_ref().and_then(|b| b.lock);

        let stake = match record.proposal.staking {
            StakingRequirement::None => {
                if stake_amount.map(|s| !s.is_zero()).unwrap_or(false) {
                    return Err(GovernanceError::InvalidConfig(
                        "proposal does not accept stake".to_string(),
                    ));
                }
                Amount::ZERO
            }
            StakingRequirement::MinimumStake(minimum) => {
                let floor = cost.max(minimum);
                let stake = stake_amount.unwrap_or(floor);
                if stake < floor {
                    return Err(GovernanceError::StakeBelowMinimum {
                        offered: stake,
                        minimum: floor,
                    });
                }
                // The prior ballot's lock is released before relocking.
                let reclaimable = prior_lock
                    .and_then(|lock| self.ledger.lock_amount(lock))
                    .unwrap_or(Amount::ZERO);
                let available = self.ledger.available_stake(&voter).saturating_add(reclaimable);
                if stake > available {
                    return Err(GovernanceError::InsufficientStake {
                        voter,
                        requested: stake,
                        available,
                    });
                }
                stake
            }
        };

        let power = self.effective_power(&voter);
        if cost > power {
            return Err(GovernanceError::InsufficientVotingPower { voter, cost, power });
        }

        let mut proposal = record.proposal.clone();
        if let Some(previous) = &prior {
            proposal.retract_vote(previous.option, Amount::from(previous.weight))?;
        }
        proposal.record_vote(option, Amount::from(weight))?;

        let lock = (!stake.is_zero()).then(|| self.ledger.allocate_lock_id());
        let ballot = Ballot {
            voter: voter.clone(),
            proposal: id,
            option,
            weight,
            cost,
            stake,
            lock,
            submitted_at: now,
            comment,
        };

        let persist_vote = |account: Option<&VoterAccount>| -> Result<(), GovernanceError> {
            let mut batch = WriteBatch::new();
            persist::put_proposal(&mut batch, &proposal)?;
            persist::put_ballot(&mut batch, &ballot)?;
            if let Some(account) = account {
                persist::put_account(&mut batch, account)?;
            }
            self.write(batch)
        };

        if prior_lock.is_some() || lock.is_some() {
            self.ledger.transact(
                &voter,
                |account| {
                    if let Some(previous) = prior_lock {
                        account.remove_lock(previous);
                    }
                    if let Some(lock) = lock {
                        account.add_lock(lock, stake)?;
                    }
                    Ok(())
                },
                |account, _| persist_vote(Some(account)),
            )?;
        } else {
            persist_vote(None)?;
        }

        record.proposal = proposal;
        record.ballots.insert(voter.clone(), ballot.clone());

        let replaced = prior.is_some();
        info!(
            proposal = %id,
            %voter,
            option = %option,
            weight,
            %cost,
            %stake,
            replaced,
            "ballot cast"
        );
        self.observer.ballot_cast(id, replaced);
        Ok(ballot)
    }

    /// Largest weight the voter could cast on a proposal right now, given
    /// effective power and, when staking is required, available stake.
    pub fn max_affordable_weight(
        &self,
        voter: &VoterId,
        id: ProposalId,
    ) -> Result<u64, GovernanceError> {
        let proposal = self.proposals.get(id)?;
        let mut budget = self.effective_power(voter);
        if let StakingRequirement::MinimumStake(minimum) = proposal.staking {
            let reclaimable = self
                .proposals
                .ballot(id, voter)?
                .and_then(|b| b.lock)
                .and_then(|lock| self.ledger.lock_amount(lock))
                .unwrap_or(Amount::ZERO);
            let available = self.ledger.available_stake(voter).saturating_add(reclaimable);
            if available < minimum {
                return Ok(0);
            }
            budget = budget.min(available);
        }
        Ok(CostModel::max_weight(proposal.voting_mode, budget))
    }

    // ---------------------------------------------------------------
    // Settlement
    // ---------------------------------------------------------------

    /// Finalize a proposal whose deadline has passed and settle every staked
    /// ballot. Calling it again returns the same report and changes nothing.
    pub fn settle_proposal(&self, id: ProposalId) -> Result<SettlementReport, GovernanceError> {
        let handle = self.proposals.handle(id)?;
        let mut record = handle.lock();

        if let Some(report) = &record.proposal.settlement {
            debug!(proposal = %id, "proposal already settled");
            return Ok(report.clone());
        }

        if record.proposal.state == ProposalState::Active {
            let outcome = record.proposal.evaluate(self.clock.now())?;
            let mut proposal = record.proposal.clone();
            proposal.finalize(outcome.clone())?;
            self.commit_proposal(&mut record, proposal)?;
            info!(proposal = %id, state = record.proposal.state.name(), ?outcome, "proposal finalized");
            self.observer.proposal_finalized(id, record.proposal.state);
        }
        if !record.proposal.state.is_voting_outcome() {
            return Err(GovernanceError::ProposalNotActive(id));
        }

        let plan = record.settlement_plan();
        for entry in &plan {
            let settled = self.ledger.settle_with(
                entry.lock,
                entry.outcome,
                entry.reputation_delta,
                |account, pool| {
                    let mut batch = WriteBatch::new();
                    persist::put_account(&mut batch, account)?;
                    persist::put_reward_pool(&mut batch, pool)?;
                    self.write(batch)
                },
            )?;
            if settled.is_none() {
                debug!(proposal = %id, voter = %entry.voter, lock = %entry.lock, "lock already settled");
            }
        }

        let report = record.settlement_report(&plan);
        let mut proposal = record.proposal.clone();
        proposal.settlement = Some(report.clone());
        self.commit_proposal(&mut record, proposal)?;

        info!(
            proposal = %id,
            state = report.state.name(),
            ballots = report.ballots_settled,
            refunded = %report.refunded,
            forfeited = %report.forfeited,
            "proposal settled"
        );
        self.observer.proposal_settled(id, &report);
        Ok(report)
    }

    /// Proposals the scheduler should settle now.
    pub fn due_proposals(&self) -> Vec<ProposalId> {
        self.proposals.due(self.clock.now())
    }

    pub(crate) fn report_settlement_failure(&self, id: ProposalId, error: &GovernanceError) {
        warn!(proposal = %id, %error, "settlement failed");
        self.observer.settlement_failed(id, error);
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn proposal(&self, id: ProposalId) -> Result<Proposal, GovernanceError> {
        self.proposals.get(id)
    }

    /// Aggregate view of a proposal.
    pub fn get_proposal(&self, id: ProposalId) -> Result<ProposalView, GovernanceError> {
        TallyReporter::new(&self.proposals).view(id, self.clock.now())
    }

    pub fn list_proposals(&self, state: Option<ProposalState>) -> Vec<Proposal> {
        self.proposals.list(state)
    }

    pub fn voter_ballot(
        &self,
        voter: &VoterId,
        id: ProposalId,
    ) -> Result<Option<Ballot>, GovernanceError> {
        self.proposals.ballot(id, voter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::VotingMode;
    use crate::proposal::Quorum;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tessera_types::{BasisPoints, ManualClock};

    const FOR: OptionId = OptionId::new(0);
    const AGAINST: OptionId = OptionId::new(1);

    fn voter(name: &str) -> VoterId {
        VoterId::new(name).unwrap()
    }

    fn setup() -> (VotingEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_000)));
        let engine = VotingEngine::new(GovernanceConfig::default(), clock.clone());
        (engine, clock)
    }

    fn open_proposal(engine: &VotingEngine, spec: ProposalSpec) -> ProposalId {
        let spec = spec
            .with_option(OptionSpec::new("For"))
            .with_option(OptionSpec::new("Against"))
            .with_deadline(Timestamp::from_secs(2_000));
        let id = engine.create_proposal(spec).unwrap();
        engine.activate_proposal(id).unwrap();
        id
    }

    fn simple(engine: &VotingEngine) -> ProposalId {
        open_proposal(engine, ProposalSpec::new("Simple", Quorum::Absolute(Amount::new(10))))
    }

    #[test]
    fn test_create_and_activate() {
        let (engine, _) = setup();
        let id = simple(&engine);
        assert_eq!(engine.proposal(id).unwrap().state, ProposalState::Active);
        assert!(matches!(
            engine.activate_proposal(id),
            Err(GovernanceError::NotDraft(_))
        ));
        assert!(matches!(
            engine.activate_proposal(ProposalId::new(99)),
            Err(GovernanceError::ProposalNotFound(_))
        ));
    }

    #[test]
    fn test_cast_vote_requires_power() {
        let (engine, _) = setup();
        let id = simple(&engine);
        let alice = voter("alice");
        engine.deposit(&alice, Amount::new(5)).unwrap();

        let result = engine.cast_vote(CastVote::new(alice.clone(), id, FOR, 6));
        assert!(matches!(
            result,
            Err(GovernanceError::InsufficientVotingPower { cost, power, .. })
                if cost == Amount::new(6) && power == Amount::new(5)
        ));
        assert!(engine.voter_ballot(&alice, id).unwrap().is_none());
    }

    #[test]
    fn test_cast_vote_unknown_option() {
        let (engine, _) = setup();
        let id = simple(&engine);
        let alice = voter("alice");
        engine.deposit(&alice, Amount::new(5)).unwrap();

        assert!(matches!(
            engine.cast_vote(CastVote::new(alice, id, OptionId::new(7), 1)),
            Err(GovernanceError::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_cast_vote_after_deadline() {
        let (engine, clock) = setup();
        let id = simple(&engine);
        let alice = voter("alice");
        engine.deposit(&alice, Amount::new(5)).unwrap();

        clock.set(Timestamp::from_secs(2_000));
        assert!(matches!(
            engine.cast_vote(CastVote::new(alice, id, FOR, 1)),
            Err(GovernanceError::ProposalNotActive(_))
        ));
    }

    #[test]
    fn test_stake_rejected_without_requirement() {
        let (engine, _) = setup();
        let id = simple(&engine);
        let alice = voter("alice");
        engine.deposit(&alice, Amount::new(5)).unwrap();

        let request = CastVote::new(alice, id, FOR, 1).with_stake(Amount::new(3));
        assert!(matches!(
            engine.cast_vote(request),
            Err(GovernanceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_stake_below_minimum() {
        let (engine, _) = setup();
        let spec = ProposalSpec::new("Staked", Quorum::Absolute(Amount::new(10)))
            .with_staking(StakingRequirement::MinimumStake(Amount::new(20)), BasisPoints::ZERO);
        let id = open_proposal(&engine, spec);
        let alice = voter("alice");
        engine.deposit(&alice, Amount::new(100)).unwrap();

        let request = CastVote::new(alice.clone(), id, FOR, 5).with_stake(Amount::new(10));
        assert!(matches!(
            engine.cast_vote(request),
            Err(GovernanceError::StakeBelowMinimum { .. })
        ));

        let ballot = engine.cast_vote(CastVote::new(alice.clone(), id, FOR, 5)).unwrap();
        assert_eq!(ballot.stake, Amount::new(20));
        assert_eq!(engine.available_stake(&alice), Amount::new(80));
    }

    #[test]
    fn test_archived_voter_cannot_vote() {
        let (engine, _) = setup();
        let id = simple(&engine);
        let alice = voter("alice");
        engine.deposit(&alice, Amount::new(5)).unwrap();
        engine.archive_voter(&alice).unwrap();

        assert!(matches!(
            engine.cast_vote(CastVote::new(alice, id, FOR, 1)),
            Err(GovernanceError::VoterArchived(_))
        ));
    }

    #[test]
    fn test_delegated_power_votes() {
        let (engine, _) = setup();
        let id = simple(&engine);
        let (alice, bob) = (voter("alice"), voter("bob"));
        engine.deposit(&alice, Amount::new(8)).unwrap();
        engine.deposit(&bob, Amount::new(4)).unwrap();

        engine.delegate(&alice, &bob, 10_000).unwrap();
        assert_eq!(engine.effective_power(&bob), Amount::new(12));
        assert!(engine.cast_vote(CastVote::new(bob.clone(), id, FOR, 12)).is_ok());
        assert!(matches!(
            engine.cast_vote(CastVote::new(alice.clone(), id, FOR, 1)),
            Err(GovernanceError::InsufficientVotingPower { .. })
        ));

        assert!(engine.revoke_delegation(&alice).unwrap());
        assert!(!engine.revoke_delegation(&alice).unwrap());
        assert_eq!(engine.effective_power(&alice), Amount::new(8));
        // Bob's ballot stays as cast
        assert_eq!(engine.voter_ballot(&bob, id).unwrap().map(|b| b.weight), Some(12));
    }

    #[test]
    fn test_delegate_invalid_fraction() {
        let (engine, _) = setup();
        let result = engine.delegate(&voter("a"), &voter("b"), 0);
        assert!(matches!(result, Err(GovernanceError::InvalidFraction(0))));
        let result = engine.delegate(&voter("a"), &voter("b"), 20_000);
        assert!(matches!(result, Err(GovernanceError::InvalidFraction(20_000))));
    }

    #[test]
    fn test_max_affordable_weight() {
        let (engine, _) = setup();
        let spec = ProposalSpec::new("Quadratic", Quorum::Absolute(Amount::new(10)))
            .with_mode(VotingMode::Quadratic);
        let id = open_proposal(&engine, spec);
        let alice = voter("alice");
        engine.deposit(&alice, Amount::new(50)).unwrap();
        assert_eq!(engine.max_affordable_weight(&alice, id).unwrap(), 7);
    }

    #[test]
    fn test_settle_open_proposal_fails() {
        let (engine, _) = setup();
        let id = simple(&engine);
        assert!(matches!(
            engine.settle_proposal(id),
            Err(GovernanceError::ProposalStillOpen(_))
        ));
    }

    #[test]
    fn test_settle_draft_fails() {
        let (engine, _) = setup();
        let spec = ProposalSpec::new("Draft", Quorum::Absolute(Amount::new(1)));
        let id = engine.create_proposal(spec).unwrap();
        assert!(matches!(
            engine.settle_proposal(id),
            Err(GovernanceError::ProposalNotActive(_))
        ));
        engine.cancel_proposal(id).unwrap();
        assert!(engine.due_proposals().is_empty());
    }

    #[derive(Default)]
    struct CountingObserver {
        ballots: AtomicUsize,
        settled: AtomicUsize,
    }

    impl EngineObserver for CountingObserver {
        fn ballot_cast(&self, _id: ProposalId, _replaced: bool) {
            self.ballots.fetch_add(1, Ordering::SeqCst);
        }

        fn proposal_settled(&self, _id: ProposalId, _report: &SettlementReport) {
            self.settled.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_observer_notified() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_000)));
        let observer = Arc::new(CountingObserver::default());
        let engine = VotingEngine::new(GovernanceConfig::default(), clock.clone())
            .with_observer(observer.clone());
        let id = simple(&engine);
        let alice = voter("alice");
        engine.deposit(&alice, Amount::new(20)).unwrap();
        engine.cast_vote(CastVote::new(alice, id, FOR, 10)).unwrap();

        clock.set(Timestamp::from_secs(2_000));
        engine.settle_proposal(id).unwrap();
        engine.settle_proposal(id).unwrap();

        assert_eq!(observer.ballots.load(Ordering::SeqCst), 1);
        assert_eq!(observer.settled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reopen_from_store() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_000)));
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let alice = voter("alice");
        let id = {
            let engine =
                VotingEngine::open(GovernanceConfig::default(), clock.clone(), store.clone()).unwrap();
            let spec = ProposalSpec::new("Persisted", Quorum::Absolute(Amount::new(10)))
                .with_staking(StakingRequirement::MinimumStake(Amount::new(1)), BasisPoints::ZERO);
            let id = open_proposal(&engine, spec);
            engine.deposit(&alice, Amount::new(30)).unwrap();
            engine.cast_vote(CastVote::new(alice.clone(), id, AGAINST, 12)).unwrap();
            engine.delegate(&voter("bob"), &alice, 5_000).unwrap();
            id
        };

        let engine = VotingEngine::open(GovernanceConfig::default(), clock, store).unwrap();
        let ballot = engine.voter_ballot(&alice, id).unwrap().unwrap();
        assert_eq!(ballot.weight, 12);
        assert_eq!(engine.available_stake(&alice), Amount::new(18));
        assert_eq!(engine.proposal(id).unwrap().options[1].weight, Amount::new(12));
        assert_eq!(engine.delegators_of(&alice), vec![voter("bob")]);

        // New locks do not collide with restored ones
        let lock = engine.ledger().allocate_lock_id();
        assert!(Some(lock) > ballot.lock);
    }
}
