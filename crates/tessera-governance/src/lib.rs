//! Tessera Governance - Proposal lifecycle and stake-weighted voting.
//!
//! This crate provides:
//! - Proposal state machine with quorum and majority evaluation
//! - Simple and quadratic vote pricing
//! - A stake ledger with per-ballot locks and settlement
//! - Liquid democracy delegation with fractional, transitive edges
//! - A deadline scheduler that settles closed proposals

pub mod config;
pub mod cost;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod persist;
pub mod proposal;
pub mod scheduler;
pub mod tally;

pub use config::{GovernanceConfig, SchedulerConfig};
pub use cost::{CostModel, VotingMode};
pub use delegation::{Delegation, DelegationGraph};
pub use engine::{CastVote, EngineObserver, NoopObserver, VotingEngine};
pub use error::GovernanceError;
pub use ledger::{SettlementOutcome, StakeLedger, VoterAccount};
pub use proposal::{
    Ballot, OptionSpec, Outcome, Proposal, ProposalOption, ProposalSpec, ProposalState,
    ProposalStore, ProposalType, Quorum, SettlementReport, StakingRequirement,
};
pub use scheduler::{DeadlineScheduler, TickReport};
pub use tally::{OptionView, ProposalView, TallyReporter};
