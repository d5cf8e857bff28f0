//! Tessera Types - Core type definitions for the Tessera governance engine.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - Identifiers (voters, proposals, options, stake locks)
//! - Amounts in integer minor units and basis-point fractions
//! - Timestamps and the clock abstraction

pub mod amount;
pub mod error;
pub mod id;
pub mod time;

pub use amount::{Amount, BasisPoints};
pub use error::TypesError;
pub use id::{LockId, OptionId, ProposalId, VoterId};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Amount, BasisPoints, Clock, LockId, ManualClock, OptionId, ProposalId, SystemClock,
        Timestamp, TypesError, VoterId,
    };
}
