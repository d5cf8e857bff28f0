//! Key and value encoding for the durable store.
//!
//! Values are JSON. Keys are chosen so that a column scan comes back in a
//! useful order: proposals by id (big-endian), ballots grouped by voter.

use crate::delegation::Delegation;
use crate::error::GovernanceError;
use crate::ledger::VoterAccount;
use crate::proposal::{Ballot, Proposal, ProposalRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use tessera_storage::{Column, KeyValueStore, WriteBatch};
use tessera_types::{Amount, LockId, ProposalId, VoterId};
use tracing::warn;

const REWARD_POOL_KEY: &[u8] = b"reward_pool";

pub fn proposal_key(id: ProposalId) -> Vec<u8> {
    id.get().to_be_bytes().to_vec()
}

pub fn ballot_key(voter: &VoterId, proposal: ProposalId) -> Vec<u8> {
    let mut key = voter.as_str().as_bytes().to_vec();
    key.push(b'/');
    key.extend_from_slice(&proposal.get().to_be_bytes());
    key
}

pub fn voter_key(voter: &VoterId) -> Vec<u8> {
    voter.as_str().as_bytes().to_vec()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, GovernanceError> {
    serde_json::to_vec(value).map_err(|e| GovernanceError::Storage(format!("encode: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GovernanceError> {
    serde_json::from_slice(bytes).map_err(|e| GovernanceError::Storage(format!("decode: {}", e)))
}

pub fn put_proposal(batch: &mut WriteBatch, proposal: &Proposal) -> Result<(), GovernanceError> {
    batch.put(Column::Proposals, proposal_key(proposal.id), encode(proposal)?);
    Ok(())
}

pub fn put_ballot(batch: &mut WriteBatch, ballot: &Ballot) -> Result<(), GovernanceError> {
    batch.put(
        Column::Ballots,
        ballot_key(&ballot.voter, ballot.proposal),
        encode(ballot)?,
    );
    Ok(())
}

pub fn put_account(batch: &mut WriteBatch, account: &VoterAccount) -> Result<(), GovernanceError> {
    batch.put(Column::StakeLedger, voter_key(&account.voter), encode(account)?);
    Ok(())
}

pub fn put_delegation(batch: &mut WriteBatch, delegation: &Delegation) -> Result<(), GovernanceError> {
    batch.put(
        Column::Delegations,
        voter_key(&delegation.delegator),
        encode(delegation)?,
    );
    Ok(())
}

pub fn delete_delegation(batch: &mut WriteBatch, delegator: &VoterId) {
    batch.delete(Column::Delegations, voter_key(delegator));
}

pub fn put_reward_pool(batch: &mut WriteBatch, pool: Amount) -> Result<(), GovernanceError> {
    batch.put(Column::Meta, REWARD_POOL_KEY, encode(&pool)?);
    Ok(())
}

/// Everything needed to rebuild the engine's in-memory state.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub proposals: Vec<ProposalRecord>,
    pub accounts: Vec<VoterAccount>,
    pub delegations: Vec<Delegation>,
    pub reward_pool: Amount,
    /// One past the highest lock id referenced by any record
    pub next_lock: LockId,
}

/// Read every column of `store`.
pub fn load(store: &dyn KeyValueStore) -> Result<Snapshot, GovernanceError> {
    let mut records: BTreeMap<ProposalId, ProposalRecord> = BTreeMap::new();
    for (_, value) in store.scan(Column::Proposals)? {
        let proposal: Proposal = decode(&value)?;
        records.insert(proposal.id, ProposalRecord::new(proposal));
    }

    let mut highest_lock = 0u64;
    for (_, value) in store.scan(Column::Ballots)? {
        let ballot: Ballot = decode(&value)?;
        if let Some(lock) = ballot.lock {
            highest_lock = highest_lock.max(lock.get());
        }
        match records.get_mut(&ballot.proposal) {
            Some(record) => {
                record.ballots.insert(ballot.voter.clone(), ballot);
            }
            None => {
                warn!(proposal = %ballot.proposal, voter = %ballot.voter, "ballot without proposal");
            }
        }
    }

    let accounts = store
        .scan(Column::StakeLedger)?
        .iter()
        .map(|(_, value)| decode::<VoterAccount>(value))
        .collect::<Result<Vec<_>, _>>()?;
    for account in &accounts {
        if let Some(lock) = account.locks.keys().next_back() {
            highest_lock = highest_lock.max(lock.get());
        }
    }

    let delegations = store
        .scan(Column::Delegations)?
        .iter()
        .map(|(_, value)| decode::<Delegation>(value))
        .collect::<Result<Vec<_>, _>>()?;

    let reward_pool = match store.get(Column::Meta, REWARD_POOL_KEY)? {
        Some(bytes) => decode(&bytes)?,
        None => Amount::ZERO,
    };

    Ok(Snapshot {
        proposals: records.into_values().collect(),
        accounts,
        delegations,
        reward_pool,
        next_lock: LockId::new(highest_lock.saturating_add(1)),
    })
}
