//! Stake ledger.
//!
//! Tracks each voter's balance and the stake locked behind open ballots.
//! Locked stake always stays inside the balance, so `available = balance -
//! locked` can never go negative. Forfeited stake is moved into a reward pool
//! and is never spent by the engine.
//!
//! Mutations go through [`StakeLedger::transact`]: the closure works on a copy
//! of the account and the copy is only installed after the commit callback
//! (normally a durable write) succeeds.

use crate::error::GovernanceError;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_types::{Amount, BasisPoints, LockId, VoterId};
use tracing::debug;

/// Reputation given to a voter on first interaction.
pub const INITIAL_REPUTATION: u8 = 50;
pub const MAX_REPUTATION: u8 = 100;

/// What happens to a lock when its proposal settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    RefundFull,
    /// Refund this fraction, forfeit the rest
    RefundPartial(BasisPoints),
    Forfeit,
}

impl SettlementOutcome {
    /// Split a locked amount into `(refunded, forfeited)`.
    pub fn split(&self, amount: Amount) -> (Amount, Amount) {
        let refunded = match self {
            SettlementOutcome::RefundFull => amount,
            SettlementOutcome::RefundPartial(fraction) => fraction.apply(amount),
            SettlementOutcome::Forfeit => Amount::ZERO,
        };
        (refunded, amount.saturating_sub(refunded))
    }
}

/// A voter's stake position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterAccount {
    pub voter: VoterId,
    pub balance: Amount,
    /// Sum of `locks`
    pub locked: Amount,
    pub locks: BTreeMap<LockId, Amount>,
    pub reputation: u8,
    pub archived: bool,
}

impl VoterAccount {
    pub fn new(voter: VoterId) -> Self {
        Self {
            voter,
            balance: Amount::ZERO,
            locked: Amount::ZERO,
            locks: BTreeMap::new(),
            reputation: INITIAL_REPUTATION,
            archived: false,
        }
    }

    pub fn available(&self) -> Amount {
        self.balance.saturating_sub(self.locked)
    }

    pub fn deposit(&mut self, amount: Amount) -> Result<Amount, GovernanceError> {
        self.ensure_active()?;
        self.balance = self.balance.try_add(amount)?;
        Ok(self.balance)
    }

    /// Withdraw unlocked stake. Locked stake is never withdrawable.
    pub fn withdraw(&mut self, amount: Amount) -> Result<Amount, GovernanceError> {
        let available = self.available();
        if amount > available {
            return Err(GovernanceError::InsufficientStake {
                voter: self.voter.clone(),
                requested: amount,
                available,
            });
        }
        self.balance = self.balance.try_sub(amount)?;
        Ok(self.balance)
    }

    pub fn add_lock(&mut self, lock: LockId, amount: Amount) -> Result<(), GovernanceError> {
        self.ensure_active()?;
        let available = self.available();
        if amount > available {
            return Err(GovernanceError::InsufficientStake {
                voter: self.voter.clone(),
                requested: amount,
                available,
            });
        }
        self.locked = self.locked.try_add(amount)?;
        self.locks.insert(lock, amount);
        Ok(())
    }

    /// Drop a lock, returning its amount to the available balance.
    pub fn remove_lock(&mut self, lock: LockId) -> Option<Amount> {
        let amount = self.locks.remove(&lock)?;
        self.locked = self.locked.saturating_sub(amount);
        Some(amount)
    }

    /// Settle a lock, returning `(refunded, forfeited)`. `None` if the lock
    /// was already settled or released.
    pub fn settle_lock(
        &mut self,
        lock: LockId,
        outcome: SettlementOutcome,
    ) -> Option<(Amount, Amount)> {
        let amount = self.remove_lock(lock)?;
        let (refunded, forfeited) = outcome.split(amount);
        self.balance = self.balance.saturating_sub(forfeited);
        Some((refunded, forfeited))
    }

    /// Move reputation by `delta`, clamped to `0..=100`.
    pub fn adjust_reputation(&mut self, delta: i32) -> u8 {
        let next = (self.reputation as i32 + delta).clamp(0, MAX_REPUTATION as i32);
        self.reputation = next as u8;
        self.reputation
    }

    fn ensure_active(&self) -> Result<(), GovernanceError> {
        if self.archived {
            return Err(GovernanceError::VoterArchived(self.voter.clone()));
        }
        Ok(())
    }
}

/// Effect of settling one lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSettlement {
    pub voter: VoterId,
    pub refunded: Amount,
    pub forfeited: Amount,
    pub reward_pool: Amount,
}

/// Per-voter stake ledger. Each account is serialized by its own mutex.
#[derive(Debug)]
pub struct StakeLedger {
    accounts: DashMap<VoterId, Arc<Mutex<VoterAccount>>>,
    lock_index: DashMap<LockId, VoterId>,
    next_lock: AtomicU64,
    reward_pool: Mutex<Amount>,
}

impl Default for StakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl StakeLedger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            lock_index: DashMap::new(),
            next_lock: AtomicU64::new(1),
            reward_pool: Mutex::new(Amount::ZERO),
        }
    }

    /// Rebuild a ledger from persisted accounts.
    ///
    /// `next_lock` must be greater than every lock id handed out before,
    /// including locks that have since been settled.
    pub fn restore(
        accounts: impl IntoIterator<Item = VoterAccount>,
        next_lock: LockId,
        reward_pool: Amount,
    ) -> Self {
        let ledger = Self::new();
        let mut highest = next_lock.get().max(1);
        for account in accounts {
            for lock in account.locks.keys() {
                ledger.lock_index.insert(*lock, account.voter.clone());
                highest = highest.max(lock.get().saturating_add(1));
            }
            ledger
                .accounts
                .insert(account.voter.clone(), Arc::new(Mutex::new(account)));
        }
        ledger.next_lock.store(highest, Ordering::SeqCst);
        *ledger.reward_pool.lock() = reward_pool;
        ledger
    }

    /// Reserve a fresh lock id.
    pub fn allocate_lock_id(&self) -> LockId {
        LockId::new(self.next_lock.fetch_add(1, Ordering::SeqCst))
    }

    fn handle(&self, voter: &VoterId) -> Option<Arc<Mutex<VoterAccount>>> {
        self.accounts.get(voter).map(|entry| entry.value().clone())
    }

    fn handle_or_create(&self, voter: &VoterId) -> Arc<Mutex<VoterAccount>> {
        self.accounts
            .entry(voter.clone())
            .or_insert_with(|| Arc::new(Mutex::new(VoterAccount::new(voter.clone()))))
            .value()
            .clone()
    }

    /// Run `f` against a copy of the voter's account and install the copy
    /// once `commit` accepts it. The account is created on first use.
    pub fn transact<T>(
        &self,
        voter: &VoterId,
        f: impl FnOnce(&mut VoterAccount) -> Result<T, GovernanceError>,
        commit: impl FnOnce(&VoterAccount, &T) -> Result<(), GovernanceError>,
    ) -> Result<T, GovernanceError> {
        let handle = self.handle_or_create(voter);
        let mut account = handle.lock();
        let mut next = account.clone();
        let value = f(&mut next)?;
        commit(&next, &value)?;

        for lock in account.locks.keys() {
            if !next.locks.contains_key(lock) {
                self.lock_index.remove(lock);
            }
        }
        for lock in next.locks.keys() {
            self.lock_index.insert(*lock, voter.clone());
        }
        *account = next;
        Ok(value)
    }

    pub fn account(&self, voter: &VoterId) -> Option<VoterAccount> {
        self.handle(voter).map(|h| h.lock().clone())
    }

    /// All accounts ordered by voter id.
    pub fn accounts(&self) -> Vec<VoterAccount> {
        let handles: Vec<_> = self.accounts.iter().map(|e| e.value().clone()).collect();
        let mut accounts: Vec<_> = handles.iter().map(|h| h.lock().clone()).collect();
        accounts.sort_by(|a, b| a.voter.cmp(&b.voter));
        accounts
    }

    pub fn balance(&self, voter: &VoterId) -> Amount {
        self.handle(voter)
            .map(|h| h.lock().balance)
            .unwrap_or(Amount::ZERO)
    }

    /// Balance minus locked stake. Unknown voters have nothing available.
    pub fn available_stake(&self, voter: &VoterId) -> Amount {
        self.handle(voter)
            .map(|h| h.lock().available())
            .unwrap_or(Amount::ZERO)
    }

    pub fn is_archived(&self, voter: &VoterId) -> bool {
        self.handle(voter).map(|h| h.lock().archived).unwrap_or(false)
    }

    /// Amount held by a lock, if it is still open.
    pub fn lock_amount(&self, lock: LockId) -> Option<Amount> {
        let voter = self.lock_index.get(&lock).map(|e| e.value().clone())?;
        let handle = self.handle(&voter)?;
        let amount = handle.lock().locks.get(&lock).copied();
        amount
    }

    /// Sum of balances of active voters. Snapshotted as the eligible power
    /// of percentage quorums.
    pub fn total_stake(&self) -> Amount {
        self.accounts()
            .iter()
            .filter(|a| !a.archived)
            .map(|a| a.balance)
            .sum()
    }

    pub fn reward_pool(&self) -> Amount {
        *self.reward_pool.lock()
    }

    pub fn deposit(&self, voter: &VoterId, amount: Amount) -> Result<Amount, GovernanceError> {
        self.transact(voter, |a| a.deposit(amount), |_, _| Ok(()))
    }

    pub fn withdraw(&self, voter: &VoterId, amount: Amount) -> Result<Amount, GovernanceError> {
        self.transact(voter, |a| a.withdraw(amount), |_, _| Ok(()))
    }

    pub fn archive(&self, voter: &VoterId) -> Result<(), GovernanceError> {
        self.transact(voter, |a| {
            a.archived = true;
            Ok(())
        }, |_, _| Ok(()))
    }

    pub fn adjust_reputation(&self, voter: &VoterId, delta: i32) -> Result<u8, GovernanceError> {
        self.transact(voter, |a| Ok(a.adjust_reputation(delta)), |_, _| Ok(()))
    }

    /// Lock `amount` of the voter's available stake.
    pub fn lock(&self, voter: &VoterId, amount: Amount) -> Result<LockId, GovernanceError> {
        let lock = self.allocate_lock_id();
        self.transact(voter, |a| a.add_lock(lock, amount), |_, _| Ok(()))?;
        debug!(%voter, %lock, %amount, "stake locked");
        Ok(lock)
    }

    /// Release a lock without any forfeiture. Releasing an unknown or
    /// already released lock does nothing.
    pub fn release(&self, lock: LockId) -> Result<Option<Amount>, GovernanceError> {
        let Some(voter) = self.lock_index.get(&lock).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        self.transact(&voter, |a| Ok(a.remove_lock(lock)), |_, _| Ok(()))
    }

    /// Apply a settlement outcome to a lock. Terminal: a second call on the
    /// same lock returns `None` and changes nothing.
    pub fn settle(
        &self,
        lock: LockId,
        outcome: SettlementOutcome,
    ) -> Result<Option<LockSettlement>, GovernanceError> {
        self.settle_with(lock, outcome, 0, |_, _| Ok(()))
    }

    /// Settle a lock, nudge the owner's reputation by `reputation_delta`, and
    /// hand the new account and reward pool to `commit` before installing
    /// them.
    pub fn settle_with(
        &self,
        lock: LockId,
        outcome: SettlementOutcome,
        reputation_delta: i32,
        commit: impl FnOnce(&VoterAccount, Amount) -> Result<(), GovernanceError>,
    ) -> Result<Option<LockSettlement>, GovernanceError> {
        let Some(voter) = self.lock_index.get(&lock).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let Some(handle) = self.handle(&voter) else {
            return Ok(None);
        };

        let mut account = handle.lock();
        let mut next = account.clone();
        let Some((refunded, forfeited)) = next.settle_lock(lock, outcome) else {
            return Ok(None);
        };
        if reputation_delta != 0 {
            next.adjust_reputation(reputation_delta);
        }

        let mut pool = self.reward_pool.lock();
        let next_pool = pool.try_add(forfeited)?;
        commit(&next, next_pool)?;

        *account = next;
        *pool = next_pool;
        self.lock_index.remove(&lock);
        debug!(%voter, %lock, %refunded, %forfeited, "lock settled");

        Ok(Some(LockSettlement {
            voter,
            refunded,
            forfeited,
            reward_pool: next_pool,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(name: &str) -> VoterId {
        VoterId::new(name).unwrap()
    }

    fn funded(name: &str, amount: u128) -> (StakeLedger, VoterId) {
        let ledger = StakeLedger::new();
        let v = voter(name);
        ledger.deposit(&v, Amount::new(amount)).unwrap();
        (ledger, v)
    }

    #[test]
    fn test_available_stake_unknown_voter() {
        let ledger = StakeLedger::new();
        assert_eq!(ledger.available_stake(&voter("nobody")), Amount::ZERO);
        assert!(ledger.account(&voter("nobody")).is_none());
    }

    #[test]
    fn test_lock_reduces_available() {
        let (ledger, alice) = funded("alice", 100);
        let lock = ledger.lock(&alice, Amount::new(30)).unwrap();

        assert_eq!(ledger.available_stake(&alice), Amount::new(70));
        assert_eq!(ledger.balance(&alice), Amount::new(100));
        assert_eq!(ledger.lock_amount(lock), Some(Amount::new(30)));
    }

    #[test]
    fn test_lock_insufficient_stake() {
        let (ledger, alice) = funded("alice", 10);
        let result = ledger.lock(&alice, Amount::new(16));
        assert!(matches!(
            result,
            Err(GovernanceError::InsufficientStake { requested, available, .. })
                if requested == Amount::new(16) && available == Amount::new(10)
        ));
        assert_eq!(ledger.available_stake(&alice), Amount::new(10));
    }

    #[test]
    fn test_release_is_idempotent() {
        let (ledger, alice) = funded("alice", 50);
        let lock = ledger.lock(&alice, Amount::new(20)).unwrap();

        assert_eq!(ledger.release(lock).unwrap(), Some(Amount::new(20)));
        assert_eq!(ledger.release(lock).unwrap(), None);
        assert_eq!(ledger.available_stake(&alice), Amount::new(50));
        assert_eq!(ledger.lock_amount(lock), None);
    }

    #[test]
    fn test_unknown_lock_is_noop() {
        let (ledger, alice) = funded("alice", 50);
        let never_issued = LockId::new(999);

        assert_eq!(ledger.release(never_issued).unwrap(), None);
        assert_eq!(ledger.settle(never_issued, SettlementOutcome::Forfeit).unwrap(), None);
        assert_eq!(ledger.balance(&alice), Amount::new(50));
        assert_eq!(ledger.reward_pool(), Amount::ZERO);
    }

    #[test]
    fn test_withdraw_cannot_take_locked_stake() {
        let (ledger, alice) = funded("alice", 50);
        ledger.lock(&alice, Amount::new(40)).unwrap();

        assert!(matches!(
            ledger.withdraw(&alice, Amount::new(20)),
            Err(GovernanceError::InsufficientStake { .. })
        ));
        assert_eq!(ledger.withdraw(&alice, Amount::new(10)).unwrap(), Amount::new(40));
        assert_eq!(ledger.available_stake(&alice), Amount::ZERO);
    }

    #[test]
    fn test_settle_refund_full() {
        let (ledger, alice) = funded("alice", 100);
        let lock = ledger.lock(&alice, Amount::new(40)).unwrap();

        let settled = ledger.settle(lock, SettlementOutcome::RefundFull).unwrap().unwrap();
        assert_eq!(settled.refunded, Amount::new(40));
        assert_eq!(settled.forfeited, Amount::ZERO);
        assert_eq!(ledger.balance(&alice), Amount::new(100));
        assert_eq!(ledger.reward_pool(), Amount::ZERO);
    }

    #[test]
    fn test_settle_partial_moves_to_reward_pool() {
        let (ledger, alice) = funded("alice", 100);
        let lock = ledger.lock(&alice, Amount::new(40)).unwrap();

        // Refund 75%, forfeit 25%
        let outcome = SettlementOutcome::RefundPartial(BasisPoints::new(7_500).unwrap());
        let settled = ledger.settle(lock, outcome).unwrap().unwrap();
        assert_eq!(settled.refunded, Amount::new(30));
        assert_eq!(settled.forfeited, Amount::new(10));
        assert_eq!(ledger.balance(&alice), Amount::new(90));
        assert_eq!(ledger.available_stake(&alice), Amount::new(90));
        assert_eq!(ledger.reward_pool(), Amount::new(10));
    }

    #[test]
    fn test_settle_twice_is_noop() {
        let (ledger, alice) = funded("alice", 100);
        let lock = ledger.lock(&alice, Amount::new(40)).unwrap();

        ledger.settle(lock, SettlementOutcome::Forfeit).unwrap();
        let before = ledger.accounts();
        let pool = ledger.reward_pool();

        assert_eq!(ledger.settle(lock, SettlementOutcome::Forfeit).unwrap(), None);
        assert_eq!(ledger.accounts(), before);
        assert_eq!(ledger.reward_pool(), pool);
        assert_eq!(ledger.balance(&alice), Amount::new(60));
    }

    #[test]
    fn test_failed_commit_leaves_account_untouched() {
        let (ledger, alice) = funded("alice", 100);
        let lock = ledger.allocate_lock_id();

        let result = ledger.transact(
            &alice,
            |a| a.add_lock(lock, Amount::new(60)),
            |_, _| Err(GovernanceError::Storage("disk full".to_string())),
        );
        assert!(matches!(result, Err(GovernanceError::Storage(_))));
        assert_eq!(ledger.available_stake(&alice), Amount::new(100));
        assert_eq!(ledger.lock_amount(lock), None);
    }

    #[test]
    fn test_archived_voter_cannot_deposit_or_lock() {
        let (ledger, alice) = funded("alice", 100);
        ledger.archive(&alice).unwrap();

        assert!(matches!(
            ledger.deposit(&alice, Amount::new(1)),
            Err(GovernanceError::VoterArchived(_))
        ));
        assert!(matches!(
            ledger.lock(&alice, Amount::new(1)),
            Err(GovernanceError::VoterArchived(_))
        ));
        // Still withdrawable
        assert!(ledger.withdraw(&alice, Amount::new(100)).is_ok());
        assert_eq!(ledger.total_stake(), Amount::ZERO);
    }

    #[test]
    fn test_reputation_clamped() {
        let (ledger, alice) = funded("alice", 1);
        assert_eq!(ledger.adjust_reputation(&alice, 80).unwrap(), 100);
        assert_eq!(ledger.adjust_reputation(&alice, -500).unwrap(), 0);
    }

    #[test]
    fn test_restore_keeps_lock_ids_unique() {
        let (ledger, alice) = funded("alice", 100);
        let lock = ledger.lock(&alice, Amount::new(10)).unwrap();

        let restored = StakeLedger::restore(ledger.accounts(), LockId::new(1), Amount::new(7));
        assert_eq!(restored.lock_amount(lock), Some(Amount::new(10)));
        assert!(restored.allocate_lock_id() > lock);
        assert_eq!(restored.reward_pool(), Amount::new(7));
    }

    #[test]
    fn test_total_stake() {
        let ledger = StakeLedger::new();
        ledger.deposit(&voter("a"), Amount::new(10)).unwrap();
        ledger.deposit(&voter("b"), Amount::new(32)).unwrap();
        assert_eq!(ledger.total_stake(), Amount::new(42));
    }
}
