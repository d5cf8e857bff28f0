//! Liquid democracy delegation.
//!
//! Each voter may delegate a fraction of their voting power to one other
//! voter. Delegations are transitive: power delegated to Bob is passed on (in
//! Bob's proportion) when Bob delegates to Charlie. The graph is kept acyclic
//! at insertion time, and power resolution stops following chains after
//! `max_depth` hops.

use crate::config::DEFAULT_MAX_DELEGATION_DEPTH;
use crate::error::GovernanceError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tessera_types::{Amount, BasisPoints, Timestamp, VoterId};

/// Delegation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Delegator (who is delegating)
    pub delegator: VoterId,
    /// Delegate (who receives voting power)
    pub delegate: VoterId,
    /// Share of the delegator's power passed on
    pub fraction: BasisPoints,
    pub created_at: Timestamp,
}

/// Parse a raw basis-point fraction, accepting `1..=10000`.
pub fn parse_fraction(bps: u32) -> Result<BasisPoints, GovernanceError> {
    if bps == 0 {
        return Err(GovernanceError::InvalidFraction(bps));
    }
    BasisPoints::new(bps).map_err(|_| GovernanceError::InvalidFraction(bps))
}

/// Delegation graph managing all delegations.
#[derive(Debug)]
pub struct DelegationGraph {
    /// delegator -> delegation (at most one outgoing edge)
    edges: HashMap<VoterId, Delegation>,
    /// delegate -> delegators (reverse lookup)
    reverse: HashMap<VoterId, BTreeSet<VoterId>>,
    max_depth: usize,
}

impl Default for DelegationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DelegationGraph {
    pub fn new() -> Self {
        Self {
            edges: HashMap::new(),
            reverse: HashMap::new(),
            max_depth: DEFAULT_MAX_DELEGATION_DEPTH,
        }
    }

    /// Create with custom max depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Rebuild a graph from persisted edges. Edges that would close a cycle
    /// are dropped.
    pub fn restore(delegations: impl IntoIterator<Item = Delegation>, max_depth: usize) -> Self {
        let mut graph = Self::new().with_max_depth(max_depth);
        for delegation in delegations {
            if graph.check(&delegation.delegator, &delegation.delegate).is_ok() {
                graph.install(delegation);
            }
        }
        graph
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Delegate `fraction` of `from`'s power to `to`, replacing any existing
    /// outgoing delegation of `from`.
    pub fn delegate(
        &mut self,
        from: &VoterId,
        to: &VoterId,
        fraction: BasisPoints,
        created_at: Timestamp,
    ) -> Result<Option<Delegation>, GovernanceError> {
        self.delegate_with(from, to, fraction, created_at, |_| Ok(()))
    }

    /// Like [`delegate`](Self::delegate), but the new edge is only installed
    /// once `commit` accepts it.
    pub fn delegate_with(
        &mut self,
        from: &VoterId,
        to: &VoterId,
        fraction: BasisPoints,
        created_at: Timestamp,
        commit: impl FnOnce(&Delegation) -> Result<(), GovernanceError>,
    ) -> Result<Option<Delegation>, GovernanceError> {
        if fraction.is_zero() {
            return Err(GovernanceError::InvalidFraction(0));
        }
        self.check(from, to)?;

        let delegation = Delegation {
            delegator: from.clone(),
            delegate: to.clone(),
            fraction,
            created_at,
        };
        commit(&delegation)?;

        let previous = self.remove(from);
        self.install(delegation);
        Ok(previous)
    }

    /// Remove `from`'s outgoing delegation. Ballots already cast are not
    /// affected.
    pub fn revoke(&mut self, from: &VoterId) -> Option<Delegation> {
        self.remove(from)
    }

    /// Like [`revoke`](Self::revoke), but only removes the edge once `commit`
    /// accepts the removal.
    pub fn revoke_with(
        &mut self,
        from: &VoterId,
        commit: impl FnOnce(&Delegation) -> Result<(), GovernanceError>,
    ) -> Result<Option<Delegation>, GovernanceError> {
        let Some(existing) = self.edges.get(from) else {
            return Ok(None);
        };
        commit(existing)?;
        Ok(self.remove(from))
    }

    /// Reject self-delegation and edges that would close a cycle.
    fn check(&self, from: &VoterId, to: &VoterId) -> Result<(), GovernanceError> {
        if from == to {
            return Err(GovernanceError::SelfDelegation);
        }
        if self.reaches(to, from) {
            return Err(GovernanceError::CycleDetected {
                delegator: from.clone(),
                delegate: to.clone(),
            });
        }
        Ok(())
    }

    /// Whether following outgoing edges from `start` arrives at `target`.
    /// The walk is not depth-limited.
    fn reaches(&self, start: &VoterId, target: &VoterId) -> bool {
        let mut visited = HashSet::new();
        let mut current = start;
        while let Some(edge) = self.edges.get(current) {
            if &edge.delegate == target {
                return true;
            }
            if !visited.insert(current) {
                break;
            }
            current = &edge.delegate;
        }
        false
    }

    fn install(&mut self, delegation: Delegation) {
        self.reverse
            .entry(delegation.delegate.clone())
            .or_default()
            .insert(delegation.delegator.clone());
        self.edges.insert(delegation.delegator.clone(), delegation);
    }

    fn remove(&mut self, from: &VoterId) -> Option<Delegation> {
        let delegation = self.edges.remove(from)?;
        if let Some(delegators) = self.reverse.get_mut(&delegation.delegate) {
            delegators.remove(from);
            if delegators.is_empty() {
                self.reverse.remove(&delegation.delegate);
            }
        }
        Some(delegation)
    }

    /// Outgoing delegation of a voter.
    pub fn delegate_of(&self, voter: &VoterId) -> Option<&Delegation> {
        self.edges.get(voter)
    }

    /// Direct delegators of a voter, ordered by id.
    pub fn delegators_of(&self, voter: &VoterId) -> Vec<VoterId> {
        self.reverse
            .get(voter)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Get all transitive delegators (including indirect).
    pub fn all_delegators(&self, voter: &VoterId) -> Vec<VoterId> {
        let mut result = Vec::new();
        let mut to_process = vec![voter.clone()];
        let mut visited = HashSet::new();
        visited.insert(voter.clone());

        while let Some(current) = to_process.pop() {
            for delegator in self.delegators_of(&current) {
                if visited.insert(delegator.clone()) {
                    result.push(delegator.clone());
                    to_process.push(delegator);
                }
            }
        }

        result.sort();
        result
    }

    /// All edges, ordered by delegator.
    pub fn delegations(&self) -> Vec<Delegation> {
        let mut all: Vec<_> = self.edges.values().cloned().collect();
        all.sort_by(|a, b| a.delegator.cmp(&b.delegator));
        all
    }

    /// Effective voting power of `voter`.
    ///
    /// Own base power plus everything delegated in, transitively, minus the
    /// share the voter delegates out. Delegators more than `max_depth` hops
    /// away contribute nothing.
    pub fn effective_power(&self, voter: &VoterId, base: impl Fn(&VoterId) -> Amount) -> Amount {
        let mut visited = HashSet::new();
        visited.insert(voter.clone());
        let inbound = self.inbound_power(voter, 0, &base, &mut visited);

        match self.edges.get(voter) {
            Some(edge) => edge.fraction.complement().apply(inbound),
            None => inbound,
        }
    }

    /// Base power of `voter` plus the delegated share of each delegator's own
    /// inbound power.
    fn inbound_power(
        &self,
        voter: &VoterId,
        depth: usize,
        base: &impl Fn(&VoterId) -> Amount,
        visited: &mut HashSet<VoterId>,
    ) -> Amount {
        let mut total = base(voter);
        if depth >= self.max_depth {
            return total;
        }
        let Some(delegators) = self.reverse.get(voter) else {
            return total;
        };
        for delegator in delegators {
            if !visited.insert(delegator.clone()) {
                continue;
            }
            let Some(edge) = self.edges.get(delegator) else {
                continue;
            };
            let upstream = self.inbound_power(delegator, depth + 1, base, visited);
            total = total.saturating_add(edge.fraction.apply(upstream));
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(name: &str) -> VoterId {
        VoterId::new(name).unwrap()
    }

    fn bps(value: u32) -> BasisPoints {
        BasisPoints::new(value).unwrap()
    }

    fn now() -> Timestamp {
        Timestamp::from_secs(1_000)
    }

    fn balances(pairs: &[(&str, u128)]) -> impl Fn(&VoterId) -> Amount {
        let map: HashMap<VoterId, Amount> = pairs
            .iter()
            .map(|(name, amount)| (voter(name), Amount::new(*amount)))
            .collect();
        move |v| map.get(v).copied().unwrap_or(Amount::ZERO)
    }

    #[test]
    fn test_parse_fraction_bounds() {
        assert!(matches!(parse_fraction(0), Err(GovernanceError::InvalidFraction(0))));
        assert!(matches!(
            parse_fraction(10_001),
            Err(GovernanceError::InvalidFraction(10_001))
        ));
        assert_eq!(parse_fraction(10_000).unwrap(), BasisPoints::MAX);
        assert_eq!(parse_fraction(1).unwrap().get(), 1);
    }

    #[test]
    fn test_self_delegation_fails() {
        let mut graph = DelegationGraph::new();
        let alice = voter("alice");
        let result = graph.delegate(&alice, &alice, BasisPoints::MAX, now());
        assert!(matches!(result, Err(GovernanceError::SelfDelegation)));
    }

    #[test]
    fn test_cycle_detection_does_not_mutate() {
        let mut graph = DelegationGraph::new();
        let (alice, bob, charlie) = (voter("alice"), voter("bob"), voter("charlie"));

        // Alice -> Bob -> Charlie
        graph.delegate(&alice, &bob, BasisPoints::MAX, now()).unwrap();
        graph.delegate(&bob, &charlie, BasisPoints::MAX, now()).unwrap();
        let before = graph.delegations();

        // Charlie -> Alice would create cycle
        let result = graph.delegate(&charlie, &alice, BasisPoints::MAX, now());
        assert!(matches!(result, Err(GovernanceError::CycleDetected { .. })));
        assert_eq!(graph.delegations(), before);
        assert!(graph.delegate_of(&charlie).is_none());
    }

    #[test]
    fn test_redelegation_replaces_edge() {
        let mut graph = DelegationGraph::new();
        let (alice, bob, charlie) = (voter("alice"), voter("bob"), voter("charlie"));

        graph.delegate(&alice, &bob, BasisPoints::MAX, now()).unwrap();
        let previous = graph.delegate(&alice, &charlie, bps(5_000), now()).unwrap();

        assert_eq!(previous.map(|d| d.delegate), Some(bob.clone()));
        assert_eq!(graph.delegate_of(&alice).map(|d| &d.delegate), Some(&charlie));
        assert!(graph.delegators_of(&bob).is_empty());
        assert_eq!(graph.delegators_of(&charlie), vec![alice]);
    }

    #[test]
    fn test_revoke() {
        let mut graph = DelegationGraph::new();
        let (alice, bob) = (voter("alice"), voter("bob"));

        graph.delegate(&alice, &bob, BasisPoints::MAX, now()).unwrap();
        assert!(graph.revoke(&alice).is_some());
        assert!(graph.revoke(&alice).is_none());
        assert!(graph.is_empty());
        assert!(graph.delegators_of(&bob).is_empty());
    }

    #[test]
    fn test_failed_commit_keeps_graph() {
        let mut graph = DelegationGraph::new();
        let (alice, bob) = (voter("alice"), voter("bob"));

        let result = graph.delegate_with(&alice, &bob, BasisPoints::MAX, now(), |_| {
            Err(GovernanceError::Storage("offline".to_string()))
        });
        assert!(result.is_err());
        assert!(graph.is_empty());

        graph.delegate(&alice, &bob, BasisPoints::MAX, now()).unwrap();
        let result = graph.revoke_with(&alice, |_| Err(GovernanceError::Storage("offline".to_string())));
        assert!(result.is_err());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_full_delegation_moves_power() {
        let mut graph = DelegationGraph::new();
        let (alice, bob) = (voter("alice"), voter("bob"));
        let base = balances(&[("alice", 100), ("bob", 50)]);

        graph.delegate(&alice, &bob, BasisPoints::MAX, now()).unwrap();
        assert_eq!(graph.effective_power(&bob, &base), Amount::new(150));
        assert_eq!(graph.effective_power(&alice, &base), Amount::ZERO);
    }

    #[test]
    fn test_partial_delegation_splits_power() {
        let mut graph = DelegationGraph::new();
        let (alice, bob) = (voter("alice"), voter("bob"));
        let base = balances(&[("alice", 100), ("bob", 50)]);

        graph.delegate(&alice, &bob, bps(2_500), now()).unwrap();
        assert_eq!(graph.effective_power(&bob, &base), Amount::new(75));
        assert_eq!(graph.effective_power(&alice, &base), Amount::new(75));
    }

    #[test]
    fn test_transitive_delegation() {
        let mut graph = DelegationGraph::new();
        let (alice, bob, charlie) = (voter("alice"), voter("bob"), voter("charlie"));
        let base = balances(&[("alice", 100), ("bob", 40), ("charlie", 10)]);

        // Alice gives half to Bob, Bob passes everything on to Charlie
        graph.delegate(&alice, &bob, bps(5_000), now()).unwrap();
        graph.delegate(&bob, &charlie, BasisPoints::MAX, now()).unwrap();

        assert_eq!(graph.effective_power(&charlie, &base), Amount::new(100));
        assert_eq!(graph.effective_power(&bob, &base), Amount::ZERO);
        assert_eq!(graph.effective_power(&alice, &base), Amount::new(50));
        assert_eq!(graph.all_delegators(&charlie), vec![alice, bob]);
    }

    #[test]
    fn test_depth_limit_stops_accumulating() {
        let mut graph = DelegationGraph::new().with_max_depth(3);
        let names: Vec<String> = (0..6).map(|i| format!("v{}", i)).collect();
        let pairs: Vec<(&str, u128)> = names.iter().map(|n| (n.as_str(), 1)).collect();
        let base = balances(&pairs);

        // v0 -> v1 -> ... -> v5
        for pair in names.windows(2) {
            graph
                .delegate(&voter(&pair[0]), &voter(&pair[1]), BasisPoints::MAX, now())
                .unwrap();
        }

        // v5 counts itself plus v4, v3 and v2; v1 and v0 are beyond 3 hops
        assert_eq!(graph.effective_power(&voter("v5"), &base), Amount::new(4));
    }

    #[test]
    fn test_restore_drops_cycles() {
        let (alice, bob) = (voter("alice"), voter("bob"));
        let edges = vec![
            Delegation {
                delegator: alice.clone(),
                delegate: bob.clone(),
                fraction: BasisPoints::MAX,
                created_at: now(),
            },
            Delegation {
                delegator: bob.clone(),
                delegate: alice.clone(),
                fraction: BasisPoints::MAX,
                created_at: now(),
            },
        ];
        let graph = DelegationGraph::restore(edges, 8);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.delegate_of(&alice).map(|d| &d.delegate), Some(&bob));
    }
}
