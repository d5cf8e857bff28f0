//! Vote pricing.
//!
//! `simple`: one credit per vote. `quadratic`: `weight^2` credits, so
//! expressing a strong preference gets progressively more expensive.

use crate::error::GovernanceError;
use serde::{Deserialize, Serialize};
use tessera_types::Amount;

/// How a proposal prices requested vote weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingMode {
    #[default]
    Simple,
    Quadratic,
}

impl VotingMode {
    pub fn name(&self) -> &'static str {
        match self {
            VotingMode::Simple => "simple",
            VotingMode::Quadratic => "quadratic",
        }
    }
}

/// Stateless pricing rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostModel;

impl CostModel {
    /// Credits needed to cast `weight` votes.
    pub fn cost(mode: VotingMode, weight: u64) -> Result<Amount, GovernanceError> {
        if weight == 0 {
            return Err(GovernanceError::InvalidWeight(
                "weight must be a positive integer".to_string(),
            ));
        }
        Ok(match mode {
            VotingMode::Simple => Amount::from(weight),
            VotingMode::Quadratic => quadratic_cost(weight),
        })
    }

    /// Largest weight whose cost fits in `budget`.
    pub fn max_weight(mode: VotingMode, budget: Amount) -> u64 {
        let votes = match mode {
            VotingMode::Simple => budget.get(),
            VotingMode::Quadratic => integer_sqrt(budget.get()),
        };
        u64::try_from(votes).unwrap_or(u64::MAX)
    }
}

/// `votes^2`. Cannot overflow: `u64::MAX^2 < u128::MAX`.
pub fn quadratic_cost(votes: u64) -> Amount {
    let v = votes as u128;
    Amount::new(v * v)
}

/// Integer square root using Newton's method.
/// Returns floor(sqrt(n)).
pub fn integer_sqrt(n: u128) -> u128 {
    if n <= 1 {
        return n;
    }

    let mut x = n;
    let mut y = x / 2 + 1;

    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_cost() {
        assert_eq!(CostModel::cost(VotingMode::Simple, 1).unwrap(), Amount::new(1));
        assert_eq!(CostModel::cost(VotingMode::Simple, 70).unwrap(), Amount::new(70));
    }

    #[test]
    fn test_quadratic_cost() {
        assert_eq!(CostModel::cost(VotingMode::Quadratic, 3).unwrap(), Amount::new(9));
        assert_eq!(CostModel::cost(VotingMode::Quadratic, 4).unwrap(), Amount::new(16));
        assert_eq!(CostModel::cost(VotingMode::Quadratic, 100).unwrap(), Amount::new(10_000));
    }

    #[test]
    fn test_zero_weight_rejected() {
        for mode in [VotingMode::Simple, VotingMode::Quadratic] {
            assert!(matches!(
                CostModel::cost(mode, 0),
                Err(GovernanceError::InvalidWeight(_))
            ));
        }
    }

    #[test]
    fn test_quadratic_cost_at_max_weight() {
        let cost = quadratic_cost(u64::MAX);
        assert_eq!(cost.get(), (u64::MAX as u128) * (u64::MAX as u128));
    }

    #[test]
    fn test_integer_sqrt() {
        assert_eq!(integer_sqrt(0), 0);
        assert_eq!(integer_sqrt(1), 1);
        assert_eq!(integer_sqrt(4), 2);
        assert_eq!(integer_sqrt(15), 3); // floor(sqrt(15)) = 3
        assert_eq!(integer_sqrt(16), 4);
        assert_eq!(integer_sqrt(u128::MAX), u64::MAX as u128);
    }

    #[test]
    fn test_max_weight_from_budget() {
        // With budget of 100, can cast 10 quadratic votes (10^2 = 100)
        assert_eq!(CostModel::max_weight(VotingMode::Quadratic, Amount::new(100)), 10);
        // With budget of 50, can cast 7 votes (7^2 = 49 <= 50)
        assert_eq!(CostModel::max_weight(VotingMode::Quadratic, Amount::new(50)), 7);
        assert_eq!(CostModel::max_weight(VotingMode::Simple, Amount::new(50)), 50);
        assert_eq!(CostModel::max_weight(VotingMode::Simple, Amount::MAX), u64::MAX);
    }

    #[test]
    fn test_voting_mode_serde() {
        let json = serde_json::to_string(&VotingMode::Quadratic).unwrap();
        assert_eq!(json, "\"quadratic\"");
    }

    proptest! {
        #[test]
        fn prop_quadratic_is_square(w in 1u64..=u64::MAX) {
            let cost = CostModel::cost(VotingMode::Quadratic, w).unwrap();
            prop_assert_eq!(cost.get(), (w as u128) * (w as u128));
        }

        #[test]
        fn prop_simple_is_identity(w in 1u64..=u64::MAX) {
            prop_assert_eq!(CostModel::cost(VotingMode::Simple, w).unwrap(), Amount::from(w));
        }

        #[test]
        fn prop_max_weight_is_affordable(budget in 0u128..=u64::MAX as u128) {
            let w = CostModel::max_weight(VotingMode::Quadratic, Amount::new(budget));
            prop_assert!(quadratic_cost(w).get() <= budget);
            prop_assert!(quadratic_cost(w + 1).get() > budget);
        }
    }
}
