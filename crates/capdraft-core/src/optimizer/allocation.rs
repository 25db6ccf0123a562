// Per-position dollar targets derived from fixed shares of the budget.

use std::collections::BTreeMap;

use crate::optimizer::composition::RosterComposition;
use crate::player::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetAllocation {
    dollars: BTreeMap<Position, f64>,
}

impl BudgetAllocation {
    /// Split `budget` by `shares` (e.g. RB 0.42 -> $84 of $200).
    pub fn from_shares(shares: &BTreeMap<Position, f64>, budget: u32) -> Self {
        let dollars = shares
            .iter()
            .map(|(&pos, &share)| (pos, share * budget as f64))
            .collect();
        BudgetAllocation { dollars }
    }

    pub fn position_total(&self, pos: Position) -> f64 {
        self.dollars.get(&pos).copied().unwrap_or(0.0)
    }

    /// Target spend for one dedicated slot, never below $1.
    pub fn slot_target(&self, pos: Position, composition: &RosterComposition) -> f64 {
        let slots = composition.required(pos);
        if slots == 0 {
            return 1.0;
        }
        (self.position_total(pos) / slots as f64).max(1.0)
    }
}
