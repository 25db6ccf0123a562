// Budget-constrained roster construction.

pub mod allocation;
pub mod composition;
pub mod greedy;

pub use allocation::BudgetAllocation;
pub use composition::{RosterComposition, SlotKind};
pub use greedy::{LockedPick, OptimizedRoster, RosterOptimizer, RosterPick, FILL_ORDER};
