// Derived market views: draft phase, league-wide conditions, and per-position
// scarcity.

use serde::{Deserialize, Serialize};

use crate::player::Position;

// ---------------------------------------------------------------------------
// Scarcity levels
// ---------------------------------------------------------------------------

/// Remaining quality players at a position relative to league starter demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScarcityLevel {
    Abundant,
    Normal,
    Scarce,
    Critical,
}

impl ScarcityLevel {
    /// Bucket the ratio `quality_remaining / starters_needed`.
    ///
    /// Above 2x is abundant, above 1x normal, above 0.5x scarce, otherwise
    /// critical. A position with no starter demand is always abundant.
    pub fn from_supply(quality_remaining: usize, starters_needed: usize) -> Self {
        if starters_needed == 0 {
            return ScarcityLevel::Abundant;
        }
        let ratio = quality_remaining as f64 / starters_needed as f64;
        if ratio > 2.0 {
            ScarcityLevel::Abundant
        } else if ratio > 1.0 {
            ScarcityLevel::Normal
        } else if ratio > 0.5 {
            ScarcityLevel::Scarce
        } else {
            ScarcityLevel::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScarcityLevel::Abundant => "abundant",
            ScarcityLevel::Normal => "normal",
            ScarcityLevel::Scarce => "scarce",
            ScarcityLevel::Critical => "critical",
        }
    }

    /// Scarcity component of the CVS.
    pub fn cvs_score(&self) -> f64 {
        match self {
            ScarcityLevel::Abundant => 25.0,
            ScarcityLevel::Normal => 50.0,
            ScarcityLevel::Scarce => 75.0,
            ScarcityLevel::Critical => 100.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Draft phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftPhase {
    Early,
    Middle,
    Late,
}

impl DraftPhase {
    /// Phase from the league-wide fraction of roster slots filled.
    pub fn from_fraction(filled: f64, early_cutoff: f64, late_cutoff: f64) -> Self {
        if filled < early_cutoff {
            DraftPhase::Early
        } else if filled < late_cutoff {
            DraftPhase::Middle
        } else {
            DraftPhase::Late
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DraftPhase::Early => "early",
            DraftPhase::Middle => "middle",
            DraftPhase::Late => "late",
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots of derived state
// ---------------------------------------------------------------------------

/// League-wide spending summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub total_budget: u32,
    pub total_spent: u32,
    pub total_remaining: u32,
    pub players_drafted: usize,
    pub total_slots: usize,
    pub avg_price_per_player: f64,
    /// `avg_price_per_player / (budget / roster_size) - 1`; 0 before any pick.
    pub inflation_rate: f64,
    pub phase: DraftPhase,
}

impl Default for MarketConditions {
    fn default() -> Self {
        MarketConditions {
            total_budget: 0,
            total_spent: 0,
            total_remaining: 0,
            players_drafted: 0,
            total_slots: 0,
            avg_price_per_player: 0.0,
            inflation_rate: 0.0,
            phase: DraftPhase::Early,
        }
    }
}

impl MarketConditions {
    pub fn fraction_filled(&self) -> f64 {
        if self.total_slots == 0 {
            0.0
        } else {
            self.players_drafted as f64 / self.total_slots as f64
        }
    }
}

/// Price and supply picture for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionMarket {
    pub position: Position,
    pub drafted: usize,
    /// Mean price paid. `None` until the first pick at the position.
    pub avg_price: Option<f64>,
    /// Most recent prices, oldest first.
    pub recent_prices: Vec<u32>,
    /// `sum(price) / sum(expected value) - 1` over picks with a known value.
    pub inflation_rate: f64,
    /// Available players projected above the position's quality floor.
    pub quality_remaining: usize,
    pub starters_needed: usize,
    pub scarcity: ScarcityLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scarcity_thresholds() {
        assert_eq!(ScarcityLevel::from_supply(49, 24), ScarcityLevel::Abundant);
        assert_eq!(ScarcityLevel::from_supply(48, 24), ScarcityLevel::Normal);
        assert_eq!(ScarcityLevel::from_supply(25, 24), ScarcityLevel::Normal);
        assert_eq!(ScarcityLevel::from_supply(24, 24), ScarcityLevel::Scarce);
        assert_eq!(ScarcityLevel::from_supply(13, 24), ScarcityLevel::Scarce);
        assert_eq!(ScarcityLevel::from_supply(12, 24), ScarcityLevel::Critical);
        assert_eq!(ScarcityLevel::from_supply(0, 24), ScarcityLevel::Critical);
        assert_eq!(ScarcityLevel::from_supply(0, 0), ScarcityLevel::Abundant);
    }

    #[test]
    fn phase_cutoffs() {
        assert_eq!(DraftPhase::from_fraction(0.0, 0.25, 0.70), DraftPhase::Early);
        assert_eq!(DraftPhase::from_fraction(0.25, 0.25, 0.70), DraftPhase::Middle);
        assert_eq!(DraftPhase::from_fraction(0.69, 0.25, 0.70), DraftPhase::Middle);
        assert_eq!(DraftPhase::from_fraction(0.70, 0.25, 0.70), DraftPhase::Late);
    }

    #[test]
    fn scarcer_levels_score_higher() {
        assert!(ScarcityLevel::Critical.cvs_score() > ScarcityLevel::Scarce.cvs_score());
        assert!(ScarcityLevel::Scarce.cvs_score() > ScarcityLevel::Normal.cvs_score());
        assert!(ScarcityLevel::Normal.cvs_score() > ScarcityLevel::Abundant.cvs_score());
    }
}
