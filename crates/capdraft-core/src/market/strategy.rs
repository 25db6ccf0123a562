// Phase-dependent nomination and bidding heuristics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::PlayerCatalog;
use crate::error::DraftError;
use crate::market::conditions::DraftPhase;
use crate::market::simulator::MarketSimulator;
use crate::market::team::TeamState;
use crate::player::{Player, Position};
use crate::valuation::auction::clamp_inflation;

/// Expected overbid on a player the market overvalues.
const OVERVALUED_PREMIUM: f64 = 1.15;
/// Late-draft sleepers should go for a fraction of their baseline.
const SLEEPER_DISCOUNT: f64 = 0.70;
/// Bid ceiling headroom over the inflation-adjusted value.
const BID_HEADROOM: f64 = 1.10;
/// Bid boost when the player fills an unmet positional need.
const NEED_BOOST: f64 = 1.15;
/// Early nominations target players drafted inside the first N picks.
const EARLY_ADP_CUTOFF: f64 = 20.0;

// ---------------------------------------------------------------------------
// Value signals
// ---------------------------------------------------------------------------

/// Detects players the market is likely to overpay for, and cheap upside.
pub trait ValueSignals: fmt::Debug + Send + Sync {
    fn is_overvalued(&self, player: &Player) -> bool;
    fn is_sleeper(&self, player: &Player) -> bool;
}

/// Flags overvaluation when the quoted auction value runs 25% above what the
/// player's ADP bucket supports, and sleepers as productive late picks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveSignals;

impl ValueSignals for NaiveSignals {
    fn is_overvalued(&self, player: &Player) -> bool {
        match (player.auction_value, player.adp) {
            (Some(value), Some(adp)) => value >= 1.25 * adp_bucket_value(adp),
            _ => false,
        }
    }

    fn is_sleeper(&self, player: &Player) -> bool {
        player.projected_points > 150.0 && player.adp.is_some_and(|adp| adp > 100.0)
    }
}

/// Dollar value implied by draft position alone.
pub fn adp_bucket_value(adp: f64) -> f64 {
    match adp {
        a if a <= 10.0 => 50.0,
        a if a <= 20.0 => 40.0,
        a if a <= 36.0 => 30.0,
        a if a <= 50.0 => 22.0,
        a if a <= 75.0 => 15.0,
        a if a <= 100.0 => 10.0,
        a if a <= 150.0 => 5.0,
        _ => 1.0,
    }
}

/// Baseline price for a player: the ADP bucket, or the quoted auction value
/// when ADP is unknown, or $1.
pub fn adp_baseline_value(player: &Player) -> f64 {
    player
        .adp
        .map(adp_bucket_value)
        .or(player.auction_value)
        .unwrap_or(1.0)
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NominationKind {
    /// Early: a star the caller does not want, to drain a rival's budget.
    DrainBudget,
    /// Middle: a player the market should overpay for.
    Overvalued,
    /// Late: cheap upside, ideally one of the caller's own targets.
    Sleeper,
    /// Fallback: a mid-tier player at a position the caller has filled.
    MidTier,
    /// Fallback: the cheapest player left.
    Cheapest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominationRecommendation {
    pub player_id: String,
    pub player_name: String,
    pub position: Position,
    pub phase: DraftPhase,
    pub kind: NominationKind,
    pub expected_price: u32,
    /// The rival most likely to bid, when one was identified.
    pub likely_bidder: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRecommendation {
    pub player_id: String,
    pub team_id: String,
    pub should_bid: bool,
    pub max_bid: u32,
    pub reason: String,
}

fn whole_dollars(value: f64) -> u32 {
    value.round().max(1.0) as u32
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

impl MarketSimulator {
    /// Who to put up for auction next. Always returns a player while any
    /// remain available.
    pub fn nomination_strategy(
        &self,
        catalog: &PlayerCatalog,
        team_id: &str,
    ) -> Result<NominationRecommendation, DraftError> {
        let team = self.team(team_id)?;
        let available: Vec<&Player> = self
            .available_ids()
            .filter_map(|id| catalog.get(id))
            .collect();
        if available.is_empty() {
            return Err(DraftError::NoPlayersAvailable);
        }

        let conditions = self.market_conditions();
        let inflation = clamp_inflation(conditions.inflation_rate);
        let phase = conditions.phase;

        let pick = match phase {
            DraftPhase::Early => self.nominate_early(&available, team_id, inflation),
            DraftPhase::Middle => self.nominate_overvalued(&available),
            DraftPhase::Late => self.nominate_sleeper(&available, team_id),
        };
        let pick = match pick {
            Some(p) => p,
            None => nominate_fallback(&available, team),
        };

        let player = pick.player;
        Ok(NominationRecommendation {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            position: player.position,
            phase,
            kind: pick.kind,
            expected_price: pick.expected_price,
            likely_bidder: pick.likely_bidder,
            reason: pick.reason,
        })
    }

    /// Whether `team_id` should raise `current_bid` on a player, and how high
    /// it may go.
    pub fn bid_strategy(
        &self,
        catalog: &PlayerCatalog,
        player_id: &str,
        team_id: &str,
        current_bid: u32,
    ) -> Result<BidRecommendation, DraftError> {
        let team = self.team(team_id)?;
        let player = catalog
            .get(player_id)
            .ok_or_else(|| DraftError::UnknownPlayer(player_id.to_string()))?;

        let recommendation = |should_bid: bool, max_bid: u32, reason: String| BidRecommendation {
            player_id: player_id.to_string(),
            team_id: team_id.to_string(),
            should_bid,
            max_bid,
            reason,
        };

        if !self.is_available(player_id) {
            return Ok(recommendation(false, 0, format!("{} is already drafted", player.name)));
        }
        if team.slots_left() == 0 {
            return Ok(recommendation(false, 0, "roster is full".into()));
        }

        let base = adp_baseline_value(player);
        let inflation = clamp_inflation(self.market_conditions().inflation_rate);
        let need = team.has_need(player.position);
        let boost = if need { NEED_BOOST } else { 1.0 };
        let ceiling = base * (1.0 + inflation) * BID_HEADROOM * boost;
        let team_max = team.max_bid();
        let max_bid = (ceiling.floor().max(1.0) as u32).min(team_max);

        let should_bid = current_bid < max_bid && team.remaining >= max_bid;
        let reason = if current_bid >= team_max {
            format!("current bid ${current_bid} is at or above the team max of ${team_max}")
        } else if current_bid >= max_bid {
            format!("current bid ${current_bid} reaches the ${max_bid} value ceiling")
        } else {
            format!(
                "value ${:.0} x {:.2} inflation{} allows up to ${max_bid}",
                base,
                1.0 + inflation,
                if need { ", unmet need" } else { "" }
            )
        };

        Ok(recommendation(should_bid, max_bid, reason))
    }

    fn nominate_early<'a>(&self, available: &[&'a Player], team_id: &str, inflation: f64) -> Option<Pick<'a>> {
        let targets = self.targets(team_id);
        let mut candidates: Vec<(&'a Player, Option<&TeamState>)> = available
            .iter()
            .filter(|p| p.adp.is_some_and(|adp| adp < EARLY_ADP_CUTOFF))
            .filter(|p| !targets.is_some_and(|t| t.contains(&p.id)))
            .map(|p| (*p, self.likely_bidder(team_id, p.position)))
            .collect();

        candidates.sort_by(|(a, a_bidder), (b, b_bidder)| {
            let a_money = a_bidder.map(|t| t.remaining);
            let b_money = b_bidder.map(|t| t.remaining);
            b_money
                .cmp(&a_money)
                .then_with(|| {
                    a.adp
                        .unwrap_or(f64::MAX)
                        .total_cmp(&b.adp.unwrap_or(f64::MAX))
                })
                .then_with(|| a.id.cmp(&b.id))
        });

        let (player, bidder) = candidates.into_iter().next()?;
        let expected_price = whole_dollars(adp_baseline_value(player) * (1.0 + inflation));
        let reason = match bidder {
            Some(t) => format!(
                "drain {} (${} left, needs {})",
                t.team_id, t.remaining, player.position
            ),
            None => "top player you are not targeting".to_string(),
        };
        Some(Pick {
            player,
            kind: NominationKind::DrainBudget,
            expected_price,
            likely_bidder: bidder.map(|t| t.team_id.clone()),
            reason,
        })
    }

    fn nominate_overvalued<'a>(&self, available: &[&'a Player]) -> Option<Pick<'a>> {
        let signals = self.signals();
        let value = |p: &Player| p.auction_value.unwrap_or_else(|| adp_baseline_value(p));
        let player = available
            .iter()
            .copied()
            .filter(|p| signals.is_overvalued(p))
            .max_by(|a, b| value(*a).total_cmp(&value(*b)).then_with(|| b.id.cmp(&a.id)))?;

        Some(Pick {
            player,
            kind: NominationKind::Overvalued,
            expected_price: whole_dollars(value(player) * OVERVALUED_PREMIUM),
            likely_bidder: None,
            reason: "market tends to overpay; expect a ~15% overbid".into(),
        })
    }

    fn nominate_sleeper<'a>(&self, available: &[&'a Player], team_id: &str) -> Option<Pick<'a>> {
        let signals = self.signals();
        let targets = self.targets(team_id);
        let best = |own: bool| {
            available
                .iter()
                .copied()
                .filter(|p| signals.is_sleeper(p))
                .filter(|p| !own || targets.is_some_and(|t| t.contains(&p.id)))
                .max_by(|a, b| {
                    a.projected_points
                        .total_cmp(&b.projected_points)
                        .then_with(|| b.id.cmp(&a.id))
                })
        };
        let (player, own) = match best(true) {
            Some(p) => (p, true),
            None => (best(false)?, false),
        };

        Some(Pick {
            player,
            kind: NominationKind::Sleeper,
            expected_price: whole_dollars(adp_baseline_value(player) * SLEEPER_DISCOUNT),
            likely_bidder: None,
            reason: if own {
                "your sleeper target while budgets are thin".into()
            } else {
                "late sleeper while budgets are thin".into()
            },
        })
    }

    /// The rival with the most money left that still needs `pos`.
    fn likely_bidder(&self, team_id: &str, pos: Position) -> Option<&TeamState> {
        self.teams()
            .iter()
            .filter(|t| t.team_id != team_id && t.has_need(pos) && t.max_bid() > 0)
            .max_by(|a, b| {
                a.remaining
                    .cmp(&b.remaining)
                    .then_with(|| b.team_id.cmp(&a.team_id))
            })
    }
}

struct Pick<'a> {
    player: &'a Player,
    kind: NominationKind,
    expected_price: u32,
    likely_bidder: Option<String>,
    reason: String,
}

fn nominate_fallback<'a>(available: &[&'a Player], team: &TeamState) -> Pick<'a> {
    let mut filled: Vec<&'a Player> = available
        .iter()
        .copied()
        .filter(|p| team.count_at(p.position) > 0)
        .collect();

    if !filled.is_empty() {
        filled.sort_by(|a, b| {
            b.projected_points
                .total_cmp(&a.projected_points)
                .then_with(|| a.id.cmp(&b.id))
        });
        let player = filled[filled.len() / 2];
        return Pick {
            player,
            kind: NominationKind::MidTier,
            expected_price: player.market_price(),
            likely_bidder: None,
            reason: format!("mid-tier {} where your roster is covered", player.position),
        };
    }

    // `available` is never empty here.
    let player = available
        .iter()
        .copied()
        .min_by(|a, b| {
            a.market_price()
                .cmp(&b.market_price())
                .then_with(|| b.projected_points.total_cmp(&a.projected_points))
                .then_with(|| a.id.cmp(&b.id))
        })
        .unwrap_or(available[0]);
    Pick {
        player,
        kind: NominationKind::Cheapest,
        expected_price: player.market_price(),
        likely_bidder: None,
        reason: "cheapest player left".into(),
    }
}
