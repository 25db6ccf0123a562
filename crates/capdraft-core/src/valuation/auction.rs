// Auction dollar conversion.
//
// Turns a composite score into a recommended bid for a salary-cap auction and
// derives the in-draft inflation rate the bid is adjusted by.

use crate::config::LeagueConfig;

/// A top score is worth this many baseline slots (budget / roster size).
const TOP_SCORE_SLOTS: f64 = 5.0;
/// Curvature of the score-to-dollars mapping. Value concentrates at the top.
const SCORE_EXPONENT: f64 = 2.5;
/// Inflation is clamped to this range before it touches a bid.
const INFLATION_FLOOR: f64 = -0.5;
const INFLATION_CEILING: f64 = 1.0;
/// A bid must clear the quoted auction value by this share to flag a bargain.
pub const UNDERVALUED_MARGIN: f64 = 0.15;

/// Dollar value of a single roster slot: `salary_cap / roster_size`.
pub fn baseline_slot_value(league: &LeagueConfig) -> f64 {
    let size = league.roster_size().max(1);
    league.salary_cap as f64 / size as f64
}

/// The most one team could ever pay for a player: the whole cap minus $1 for
/// every other slot.
pub fn max_single_bid(league: &LeagueConfig) -> u32 {
    let others = league.roster_size().saturating_sub(1) as u32;
    league.salary_cap.saturating_sub(others).max(1)
}

/// Pre-inflation dollar value of a 0-100 score.
pub fn score_to_dollars(score: f64, baseline: f64) -> f64 {
    let s = (score / 100.0).clamp(0.0, 1.0);
    (baseline * TOP_SCORE_SLOTS * s.powf(SCORE_EXPONENT)).max(1.0)
}

/// Recommended whole-dollar bid: the score's dollar value scaled by
/// `1 + inflation`, rounded, floored at $1 and capped at `cap`.
pub fn recommended_bid(score: f64, baseline: f64, inflation: f64, cap: u32) -> u32 {
    let inflation = clamp_inflation(inflation);
    let raw = score_to_dollars(score, baseline) * (1.0 + inflation);
    let cap = cap.max(1);
    (raw.round().max(1.0) as u32).min(cap)
}

pub fn clamp_inflation(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(INFLATION_FLOOR, INFLATION_CEILING)
    } else {
        0.0
    }
}

/// Inflation implied by recently paid prices: `mean(prices) / baseline - 1`.
pub fn price_inflation(prices: &[u32], baseline: f64) -> f64 {
    if prices.is_empty() || baseline <= 0.0 {
        return 0.0;
    }
    let mean = prices.iter().map(|&p| p as f64).sum::<f64>() / prices.len() as f64;
    clamp_inflation(mean / baseline - 1.0)
}

/// Whether `bid` materially exceeds the player's quoted auction value.
pub fn is_undervalued(bid: u32, auction_value: Option<f64>) -> bool {
    match auction_value {
        Some(value) => bid as f64 >= value * (1.0 + UNDERVALUED_MARGIN) + 1.0,
        None => false,
    }
}
