// ValuationEngine: blends per-position tier scores into a CVS, recommends a
// bid, and memoizes results per player.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::PlayerCatalog;
use crate::config::{CvsWeights, LeagueConfig, StrategyConfig};
use crate::error::DraftError;
use crate::market::conditions::ScarcityLevel;
use crate::player::{InjuryStatus, Player, Position, Trend};
use crate::valuation::auction;
use crate::valuation::score::{
    renormalized_weights, Component, ComponentScore, Confidence, CvsScore,
};
use crate::valuation::tiers::PositionTiers;

/// Below this many scored components confidence is always low.
const MIN_COMPONENTS_FOR_CONFIDENCE: usize = 4;

// ---------------------------------------------------------------------------
// Context / result types
// ---------------------------------------------------------------------------

/// Market state an evaluation is computed against.
///
/// The default value is the pre-draft context: nothing drafted, no budgets
/// known, neutral scarcity everywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationContext {
    pub drafted_players: BTreeSet<String>,
    /// Remaining budget per team id.
    pub remaining_budgets: BTreeMap<String, u32>,
    pub position_scarcity: BTreeMap<Position, ScarcityLevel>,
    /// Most recent winning prices, oldest first.
    pub recent_bids: Vec<u32>,
    /// League inflation over every pick so far, when the market has one.
    pub league_inflation: Option<f64>,
}

impl ValuationContext {
    pub fn is_drafted(&self, player_id: &str) -> bool {
        self.drafted_players.contains(player_id)
    }

    pub fn scarcity(&self, pos: Position) -> ScarcityLevel {
        self.position_scarcity
            .get(&pos)
            .copied()
            .unwrap_or(ScarcityLevel::Normal)
    }

    /// Average price paid over the baseline slot value, minus one. Falls back
    /// to the recent winning prices when the market reported no league rate.
    pub fn inflation_rate(&self, baseline: f64) -> f64 {
        match self.league_inflation {
            Some(rate) => auction::clamp_inflation(rate),
            None => auction::price_inflation(&self.recent_bids, baseline),
        }
    }

    /// Upper bound for any bid: the richest team's remaining budget, never
    /// above `ceiling`.
    pub fn bid_cap(&self, ceiling: u32) -> u32 {
        match self.remaining_budgets.values().max() {
            Some(&richest) => richest.min(ceiling),
            None => ceiling,
        }
    }
}

/// The engine's verdict on one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub cvs: CvsScore,
    pub components: Vec<ComponentScore>,
    pub recommended_bid: u32,
    pub is_undervalued: bool,
    pub confidence: Confidence,
    /// The player was already drafted in the evaluation context.
    pub drafted: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct EngineParams {
    weights: CvsWeights,
    baseline: f64,
    max_single_bid: u32,
    league_starters: BTreeMap<Position, usize>,
}

#[derive(Debug, Clone)]
struct CachedTiers {
    key: u64,
    fingerprint: u64,
    tiers: PositionTiers,
}

/// Hit/miss counters for the evaluation memo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub tier_rebuilds: u64,
}

#[derive(Debug, Clone)]
pub struct ValuationEngine {
    params: EngineParams,
    tier_cache: HashMap<Position, CachedTiers>,
    memo: HashMap<String, (u64, Evaluation)>,
    stats: CacheStats,
}

impl ValuationEngine {
    pub fn new(league: &LeagueConfig, strategy: &StrategyConfig) -> Self {
        let league_starters = Position::ALL
            .iter()
            .map(|&pos| (pos, league.league_starters(pos)))
            .collect();
        ValuationEngine {
            params: EngineParams {
                weights: strategy.cvs_weights,
                baseline: auction::baseline_slot_value(league),
                max_single_bid: auction::max_single_bid(league),
                league_starters,
            },
            tier_cache: HashMap::new(),
            memo: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn baseline(&self) -> f64 {
        self.params.baseline
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Evaluate one player against the catalog and market context.
    ///
    /// Repeated calls with unchanged inputs return the memoized result.
    pub fn evaluate(
        &mut self,
        player: &Player,
        catalog: &PlayerCatalog,
        ctx: &ValuationContext,
    ) -> Evaluation {
        let inflation = ctx.inflation_rate(self.params.baseline);
        let cap = ctx.bid_cap(self.params.max_single_bid);
        self.evaluate_with(player, catalog, ctx, inflation, cap)
    }

    pub fn evaluate_id(
        &mut self,
        player_id: &str,
        catalog: &PlayerCatalog,
        ctx: &ValuationContext,
    ) -> Result<Evaluation, DraftError> {
        let player = catalog
            .get(player_id)
            .ok_or_else(|| DraftError::UnknownPlayer(player_id.to_string()))?;
        Ok(self.evaluate(player, catalog, ctx))
    }

    /// Evaluate every available player, best first. `Unscored` players come
    /// last; ties are broken by player id.
    pub fn evaluate_all(&mut self, catalog: &PlayerCatalog, ctx: &ValuationContext) -> Vec<Evaluation> {
        let inflation = ctx.inflation_rate(self.params.baseline);
        let cap = ctx.bid_cap(self.params.max_single_bid);

        let mut ranked: Vec<Evaluation> = catalog
            .players()
            .iter()
            .filter(|p| !ctx.is_drafted(&p.id))
            .map(|p| self.evaluate_with(p, catalog, ctx, inflation, cap))
            .collect();

        ranked.sort_by(|a, b| {
            a.cvs
                .rank_cmp(&b.cvs)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        ranked
    }

    /// Drop the memoized evaluation of one player (e.g. after a patch).
    pub fn invalidate_player(&mut self, player_id: &str) {
        self.memo.remove(player_id);
    }

    /// Drop cached tiers for a position. Memo entries for that position miss
    /// on their next lookup because the tier fingerprint is part of the key.
    pub fn invalidate_position(&mut self, pos: Position) {
        self.tier_cache.remove(&pos);
    }

    pub fn clear(&mut self) {
        self.tier_cache.clear();
        self.memo.clear();
    }

    /// Tiers currently used for `pos`, rebuilding them if stale.
    pub fn tiers_for(
        &mut self,
        pos: Position,
        catalog: &PlayerCatalog,
        ctx: &ValuationContext,
    ) -> &PositionTiers {
        self.refresh_tiers(pos, catalog, ctx);
        &self.tier_cache[&pos].tiers
    }

    fn refresh_tiers(&mut self, pos: Position, catalog: &PlayerCatalog, ctx: &ValuationContext) {
        let mut hasher = DefaultHasher::new();
        catalog.position_revision(pos).hash(&mut hasher);
        for id in &ctx.drafted_players {
            if catalog.get(id).is_some_and(|p| p.position == pos) {
                id.hash(&mut hasher);
            }
        }
        let key = hasher.finish();

        if self.tier_cache.get(&pos).is_some_and(|c| c.key == key) {
            return;
        }

        let starters = self.params.league_starters.get(&pos).copied().unwrap_or(0);
        let tiers = PositionTiers::compute(
            catalog
                .by_position(pos)
                .filter(|p| !ctx.is_drafted(&p.id)),
            starters,
        );
        let mut fp = DefaultHasher::new();
        tiers.fingerprint(&mut fp);
        let fingerprint = fp.finish();

        debug!("Rebuilt {} tiers (fingerprint {:016x})", pos, fingerprint);
        self.stats.tier_rebuilds += 1;
        self.tier_cache.insert(
            pos,
            CachedTiers {
                key,
                fingerprint,
                tiers,
            },
        );
    }

    fn evaluate_with(
        &mut self,
        player: &Player,
        catalog: &PlayerCatalog,
        ctx: &ValuationContext,
        inflation: f64,
        cap: u32,
    ) -> Evaluation {
        self.refresh_tiers(player.position, catalog, ctx);
        let cached = &self.tier_cache[&player.position];

        let scarcity = ctx.scarcity(player.position);
        let drafted = ctx.is_drafted(&player.id);
        let input_hash = input_hash(player, cached.fingerprint, scarcity, inflation, cap, drafted);

        if let Some((hash, eval)) = self.memo.get(&player.id) {
            if *hash == input_hash {
                self.stats.hits += 1;
                return eval.clone();
            }
        }

        self.stats.misses += 1;
        let eval = score_player(&self.params, player, &cached.tiers, scarcity, inflation, cap, drafted);
        self.memo
            .insert(player.id.clone(), (input_hash, eval.clone()));
        eval
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn input_hash(
    player: &Player,
    tier_fingerprint: u64,
    scarcity: ScarcityLevel,
    inflation: f64,
    cap: u32,
    drafted: bool,
) -> u64 {
    let mut h = DefaultHasher::new();
    player.position.hash(&mut h);
    player.projected_points.to_bits().hash(&mut h);
    player.auction_value.map(f64::to_bits).hash(&mut h);
    player.adp.map(f64::to_bits).hash(&mut h);
    player.strength_of_schedule.map(f64::to_bits).hash(&mut h);
    player.injury_status.hash(&mut h);
    player.trend.hash(&mut h);
    tier_fingerprint.hash(&mut h);
    scarcity.hash(&mut h);
    inflation.to_bits().hash(&mut h);
    cap.hash(&mut h);
    drafted.hash(&mut h);
    h.finish()
}

fn trend_score(trend: Trend) -> f64 {
    match trend {
        Trend::Rising => 80.0,
        Trend::Stable => 50.0,
        Trend::Falling => 20.0,
    }
}

fn score_player(
    params: &EngineParams,
    player: &Player,
    tiers: &PositionTiers,
    scarcity: ScarcityLevel,
    inflation: f64,
    cap: u32,
    drafted: bool,
) -> Evaluation {
    let raw: Vec<(Component, f64)> = [
        (Component::AuctionValue, tiers.normalize_auction_value(player.auction_value)),
        (Component::Adp, tiers.normalize_adp(player.adp)),
        (Component::ProjectedPoints, tiers.normalize_points(player.projected_points)),
        (Component::Scarcity, Some(scarcity.cvs_score())),
        (Component::Schedule, tiers.normalize_schedule(player.strength_of_schedule)),
        (Component::Trend, Some(trend_score(player.trend))),
    ]
    .into_iter()
    .filter_map(|(c, score)| score.map(|s| (c, s)))
    .collect();

    let has = |c: Component| raw.iter().any(|(rc, _)| *rc == c);
    let has_market_signal = has(Component::AuctionValue) || has(Component::Adp);
    let scoreable = has_market_signal && has(Component::ProjectedPoints);

    let available: Vec<Component> = raw.iter().map(|(c, _)| *c).collect();
    let weights = renormalized_weights(&params.weights, &available);

    let components: Vec<ComponentScore> = raw
        .iter()
        .zip(weights.iter())
        .map(|(&(component, score), &(_, weight))| ComponentScore {
            component,
            score,
            weight,
        })
        .collect();

    let cvs = if scoreable && !components.is_empty() {
        let total: f64 = components.iter().map(|c| c.score * c.weight).sum();
        CvsScore::Scored(total.clamp(0.0, 100.0))
    } else {
        CvsScore::Unscored
    };

    let recommended_bid = match cvs {
        CvsScore::Scored(score) => auction::recommended_bid(score, params.baseline, inflation, cap),
        CvsScore::Unscored => 1,
    };
    let is_undervalued = cvs.is_scored() && auction::is_undervalued(recommended_bid, player.auction_value);

    let confidence = if !cvs.is_scored()
        || player.injury_status.is_sidelined()
        || components.len() < MIN_COMPONENTS_FOR_CONFIDENCE
    {
        Confidence::Low
    } else if components.len() < Component::ALL.len()
        || matches!(
            player.injury_status,
            InjuryStatus::Questionable | InjuryStatus::Doubtful
        )
    {
        Confidence::Medium
    } else {
        Confidence::High
    };

    Evaluation {
        player_id: player.id.clone(),
        name: player.name.clone(),
        position: player.position,
        cvs,
        components,
        recommended_bid,
        is_undervalued,
        confidence,
        drafted,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
