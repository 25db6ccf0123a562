// MarketSimulator: team budgets, the draft event log, per-position price
// history, and the views derived from them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::catalog::PlayerCatalog;
use crate::config::{LeagueConfig, MarketConfig, StrategyConfig};
use crate::error::DraftError;
use crate::market::conditions::{DraftPhase, MarketConditions, PositionMarket, ScarcityLevel};
use crate::market::event::{DraftEvent, DraftSnapshot, TeamBudget};
use crate::market::strategy::{NaiveSignals, ValueSignals};
use crate::market::team::{RosterEntry, TeamState};
use crate::optimizer::composition::RosterComposition;
use crate::player::{Player, Position};
use crate::valuation::ValuationContext;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Tunables the simulator reads but never changes.
#[derive(Debug, Clone)]
pub struct MarketSettings {
    pub market: MarketConfig,
    pub starters_per_team: BTreeMap<Position, usize>,
}

impl MarketSettings {
    pub fn from_config(league: &LeagueConfig, strategy: &StrategyConfig) -> Self {
        MarketSettings {
            market: strategy.market.clone(),
            starters_per_team: league.starters.clone(),
        }
    }
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self::from_config(&LeagueConfig::default(), &StrategyConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MarketState {
    budget: u32,
    composition: RosterComposition,
    /// Sorted by team id.
    teams: Vec<TeamState>,
    /// Every player known to the market, drafted or not.
    positions: HashMap<String, Position>,
    available: BTreeSet<String>,
    events: Vec<DraftEvent>,
    /// Winning prices per position, in draft order.
    price_history: BTreeMap<Position, Vec<u32>>,
}

impl MarketState {
    fn new<'a>(
        team_ids: &[String],
        budget: u32,
        composition: &RosterComposition,
        players: impl IntoIterator<Item = &'a Player>,
    ) -> Self {
        let mut ids: Vec<String> = team_ids.to_vec();
        ids.sort();
        ids.dedup();
        let teams = ids
            .into_iter()
            .map(|id| TeamState::new(id, budget, composition))
            .collect();

        let positions: HashMap<String, Position> = players
            .into_iter()
            .map(|p| (p.id.clone(), p.position))
            .collect();
        let available = positions.keys().cloned().collect();

        MarketState {
            budget,
            composition: composition.clone(),
            teams,
            positions,
            available,
            events: Vec::new(),
            price_history: BTreeMap::new(),
        }
    }

    fn team_index(&self, team_id: &str) -> Result<usize, DraftError> {
        self.teams
            .binary_search_by(|t| t.team_id.as_str().cmp(team_id))
            .map_err(|_| DraftError::UnknownTeam(team_id.to_string()))
    }

    /// Check a draft without applying it. Returns the team index and the
    /// player's position.
    fn validate(&self, player_id: &str, team_id: &str, price: u32) -> Result<(usize, Position), DraftError> {
        let team_idx = self.team_index(team_id)?;
        let position = *self
            .positions
            .get(player_id)
            .ok_or_else(|| DraftError::UnknownPlayer(player_id.to_string()))?;
        if !self.available.contains(player_id) {
            return Err(DraftError::AlreadyDrafted(player_id.to_string()));
        }
        if price == 0 {
            return Err(DraftError::InvalidPrice {
                player_id: player_id.to_string(),
                price,
            });
        }
        let team = &self.teams[team_idx];
        if team.slots_left() == 0 {
            return Err(DraftError::RosterFull {
                team_id: team_id.to_string(),
            });
        }
        let max_bid = team.max_bid();
        if price > max_bid {
            return Err(DraftError::ExceedsMaxBid {
                team_id: team_id.to_string(),
                price,
                max_bid,
            });
        }
        Ok((team_idx, position))
    }

    /// Apply a validated event. Infallible so a draft is never half-applied.
    fn commit(&mut self, team_idx: usize, event: DraftEvent) {
        self.available.remove(&event.player_id);
        self.price_history
            .entry(event.position)
            .or_default()
            .push(event.price);
        self.teams[team_idx].add(
            RosterEntry {
                player_id: event.player_id.clone(),
                position: event.position,
                price: event.price,
            },
            &self.composition,
        );
        self.events.push(event);
    }

    fn next_sequence(&self) -> u64 {
        self.events.last().map(|e| e.sequence + 1).unwrap_or(1)
    }

    fn undo_at(&mut self, idx: usize) -> Result<DraftEvent, DraftError> {
        let event = &self.events[idx];
        let team_idx = self.team_index(&event.team_id)?;
        if !self.teams[team_idx].has_player(&event.player_id) {
            return Err(DraftError::NoMatchingDraft {
                player_id: event.player_id.clone(),
                team_id: event.team_id.clone(),
                price: event.price,
            });
        }

        // Price history mirrors the event order per position.
        let history_idx = self.events[..idx]
            .iter()
            .filter(|e| e.position == event.position)
            .count();

        let event = self.events.remove(idx);
        if let Some(history) = self.price_history.get_mut(&event.position) {
            if history_idx < history.len() {
                history.remove(history_idx);
            }
            if history.is_empty() {
                self.price_history.remove(&event.position);
            }
        }
        self.teams[team_idx].remove(&event.player_id, event.price, &self.composition);
        self.available.insert(event.player_id.clone());
        Ok(event)
    }

    fn slots_total(&self) -> usize {
        self.teams.len() * self.composition.size()
    }
}

// ---------------------------------------------------------------------------
// MarketSimulator
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MarketSimulator {
    settings: MarketSettings,
    state: Option<MarketState>,
    targets: BTreeMap<String, BTreeSet<String>>,
    signals: Box<dyn ValueSignals>,
}

impl MarketSimulator {
    pub fn new(settings: MarketSettings) -> Self {
        MarketSimulator {
            settings,
            state: None,
            targets: BTreeMap::new(),
            signals: Box::new(NaiveSignals),
        }
    }

    /// Swap in a different overvalued/sleeper detector.
    pub fn with_signals(mut self, signals: Box<dyn ValueSignals>) -> Self {
        self.signals = signals;
        self
    }

    /// Seed every team at `budget` with an empty roster and make `players`
    /// available. Replaces any previous draft.
    pub fn initialize<'a>(
        &mut self,
        team_ids: &[String],
        budget: u32,
        composition: &RosterComposition,
        players: impl IntoIterator<Item = &'a Player>,
    ) {
        let state = MarketState::new(team_ids, budget, composition, players);
        info!(
            "Market initialized: {} teams, ${} budget, {} slots each, {} players",
            state.teams.len(),
            budget,
            composition.size(),
            state.available.len()
        );
        self.targets.retain(|team, _| state.team_index(team).is_ok());
        self.state = Some(state);
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn state(&self) -> Result<&MarketState, DraftError> {
        self.state.as_ref().ok_or(DraftError::NotInitialized)
    }

    fn state_mut(&mut self) -> Result<&mut MarketState, DraftError> {
        self.state.as_mut().ok_or(DraftError::NotInitialized)
    }

    // --- mutations ---

    /// Record a won auction. Either every derived structure is updated or,
    /// on error, nothing is.
    pub fn record_draft(&mut self, player: &Player, team_id: &str, price: u32) -> Result<DraftEvent, DraftError> {
        let state = self.state_mut()?;
        let (team_idx, position) = match state.validate(&player.id, team_id, price) {
            Ok(v) => v,
            Err(e) => {
                warn!("Rejected draft of {} to {} for ${}: {}", player.id, team_id, price, e);
                return Err(e);
            }
        };

        let event = DraftEvent {
            sequence: state.next_sequence(),
            player_id: player.id.clone(),
            team_id: team_id.to_string(),
            position,
            price,
            expected_value: player.auction_value,
            timestamp: Utc::now(),
        };
        state.commit(team_idx, event.clone());
        info!(
            "Pick #{}: {} ({}) to {} for ${}",
            event.sequence, player.name, position, team_id, price
        );
        Ok(event)
    }

    /// Reverse the most recent draft of `player_id` to `team_id` at `price`.
    pub fn undo_draft(&mut self, player_id: &str, team_id: &str, price: u32) -> Result<DraftEvent, DraftError> {
        let state = self.state_mut()?;
        let idx = state
            .events
            .iter()
            .rposition(|e| e.player_id == player_id && e.team_id == team_id && e.price == price)
            .ok_or_else(|| DraftError::NoMatchingDraft {
                player_id: player_id.to_string(),
                team_id: team_id.to_string(),
                price,
            })?;
        let event = state.undo_at(idx)?;
        info!(
            "Undid pick #{}: {} from {} (${})",
            event.sequence, event.player_id, event.team_id, event.price
        );
        Ok(event)
    }

    pub fn undo_last(&mut self) -> Result<DraftEvent, DraftError> {
        let state = self.state_mut()?;
        if state.events.is_empty() {
            return Err(DraftError::NothingToUndo);
        }
        let idx = state.events.len() - 1;
        let event = state.undo_at(idx)?;
        info!("Undid last pick: {} from {}", event.player_id, event.team_id);
        Ok(event)
    }

    /// Register the players `team_id` wants, for the nomination heuristics.
    pub fn set_targets(&mut self, team_id: &str, player_ids: impl IntoIterator<Item = String>) -> Result<(), DraftError> {
        self.state()?.team_index(team_id)?;
        let ids: BTreeSet<String> = player_ids.into_iter().collect();
        debug!("{} targets {} players", team_id, ids.len());
        self.targets.insert(team_id.to_string(), ids);
        Ok(())
    }

    // --- read access ---

    pub fn settings(&self) -> &MarketSettings {
        &self.settings
    }

    pub fn signals(&self) -> &dyn ValueSignals {
        self.signals.as_ref()
    }

    pub fn targets(&self, team_id: &str) -> Option<&BTreeSet<String>> {
        self.targets.get(team_id)
    }

    pub fn budget(&self) -> Option<u32> {
        self.state.as_ref().map(|s| s.budget)
    }

    pub fn composition(&self) -> Option<&RosterComposition> {
        self.state.as_ref().map(|s| &s.composition)
    }

    /// Teams sorted by id. Empty before `initialize`.
    pub fn teams(&self) -> &[TeamState] {
        self.state.as_ref().map(|s| s.teams.as_slice()).unwrap_or(&[])
    }

    pub fn team(&self, team_id: &str) -> Result<&TeamState, DraftError> {
        let state = self.state()?;
        Ok(&state.teams[state.team_index(team_id)?])
    }

    pub fn is_available(&self, player_id: &str) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.available.contains(player_id))
    }

    pub fn available_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.state
            .iter()
            .flat_map(|s| s.available.iter().map(String::as_str))
    }

    pub fn available_count(&self) -> usize {
        self.state.as_ref().map(|s| s.available.len()).unwrap_or(0)
    }

    pub fn events(&self) -> &[DraftEvent] {
        self.state.as_ref().map(|s| s.events.as_slice()).unwrap_or(&[])
    }

    pub fn price_history(&self, pos: Position) -> &[u32] {
        self.state
            .as_ref()
            .and_then(|s| s.price_history.get(&pos))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // --- derived views ---

    pub fn market_conditions(&self) -> MarketConditions {
        let Some(state) = &self.state else {
            return MarketConditions::default();
        };
        let total_budget = state.budget * state.teams.len() as u32;
        let total_spent: u32 = state.teams.iter().map(|t| t.spent).sum();
        let players_drafted = state.events.len();
        let total_slots = state.slots_total();

        let avg_price_per_player = if players_drafted == 0 {
            0.0
        } else {
            total_spent as f64 / players_drafted as f64
        };
        let roster_size = state.composition.size().max(1);
        let baseline = state.budget as f64 / roster_size as f64;
        let inflation_rate = if players_drafted == 0 || baseline <= 0.0 {
            0.0
        } else {
            avg_price_per_player / baseline - 1.0
        };

        let filled = if total_slots == 0 {
            0.0
        } else {
            players_drafted as f64 / total_slots as f64
        };
        let phase = DraftPhase::from_fraction(
            filled,
            self.settings.market.early_phase_cutoff,
            self.settings.market.late_phase_cutoff,
        );

        MarketConditions {
            total_budget,
            total_spent,
            total_remaining: total_budget - total_spent,
            players_drafted,
            total_slots,
            avg_price_per_player,
            inflation_rate,
            phase,
        }
    }

    pub fn phase(&self) -> DraftPhase {
        self.market_conditions().phase
    }

    /// Price and scarcity picture for every position.
    pub fn position_markets(&self, catalog: &PlayerCatalog) -> Vec<PositionMarket> {
        Position::ALL
            .iter()
            .map(|&pos| self.position_market(catalog, pos))
            .collect()
    }

    pub fn position_market(&self, catalog: &PlayerCatalog, pos: Position) -> PositionMarket {
        let empty = BTreeSet::new();
        let (prices, events, available, team_count) = match &self.state {
            Some(s) => (
                self.price_history(pos),
                s.events.as_slice(),
                &s.available,
                s.teams.len(),
            ),
            None => (&[][..], &[][..], &empty, 0),
        };

        let avg_price = if prices.is_empty() {
            None
        } else {
            Some(prices.iter().map(|&p| p as f64).sum::<f64>() / prices.len() as f64)
        };
        let window = self.settings.market.recent_window;
        let recent_prices = prices[prices.len().saturating_sub(window)..].to_vec();

        let (paid, expected) = events
            .iter()
            .filter(|e| e.position == pos)
            .filter_map(|e| e.expected_value.filter(|v| *v > 0.0).map(|v| (e.price as f64, v)))
            .fold((0.0, 0.0), |(p, x), (price, value)| (p + price, x + value));
        let inflation_rate = if expected > 0.0 { paid / expected - 1.0 } else { 0.0 };

        let floor = self.settings.market.quality_floor(pos);
        let quality_remaining = catalog
            .by_position(pos)
            .filter(|p| available.contains(&p.id) && p.projected_points > floor)
            .count();
        let starters_needed =
            self.settings.starters_per_team.get(&pos).copied().unwrap_or(0) * team_count;

        PositionMarket {
            position: pos,
            drafted: prices.len(),
            avg_price,
            recent_prices,
            inflation_rate,
            quality_remaining,
            starters_needed,
            scarcity: ScarcityLevel::from_supply(quality_remaining, starters_needed),
        }
    }

    /// The explicit context the valuation engine scores against.
    pub fn valuation_context(&self, catalog: &PlayerCatalog) -> ValuationContext {
        let Some(state) = &self.state else {
            return ValuationContext::default();
        };
        let window = self.settings.market.recent_window;
        let recent_bids = state.events[state.events.len().saturating_sub(window)..]
            .iter()
            .map(|e| e.price)
            .collect();

        ValuationContext {
            drafted_players: state.events.iter().map(|e| e.player_id.clone()).collect(),
            remaining_budgets: state
                .teams
                .iter()
                .map(|t| (t.team_id.clone(), t.remaining))
                .collect(),
            position_scarcity: self
                .position_markets(catalog)
                .into_iter()
                .map(|m| (m.position, m.scarcity))
                .collect(),
            recent_bids,
            league_inflation: Some(self.market_conditions().inflation_rate),
        }
    }

    // --- persistence ---

    pub fn snapshot(&self, catalog: &PlayerCatalog) -> Result<DraftSnapshot, DraftError> {
        let state = self.state()?;
        Ok(DraftSnapshot {
            players: catalog.players().to_vec(),
            events: state.events.clone(),
            teams: state
                .teams
                .iter()
                .map(|t| TeamBudget {
                    team_id: t.team_id.clone(),
                    budget: t.budget,
                    spent: t.spent,
                    remaining: t.remaining,
                })
                .collect(),
        })
    }

    /// Rebuild the catalog and market from a snapshot by replaying its events.
    ///
    /// The replayed budgets must match the snapshot's; on any mismatch the
    /// simulator is left untouched.
    pub fn restore(
        &mut self,
        snapshot: &DraftSnapshot,
        composition: &RosterComposition,
    ) -> Result<PlayerCatalog, DraftError> {
        let (catalog, dupes) = PlayerCatalog::from_players(snapshot.players.clone());
        if !dupes.is_empty() {
            return Err(DraftError::SnapshotMismatch(format!(
                "{} duplicate player ids",
                dupes.len()
            )));
        }
        let budget = snapshot
            .teams
            .first()
            .map(|t| t.budget)
            .ok_or_else(|| DraftError::SnapshotMismatch("snapshot has no teams".into()))?;
        if let Some(t) = snapshot.teams.iter().find(|t| t.budget != budget) {
            return Err(DraftError::SnapshotMismatch(format!(
                "team {} has budget ${}, expected ${}",
                t.team_id, t.budget, budget
            )));
        }

        let team_ids: Vec<String> = snapshot.teams.iter().map(|t| t.team_id.clone()).collect();
        let mut state = MarketState::new(&team_ids, budget, composition, catalog.players());

        for event in &snapshot.events {
            let (team_idx, position) = state
                .validate(&event.player_id, &event.team_id, event.price)
                .map_err(|e| DraftError::SnapshotMismatch(format!("event #{}: {e}", event.sequence)))?;
            if position != event.position {
                return Err(DraftError::SnapshotMismatch(format!(
                    "event #{}: {} is a {}, not a {}",
                    event.sequence, event.player_id, position, event.position
                )));
            }
            state.commit(team_idx, event.clone());
        }

        for expected in &snapshot.teams {
            let team = &state.teams[state
                .team_index(&expected.team_id)
                .map_err(|e| DraftError::SnapshotMismatch(e.to_string()))?];
            if team.spent != expected.spent || team.remaining != expected.remaining {
                return Err(DraftError::SnapshotMismatch(format!(
                    "team {} replays to spent ${}/remaining ${}, snapshot has ${}/${}",
                    team.team_id, team.spent, team.remaining, expected.spent, expected.remaining
                )));
            }
        }

        info!(
            "Restored draft: {} events, {} teams, {} players",
            state.events.len(),
            state.teams.len(),
            catalog.len()
        );
        self.targets.retain(|team, _| state.team_index(team).is_ok());
        self.state = Some(state);
        Ok(catalog)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
