// Draft session: owns the live catalog, valuation engine, market and
// persistence, and serializes every mutation through a single task.
//
// `run` is the only writer. Requests arrive over an mpsc channel and are
// handled one at a time; each committed mutation publishes fresh market
// conditions on a watch channel so readers only ever see committed state.

use anyhow::{anyhow, Context};
use capdraft_core::catalog::PlayerCatalog;
use capdraft_core::config::Config;
use capdraft_core::error::DraftError;
use capdraft_core::market::{
    BidRecommendation, DraftEvent, MarketConditions, MarketSettings, MarketSimulator,
    NominationRecommendation, PositionMarket, TeamBudget,
};
use capdraft_core::optimizer::{LockedPick, OptimizedRoster, RosterOptimizer};
use capdraft_core::player::{Player, PlayerPatch};
use capdraft_core::valuation::{CacheStats, Evaluation, ValuationEngine};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::protocol::{Reply, Request, Response, SessionCommand};

// ---------------------------------------------------------------------------
// DraftSession
// ---------------------------------------------------------------------------

pub struct DraftSession {
    config: Config,
    catalog: PlayerCatalog,
    engine: ValuationEngine,
    market: MarketSimulator,
    optimizer: RosterOptimizer,
    db: Option<Database>,
    draft_id: String,
}

impl DraftSession {
    /// Build a session with every configured team at the full salary cap and
    /// every catalog player available.
    pub fn new(config: Config, catalog: PlayerCatalog, db: Option<Database>, draft_id: String) -> Self {
        let league = &config.league;
        let engine = ValuationEngine::new(league, &config.strategy);
        let optimizer = RosterOptimizer::from_strategy(&config.strategy);
        let mut market = MarketSimulator::new(MarketSettings::from_config(league, &config.strategy));
        market.initialize(
            &league.team_ids(),
            league.salary_cap,
            &league.composition(),
            catalog.players(),
        );

        DraftSession {
            config,
            catalog,
            engine,
            market,
            optimizer,
            db,
            draft_id,
        }
    }

    /// Resume the stored draft for this session's draft id, or persist the
    /// fresh draft as its starting snapshot. Returns `true` when a stored
    /// draft was resumed.
    pub fn resume_or_start(&mut self) -> anyhow::Result<bool> {
        let Some(db) = &self.db else {
            return Ok(false);
        };

        match db.load_snapshot(&self.draft_id)? {
            Some(snapshot) => {
                let catalog = self
                    .market
                    .restore(&snapshot, &self.config.league.composition())
                    .context("stored draft does not replay")?;
                self.catalog = catalog;
                self.engine.clear();
                info!(
                    "Resumed draft {}: {} picks, {} players available",
                    self.draft_id,
                    self.market.events().len(),
                    self.market.available_count()
                );
                Ok(true)
            }
            None => {
                let snapshot = self.market.snapshot(&self.catalog)?;
                db.save_snapshot(&self.draft_id, &snapshot)?;
                db.set_draft_id(&self.draft_id)?;
                info!("Starting fresh draft {}", self.draft_id);
                Ok(false)
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &PlayerCatalog {
        &self.catalog
    }

    pub fn market(&self) -> &MarketSimulator {
        &self.market
    }

    pub fn draft_id(&self) -> &str {
        &self.draft_id
    }

    pub fn engine_stats(&self) -> CacheStats {
        self.engine.stats()
    }

    // --- valuation ---

    pub fn evaluate(&mut self, player_id: &str) -> Result<Evaluation, DraftError> {
        let ctx = self.market.valuation_context(&self.catalog);
        self.engine.evaluate_id(player_id, &self.catalog, &ctx)
    }

    pub fn evaluate_all(&mut self) -> Vec<Evaluation> {
        let ctx = self.market.valuation_context(&self.catalog);
        self.engine.evaluate_all(&self.catalog, &ctx)
    }

    // --- mutations ---

    pub fn record_draft(&mut self, player_id: &str, team_id: &str, price: u32) -> Result<DraftEvent, DraftError> {
        let player = self
            .catalog
            .get(player_id)
            .ok_or_else(|| DraftError::UnknownPlayer(player_id.to_string()))?;
        let event = self.market.record_draft(player, team_id, price)?;
        self.engine.invalidate_position(event.position);

        if let Some(db) = &self.db {
            if let Err(e) = db.record_event(&self.draft_id, &event, &self.team_budgets()) {
                warn!("Failed to persist pick to DB: {}", e);
            }
        }
        Ok(event)
    }

    pub fn undo_draft(&mut self, player_id: &str, team_id: &str, price: u32) -> Result<DraftEvent, DraftError> {
        let event = self.market.undo_draft(player_id, team_id, price)?;
        self.after_undo(&event);
        Ok(event)
    }

    pub fn undo_last(&mut self) -> Result<DraftEvent, DraftError> {
        let event = self.market.undo_last()?;
        self.after_undo(&event);
        Ok(event)
    }

    fn after_undo(&mut self, event: &DraftEvent) {
        self.engine.invalidate_position(event.position);
        if let Some(db) = &self.db {
            if let Err(e) = db.remove_event(&self.draft_id, event.sequence, &self.team_budgets()) {
                warn!("Failed to persist undo to DB: {}", e);
            }
        }
    }

    /// Apply an out-of-band field update. Only the patched player's cached
    /// evaluation is dropped; its position's tiers rebuild lazily.
    pub fn apply_patch(&mut self, patch: &PlayerPatch) -> Result<Player, DraftError> {
        let player = self.catalog.apply_patch(patch)?.clone();
        self.engine.invalidate_player(&player.id);
        if let Some(db) = &self.db {
            if let Err(e) = db.update_player(&self.draft_id, &player) {
                warn!("Failed to persist patch to DB: {}", e);
            }
        }
        Ok(player)
    }

    pub fn set_targets(&mut self, team_id: &str, player_ids: Vec<String>) -> Result<usize, DraftError> {
        if let Some(missing) = player_ids.iter().find(|id| !self.catalog.contains(id)) {
            return Err(DraftError::UnknownPlayer(missing.clone()));
        }
        let count = player_ids.len();
        self.market.set_targets(team_id, player_ids)?;
        Ok(count)
    }

    // --- market queries ---

    pub fn market_conditions(&self) -> MarketConditions {
        self.market.market_conditions()
    }

    pub fn position_markets(&self) -> Vec<PositionMarket> {
        self.market.position_markets(&self.catalog)
    }

    pub fn nomination(&self, team_id: &str) -> Result<NominationRecommendation, DraftError> {
        self.market.nomination_strategy(&self.catalog, team_id)
    }

    pub fn bid(&self, player_id: &str, team_id: &str, current_bid: u32) -> Result<BidRecommendation, DraftError> {
        self.market.bid_strategy(&self.catalog, player_id, team_id, current_bid)
    }

    /// Build a roster plan from the available pool.
    ///
    /// With a team (explicit, or the configured `my_team`) its drafted
    /// players are locked at the prices paid and its full budget is used;
    /// without one the plan starts from an empty roster at the salary cap.
    pub fn optimize(&self, team_id: Option<&str>, budget: Option<u32>) -> Result<OptimizedRoster, DraftError> {
        let composition = self
            .market
            .composition()
            .cloned()
            .unwrap_or_else(|| self.config.league.composition());
        let pool: Vec<&Player> = self
            .market
            .available_ids()
            .filter_map(|id| self.catalog.get(id))
            .collect();

        let (locked, full_budget) = match team_id.or(self.config.league.my_team.as_deref()) {
            Some(team_id) => {
                let team = self.market.team(team_id)?;
                let locked = team
                    .roster
                    .iter()
                    .map(|entry| {
                        let player = self
                            .catalog
                            .get(&entry.player_id)
                            .cloned()
                            .ok_or_else(|| DraftError::UnknownPlayer(entry.player_id.clone()))?;
                        Ok(LockedPick {
                            player,
                            price: entry.price,
                        })
                    })
                    .collect::<Result<Vec<_>, DraftError>>()?;
                (locked, team.budget)
            }
            None => (Vec::new(), self.config.league.salary_cap),
        };

        self.optimizer
            .optimize(pool, budget.unwrap_or(full_budget), &composition, &locked)
    }

    fn team_budgets(&self) -> Vec<TeamBudget> {
        self.market
            .teams()
            .iter()
            .map(|t| TeamBudget {
                team_id: t.team_id.clone(),
                budget: t.budget,
                spent: t.spent,
                remaining: t.remaining,
            })
            .collect()
    }

    /// Dispatch one request.
    pub fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::Evaluate { player_id } => self.evaluate(&player_id).map(Response::Evaluation),
            Request::Top { limit } => {
                let mut ranked = self.evaluate_all();
                ranked.truncate(limit);
                Ok(Response::Ranking(ranked))
            }
            Request::Draft {
                player_id,
                team_id,
                price,
            } => self
                .record_draft(&player_id, &team_id, price)
                .map(Response::Drafted),
            Request::Undo {
                player_id,
                team_id,
                price,
            } => self
                .undo_draft(&player_id, &team_id, price)
                .map(Response::Undone),
            Request::UndoLast => self.undo_last().map(Response::Undone),
            Request::Market => Ok(Response::Market(self.market_conditions())),
            Request::Positions => Ok(Response::Positions(self.position_markets())),
            Request::Teams => Ok(Response::Teams(self.market.teams().to_vec())),
            Request::Nominate { team_id } => self.nomination(&team_id).map(Response::Nomination),
            Request::Bid {
                player_id,
                team_id,
                current_bid,
            } => self
                .bid(&player_id, &team_id, current_bid)
                .map(Response::Bid),
            Request::Optimize { team_id, budget } => self
                .optimize(team_id.as_deref(), budget)
                .map(Response::Roster),
            Request::Targets {
                team_id,
                player_ids,
            } => {
                let count = self.set_targets(&team_id, player_ids)?;
                Ok(Response::TargetsSet { team_id, count })
            }
            Request::Patch(patch) => self.apply_patch(&patch).map(Response::Patched),
            Request::Quit => Ok(Response::Closed),
        }
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

/// Handle requests until `Quit` arrives or every sender is dropped.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    market_tx: watch::Sender<MarketConditions>,
    mut session: DraftSession,
) -> anyhow::Result<()> {
    info!("Draft session loop started ({})", session.draft_id());
    market_tx.send_replace(session.market_conditions());

    while let Some(SessionCommand { request, reply }) = cmd_rx.recv().await {
        if request == Request::Quit {
            info!("Quit command received, shutting down");
            let _ = reply.send(Ok(Response::Closed));
            break;
        }

        let mutation = request.is_mutation();
        let result = session.handle(request);
        if mutation && result.is_ok() {
            market_tx.send_replace(session.market_conditions());
        }
        if reply.send(result).is_err() {
            debug!("Requester went away before the reply was sent");
        }
    }

    info!("Draft session loop exiting");
    Ok(())
}

/// Cloneable front door to a running session task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        SessionHandle { tx }
    }

    /// Send a request and wait for its reply. The outer error means the
    /// session is gone; the inner one is a rejected operation.
    pub async fn request(&self, request: Request) -> anyhow::Result<Reply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand { request, reply })
            .await
            .map_err(|_| anyhow!("draft session has shut down"))?;
        rx.await.context("draft session dropped the request")
    }

    pub async fn evaluate(&self, player_id: &str) -> anyhow::Result<Reply> {
        self.request(Request::Evaluate {
            player_id: player_id.to_string(),
        })
        .await
    }

    pub async fn record_draft(&self, player_id: &str, team_id: &str, price: u32) -> anyhow::Result<Reply> {
        self.request(Request::Draft {
            player_id: player_id.to_string(),
            team_id: team_id.to_string(),
            price,
        })
        .await
    }

    pub async fn undo_last(&self) -> anyhow::Result<Reply> {
        self.request(Request::UndoLast).await
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.request(Request::Quit).await?.map(|_| ()).map_err(Into::into)
    }
}

/// Spawn the session task. Returns the request handle, a receiver of
/// committed market conditions and the task handle.
pub fn spawn(
    session: DraftSession,
) -> (
    SessionHandle,
    watch::Receiver<MarketConditions>,
    JoinHandle<anyhow::Result<()>>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (market_tx, market_rx) = watch::channel(session.market_conditions());
    let task = tokio::spawn(run(cmd_rx, market_tx, session));
    (SessionHandle::new(cmd_tx), market_rx, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capdraft_core::config::{LeagueConfig, StrategyConfig};
    use capdraft_core::player::{InjuryStatus, Position, Trend};
    use std::collections::BTreeMap;

    fn make_player(id: &str, pos: Position, points: f64, value: f64, adp: f64) -> Player {
        Player {
            id: id.into(),
            name: format!("Player {id}"),
            position: pos,
            team: "LAR".into(),
            projected_points: points,
            auction_value: Some(value),
            adp: Some(adp),
            age: Some(27),
            injury_status: InjuryStatus::Healthy,
            strength_of_schedule: Some(50.0),
            trend: Trend::Stable,
        }
    }

    fn test_config() -> Config {
        let roster: BTreeMap<String, usize> = [("QB", 1), ("RB", 2), ("WR", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let league = LeagueConfig {
            name: "Session Test".into(),
            num_teams: 3,
            salary_cap: 100,
            teams: vec!["a".into(), "b".into(), "c".into()],
            my_team: Some("a".into()),
            roster,
            ..LeagueConfig::default()
        };
        Config {
            league,
            strategy: StrategyConfig::default(),
            db_path: ":memory:".into(),
            data_paths: capdraft_core::config::DataPaths {
                players: "unused.json".into(),
                patches: None,
            },
        }
    }

    fn test_catalog() -> PlayerCatalog {
        let players = vec![
            make_player("qb1", Position::QB, 380.0, 30.0, 25.0),
            make_player("qb2", Position::QB, 330.0, 12.0, 60.0),
            make_player("rb1", Position::RB, 280.0, 45.0, 4.0),
            make_player("rb2", Position::RB, 240.0, 25.0, 18.0),
            make_player("rb3", Position::RB, 200.0, 10.0, 45.0),
            make_player("wr1", Position::WR, 260.0, 40.0, 8.0),
            make_player("wr2", Position::WR, 210.0, 15.0, 40.0),
        ];
        PlayerCatalog::from_players(players).0
    }

    fn test_session() -> DraftSession {
        let db = Database::open(":memory:").unwrap();
        DraftSession::new(test_config(), test_catalog(), Some(db), "test_draft".into())
    }

    #[test]
    fn draft_and_undo_persist_incrementally() {
        let mut session = test_session();
        assert!(!session.resume_or_start().unwrap());

        session.record_draft("rb1", "b", 40).unwrap();
        let db = session.db.as_ref().unwrap();
        assert_eq!(db.event_count("test_draft").unwrap(), 1);

        session.undo_last().unwrap();
        let db = session.db.as_ref().unwrap();
        assert_eq!(db.event_count("test_draft").unwrap(), 0);
        assert_eq!(session.market().team("b").unwrap().remaining, 100);
    }

    #[test]
    fn rejected_draft_leaves_store_untouched() {
        let mut session = test_session();
        session.resume_or_start().unwrap();

        let err = session.record_draft("rb1", "ghost", 10).unwrap_err();
        assert_eq!(err, DraftError::UnknownTeam("ghost".into()));
        let err = session.record_draft("nobody", "a", 10).unwrap_err();
        assert_eq!(err, DraftError::UnknownPlayer("nobody".into()));
        assert_eq!(session.db.as_ref().unwrap().event_count("test_draft").unwrap(), 0);
    }

    #[test]
    fn patch_updates_catalog_and_store() {
        let mut session = test_session();
        session.resume_or_start().unwrap();

        let patch = PlayerPatch {
            player_id: "wr1".into(),
            field: "injuryStatus".into(),
            value: serde_json::json!("out"),
        };
        let player = session.apply_patch(&patch).unwrap();
        assert_eq!(player.injury_status, InjuryStatus::Out);

        let stored = session
            .db
            .as_ref()
            .unwrap()
            .load_snapshot("test_draft")
            .unwrap()
            .unwrap();
        let wr1 = stored.players.iter().find(|p| p.id == "wr1").unwrap();
        assert_eq!(wr1.injury_status, InjuryStatus::Out);
    }

    #[test]
    fn optimize_locks_the_teams_picks() {
        let mut session = test_session();
        session.record_draft("qb2", "a", 10).unwrap();

        let roster = session.optimize(None, None).unwrap();
        let locked: Vec<&str> = roster
            .picks
            .iter()
            .filter(|p| p.locked)
            .map(|p| p.player_id.as_str())
            .collect();
        assert_eq!(locked, vec!["qb2"]);
        assert!(roster.total_spent <= 100);
        assert!(!roster.contains("qb1"));
    }

    #[test]
    fn targets_reject_unknown_players() {
        let mut session = test_session();
        assert_eq!(session.set_targets("a", vec!["rb1".into(), "wr1".into()]), Ok(2));
        assert_eq!(
            session.set_targets("a", vec!["zzz".into()]),
            Err(DraftError::UnknownPlayer("zzz".into()))
        );
        assert_eq!(
            session.set_targets("zzz", vec![]),
            Err(DraftError::UnknownTeam("zzz".into()))
        );
    }

    #[tokio::test]
    async fn session_task_publishes_committed_conditions() {
        let (handle, mut market_rx, task) = spawn(test_session());
        assert_eq!(market_rx.borrow().players_drafted, 0);

        let reply = handle.record_draft("rb1", "b", 40).await.unwrap();
        assert!(matches!(reply, Ok(Response::Drafted(_))));
        market_rx.changed().await.unwrap();
        assert_eq!(market_rx.borrow().players_drafted, 1);
        assert_eq!(market_rx.borrow().total_spent, 40);

        // A rejected request does not publish.
        let reply = handle.record_draft("rb1", "c", 40).await.unwrap();
        assert_eq!(reply, Err(DraftError::AlreadyDrafted("rb1".into())));
        assert!(!market_rx.has_changed().unwrap());

        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }
}
