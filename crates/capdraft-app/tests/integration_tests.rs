// Integration tests for the draft engine.
//
// These tests drive the full system through the library crates' public API:
// feed parsing into a catalog, valuation against live market context, the
// market simulator's budget bookkeeping and strategy advice, the roster
// optimizer, SQLite persistence with crash recovery, and the session task
// that serializes every mutation.

use std::collections::BTreeSet;
use std::path::PathBuf;

use capdraft_app::db::Database;
use capdraft_app::feed;
use capdraft_app::protocol::{Request, Response};
use capdraft_app::session::{self, DraftSession};
use capdraft_core::catalog::PlayerCatalog;
use capdraft_core::config::{Config, DataPaths, LeagueConfig, StrategyConfig};
use capdraft_core::error::DraftError;
use capdraft_core::market::{DraftPhase, NominationKind, ScarcityLevel};
use capdraft_core::player::{PlayerPatch, PlayerRecord, Position};

// ===========================================================================
// Test helpers
// ===========================================================================

const QUALITY_RBS: usize = 30;

/// Per-position pool shape: (position, players, ADP offset, top value).
const POOL: [(Position, usize, f64, f64); 6] = [
    (Position::QB, 30, 5.0, 40.0),
    (Position::RB, 60, 1.0, 60.0),
    (Position::WR, 70, 2.0, 56.0),
    (Position::TE, 30, 8.0, 30.0),
    (Position::K, 20, 150.0, 3.0),
    (Position::DST, 20, 140.0, 4.0),
];

fn base_points(pos: Position) -> f64 {
    match pos {
        Position::QB => 390.0,
        Position::RB => 300.0,
        Position::WR => 290.0,
        Position::TE => 200.0,
        Position::K => 150.0,
        Position::DST => 140.0,
    }
}

/// Projected points for the `i`-th player at `pos`. Exactly `QUALITY_RBS`
/// running backs clear the default 120-point quality floor.
fn points(pos: Position, i: usize) -> f64 {
    if pos == Position::RB && i >= QUALITY_RBS {
        return 100.0 - i as f64;
    }
    base_points(pos) - 3.0 * i as f64
}

fn player_id(pos: Position, i: usize) -> String {
    format!("{}_{:02}", pos.display_str().to_lowercase(), i)
}

/// A realistic 230-player feed, serialized to JSON the way a projection
/// source would ship it.
fn feed_json() -> String {
    let mut records = Vec::new();
    for (pos, count, adp_offset, top_value) in POOL {
        for i in 0..count {
            let value = (top_value - 2.0 * i as f64).max(1.0);
            records.push(PlayerRecord {
                id: player_id(pos, i),
                name: format!("{} Player {}", pos.display_str(), i),
                position: pos.display_str().to_string(),
                team: "NFL".into(),
                projected_points: Some(points(pos, i)),
                auction_value: Some(value),
                adp: Some(adp_offset + 6.0 * i as f64),
                age: Some(26),
                injury_status: None,
                sos: Some(50.0),
                trend: None,
            });
        }
    }
    serde_json::to_string(&records).unwrap()
}

fn test_catalog() -> PlayerCatalog {
    let records = feed::records_from_json_reader(feed_json().as_bytes()).unwrap();
    let (catalog, errors) = PlayerCatalog::from_records(records);
    assert!(errors.is_empty(), "feed should be clean: {errors:?}");
    catalog
}

/// The default 12-team, $200, 16-slot league.
fn test_config() -> Config {
    Config {
        league: LeagueConfig {
            my_team: Some("team_1".into()),
            ..LeagueConfig::default()
        },
        strategy: StrategyConfig::default(),
        db_path: ":memory:".into(),
        data_paths: DataPaths {
            players: "unused.json".into(),
            patches: None,
        },
    }
}

fn test_session() -> DraftSession {
    let db = Database::open(":memory:").unwrap();
    let mut session = DraftSession::new(test_config(), test_catalog(), Some(db), "it_draft".into());
    assert!(!session.resume_or_start().unwrap());
    session
}

fn temp_db_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("capdraft_it_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("drafts.db")
}

fn assert_budget_invariants(session: &DraftSession) {
    let market = session.market();
    let mut drafted = BTreeSet::new();
    for team in market.teams() {
        assert_eq!(team.spent + team.remaining, team.budget, "{}", team.team_id);
        assert!(
            team.remaining as usize >= team.slots_left(),
            "{} must keep $1 per open slot",
            team.team_id
        );
        assert_eq!(
            team.spent,
            team.roster.iter().map(|e| e.price).sum::<u32>(),
            "{}",
            team.team_id
        );
        for entry in &team.roster {
            assert!(drafted.insert(entry.player_id.clone()), "{} on two rosters", entry.player_id);
        }
    }
    assert_eq!(drafted.len(), market.events().len());
    assert_eq!(
        market.available_count() + drafted.len(),
        session.catalog().len()
    );
    for id in &drafted {
        assert!(!market.is_available(id));
    }
    let conditions = session.market_conditions();
    assert_eq!(conditions.total_spent + conditions.total_remaining, conditions.total_budget);
}

// ===========================================================================
// Feed and valuation
// ===========================================================================

#[test]
fn feed_builds_full_catalog() {
    let catalog = test_catalog();
    assert_eq!(catalog.len(), 230);
    assert_eq!(catalog.by_position(Position::RB).count(), 60);
    assert_eq!(catalog.get("qb_00").unwrap().projected_points, 390.0);
}

#[test]
fn evaluate_all_is_sorted_and_idempotent() {
    let mut session = test_session();
    let first = session.evaluate_all();
    assert_eq!(first.len(), 230);
    for pair in first.windows(2) {
        assert_ne!(
            pair[0].cvs.rank_cmp(&pair[1].cvs),
            std::cmp::Ordering::Greater,
            "ranking out of order at {}",
            pair[1].player_id
        );
    }

    let second = session.evaluate_all();
    assert_eq!(first, second);
    assert!(session.engine_stats().hits > 0);
}

#[test]
fn component_weights_renormalize_when_a_source_is_missing() {
    let mut session = test_session();
    session
        .apply_patch(&PlayerPatch {
            player_id: "wr_03".into(),
            field: "auctionValue".into(),
            value: serde_json::Value::Null,
        })
        .unwrap();

    let eval = session.evaluate("wr_03").unwrap();
    assert!(eval.cvs.is_scored());
    assert_eq!(eval.components.len(), 5);
    let total: f64 = eval.components.iter().map(|c| c.weight).sum();
    assert!((total - 1.0).abs() < 1e-9, "weights sum to {total}");
}

#[test]
fn drafted_players_evaluate_as_drafted() {
    let mut session = test_session();
    session.record_draft("rb_00", "team_2", 58).unwrap();
    let eval = session.evaluate("rb_00").unwrap();
    assert!(eval.drafted);
    assert!(session.evaluate("nobody").is_err());
}

// ===========================================================================
// Market bookkeeping
// ===========================================================================

#[test]
fn budgets_hold_through_a_draft_sequence() {
    let mut session = test_session();
    let picks = [
        ("rb_00", "team_1", 62),
        ("wr_00", "team_2", 55),
        ("qb_00", "team_3", 31),
        ("rb_01", "team_4", 48),
        ("te_00", "team_1", 22),
        ("wr_01", "team_5", 44),
        ("k_00", "team_6", 1),
        ("dst_00", "team_7", 2),
    ];
    for (player, team, price) in picks {
        session.record_draft(player, team, price).unwrap();
        assert_budget_invariants(&session);
    }

    let conditions = session.market_conditions();
    assert_eq!(conditions.players_drafted, picks.len());
    assert_eq!(conditions.total_spent, 265);
    assert_eq!(conditions.total_slots, 12 * 16);
    assert_eq!(conditions.phase, DraftPhase::Early);

    session.undo_draft("te_00", "team_1", 22).unwrap();
    assert_budget_invariants(&session);
    assert!(session.market().is_available("te_00"));
}

#[test]
fn rejected_drafts_leave_state_untouched() {
    let mut session = test_session();
    session.record_draft("rb_00", "team_1", 60).unwrap();
    let teams_before = session.market().teams().to_vec();
    let events_before = session.market().events().to_vec();

    // 16 slots: $140 left and 15 open slots caps the next bid at $126.
    assert_eq!(
        session.record_draft("wr_00", "team_1", 127),
        Err(DraftError::ExceedsMaxBid {
            team_id: "team_1".into(),
            price: 127,
            max_bid: 126,
        })
    );
    assert_eq!(
        session.record_draft("rb_00", "team_2", 10),
        Err(DraftError::AlreadyDrafted("rb_00".into()))
    );
    assert!(matches!(
        session.record_draft("wr_00", "team_99", 10),
        Err(DraftError::UnknownTeam(_))
    ));
    assert!(matches!(
        session.record_draft("wr_00", "team_2", 0),
        Err(DraftError::InvalidPrice { .. })
    ));

    assert_eq!(session.market().teams(), teams_before.as_slice());
    assert_eq!(session.market().events(), events_before.as_slice());
}

#[test]
fn record_then_undo_restores_prior_state() {
    let mut session = test_session();
    session.record_draft("qb_00", "team_3", 30).unwrap();
    let teams = session.market().teams().to_vec();
    let available = session.market().available_count();
    let rb_prices = session.market().price_history(Position::RB).to_vec();
    let conditions = session.market_conditions();

    session.record_draft("rb_05", "team_8", 37).unwrap();
    assert_eq!(session.market().price_history(Position::RB), &[37]);
    session.undo_last().unwrap();

    assert_eq!(session.market().teams(), teams.as_slice());
    assert_eq!(session.market().available_count(), available);
    assert_eq!(session.market().price_history(Position::RB), rb_prices.as_slice());
    assert_eq!(session.market_conditions(), conditions);
}

#[test]
fn running_back_run_turns_position_scarce() {
    let mut session = test_session();
    let rb_market = |s: &DraftSession| {
        s.position_markets()
            .into_iter()
            .find(|m| m.position == Position::RB)
            .unwrap()
    };

    let before = rb_market(&session);
    assert_eq!(before.quality_remaining, QUALITY_RBS);
    assert_eq!(before.starters_needed, 24);
    assert_eq!(before.scarcity, ScarcityLevel::Normal);

    for i in 0..7 {
        let team = format!("team_{}", i + 1);
        session.record_draft(&player_id(Position::RB, i), &team, 10).unwrap();
    }

    let after = rb_market(&session);
    assert_eq!(after.quality_remaining, 23);
    assert_eq!(after.scarcity, ScarcityLevel::Scarce);
    assert_eq!(after.drafted, 7);
    assert_eq!(after.recent_prices, vec![10; 5]);
}

#[test]
fn early_overspending_raises_recommended_bids() {
    let mut session = test_session();
    let before = session.evaluate("rb_05").unwrap();

    for i in 0..10 {
        let team = format!("team_{}", i + 1);
        session.record_draft(&player_id(Position::WR, i), &team, 60).unwrap();
    }

    let conditions = session.market_conditions();
    assert!(conditions.inflation_rate > 0.0);
    let after = session.evaluate("rb_05").unwrap();
    assert!(
        after.recommended_bid > before.recommended_bid,
        "league inflation {:.3} but bid went {} -> {}",
        conditions.inflation_rate,
        before.recommended_bid,
        after.recommended_bid
    );
}

// ===========================================================================
// Strategy
// ===========================================================================

#[test]
fn early_nomination_picks_a_top_player_outside_own_targets() {
    let mut session = test_session();
    let rec = session.nomination("team_1").unwrap();
    assert_eq!(rec.phase, DraftPhase::Early);
    assert_eq!(rec.kind, NominationKind::DrainBudget);
    let adp = session.catalog().get(&rec.player_id).unwrap().adp.unwrap();
    assert!(adp < 20.0, "nominated {} with adp {adp}", rec.player_id);
    assert_ne!(rec.likely_bidder.as_deref(), Some("team_1"));

    // Targeting the nominee moves the suggestion elsewhere.
    let first = rec.player_id.clone();
    session.set_targets("team_1", vec![first.clone()]).unwrap();
    let rec = session.nomination("team_1").unwrap();
    assert_ne!(rec.player_id, first);
}

#[test]
fn bid_at_or_above_ceiling_is_declined() {
    let session = test_session();
    let open = session.bid("rb_02", "team_1", 1).unwrap();
    assert!(open.should_bid);
    assert!(open.max_bid > 1);

    let at_ceiling = session.bid("rb_02", "team_1", open.max_bid).unwrap();
    assert!(!at_ceiling.should_bid);

    let over_budget = session.bid("rb_02", "team_1", 199).unwrap();
    assert!(!over_budget.should_bid);
}

// ===========================================================================
// Roster optimizer
// ===========================================================================

#[test]
fn optimizer_builds_a_complete_roster_from_the_feed() {
    let session = test_session();
    let roster = session.optimize(None, None).unwrap();
    assert!(roster.is_complete(), "shortfalls: {:?}", roster.shortfalls);
    assert_eq!(roster.picks.len(), 16);
    assert!(roster.total_spent <= 200);
    assert_eq!(roster.total_spent + roster.remaining_budget, 200);

    let ids: BTreeSet<&str> = roster.picks.iter().map(|p| p.player_id.as_str()).collect();
    assert_eq!(ids.len(), 16);
}

#[test]
fn optimizer_keeps_drafted_players_locked() {
    let mut session = test_session();
    session.record_draft("rb_00", "team_1", 64).unwrap();
    session.record_draft("wr_00", "team_2", 50).unwrap();

    let roster = session.optimize(Some("team_1"), None).unwrap();
    let locked = roster.picks.iter().find(|p| p.player_id == "rb_00").unwrap();
    assert!(locked.locked);
    assert_eq!(locked.price, 64);
    assert!(!roster.contains("wr_00"), "drafted elsewhere");
    assert!(roster.total_spent <= 200);
}

// ===========================================================================
// Persistence and recovery
// ===========================================================================

#[test]
fn session_resumes_from_disk_after_restart() {
    let path = temp_db_path("resume");
    let path_str = path.to_str().unwrap();

    {
        let db = Database::open(path_str).unwrap();
        let mut session = DraftSession::new(test_config(), test_catalog(), Some(db), "crash".into());
        assert!(!session.resume_or_start().unwrap());
        session.record_draft("rb_00", "team_1", 60).unwrap();
        session.record_draft("wr_00", "team_2", 52).unwrap();
        session.record_draft("qb_00", "team_3", 28).unwrap();
        session.undo_last().unwrap();
        session
            .apply_patch(&PlayerPatch {
                player_id: "rb_01".into(),
                field: "injuryStatus".into(),
                value: serde_json::json!("out"),
            })
            .unwrap();
    }

    let db = Database::open(path_str).unwrap();
    assert_eq!(db.get_draft_id().unwrap().as_deref(), Some("crash"));
    assert_eq!(db.event_count("crash").unwrap(), 2);

    let mut resumed = DraftSession::new(test_config(), test_catalog(), Some(db), "crash".into());
    assert!(resumed.resume_or_start().unwrap());

    let events: Vec<(&str, &str, u32)> = resumed
        .market()
        .events()
        .iter()
        .map(|e| (e.player_id.as_str(), e.team_id.as_str(), e.price))
        .collect();
    assert_eq!(events, vec![("rb_00", "team_1", 60), ("wr_00", "team_2", 52)]);
    assert_eq!(resumed.market().team("team_1").unwrap().remaining, 140);
    assert!(resumed.market().is_available("qb_00"));
    assert!(resumed
        .catalog()
        .get("rb_01")
        .unwrap()
        .injury_status
        .is_sidelined());
    assert_budget_invariants(&resumed);

    // Sequence numbers keep counting after a resume.
    let next = resumed.record_draft("te_00", "team_4", 20).unwrap();
    assert!(next.sequence > resumed.market().events()[1].sequence);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn separate_draft_ids_do_not_share_state() {
    let path = temp_db_path("ids");
    let path_str = path.to_str().unwrap();

    {
        let db = Database::open(path_str).unwrap();
        let mut session = DraftSession::new(test_config(), test_catalog(), Some(db), "one".into());
        session.resume_or_start().unwrap();
        session.record_draft("rb_00", "team_1", 60).unwrap();
    }

    let db = Database::open(path_str).unwrap();
    let mut other = DraftSession::new(test_config(), test_catalog(), Some(db), "two".into());
    assert!(!other.resume_or_start().unwrap());
    assert!(other.market().events().is_empty());
    assert!(other.market().is_available("rb_00"));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

// ===========================================================================
// Session task
// ===========================================================================

#[tokio::test]
async fn session_task_serializes_requests() {
    let (handle, mut market_rx, task) = session::spawn(test_session());

    let reply = handle.record_draft("rb_00", "team_1", 60).await.unwrap();
    assert!(matches!(reply, Ok(Response::Drafted(ref e)) if e.sequence == 1));
    market_rx.changed().await.unwrap();
    assert_eq!(market_rx.borrow().total_spent, 60);

    let reply = handle
        .request(Request::Top { limit: 5 })
        .await
        .unwrap()
        .unwrap();
    match reply {
        Response::Ranking(evals) => {
            assert_eq!(evals.len(), 5);
            assert!(evals.iter().all(|e| e.player_id != "rb_00"));
        }
        other => panic!("expected a ranking, got {other:?}"),
    }

    let reply = handle
        .request(Request::Optimize {
            team_id: None,
            budget: None,
        })
        .await
        .unwrap()
        .unwrap();
    match reply {
        Response::Roster(roster) => assert!(roster.contains("rb_00")),
        other => panic!("expected a roster, got {other:?}"),
    }

    let reply = handle.undo_last().await.unwrap();
    assert!(matches!(reply, Ok(Response::Undone(_))));
    market_rx.changed().await.unwrap();
    assert_eq!(market_rx.borrow().players_drafted, 0);

    let reply = handle.undo_last().await.unwrap();
    assert_eq!(reply, Err(DraftError::NothingToUndo));

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
    assert!(handle.evaluate("rb_00").await.is_err());
}

#[tokio::test]
async fn concurrent_requesters_see_every_pick() {
    let (handle, market_rx, task) = session::spawn(test_session());

    let mut joins = Vec::new();
    for t in 0..6usize {
        let handle = handle.clone();
        joins.push(tokio::spawn(async move {
            let team = format!("team_{}", t + 1);
            let player = player_id(Position::WR, t);
            handle.record_draft(&player, &team, 10 + t as u32).await
        }));
    }
    for join in joins {
        assert!(matches!(join.await.unwrap().unwrap(), Ok(Response::Drafted(_))));
    }

    assert_eq!(market_rx.borrow().players_drafted, 6);
    assert_eq!(market_rx.borrow().total_spent, (10..16).sum::<u32>());

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}
