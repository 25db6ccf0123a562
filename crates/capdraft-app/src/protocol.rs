// Message types exchanged between the command front end and the draft
// session task.

use capdraft_core::error::DraftError;
use capdraft_core::market::{
    BidRecommendation, DraftEvent, MarketConditions, NominationRecommendation, PositionMarket,
    TeamState,
};
use capdraft_core::optimizer::OptimizedRoster;
use capdraft_core::player::{Player, PlayerPatch};
use capdraft_core::valuation::Evaluation;
use tokio::sync::oneshot;

/// An operation on the draft session.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Evaluate {
        player_id: String,
    },
    /// Best available players, `limit` of them.
    Top {
        limit: usize,
    },
    Draft {
        player_id: String,
        team_id: String,
        price: u32,
    },
    Undo {
        player_id: String,
        team_id: String,
        price: u32,
    },
    UndoLast,
    Market,
    Positions,
    Teams,
    Nominate {
        team_id: String,
    },
    Bid {
        player_id: String,
        team_id: String,
        current_bid: u32,
    },
    /// Roster plan for `team_id` (or the configured team, or a fresh roster)
    /// under `budget` (default: the team's full budget).
    Optimize {
        team_id: Option<String>,
        budget: Option<u32>,
    },
    Targets {
        team_id: String,
        player_ids: Vec<String>,
    },
    Patch(PlayerPatch),
    Quit,
}

impl Request {
    /// Requests that change draft state when they succeed.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Request::Draft { .. } | Request::Undo { .. } | Request::UndoLast | Request::Patch(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Evaluation(Evaluation),
    Ranking(Vec<Evaluation>),
    Drafted(DraftEvent),
    Undone(DraftEvent),
    Market(MarketConditions),
    Positions(Vec<PositionMarket>),
    Teams(Vec<TeamState>),
    Nomination(NominationRecommendation),
    Bid(BidRecommendation),
    Roster(OptimizedRoster),
    TargetsSet { team_id: String, count: usize },
    Patched(Player),
    Closed,
}

pub type Reply = Result<Response, DraftError>;

/// A request plus the channel its reply goes back on.
#[derive(Debug)]
pub struct SessionCommand {
    pub request: Request,
    pub reply: oneshot::Sender<Reply>,
}
