// Draft events and persisted snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::player::{Player, Position};

/// One completed auction. The event log is append-only apart from undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftEvent {
    pub sequence: u64,
    pub player_id: String,
    pub team_id: String,
    pub position: Position,
    pub price: u32,
    /// The player's quoted auction value at draft time, if any.
    pub expected_value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Budget line for one team inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamBudget {
    pub team_id: String,
    pub budget: u32,
    pub spent: u32,
    pub remaining: u32,
}

/// Everything needed to resume a draft exactly: the player pool (with any
/// patches applied), the event log and each team's budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub players: Vec<Player>,
    pub events: Vec<DraftEvent>,
    pub teams: Vec<TeamBudget>,
}
