// Error taxonomy shared by the catalog, market and optimizer.

use thiserror::Error;

use crate::player::Position;

/// A feed record that could not be turned into a `Player`. The record is
/// skipped; loading continues with the rest of the feed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("record {record}: missing required field `{field}`")]
    MissingField { record: String, field: &'static str },

    #[error("record {record}: invalid `{field}`: {message}")]
    InvalidField {
        record: String,
        field: &'static str,
        message: String,
    },

    #[error("record {record}: duplicate player id")]
    DuplicateId { record: String },
}

/// A rejected runtime operation. State is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DraftError {
    #[error("unknown team: {0}")]
    UnknownTeam(String),

    #[error("unknown player: {0}")]
    UnknownPlayer(String),

    #[error("player {0} has already been drafted")]
    AlreadyDrafted(String),

    #[error("invalid price ${price} for {player_id}: auction prices start at $1")]
    InvalidPrice { player_id: String, price: u32 },

    #[error("team {team_id} has no open roster slots")]
    RosterFull { team_id: String },

    #[error("team {team_id} cannot pay ${price}: max bid is ${max_bid}")]
    ExceedsMaxBid {
        team_id: String,
        price: u32,
        max_bid: u32,
    },

    #[error("no draft of {player_id} to {team_id} for ${price} to undo")]
    NoMatchingDraft {
        player_id: String,
        team_id: String,
        price: u32,
    },

    #[error("no draft events to undo")]
    NothingToUndo,

    #[error("market has not been initialized")]
    NotInitialized,

    #[error("no players remain available")]
    NoPlayersAvailable,

    #[error("invalid patch for {player_id} field `{field}`: {message}")]
    InvalidPatch {
        player_id: String,
        field: String,
        message: String,
    },

    #[error("snapshot does not replay cleanly: {0}")]
    SnapshotMismatch(String),

    #[error("locked pick {player_id} cannot be placed: {message}")]
    LockedPickUnplaceable { player_id: String, message: String },
}

/// Why a required roster slot could not be filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortfallReason {
    /// The pool holds no unused player eligible for the slot.
    NoEligiblePlayers,
    /// Eligible players exist but the cheapest one breaks the $1 reserve.
    Unaffordable { cheapest: u32, spend_cap: u32 },
}

/// An optimizer slot that could not be filled. Returned inside the optimizer
/// output as part of a shortfall report; never a hard failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot fill {slot} slot: {}", describe(.reason))]
pub struct InfeasibleConstraintError {
    /// Slot label, e.g. "RB" or "FLEX".
    pub slot: String,
    /// Set when the slot is a dedicated position slot.
    pub position: Option<Position>,
    pub reason: ShortfallReason,
}

fn describe(reason: &ShortfallReason) -> String {
    match reason {
        ShortfallReason::NoEligiblePlayers => "no eligible players left in the pool".into(),
        ShortfallReason::Unaffordable {
            cheapest,
            spend_cap,
        } => format!("cheapest eligible player costs ${cheapest}, spend cap is ${spend_cap}"),
    }
}
