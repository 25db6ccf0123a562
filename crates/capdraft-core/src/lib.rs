// Library root: the player model, valuation, market simulation and roster
// optimizer behind a salary-cap auction draft.

pub mod catalog;
pub mod config;
pub mod error;
pub mod market;
pub mod optimizer;
pub mod player;
pub mod valuation;

pub use catalog::PlayerCatalog;
pub use error::{DraftError, InfeasibleConstraintError, ShortfallReason, ValidationError};
pub use player::{InjuryStatus, Player, PlayerPatch, PlayerRecord, Position, Trend};
