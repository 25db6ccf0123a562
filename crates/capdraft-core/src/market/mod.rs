// Auction market simulation: budgets, draft log, scarcity, strategy.

pub mod conditions;
pub mod event;
pub mod simulator;
pub mod strategy;
pub mod team;

pub use conditions::{DraftPhase, MarketConditions, PositionMarket, ScarcityLevel};
pub use event::{DraftEvent, DraftSnapshot, TeamBudget};
pub use simulator::{MarketSettings, MarketSimulator};
pub use strategy::{
    BidRecommendation, NaiveSignals, NominationKind, NominationRecommendation, ValueSignals,
};
pub use team::{RosterEntry, TeamState};
