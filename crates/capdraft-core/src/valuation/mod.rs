// Valuation engine: tier normalization, composite scores, bid recommendations.

pub mod auction;
pub mod engine;
pub mod score;
pub mod tiers;

pub use engine::{CacheStats, Evaluation, ValuationContext, ValuationEngine};
pub use score::{Component, ComponentScore, Confidence, CvsScore};
