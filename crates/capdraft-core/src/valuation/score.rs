// Composite value score (CVS) types: the unscored sentinel, components and
// weight renormalization.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CvsWeights;

// ---------------------------------------------------------------------------
// CvsScore
// ---------------------------------------------------------------------------

/// A 0-100 desirability score, or an explicit "no score available".
///
/// `Unscored` is never coerced to zero: ranking puts it after every scored
/// value and aggregations skip it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CvsScore {
    Scored(f64),
    Unscored,
}

impl CvsScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            CvsScore::Scored(v) => Some(*v),
            CvsScore::Unscored => None,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, CvsScore::Scored(_))
    }

    /// Ranking order: higher scores first, `Unscored` last.
    pub fn rank_cmp(&self, other: &CvsScore) -> Ordering {
        match (self, other) {
            (CvsScore::Scored(a), CvsScore::Scored(b)) => b.total_cmp(a),
            (CvsScore::Scored(_), CvsScore::Unscored) => Ordering::Less,
            (CvsScore::Unscored, CvsScore::Scored(_)) => Ordering::Greater,
            (CvsScore::Unscored, CvsScore::Unscored) => Ordering::Equal,
        }
    }

    /// Mean of the scored values. `Unscored` when nothing was scored.
    pub fn mean<'a>(scores: impl IntoIterator<Item = &'a CvsScore>) -> CvsScore {
        let (sum, count) = scores
            .into_iter()
            .filter_map(CvsScore::value)
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if count == 0 {
            CvsScore::Unscored
        } else {
            CvsScore::Scored(sum / count as f64)
        }
    }
}

impl fmt::Display for CvsScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CvsScore::Scored(v) => write!(f, "{v:.1}"),
            CvsScore::Unscored => f.write_str("unscored"),
        }
    }
}

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn label(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// The signals blended into the CVS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    AuctionValue,
    Adp,
    ProjectedPoints,
    Scarcity,
    Schedule,
    Trend,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::AuctionValue,
        Component::Adp,
        Component::ProjectedPoints,
        Component::Scarcity,
        Component::Schedule,
        Component::Trend,
    ];

    pub fn base_weight(&self, weights: &CvsWeights) -> f64 {
        match self {
            Component::AuctionValue => weights.auction_value,
            Component::Adp => weights.adp,
            Component::ProjectedPoints => weights.projected_points,
            Component::Scarcity => weights.scarcity,
            Component::Schedule => weights.schedule,
            Component::Trend => weights.trend,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Component::AuctionValue => "auction value",
            Component::Adp => "ADP",
            Component::ProjectedPoints => "projected points",
            Component::Scarcity => "scarcity",
            Component::Schedule => "schedule",
            Component::Trend => "trend",
        }
    }
}

/// One component's contribution to a player's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub component: Component,
    /// Normalized 0-100 score for this component.
    pub score: f64,
    /// Weight after renormalization over the available components.
    pub weight: f64,
}

/// Rescale the base weights of `available` components so they sum to 1.
///
/// Missing components are dropped rather than scored as zero. Returns an empty
/// list when the available components carry no weight at all.
pub fn renormalized_weights(weights: &CvsWeights, available: &[Component]) -> Vec<(Component, f64)> {
    let total: f64 = available.iter().map(|c| c.base_weight(weights)).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    available
        .iter()
        .map(|&c| (c, c.base_weight(weights) / total))
        .collect()
}
