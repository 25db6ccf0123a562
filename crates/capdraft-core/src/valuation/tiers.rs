// Per-position tier breakpoints and piecewise-linear normalization.
//
// Each signal (projected points, auction value, ADP, schedule) is rescaled to
// 0-100 against the players still available at the same position. The
// breakpoints are anchored on real draft landmarks (the elite tier, the last
// league starter, the replacement player) rather than on a global min/max, so
// one outlier does not flatten everyone else.

use std::hash::{Hash, Hasher};

use crate::player::Player;

/// Anchor points of one signal's distribution, highest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Tiers {
    /// Breakpoints as (raw value, normalized score), monotone non-increasing
    /// in both coordinates.
    breakpoints: [(f64, f64); 8],
    pub sample_size: usize,
}

const SCORE_MAX: f64 = 100.0;
const SCORE_ELITE: f64 = 92.0;
const SCORE_TOP10: f64 = 84.0;
const SCORE_TOP25: f64 = 72.0;
const SCORE_STARTER: f64 = 60.0;
const SCORE_REPLACEMENT: f64 = 45.0;
const SCORE_AVERAGE: f64 = 30.0;
const SCORE_FLOOR: f64 = 0.0;

impl Tiers {
    /// Build tiers from raw values where higher is better.
    ///
    /// `starters` is the league-wide starter count at the position: the
    /// `starters`-th best value is the last starter and the next one is the
    /// replacement level. Returns `None` for an empty sample.
    pub fn from_values(values: &[f64], starters: usize) -> Option<Tiers> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| b.total_cmp(a));
        let n = sorted.len();
        let at = |idx: usize| sorted[idx.min(n - 1)];
        let percentile_idx = |share: f64| ((n as f64 * share).ceil() as usize).saturating_sub(1);

        let starter_idx = if starters == 0 { n / 2 } else { starters - 1 };
        let average = sorted.iter().sum::<f64>() / n as f64;

        let mut breakpoints = [
            (at(0), SCORE_MAX),
            (at(2), SCORE_ELITE),
            (at(percentile_idx(0.10)), SCORE_TOP10),
            (at(percentile_idx(0.25)), SCORE_TOP25),
            (at(starter_idx), SCORE_STARTER),
            (at(starter_idx + 1), SCORE_REPLACEMENT),
            (average, SCORE_AVERAGE),
            (at(n - 1), SCORE_FLOOR),
        ];

        // Small pools can put landmarks out of order (e.g. the mean above the
        // replacement value). Clamp so raw values never rise as scores fall.
        for i in 1..breakpoints.len() {
            breakpoints[i].0 = breakpoints[i].0.min(breakpoints[i - 1].0);
        }

        Some(Tiers {
            breakpoints,
            sample_size: n,
        })
    }

    /// Map a raw value onto 0-100 by interpolating between breakpoints.
    /// Values above the best available clamp to 100, below the worst to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let bp = &self.breakpoints;
        if value >= bp[0].0 {
            return SCORE_MAX;
        }
        for i in 1..bp.len() {
            let (lo_value, lo_score) = bp[i];
            if value >= lo_value {
                let (hi_value, hi_score) = bp[i - 1];
                // value < hi_value here, so the span is non-zero.
                let t = (value - lo_value) / (hi_value - lo_value);
                return lo_score + t * (hi_score - lo_score);
            }
        }
        SCORE_FLOOR
    }

    pub fn best(&self) -> f64 {
        self.breakpoints[0].0
    }

    pub fn replacement(&self) -> f64 {
        self.breakpoints[5].0
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        for (value, _) in &self.breakpoints {
            value.to_bits().hash(state);
        }
        self.sample_size.hash(state);
    }
}

/// Tiers for every signal at one position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionTiers {
    pub points: Option<Tiers>,
    pub auction_value: Option<Tiers>,
    /// Built over negated ADP so that earlier picks score higher.
    pub adp: Option<Tiers>,
    pub schedule: Option<Tiers>,
}

impl PositionTiers {
    /// Compute tiers from the available players at one position. Players with
    /// an unknown signal are left out of that signal's sample.
    pub fn compute<'a>(players: impl IntoIterator<Item = &'a Player>, starters: usize) -> Self {
        let mut points = Vec::new();
        let mut values = Vec::new();
        let mut adps = Vec::new();
        let mut schedules = Vec::new();
        for p in players {
            points.push(p.projected_points);
            if let Some(v) = p.auction_value {
                values.push(v);
            }
            if let Some(a) = p.adp {
                adps.push(-a);
            }
            if let Some(s) = p.strength_of_schedule {
                schedules.push(s);
            }
        }

        PositionTiers {
            points: Tiers::from_values(&points, starters),
            auction_value: Tiers::from_values(&values, starters),
            adp: Tiers::from_values(&adps, starters),
            // Schedule ease has no starter landmark; split at the median.
            schedule: Tiers::from_values(&schedules, 0),
        }
    }

    pub fn normalize_points(&self, points: f64) -> Option<f64> {
        self.points.as_ref().map(|t| t.normalize(points))
    }

    pub fn normalize_auction_value(&self, value: Option<f64>) -> Option<f64> {
        Some(self.auction_value.as_ref()?.normalize(value?))
    }

    pub fn normalize_adp(&self, adp: Option<f64>) -> Option<f64> {
        Some(self.adp.as_ref()?.normalize(-adp?))
    }

    pub fn normalize_schedule(&self, sos: Option<f64>) -> Option<f64> {
        Some(self.schedule.as_ref()?.normalize(sos?))
    }

    /// Stable fingerprint of every breakpoint, for memo keys.
    pub fn fingerprint<H: Hasher>(&self, state: &mut H) {
        for tiers in [&self.points, &self.auction_value, &self.adp, &self.schedule] {
            match tiers {
                Some(t) => {
                    1u8.hash(state);
                    t.hash_into(state);
                }
                None => 0u8.hash(state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{InjuryStatus, Position, Trend};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn make_player(id: &str, points: f64, adp: Option<f64>) -> Player {
        Player {
            id: id.into(),
            name: id.into(),
            position: Position::RB,
            team: "DAL".into(),
            projected_points: points,
            auction_value: None,
            adp,
            age: None,
            injury_status: InjuryStatus::Healthy,
            strength_of_schedule: None,
            trend: Trend::Stable,
        }
    }

    #[test]
    fn empty_sample_has_no_tiers() {
        assert!(Tiers::from_values(&[], 12).is_none());
    }

    #[test]
    fn single_value_scores_max() {
        let tiers = Tiers::from_values(&[150.0], 12).unwrap();
        assert_eq!(tiers.normalize(150.0), 100.0);
        assert_eq!(tiers.normalize(10.0), 0.0);
    }

    #[test]
    fn best_is_100_and_worst_is_0() {
        let values: Vec<f64> = (0..40).map(|i| 300.0 - i as f64 * 5.0).collect();
        let tiers = Tiers::from_values(&values, 12).unwrap();
        assert_eq!(tiers.normalize(300.0), 100.0);
        assert_eq!(tiers.normalize(105.0), 0.0);
        assert_eq!(tiers.normalize(500.0), 100.0);
    }

    #[test]
    fn landmarks_hit_their_scores() {
        let values: Vec<f64> = (0..40).map(|i| 300.0 - i as f64 * 5.0).collect();
        let tiers = Tiers::from_values(&values, 12).unwrap();
        // 3rd best is the elite landmark
        assert!(approx_eq(tiers.normalize(290.0), 92.0, 1e-9));
        // 12th best is the last starter, 13th is replacement
        assert!(approx_eq(tiers.normalize(245.0), 60.0, 1e-9));
        assert!(approx_eq(tiers.replacement(), 240.0, 1e-9));
        assert!(approx_eq(tiers.normalize(240.0), 45.0, 1e-9));
    }

    #[test]
    fn normalization_is_monotone() {
        let values = [312.0, 280.0, 279.0, 200.0, 199.0, 150.0, 140.0, 90.0, 88.0, 20.0];
        let tiers = Tiers::from_values(&values, 4).unwrap();
        let mut last = -1.0;
        for step in 0..=350 {
            let score = tiers.normalize(step as f64);
            assert!(score >= last, "score dropped at {step}");
            assert!((0.0..=100.0).contains(&score));
            last = score;
        }
    }

    #[test]
    fn tied_values_do_not_divide_by_zero() {
        let tiers = Tiers::from_values(&[100.0, 100.0, 100.0, 100.0], 2).unwrap();
        assert_eq!(tiers.normalize(100.0), 100.0);
        assert_eq!(tiers.normalize(99.0), 0.0);
    }

    #[test]
    fn adp_tiers_reward_earlier_picks() {
        let players = vec![
            make_player("a", 250.0, Some(3.0)),
            make_player("b", 200.0, Some(15.0)),
            make_player("c", 150.0, Some(60.0)),
            make_player("d", 100.0, None),
        ];
        let tiers = PositionTiers::compute(&players, 2);
        let early = tiers.normalize_adp(Some(3.0)).unwrap();
        let late = tiers.normalize_adp(Some(60.0)).unwrap();
        assert!(early > late);
        assert_eq!(tiers.adp.as_ref().unwrap().sample_size, 3);
        assert_eq!(tiers.normalize_adp(None), None);
        assert_eq!(tiers.normalize_auction_value(Some(10.0)), None);
        assert_eq!(tiers.points.as_ref().unwrap().sample_size, 4);
    }

    #[test]
    fn fingerprint_changes_with_sample() {
        use std::collections::hash_map::DefaultHasher;

        let players = vec![make_player("a", 250.0, Some(3.0)), make_player("b", 200.0, None)];
        let full = PositionTiers::compute(&players, 1);
        let partial = PositionTiers::compute(&players[1..], 1);

        let hash = |t: &PositionTiers| {
            let mut h = DefaultHasher::new();
            t.fingerprint(&mut h);
            h.finish()
        };
        assert_ne!(hash(&full), hash(&partial));
        assert_eq!(hash(&full), hash(&full.clone()));
    }
}
