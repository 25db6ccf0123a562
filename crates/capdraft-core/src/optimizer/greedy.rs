// Greedy budget-constrained roster builder with a same-position repair pass.
//
// Slots are filled in a fixed position order, FLEX last. Every choice keeps
// $1 in reserve for each slot still open, so a filled roster never spends
// more than the budget.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::error::{DraftError, InfeasibleConstraintError, ShortfallReason};
use crate::optimizer::allocation::BudgetAllocation;
use crate::optimizer::composition::{RosterComposition, SlotKind};
use crate::player::{Player, Position};

/// Order in which dedicated slots are filled.
pub const FILL_ORDER: [Position; 6] = [
    Position::RB,
    Position::WR,
    Position::QB,
    Position::TE,
    Position::DST,
    Position::K,
];

/// Over-target picks aim for this fraction of the slot target.
const TARGET_AIM: f64 = 0.8;

/// A player the roster must keep at a fixed price.
#[derive(Debug, Clone, PartialEq)]
pub struct LockedPick {
    pub player: Player,
    pub price: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterPick {
    pub slot: SlotKind,
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub price: u32,
    pub projected_points: f64,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedRoster {
    /// Filled slots in fill order.
    pub picks: Vec<RosterPick>,
    pub total_spent: u32,
    pub total_projected_points: f64,
    pub remaining_budget: u32,
    pub shortfalls: Vec<InfeasibleConstraintError>,
    /// Swaps applied by the repair pass.
    pub swaps: usize,
}

impl OptimizedRoster {
    pub fn is_complete(&self) -> bool {
        self.shortfalls.is_empty()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.picks.iter().any(|p| p.player_id == player_id)
    }
}

#[derive(Debug, Clone, Copy)]
struct Chosen<'a> {
    player: &'a Player,
    price: u32,
    locked: bool,
}

#[derive(Debug, Clone)]
pub struct RosterOptimizer {
    shares: BTreeMap<Position, f64>,
}

impl Default for RosterOptimizer {
    fn default() -> Self {
        RosterOptimizer::from_strategy(&StrategyConfig::default())
    }
}

impl RosterOptimizer {
    pub fn new(shares: BTreeMap<Position, f64>) -> Self {
        RosterOptimizer { shares }
    }

    pub fn from_strategy(strategy: &StrategyConfig) -> Self {
        RosterOptimizer::new(strategy.budget_allocation.clone())
    }

    /// Build the best roster `pool` allows within `budget`.
    ///
    /// Locked picks occupy their slots first (a dedicated slot if one is
    /// open, otherwise FLEX) and count against the budget. Slots that cannot
    /// be filled are reported in `shortfalls` instead of failing; only a
    /// locked pick with nowhere to go is an error.
    pub fn optimize<'a>(
        &self,
        pool: impl IntoIterator<Item = &'a Player>,
        budget: u32,
        composition: &RosterComposition,
        locked: &'a [LockedPick],
    ) -> Result<OptimizedRoster, DraftError> {
        let slots = composition.slots_in_order(&FILL_ORDER);
        let mut fills: Vec<Option<Chosen<'a>>> = vec![None; slots.len()];
        let mut short = vec![false; slots.len()];
        let mut used: HashSet<&'a str> = HashSet::new();
        let mut spent: u32 = 0;

        for lp in locked {
            let pos = lp.player.position;
            if !used.insert(lp.player.id.as_str()) {
                return Err(DraftError::LockedPickUnplaceable {
                    player_id: lp.player.id.clone(),
                    message: "locked more than once".into(),
                });
            }
            if spent + lp.price > budget {
                return Err(DraftError::LockedPickUnplaceable {
                    player_id: lp.player.id.clone(),
                    message: format!(
                        "${} on top of ${} already locked exceeds the ${} budget",
                        lp.price, spent, budget
                    ),
                });
            }
            let open = |kind: SlotKind| {
                slots
                    .iter()
                    .enumerate()
                    .position(|(i, s)| *s == kind && fills[i].is_none())
            };
            let idx = open(SlotKind::Position(pos))
                .or_else(|| pos.is_flex_eligible().then(|| open(SlotKind::Flex)).flatten())
                .ok_or_else(|| DraftError::LockedPickUnplaceable {
                    player_id: lp.player.id.clone(),
                    message: format!("no open {pos} or FLEX slot"),
                })?;
            fills[idx] = Some(Chosen {
                player: &lp.player,
                price: lp.price,
                locked: true,
            });
            spent += lp.price;
        }

        let mut by_pos: BTreeMap<Position, Vec<&'a Player>> = BTreeMap::new();
        let mut seen: HashSet<&'a str> = HashSet::new();
        for player in pool {
            if used.contains(player.id.as_str()) || !seen.insert(player.id.as_str()) {
                continue;
            }
            by_pos.entry(player.position).or_default().push(player);
        }
        for players in by_pos.values_mut() {
            players.sort_by(|a, b| {
                b.projected_points
                    .partial_cmp(&a.projected_points)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        let allocation = BudgetAllocation::from_shares(&self.shares, budget);
        let mut shortfalls = Vec::new();

        for i in 0..slots.len() {
            if fills[i].is_some() {
                continue;
            }
            let slot = slots[i];
            let open_after = (i + 1..slots.len())
                .filter(|&j| fills[j].is_none() && !short[j])
                .count() as u32;
            let spend_cap = (budget - spent).saturating_sub(open_after);

            let eligible: Vec<&'a Player> = by_pos
                .iter()
                .filter(|(pos, _)| slot.accepts(**pos))
                .flat_map(|(_, players)| players.iter().copied())
                .filter(|p| !used.contains(p.id.as_str()))
                .collect();

            let reason = if eligible.is_empty() {
                Some(ShortfallReason::NoEligiblePlayers)
            } else {
                None
            };
            let affordable: Vec<&'a Player> = eligible
                .iter()
                .copied()
                .filter(|p| p.market_price() <= spend_cap)
                .collect();
            let reason = reason.or_else(|| {
                affordable.is_empty().then(|| ShortfallReason::Unaffordable {
                    cheapest: eligible.iter().map(|p| p.market_price()).min().unwrap_or(0),
                    spend_cap,
                })
            });
            if let Some(reason) = reason {
                let err = InfeasibleConstraintError {
                    slot: slot.label().to_string(),
                    position: match slot {
                        SlotKind::Position(p) => Some(p),
                        SlotKind::Flex => None,
                    },
                    reason,
                };
                warn!("Roster shortfall: {}", err);
                short[i] = true;
                shortfalls.push(err);
                continue;
            }

            let pick = match slot {
                SlotKind::Position(pos) => {
                    pick_for_target(&affordable, allocation.slot_target(pos, composition))
                }
                SlotKind::Flex => pick_best_value(&affordable),
            };
            // `affordable` is non-empty here, so both pickers return a player.
            let Some(player) = pick else { continue };
            let price = player.market_price();
            debug!(
                "Filled {} slot with {} (${}, {:.1} pts)",
                slot, player.id, price, player.projected_points
            );
            used.insert(player.id.as_str());
            spent += price;
            fills[i] = Some(Chosen {
                player,
                price,
                locked: false,
            });
        }

        let swaps = if shortfalls.is_empty() {
            repair(&mut fills, &by_pos, &mut used, budget)
        } else {
            0
        };

        let picks: Vec<RosterPick> = slots
            .iter()
            .zip(&fills)
            .filter_map(|(slot, fill)| {
                fill.map(|c| RosterPick {
                    slot: *slot,
                    player_id: c.player.id.clone(),
                    name: c.player.name.clone(),
                    position: c.player.position,
                    price: c.price,
                    projected_points: c.player.projected_points,
                    locked: c.locked,
                })
            })
            .collect();
        let total_spent: u32 = picks.iter().map(|p| p.price).sum();
        let total_projected_points: f64 = picks.iter().map(|p| p.projected_points).sum();

        info!(
            "Optimized roster: {}/{} slots, ${} of ${} spent, {:.1} projected pts, {} swaps",
            picks.len(),
            slots.len(),
            total_spent,
            budget,
            total_projected_points,
            swaps
        );

        Ok(OptimizedRoster {
            picks,
            total_spent,
            total_projected_points,
            remaining_budget: budget.saturating_sub(total_spent),
            shortfalls,
            swaps,
        })
    }
}

/// Highest-scoring player priced at or under `target`; otherwise the player
/// priced closest to `TARGET_AIM` of the target.
fn pick_for_target<'a>(candidates: &[&'a Player], target: f64) -> Option<&'a Player> {
    let aim = TARGET_AIM * target;
    let distance = |p: &Player| (p.market_price() as f64 - aim).abs();

    let within: Vec<&'a Player> = candidates
        .iter()
        .copied()
        .filter(|p| p.market_price() as f64 <= target)
        .collect();

    if !within.is_empty() {
        return within.into_iter().max_by(|a, b| {
            a.projected_points
                .partial_cmp(&b.projected_points)
                .unwrap_or(Ordering::Equal)
                .then_with(|| distance(b).partial_cmp(&distance(a)).unwrap_or(Ordering::Equal))
                .then_with(|| b.id.cmp(&a.id))
        });
    }

    candidates.iter().copied().min_by(|a, b| {
        distance(a)
            .partial_cmp(&distance(b))
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.projected_points
                    .partial_cmp(&a.projected_points)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    })
}

/// FLEX choice: best projected points per dollar.
fn pick_best_value<'a>(candidates: &[&'a Player]) -> Option<&'a Player> {
    let per_dollar = |p: &Player| p.projected_points / p.market_price() as f64;
    candidates.iter().copied().max_by(|a, b| {
        per_dollar(a)
            .partial_cmp(&per_dollar(b))
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                a.projected_points
                    .partial_cmp(&b.projected_points)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| b.id.cmp(&a.id))
    })
}

/// Apply the first improving same-position swap that fits the budget until
/// none is left. Locked picks stay put. Returns the number of swaps.
fn repair<'a>(
    fills: &mut [Option<Chosen<'a>>],
    by_pos: &BTreeMap<Position, Vec<&'a Player>>,
    used: &mut HashSet<&'a str>,
    budget: u32,
) -> usize {
    let mut swaps = 0;
    loop {
        let total: u32 = fills.iter().flatten().map(|c| c.price).sum();
        let mut swapped = false;

        'slots: for fill in fills.iter_mut() {
            let Some(current) = *fill else { continue };
            if current.locked {
                continue;
            }
            let Some(candidates) = by_pos.get(&current.player.position) else {
                continue;
            };
            // Sorted by points descending: stop at the first non-improvement.
            for &candidate in candidates {
                if candidate.projected_points <= current.player.projected_points {
                    break;
                }
                if used.contains(candidate.id.as_str()) {
                    continue;
                }
                let price = candidate.market_price();
                if total - current.price + price > budget {
                    continue;
                }
                debug!(
                    "Repair swap: {} -> {} (${} -> ${})",
                    current.player.id, candidate.id, current.price, price
                );
                used.remove(current.player.id.as_str());
                used.insert(candidate.id.as_str());
                *fill = Some(Chosen {
                    player: candidate,
                    price,
                    locked: false,
                });
                swaps += 1;
                swapped = true;
                break 'slots;
            }
        }

        if !swapped {
            return swaps;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{InjuryStatus, Trend};

    fn make_player(id: &str, pos: Position, points: f64, price: u32) -> Player {
        Player {
            id: id.into(),
            name: format!("Player {id}"),
            position: pos,
            team: "KC".into(),
            projected_points: points,
            auction_value: Some(price as f64),
            adp: None,
            age: None,
            injury_status: InjuryStatus::Healthy,
            strength_of_schedule: None,
            trend: Trend::Stable,
        }
    }

    /// Three QBs ($30 / $20 / $5) and cheap depth everywhere else.
    fn deep_pool() -> Vec<Player> {
        let mut players = vec![
            make_player("qb_a", Position::QB, 350.0, 30),
            make_player("qb_b", Position::QB, 300.0, 20),
            make_player("qb_c", Position::QB, 200.0, 5),
        ];
        for i in 0..8 {
            let f = i as f64;
            players.push(make_player(&format!("rb{i}"), Position::RB, 250.0 - f * 20.0, 10));
            players.push(make_player(&format!("wr{i}"), Position::WR, 220.0 - f * 15.0, 8));
        }
        for i in 0..3 {
            players.push(make_player(&format!("te{i}"), Position::TE, 150.0 - i as f64 * 20.0, 4));
        }
        for i in 0..2 {
            players.push(make_player(&format!("k{i}"), Position::K, 130.0 - i as f64 * 10.0, 1));
            players.push(make_player(&format!("dst{i}"), Position::DST, 120.0 - i as f64 * 10.0, 1));
        }
        players
    }

    /// Everything at $1, plus a $3 star RB.
    fn bargain_pool() -> Vec<Player> {
        let mut players = vec![make_player("rb_star", Position::RB, 400.0, 3)];
        let counts = [
            (Position::QB, 3),
            (Position::RB, 6),
            (Position::WR, 6),
            (Position::TE, 3),
            (Position::K, 2),
            (Position::DST, 2),
        ];
        for (pos, n) in counts {
            for i in 0..n {
                let id = format!("{}{}", pos.display_str().to_lowercase(), i);
                players.push(make_player(&id, pos, 100.0 - i as f64, 1));
            }
        }
        players
    }

    fn assert_reserve_invariant(roster: &OptimizedRoster, budget: u32) {
        assert!(roster.total_spent <= budget);
        assert_eq!(roster.total_spent + roster.remaining_budget, budget);
        assert!(roster.picks.iter().all(|p| p.price >= 1));
    }

    #[test]
    fn fills_default_roster_and_upgrades_quarterback() {
        let pool = deep_pool();
        let roster = RosterOptimizer::default()
            .optimize(&pool, 200, &RosterComposition::default(), &[])
            .unwrap();

        assert!(roster.is_complete());
        assert_eq!(roster.picks.len(), 16);
        assert_reserve_invariant(&roster, 200);

        // Greedy takes the $5 and $20 QBs; repair trades the $5 one up.
        assert!(roster.contains("qb_a"));
        assert!(roster.contains("qb_b"));
        assert!(!roster.contains("qb_c"));
        assert_eq!(roster.swaps, 1);
        assert_eq!(roster.total_spent, 144);
    }

    #[test]
    fn quarterback_only_roster_picks_top_two() {
        let pool = deep_pool();
        let comp = RosterComposition::new([(Position::QB, 2)], 0);
        let roster = RosterOptimizer::default()
            .optimize(&pool, 200, &comp, &[])
            .unwrap();

        let mut ids: Vec<&str> = roster.picks.iter().map(|p| p.player_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["qb_a", "qb_b"]);
        assert_eq!(roster.total_spent, 50);
    }

    #[test]
    fn minimum_budget_spends_exactly_one_dollar_per_slot() {
        let pool = bargain_pool();
        let roster = RosterOptimizer::default()
            .optimize(&pool, 16, &RosterComposition::default(), &[])
            .unwrap();

        assert!(roster.is_complete());
        assert_eq!(roster.picks.len(), 16);
        assert_eq!(roster.total_spent, 16);
        assert_eq!(roster.remaining_budget, 0);
        assert!(!roster.contains("rb_star"));
    }

    #[test]
    fn minimum_budget_reports_unaffordable_slot() {
        let pool: Vec<Player> = bargain_pool()
            .into_iter()
            .filter(|p| p.position != Position::K)
            .chain(std::iter::once(make_player("k_pricey", Position::K, 120.0, 2)))
            .collect();
        let roster = RosterOptimizer::default()
            .optimize(&pool, 16, &RosterComposition::default(), &[])
            .unwrap();

        assert!(!roster.is_complete());
        assert_eq!(roster.shortfalls.len(), 1);
        let short = &roster.shortfalls[0];
        assert_eq!(short.slot, "K");
        assert_eq!(short.position, Some(Position::K));
        assert_eq!(
            short.reason,
            ShortfallReason::Unaffordable {
                cheapest: 2,
                spend_cap: 1
            }
        );
        assert_eq!(roster.picks.len(), 15);
        assert_reserve_invariant(&roster, 16);
        assert_eq!(roster.swaps, 0);
    }

    #[test]
    fn empty_position_is_a_shortfall_not_an_error() {
        let pool: Vec<Player> = deep_pool()
            .into_iter()
            .filter(|p| p.position != Position::TE)
            .collect();
        let roster = RosterOptimizer::default()
            .optimize(&pool, 200, &RosterComposition::default(), &[])
            .unwrap();

        assert_eq!(roster.shortfalls.len(), 2);
        assert!(roster
            .shortfalls
            .iter()
            .all(|s| s.position == Some(Position::TE)
                && s.reason == ShortfallReason::NoEligiblePlayers));
        assert_eq!(roster.picks.len(), 14);
        // No repair on a partial roster.
        assert!(roster.contains("qb_c"));
    }

    #[test]
    fn locked_picks_hold_their_slot_and_price() {
        let pool = deep_pool();
        let locked = vec![LockedPick {
            player: make_player("qb_locked", Position::QB, 100.0, 40),
            price: 40,
        }];
        let roster = RosterOptimizer::default()
            .optimize(&pool, 200, &RosterComposition::default(), &locked)
            .unwrap();

        assert!(roster.is_complete());
        let pick = roster
            .picks
            .iter()
            .find(|p| p.player_id == "qb_locked")
            .unwrap();
        assert!(pick.locked);
        assert_eq!(pick.price, 40);
        assert_eq!(pick.slot, SlotKind::Position(Position::QB));
        // The open QB slot still gets upgraded.
        assert!(roster.contains("qb_a"));
        assert_reserve_invariant(&roster, 200);
    }

    #[test]
    fn locked_pick_without_a_slot_is_rejected() {
        let comp = RosterComposition::new([(Position::K, 1)], 0);
        let locked = vec![
            LockedPick {
                player: make_player("k1", Position::K, 120.0, 1),
                price: 1,
            },
            LockedPick {
                player: make_player("k2", Position::K, 110.0, 1),
                price: 1,
            },
        ];
        let err = RosterOptimizer::default()
            .optimize(std::iter::empty(), 10, &comp, &locked)
            .unwrap_err();
        assert!(matches!(
            err,
            DraftError::LockedPickUnplaceable { ref player_id, .. } if player_id == "k2"
        ));
    }

    #[test]
    fn locked_picks_over_budget_are_rejected() {
        let comp = RosterComposition::new([(Position::QB, 1)], 0);
        let locked = vec![LockedPick {
            player: make_player("qb1", Position::QB, 300.0, 11),
            price: 11,
        }];
        let result = RosterOptimizer::default().optimize(std::iter::empty(), 10, &comp, &locked);
        assert!(matches!(
            result,
            Err(DraftError::LockedPickUnplaceable { .. })
        ));
    }

    #[test]
    fn locked_flex_player_spills_into_flex() {
        let comp = RosterComposition::new([(Position::RB, 1)], 1);
        let locked = vec![
            LockedPick {
                player: make_player("rb_a", Position::RB, 200.0, 20),
                price: 20,
            },
            LockedPick {
                player: make_player("rb_b", Position::RB, 180.0, 15),
                price: 15,
            },
        ];
        let roster = RosterOptimizer::default()
            .optimize(std::iter::empty(), 50, &comp, &locked)
            .unwrap();
        assert_eq!(roster.picks[0].slot, SlotKind::Position(Position::RB));
        assert_eq!(roster.picks[1].slot, SlotKind::Flex);
        assert_eq!(roster.picks[1].player_id, "rb_b");
        assert_eq!(roster.total_spent, 35);
    }

    #[test]
    fn flex_prefers_points_per_dollar() {
        let pool = vec![
            make_player("rb_star", Position::RB, 300.0, 60),
            make_player("wr_value", Position::WR, 150.0, 10),
        ];
        let comp = RosterComposition::new(std::iter::empty(), 1);
        let roster = RosterOptimizer::default()
            .optimize(&pool, 100, &comp, &[])
            .unwrap();
        assert_eq!(roster.picks.len(), 1);
        assert_eq!(roster.picks[0].player_id, "wr_value");
    }

    #[test]
    fn duplicate_pool_entries_are_ignored() {
        let qb = make_player("qb_a", Position::QB, 350.0, 30);
        let pool = vec![&qb, &qb];
        let comp = RosterComposition::new([(Position::QB, 2)], 0);
        let roster = RosterOptimizer::default()
            .optimize(pool, 200, &comp, &[])
            .unwrap();
        assert_eq!(roster.picks.len(), 1);
        assert_eq!(roster.shortfalls.len(), 1);
    }
}
