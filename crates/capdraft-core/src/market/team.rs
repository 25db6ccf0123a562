// Per-team budget and roster bookkeeping during the auction.

use serde::{Deserialize, Serialize};

use crate::optimizer::composition::RosterComposition;
use crate::player::Position;

/// A player on a team's roster with the price paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player_id: String,
    pub position: Position,
    pub price: u32,
}

/// The state of a single team during the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamState {
    pub team_id: String,
    /// Fixed salary cap for the draft.
    pub budget: u32,
    pub spent: u32,
    pub remaining: u32,
    pub roster: Vec<RosterEntry>,
    pub roster_size: usize,
    /// Positions whose dedicated slot count is not yet met, in position order.
    pub needs: Vec<Position>,
}

impl TeamState {
    pub fn new(team_id: impl Into<String>, budget: u32, composition: &RosterComposition) -> Self {
        let mut team = TeamState {
            team_id: team_id.into(),
            budget,
            spent: 0,
            remaining: budget,
            roster: Vec::new(),
            roster_size: composition.size(),
            needs: Vec::new(),
        };
        team.refresh_needs(composition);
        team
    }

    pub fn slots_left(&self) -> usize {
        self.roster_size.saturating_sub(self.roster.len())
    }

    /// Maximum bid given the remaining budget.
    ///
    /// Reserves $1 for each empty slot after the one being bid on. Zero when
    /// the roster is full.
    pub fn max_bid(&self) -> u32 {
        let empty = self.slots_left();
        if empty == 0 {
            return 0;
        }
        self.remaining.saturating_sub((empty - 1) as u32)
    }

    pub fn count_at(&self, pos: Position) -> usize {
        self.roster.iter().filter(|e| e.position == pos).count()
    }

    pub fn has_need(&self, pos: Position) -> bool {
        self.needs.contains(&pos)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.roster.iter().any(|e| e.player_id == player_id)
    }

    pub(crate) fn add(&mut self, entry: RosterEntry, composition: &RosterComposition) {
        self.spent += entry.price;
        self.remaining -= entry.price;
        self.roster.push(entry);
        self.refresh_needs(composition);
    }

    /// Remove the most recent roster entry matching `player_id` and `price`.
    pub(crate) fn remove(
        &mut self,
        player_id: &str,
        price: u32,
        composition: &RosterComposition,
    ) -> Option<RosterEntry> {
        let idx = self
            .roster
            .iter()
            .rposition(|e| e.player_id == player_id && e.price == price)?;
        let entry = self.roster.remove(idx);
        self.spent -= entry.price;
        self.remaining += entry.price;
        self.refresh_needs(composition);
        Some(entry)
    }

    fn refresh_needs(&mut self, composition: &RosterComposition) {
        self.needs = composition
            .positions()
            .filter(|&pos| self.count_at(pos) < composition.required(pos))
            .collect();
    }
}
