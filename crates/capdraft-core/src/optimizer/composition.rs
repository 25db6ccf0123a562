// Roster composition: dedicated position slots plus FLEX.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::player::Position;

/// What a single roster slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotKind {
    Position(Position),
    /// Any flex-eligible position (RB/WR/TE).
    Flex,
}

impl SlotKind {
    pub fn accepts(&self, pos: Position) -> bool {
        match self {
            SlotKind::Position(p) => *p == pos,
            SlotKind::Flex => pos.is_flex_eligible(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SlotKind::Position(p) => p.display_str(),
            SlotKind::Flex => "FLEX",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Required slot counts for one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterComposition {
    required: BTreeMap<Position, usize>,
    flex: usize,
}

impl RosterComposition {
    /// Build from config keys such as `"QB"`, `"D/ST"` or `"FLEX"`. Unknown
    /// keys are ignored; config validation rejects them before this runs.
    pub fn from_counts(counts: &BTreeMap<String, usize>) -> Self {
        let mut required = BTreeMap::new();
        let mut flex = 0;
        for (key, &count) in counts {
            if key.eq_ignore_ascii_case("FLEX") {
                flex += count;
            } else if let Some(pos) = Position::from_str_pos(key) {
                *required.entry(pos).or_insert(0) += count;
            }
        }
        RosterComposition { required, flex }
    }

    pub fn new(required: impl IntoIterator<Item = (Position, usize)>, flex: usize) -> Self {
        RosterComposition {
            required: required.into_iter().filter(|(_, n)| *n > 0).collect(),
            flex,
        }
    }

    /// Dedicated slots for `pos` (FLEX not included).
    pub fn required(&self, pos: Position) -> usize {
        self.required.get(&pos).copied().unwrap_or(0)
    }

    pub fn flex(&self) -> usize {
        self.flex
    }

    pub fn size(&self) -> usize {
        self.required.values().sum::<usize>() + self.flex
    }

    /// Every slot, dedicated positions in `order` first, FLEX last.
    /// Positions missing from `order` follow in `Position::ALL` order.
    pub fn slots_in_order(&self, order: &[Position]) -> Vec<SlotKind> {
        let mut seen = Vec::new();
        let mut slots = Vec::with_capacity(self.size());
        for &pos in order.iter().chain(Position::ALL.iter()) {
            if seen.contains(&pos) {
                continue;
            }
            seen.push(pos);
            slots.extend(std::iter::repeat(SlotKind::Position(pos)).take(self.required(pos)));
        }
        slots.extend(std::iter::repeat(SlotKind::Flex).take(self.flex));
        slots
    }

    /// Positions with dedicated slots, in `Position::ALL` order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        Position::ALL
            .into_iter()
            .filter(move |p| self.required(*p) > 0)
    }

    /// Config-style counts, the inverse of `from_counts`.
    pub fn to_counts(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = self
            .required
            .iter()
            .map(|(pos, &n)| (pos.display_str().to_string(), n))
            .collect();
        if self.flex > 0 {
            counts.insert("FLEX".into(), self.flex);
        }
        counts
    }
}

impl Default for RosterComposition {
    /// QB2 / RB4 / WR4 / TE2 / K1 / DST1 / FLEX2.
    fn default() -> Self {
        RosterComposition::new(
            [
                (Position::QB, 2),
                (Position::RB, 4),
                (Position::WR, 4),
                (Position::TE, 2),
                (Position::K, 1),
                (Position::DST, 1),
            ],
            2,
        )
    }
}
