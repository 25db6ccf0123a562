// Player catalog: the loaded player pool plus out-of-band patches.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::error::{DraftError, ValidationError};
use crate::player::{Player, PlayerPatch, PlayerRecord, Position};

/// Immutable-per-snapshot collection of players.
///
/// Availability is tracked by the market; the catalog only changes through
/// `apply_patch`, which bumps the revision of the patched player's position
/// so cached tiers for that position go stale.
#[derive(Debug, Clone, Default)]
pub struct PlayerCatalog {
    players: Vec<Player>,
    index: HashMap<String, usize>,
    position_revisions: BTreeMap<Position, u64>,
}

impl PlayerCatalog {
    /// Build a catalog from raw feed records. Invalid records are skipped and
    /// returned alongside the catalog.
    pub fn from_records(
        records: impl IntoIterator<Item = PlayerRecord>,
    ) -> (Self, Vec<ValidationError>) {
        let mut errors = Vec::new();
        let players: Vec<Player> = records
            .into_iter()
            .filter_map(|raw| match Player::try_from(raw) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("skipping player record: {}", e);
                    errors.push(e);
                    None
                }
            })
            .collect();

        let (catalog, mut dupes) = Self::from_players(players);
        errors.append(&mut dupes);
        (catalog, errors)
    }

    /// Build a catalog from already-validated players. The first occurrence of
    /// an id wins; later duplicates are reported.
    pub fn from_players(players: Vec<Player>) -> (Self, Vec<ValidationError>) {
        let mut catalog = PlayerCatalog::default();
        let mut errors = Vec::new();

        for player in players {
            if catalog.index.contains_key(&player.id) {
                warn!("skipping duplicate player id '{}'", player.id);
                errors.push(ValidationError::DuplicateId { record: player.id });
                continue;
            }
            catalog.index.insert(player.id.clone(), catalog.players.len());
            catalog.players.push(player);
        }

        info!(
            "Catalog loaded: {} players ({} records skipped)",
            catalog.players.len(),
            errors.len()
        );
        (catalog, errors)
    }

    pub fn get(&self, player_id: &str) -> Option<&Player> {
        self.index.get(player_id).map(|&i| &self.players[i])
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.index.contains_key(player_id)
    }

    /// All players in load order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn by_position(&self, pos: Position) -> impl Iterator<Item = &Player> + '_ {
        self.players.iter().filter(move |p| p.position == pos)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Number of patches applied so far to players at `pos`.
    pub fn position_revision(&self, pos: Position) -> u64 {
        self.position_revisions.get(&pos).copied().unwrap_or(0)
    }

    /// Apply an out-of-band field update. Returns the patched player.
    pub fn apply_patch(&mut self, patch: &PlayerPatch) -> Result<&Player, DraftError> {
        let idx = *self
            .index
            .get(&patch.player_id)
            .ok_or_else(|| DraftError::UnknownPlayer(patch.player_id.clone()))?;
        let change = patch.change()?;

        let player = &mut self.players[idx];
        change.apply(player);
        *self.position_revisions.entry(player.position).or_insert(0) += 1;
        debug!("Patched {} field {}", patch.player_id, patch.field);

        Ok(&self.players[idx])
    }
}
