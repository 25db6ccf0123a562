// SQLite persistence for draft snapshots.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use capdraft_core::market::{DraftEvent, DraftSnapshot, TeamBudget};
use capdraft_core::player::{Player, Position};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

/// SQLite-backed store for the player pool, draft events, team budgets and
/// key-value draft state. Rows are scoped by draft id.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at `path`. Pass `":memory:"` for an
    /// ephemeral database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                draft_id  TEXT NOT NULL,
                id        TEXT NOT NULL,
                ord       INTEGER NOT NULL,
                record    TEXT NOT NULL,
                PRIMARY KEY (draft_id, id)
            );

            CREATE TABLE IF NOT EXISTS draft_events (
                draft_id       TEXT NOT NULL,
                sequence       INTEGER NOT NULL,
                player_id      TEXT NOT NULL,
                team_id        TEXT NOT NULL,
                position       TEXT NOT NULL,
                price          INTEGER NOT NULL,
                expected_value REAL,
                timestamp      TEXT NOT NULL,
                PRIMARY KEY (draft_id, sequence)
            );

            CREATE TABLE IF NOT EXISTS team_budgets (
                draft_id  TEXT NOT NULL,
                team_id   TEXT NOT NULL,
                budget    INTEGER NOT NULL,
                spent     INTEGER NOT NULL,
                remaining INTEGER NOT NULL,
                PRIMARY KEY (draft_id, team_id)
            );

            CREATE TABLE IF NOT EXISTS draft_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned, which only happens after another
    /// thread panicked mid-query.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Replace everything stored for `draft_id` with `snapshot`, in one
    /// transaction.
    pub fn save_snapshot(&self, draft_id: &str, snapshot: &DraftSnapshot) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin snapshot transaction")?;

        for table in ["players", "draft_events", "team_budgets"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE draft_id = ?1"),
                params![draft_id],
            )
            .with_context(|| format!("failed to clear {table}"))?;
        }

        for (ord, player) in snapshot.players.iter().enumerate() {
            let record = serde_json::to_string(player).context("failed to serialize player")?;
            tx.execute(
                "INSERT INTO players (draft_id, id, ord, record) VALUES (?1, ?2, ?3, ?4)",
                params![draft_id, player.id, ord as i64, record],
            )
            .context("failed to insert player")?;
        }
        for event in &snapshot.events {
            insert_event(&tx, draft_id, event)?;
        }
        write_budgets(&tx, draft_id, &snapshot.teams)?;

        tx.commit().context("failed to commit snapshot")?;
        info!(
            "Saved snapshot {}: {} players, {} events, {} teams",
            draft_id,
            snapshot.players.len(),
            snapshot.events.len(),
            snapshot.teams.len()
        );
        Ok(())
    }

    /// Load the snapshot stored for `draft_id`, or `None` if nothing was
    /// saved under it.
    pub fn load_snapshot(&self, draft_id: &str) -> Result<Option<DraftSnapshot>> {
        let conn = self.conn();

        let mut stmt = conn
            .prepare("SELECT record FROM players WHERE draft_id = ?1 ORDER BY ord")
            .context("failed to prepare player query")?;
        let records = stmt
            .query_map(params![draft_id], |row| row.get::<_, String>(0))
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to read player rows")?;
        let players = records
            .iter()
            .map(|json| serde_json::from_str::<Player>(json))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to deserialize player record")?;

        let mut stmt = conn
            .prepare(
                "SELECT sequence, player_id, team_id, position, price, expected_value, timestamp
                 FROM draft_events WHERE draft_id = ?1 ORDER BY sequence",
            )
            .context("failed to prepare event query")?;
        let events = stmt
            .query_map(params![draft_id], |row| {
                let position: String = row.get(3)?;
                let timestamp: String = row.get(6)?;
                Ok(DraftEvent {
                    sequence: row.get(0)?,
                    player_id: row.get(1)?,
                    team_id: row.get(2)?,
                    position: parse_position(3, &position)?,
                    price: row.get(4)?,
                    expected_value: row.get(5)?,
                    timestamp: parse_timestamp(6, &timestamp)?,
                })
            })
            .context("failed to query draft events")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map draft event rows")?;

        let mut stmt = conn
            .prepare(
                "SELECT team_id, budget, spent, remaining
                 FROM team_budgets WHERE draft_id = ?1 ORDER BY team_id",
            )
            .context("failed to prepare team budget query")?;
        let teams = stmt
            .query_map(params![draft_id], |row| {
                Ok(TeamBudget {
                    team_id: row.get(0)?,
                    budget: row.get(1)?,
                    spent: row.get(2)?,
                    remaining: row.get(3)?,
                })
            })
            .context("failed to query team budgets")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team budget rows")?;

        if players.is_empty() && teams.is_empty() {
            return Ok(None);
        }
        Ok(Some(DraftSnapshot {
            players,
            events,
            teams,
        }))
    }

    // ------------------------------------------------------------------
    // Incremental updates
    // ------------------------------------------------------------------

    /// Append one event and the budgets it produced.
    pub fn record_event(&self, draft_id: &str, event: &DraftEvent, teams: &[TeamBudget]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin event transaction")?;
        insert_event(&tx, draft_id, event)?;
        write_budgets(&tx, draft_id, teams)?;
        tx.commit().context("failed to commit draft event")?;
        debug!("Persisted event #{} for {}", event.sequence, draft_id);
        Ok(())
    }

    /// Delete one event (an undo) and store the budgets left behind.
    pub fn remove_event(&self, draft_id: &str, sequence: u64, teams: &[TeamBudget]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin undo transaction")?;
        tx.execute(
            "DELETE FROM draft_events WHERE draft_id = ?1 AND sequence = ?2",
            params![draft_id, sequence],
        )
        .context("failed to delete draft event")?;
        write_budgets(&tx, draft_id, teams)?;
        tx.commit().context("failed to commit undo")?;
        debug!("Removed event #{} for {}", sequence, draft_id);
        Ok(())
    }

    /// Overwrite a stored player record, e.g. after a patch.
    pub fn update_player(&self, draft_id: &str, player: &Player) -> Result<()> {
        let conn = self.conn();
        let record = serde_json::to_string(player).context("failed to serialize player")?;
        let updated = conn
            .execute(
                "UPDATE players SET record = ?3 WHERE draft_id = ?1 AND id = ?2",
                params![draft_id, player.id, record],
            )
            .context("failed to update player")?;
        if updated == 0 {
            anyhow::bail!("player {} is not stored for draft {}", player.id, draft_id);
        }
        Ok(())
    }

    pub fn event_count(&self, draft_id: &str) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM draft_events WHERE draft_id = ?1",
                params![draft_id],
                |row| row.get(0),
            )
            .context("failed to count draft events")?;
        Ok(count as usize)
    }

    /// Delete every stored draft and all key-value state.
    pub fn clear_draft(&self) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        for table in ["players", "draft_events", "team_budgets", "draft_state"] {
            tx.execute(&format!("DELETE FROM {table}"), [])
                .with_context(|| format!("failed to clear {table}"))?;
        }
        tx.commit().context("failed to commit clear_draft")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Key-value state
    // ------------------------------------------------------------------

    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str = serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO draft_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM draft_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;
        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query draft state")?;

        match rows.next() {
            Some(row) => {
                let json_str = row.context("failed to read state row")?;
                let value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    const DRAFT_ID_KEY: &'static str = "current_draft_id";

    pub fn get_draft_id(&self) -> Result<Option<String>> {
        let value = self.load_state(Self::DRAFT_ID_KEY)?;
        Ok(value.and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    pub fn set_draft_id(&self, draft_id: &str) -> Result<()> {
        self.save_state(
            Self::DRAFT_ID_KEY,
            &serde_json::Value::String(draft_id.to_string()),
        )
    }

    /// `draft_YYYYMMDD_HHMMSS_mmm` from the current UTC time.
    pub fn generate_draft_id() -> String {
        Utc::now().format("draft_%Y%m%d_%H%M%S_%3f").to_string()
    }
}

fn insert_event(tx: &Transaction<'_>, draft_id: &str, event: &DraftEvent) -> Result<()> {
    tx.execute(
        "INSERT INTO draft_events
            (draft_id, sequence, player_id, team_id, position, price, expected_value, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            draft_id,
            event.sequence,
            event.player_id,
            event.team_id,
            event.position.display_str(),
            event.price,
            event.expected_value,
            event.timestamp.to_rfc3339(),
        ],
    )
    .context("failed to insert draft event")?;
    Ok(())
}

fn write_budgets(tx: &Transaction<'_>, draft_id: &str, teams: &[TeamBudget]) -> Result<()> {
    for team in teams {
        tx.execute(
            "INSERT OR REPLACE INTO team_budgets (draft_id, team_id, budget, spent, remaining)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![draft_id, team.team_id, team.budget, team.spent, team.remaining],
        )
        .context("failed to write team budget")?;
    }
    Ok(())
}

fn parse_position(idx: usize, text: &str) -> rusqlite::Result<Position> {
    Position::from_str_pos(text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown position {text}").into(),
        )
    })
}

fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
