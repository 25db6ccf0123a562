// Configuration loading and parsing (league.toml, strategy.toml).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::optimizer::composition::RosterComposition;
use crate::player::Position;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub strategy: StrategyConfig,
    pub db_path: String,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    pub num_teams: usize,
    pub salary_cap: u32,
    /// Explicit team ids. When empty, `team_1..team_N` is generated.
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub my_team: Option<String>,
    /// Roster composition, e.g. `{QB = 2, RB = 4, ..., FLEX = 2}`.
    pub roster: BTreeMap<String, usize>,
    /// Starters per team at each position (drives tiers and scarcity).
    pub starters: BTreeMap<Position, usize>,
}

impl LeagueConfig {
    /// Team ids participating in the draft.
    pub fn team_ids(&self) -> Vec<String> {
        if self.teams.is_empty() {
            (1..=self.num_teams).map(|i| format!("team_{i}")).collect()
        } else {
            self.teams.clone()
        }
    }

    pub fn composition(&self) -> RosterComposition {
        RosterComposition::from_counts(&self.roster)
    }

    /// Slots per team (sum of every roster entry).
    pub fn roster_size(&self) -> usize {
        self.roster.values().sum()
    }

    pub fn starters_per_team(&self, pos: Position) -> usize {
        self.starters.get(&pos).copied().unwrap_or(0)
    }

    /// League-wide starters at a position (per-team starters x team count).
    pub fn league_starters(&self, pos: Position) -> usize {
        self.starters_per_team(pos) * self.num_teams
    }
}

impl Default for LeagueConfig {
    /// 12 teams, $200 cap, QB2/RB4/WR4/TE2/K1/DST1/FLEX2.
    fn default() -> Self {
        let roster = [
            ("QB", 2),
            ("RB", 4),
            ("WR", 4),
            ("TE", 2),
            ("K", 1),
            ("DST", 1),
            ("FLEX", 2),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let starters = [
            (Position::QB, 1),
            (Position::RB, 2),
            (Position::WR, 3),
            (Position::TE, 1),
            (Position::K, 1),
            (Position::DST, 1),
        ]
        .into_iter()
        .collect();

        LeagueConfig {
            name: "Salary Cap League".into(),
            num_teams: 12,
            salary_cap: 200,
            teams: Vec::new(),
            my_team: None,
            roster,
            starters,
        }
    }
}

// ---------------------------------------------------------------------------
// strategy.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire strategy.toml file.
#[derive(Debug, Clone, Deserialize)]
struct StrategyFile {
    cvs_weights: CvsWeights,
    budget_allocation: BTreeMap<Position, f64>,
    market: MarketConfig,
    data_paths: DataPaths,
    database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

/// The public strategy config assembled from the strategy.toml sections.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub cvs_weights: CvsWeights,
    /// Share of the total budget the optimizer targets per position.
    pub budget_allocation: BTreeMap<Position, f64>,
    pub market: MarketConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        let budget_allocation = [
            (Position::QB, 0.15),
            (Position::RB, 0.42),
            (Position::WR, 0.33),
            (Position::TE, 0.08),
            (Position::K, 0.0125),
            (Position::DST, 0.0125),
        ]
        .into_iter()
        .collect();

        StrategyConfig {
            cvs_weights: CvsWeights::default(),
            budget_allocation,
            market: MarketConfig::default(),
        }
    }
}

/// Component weights of the composite value score. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CvsWeights {
    pub auction_value: f64,
    pub adp: f64,
    pub projected_points: f64,
    pub scarcity: f64,
    pub schedule: f64,
    pub trend: f64,
}

impl CvsWeights {
    pub fn total(&self) -> f64 {
        self.auction_value + self.adp + self.projected_points + self.scarcity + self.schedule + self.trend
    }
}

impl Default for CvsWeights {
    fn default() -> Self {
        CvsWeights {
            auction_value: 0.23,
            adp: 0.23,
            projected_points: 0.28,
            scarcity: 0.08,
            schedule: 0.10,
            trend: 0.08,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Number of most recent prices kept in each position's window.
    pub recent_window: usize,
    /// Fraction of league slots filled below which the draft is "early".
    pub early_phase_cutoff: f64,
    /// Fraction of league slots filled below which the draft is "middle".
    pub late_phase_cutoff: f64,
    /// Projected points a player must exceed to count as a quality option.
    pub quality_floor: BTreeMap<Position, f64>,
}

impl MarketConfig {
    pub fn quality_floor(&self, pos: Position) -> f64 {
        self.quality_floor.get(&pos).copied().unwrap_or(0.0)
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        let quality_floor = [
            (Position::QB, 250.0),
            (Position::RB, 120.0),
            (Position::WR, 120.0),
            (Position::TE, 90.0),
            (Position::K, 110.0),
            (Position::DST, 100.0),
        ]
        .into_iter()
        .collect();

        MarketConfig {
            recent_window: 5,
            early_phase_cutoff: 0.25,
            late_phase_cutoff: 0.70,
            quality_floor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
    #[serde(default)]
    pub patches: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/strategy.toml`, both relative to the given `base_dir`.
///
/// This does not auto-copy defaults. Prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    // --- strategy.toml (required) ---
    let strategy_path = config_dir.join("strategy.toml");
    let strategy_text = read_file(&strategy_path)?;
    let strategy_file: StrategyFile =
        toml::from_str(&strategy_text).map_err(|e| ConfigError::ParseError {
            path: strategy_path.clone(),
            source: e,
        })?;

    let config = Config {
        league: league_file.league,
        strategy: StrategyConfig {
            cvs_weights: strategy_file.cvs_weights,
            budget_allocation: strategy_file.budget_allocation,
            market: strategy_file.market,
        },
        db_path: strategy_file.database.path,
        data_paths: strategy_file.data_paths,
    };

    validate(&config.league, &config.strategy)?;

    Ok(config)
}

/// Files the app reads from `config/`, each seeded from `defaults/`.
const CONFIG_FILES: [&str; 2] = ["league.toml", "strategy.toml"];

/// Seed `config/` with any of [`CONFIG_FILES`] it lacks, copied from
/// `defaults/`. Files already in `config/` are never overwritten. Returns the
/// paths that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    let missing: Vec<&str> = CONFIG_FILES
        .iter()
        .copied()
        .filter(|name| {
            let present = config_dir.join(name).is_file();
            if present {
                debug!("Keeping existing config/{name}");
            }
            !present
        })
        .collect();
    if missing.is_empty() {
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create {}: {e}", config_dir.display()),
    })?;

    let mut copied = Vec::with_capacity(missing.len());
    for name in missing {
        let source = defaults_dir.join(name);
        if !source.is_file() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "config/{name} is missing and {} has no default to copy",
                    defaults_dir.display()
                ),
            });
        }
        let target = config_dir.join(name);
        std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to copy {} to {}: {e}", source.display(), target.display()),
        })?;
        info!("Seeded {} from defaults", target.display());
        copied.push(target);
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying default
/// config files first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Check league and strategy settings for internal consistency.
pub fn validate(league: &LeagueConfig, strategy: &StrategyConfig) -> Result<(), ConfigError> {
    if league.num_teams == 0 {
        return Err(invalid("league.num_teams", "must be greater than 0"));
    }
    if league.salary_cap == 0 {
        return Err(invalid("league.salary_cap", "must be greater than 0"));
    }
    if !league.teams.is_empty() && league.teams.len() != league.num_teams {
        return Err(invalid(
            "league.teams",
            format!(
                "lists {} teams but num_teams is {}",
                league.teams.len(),
                league.num_teams
            ),
        ));
    }
    for key in league.roster.keys() {
        if key.to_uppercase() != "FLEX" && Position::from_str_pos(key).is_none() {
            return Err(invalid(
                &format!("league.roster.{key}"),
                "not a known position or FLEX",
            ));
        }
    }
    let roster_size = league.roster_size();
    if roster_size == 0 {
        return Err(invalid("league.roster", "must contain at least one slot"));
    }
    if (league.salary_cap as usize) < roster_size {
        return Err(invalid(
            "league.salary_cap",
            format!("must cover $1 per roster slot ({roster_size})"),
        ));
    }

    let w = &strategy.cvs_weights;
    let weight_fields: &[(&str, f64)] = &[
        ("cvs_weights.auction_value", w.auction_value),
        ("cvs_weights.adp", w.adp),
        ("cvs_weights.projected_points", w.projected_points),
        ("cvs_weights.scarcity", w.scarcity),
        ("cvs_weights.schedule", w.schedule),
        ("cvs_weights.trend", w.trend),
    ];
    for (name, val) in weight_fields {
        if !val.is_finite() || *val < 0.0 {
            return Err(invalid(name, format!("must be >= 0, got {val}")));
        }
    }
    if (w.total() - 1.0).abs() > 1e-6 {
        return Err(invalid(
            "cvs_weights",
            format!("must sum to 1.0, got {}", w.total()),
        ));
    }

    let mut allocated = 0.0;
    for (pos, share) in &strategy.budget_allocation {
        if !share.is_finite() || *share < 0.0 {
            return Err(invalid(
                &format!("budget_allocation.{pos}"),
                format!("must be >= 0, got {share}"),
            ));
        }
        allocated += share;
    }
    if allocated > 1.0 + 1e-6 {
        return Err(invalid(
            "budget_allocation",
            format!("must not exceed 1.0 in total, got {allocated}"),
        ));
    }

    let m = &strategy.market;
    if m.recent_window == 0 {
        return Err(invalid("market.recent_window", "must be > 0"));
    }
    if !(0.0 < m.early_phase_cutoff
        && m.early_phase_cutoff < m.late_phase_cutoff
        && m.late_phase_cutoff < 1.0)
    {
        return Err(invalid(
            "market.early_phase_cutoff",
            format!(
                "need 0 < early ({}) < late ({}) < 1",
                m.early_phase_cutoff, m.late_phase_cutoff
            ),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
