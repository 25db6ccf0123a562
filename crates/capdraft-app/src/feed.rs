// PlayerFeed and PatchFeed loading.
//
// Player feeds come as either a JSON array of records or a CSV file whose
// header uses the same camelCase field names. Malformed CSV rows are skipped
// with a warning; record-level validation happens in the catalog.

use std::io::Read;
use std::path::Path;

use capdraft_core::catalog::PlayerCatalog;
use capdraft_core::error::ValidationError;
use capdraft_core::player::{PlayerPatch, PlayerRecord};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Reader-based loaders
// ---------------------------------------------------------------------------

pub fn records_from_csv_reader<R: Read>(rdr: R) -> Result<Vec<PlayerRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut records = Vec::new();
    for (row, result) in reader.deserialize::<PlayerRecord>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => warn!("skipping malformed player row {}: {}", row + 1, e),
        }
    }
    Ok(records)
}

pub fn records_from_json_reader<R: Read>(rdr: R) -> Result<Vec<PlayerRecord>, serde_json::Error> {
    serde_json::from_reader(rdr)
}

pub fn patches_from_json_reader<R: Read>(rdr: R) -> Result<Vec<PlayerPatch>, serde_json::Error> {
    serde_json::from_reader(rdr)
}

// ---------------------------------------------------------------------------
// Path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, FeedError> {
    std::fs::File::open(path).map_err(|e| FeedError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Load raw player records. `.csv` files are read as CSV, anything else as
/// a JSON array.
pub fn load_player_records(path: &Path) -> Result<Vec<PlayerRecord>, FeedError> {
    let file = open(path)?;
    let records = if is_csv(path) {
        records_from_csv_reader(file).map_err(|e| FeedError::Csv {
            path: path.display().to_string(),
            source: e,
        })?
    } else {
        records_from_json_reader(file).map_err(|e| FeedError::Json {
            path: path.display().to_string(),
            source: e,
        })?
    };
    info!("Read {} player records from {}", records.len(), path.display());
    Ok(records)
}

/// Load a player feed straight into a catalog. Records that fail validation
/// are returned next to the catalog.
pub fn load_catalog(path: &Path) -> Result<(PlayerCatalog, Vec<ValidationError>), FeedError> {
    let records = load_player_records(path)?;
    Ok(PlayerCatalog::from_records(records))
}

pub fn load_patches(path: &Path) -> Result<Vec<PlayerPatch>, FeedError> {
    let file = open(path)?;
    let patches = patches_from_json_reader(file).map_err(|e| FeedError::Json {
        path: path.display().to_string(),
        source: e,
    })?;
    info!("Read {} patches from {}", patches.len(), path.display());
    Ok(patches)
}
