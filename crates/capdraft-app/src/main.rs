// capdraft entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file; the terminal carries command output)
// 2. Load config, copying defaults on first run
// 3. Load the player feed and any patches
// 4. Open the database and pick up the current draft id
// 5. Resume the stored draft or persist a fresh one
// 6. Spawn the session task and read commands from stdin until quit/EOF

use std::path::Path;

use anyhow::Context;
use capdraft_app::commands::{self, HELP};
use capdraft_app::db::Database;
use capdraft_app::feed;
use capdraft_app::protocol::Request;
use capdraft_app::session::{self, DraftSession};
use capdraft_core::config;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("capdraft starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} teams, ${} salary cap, {} roster slots",
        config.league.name,
        config.league.num_teams,
        config.league.salary_cap,
        config.league.roster_size()
    );

    let (catalog, rejected) = feed::load_catalog(Path::new(&config.data_paths.players))
        .context("failed to load player feed")?;
    if !rejected.is_empty() {
        warn!("{} player records were rejected", rejected.len());
    }
    if catalog.is_empty() {
        anyhow::bail!("player feed {} has no valid players", config.data_paths.players);
    }
    let patches = match &config.data_paths.patches {
        Some(path) => feed::load_patches(Path::new(path)).context("failed to load patch feed")?,
        None => Vec::new(),
    };

    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);
    let draft_id = match db.get_draft_id()? {
        Some(id) => id,
        None => Database::generate_draft_id(),
    };

    let mut draft = DraftSession::new(config, catalog, Some(db), draft_id);
    match draft.resume_or_start() {
        Ok(true) => info!("Draft state restored from previous session"),
        Ok(false) => info!("Starting fresh draft session"),
        Err(e) => {
            error!("Draft recovery failed: {:#}", e);
            return Err(e.context("draft recovery failed"));
        }
    }
    for patch in &patches {
        if let Err(e) = draft.apply_patch(patch) {
            warn!("Skipping patch for {}: {}", patch.player_id, e);
        }
    }

    let (handle, _market_rx, task) = session::spawn(draft);
    println!("capdraft ready. Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("help") {
            println!("{HELP}");
            continue;
        }
        let request = match commands::parse_command(line) {
            Ok(request) => request,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        let quit = request == Request::Quit;
        let reply = handle.request(request).await?;
        print!("{}", commands::render_reply(&reply));
        if quit {
            break;
        }
    }

    // EOF without `quit`: ask the session to stop.
    if !task.is_finished() {
        let _ = handle.shutdown().await;
    }
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), task).await;

    info!("capdraft shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to `logs/capdraft.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("capdraft.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("capdraft_app=info,capdraft_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
