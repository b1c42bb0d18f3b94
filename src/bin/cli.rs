//! class-engine: maintenance commands over a SQLite class database.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use class_engine::config::{self, EngineConfig};
use class_engine::logging::{init_logging, parse_level_str};
use class_engine::{ClassId, Engine, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "class-engine", version, about = "Class scheduling and enrollment engine")]
struct Cli {
    /// SQLite database file.
    #[arg(long, default_value = "classes.db")]
    db: PathBuf,

    /// Engine configuration (TOML). Falls back to ./ClassEngine.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// error, warn, info, debug or trace. Overrides CLASS_ENGINE_LOG.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database file and schema.
    Init,
    /// Report every pair of draft or published classes that collide.
    Conflicts {
        #[arg(long)]
        json: bool,
    },
    /// Recompute seat counts and waitlist positions and compare with stored state.
    Verify {
        #[arg(long = "class")]
        class_id: Option<ClassId>,
    },
}

fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    match explicit {
        Some(path) => config::load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => {
            let default = config::default_config_path();
            if default.exists() {
                config::load_from_path(&default)
                    .with_context(|| format!("loading config from {}", default.display()))
            } else {
                Ok(EngineConfig::default())
            }
        }
    }
}

fn open_engine(db: &Path, config: EngineConfig) -> Result<Engine<SqliteStore>> {
    let store = SqliteStore::with_busy_timeout(db, config.busy_timeout())
        .with_context(|| format!("opening database {}", db.display()))?;
    Ok(Engine::new(store, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_deref() {
        Some(raw) => match parse_level_str(raw) {
            Some(level) => Some(level),
            None => bail!("unknown log level '{raw}'"),
        },
        None => None,
    };
    init_logging(level)?;

    let config = load_config(cli.config.as_deref())?;
    let engine = open_engine(&cli.db, config)?;

    match cli.command {
        Command::Init => {
            info!(path = %cli.db.display(), "database ready");
            println!("Initialized class database at {}", cli.db.display());
        }
        Command::Conflicts { json } => {
            let pairs = engine.catalog_conflicts()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&pairs)?);
            } else if pairs.is_empty() {
                println!("No schedule conflicts.");
            } else {
                let classes = engine.classes()?;
                let ids: Vec<String> = Engine::<SqliteStore>::detect_all_conflicts(&classes)
                    .into_iter()
                    .map(|id| id.to_string())
                    .collect();
                println!("Conflicting classes: {}", ids.join(", "));
                for pair in &pairs {
                    println!("  {} <-> {} ({})", pair.first, pair.second, pair.kind);
                }
            }
        }
        Command::Verify { class_id } => {
            let ids: Vec<ClassId> = match class_id {
                Some(id) => vec![id],
                None => engine.classes()?.iter().map(|c| c.id).collect(),
            };
            let mut inconsistent = 0usize;
            for id in ids {
                let audit = engine.verify_class(id)?;
                if audit.is_consistent() {
                    println!("class {id}: ok");
                } else {
                    inconsistent += 1;
                    println!(
                        "class {id}: INCONSISTENT seats_taken={} holders={} capacity={} waitlist={:?}",
                        audit.seats_taken,
                        audit.seat_holders,
                        audit.capacity,
                        audit.waitlist_positions
                    );
                }
            }
            if inconsistent > 0 {
                bail!("{inconsistent} class(es) failed verification");
            }
        }
    }

    Ok(())
}
