use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::Serialize;

use paddock::domain::FromRow;
use paddock::query::{PageDefaults, RawParams};
use paddock::{
    AggregationEngine, AppConfig, Entity, Lap, MemoryStore, PaddockError, RequestCache, Session,
    TelemetryPoint, Track, dashboard_aggregate_concurrent, list_after_cursor, list_from_params,
    normalize_params,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Directory of `<table>.jsonl` files, overrides the configured one
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Offset-paginated listing
    List {
        entity: Entity,

        #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Filter grammar, e.g. `track_id:t1,t2;vehicle:r1`
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Newest-first listing continuing from a cursor
    Page {
        entity: Entity,

        #[arg(short, long)]
        cursor: Option<String>,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },
    Dashboard {
        #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Issue the dashboard queries concurrently
        #[arg(long)]
        concurrent: bool,
    },
    Session {
        id: String,
    },
    /// Print the effective configuration
    Config,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), PaddockError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|e| PaddockError::Output { source: e })?;
    println!("{}", rendered);
    Ok(())
}

fn open_store(data_dir: Option<PathBuf>) -> Result<MemoryStore, PaddockError> {
    let data_dir = data_dir.ok_or_else(|| PaddockError::Validation {
        field: "data_dir".to_string(),
        reason: "pass --data-dir or set data_dir in the config file".to_string(),
    })?;
    info!("Loading tables from {:?}", data_dir);
    MemoryStore::from_dir(&data_dir)
}

fn list_typed<T: FromRow + Serialize>(
    store: &MemoryStore,
    params: &RawParams,
    defaults: &PageDefaults,
) -> Result<(), PaddockError> {
    print_json(&list_from_params::<_, T>(store, params, defaults)?)
}

fn page_typed<T: FromRow + Serialize>(
    store: &MemoryStore,
    params: &RawParams,
    defaults: &PageDefaults,
    cursor: Option<&str>,
    limit: Option<usize>,
) -> Result<(), PaddockError> {
    let normalized = normalize_params(params, defaults);
    let limit = limit.unwrap_or(defaults.limit).min(defaults.max_limit);
    print_json(&list_after_cursor::<_, T>(
        store,
        &normalized.filters,
        cursor,
        limit,
    )?)
}

fn run(cli: Args) -> Result<(), PaddockError> {
    let config = AppConfig::from_local_file().unwrap_or_else(|e| {
        warn!("Could not load config, using defaults: {}", e);
        AppConfig::default()
    });
    let defaults = config.page_defaults();
    let data_dir = cli.data_dir.or_else(|| config.data_dir.clone());

    match cli.command {
        Commands::Config => print_json(&config),
        Commands::List {
            entity,
            params,
            query,
        } => {
            let store = open_store(data_dir)?;
            let mut params = RawParams::from_pairs(params);
            if let Some(query) = query {
                params.insert("query", query);
            }
            match entity {
                Entity::Session => list_typed::<Session>(&store, &params, &defaults),
                Entity::Lap => list_typed::<Lap>(&store, &params, &defaults),
                Entity::TelemetryPoint => list_typed::<TelemetryPoint>(&store, &params, &defaults),
                Entity::Track => list_typed::<Track>(&store, &params, &defaults),
            }
        }
        Commands::Page {
            entity,
            cursor,
            limit,
            params,
        } => {
            let store = open_store(data_dir)?;
            let params = RawParams::from_pairs(params);
            let cursor = cursor.as_deref();
            match entity {
                Entity::Session => page_typed::<Session>(&store, &params, &defaults, cursor, limit),
                Entity::Lap => page_typed::<Lap>(&store, &params, &defaults, cursor, limit),
                Entity::TelemetryPoint => {
                    page_typed::<TelemetryPoint>(&store, &params, &defaults, cursor, limit)
                }
                Entity::Track => page_typed::<Track>(&store, &params, &defaults, cursor, limit),
            }
        }
        Commands::Dashboard { params, concurrent } => {
            let store = open_store(data_dir)?;
            let filters = normalize_params(&RawParams::from_pairs(params), &defaults).filters;
            let dashboard = if concurrent {
                dashboard_aggregate_concurrent(
                    Arc::new(store),
                    &filters,
                    Some(Arc::new(RequestCache::new())),
                )?
            } else {
                let cache = RequestCache::new();
                AggregationEngine::new(&store)
                    .with_cache(Some(&cache))
                    .dashboard_aggregate(&filters)
            };
            print_json(&dashboard)
        }
        Commands::Session { id } => {
            let store = open_store(data_dir)?;
            print_json(&AggregationEngine::new(&store).session_report(&id)?)
        }
    }
}

fn main() {
    colog::init();

    let cli = Args::parse();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    }) {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    if let Err(e) = run(cli) {
        match std::error::Error::source(&e) {
            Some(cause) => error!("{}: {}", e, cause),
            None => error!("{}", e),
        }
        std::process::exit(1);
    }
}
