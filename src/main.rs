use std::env;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use squadcircle::{db, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "-help" || arg == "--help") {
        println!("Usage: squadcircle [OPTIONS]");
        println!("Runs one lifecycle sweep over all events and exits.");
        println!("Options:");
        println!("  -config <path>  Path to configuration file (default: ./etc/squadcircle.toml)");
        println!("  -help, --help   Print this help message");
        return Ok(());
    }

    let config_path = args
        .iter()
        .skip_while(|arg| arg.as_str() != "-config")
        .nth(1)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "./etc/squadcircle.toml".to_string());

    // Load configuration first (before logging init)
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Could not load config file: {}, using defaults", e);
        Config::default()
    });

    // Priority: RUST_LOG env var > config file > default "info"
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting SquadCircle lifecycle sweep...");
    info!("Loading configuration from: {}", config_path);

    let db_conn = db::init_database(&config.database).await.map_err(|e| {
        tracing::error!("Database initialization failed: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;

    let state = AppState::new(db_conn, config);
    let report = state.resolve_lifecycle().await.map_err(|e| {
        tracing::error!("Lifecycle sweep failed: {}", e);
        anyhow::anyhow!("Lifecycle sweep failed: {}", e)
    })?;

    if report.is_empty() {
        info!("No events changed state at {}", report.now);
    }
    for transition in &report.transitions {
        info!(
            "Group {}: event {} {:?} -> {:?}",
            transition.group_id, transition.event_id, transition.from, transition.to
        );
    }

    Ok(())
}
