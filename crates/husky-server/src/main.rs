//! Husky binary: serves the blog and runs the database maintenance commands.
//!
//! `husky serve` (the default) starts the HTTP server with structured
//! logging and graceful shutdown on SIGTERM/SIGINT. `husky init` and
//! `husky forge` prepare the database.

use clap::{Parser, Subcommand};
use husky_server::{
    app,
    commands::{self, CommandError, DEFAULT_FORGE_POSTS},
    config::{self, Config, Profile},
    AppState,
};
use std::net::SocketAddr;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "husky", version, about = "A small multi-user blog")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Configuration profile, overriding the file and `HUSKY_CONFIG`.
    #[arg(long, global = true, value_enum)]
    profile: Option<Profile>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve,
    /// Create the database tables.
    Init {
        /// Drop all tables first.
        #[arg(long)]
        drop: bool,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Rebuild the database and fill it with fake posts.
    Forge {
        /// Number of posts to generate.
        #[arg(long, default_value_t = DEFAULT_FORGE_POSTS)]
        post: u32,
    },
}

fn resolve_config_path(cli_path: Option<String>) -> (String, &'static str) {
    if let Some(path) = cli_path.filter(|value| !value.trim().is_empty()) {
        return (path, "cli-arg");
    }

    if let Ok(path) = std::env::var("HUSKY_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (path, "env-var");
        }
    }

    ("config.toml".to_string(), "default")
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let (config_path, config_source) = resolve_config_path(cli.config);

    let mut config = match config::load_config(Some(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(profile) = cli.profile {
        config.profile = profile;
    }

    init_tracing(&config);
    tracing::info!(
        source = config_source,
        path = %config_path,
        profile = config.profile.as_str(),
        "resolved startup configuration"
    );

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Init { drop, yes } => run_init(&config, drop, yes),
        Command::Forge { post } => run_forge(&config, post),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Command(CommandError::Aborted)) => {
            eprintln!("Aborted!");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "husky failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("failed to create database pool: {0}")]
    Pool(#[from] husky_db::PoolError),
    #[error("failed to get database connection: {0}")]
    Connection(#[from] r2d2::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(#[from] husky_db::MigrationError),
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(std::io::Error),
    #[error(transparent)]
    Command(#[from] CommandError),
}

fn open_pool(config: &Config) -> Result<husky_db::DbPool, CliError> {
    let path = config.database_path();
    tracing::debug!(path = %path, "opening database");
    Ok(husky_db::create_pool(&path, config.db_settings())?)
}

async fn serve(config: Config) -> Result<(), CliError> {
    let pool = open_pool(&config)?;

    {
        let conn = pool.get()?;
        let applied = husky_db::run_migrations(&conn)?;
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    let app = app(AppState::new(pool, &config)?);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting husky server");

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CliError::Bind { addr, source })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CliError::Serve)?;

    tracing::info!("husky server shut down");
    Ok(())
}

fn run_init(config: &Config, drop: bool, yes: bool) -> Result<(), CliError> {
    let pool = open_pool(config)?;
    let confirm = |prompt: &str| {
        if yes {
            return Ok(true);
        }
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| CommandError::Prompt(e.to_string()))
    };
    commands::init(&pool, drop, confirm, &mut std::io::stdout())?;
    Ok(())
}

fn run_forge(config: &Config, posts: u32) -> Result<(), CliError> {
    let pool = open_pool(config)?;
    commands::forge(&pool, posts, &mut std::io::stdout())?;
    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
