//! StackShare - biohacking stacks and daily wellness logs
//!
//! Entry point for the HTTP service and its maintenance commands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use stackshare_core::{
    ApiServer, ApiServerConfig, AppState, HttpObjectStore, LibsqlStorage, ObjectStore,
    SessionSigner, StackShareConfig, StorageBackend, UserId,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackshare")]
#[command(about = "Share biohacking stacks and track daily wellness logs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// TOML configuration file
        #[arg(short, long, env = "STACKSHARE_CONFIG")]
        config: Option<PathBuf>,

        /// Listen address (overrides server.host/server.port)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Create the database and apply migrations
    Init {
        #[arg(short, long, env = "STACKSHARE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Mint a session token for local use
    Token {
        #[arg(short, long, env = "STACKSHARE_CONFIG")]
        config: Option<PathBuf>,

        /// User id (UUID)
        #[arg(long)]
        user: String,

        #[arg(long)]
        email: Option<String>,

        /// Token lifetime; defaults to auth.session_ttl_hours
        #[arg(long)]
        ttl_hours: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "stackshare={0},stackshare_core={0},tower_http=info",
            level.as_str().to_lowercase()
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("StackShare v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { config, addr } => serve(config, addr).await,
        Commands::Init { config } => init(config).await,
        Commands::Token {
            config,
            user,
            email,
            ttl_hours,
        } => token(config, &user, email, ttl_hours),
    }
}

async fn open_storage(config: &StackShareConfig) -> anyhow::Result<LibsqlStorage> {
    let storage = LibsqlStorage::new_with_validation(config.database.connection_mode(), true)
        .await
        .context("Failed to open database")?;
    Ok(storage)
}

async fn serve(config_path: Option<PathBuf>, addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let config = StackShareConfig::load(config_path.as_deref())?;
    let addr = match addr {
        Some(addr) => addr,
        None => config.server.addr()?,
    };

    let storage: Arc<dyn StorageBackend> = Arc::new(open_storage(&config).await?);

    let objects: Option<Arc<dyn ObjectStore>> = match HttpObjectStore::from_config(&config.object_storage)? {
        Some(store) => {
            info!("Image uploads enabled (bucket {})", config.object_storage.bucket);
            Some(Arc::new(store) as Arc<dyn ObjectStore>)
        }
        None => {
            warn!("object_storage.url not set; image uploads are disabled");
            None
        }
    };

    let state = AppState::new(storage, objects, config);
    ApiServer::new(ApiServerConfig { addr }, state).serve().await
}

async fn init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = StackShareConfig::load(config_path.as_deref())?;
    open_storage(&config).await?;
    println!("Database ready");
    Ok(())
}

fn token(
    config_path: Option<PathBuf>,
    user: &str,
    email: Option<String>,
    ttl_hours: Option<u64>,
) -> anyhow::Result<()> {
    let config = StackShareConfig::load(config_path.as_deref())?;
    let user = UserId::from_string(user).context("--user must be a UUID")?;
    let hours = ttl_hours.unwrap_or(config.auth.session_ttl_hours);
    let ttl = chrono::Duration::hours(i64::try_from(hours).context("--ttl-hours too large")?);

    let signer = SessionSigner::new(&config.auth.session_secret);
    let token = signer.issue(user, email, ttl, chrono::Utc::now())?;
    println!("{}", token);
    Ok(())
}
