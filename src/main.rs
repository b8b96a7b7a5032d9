use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use drover::auth::{LocalIssuer, TokenGenerator};
use drover::config::ServerConfig;
use drover::fleet::{ConfigurationResolver, NamespaceManager};
use drover::secrets::FileSecretSource;
use drover::server::{AppState, create_router};
use drover::source::{FsManifestSource, RepoFetcher};
use drover::store::{SqliteStore, Store};
use drover::sync::{SyncScheduler, Synchronizer};
use drover::types::{DeviceConfiguration, Namespace, Token};

fn create_admin_token(generator: &TokenGenerator) -> anyhow::Result<(Token, String)> {
    let (raw_token, lookup, hash) = generator.generate()?;
    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    Ok((token, raw_token))
}

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "drover")]
#[command(about = "A control plane for fleets of edge devices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database, repository clones and secrets
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, admin token and default namespace)
    Init {
        /// Data directory for database, repository clones and secrets
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

fn run_init(data_dir: String, non_interactive: bool) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let config = ServerConfig::load(&data_path)?;
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let token_file = data_path.join(".admin_token");

    if store.has_admin_token()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let generator = TokenGenerator::new();
    let (token, raw_token) = create_admin_token(&generator)?;

    store.create_token(&token)?;
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    // The hierarchy is never empty: seed the default namespace so devices
    // can enroll from first boot.
    let namespace_name = if non_interactive {
        "default".to_string()
    } else {
        inquire::Text::new("Default namespace name:")
            .with_default("default")
            .prompt()?
    };

    let manager = NamespaceManager::new(Arc::new(store));
    manager.create(Namespace {
        name: namespace_name.clone(),
        is_default: true,
        configuration: DeviceConfiguration::default(),
        created_at: Utc::now(),
    })?;

    println!();
    println!("========================================");
    println!("Admin token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("Default namespace: {namespace_name}");
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(host: String, port: u16, data_dir: String) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    let mut config = ServerConfig::load(&data_path)?;
    config.host = host;
    config.port = port;

    let token_file = config.data_dir.join(".admin_token");
    if !token_file.exists() {
        bail!(
            "Server not initialized. Run 'drover admin init' first to create the database and admin token."
        );
    }

    let store = Arc::new(SqliteStore::new(config.db_path())?);
    if !store.has_admin_token()? {
        bail!(
            "Server not initialized. Run 'drover admin init' first to create the database and admin token."
        );
    }

    info!("Admin token available at {}", token_file.display());

    fs::create_dir_all(config.repos_dir())?;
    fs::create_dir_all(config.secrets_dir())?;

    let source = Arc::new(FsManifestSource::new());
    let secrets = Arc::new(FileSecretSource::new(config.secrets_dir()));
    let synchronizer = Arc::new(Synchronizer::new(store.clone(), source.clone()));
    let resolver = Arc::new(ConfigurationResolver::new(
        store.clone(),
        source,
        secrets,
    ));

    let (sync_trigger, trigger_rx) = broadcast::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = Arc::new(SyncScheduler::new(
        store.clone(),
        synchronizer,
        Arc::new(RepoFetcher::new()),
        Duration::from_secs(config.sync_interval_seconds),
    ));
    let scheduler_handle = scheduler.spawn(trigger_rx, shutdown_rx);

    let state = Arc::new(AppState {
        store: store.clone(),
        namespaces: NamespaceManager::new(store.clone()),
        resolver,
        issuer: Arc::new(LocalIssuer::new()),
        sync_trigger,
        repos_dir: config.repos_dir(),
    });

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Stop the sync loop; a pass already underway finishes its current
    // repository and the next boot resumes from persisted state.
    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;
    store.close()?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("drover=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => {
                run_init(data_dir, non_interactive)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            run_serve(host, port, data_dir).await?;
        }
    }

    Ok(())
}
