use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tendersync::config::{BackendConfig, GatewayConfig, ServerConfig, db_path};
use tendersync::gateway::{Backend, SqliteBackend, SupabaseBackend};
use tendersync::server::{AppState, create_router};
use tendersync::types::CpvCode;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Parser)]
#[command(name = "tendersync")]
#[command(about = "TenderSync site backend and customer dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// The hosted database-and-auth service
    Hosted,
    /// SQLite database in the data directory
    Local,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands for the local backend
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

        /// Which backend to use
        #[arg(long, value_enum, default_value = "hosted")]
        backend: BackendKind,

        /// Base URL of the hosted backend
        #[arg(long, env = "TENDERSYNC_GATEWAY_URL")]
        gateway_url: Option<String>,

        /// Public (anon) key of the hosted backend
        #[arg(long, env = "TENDERSYNC_GATEWAY_KEY", hide_env_values = true)]
        gateway_key: Option<String>,

        /// Data directory for the local backend
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create the local database
    Init {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Create an invited user and print their set-password link
    Invite {
        #[arg(long)]
        email: String,

        /// Base URL of the site the link points to
        #[arg(long, default_value = "http://localhost:8080")]
        site_url: String,

        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Load CPV codes from a JSON array of {"CODE": ..., "EN": ...} objects
    ImportCpv {
        #[arg(long)]
        file: PathBuf,

        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

fn open_local(data_dir: &Path) -> anyhow::Result<SqliteBackend> {
    let path = db_path(data_dir);
    if !path.exists() {
        bail!(
            "No database at {}. Run 'tendersync admin init' first.",
            path.display()
        );
    }
    let backend = SqliteBackend::new(&path)?;
    backend.initialize()?;
    Ok(backend)
}

fn run_init(data_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let path = db_path(data_dir);
    if path.exists() {
        bail!("Already initialized: {}", path.display());
    }

    let backend = SqliteBackend::new(&path)?;
    backend.initialize()?;

    println!("Created database at {}", path.display());
    Ok(())
}

fn run_invite(data_dir: &Path, email: &str, site_url: &str) -> anyhow::Result<()> {
    let backend = open_local(data_dir)?;
    let session = backend.invite_user(email)?;

    let link = format!(
        "{}/set-password#access_token={}&refresh_token={}&type=invite",
        site_url.trim_end_matches('/'),
        session.access_token,
        session.refresh_token
    );

    println!();
    println!("========================================");
    println!("Invite link for {email}:");
    println!();
    println!("  {link}");
    println!();
    println!("========================================");
    println!();
    Ok(())
}

fn run_import_cpv(data_dir: &Path, file: &Path) -> anyhow::Result<()> {
    let backend = open_local(data_dir)?;
    let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let codes: Vec<CpvCode> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;

    let count = backend.import_cpv_codes(&codes)?;
    println!("Imported {count} CPV codes");
    Ok(())
}

fn backend_config(
    backend: BackendKind,
    gateway_url: Option<String>,
    gateway_key: Option<String>,
    data_dir: PathBuf,
) -> anyhow::Result<BackendConfig> {
    Ok(match backend {
        BackendKind::Local => BackendConfig::Local { data_dir },
        BackendKind::Hosted => {
            let (Some(url), Some(key)) = (gateway_url, gateway_key) else {
                bail!(
                    "The hosted backend needs --gateway-url and --gateway-key (or TENDERSYNC_GATEWAY_URL and TENDERSYNC_GATEWAY_KEY)."
                );
            };
            BackendConfig::Hosted(GatewayConfig::new(url, key)?)
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tendersync=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => run_init(&data_dir)?,
            AdminCommands::Invite {
                email,
                site_url,
                data_dir,
            } => run_invite(&data_dir, &email, &site_url)?,
            AdminCommands::ImportCpv { file, data_dir } => run_import_cpv(&data_dir, &file)?,
        },
        Commands::Serve {
            host,
            port,
            backend,
            gateway_url,
            gateway_key,
            data_dir,
        } => {
            let config = ServerConfig {
                host,
                port,
                backend: backend_config(backend, gateway_url, gateway_key, data_dir)?,
            };

            let backend: Arc<dyn Backend> = match &config.backend {
                BackendConfig::Hosted(gateway) => {
                    info!("Using hosted backend at {}", gateway.url);
                    Arc::new(SupabaseBackend::new(gateway)?)
                }
                BackendConfig::Local { data_dir } => {
                    info!("Using local backend in {}", data_dir.display());
                    Arc::new(open_local(data_dir)?)
                }
            };

            let state = Arc::new(AppState::new(backend));
            state.spawn_session_sweeper(SESSION_SWEEP_INTERVAL);
            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
