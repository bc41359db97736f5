// Taskhive Server - Main Entry Point
//
// Bootstrap logic, CLI commands and initialization only. Handlers, routes
// and business logic live in the library crate.

pub use taskhive_server::*;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use dotenvy::{Error as DotenvError, dotenv, from_filename};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use taskhive_core::{config::AppConfig, db::Database, workspace::WorkspaceKind};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_appender::non_blocking;
use tracing_subscriber::EnvFilter;

use mimalloc::MiMalloc;

use taskhive_server::workspace::service::CreateWorkspace;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static TRACING_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(author, version, about = "Taskhive server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Run database migrations
    Migrate,
    /// Create a superadmin account, or promote an existing user
    CreateAdmin {
        /// Email for the administrator account
        email: String,
        /// Password for the administrator account
        password: String,
    },
    /// Create a workspace owned by an existing user
    CreateWorkspace(CreateWorkspaceArgs),
}

#[derive(Args, Debug)]
struct CreateWorkspaceArgs {
    /// Owner email (looked up before creation)
    #[arg(long = "owner-email", value_name = "EMAIL")]
    owner_email: String,
    /// Display name for the workspace
    #[arg(long, value_name = "NAME")]
    name: String,
    /// Create a team workspace instead of a personal one
    #[arg(long)]
    team: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_status = load_env_file();
    init_tracing();
    report_env_status(&env_status);

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Migrate => run_migrate(config).await,
        Command::CreateAdmin { email, password } => run_create_admin(config, email, password).await,
        Command::CreateWorkspace(args) => run_create_workspace(config, args).await,
    }
}

async fn run_serve(config: AppConfig) -> anyhow::Result<()> {
    info!(
        database_path = %config.database_path,
        database_max_connections = config.database_max_connections,
        environment = ?config.environment,
        "Starting server with database configuration"
    );
    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config)?;
    info!(
        name = %state.metadata.name,
        version = %state.metadata.version,
        environment = %state.metadata.environment,
        "Loaded server metadata"
    );

    let app = router::build_router(state);

    let listener = TcpListener::bind(config.bind_address)
        .await
        .context("failed to bind socket")?;
    let actual_addr = listener
        .local_addr()
        .context("failed to read local address")?;

    info!("listening on {actual_addr}");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(?error, "server terminated with error");
    }

    Ok(())
}

async fn run_migrate(config: AppConfig) -> anyhow::Result<()> {
    let _database = Database::connect(&config).await?;
    info!("migrations completed");
    Ok(())
}

async fn run_create_admin(
    config: AppConfig,
    email: String,
    password: String,
) -> anyhow::Result<()> {
    if email.trim().is_empty() {
        bail!("email must not be empty");
    }

    if password.is_empty() {
        bail!("password must not be empty");
    }

    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config)?;
    let admin = state
        .user_service
        .bootstrap_superadmin(&email, &password)
        .await?;

    info!(user_id = %admin.id, email = %admin.email, "ensured superadmin account");
    println!("Superadmin ready: {} ({})", admin.email, admin.id);

    Ok(())
}

async fn run_create_workspace(config: AppConfig, args: CreateWorkspaceArgs) -> anyhow::Result<()> {
    let CreateWorkspaceArgs {
        owner_email,
        name,
        team,
    } = args;

    let trimmed_name = name.trim();
    if trimmed_name.is_empty() {
        bail!("workspace name must not be empty");
    }

    let normalized = owner_email.trim();
    if normalized.is_empty() {
        bail!("owner-email must not be empty");
    }

    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config)?;
    let owner = state
        .user_store
        .find_by_email(normalized)
        .await?
        .with_context(|| format!("no user found with email {normalized}"))?;

    let kind = if team {
        WorkspaceKind::Team
    } else {
        WorkspaceKind::Personal
    };
    let workspace = state
        .workspace_service
        .create(
            &owner.id,
            CreateWorkspace {
                name: trimmed_name,
                kind: Some(kind),
                ..CreateWorkspace::default()
            },
        )
        .await
        .map_err(|err| anyhow!("failed to create workspace: {}", err.message()))?;

    info!(
        workspace_id = %workspace.id,
        owner_id = %workspace.owner_id,
        kind = ?workspace.kind,
        "created workspace"
    );
    println!(
        "Created workspace '{}' ({}) for owner {}",
        workspace.name, workspace.id, workspace.owner_id
    );

    Ok(())
}

/// JSON logs to a daily rolling file, or to stdout when
/// `TASKHIVE_LOG_TO_STDOUT` is set to anything but `0`. Use `RUST_LOG` to
/// control the level.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_to_stdout = std::env::var("TASKHIVE_LOG_TO_STDOUT")
        .map(|v| !v.trim().is_empty() && v.trim() != "0")
        .unwrap_or(false);

    if log_to_stdout
        && tracing_subscriber::fmt()
            .with_env_filter(env_filter.clone())
            .with_ansi(false)
            .json()
            .with_writer(std::io::stdout)
            .try_init()
            .is_ok()
    {
        return;
    }

    let log_dir = std::env::var("TASKHIVE_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    if let Err(err) = fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log dir '{}': {err}", log_dir);
        std::process::exit(1);
    }
    let file_appender = tracing_appender::rolling::daily(&log_dir, "server.log");
    let (writer, guard) = non_blocking(file_appender);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .json()
        .with_writer(writer)
        .try_init()
        .is_ok()
    {
        let _ = TRACING_GUARD.set(guard);
    }
}

enum EnvLoadStatus {
    Loaded(PathBuf),
    NotFound,
    Failed(DotenvError),
}

fn load_env_file() -> EnvLoadStatus {
    if let Ok(env_file) = std::env::var("TASKHIVE_ENV_FILE") {
        let trimmed = env_file.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            return match from_filename(&path) {
                Ok(_) => {
                    let display_path = make_relative(&path).unwrap_or_else(|| path.clone());
                    EnvLoadStatus::Loaded(display_path)
                }
                Err(err) => EnvLoadStatus::Failed(err),
            };
        }
    }

    match dotenv() {
        Ok(path) => {
            let display_path = make_relative(&path).unwrap_or_else(|| path.clone());
            EnvLoadStatus::Loaded(display_path)
        }
        Err(DotenvError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            EnvLoadStatus::NotFound
        }
        Err(err) => EnvLoadStatus::Failed(err),
    }
}

fn report_env_status(status: &EnvLoadStatus) {
    match status {
        EnvLoadStatus::Loaded(path) => {
            info!("Loaded environment variables from {}", path.display());
        }
        EnvLoadStatus::NotFound => {
            info!("No .env file found; using process environment only");
        }
        EnvLoadStatus::Failed(err) => {
            warn!("Failed to load .env file: {err:?}");
        }
    }
}

fn make_relative(path: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    path.strip_prefix(&cwd).map(|p| p.to_path_buf()).ok()
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut term), Ok(mut int)) => {
                tokio::select! {
                    _ = term.recv() => {},
                    _ = int.recv() => {},
                }
            }
            _ => {
                warn!("failed to install signal handlers; falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
