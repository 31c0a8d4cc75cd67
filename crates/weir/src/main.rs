use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use weir::api::routes::create_router;
use weir::api::state::AppState;
use weir::auth::AuthState;
use weir::config::WeirConfig;
use weir::db;
use weir::user::{CreateUserRequest, UserListQuery, UserRepository};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common);

    match cli.command {
        Command::Serve(cmd) => async_serve(cli.common, cmd),
        Command::Users { command } => async_users(cli.common, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[tokio::main]
async fn async_serve(common: CommonOpts, cmd: ServeCommand) -> Result<()> {
    handle_serve(&common, cmd).await
}

#[tokio::main]
async fn async_users(common: CommonOpts, cmd: UsersCommand) -> Result<()> {
    handle_users(&common, cmd).await
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Weir - workflow server admin gateway.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve(ServeCommand),
    /// Manage user accounts
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct ServeCommand {
    /// Override the listen address from config
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,
}

#[derive(Debug, Subcommand)]
enum UsersCommand {
    /// Create a user account
    Create {
        email: String,
        /// Password for the account; omit for OAuth-only users
        #[arg(long)]
        password: Option<String>,
        /// Grant the superuser flag
        #[arg(long)]
        superuser: bool,
    },
    /// List user accounts
    List,
}

fn init_logging(common: &CommonOpts) {
    let level = if common.trace {
        "trace"
    } else if common.quiet {
        "error"
    } else {
        match common.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn handle_serve(common: &CommonOpts, cmd: ServeCommand) -> Result<()> {
    let config = WeirConfig::load(common.config.as_deref())?;

    let pool = db::connect(&config.database_url).await?;
    db::migrate(&pool).await?;

    let http_client = reqwest::Client::new();
    let auth = AuthState::from_settings(&config.auth, &http_client).await?;
    if !auth.enabled() {
        warn!("serving without authentication: all routes are open");
    }

    let state = AppState::new(&config, pool, auth, http_client)?;
    let router = create_router(state);

    let listen = cmd.listen.unwrap_or_else(|| config.listen.clone());
    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;
    info!("listening on {listen}");

    axum::serve(listener, router)
        .await
        .context("Server terminated")?;
    Ok(())
}

async fn handle_users(common: &CommonOpts, cmd: UsersCommand) -> Result<()> {
    let config = WeirConfig::load(common.config.as_deref())?;
    let pool = db::connect(&config.database_url).await?;
    db::migrate(&pool).await?;
    let users = UserRepository::new(pool);

    match cmd {
        UsersCommand::Create {
            email,
            password,
            superuser,
        } => {
            let hashed = password
                .map(|p| bcrypt::hash(&p, bcrypt::DEFAULT_COST))
                .transpose()
                .context("Failed to hash password")?;

            let user = users
                .create(CreateUserRequest {
                    email,
                    password: hashed,
                    is_superuser: superuser,
                    is_active: true,
                    is_verified: true,
                })
                .await?;
            println!("created {} ({})", user.email, user.id);
        }
        UsersCommand::List => {
            let all = users.list(UserListQuery::default()).await?;
            for user in all {
                println!(
                    "{}  {}  active={} superuser={}",
                    user.id, user.email, user.is_active, user.is_superuser
                );
            }
        }
    }
    Ok(())
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
