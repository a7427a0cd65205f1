//! bookstall-rs server entry point.

use bookstall_rs::{
    auth::{AuthService, TokenSigner, generate_secret},
    blobs::{BlobStore, HttpBlobStore},
    config::{Cli, Command, Config, OwnerCommand},
    db::{Database, OwnerStatus},
    server,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::Owner { action }) => cmd_owner(action, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => {
            // Default: start server
            cmd_serve(config, None).await
        }
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Write default config with a freshly minted token secret
    std::fs::write(&config_path, Config::generate_default(&generate_secret()))?;
    println!("Created config file: {}", config_path.display());

    // Initialize database
    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit config.toml to configure your server.");
    println!("Set [uploads] endpoint/api_key to enable image uploads.");
    println!("Approve signups with: bookstall-rs owner approve <email>");

    Ok(())
}

/// Owner management commands. Approval never happens through the HTTP API;
/// this is the only actor that flips an account's status.
async fn cmd_owner(action: OwnerCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        OwnerCommand::Approve { email } => {
            if db.set_owner_status(&email, OwnerStatus::Approved, None)? {
                println!("Approved owner: {}", email);
            } else {
                println!("Owner not found: {}", email);
            }
        }

        OwnerCommand::Reject { email, reason } => {
            if db.set_owner_status(&email, OwnerStatus::Rejected, reason.as_deref())? {
                println!("Rejected owner: {}", email);
                if let Some(reason) = reason {
                    println!("Reason: {}", reason);
                }
            } else {
                println!("Owner not found: {}", email);
            }
        }

        OwnerCommand::List => {
            let owners = db.list_owners()?;
            if owners.is_empty() {
                println!("No owners found.");
            } else {
                println!(
                    "{:<30} {:<10} {:<10} {:<20} CREATED",
                    "EMAIL", "TYPE", "STATUS", "NAME"
                );
                println!("{}", "-".repeat(90));
                for owner in owners {
                    let created = chrono::DateTime::from_timestamp(owner.created_at, 0)
                        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!(
                        "{:<30} {:<10} {:<10} {:<20} {}",
                        owner.email,
                        owner.kind.as_str(),
                        owner.status.as_str(),
                        owner.name,
                        created
                    );
                }
            }
        }

        OwnerCommand::Del { email } => {
            if db.delete_owner(&email)? {
                println!("Deleted owner: {}", email);
            } else {
                println!("Owner not found: {}", email);
            }
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookstall_rs=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // The token secret has no fallback; a missing secret would make every
    // session forgeable after a restart with a different one.
    let Some(token_secret) = config.auth.resolve_token_secret() else {
        anyhow::bail!(
            "No token secret configured. Set BOOKSTALL_TOKEN_SECRET or [auth].token_secret, \
             or run: bookstall-rs init"
        );
    };

    // Open database
    let db = Database::open(&config.database.path)?;

    // Create auth service
    let auth = AuthService::new(
        db.clone(),
        TokenSigner::new(&token_secret),
        config.auth.session_days,
    );

    // Blob store is optional wiring; without it every upload path rejects.
    let blobs: Option<Arc<dyn BlobStore>> = match &config.uploads.endpoint {
        Some(endpoint) => {
            let api_key = config.uploads.resolve_api_key().unwrap_or_default();
            Some(Arc::new(HttpBlobStore::new(endpoint.clone(), api_key)))
        }
        None => {
            tracing::warn!("No upload endpoint configured; image uploads will be rejected");
            None
        }
    };

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        "Starting bookstall-rs server"
    );

    // Create application state and router
    let state = server::AppState::new(config.clone(), db, auth, blobs);
    let app = server::create_router(state);

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!(address = %config.server.bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
