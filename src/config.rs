use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Owner backend for a bookstore marketplace.
#[derive(Parser, Debug, Clone)]
#[command(name = "bookstall-rs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BOOKSTALL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Owner account management (the approval actor).
    Owner {
        /// Owner subcommand action.
        #[command(subcommand)]
        action: OwnerCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Owner management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum OwnerCommand {
    /// Approve a pending owner.
    Approve {
        /// Owner email.
        email: String,
    },

    /// Reject an owner.
    Reject {
        /// Owner email.
        email: String,
        /// Reason shown to the owner.
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// List all owners.
    List,

    /// Delete an owner account.
    Del {
        /// Owner email.
        email: String,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Blob upload service configuration.
    #[serde(default)]
    pub uploads: UploadConfig,

    /// Internal endpoint configuration.
    #[serde(default)]
    pub internal: InternalConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Browser origins allowed to call the API with credentials.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        5001,
    )
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://localhost:5174".to_string(),
    ]
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/bookstall.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign session tokens. The BOOKSTALL_TOKEN_SECRET
    /// environment variable takes precedence.
    #[serde(default)]
    pub token_secret: String,

    /// Session token duration in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,

    /// Drop the Secure cookie attribute. Only for local testing against
    /// plain HTTP; cross-site cookies will not work in browsers without it.
    #[serde(default)]
    pub force_insecure_cookies: bool,

    /// Optional cookie Domain attribute for production deployments behind a
    /// CDN.
    #[serde(default)]
    pub cookie_domain: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            session_days: default_session_days(),
            force_insecure_cookies: false,
            cookie_domain: None,
        }
    }
}

fn default_session_days() -> u32 {
    30
}

impl AuthConfig {
    /// Resolve the token secret: environment first, then the config file.
    pub fn resolve_token_secret(&self) -> Option<String> {
        std::env::var("BOOKSTALL_TOKEN_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| Some(self.token_secret.clone()).filter(|s| !s.is_empty()))
    }
}

/// Blob upload service configuration. When the endpoint is unset, image
/// uploads are rejected outright; there is no local fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key for the upload endpoint. The BOOKSTALL_UPLOAD_KEY
    /// environment variable takes precedence.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl UploadConfig {
    /// Resolve the upload API key: environment first, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var("BOOKSTALL_UPLOAD_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.api_key.clone().filter(|s| !s.is_empty()))
    }
}

/// Internal endpoint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternalConfig {
    /// Optional shared secret gating theme writes. The OWNER_SHARED_SECRET
    /// environment variable takes precedence. When unset, writes are open.
    #[serde(default)]
    pub shared_secret: Option<String>,
}

impl InternalConfig {
    /// Resolve the shared secret: environment first, then the config file.
    pub fn resolve_shared_secret(&self) -> Option<String> {
        std::env::var("OWNER_SHARED_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.shared_secret.clone().filter(|s| !s.is_empty()))
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("bookstall-rs.toml"),
            dirs::config_dir()
                .map(|p| p.join("bookstall-rs").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/bookstall-rs/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content with a freshly minted token
    /// secret.
    pub fn generate_default(token_secret: &str) -> String {
        format!(
            r#"# bookstall-rs configuration

[server]
bind = "0.0.0.0:5001"
# Browser origins allowed to send credentialed requests
allowed_origins = [
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:5174",
]

[database]
# path = "/var/lib/bookstall-rs/bookstall.db"

[auth]
# Session token signing secret (or set BOOKSTALL_TOKEN_SECRET)
token_secret = "{token_secret}"
# Session duration in days
session_days = 30
# Drop the Secure cookie attribute (local HTTP testing only)
force_insecure_cookies = false
# cookie_domain = "example.com"

[uploads]
# Image host endpoint; uploads are rejected when unset
# endpoint = "https://images.example.com/upload"
# api_key = "..." (or set BOOKSTALL_UPLOAD_KEY)

[internal]
# Shared secret for the theme-sync write endpoint (or set OWNER_SHARED_SECRET)
# shared_secret = "..."
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let secret = "s3cret";
        let config: Config = toml::from_str(&Config::generate_default(secret)).unwrap();
        assert_eq!(config.auth.token_secret, secret);
        assert_eq!(config.auth.session_days, 30);
        assert_eq!(config.server.bind.port(), 5001);
        assert!(config.uploads.endpoint.is_none());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.auth.session_days, 30);
        assert!(!config.auth.force_insecure_cookies);
        assert_eq!(config.database.path, PathBuf::from("data/bookstall.db"));
    }
}
