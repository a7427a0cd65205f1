mod schema;

pub use schema::{CatalogRow, Database, THEME_KEY};

use crate::error::{AppError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Approval status gating both login and public visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerStatus {
    /// Freshly signed up, awaiting review.
    Pending,
    /// Cleared to log in, list books and appear in the public catalog.
    Approved,
    /// Rejected by the reviewer.
    Rejected,
}

impl OwnerStatus {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerStatus::Pending => "pending",
            OwnerStatus::Approved => "approved",
            OwnerStatus::Rejected => "rejected",
        }
    }

    /// Parse from the database string form.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(OwnerStatus::Pending),
            "approved" => Ok(OwnerStatus::Approved),
            "rejected" => Ok(OwnerStatus::Rejected),
            other => Err(AppError::Internal(format!("Unknown owner status: {}", other))),
        }
    }
}

/// Kind of account an owner represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// An individual author selling their own books.
    Author,
    /// A bookstore listing its inventory.
    Bookstore,
}

impl OwnerKind {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Author => "author",
            OwnerKind::Bookstore => "bookstore",
        }
    }

    /// Parse from user input or the database.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "author" => Ok(OwnerKind::Author),
            "bookstore" => Ok(OwnerKind::Bookstore),
            _ => Err(AppError::Validation(
                "Invalid 'type' value. Allowed: 'author', 'bookstore'".to_string(),
            )),
        }
    }
}

/// Listing format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    /// Electronic book.
    Ebook,
    /// Narrated audio book.
    Audiobook,
}

impl BookFormat {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookFormat::Ebook => "ebook",
            BookFormat::Audiobook => "audiobook",
        }
    }

    /// Parse from user input or the database.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ebook" => Ok(BookFormat::Ebook),
            "audiobook" => Ok(BookFormat::Audiobook),
            _ => Err(AppError::Validation(
                "Invalid 'format' value. Allowed: 'ebook', 'audiobook'".to_string(),
            )),
        }
    }
}

/// Listing price currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Nigerian naira.
    Ngn,
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
    /// British pound.
    Gbp,
}

impl Currency {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Ngn => "NGN",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }

    /// Parse from user input or the database.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "NGN" => Ok(Currency::Ngn),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            _ => Err(AppError::Validation(
                "Invalid currency. Allowed: NGN,USD,EUR,GBP".to_string(),
            )),
        }
    }
}

/// Global UI theme mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Light theme.
    Light,
    /// Dark theme.
    Dark,
}

impl ThemeMode {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    /// Parse from user input or the database.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            _ => Err(AppError::Validation("Invalid themeMode".to_string())),
        }
    }
}

/// Owner account (author or bookstore).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    /// Unique owner ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Store name (bookstores).
    pub store_name: Option<String>,
    /// Unique email used for login.
    pub email: String,
    /// Unique handle; absence never collides.
    pub username: Option<String>,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Account kind: author or bookstore.
    #[serde(rename = "type")]
    pub kind: OwnerKind,
    /// Short biography.
    pub bio: Option<String>,
    /// WhatsApp contact number.
    pub whatsapp_number: Option<String>,
    /// Profile image URL (blob store).
    pub profile_image: Option<String>,
    /// Approval status.
    pub status: OwnerStatus,
    /// Reviewer-supplied reason when rejected.
    pub rejection_reason: Option<String>,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last profile update timestamp.
    pub updated_at: i64,
}

/// Book listing owned by exactly one owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Unique listing ID.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Numeric price.
    pub price: f64,
    /// Price currency.
    pub currency: Currency,
    /// Cover image URL (blob store).
    pub cover_image: String,
    /// Book author as displayed.
    pub author: Option<String>,
    /// Book description.
    pub description: Option<String>,
    /// Listing format: ebook or audiobook.
    pub format: BookFormat,
    /// Owning owner ID, immutable after creation.
    pub owner_id: String,
    /// Contact number snapshot taken from the owner at creation.
    /// Backfilled on update if missing, never live-synced.
    pub owner_whats_app: Option<String>,
    /// Listing creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Millisecond timestamp helper (username suffixes).
pub fn now_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}
