use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Arc;

/// Fixed key of the theme setting singleton row.
pub const THEME_KEY: &str = "global-theme";

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Owners table
            CREATE TABLE IF NOT EXISTS owners (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                store_name TEXT,
                email TEXT UNIQUE NOT NULL,
                username TEXT UNIQUE,
                password_hash TEXT NOT NULL,
                kind TEXT NOT NULL,
                bio TEXT,
                whatsapp_number TEXT,
                profile_image TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                rejection_reason TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Listings table
            CREATE TABLE IF NOT EXISTS listings (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                price REAL NOT NULL,
                currency TEXT NOT NULL,
                cover_image TEXT NOT NULL,
                author TEXT,
                description TEXT,
                format TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                owner_whatsapp TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES owners(id)
            );

            -- Theme setting singleton
            CREATE TABLE IF NOT EXISTS theme_settings (
                key TEXT PRIMARY KEY,
                theme_mode TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_listings_owner ON listings(owner_id);
            CREATE INDEX IF NOT EXISTS idx_listings_created ON listings(created_at);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== OWNER OPERATIONS ==========

    /// Create a new owner. UNIQUE violations on email/username are translated
    /// to `Conflict` so a lost pre-check race surfaces the same way as the
    /// pre-check itself.
    pub fn create_owner(&self, owner: &Owner) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO owners (id, name, store_name, email, username, password_hash,
                                 kind, bio, whatsapp_number, profile_image, status,
                                 rejection_reason, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                owner.id,
                owner.name,
                owner.store_name,
                owner.email,
                owner.username,
                owner.password_hash,
                owner.kind.as_str(),
                owner.bio,
                owner.whatsapp_number,
                owner.profile_image,
                owner.status.as_str(),
                owner.rejection_reason,
                owner.created_at,
                owner.updated_at,
            ],
        )
        .map_err(map_owner_insert_err)?;
        Ok(())
    }

    /// Get owner by email.
    pub fn get_owner_by_email(&self, email: &str) -> Result<Option<Owner>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE email = ?1", SELECT_OWNER),
            params![email],
            owner_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get owner: {}", e)))
    }

    /// Get owner by ID.
    pub fn get_owner_by_id(&self, id: &str) -> Result<Option<Owner>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_OWNER),
            params![id],
            owner_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get owner: {}", e)))
    }

    /// Get owner by username.
    pub fn get_owner_by_username(&self, username: &str) -> Result<Option<Owner>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE username = ?1", SELECT_OWNER),
            params![username],
            owner_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get owner: {}", e)))
    }

    /// List all owners, newest first.
    pub fn list_owners(&self) -> Result<Vec<Owner>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("{} ORDER BY created_at DESC", SELECT_OWNER))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let owners = stmt
            .query_map([], owner_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list owners: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect owners: {}", e)))?;

        Ok(owners)
    }

    /// Update an owner's mutable profile fields.
    pub fn update_owner_profile(&self, owner: &Owner) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE owners SET name = ?1, store_name = ?2, bio = ?3,
                               whatsapp_number = ?4, profile_image = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                owner.name,
                owner.store_name,
                owner.bio,
                owner.whatsapp_number,
                owner.profile_image,
                now_timestamp(),
                owner.id,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update owner: {}", e)))?;
        Ok(())
    }

    /// Set an owner's approval status (admin path). Returns false when the
    /// email does not match any owner.
    pub fn set_owner_status(
        &self,
        email: &str,
        status: OwnerStatus,
        rejection_reason: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE owners SET status = ?1, rejection_reason = ?2, updated_at = ?3
                 WHERE email = ?4",
                params![status.as_str(), rejection_reason, now_timestamp(), email],
            )
            .map_err(|e| AppError::Internal(format!("Failed to set owner status: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete owner by email.
    pub fn delete_owner(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM owners WHERE email = ?1", params![email])
            .map_err(|e| AppError::Internal(format!("Failed to delete owner: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== LISTING OPERATIONS ==========

    /// Create a listing.
    pub fn create_listing(&self, listing: &Listing) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO listings (id, title, price, currency, cover_image, author,
                                   description, format, owner_id, owner_whatsapp,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                listing.id,
                listing.title,
                listing.price,
                listing.currency.as_str(),
                listing.cover_image,
                listing.author,
                listing.description,
                listing.format.as_str(),
                listing.owner_id,
                listing.owner_whats_app,
                listing.created_at,
                listing.updated_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create listing: {}", e)))?;
        Ok(())
    }

    /// Get listing by ID.
    pub fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_LISTING),
            params![id],
            listing_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get listing: {}", e)))
    }

    /// Save a listing's mutable fields. The owner reference is intentionally
    /// not part of the update set.
    pub fn update_listing(&self, listing: &Listing) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE listings SET title = ?1, price = ?2, currency = ?3, cover_image = ?4,
                                 author = ?5, description = ?6, format = ?7,
                                 owner_whatsapp = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                listing.title,
                listing.price,
                listing.currency.as_str(),
                listing.cover_image,
                listing.author,
                listing.description,
                listing.format.as_str(),
                listing.owner_whats_app,
                now_timestamp(),
                listing.id,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update listing: {}", e)))?;
        Ok(())
    }

    /// Delete a listing.
    pub fn delete_listing(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM listings WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete listing: {}", e)))?;
        Ok(())
    }

    /// All listings owned by one owner, newest first, regardless of the
    /// owner's approval status.
    pub fn list_owner_listings(&self, owner_id: &str) -> Result<Vec<Listing>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE owner_id = ?1 ORDER BY created_at DESC",
                SELECT_LISTING
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let listings = stmt
            .query_map(params![owner_id], listing_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list listings: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect listings: {}", e)))?;

        Ok(listings)
    }

    /// Public catalog query: join each listing to its owner, keep only
    /// approved owners, optional case-insensitive substring match on title or
    /// author, newest first. Listings whose owner row is gone drop out of the
    /// join naturally.
    pub fn search_public_listings(&self, query: Option<&str>) -> Result<Vec<CatalogRow>> {
        let conn = self.conn.lock();

        let base = format!(
            "SELECT {}, o.name, o.profile_image, o.whatsapp_number
             FROM listings l JOIN owners o ON o.id = l.owner_id
             WHERE o.status = 'approved'",
            SELECT_LISTING_COLS_L
        );

        let map_row = |row: &Row| -> rusqlite::Result<CatalogRow> {
            Ok(CatalogRow {
                listing: listing_from_row(row)?,
                owner_name: row.get(12)?,
                owner_profile_image: row.get(13)?,
                owner_whatsapp: row.get(14)?,
            })
        };

        let rows = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => {
                let pattern = format!("%{}%", q.to_lowercase());
                let sql = format!(
                    "{} AND (lower(l.title) LIKE ?1 OR lower(l.author) LIKE ?1)
                     ORDER BY l.created_at DESC",
                    base
                );
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
                stmt.query_map(params![pattern], map_row)
                    .map_err(|e| AppError::Internal(format!("Failed to search listings: {}", e)))?
                    .collect::<std::result::Result<Vec<_>, _>>()
            }
            None => {
                let sql = format!("{} ORDER BY l.created_at DESC", base);
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
                stmt.query_map([], map_row)
                    .map_err(|e| AppError::Internal(format!("Failed to search listings: {}", e)))?
                    .collect::<std::result::Result<Vec<_>, _>>()
            }
        };

        rows.map_err(|e| AppError::Internal(format!("Failed to collect listings: {}", e)))
    }

    // ========== THEME OPERATIONS ==========

    /// Upsert the theme setting singleton. Create-or-replace, never a second
    /// row.
    pub fn upsert_theme(&self, mode: ThemeMode) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO theme_settings (key, theme_mode, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET theme_mode = excluded.theme_mode,
                                            updated_at = excluded.updated_at",
            params![THEME_KEY, mode.as_str(), now_timestamp()],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save theme: {}", e)))?;
        Ok(())
    }

    /// Current theme mode, if one was ever set.
    pub fn get_theme(&self) -> Result<Option<ThemeMode>> {
        let conn = self.conn.lock();
        let mode: Option<String> = conn
            .query_row(
                "SELECT theme_mode FROM theme_settings WHERE key = ?1",
                params![THEME_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get theme: {}", e)))?;

        mode.as_deref().map(ThemeMode::parse).transpose()
    }

    /// Number of theme rows (test support for the singleton invariant).
    pub fn theme_row_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM theme_settings", [], |row| row.get(0))
            .map_err(|e| AppError::Internal(format!("Failed to count theme rows: {}", e)))
    }
}

/// One row of the public catalog join.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    /// The listing itself.
    pub listing: Listing,
    /// Owner display name.
    pub owner_name: String,
    /// Owner profile image URL.
    pub owner_profile_image: Option<String>,
    /// Owner contact number.
    pub owner_whatsapp: Option<String>,
}

const SELECT_OWNER: &str = "SELECT id, name, store_name, email, username, password_hash, kind,
            bio, whatsapp_number, profile_image, status, rejection_reason, created_at, updated_at
     FROM owners";

const SELECT_LISTING_COLS_L: &str = "l.id, l.title, l.price, l.currency, l.cover_image, l.author,
            l.description, l.format, l.owner_id, l.owner_whatsapp, l.created_at, l.updated_at";

const SELECT_LISTING: &str = "SELECT id, title, price, currency, cover_image, author, description,
            format, owner_id, owner_whatsapp, created_at, updated_at
     FROM listings";

fn owner_from_row(row: &Row) -> rusqlite::Result<Owner> {
    let kind: String = row.get(6)?;
    let status: String = row.get(10)?;
    Ok(Owner {
        id: row.get(0)?,
        name: row.get(1)?,
        store_name: row.get(2)?,
        email: row.get(3)?,
        username: row.get(4)?,
        password_hash: row.get(5)?,
        kind: OwnerKind::parse(&kind).map_err(|e| conversion_err(6, e))?,
        bio: row.get(7)?,
        whatsapp_number: row.get(8)?,
        profile_image: row.get(9)?,
        status: OwnerStatus::parse(&status).map_err(|e| conversion_err(10, e))?,
        rejection_reason: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn listing_from_row(row: &Row) -> rusqlite::Result<Listing> {
    let currency: String = row.get(3)?;
    let format: String = row.get(7)?;
    Ok(Listing {
        id: row.get(0)?,
        title: row.get(1)?,
        price: row.get(2)?,
        currency: Currency::parse(&currency).map_err(|e| conversion_err(3, e))?,
        cover_image: row.get(4)?,
        author: row.get(5)?,
        description: row.get(6)?,
        format: BookFormat::parse(&format).map_err(|e| conversion_err(7, e))?,
        owner_id: row.get(8)?,
        owner_whats_app: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn conversion_err(idx: usize, e: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Translate SQLite UNIQUE violations on owner insert into the same
/// `Conflict` results the signup pre-check produces.
fn map_owner_insert_err(e: rusqlite::Error) -> AppError {
    if let rusqlite::Error::SqliteFailure(err, Some(msg)) = &e
        && err.code == rusqlite::ErrorCode::ConstraintViolation
    {
        if msg.contains("owners.email") {
            return AppError::Conflict("Email already in use".to_string());
        }
        if msg.contains("owners.username") {
            return AppError::Conflict("Username already in use".to_string());
        }
        return AppError::Conflict("Duplicate field error".to_string());
    }
    AppError::Internal(format!("Failed to create owner: {}", e))
}
