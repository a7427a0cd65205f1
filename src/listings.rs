//! Listing ownership and mutation rules.

use crate::db::{BookFormat, Currency, Database, Listing, Owner, now_timestamp};
use crate::error::{AppError, Result};

/// Fields required to create a listing. Price arrives as text and is
/// coerced; currency and format are validated against their closed sets.
#[derive(Debug, Clone, Default)]
pub struct NewListing {
    /// Book title (required).
    pub title: String,
    /// Price as supplied by the client.
    pub price: String,
    /// Currency code.
    pub currency: String,
    /// Listing format.
    pub format: String,
    /// Display author.
    pub author: Option<String>,
    /// Description.
    pub description: Option<String>,
}

/// Partial update: only supplied fields change.
#[derive(Debug, Clone, Default)]
pub struct ListingPatch {
    /// New title.
    pub title: Option<String>,
    /// New price, re-coerced.
    pub price: Option<String>,
    /// New currency, re-validated.
    pub currency: Option<String>,
    /// New format, re-validated.
    pub format: Option<String>,
    /// New display author.
    pub author: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// Coerce a client-supplied price to a number.
fn parse_price(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(|| AppError::Validation("Invalid price value".to_string()))
}

/// Listing service enforcing the ownership contract: every mutation is
/// scoped to the acting owner, and the owner reference set at creation is
/// immutable.
pub struct ListingService {
    db: Database,
}

impl ListingService {
    /// Create a new listing service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a listing owned by the acting owner. `cover_image` is the
    /// already-uploaded blob URL; a missing cover is rejected upstream. The
    /// owner's contact number is snapshotted here and does not track later
    /// profile edits.
    pub fn create(&self, actor: &Owner, input: NewListing, cover_image: String) -> Result<Listing> {
        if input.title.is_empty() || input.price.is_empty() {
            return Err(AppError::Validation(
                "Missing required fields: title, price, format, or currency".to_string(),
            ));
        }

        let price = parse_price(&input.price)?;
        let format = BookFormat::parse(&input.format)?;
        let currency = Currency::parse(&input.currency)?;
        let now = now_timestamp();

        let listing = Listing {
            id: uuid::Uuid::new_v4().to_string(),
            title: input.title,
            price,
            currency,
            cover_image,
            author: input.author,
            description: input.description,
            format,
            owner_id: actor.id.clone(),
            owner_whats_app: actor.whatsapp_number.clone(),
            created_at: now,
            updated_at: now,
        };

        self.db.create_listing(&listing)?;
        Ok(listing)
    }

    /// Apply a partial update. Existence is checked before ownership; a
    /// non-owner gets `Forbidden` even for a well-formed id. A new cover
    /// replaces the stored URL (the old remote blob is not deleted), and a
    /// missing contact snapshot is backfilled from the acting owner.
    pub fn update(
        &self,
        actor: &Owner,
        id: &str,
        patch: ListingPatch,
        new_cover: Option<String>,
    ) -> Result<Listing> {
        let mut listing = self.load_owned(actor, id, "update")?;

        if let Some(title) = patch.title {
            listing.title = title;
        }
        if let Some(price) = patch.price {
            listing.price = parse_price(&price)?;
        }
        if let Some(currency) = patch.currency {
            listing.currency = Currency::parse(&currency)?;
        }
        if let Some(format) = patch.format {
            listing.format = BookFormat::parse(&format)?;
        }
        if let Some(author) = patch.author {
            listing.author = Some(author);
        }
        if let Some(description) = patch.description {
            listing.description = Some(description);
        }
        if let Some(cover) = new_cover {
            listing.cover_image = cover;
        }
        if listing.owner_whats_app.is_none() {
            listing.owner_whats_app = actor.whatsapp_number.clone();
        }

        self.db.update_listing(&listing)?;
        Ok(listing)
    }

    /// Physically delete a listing owned by the acting owner.
    pub fn delete(&self, actor: &Owner, id: &str) -> Result<()> {
        self.load_owned(actor, id, "delete")?;
        self.db.delete_listing(id)
    }

    /// Every listing owned by the actor, regardless of the actor's own
    /// approval status. Only the public catalog applies the approval filter.
    pub fn list_mine(&self, actor: &Owner) -> Result<Vec<Listing>> {
        self.db.list_owner_listings(&actor.id)
    }

    /// Load a listing and enforce the mutation contract: absent → NotFound,
    /// corrupt/unowned record → Forbidden, owner mismatch → Forbidden.
    fn load_owned(&self, actor: &Owner, id: &str, verb: &str) -> Result<Listing> {
        let listing = self
            .db
            .get_listing(id)?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if listing.owner_id.is_empty() {
            tracing::warn!(listing = %id, "Listing has no owner reference");
            return Err(AppError::Forbidden(format!(
                "Not authorized to {} this book",
                verb
            )));
        }
        if listing.owner_id != actor.id {
            return Err(AppError::Forbidden(format!(
                "Not authorized to {} this book",
                verb
            )));
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_coercion() {
        assert_eq!(parse_price("12.5").unwrap(), 12.5);
        assert_eq!(parse_price(" 300 ").unwrap(), 300.0);
        assert!(parse_price("twelve").is_err());
        assert!(parse_price("").is_err());
        assert!(parse_price("NaN").is_err());
        assert!(parse_price("inf").is_err());
    }
}
