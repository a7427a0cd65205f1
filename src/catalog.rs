//! Public catalog: read-only, unauthenticated projection over listings and
//! their owners. Visibility follows the owner's current approval status and
//! is re-evaluated on every read, never cached on the listing.

use crate::db::{BookFormat, CatalogRow, Currency, Database};
use crate::error::Result;
use serde::Serialize;

/// Owner sub-object exposed to the public. Deliberately has no status field;
/// the approval gate is applied in the query and the field never leaves the
/// server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicOwner {
    /// Owner display name.
    pub name: String,
    /// Profile image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    /// Contact number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
}

/// A listing as the public sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicListing {
    /// Listing ID.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Numeric price.
    pub price: f64,
    /// Price currency.
    pub currency: Currency,
    /// Cover image URL.
    pub cover_image: String,
    /// Display author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Listing format.
    pub format: BookFormat,
    /// Contact number snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_whats_app: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
    /// Projected owner.
    pub owner: PublicOwner,
}

impl From<CatalogRow> for PublicListing {
    fn from(row: CatalogRow) -> Self {
        let listing = row.listing;
        PublicListing {
            id: listing.id,
            title: listing.title,
            price: listing.price,
            currency: listing.currency,
            cover_image: listing.cover_image,
            author: listing.author,
            description: listing.description,
            format: listing.format,
            owner_whats_app: listing.owner_whats_app,
            created_at: listing.created_at,
            owner: PublicOwner {
                name: row.owner_name,
                profile_image: row.owner_profile_image,
                whatsapp_number: row.owner_whatsapp,
            },
        }
    }
}

/// Search the public catalog. Optional case-insensitive substring match
/// against title or author; an absent or blank query returns everything.
/// Only listings whose owner is currently approved appear; results are
/// newest-created-first.
pub fn search(db: &Database, query: Option<&str>) -> Result<Vec<PublicListing>> {
    let rows = db.search_public_listings(query)?;
    Ok(rows.into_iter().map(PublicListing::from).collect())
}
