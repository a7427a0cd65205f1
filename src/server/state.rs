//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::blobs::BlobStore;
use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::listings::ListingService;
use crate::theme::{BroadcastSink, ThemeService};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Listing ownership/mutation service.
    pub listings: Arc<ListingService>,
    /// Theme setting service (persist + fan-out).
    pub theme: Arc<ThemeService>,
    /// Subscribing half of the theme fan-out channel.
    pub theme_events: BroadcastSink,
    /// Blob upload collaborator; `None` means uploads are rejected.
    blobs: Option<Arc<dyn BlobStore>>,
}

impl AppState {
    /// Wire up application state. The fan-out sink is created here and
    /// injected into the theme service; handlers only ever see the trait.
    pub fn new(
        config: Config,
        db: Database,
        auth: AuthService,
        blobs: Option<Arc<dyn BlobStore>>,
    ) -> Self {
        let theme_events = BroadcastSink::new(32);
        let theme = Arc::new(ThemeService::new(
            db.clone(),
            Arc::new(theme_events.clone()),
        ));

        Self {
            config: Arc::new(config),
            db: db.clone(),
            auth: Arc::new(auth),
            listings: Arc::new(ListingService::new(db)),
            theme,
            theme_events,
            blobs,
        }
    }

    /// The blob store, or the fail-closed misconfiguration error. No image
    /// upload path falls back to local storage.
    pub fn blob_store(&self) -> Result<&Arc<dyn BlobStore>> {
        self.blobs.as_ref().ok_or_else(|| {
            tracing::error!("Blob store not configured - image upload rejected");
            AppError::Upstream(
                "Server misconfiguration: image uploads require a configured blob store"
                    .to_string(),
            )
        })
    }
}
