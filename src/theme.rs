//! Global theme setting: singleton upsert plus best-effort fan-out.
//!
//! The fan-out sink is an injected interface owned by process wiring; the
//! service only calls `publish`. Subscriber lifecycle (connect/disconnect)
//! belongs entirely to the transport side. Delivery is at-most-once with no
//! replay; late subscribers catch up by reading the persisted setting.

use crate::db::{Database, ThemeMode};
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Fan-out sink for theme change events.
pub trait ThemeSink: Send + Sync {
    /// Publish a theme change to currently connected subscribers.
    fn publish(&self, mode: ThemeMode);
}

/// Sink backed by a tokio broadcast channel; the WebSocket endpoint holds
/// the subscribing half.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ThemeMode>,
}

impl BroadcastSink {
    /// Create a sink with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future theme changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ThemeMode> {
        self.tx.subscribe()
    }
}

impl ThemeSink for BroadcastSink {
    fn publish(&self, mode: ThemeMode) {
        // Err means no live subscribers; that is fine for best-effort fan-out.
        let _ = self.tx.send(mode);
    }
}

/// Theme service: persist, then broadcast.
pub struct ThemeService {
    db: Database,
    sink: Arc<dyn ThemeSink>,
}

impl ThemeService {
    /// Create a theme service around the injected sink.
    pub fn new(db: Database, sink: Arc<dyn ThemeSink>) -> Self {
        Self { db, sink }
    }

    /// Upsert the singleton setting and fan the new mode out to subscribers.
    pub fn set_theme(&self, mode: ThemeMode) -> Result<ThemeMode> {
        self.db.upsert_theme(mode)?;
        tracing::info!(theme = mode.as_str(), "Theme setting persisted");
        self.sink.publish(mode);
        Ok(mode)
    }

    /// Current persisted mode, `None` if never set.
    pub fn get_theme(&self) -> Result<Option<ThemeMode>> {
        self.db.get_theme()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_publishes_to_subscribers() {
        let db = Database::open_memory().unwrap();
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        let service = ThemeService::new(db, Arc::new(sink));

        service.set_theme(ThemeMode::Dark).unwrap();
        assert_eq!(rx.try_recv().unwrap(), ThemeMode::Dark);
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let db = Database::open_memory().unwrap();
        let service = ThemeService::new(db, Arc::new(BroadcastSink::new(8)));
        assert_eq!(service.set_theme(ThemeMode::Light).unwrap(), ThemeMode::Light);
    }

    #[test]
    fn late_subscriber_catches_up_via_get() {
        let db = Database::open_memory().unwrap();
        let sink = BroadcastSink::new(8);
        let service = ThemeService::new(db, Arc::new(sink.clone()));

        service.set_theme(ThemeMode::Dark).unwrap();
        // A subscriber connecting now missed the event but reads the state.
        let _rx = sink.subscribe();
        assert_eq!(service.get_theme().unwrap(), Some(ThemeMode::Dark));
    }
}
