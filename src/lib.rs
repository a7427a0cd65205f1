//! bookstall-rs: Owner backend for a bookstore marketplace.
//!
//! This crate provides the seller-facing API of a small marketplace:
//! owner accounts with an explicit approval gate, stateless signed
//! session tokens delivered as cookies, ownership-enforced book
//! listings with external cover hosting, a public approved-only
//! catalog, and a global theme setting fanned out to subscribers.
//!
//! # Features
//!
//! - Owner signup with pending/approved/rejected lifecycle
//! - HMAC-signed session tokens (cookie or bearer)
//! - Book listings scoped to their owning account
//! - Public catalog search over approved owners only
//! - Global theme setting with WebSocket fan-out
//! - CLI owner management (the approval actor)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication: passwords, tokens, signup and login.
pub mod auth;
/// Blob upload collaborator.
pub mod blobs;
/// Public catalog projection.
pub mod catalog;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Listing ownership and mutation.
pub mod listings;
/// HTTP server.
pub mod server;
/// Global theme setting.
pub mod theme;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
