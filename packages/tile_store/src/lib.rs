#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the downstream tile service.
//!
//! The service owns resolved tiles; this crate only consumes its HTTP
//! contract:
//!
//! - `GET {base}/tiles/{tile_id}`: existence check
//! - `POST {base}/tiles`: upsert of a [`TileRecord`] as a JSON:API
//!   document (see [`payload`])
//!
//! The service must treat repeated posts for the same tile id as an
//! upsert, which is what makes redelivered queue items harmless.

pub mod http;
pub mod payload;

use thiserror::Error;
use tile_locator_tile_models::TileRecord;

pub use http::HttpTileStore;

/// Errors from tile service operations.
#[derive(Debug, Error)]
pub enum TileStoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a status this client does not accept.
    #[error("Tile service returned HTTP {status}: {body}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// Preview of the response body.
        body: String,
    },

    /// The configured base URL cannot have paths appended to it.
    #[error("Invalid tile service URL '{url}': {message}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },
}

/// Whether the tile service already holds resolved metadata for a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    /// A well-formed resolved-tile payload exists.
    Resolved,
    /// Nothing (or nothing trustworthy) is stored yet.
    NotResolved,
}

/// Read/write access to resolved tiles.
#[async_trait::async_trait]
pub trait TileStore: Send + Sync {
    /// Checks whether `tile_id` has already been resolved.
    ///
    /// # Errors
    ///
    /// Returns [`TileStoreError`] if the service cannot be reached or
    /// answers with an unexpected status.
    async fn check_resolved(&self, tile_id: &str) -> Result<TileStatus, TileStoreError>;

    /// Upserts `record`.
    ///
    /// # Errors
    ///
    /// Returns [`TileStoreError`] if the write was not accepted.
    async fn persist(&self, record: &TileRecord) -> Result<(), TileStoreError>;
}
