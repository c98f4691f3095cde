#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reverse geocoding for map tiles.
//!
//! Resolves a tile's center coordinate to administrative location names
//! through an external provider (the Google Geocoding API wire format, see
//! [`google`]). Every call ends in one of two ways:
//!
//! 1. **Located**: the provider answered `OK` or `ZERO_RESULTS`; the
//!    response was normalized with [`address::extract_location`].
//! 2. **Retry later**: quota exhaustion, a provider hiccup, a network
//!    failure, or a garbled body. The [`retry`] module classifies the
//!    failure and picks the delay; nothing here sleeps or retries on its
//!    own.

pub mod address;
pub mod google;
pub mod retry;

use std::time::Duration;

use thiserror::Error;
use tile_locator_geocoder_models::LocationRecord;
use tile_locator_tile_models::TileCoordinate;

pub use retry::{RetryCause, RetryDelays};

/// Errors from a single provider request.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed (timeout, connection refused, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success HTTP status.
    #[error("Provider returned HTTP {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// Outcome of resolving one coordinate.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The coordinate was resolved (possibly with every name absent).
    Located(LocationRecord),
    /// The lookup must be retried after `delay`.
    RetryAfter {
        /// How long the caller should wait before retrying.
        delay: Duration,
        /// What went wrong.
        cause: RetryCause,
    },
}

/// A reverse-geocoding provider.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves `coordinate` to a location, or says how long to back off.
    async fn resolve(&self, coordinate: TileCoordinate) -> Resolution;
}
