#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Work queue clients.
//!
//! A [`WorkQueue`] hands out at most one pending tile id per
//! [`WorkQueue::dequeue`] call, leased under a [`LeaseToken`]. The item
//! stays invisible to other consumers until the lease expires; only
//! [`WorkQueue::acknowledge`] removes it for good. An item that is never
//! acknowledged is therefore redelivered, which gives at-least-once
//! processing.
//!
//! Two backends are provided:
//!
//! - [`azure::AzureQueue`]: Azure Storage Queues over REST, authenticated
//!   with a SAS token.
//! - [`fetch::FetchEndpointQueue`]: the tile service's `GET /fetch`
//!   endpoint, which pops server-side and has nothing to acknowledge.

pub mod azure;
pub mod fetch;

use thiserror::Error;

pub use azure::AzureQueue;
pub use fetch::FetchEndpointQueue;

/// Errors from queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The queue service answered with an unexpected status.
    #[error("Queue service returned HTTP {status}: {body}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// Preview of the response body.
        body: String,
    },

    /// The response body could not be understood.
    #[error("Malformed queue response: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },
}

/// Opaque proof that the holder may acknowledge one delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseToken {
    message_id: String,
    pop_receipt: String,
}

impl LeaseToken {
    /// Creates a lease for `message_id` delivered under `pop_receipt`.
    #[must_use]
    pub fn new(message_id: impl Into<String>, pop_receipt: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            pop_receipt: pop_receipt.into(),
        }
    }

    /// Identifier of the leased message.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Receipt proving this particular delivery.
    #[must_use]
    pub fn pop_receipt(&self) -> &str {
        &self.pop_receipt
    }
}

/// One leased tile id. Lives for a single worker cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// The tile to resolve.
    pub tile_id: String,
    /// Lease needed to acknowledge this delivery.
    pub lease: LeaseToken,
    /// How many times the queue has delivered this message, this time
    /// included.
    pub dequeue_count: u32,
}

/// A durable queue of pending tile ids.
#[async_trait::async_trait]
pub trait WorkQueue: Send + Sync {
    /// Leases the next pending item, or returns `None` when nothing is
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the queue cannot be read.
    async fn dequeue(&self) -> Result<Option<WorkItem>, QueueError>;

    /// Permanently removes the delivery identified by `lease`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the queue rejects the acknowledgment; the
    /// item then becomes visible again once its lease expires.
    async fn acknowledge(&self, lease: &LeaseToken) -> Result<(), QueueError>;

    /// Whether an unacknowledged delivery comes back on its own once its
    /// lease expires. Backends that pop on read return `false`; callers
    /// must then hold on to an item they want to retry.
    fn redelivers(&self) -> bool {
        true
    }
}

/// Truncates a response body for inclusion in an error.
fn body_preview(body: &str) -> String {
    const BODY_PREVIEW_LEN: usize = 500;
    body.chars().take(BODY_PREVIEW_LEN).collect()
}
