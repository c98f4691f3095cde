//! Work queue backed by the tile service's `GET /fetch` endpoint.
//!
//! The endpoint answers with the next unfetched tile id as plain text, or
//! the literal `empty` when nothing is pending. It removes the tile from
//! its own backlog as it answers, so there is nothing to acknowledge and a
//! deferred tile is never offered again: [`WorkQueue::redelivers`] is
//! `false`.

use crate::{LeaseToken, QueueError, WorkItem, WorkQueue, body_preview};

/// Body returned by the endpoint when nothing is pending.
const EMPTY_SENTINEL: &str = "empty";

/// Pops tile ids from `{base}/fetch`.
#[derive(Debug, Clone)]
pub struct FetchEndpointQueue {
    client: reqwest::Client,
    url: String,
}

impl FetchEndpointQueue {
    /// Creates a queue reading from the tile service at `base_url`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/fetch", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait::async_trait]
impl WorkQueue for FetchEndpointQueue {
    async fn dequeue(&self) -> Result<Option<WorkItem>, QueueError> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(QueueError::UnexpectedStatus {
                status: status.as_u16(),
                body: body_preview(&body),
            });
        }

        let tile_id = body.trim();
        if tile_id.is_empty() || tile_id == EMPTY_SENTINEL {
            return Ok(None);
        }

        Ok(Some(WorkItem {
            tile_id: tile_id.to_string(),
            lease: LeaseToken::new(tile_id, ""),
            dequeue_count: 1,
        }))
    }

    async fn acknowledge(&self, lease: &LeaseToken) -> Result<(), QueueError> {
        log::trace!("{} was popped by the fetch endpoint", lease.message_id());
        Ok(())
    }

    fn redelivers(&self) -> bool {
        false
    }
}
