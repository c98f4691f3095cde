//! [`TileStore`] over the tile service's HTTP API.

use reqwest::{StatusCode, Url};
use tile_locator_tile_models::TileRecord;

use crate::payload::{TileDocument, is_resolved_payload};
use crate::{TileStatus, TileStore, TileStoreError};

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 500;

/// Tile service client.
#[derive(Debug, Clone)]
pub struct HttpTileStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTileStore {
    /// Creates a client for the tile service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`TileStoreError::InvalidUrl`] if `base_url` is not an
    /// absolute URL that paths can be appended to.
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, TileStoreError> {
        let invalid = |message: String| TileStoreError::InvalidUrl {
            url: base_url.to_string(),
            message,
        };

        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot be a base".to_string()));
        }

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Builds `{base}/{segments...}`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait::async_trait]
impl TileStore for HttpTileStore {
    async fn check_resolved(&self, tile_id: &str) -> Result<TileStatus, TileStoreError> {
        let resp = self.client.get(self.url(&["tiles", tile_id])).send().await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(TileStatus::NotResolved);
        }

        let body = resp.text().await?;

        if !status.is_success() {
            return Err(unexpected_status(status, &body));
        }

        if is_resolved_payload(&body) {
            Ok(TileStatus::Resolved)
        } else {
            log::warn!(
                "Tile {tile_id}: HTTP {status} without a resolved-tile payload, \
                 treating as not resolved"
            );
            Ok(TileStatus::NotResolved)
        }
    }

    async fn persist(&self, record: &TileRecord) -> Result<(), TileStoreError> {
        let resp = self
            .client
            .post(self.url(&["tiles"]))
            .json(&TileDocument::new(record))
            .send()
            .await?;
        let status = resp.status();

        if status.is_success() {
            log::debug!("Tile {} persisted (HTTP {status})", record.tile_id);
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(unexpected_status(status, &body))
    }
}

fn unexpected_status(status: StatusCode, body: &str) -> TileStoreError {
    TileStoreError::UnexpectedStatus {
        status: status.as_u16(),
        body: body.chars().take(BODY_PREVIEW_LEN).collect(),
    }
}
