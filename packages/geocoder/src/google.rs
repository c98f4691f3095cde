//! Google Geocoding API client (reverse lookups).
//!
//! Issues `GET {base_url}?latlng={lat},{lng}` and classifies the answer.
//! The provider reports most failures inside a `200 OK` body via the
//! `status` field, so HTTP-level and body-level failures are both mapped
//! onto [`RetryCause`]s.
//!
//! See <https://developers.google.com/maps/documentation/geocoding/requests-reverse-geocoding>

use tile_locator_geocoder_models::GeocodeResponse;
use tile_locator_tile_models::TileCoordinate;

use crate::retry::{RetryDelays, classify_error, classify_response};
use crate::{GeocodeError, Geocoder, Resolution};

/// Public reverse-geocoding endpoint.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Maximum length of the response body preview included in error messages.
const BODY_PREVIEW_LEN: usize = 200;

/// Reverse geocoder backed by the Google Geocoding API (or anything that
/// speaks its wire format).
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    delays: RetryDelays,
}

impl GoogleGeocoder {
    /// Creates a client for `base_url`.
    ///
    /// The per-request timeout is whatever `client` was built with.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, delays: RetryDelays) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: None,
            delays,
        }
    }

    /// Sends `key={api_key}` with every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.is_empty());
        self
    }

    /// Fetches and parses the raw provider response for `coordinate`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails, the provider answers
    /// with a non-success HTTP status, or the body is not a geocoding
    /// response.
    pub async fn fetch(&self, coordinate: TileCoordinate) -> Result<GeocodeResponse, GeocodeError> {
        let latlng = format!(
            "{},{}",
            coordinate.center_latitude, coordinate.center_longitude
        );
        log::debug!("Reverse geocoding {latlng}");

        let mut req = self
            .client
            .get(&self.base_url)
            .query(&[("latlng", latlng.as_str())]);
        if let Some(key) = &self.api_key {
            req = req.query(&[("key", key.as_str())]);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        parse_response(&body)
    }
}

#[async_trait::async_trait]
impl Geocoder for GoogleGeocoder {
    async fn resolve(&self, coordinate: TileCoordinate) -> Resolution {
        let classified = match self.fetch(coordinate).await {
            Ok(response) => {
                if let Some(message) = response.error_message() {
                    log::warn!("Geocoder status {}: {message}", response.status);
                }
                classify_response(response)
            }
            Err(e) => Err(classify_error(&e)),
        };

        match classified {
            Ok(location) => Resolution::Located(location),
            Err(cause) => Resolution::RetryAfter {
                delay: self.delays.delay_for(&cause),
                cause,
            },
        }
    }
}

/// Parses a geocoding response body.
fn parse_response(body: &str) -> Result<GeocodeResponse, GeocodeError> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(BODY_PREVIEW_LEN).collect();
        GeocodeError::Parse {
            message: format!("{e} (body: {preview})"),
        }
    })
}
