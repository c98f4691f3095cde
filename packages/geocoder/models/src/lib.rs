#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Reverse-geocoding response and normalized location types.
//!
//! [`GeocodeResponse`] mirrors the provider's JSON payload closely enough
//! to round-trip it (unknown fields are kept in `extra` maps), while
//! [`LocationRecord`] is the normalized view the rest of the system works
//! with: four optional administrative names plus the raw response.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

/// Top-level `status` field of a geocoding response.
///
/// Statuses the provider may add in the future are preserved verbatim in
/// [`GeocodeStatus::Other`] rather than failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GeocodeStatus {
    /// At least one result was returned.
    Ok,
    /// The request was valid but nothing was found at the coordinate.
    ZeroResults,
    /// The per-second or daily request quota has been used up.
    OverQueryLimit,
    /// The billing/daily limit for the API key has been reached.
    OverDailyLimit,
    /// Provider-internal transient failure; the same request may succeed
    /// on retry.
    UnknownError,
    /// Any other status string (e.g. `REQUEST_DENIED`).
    #[strum(default)]
    Other(String),
}

impl GeocodeStatus {
    /// Returns the wire representation of this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::ZeroResults => "ZERO_RESULTS",
            Self::OverQueryLimit => "OVER_QUERY_LIMIT",
            Self::OverDailyLimit => "OVER_DAILY_LIMIT",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::Other(status) => status,
        }
    }

    /// Whether the provider explicitly reported exhausted quota.
    #[must_use]
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::OverQueryLimit | Self::OverDailyLimit)
    }
}

impl fmt::Display for GeocodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for GeocodeStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(Self::Other(value))
    }
}

impl From<GeocodeStatus> for String {
    fn from(value: GeocodeStatus) -> Self {
        match value {
            GeocodeStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

/// Full reverse-geocoding response as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResponse {
    /// Outcome reported by the provider.
    pub status: GeocodeStatus,
    /// Candidate results, best match first.
    #[serde(default)]
    pub results: Vec<RawResult>,
    /// Any other top-level fields (e.g. `error_message`, `plus_code`).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GeocodeResponse {
    /// Creates a response with the given status and no results.
    #[must_use]
    pub fn empty(status: GeocodeStatus) -> Self {
        Self {
            status,
            results: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// The provider's `error_message`, if it sent one.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.extra
            .get("error_message")
            .and_then(serde_json::Value::as_str)
    }
}

/// A single candidate result within a [`GeocodeResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    /// Address components, most specific first.
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
    /// Remaining result fields (`formatted_address`, `geometry`,
    /// `place_id`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One named component of an address (e.g. a city or a country).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressComponent {
    /// Full human-readable name (e.g. `"United States"`).
    pub long_name: String,
    /// Type tags describing what this component is.
    #[serde(default)]
    pub types: Vec<String>,
    /// Remaining component fields (`short_name`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The address categories a [`LocationRecord`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
pub enum AddressCategory {
    /// City or town.
    #[strum(serialize = "locality")]
    Locality,
    /// First-order civil entity below country (state, province).
    #[strum(serialize = "administrative_area_level_1")]
    AdministrativeAreaLevel1,
    /// Second-order civil entity (county, district).
    #[strum(serialize = "administrative_area_level_2")]
    AdministrativeAreaLevel2,
    /// Country.
    #[strum(serialize = "country")]
    Country,
}

/// Normalized administrative location for a coordinate.
///
/// Every name is optional: `None` means the provider returned no address
/// component of that category, which is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// City or town.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    /// State/province.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative_area_level_1: Option<String>,
    /// County/district.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub administrative_area_level_2: Option<String>,
    /// Country.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// The provider response this record was extracted from.
    pub raw: GeocodeResponse,
}

impl LocationRecord {
    /// Creates a record with every name absent.
    #[must_use]
    pub const fn empty(raw: GeocodeResponse) -> Self {
        Self {
            locality: None,
            administrative_area_level_1: None,
            administrative_area_level_2: None,
            country: None,
            raw,
        }
    }

    /// Overwrites the name stored for `category`.
    pub fn set(&mut self, category: AddressCategory, name: String) {
        let slot = match category {
            AddressCategory::Locality => &mut self.locality,
            AddressCategory::AdministrativeAreaLevel1 => &mut self.administrative_area_level_1,
            AddressCategory::AdministrativeAreaLevel2 => &mut self.administrative_area_level_2,
            AddressCategory::Country => &mut self.country,
        };
        *slot = Some(name);
    }

    /// Whether no category was found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.locality.is_none()
            && self.administrative_area_level_1.is_none()
            && self.administrative_area_level_2.is_none()
            && self.country.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_unknown_statuses() {
        assert_eq!(GeocodeStatus::from("OK".to_string()), GeocodeStatus::Ok);
        assert_eq!(
            GeocodeStatus::from("OVER_QUERY_LIMIT".to_string()),
            GeocodeStatus::OverQueryLimit
        );
        assert_eq!(
            GeocodeStatus::from("REQUEST_DENIED".to_string()),
            GeocodeStatus::Other("REQUEST_DENIED".to_string())
        );
    }

    #[test]
    fn status_serializes_back_to_wire_string() {
        let json = serde_json::to_value(GeocodeStatus::ZeroResults).unwrap();
        assert_eq!(json, serde_json::json!("ZERO_RESULTS"));

        let json = serde_json::to_value(GeocodeStatus::Other("NEW_STATUS".to_string())).unwrap();
        assert_eq!(json, serde_json::json!("NEW_STATUS"));
    }

    #[test]
    fn response_keeps_unknown_fields() {
        let body = serde_json::json!({
            "status": "OK",
            "plus_code": { "global_code": "849VCWC8+R9" },
            "results": [{
                "formatted_address": "Springfield, IL, USA",
                "place_id": "abc",
                "address_components": [{
                    "long_name": "Springfield",
                    "short_name": "Springfield",
                    "types": ["locality", "political"]
                }]
            }]
        });

        let parsed: GeocodeResponse = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(parsed.status, GeocodeStatus::Ok);
        assert_eq!(parsed.results[0].address_components[0].long_name, "Springfield");

        let round_tripped = serde_json::to_value(&parsed).unwrap();
        assert_eq!(round_tripped, body);
    }

    #[test]
    fn missing_results_defaults_to_empty() {
        let parsed: GeocodeResponse = serde_json::from_value(serde_json::json!({
            "status": "OVER_QUERY_LIMIT",
            "error_message": "You have exceeded your daily request quota for this API."
        }))
        .unwrap();
        assert!(parsed.results.is_empty());
        assert!(parsed.status.is_quota_exceeded());
        assert!(parsed.error_message().is_some());
    }

    #[test]
    fn category_tags_parse() {
        assert_eq!(
            "administrative_area_level_1".parse::<AddressCategory>().unwrap(),
            AddressCategory::AdministrativeAreaLevel1
        );
        assert!("political".parse::<AddressCategory>().is_err());
    }

    #[test]
    fn absent_names_are_omitted_when_serialized() {
        let mut record = LocationRecord::empty(GeocodeResponse::empty(GeocodeStatus::Ok));
        record.set(AddressCategory::Locality, "Springfield".to_string());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["locality"], "Springfield");
        assert!(json.get("country").is_none());
        assert!(!record.is_empty());
    }
}
