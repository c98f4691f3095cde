//! JSON:API documents exchanged with the tile service.

use serde::Serialize;
use tile_locator_tile_models::TileRecord;

/// Member whose presence marks a response as a real resolved-tile
/// document rather than, say, an error page served with `200 OK`.
pub const RESOLVED_MARKER: &str = "links";

/// JSON:API resource type for tiles.
const RESOURCE_TYPE: &str = "tile";

/// Top-level document posted to `POST /tiles`.
#[derive(Debug, Serialize)]
pub struct TileDocument<'a> {
    /// The tile resource.
    pub data: TileResource<'a>,
}

/// The `data` member of a [`TileDocument`].
#[derive(Debug, Serialize)]
pub struct TileResource<'a> {
    /// Always `"tile"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// The tile's attributes.
    pub attributes: &'a TileRecord,
}

impl<'a> TileDocument<'a> {
    /// Wraps `record` in a JSON:API document.
    #[must_use]
    pub const fn new(record: &'a TileRecord) -> Self {
        Self {
            data: TileResource {
                kind: RESOURCE_TYPE,
                attributes: record,
            },
        }
    }
}

/// Returns `true` if `body` is a JSON object carrying [`RESOLVED_MARKER`]
/// at the top level or inside `data`.
#[must_use]
pub fn is_resolved_payload(body: &str) -> bool {
    let Ok(serde_json::Value::Object(doc)) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };

    doc.contains_key(RESOLVED_MARKER)
        || doc
            .get("data")
            .and_then(serde_json::Value::as_object)
            .is_some_and(|data| data.contains_key(RESOLVED_MARKER))
}

#[cfg(test)]
mod tests {
    use tile_locator_geocoder_models::{GeocodeResponse, GeocodeStatus, LocationRecord};

    use super::*;

    #[test]
    fn detects_marker_at_top_level_and_in_data() {
        assert!(is_resolved_payload(
            r#"{"data":{"id":"1","type":"tile"},"links":{"self":"/tiles/1"}}"#
        ));
        assert!(is_resolved_payload(
            r#"{"data":{"id":"1","links":{"self":"/tiles/1"}}}"#
        ));
    }

    #[test]
    fn rejects_bodies_without_marker() {
        assert!(!is_resolved_payload(r#"{"data":{"id":"1","type":"tile"}}"#));
        assert!(!is_resolved_payload("<html><body>links</body></html>"));
        assert!(!is_resolved_payload(""));
        assert!(!is_resolved_payload(r#"["links"]"#));
    }

    #[test]
    fn serializes_json_api_document() {
        let mut location = LocationRecord::empty(GeocodeResponse::empty(GeocodeStatus::Ok));
        location.locality = Some("Metropolis".to_string());
        let record = TileRecord::new("10_500_300", location);

        let json = serde_json::to_value(TileDocument::new(&record)).unwrap();

        assert_eq!(json["data"]["type"], "tile");
        assert_eq!(json["data"]["attributes"]["tile_id"], "10_500_300");
        assert_eq!(json["data"]["attributes"]["locality"], "Metropolis");
        assert!(json["data"]["attributes"]["country"].is_null());
        assert_eq!(json["data"]["attributes"]["raw"]["raw"]["status"], "OK");
    }
}
