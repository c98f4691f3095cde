#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Map tile types.
//!
//! A tile is an addressable cell of the tiling scheme in [`scheme`]. Once
//! its center has been reverse geocoded it is persisted downstream as a
//! [`TileRecord`], keyed uniquely by tile id.

pub mod scheme;

use serde::{Deserialize, Serialize};
use tile_locator_geocoder_models::LocationRecord;

pub use scheme::{GeoTile, GeoTileScheme, TileCoordinate, TileIdError, TileScheme};

/// A resolved tile as stored by the tile service.
///
/// The four administrative names are copied out of [`LocationRecord`] so
/// the store can index them; `raw` keeps the full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Tile identifier, unique in the store.
    pub tile_id: String,
    /// City or town.
    pub locality: Option<String>,
    /// County/district.
    pub administrative_area_level_2: Option<String>,
    /// State/province.
    pub administrative_area_level_1: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// The location record the names came from.
    pub raw: LocationRecord,
}

impl TileRecord {
    /// Builds the record persisted for `tile_id`.
    #[must_use]
    pub fn new(tile_id: impl Into<String>, location: LocationRecord) -> Self {
        Self {
            tile_id: tile_id.into(),
            locality: location.locality.clone(),
            administrative_area_level_2: location.administrative_area_level_2.clone(),
            administrative_area_level_1: location.administrative_area_level_1.clone(),
            country: location.country.clone(),
            raw: location,
        }
    }
}

#[cfg(test)]
mod tests {
    use tile_locator_geocoder_models::{GeocodeResponse, GeocodeStatus};

    use super::*;

    #[test]
    fn copies_names_out_of_the_location() {
        let mut location = LocationRecord::empty(GeocodeResponse::empty(GeocodeStatus::Ok));
        location.locality = Some("Metropolis".to_string());
        location.country = Some("USA".to_string());

        let record = TileRecord::new("10_500_300", location.clone());

        assert_eq!(record.tile_id, "10_500_300");
        assert_eq!(record.locality.as_deref(), Some("Metropolis"));
        assert_eq!(record.country.as_deref(), Some("USA"));
        assert_eq!(record.administrative_area_level_1, None);
        assert_eq!(record.raw, location);
    }
}
