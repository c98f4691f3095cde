//! Geographic tiling scheme.
//!
//! Tiles are addressed as `"{zoom}_{row}_{column}"`. At zoom `z` the globe
//! is split into `2^z` rows of equal latitude span and `2^z` columns of
//! equal longitude span; row 0 starts at the south pole and column 0 at
//! the antimeridian (-180°).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deepest zoom level a tile id may use.
pub const MAX_ZOOM: u32 = 23;

/// Center point of a tile in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileCoordinate {
    /// Latitude of the tile center.
    pub center_latitude: f64,
    /// Longitude of the tile center.
    pub center_longitude: f64,
}

/// Errors from parsing a tile identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileIdError {
    /// Not three `_`-separated parts.
    #[error("Malformed tile id '{tile_id}': expected zoom_row_column")]
    Malformed {
        /// The rejected identifier.
        tile_id: String,
    },

    /// A part is not a non-negative integer.
    #[error("Malformed tile id '{tile_id}': '{part}' is not a non-negative integer")]
    InvalidNumber {
        /// The rejected identifier.
        tile_id: String,
        /// The offending part.
        part: String,
    },

    /// Zoom deeper than [`MAX_ZOOM`].
    #[error("Tile id '{tile_id}' has zoom {zoom}, maximum is {MAX_ZOOM}")]
    ZoomTooLarge {
        /// The rejected identifier.
        tile_id: String,
        /// The requested zoom.
        zoom: u32,
    },

    /// Row or column outside the grid for the tile's zoom.
    #[error("Tile id '{tile_id}' is outside the {size}x{size} grid of its zoom level")]
    OutOfRange {
        /// The rejected identifier.
        tile_id: String,
        /// Number of rows (and columns) at that zoom.
        size: u32,
    },
}

/// Maps tile identifiers to the coordinate that should be geocoded.
pub trait TileScheme: Send + Sync {
    /// Returns the center coordinate of `tile_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TileIdError`] if `tile_id` is not valid in this scheme.
    fn center(&self, tile_id: &str) -> Result<TileCoordinate, TileIdError>;
}

/// The `zoom_row_column` equirectangular scheme described in the module
/// docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTileScheme;

impl TileScheme for GeoTileScheme {
    fn center(&self, tile_id: &str) -> Result<TileCoordinate, TileIdError> {
        GeoTile::parse(tile_id).map(|tile| tile.center())
    }
}

/// A parsed tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeoTile {
    /// Zoom level, `0..=MAX_ZOOM`.
    pub zoom: u32,
    /// Row index counted from the south.
    pub row: u32,
    /// Column index counted from the west.
    pub column: u32,
}

impl GeoTile {
    /// Parses a `"{zoom}_{row}_{column}"` identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TileIdError`] if the identifier is malformed or addresses a
    /// cell outside the grid.
    pub fn parse(tile_id: &str) -> Result<Self, TileIdError> {
        let parts: Vec<&str> = tile_id.trim().split('_').collect();
        let [zoom, row, column] = parts.as_slice() else {
            return Err(TileIdError::Malformed {
                tile_id: tile_id.to_string(),
            });
        };

        let number = |part: &str| {
            part.parse::<u32>().map_err(|_| TileIdError::InvalidNumber {
                tile_id: tile_id.to_string(),
                part: part.to_string(),
            })
        };
        let (zoom, row, column) = (number(*zoom)?, number(*row)?, number(*column)?);

        if zoom > MAX_ZOOM {
            return Err(TileIdError::ZoomTooLarge {
                tile_id: tile_id.to_string(),
                zoom,
            });
        }

        let size = 1u32 << zoom;
        if row >= size || column >= size {
            return Err(TileIdError::OutOfRange {
                tile_id: tile_id.to_string(),
                size,
            });
        }

        Ok(Self { zoom, row, column })
    }

    /// Latitude span of one tile at this zoom, in degrees.
    #[must_use]
    pub fn latitude_span(self) -> f64 {
        180.0 / f64::from(1u32 << self.zoom)
    }

    /// Longitude span of one tile at this zoom, in degrees.
    #[must_use]
    pub fn longitude_span(self) -> f64 {
        360.0 / f64::from(1u32 << self.zoom)
    }

    /// Center point of this tile.
    #[must_use]
    pub fn center(self) -> TileCoordinate {
        let lat_span = self.latitude_span();
        let lng_span = self.longitude_span();
        let south = f64::from(self.row).mul_add(lat_span, -90.0);
        let west = f64::from(self.column).mul_add(lng_span, -180.0);

        TileCoordinate {
            center_latitude: lat_span.mul_add(0.5, south),
            center_longitude: lng_span.mul_add(0.5, west),
        }
    }
}

impl fmt::Display for GeoTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.zoom, self.row, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_center(tile_id: &str, lat: f64, lng: f64) {
        let center = GeoTileScheme.center(tile_id).unwrap();
        assert!(
            (center.center_latitude - lat).abs() < 1e-9,
            "{tile_id}: latitude {} != {lat}",
            center.center_latitude
        );
        assert!(
            (center.center_longitude - lng).abs() < 1e-9,
            "{tile_id}: longitude {} != {lng}",
            center.center_longitude
        );
    }

    #[test]
    fn zoom_zero_is_the_whole_globe() {
        assert_center("0_0_0", 0.0, 0.0);
    }

    #[test]
    fn computes_centers_at_higher_zooms() {
        assert_center("1_1_1", 45.0, 90.0);
        assert_center("2_0_3", -67.5, 135.0);
        assert_center("10_512_512", 0.087_890_625, 0.175_781_25);
    }

    #[test]
    fn display_round_trips_the_id() {
        let tile = GeoTile::parse("16_40000_10321").unwrap();
        assert_eq!(tile.to_string(), "16_40000_10321");
    }

    #[test]
    fn rejects_ids_without_three_parts() {
        assert!(matches!(
            GeoTile::parse("12345"),
            Err(TileIdError::Malformed { .. })
        ));
        assert!(matches!(
            GeoTile::parse("1_2_3_4"),
            Err(TileIdError::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_parts() {
        let err = GeoTile::parse("10_abc_3").unwrap_err();
        assert_eq!(
            err,
            TileIdError::InvalidNumber {
                tile_id: "10_abc_3".to_string(),
                part: "abc".to_string(),
            }
        );
        assert!(GeoTile::parse("10_-1_3").is_err());
    }

    #[test]
    fn rejects_out_of_grid_cells() {
        assert!(matches!(
            GeoTile::parse("24_0_0"),
            Err(TileIdError::ZoomTooLarge { zoom: 24, .. })
        ));
        assert!(matches!(
            GeoTile::parse("1_2_0"),
            Err(TileIdError::OutOfRange { size: 2, .. })
        ));
    }
}
