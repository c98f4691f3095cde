//! Address extraction from raw geocoding responses.
//!
//! Only the first (best) result is inspected. Each of its address
//! components is matched against the [`AddressCategory`] tags; when several
//! components carry the same tag, the last one in provider order wins.

use tile_locator_geocoder_models::{AddressCategory, GeocodeResponse, LocationRecord};

/// Builds a [`LocationRecord`] from a provider response.
///
/// Never fails: a response with no results, or with no recognized
/// component tags, yields a record with every name absent.
#[must_use]
pub fn extract_location(response: GeocodeResponse) -> LocationRecord {
    let matches: Vec<(AddressCategory, String)> = response
        .results
        .first()
        .into_iter()
        .flat_map(|result| &result.address_components)
        .flat_map(|component| {
            component
                .types
                .iter()
                .filter_map(|tag| tag.parse::<AddressCategory>().ok())
                .map(move |category| (category, component.long_name.clone()))
        })
        .collect();

    let mut record = LocationRecord::empty(response);
    for (category, name) in matches {
        record.set(category, name);
    }
    record
}
