// heading.rs - directional guidance, stateless per call.
//
// "Heading unavailable" is None all the way through and is a different
// answer than a valid 0.0 (destination dead ahead). Callers must not
// collapse the two.

use crate::geomath;
use crate::types::{FilteredPosition, LatLon};

/// Initial great-circle bearing from the current position to the
/// destination, degrees in [0, 360).
pub fn bearing_to_destination(position: &FilteredPosition, destination: LatLon) -> f64 {
    geomath::initial_bearing_deg(
        position.latitude,
        position.longitude,
        destination.latitude,
        destination.longitude,
    )
}

/// Bearing expressed relative to the device heading: 0 is dead ahead,
/// 90 is to the right.
pub fn relative_bearing(bearing_deg: f64, heading_deg: f64) -> f64 {
    geomath::wrap_360(bearing_deg - heading_deg)
}

/// Relative bearing to the destination, or None while position or
/// compass heading is unknown.
pub fn guidance(
    position: Option<&FilteredPosition>,
    heading_deg: Option<f64>,
    destination: LatLon,
) -> Option<f64> {
    let position = position?;
    let heading = heading_deg?;
    Some(relative_bearing(bearing_to_destination(position, destination), heading))
}
