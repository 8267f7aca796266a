// Great-circle helpers shared by the position filter, destination
// evaluator, and heading module. Angles are degrees, distances meters.

use geo::{point, HaversineBearing, HaversineDistance};

/// Haversine distance in meters between two lat/lon pairs.
pub fn haversine_m(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let a = point!(x: lon_a, y: lat_a);
    let b = point!(x: lon_b, y: lat_b);
    a.haversine_distance(&b)
}

/// Initial great-circle bearing from A to B, normalized to [0, 360).
pub fn initial_bearing_deg(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let a = point!(x: lon_a, y: lat_a);
    let b = point!(x: lon_b, y: lat_b);
    wrap_360(a.haversine_bearing(b))
}

/// Normalize an angle to [0, 360).
pub fn wrap_360(deg: f64) -> f64 {
    let wrapped = deg % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Normalize an angle to (-180, 180].
pub fn wrap_180(deg: f64) -> f64 {
    let wrapped = wrap_360(deg);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
