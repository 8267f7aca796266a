use serde::{Deserialize, Serialize};

/// One raw location sample from the platform location source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeoFix {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, larger is worse.
    pub accuracy: f64,
}

/// One compass report. `heading_deg` is None while the compass is
/// uncalibrated or unavailable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeadingSample {
    pub timestamp: f64,
    pub heading_deg: Option<f64>,
}

/// One BLE detection, already resolved to a waypoint id by the scan layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BeaconAdvert {
    pub waypoint_id: String,
    pub rssi_dbm: i32,
    pub timestamp: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

/// One checkpoint along a route. `ordinal` is 1-based and defines
/// traversal order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub label: String,
    pub ordinal: u32,
}

/// Ordered waypoint list plus the destination coordinates. Waypoints
/// must arrive sorted by ordinal; `start()` rejects anything else.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Route {
    pub waypoints: Vec<Waypoint>,
    pub destination: LatLon,
}

/// Smoothed position estimate produced by the position filter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilteredPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: f64,
}
