//! Signal-fusion wayfinding core: turns noisy GPS fixes, compass
//! readings, and BLE beacon RSSI into stable "waypoint reached" and
//! "destination reached" decisions.
//!
//! The decision pipeline lives in [`session::NavigationSession`], a
//! pure synchronous aggregate that can be driven by live sensors, unit
//! tests, or the `replay` binary. [`service::NavService`] wraps it in a
//! tokio task that serializes the independent sensor streams and runs
//! the beacon timeout sweep.

pub mod config;
pub mod destination;
pub mod error;
pub mod geomath;
pub mod heading;
pub mod movement;
pub mod position_filter;
pub mod service;
pub mod session;
pub mod signal;
pub mod types;
pub mod waypoint;

pub use config::{MovementProfile, NavConfig};
pub use destination::DestinationEvaluator;
pub use error::{NavError, Result};
pub use movement::{MovementClassifier, MovementState};
pub use position_filter::{FixOutcome, FixRejectReason, PositionFilter};
pub use service::{NavCommand, NavService};
pub use session::{NavEvent, NavSnapshot, NavigationSession, SessionStats};
pub use signal::{SignalReadout, SignalSmoother};
pub use types::{BeaconAdvert, FilteredPosition, GeoFix, HeadingSample, LatLon, Route, Waypoint};
pub use waypoint::{WaypointProgress, WaypointStatus};
