use thiserror::Error;

/// Errors surfaced by session start and the service control surface.
/// Everything after start is silent gating, not errors.
#[derive(Error, Debug, Clone)]
pub enum NavError {
    #[error("Route has no waypoints")]
    EmptyRoute,

    #[error("Waypoint {id}: ordinal {ordinal} must be 1 or greater")]
    BadOrdinal { id: String, ordinal: u32 },

    #[error("Waypoint {id}: ordinal {ordinal} is not strictly increasing")]
    OrdinalOutOfOrder { id: String, ordinal: u32 },

    #[error("Duplicate waypoint id: {0}")]
    DuplicateWaypoint(String),

    #[error("Destination coordinates invalid: lat={latitude}, lon={longitude}")]
    InvalidDestination { latitude: f64, longitude: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Session channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, NavError>;
