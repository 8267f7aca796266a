// waypoint.rs - per-waypoint reached state machine and route aggregate.
//
// Reached is a one-way latch: re-evaluation of a reached waypoint is a
// no-op, weak signal never un-reaches it, and only a full reset clears
// it. The transition itself is gated by a dynamic threshold, a stable
// sample streak, a cooldown, and a vehicular speed bound.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::NavConfig;
use crate::error::{NavError, Result};
use crate::movement::MovementState;
use crate::signal::{SignalReadout, SignalSmoother};
use crate::types::{Route, Waypoint};

/// Per-waypoint view for the UI layer, ordered by ordinal. `progress`
/// is 1.0 once reached, a signal-derived fraction for the next
/// unreached waypoint, and 0.0 for everything farther down the route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaypointStatus {
    pub id: String,
    pub label: String,
    pub ordinal: u32,
    pub reached: bool,
    pub smoothed_rssi_dbm: f64,
    pub quality: f64,
    pub detections: u32,
    pub progress: f64,
}

/// Structural checks applied once at session start. Ordinals must be
/// 1-based and strictly increasing, ids unique, destination coordinates
/// finite and in range.
pub fn validate_route(route: &Route) -> Result<()> {
    if route.waypoints.is_empty() {
        return Err(NavError::EmptyRoute);
    }
    let mut seen = HashSet::new();
    let mut prev_ordinal = 0u32;
    for waypoint in &route.waypoints {
        if waypoint.ordinal == 0 {
            return Err(NavError::BadOrdinal {
                id: waypoint.id.clone(),
                ordinal: waypoint.ordinal,
            });
        }
        if waypoint.ordinal <= prev_ordinal {
            return Err(NavError::OrdinalOutOfOrder {
                id: waypoint.id.clone(),
                ordinal: waypoint.ordinal,
            });
        }
        prev_ordinal = waypoint.ordinal;
        if !seen.insert(waypoint.id.as_str()) {
            return Err(NavError::DuplicateWaypoint(waypoint.id.clone()));
        }
    }
    let destination = route.destination;
    if !destination.latitude.is_finite()
        || !destination.longitude.is_finite()
        || destination.latitude.abs() > 90.0
        || destination.longitude.abs() > 180.0
    {
        return Err(NavError::InvalidDestination {
            latitude: destination.latitude,
            longitude: destination.longitude,
        });
    }
    Ok(())
}

#[derive(Debug)]
struct WaypointTracker {
    waypoint: Waypoint,
    reached: bool,
    stable_count: u32,
    last_reached_at: f64,
}

impl WaypointTracker {
    fn new(waypoint: Waypoint) -> Self {
        Self {
            waypoint,
            reached: false,
            stable_count: 0,
            last_reached_at: f64::NEG_INFINITY,
        }
    }

    /// Clears the qualifying streak but keeps the reached latch and the
    /// cooldown clock.
    fn rearm(&mut self) {
        self.stable_count = 0;
    }
}

#[derive(Debug)]
pub struct WaypointProgress {
    trackers: Vec<WaypointTracker>,
    completion_announced: bool,
}

impl WaypointProgress {
    /// Expects a route that already passed `validate_route`.
    pub fn new(route: &Route) -> Self {
        Self {
            trackers: route
                .waypoints
                .iter()
                .cloned()
                .map(WaypointTracker::new)
                .collect(),
            completion_announced: false,
        }
    }

    /// Runs one smoother update through the state machine. Returns the
    /// waypoint on the NotReached to Reached transition, None otherwise.
    pub fn evaluate(
        &mut self,
        waypoint_id: &str,
        readout: &SignalReadout,
        movement: MovementState,
        speed_mps: f64,
        now: f64,
        config: &NavConfig,
    ) -> Option<Waypoint> {
        let tracker = self.trackers.iter_mut().find(|t| t.waypoint.id == waypoint_id)?;
        if tracker.reached {
            // One-way latch: nothing to decide anymore.
            return None;
        }
        let threshold = dynamic_threshold(movement, readout.quality, config);
        let required = required_stable_samples(movement, readout.quality, config);
        if readout.smoothed_dbm >= threshold {
            tracker.stable_count += 1;
        } else {
            tracker.stable_count = 0;
            return None;
        }
        if tracker.stable_count < required {
            return None;
        }
        if now - tracker.last_reached_at < config.reached_cooldown_secs {
            // Debounce against duplicate notifications, not a reversal.
            return None;
        }
        if speed_mps > config.max_arrival_speed_mps {
            // Vehicular speed never counts as arriving on foot. The
            // streak survives so stopping right after triggers promptly.
            return None;
        }
        tracker.reached = true;
        tracker.last_reached_at = now;
        Some(tracker.waypoint.clone())
    }

    pub fn completed_count(&self) -> usize {
        self.trackers.iter().filter(|t| t.reached).count()
    }

    pub fn waypoint_count(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_complete(&self) -> bool {
        self.trackers.iter().all(|t| t.reached)
    }

    /// Some(waypoint count) exactly once, on the evaluation pass that
    /// completed the route.
    pub fn take_completion_event(&mut self) -> Option<usize> {
        if self.completion_announced || !self.is_complete() {
            return None;
        }
        self.completion_announced = true;
        Some(self.trackers.len())
    }

    pub fn next_unreached(&self) -> Option<&Waypoint> {
        self.trackers.iter().find(|t| !t.reached).map(|t| &t.waypoint)
    }

    /// Companion to a BLE scan restart: qualifying streaks start over,
    /// reached latches stay.
    pub fn rearm_signal_state(&mut self) {
        for tracker in &mut self.trackers {
            tracker.rearm();
        }
    }

    pub fn reset(&mut self) {
        for tracker in &mut self.trackers {
            tracker.reached = false;
            tracker.stable_count = 0;
            tracker.last_reached_at = f64::NEG_INFINITY;
        }
        self.completion_announced = false;
    }

    pub fn statuses(
        &self,
        smoother: &SignalSmoother,
        movement: MovementState,
        config: &NavConfig,
    ) -> Vec<WaypointStatus> {
        let next_unreached = self.trackers.iter().position(|t| !t.reached);
        self.trackers
            .iter()
            .enumerate()
            .map(|(i, tracker)| {
                let readout = smoother.readout(&tracker.waypoint.id);
                let smoothed = readout.map_or(config.no_signal_floor_dbm, |r| r.smoothed_dbm);
                let quality = readout.map_or(0.0, |r| r.quality);
                let detections = readout.map_or(0, |r| r.detections);
                let progress = if tracker.reached {
                    1.0
                } else if Some(i) == next_unreached {
                    progress_fraction(smoothed, movement, config)
                } else {
                    0.0
                };
                WaypointStatus {
                    id: tracker.waypoint.id.clone(),
                    label: tracker.waypoint.label.clone(),
                    ordinal: tracker.waypoint.ordinal,
                    reached: tracker.reached,
                    smoothed_rssi_dbm: smoothed,
                    quality,
                    detections,
                    progress,
                }
            })
            .collect()
    }
}

/// Base threshold for the movement state, loosened as quality drops so
/// a noisy but genuinely close beacon still qualifies.
fn dynamic_threshold(movement: MovementState, quality: f64, config: &NavConfig) -> f64 {
    let base = config.profile(movement).rssi_threshold_dbm;
    if quality >= config.quality_high {
        base
    } else if quality >= config.quality_low {
        base - config.quality_mid_relax_db
    } else {
        base - config.quality_low_relax_db
    }
}

/// Consecutive qualifying updates needed before the latch flips. Only
/// Stationary adjusts with quality; faster states already run short
/// requirements so a beacon passed at speed still registers.
fn required_stable_samples(movement: MovementState, quality: f64, config: &NavConfig) -> u32 {
    let base = config.profile(movement).required_stable_samples;
    if movement != MovementState::Stationary {
        return base;
    }
    if quality >= config.quality_high {
        base.saturating_sub(1).max(2)
    } else if quality < config.quality_low {
        base + 1
    } else {
        base
    }
}

/// Smoothed RSSI normalized between the profile's progress floor and
/// its base threshold, clamped to [0, 1]. The base threshold keeps the
/// fraction steady across quality band changes.
fn progress_fraction(smoothed_dbm: f64, movement: MovementState, config: &NavConfig) -> f64 {
    let profile = config.profile(movement);
    let span = profile.rssi_threshold_dbm - profile.progress_floor_dbm;
    ((smoothed_dbm - profile.progress_floor_dbm) / span).clamp(0.0, 1.0)
}
