// session.rs - Pure computation layer for the wayfinding core
//
// Everything in this module is independent of:
//   - tokio / async runtime
//   - platform location, compass, and BLE scan services
//   - File I/O and log replay
//
// It takes sensor samples in, produces navigation state and events out.
// This means you can unit-test it with recorded data, replay logged
// sessions, and swap the live frontend for simulated feeds without
// touching the decision logic. A NavigationSession owns every piece of
// mutable state for one route traversal; nothing here is shared.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::NavConfig;
use crate::destination::DestinationEvaluator;
use crate::error::Result;
use crate::heading;
use crate::movement::{MovementClassifier, MovementState};
use crate::position_filter::{FixOutcome, FixRejectReason, PositionFilter};
use crate::signal::SignalSmoother;
use crate::types::{BeaconAdvert, FilteredPosition, GeoFix, HeadingSample, Route};
use crate::waypoint::{self, WaypointProgress, WaypointStatus};

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NavEvent {
    PositionInitialized { latitude: f64, longitude: f64 },
    FixRejected { reason: FixRejectReason },
    MovementChanged { from: MovementState, to: MovementState },
    WaypointReached { id: String, label: String, ordinal: u32, rssi_dbm: f64, timestamp: f64 },
    RouteCompleted { waypoint_count: usize },
    DestinationReached { distance_m: f64, timestamp: f64 },
    BeaconExpired { id: String },
    SignalScanRestarted,
}

// ─── Counters ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub fix_count: u64,
    pub fixes_rejected: u64,
    pub heading_count: u64,
    pub beacon_count: u64,
    pub peak_speed_mps: f64,
}

// ─── Session output snapshot ─────────────────────────────────────────────────

/// Everything the UI layer observes, in one value. Rebuilt on demand,
/// never mutated in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavSnapshot {
    pub session_id: String,
    pub started_at: String,
    pub position: Option<FilteredPosition>,
    pub speed_mps: f64,
    pub course_deg: Option<f64>,
    pub movement: MovementState,
    pub heading_deg: Option<f64>,
    pub relative_bearing_deg: Option<f64>,
    pub distance_to_destination_m: Option<f64>,
    pub destination_reached: bool,
    pub waypoints: Vec<WaypointStatus>,
    pub completed_count: usize,
    pub route_complete: bool,
    pub stats: SessionStats,
}

// ─── The session aggregate ───────────────────────────────────────────────────

pub struct NavigationSession {
    config: NavConfig,
    route: Route,
    session_id: String,
    started_at: String,
    position_filter: PositionFilter,
    classifier: MovementClassifier,
    smoother: SignalSmoother,
    progress: WaypointProgress,
    destination: DestinationEvaluator,
    heading_deg: Option<f64>,
    stats: SessionStats,
}

impl NavigationSession {
    /// Validates config and route, then builds a fresh session.
    pub fn start(route: Route, config: NavConfig) -> Result<Self> {
        config.validate()?;
        waypoint::validate_route(&route)?;
        let session_id = format!("session_{}", Utc::now().timestamp_millis());
        let started_at = Utc::now().to_rfc3339();
        log::info!(
            "{} started: {} waypoints, destination ({:.5}, {:.5})",
            session_id,
            route.waypoints.len(),
            route.destination.latitude,
            route.destination.longitude
        );
        let smoother = SignalSmoother::new(&route, &config);
        let progress = WaypointProgress::new(&route);
        let destination = DestinationEvaluator::new(route.destination);
        Ok(Self {
            session_id,
            started_at,
            position_filter: PositionFilter::new(),
            classifier: MovementClassifier::new(),
            smoother,
            progress,
            destination,
            heading_deg: None,
            stats: SessionStats::default(),
            route,
            config,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn feed_fix(&mut self, fix: &GeoFix) -> Vec<NavEvent> {
        let mut events = Vec::new();
        self.stats.fix_count += 1;

        match self.position_filter.apply(fix, &self.config) {
            FixOutcome::Rejected(reason) => {
                self.stats.fixes_rejected += 1;
                events.push(NavEvent::FixRejected { reason });
                return events;
            }
            FixOutcome::Initialized => {
                events.push(NavEvent::PositionInitialized {
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                });
            }
            FixOutcome::Accepted => {}
        }

        let speed = self.position_filter.speed_mps();
        if speed > self.stats.peak_speed_mps {
            self.stats.peak_speed_mps = speed;
        }
        if let Some((from, to)) = self.classifier.update(speed, &self.config) {
            log::info!("movement {from:?} -> {to:?} at {speed:.2} m/s");
            events.push(NavEvent::MovementChanged { from, to });
        }

        if let Some(position) = self.position_filter.position() {
            if self.destination.update(&position, self.classifier.state(), &self.config) {
                events.push(NavEvent::DestinationReached {
                    distance_m: self.destination.distance_m().unwrap_or(0.0),
                    timestamp: fix.timestamp,
                });
            }
        }
        events
    }

    pub fn feed_heading(&mut self, sample: &HeadingSample) -> Vec<NavEvent> {
        self.stats.heading_count += 1;
        self.heading_deg = sample.heading_deg;
        Vec::new()
    }

    /// Scan results arrive in batches; each advert runs the smoother
    /// and the waypoint state machine in turn.
    pub fn feed_beacons(&mut self, adverts: &[BeaconAdvert]) -> Vec<NavEvent> {
        let mut events = Vec::new();
        let movement = self.classifier.state();
        let speed = self.position_filter.speed_mps();
        for advert in adverts {
            self.stats.beacon_count += 1;
            if let Some(readout) = self.smoother.ingest(advert, movement, &self.config) {
                if let Some(reached) = self.progress.evaluate(
                    &advert.waypoint_id,
                    &readout,
                    movement,
                    speed,
                    advert.timestamp,
                    &self.config,
                ) {
                    log::info!(
                        "waypoint {} ({}) reached at {:.1} dBm",
                        reached.id,
                        reached.label,
                        readout.smoothed_dbm
                    );
                    events.push(NavEvent::WaypointReached {
                        id: reached.id,
                        label: reached.label,
                        ordinal: reached.ordinal,
                        rssi_dbm: readout.smoothed_dbm,
                        timestamp: advert.timestamp,
                    });
                }
            }
        }
        if let Some(waypoint_count) = self.progress.take_completion_event() {
            log::info!("route complete: all {waypoint_count} waypoints reached");
            events.push(NavEvent::RouteCompleted { waypoint_count });
        }
        events
    }

    /// Periodic beacon-timeout sweep, driven by the caller's clock.
    pub fn sweep_timeouts(&mut self, now: f64) -> Vec<NavEvent> {
        self.smoother
            .sweep(now, &self.config)
            .into_iter()
            .map(|id| {
                log::warn!("beacon {id} silent past timeout, dropped to idle");
                NavEvent::BeaconExpired { id }
            })
            .collect()
    }

    /// Re-arms BLE-related state after a platform scan restart. GPS
    /// state and reached latches survive.
    pub fn restart_signal_scanning(&mut self) -> Vec<NavEvent> {
        self.smoother.restart(&self.config);
        self.progress.rearm_signal_state();
        log::info!("signal scanning restarted, beacon state re-armed");
        vec![NavEvent::SignalScanRestarted]
    }

    /// Full state reset. Clears every latch and counter; the session id
    /// and route stay.
    pub fn reset(&mut self) {
        self.position_filter.reset();
        self.classifier.reset();
        self.smoother.restart(&self.config);
        self.progress.reset();
        self.destination.reset();
        self.heading_deg = None;
        self.stats = SessionStats::default();
        log::info!("{} state reset", self.session_id);
    }

    pub fn snapshot(&self) -> NavSnapshot {
        let position = self.position_filter.position();
        let movement = self.classifier.state();
        NavSnapshot {
            session_id: self.session_id.clone(),
            started_at: self.started_at.clone(),
            position,
            speed_mps: self.position_filter.speed_mps(),
            course_deg: self.position_filter.course_deg(),
            movement,
            heading_deg: self.heading_deg,
            relative_bearing_deg: heading::guidance(
                position.as_ref(),
                self.heading_deg,
                self.route.destination,
            ),
            distance_to_destination_m: self.destination.distance_m(),
            destination_reached: self.destination.is_reached(),
            waypoints: self.progress.statuses(&self.smoother, movement, &self.config),
            completed_count: self.progress.completed_count(),
            route_complete: self.progress.is_complete(),
            stats: self.stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LatLon, Waypoint};

    fn east(meters: f64) -> f64 {
        meters / 111_195.0
    }

    fn route(ids: &[&str], destination: LatLon) -> Route {
        Route {
            waypoints: ids
                .iter()
                .enumerate()
                .map(|(i, id)| Waypoint {
                    id: (*id).to_string(),
                    label: format!("Waypoint {}", i + 1),
                    ordinal: (i + 1) as u32,
                })
                .collect(),
            destination,
        }
    }

    fn origin() -> LatLon {
        LatLon { latitude: 0.0, longitude: 0.0 }
    }

    fn fix(timestamp: f64, meters_east: f64) -> GeoFix {
        GeoFix { timestamp, latitude: 0.0, longitude: east(meters_east), accuracy: 5.0 }
    }

    fn advert(id: &str, rssi_dbm: i32, timestamp: f64) -> BeaconAdvert {
        BeaconAdvert { waypoint_id: id.to_string(), rssi_dbm, timestamp }
    }

    fn reach_w1(session: &mut NavigationSession) {
        for t in 0..3 {
            session.feed_beacons(&[advert("w1", -55, t as f64)]);
        }
        assert_eq!(session.snapshot().completed_count, 1);
    }

    #[test]
    fn test_start_rejects_bad_inputs() {
        let empty = route(&[], origin());
        assert!(NavigationSession::start(empty, NavConfig::default()).is_err());

        let bad_config = NavConfig { position_window: 0, ..NavConfig::default() };
        assert!(NavigationSession::start(route(&["w1"], origin()), bad_config).is_err());
    }

    #[test]
    fn test_reached_is_monotonic_through_weak_signal_and_expiry() {
        let mut session =
            NavigationSession::start(route(&["w1", "w2"], origin()), NavConfig::default()).unwrap();
        reach_w1(&mut session);

        // Weak samples after the latch change nothing.
        for t in 5..10 {
            let events = session.feed_beacons(&[advert("w1", -95, t as f64)]);
            assert!(events.is_empty());
        }
        assert_eq!(session.snapshot().completed_count, 1);

        // Expiry resets the signal state but not the latch.
        let events = session.sweep_timeouts(100.0);
        assert_eq!(events, vec![NavEvent::BeaconExpired { id: "w1".to_string() }]);
        let snapshot = session.snapshot();
        assert!(snapshot.waypoints[0].reached);
        assert_eq!(snapshot.waypoints[0].smoothed_rssi_dbm, -100.0);
        assert_eq!(snapshot.completed_count, 1);
        // Nothing left to expire.
        assert!(session.sweep_timeouts(101.0).is_empty());
    }

    #[test]
    fn test_end_to_end_waypoint_then_destination() {
        let mut session =
            NavigationSession::start(route(&["w1", "w2", "w3"], origin()), NavConfig::default())
                .unwrap();

        // Strong steady beacon for w1: quality crosses into the mid band
        // on the third advert and the streak is already long enough.
        let mut reach_events = Vec::new();
        for t in 0..5 {
            let events = session.feed_beacons(&[advert("w1", -55, t as f64)]);
            reach_events.extend(events.into_iter().map(|e| (t, e)));
        }
        assert_eq!(reach_events.len(), 1);
        let (t, event) = &reach_events[0];
        assert_eq!(*t, 2);
        assert!(matches!(event, NavEvent::WaypointReached { id, .. } if id == "w1"));

        // Converge on the destination: three stationary fixes within 2m.
        let events = session.feed_fix(&fix(10.0, 2.0));
        assert!(matches!(events[0], NavEvent::PositionInitialized { .. }));
        assert!(session.feed_fix(&fix(11.0, 1.8)).is_empty());
        let events = session.feed_fix(&fix(12.0, 1.6));
        assert!(matches!(events[0], NavEvent::DestinationReached { .. }));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.completed_count, 1);
        assert!(snapshot.destination_reached);
        assert!(!snapshot.route_complete);
        assert_eq!(snapshot.movement, MovementState::Stationary);
    }

    #[test]
    fn test_route_completion_event_after_last_waypoint() {
        let mut session =
            NavigationSession::start(route(&["w1"], origin()), NavConfig::default()).unwrap();
        let mut completions = 0;
        for t in 0..5 {
            let events = session.feed_beacons(&[advert("w1", -55, t as f64)]);
            completions += events
                .iter()
                .filter(|e| matches!(e, NavEvent::RouteCompleted { waypoint_count: 1 }))
                .count();
        }
        assert_eq!(completions, 1);
        assert!(session.snapshot().route_complete);
    }

    #[test]
    fn test_fix_rejection_is_counted_and_reported() {
        let mut session =
            NavigationSession::start(route(&["w1"], origin()), NavConfig::default()).unwrap();
        session.feed_fix(&fix(0.0, 0.0));

        let coarse = GeoFix { timestamp: 1.0, latitude: 0.0, longitude: 0.0, accuracy: 80.0 };
        let events = session.feed_fix(&coarse);
        assert!(matches!(
            events[0],
            NavEvent::FixRejected { reason: FixRejectReason::LowAccuracy { .. } }
        ));
        let stats = session.snapshot().stats;
        assert_eq!(stats.fix_count, 2);
        assert_eq!(stats.fixes_rejected, 1);
    }

    #[test]
    fn test_restart_rearms_signal_but_keeps_gps_and_latches() {
        let destination = LatLon { latitude: 1.0, longitude: 0.0 };
        let mut session =
            NavigationSession::start(route(&["w1", "w2"], destination), NavConfig::default())
                .unwrap();
        reach_w1(&mut session);
        session.feed_fix(&fix(0.0, 0.0));
        session.feed_fix(&fix(1.0, 0.5));

        let events = session.restart_signal_scanning();
        assert_eq!(events, vec![NavEvent::SignalScanRestarted]);

        let snapshot = session.snapshot();
        assert!(snapshot.position.is_some());
        assert!(snapshot.waypoints[0].reached);
        // Signal state is back to idle; the next advert re-seeds.
        assert_eq!(snapshot.waypoints[0].smoothed_rssi_dbm, -100.0);
        assert_eq!(snapshot.waypoints[0].detections, 0);
    }

    #[test]
    fn test_reset_clears_latches_and_counters() {
        let mut session =
            NavigationSession::start(route(&["w1"], origin()), NavConfig::default()).unwrap();
        reach_w1(&mut session);
        for t in 0..3 {
            session.feed_fix(&fix(10.0 + t as f64, 2.0));
        }
        assert!(session.snapshot().destination_reached);

        let id_before = session.session_id().to_string();
        session.reset();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.session_id, id_before);
        assert!(snapshot.position.is_none());
        assert_eq!(snapshot.completed_count, 0);
        assert!(!snapshot.destination_reached);
        assert_eq!(snapshot.stats, SessionStats::default());
    }

    #[test]
    fn test_relative_bearing_requires_position_and_heading() {
        let destination = LatLon { latitude: 1.0, longitude: 0.0 };
        let mut session =
            NavigationSession::start(route(&["w1"], destination), NavConfig::default()).unwrap();

        session.feed_heading(&HeadingSample { timestamp: 0.0, heading_deg: Some(90.0) });
        // Heading alone is not enough.
        assert_eq!(session.snapshot().relative_bearing_deg, None);

        session.feed_fix(&fix(1.0, 0.0));
        let relative = session.snapshot().relative_bearing_deg.unwrap();
        assert!((relative - 270.0).abs() < 1e-6);

        // Compass dropout goes back to unavailable, not to zero.
        session.feed_heading(&HeadingSample { timestamp: 2.0, heading_deg: None });
        assert_eq!(session.snapshot().relative_bearing_deg, None);
    }

    #[test]
    fn test_beacons_alone_never_reach_destination() {
        let mut session =
            NavigationSession::start(route(&["w1"], origin()), NavConfig::default()).unwrap();
        for t in 0..10 {
            session.feed_beacons(&[advert("w1", -40, t as f64)]);
        }
        let snapshot = session.snapshot();
        assert!(snapshot.route_complete);
        assert!(!snapshot.destination_reached);
        assert_eq!(snapshot.distance_to_destination_m, None);
    }
}
