// service.rs - async shell around NavigationSession.
//
// GPS, compass, and BLE arrive on independent cadences. The service
// funnels all of them, plus control commands and the timeout sweep,
// through one select! loop so every state transition happens on a
// single serialized stream and the session needs no locking. Consumers
// watch a snapshot channel for state and an event channel for
// transitions; a slow event consumer loses events rather than stalling
// the loop.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::config::NavConfig;
use crate::error::{NavError, Result};
use crate::session::{NavEvent, NavSnapshot, NavigationSession};
use crate::types::{BeaconAdvert, GeoFix, HeadingSample, Route};

#[derive(Clone, Debug, PartialEq)]
pub enum NavCommand {
    RestartScanning,
    Reset,
}

/// Handle to a running session loop. Dropping the handle without
/// calling `stop` leaves the task running until its channels close.
pub struct NavService {
    fix_tx: mpsc::Sender<GeoFix>,
    heading_tx: mpsc::Sender<HeadingSample>,
    beacon_tx: mpsc::Sender<Vec<BeaconAdvert>>,
    cmd_tx: mpsc::Sender<NavCommand>,
    snapshot_rx: watch::Receiver<NavSnapshot>,
    events: Option<mpsc::Receiver<NavEvent>>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl NavService {
    /// Validates the route and config, then spawns the session loop.
    /// Live sources are expected to stamp samples with Unix-epoch
    /// seconds; the timeout sweep compares against the same clock.
    pub fn spawn(route: Route, config: NavConfig) -> Result<Self> {
        let mut session = NavigationSession::start(route, config)?;

        let (fix_tx, mut fix_rx) = mpsc::channel::<GeoFix>(64);
        let (heading_tx, mut heading_rx) = mpsc::channel::<HeadingSample>(64);
        let (beacon_tx, mut beacon_rx) = mpsc::channel::<Vec<BeaconAdvert>>(64);
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<NavCommand>(8);
        let (event_tx, event_rx) = mpsc::channel::<NavEvent>(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut sweep = tokio::time::interval(Duration::from_secs_f64(
                session.config().sweep_interval_secs,
            ));
            loop {
                let events = tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                    Some(fix) = fix_rx.recv() => session.feed_fix(&fix),
                    Some(sample) = heading_rx.recv() => session.feed_heading(&sample),
                    Some(batch) = beacon_rx.recv() => session.feed_beacons(&batch),
                    Some(command) = cmd_rx.recv() => match command {
                        NavCommand::RestartScanning => session.restart_signal_scanning(),
                        NavCommand::Reset => {
                            session.reset();
                            Vec::new()
                        }
                    },
                    _ = sweep.tick() => session.sweep_timeouts(wall_clock_secs()),
                };
                for event in events {
                    let _ = event_tx.try_send(event);
                }
                let _ = snapshot_tx.send(session.snapshot());
            }
            log::info!("{} service loop stopped", session.session_id());
        });

        Ok(Self {
            fix_tx,
            heading_tx,
            beacon_tx,
            cmd_tx,
            snapshot_rx,
            events: Some(event_rx),
            shutdown_tx,
            task,
        })
    }

    pub async fn send_fix(&self, fix: GeoFix) -> Result<()> {
        self.fix_tx.send(fix).await.map_err(|_| NavError::ChannelClosed)
    }

    pub async fn send_heading(&self, sample: HeadingSample) -> Result<()> {
        self.heading_tx.send(sample).await.map_err(|_| NavError::ChannelClosed)
    }

    pub async fn send_beacons(&self, batch: Vec<BeaconAdvert>) -> Result<()> {
        self.beacon_tx.send(batch).await.map_err(|_| NavError::ChannelClosed)
    }

    pub async fn restart_scanning(&self) -> Result<()> {
        self.cmd_tx
            .send(NavCommand::RestartScanning)
            .await
            .map_err(|_| NavError::ChannelClosed)
    }

    pub async fn reset(&self) -> Result<()> {
        self.cmd_tx.send(NavCommand::Reset).await.map_err(|_| NavError::ChannelClosed)
    }

    /// Cloneable sender for wiring a platform callback directly.
    pub fn fix_sender(&self) -> mpsc::Sender<GeoFix> {
        self.fix_tx.clone()
    }

    pub fn heading_sender(&self) -> mpsc::Sender<HeadingSample> {
        self.heading_tx.clone()
    }

    pub fn beacon_sender(&self) -> mpsc::Sender<Vec<BeaconAdvert>> {
        self.beacon_tx.clone()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> NavSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<NavSnapshot> {
        self.snapshot_rx.clone()
    }

    /// The event stream can be taken exactly once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<NavEvent>> {
        self.events.take()
    }

    /// Signals the loop to exit and waits for it. Idempotent in effect:
    /// a loop that already exited joins immediately.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LatLon, Waypoint};

    fn route(ids: &[&str]) -> Route {
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
            destination: LatLon { latitude: 0.0, longitude: 0.0 },
        }
    }

    async fn wait_for(
        snapshots: &mut watch::Receiver<NavSnapshot>,
        predicate: impl Fn(&NavSnapshot) -> bool,
    ) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if predicate(&snapshots.borrow()) {
                    return;
                }
                if snapshots.changed().await.is_err() {
                    panic!("snapshot channel closed");
                }
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_spawn_rejects_bad_route() {
        let empty = Route { waypoints: Vec::new(), destination: LatLon { latitude: 0.0, longitude: 0.0 } };
        assert!(matches!(
            NavService::spawn(empty, NavConfig::default()),
            Err(NavError::EmptyRoute)
        ));
    }

    #[tokio::test]
    async fn test_fix_flows_into_snapshot() {
        let service = NavService::spawn(route(&["w1"]), NavConfig::default()).unwrap();
        let mut snapshots = service.subscribe_snapshots();
        assert!(service.snapshot().position.is_none());

        let now = wall_clock_secs();
        service
            .send_fix(GeoFix { timestamp: now, latitude: 51.5, longitude: -0.1, accuracy: 5.0 })
            .await
            .unwrap();
        wait_for(&mut snapshots, |s| s.position.is_some()).await;
        assert_eq!(service.snapshot().stats.fix_count, 1);
        service.stop().await;
    }

    #[tokio::test]
    async fn test_beacon_batches_emit_reached_event() {
        let mut service = NavService::spawn(route(&["w1"]), NavConfig::default()).unwrap();
        let mut events = service.take_events().unwrap();
        assert!(service.take_events().is_none());

        let base = wall_clock_secs();
        for i in 0..3 {
            let batch = vec![BeaconAdvert {
                waypoint_id: "w1".to_string(),
                rssi_dbm: -55,
                timestamp: base + i as f64,
            }];
            service.send_beacons(batch).await.unwrap();
        }

        let reached = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await {
                    Some(NavEvent::WaypointReached { id, .. }) => break Some(id),
                    Some(_) => continue,
                    None => break None,
                }
            }
        })
        .await
        .ok()
        .flatten();
        assert_eq!(reached.as_deref(), Some("w1"));
        service.stop().await;
    }

    #[tokio::test]
    async fn test_reset_command_clears_state() {
        let service = NavService::spawn(route(&["w1"]), NavConfig::default()).unwrap();
        let mut snapshots = service.subscribe_snapshots();

        let now = wall_clock_secs();
        service
            .send_fix(GeoFix { timestamp: now, latitude: 51.5, longitude: -0.1, accuracy: 5.0 })
            .await
            .unwrap();
        wait_for(&mut snapshots, |s| s.position.is_some()).await;

        service.reset().await.unwrap();
        wait_for(&mut snapshots, |s| s.position.is_none() && s.stats.fix_count == 0).await;
        service.stop().await;
    }

    #[tokio::test]
    async fn test_restart_command_reaches_session() {
        let mut service = NavService::spawn(route(&["w1"]), NavConfig::default()).unwrap();
        let mut events = service.take_events().unwrap();

        service.restart_scanning().await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("no event in time");
        assert_eq!(event, Some(NavEvent::SignalScanRestarted));
        service.stop().await;
    }
}
