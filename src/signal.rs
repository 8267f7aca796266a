// signal.rs - RSSI conditioning per beacon.
//
// Each advert runs through the same pipeline: bounded history push,
// median outlier rejection, recency-weighted mean, then an EMA whose
// factor comes from the active movement profile. Quality is a blended
// score over the retained history and feeds the arrival thresholds.

use std::collections::{HashMap, VecDeque};

use crate::config::NavConfig;
use crate::movement::MovementState;
use crate::types::{BeaconAdvert, Route};

/// Conditioned view of one beacon, produced after every ingest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalReadout {
    pub smoothed_dbm: f64,
    pub quality: f64,
    pub detections: u32,
    pub last_seen: Option<f64>,
}

#[derive(Debug)]
struct BeaconSignal {
    history: VecDeque<f64>,
    smoothed_dbm: f64,
    seeded: bool,
    quality: f64,
    detections: u32,
    last_seen: Option<f64>,
}

impl BeaconSignal {
    /// State for a beacon that has never been heard, or whose signal
    /// timed out. Smoothed value pins to the no-signal floor.
    fn idle(config: &NavConfig) -> Self {
        Self {
            history: VecDeque::new(),
            smoothed_dbm: config.no_signal_floor_dbm,
            seeded: false,
            quality: 0.0,
            detections: 0,
            last_seen: None,
        }
    }

    fn readout(&self) -> SignalReadout {
        SignalReadout {
            smoothed_dbm: self.smoothed_dbm,
            quality: self.quality,
            detections: self.detections,
            last_seen: self.last_seen,
        }
    }
}

/// Holds one `BeaconSignal` per route waypoint. Adverts for ids outside
/// the route are dropped at the door.
#[derive(Debug)]
pub struct SignalSmoother {
    beacons: HashMap<String, BeaconSignal>,
}

impl SignalSmoother {
    pub fn new(route: &Route, config: &NavConfig) -> Self {
        let beacons = route
            .waypoints
            .iter()
            .map(|w| (w.id.clone(), BeaconSignal::idle(config)))
            .collect();
        Self { beacons }
    }

    /// Runs one advert through the conditioning pipeline and returns the
    /// updated readout. None for ids not on the route.
    pub fn ingest(
        &mut self,
        advert: &BeaconAdvert,
        movement: MovementState,
        config: &NavConfig,
    ) -> Option<SignalReadout> {
        let signal = match self.beacons.get_mut(&advert.waypoint_id) {
            Some(signal) => signal,
            None => {
                log::debug!("advert for unknown beacon {} dropped", advert.waypoint_id);
                return None;
            }
        };
        let profile = config.profile(movement);

        signal.history.push_back(advert.rssi_dbm as f64);
        while signal.history.len() > profile.history_size {
            signal.history.pop_front();
        }

        let retained = retained_history(&signal.history, config);
        let weighted = recency_weighted_mean(&retained, config.weight_ratio);
        if signal.seeded {
            signal.smoothed_dbm += profile.smoothing_factor * (weighted - signal.smoothed_dbm);
        } else {
            signal.smoothed_dbm = weighted;
            signal.seeded = true;
        }
        signal.detections += 1;
        signal.last_seen = Some(advert.timestamp);
        signal.quality = quality_score(signal.smoothed_dbm, signal.detections, &retained, config);
        Some(signal.readout())
    }

    pub fn readout(&self, waypoint_id: &str) -> Option<SignalReadout> {
        self.beacons.get(waypoint_id).map(|s| s.readout())
    }

    /// Expires beacons silent for longer than the device timeout and
    /// returns their ids. Already-idle beacons have no `last_seen`, so
    /// running the sweep twice at the same clock is a no-op.
    pub fn sweep(&mut self, now: f64, config: &NavConfig) -> Vec<String> {
        let mut expired: Vec<String> = self
            .beacons
            .iter()
            .filter(|(_, signal)| {
                signal
                    .last_seen
                    .is_some_and(|seen| now - seen > config.device_timeout_secs)
            })
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();
        for id in &expired {
            if let Some(signal) = self.beacons.get_mut(id) {
                *signal = BeaconSignal::idle(config);
            }
        }
        expired
    }

    /// Drops every beacon back to idle, as after a platform scan restart.
    pub fn restart(&mut self, config: &NavConfig) {
        for signal in self.beacons.values_mut() {
            *signal = BeaconSignal::idle(config);
        }
    }
}

/// History minus median outliers. Short histories pass through whole;
/// if the filter would discard everything, it keeps everything instead.
fn retained_history(history: &VecDeque<f64>, config: &NavConfig) -> Vec<f64> {
    let values: Vec<f64> = history.iter().copied().collect();
    if values.len() < config.outlier_min_history {
        return values;
    }
    let center = median(&values);
    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| (v - center).abs() <= config.outlier_threshold_db)
        .collect();
    if kept.is_empty() {
        values
    } else {
        kept
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Mean with weights growing by `ratio` toward the newest sample.
fn recency_weighted_mean(values: &[f64], ratio: f64) -> f64 {
    let mut weight = 1.0;
    let mut sum = 0.0;
    let mut total = 0.0;
    for value in values {
        sum += value * weight;
        total += weight;
        weight *= ratio;
    }
    sum / total
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// 0.4 consistency + 0.4 strength + 0.2 frequency, all in [0, 1].
/// Below the minimum sample count the score is a fixed low default
/// rather than a guess from too little data.
fn quality_score(smoothed_dbm: f64, detections: u32, retained: &[f64], config: &NavConfig) -> f64 {
    if detections < config.quality_min_samples {
        return config.default_quality;
    }
    let consistency = 1.0 / (1.0 + variance(retained) / config.consistency_scale);
    let span = config.strength_ceiling_dbm - config.strength_floor_dbm;
    let strength = ((smoothed_dbm - config.strength_floor_dbm) / span).clamp(0.0, 1.0);
    let frequency = (f64::from(detections) / f64::from(config.frequency_saturation)).min(1.0);
    0.4 * consistency + 0.4 * strength + 0.2 * frequency
}
