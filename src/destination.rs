use crate::config::NavConfig;
use crate::geomath;
use crate::movement::MovementState;
use crate::types::{FilteredPosition, LatLon};

/// Watches the smoothed distance to the destination and latches
/// `reached` after enough consecutive in-threshold updates. The latch
/// is permanent for the session; distance keeps updating afterwards so
/// the UI can still show it.
#[derive(Debug)]
pub struct DestinationEvaluator {
    destination: LatLon,
    smoothed_m: Option<f64>,
    stable_count: u32,
    reached: bool,
}

impl DestinationEvaluator {
    pub fn new(destination: LatLon) -> Self {
        Self {
            destination,
            smoothed_m: None,
            stable_count: 0,
            reached: false,
        }
    }

    /// Feeds one filtered position. Returns true only on the update
    /// that latches `reached`.
    pub fn update(
        &mut self,
        position: &FilteredPosition,
        movement: MovementState,
        config: &NavConfig,
    ) -> bool {
        let raw = geomath::haversine_m(
            position.latitude,
            position.longitude,
            self.destination.latitude,
            self.destination.longitude,
        );
        let profile = config.profile(movement);
        let smoothed = match self.smoothed_m {
            // Larger swings get a larger alpha so a real approach is not
            // dragged out by the smoothing.
            Some(prev) => {
                let alpha = (profile.distance_alpha
                    + config.distance_alpha_gain * (raw - prev).abs())
                .min(config.distance_alpha_max);
                prev + alpha * (raw - prev)
            }
            None => raw,
        };
        self.smoothed_m = Some(smoothed);

        if self.reached {
            return false;
        }
        if smoothed <= profile.gps_reach_threshold_m {
            self.stable_count += 1;
        } else {
            self.stable_count = 0;
        }
        if self.stable_count >= profile.arrival_stable_samples {
            self.reached = true;
            log::info!("destination reached at {smoothed:.1}m");
            return true;
        }
        false
    }

    /// None until the first position arrives.
    pub fn distance_m(&self) -> Option<f64> {
        self.smoothed_m
    }

    pub fn is_reached(&self) -> bool {
        self.reached
    }

    pub fn reset(&mut self) {
        self.smoothed_m = None;
        self.stable_count = 0;
        self.reached = false;
    }
}
