use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::NavConfig;
use crate::geomath;
use crate::types::{FilteredPosition, GeoFix};

/// Why a raw fix was dropped. Carried on the rejection event so callers
/// can see which gate fired.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FixRejectReason {
    LowAccuracy { accuracy_m: f64 },
    OutOfOrder { dt_secs: f64 },
    ImplausibleSpeed { speed_mps: f64 },
    PositionJump { distance_m: f64, dt_secs: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum FixOutcome {
    /// First accepted fix; seeds the filter state.
    Initialized,
    Accepted,
    Rejected(FixRejectReason),
}

/// Gates raw fixes (accuracy, plausible speed, spatial jump), then
/// smooths the survivors twice: an EMA per coordinate followed by a
/// short moving average. Rejection keeps all prior state; until the
/// first accepted fix `position()` is None and consumers treat the
/// position as unknown.
#[derive(Debug, Default)]
pub struct PositionFilter {
    last_valid: Option<GeoFix>,
    ema_lat: f64,
    ema_lon: f64,
    ema_seeded: bool,
    window: VecDeque<(f64, f64)>,
    position: Option<FilteredPosition>,
    speed_mps: f64,
    course_deg: Option<f64>,
}

impl PositionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Option<FilteredPosition> {
        self.position
    }

    /// Speed measured between the last two accepted fixes, 0.0 before that.
    pub fn speed_mps(&self) -> f64 {
        self.speed_mps
    }

    /// Ground course between the last two accepted fixes.
    pub fn course_deg(&self) -> Option<f64> {
        self.course_deg
    }

    pub fn apply(&mut self, fix: &GeoFix, config: &NavConfig) -> FixOutcome {
        if fix.accuracy > config.accuracy_limit_m {
            log::debug!("fix dropped: accuracy {:.1}m over {:.1}m limit", fix.accuracy, config.accuracy_limit_m);
            return FixOutcome::Rejected(FixRejectReason::LowAccuracy { accuracy_m: fix.accuracy });
        }

        let mut measured: Option<(f64, f64)> = None;
        if let Some(prev) = &self.last_valid {
            let dt = fix.timestamp - prev.timestamp;
            if dt <= 0.0 {
                return FixOutcome::Rejected(FixRejectReason::OutOfOrder { dt_secs: dt });
            }
            let distance = geomath::haversine_m(prev.latitude, prev.longitude, fix.latitude, fix.longitude);
            let speed = distance / dt;
            if speed > config.max_human_speed_mps {
                log::debug!("fix dropped: {:.1} m/s implausible on foot", speed);
                return FixOutcome::Rejected(FixRejectReason::ImplausibleSpeed { speed_mps: speed });
            }
            if distance > config.jump_distance_m && dt < config.jump_window_secs {
                log::debug!("fix dropped: {:.1}m jump in {:.2}s", distance, dt);
                return FixOutcome::Rejected(FixRejectReason::PositionJump { distance_m: distance, dt_secs: dt });
            }
            let course = geomath::initial_bearing_deg(prev.latitude, prev.longitude, fix.latitude, fix.longitude);
            measured = Some((speed, course));
        }

        let first = self.last_valid.is_none();
        self.last_valid = Some(fix.clone());
        if let Some((speed, course)) = measured {
            self.speed_mps = speed;
            self.course_deg = Some(course);
        }

        // EMA seeds on the first accepted fix, then tracks per coordinate.
        if self.ema_seeded {
            self.ema_lat += config.position_alpha * (fix.latitude - self.ema_lat);
            self.ema_lon += config.position_alpha * (fix.longitude - self.ema_lon);
        } else {
            self.ema_lat = fix.latitude;
            self.ema_lon = fix.longitude;
            self.ema_seeded = true;
        }

        self.window.push_back((self.ema_lat, self.ema_lon));
        while self.window.len() > config.position_window.max(1) {
            self.window.pop_front();
        }
        let n = self.window.len() as f64;
        let (lat_sum, lon_sum) = self
            .window
            .iter()
            .fold((0.0, 0.0), |acc, (lat, lon)| (acc.0 + lat, acc.1 + lon));
        self.position = Some(FilteredPosition {
            latitude: lat_sum / n,
            longitude: lon_sum / n,
            updated_at: fix.timestamp,
        });

        if first {
            FixOutcome::Initialized
        } else {
            FixOutcome::Accepted
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
