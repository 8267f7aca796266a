// Tunables for every filter stage. The movement-state-keyed parameters
// live in one MovementProfile table per state instead of being
// re-derived ad hoc in each module, so changing how Walking behaves is
// a one-place edit.

use crate::error::{NavError, Result};
use crate::movement::MovementState;

#[derive(Clone, Debug)]
pub struct NavConfig {
    // ── Position filter ──
    pub accuracy_limit_m: f64,
    pub max_human_speed_mps: f64,
    pub jump_distance_m: f64,
    pub jump_window_secs: f64,
    pub position_alpha: f64,
    pub position_window: usize,

    // ── Movement classification ──
    pub stationary_speed_mps: f64,
    pub walking_speed_mps: f64,

    // ── Signal smoothing ──
    pub outlier_threshold_db: f64,
    pub outlier_min_history: usize,
    pub weight_ratio: f64,
    pub strength_floor_dbm: f64,
    pub strength_ceiling_dbm: f64,
    pub frequency_saturation: u32,
    pub quality_min_samples: u32,
    pub default_quality: f64,
    pub consistency_scale: f64,
    pub device_timeout_secs: f64,
    pub no_signal_floor_dbm: f64,

    // ── Waypoint arrival ──
    pub reached_cooldown_secs: f64,
    pub max_arrival_speed_mps: f64,
    pub quality_high: f64,
    pub quality_low: f64,
    pub quality_mid_relax_db: f64,
    pub quality_low_relax_db: f64,

    // ── Destination arrival ──
    pub distance_alpha_gain: f64,
    pub distance_alpha_max: f64,

    // ── Timers ──
    pub sweep_interval_secs: f64,

    // ── Per-movement-state profiles ──
    pub stationary: MovementProfile,
    pub walking: MovementProfile,
    pub running: MovementProfile,
}

/// Parameter set keyed by movement state. Stationary favors long
/// histories and slow smoothing; Running favors short histories and
/// fast reaction so a beacon passed in under a second still registers.
#[derive(Clone, Debug)]
pub struct MovementProfile {
    pub history_size: usize,
    pub smoothing_factor: f64,
    pub rssi_threshold_dbm: f64,
    pub required_stable_samples: u32,
    pub gps_reach_threshold_m: f64,
    pub arrival_stable_samples: u32,
    pub distance_alpha: f64,
    pub progress_floor_dbm: f64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            accuracy_limit_m: 50.0,
            max_human_speed_mps: 12.0,
            jump_distance_m: 50.0,
            jump_window_secs: 2.0,
            position_alpha: 0.6,
            position_window: 3,
            stationary_speed_mps: 0.3,
            walking_speed_mps: 2.0,
            outlier_threshold_db: 20.0,
            outlier_min_history: 5,
            weight_ratio: 1.3,
            strength_floor_dbm: -100.0,
            strength_ceiling_dbm: -30.0,
            frequency_saturation: 20,
            quality_min_samples: 3,
            default_quality: 0.3,
            consistency_scale: 50.0,
            device_timeout_secs: 10.0,
            no_signal_floor_dbm: -100.0,
            reached_cooldown_secs: 5.0,
            max_arrival_speed_mps: 12.0,
            quality_high: 0.8,
            quality_low: 0.6,
            quality_mid_relax_db: 3.0,
            quality_low_relax_db: 6.0,
            distance_alpha_gain: 0.05,
            distance_alpha_max: 0.9,
            sweep_interval_secs: 1.0,
            stationary: MovementProfile {
                history_size: 10,
                smoothing_factor: 0.25,
                rssi_threshold_dbm: -65.0,
                required_stable_samples: 3,
                gps_reach_threshold_m: 5.0,
                arrival_stable_samples: 3,
                distance_alpha: 0.3,
                progress_floor_dbm: -90.0,
            },
            walking: MovementProfile {
                history_size: 6,
                smoothing_factor: 0.45,
                rssi_threshold_dbm: -70.0,
                required_stable_samples: 2,
                gps_reach_threshold_m: 8.0,
                arrival_stable_samples: 2,
                distance_alpha: 0.5,
                progress_floor_dbm: -90.0,
            },
            running: MovementProfile {
                history_size: 4,
                smoothing_factor: 0.65,
                rssi_threshold_dbm: -75.0,
                required_stable_samples: 1,
                gps_reach_threshold_m: 12.0,
                arrival_stable_samples: 2,
                distance_alpha: 0.6,
                progress_floor_dbm: -90.0,
            },
        }
    }
}

impl NavConfig {
    pub fn profile(&self, state: MovementState) -> &MovementProfile {
        match state {
            MovementState::Stationary => &self.stationary,
            MovementState::Walking => &self.walking,
            MovementState::Running => &self.running,
        }
    }

    /// Sanity checks run once at session start.
    pub fn validate(&self) -> Result<()> {
        if self.accuracy_limit_m <= 0.0 {
            return Err(NavError::InvalidConfig("accuracy_limit_m must be positive".into()));
        }
        if self.max_human_speed_mps <= 0.0 {
            return Err(NavError::InvalidConfig("max_human_speed_mps must be positive".into()));
        }
        if self.position_alpha <= 0.0 || self.position_alpha > 1.0 {
            return Err(NavError::InvalidConfig("position_alpha must be in (0, 1]".into()));
        }
        if self.position_window == 0 {
            return Err(NavError::InvalidConfig("position_window must be at least 1".into()));
        }
        if self.stationary_speed_mps >= self.walking_speed_mps {
            return Err(NavError::InvalidConfig(
                "stationary_speed_mps must be below walking_speed_mps".into(),
            ));
        }
        if self.weight_ratio < 1.0 {
            return Err(NavError::InvalidConfig("weight_ratio must be at least 1.0".into()));
        }
        if self.strength_ceiling_dbm <= self.strength_floor_dbm {
            return Err(NavError::InvalidConfig(
                "strength_ceiling_dbm must exceed strength_floor_dbm".into(),
            ));
        }
        if self.frequency_saturation == 0 {
            return Err(NavError::InvalidConfig("frequency_saturation must be at least 1".into()));
        }
        if self.device_timeout_secs <= 0.0 {
            return Err(NavError::InvalidConfig("device_timeout_secs must be positive".into()));
        }
        if self.sweep_interval_secs <= 0.0 {
            return Err(NavError::InvalidConfig("sweep_interval_secs must be positive".into()));
        }
        if self.distance_alpha_max <= 0.0 || self.distance_alpha_max > 1.0 {
            return Err(NavError::InvalidConfig("distance_alpha_max must be in (0, 1]".into()));
        }
        self.stationary.validate("stationary")?;
        self.walking.validate("walking")?;
        self.running.validate("running")?;
        Ok(())
    }
}

impl MovementProfile {
    fn validate(&self, name: &str) -> Result<()> {
        if self.history_size == 0 {
            return Err(NavError::InvalidConfig(format!(
                "{name} profile: history_size must be at least 1"
            )));
        }
        if self.smoothing_factor <= 0.0 || self.smoothing_factor > 1.0 {
            return Err(NavError::InvalidConfig(format!(
                "{name} profile: smoothing_factor must be in (0, 1]"
            )));
        }
        if self.required_stable_samples == 0 || self.arrival_stable_samples == 0 {
            return Err(NavError::InvalidConfig(format!(
                "{name} profile: stable sample counts must be at least 1"
            )));
        }
        if self.gps_reach_threshold_m <= 0.0 {
            return Err(NavError::InvalidConfig(format!(
                "{name} profile: gps_reach_threshold_m must be positive"
            )));
        }
        if self.distance_alpha <= 0.0 || self.distance_alpha > 1.0 {
            return Err(NavError::InvalidConfig(format!(
                "{name} profile: distance_alpha must be in (0, 1]"
            )));
        }
        if self.rssi_threshold_dbm <= self.progress_floor_dbm {
            return Err(NavError::InvalidConfig(format!(
                "{name} profile: rssi_threshold_dbm must exceed progress_floor_dbm"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(NavConfig::default().validate().is_ok());
    }

    #[test]
    fn test_profiles_shorten_history_with_speed() {
        let config = NavConfig::default();
        let stationary = config.profile(MovementState::Stationary);
        let walking = config.profile(MovementState::Walking);
        let running = config.profile(MovementState::Running);
        assert!(stationary.history_size > walking.history_size);
        assert!(walking.history_size > running.history_size);
        assert!(stationary.smoothing_factor < running.smoothing_factor);
    }

    #[test]
    fn test_validate_rejects_inverted_speed_thresholds() {
        let config = NavConfig {
            stationary_speed_mps: 3.0,
            walking_speed_mps: 2.0,
            ..NavConfig::default()
        };
        assert!(matches!(config.validate(), Err(NavError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_history() {
        let mut config = NavConfig::default();
        config.walking.history_size = 0;
        assert!(matches!(config.validate(), Err(NavError::InvalidConfig(_))));
    }
}
