/// Distance estimation from smoothed RSSI
///
/// Uses the Log-Distance Path Loss Model:
/// distance = 10 ^ ((reference_power - rssi) / (10 * n))
///
/// Where:
/// - reference_power: expected RSSI at 1 meter from the beacon (dBm)
/// - rssi: smoothed signal strength (dBm)
/// - n: path loss exponent (environment dependent)
///
/// Both reference_power and n are user-tunable calibration parameters; the
/// beacon payload's own tx-power field is informational only.

/// Minimum distance the model will report, in meters. Keeps a very strong
/// signal from producing a degenerate near-zero result.
pub const MIN_DISTANCE_M: f64 = 0.1;

/// Estimate distance in meters from a smoothed RSSI sample.
///
/// # Arguments
/// * `smoothed_rssi` - Filtered signal strength in dBm (negative value)
/// * `reference_power_dbm` - Expected RSSI at 1 meter (typical -80 to -10)
/// * `path_loss_exponent` - Environment factor (2.0=free space, 2.5=open room)
///
/// # Returns
/// Estimated distance in meters, floored at [`MIN_DISTANCE_M`]. Exactly
/// 1.0 m when the signal matches the reference power.
pub fn estimate_distance(
    smoothed_rssi: i32,
    reference_power_dbm: i32,
    path_loss_exponent: f64,
) -> f64 {
    let exponent =
        (reference_power_dbm as f64 - smoothed_rssi as f64) / (10.0 * path_loss_exponent);
    let distance = 10.0_f64.powf(exponent);

    distance.max(MIN_DISTANCE_M)
}

/// Walking-speed-clamped temporal smoothing over raw distance estimates.
///
/// RSSI noise can make the raw distance jump meters between consecutive
/// samples; a person does not. Each update clamps the raw estimate to what
/// the configured walking speed allows over the elapsed time, then low-pass
/// filters the clamped value.
#[derive(Debug)]
pub struct DistanceSmoother {
    max_speed_mps: f64,
    alpha: f64,
    previous: Option<f64>,
    last_update_ms: Option<i64>,
}

impl DistanceSmoother {
    pub fn new(max_speed_mps: f64, alpha: f64) -> Self {
        DistanceSmoother {
            max_speed_mps,
            alpha,
            previous: None,
            last_update_ms: None,
        }
    }

    /// Fold one raw distance estimate into the smoothed track.
    pub fn apply(&mut self, raw_distance_m: f64, now_ms: i64) -> f64 {
        let previous = match self.previous {
            // First sample seeds the track directly, nothing to clamp against
            None => {
                self.previous = Some(raw_distance_m);
                self.last_update_ms = Some(now_ms);
                return raw_distance_m;
            }
            Some(previous) => previous,
        };

        let dt_seconds =
            ((now_ms - self.last_update_ms.unwrap_or(now_ms)) as f64 / 1000.0).max(0.001);
        let max_delta = self.max_speed_mps * dt_seconds;

        let clamped = raw_distance_m.clamp(previous - max_delta, previous + max_delta);
        let smoothed = previous + self.alpha * (clamped - previous);

        self.previous = Some(smoothed);
        self.last_update_ms = Some(now_ms);

        smoothed
    }

    /// Forget the track. Called whenever no beacon is selected so stale
    /// distance does not leak into the next session.
    pub fn reset(&mut self) {
        self.previous = None;
        self.last_update_ms = None;
    }

    pub fn current(&self) -> Option<f64> {
        self.previous
    }
}

/// Typical path loss exponents for different environments
pub mod environments {
    pub const FREE_SPACE: f64 = 2.0;
    pub const OPEN_ROOM: f64 = 2.5;
    pub const FURNISHED_ROOM: f64 = 3.0;
    pub const CROWDED_GALLERY: f64 = 3.5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_power_is_one_meter() {
        // Signal equal to the 1m reference must read exactly 1.0 for any n
        for n in [1.0, 2.0, 2.5, 4.0, 500.0] {
            assert_eq!(estimate_distance(-52, -52, n), 1.0);
        }
    }

    #[test]
    fn test_weaker_signal_is_farther() {
        let mut last = 0.0;
        for rssi in (-90..=-40).rev() {
            let d = estimate_distance(rssi, -52, 2.5);
            assert!(d > last, "distance must grow as RSSI drops");
            last = d;
        }
    }

    #[test]
    fn test_floor_at_minimum() {
        // Much stronger than the reference: model says centimeters, floor wins
        let d = estimate_distance(-10, -52, 2.0);
        assert_eq!(d, MIN_DISTANCE_M);
    }

    #[test]
    fn test_smoother_clamps_to_walk_speed() {
        let mut smoother = DistanceSmoother::new(0.8, 1.0);
        smoother.apply(1.0, 0);

        // 500 ms at 0.8 m/s allows 0.4 m of travel; a 4 m jump is noise
        let smoothed = smoother.apply(5.0, 500);
        assert!((smoothed - 1.4).abs() < 1e-9);

        let smoothed = smoother.apply(0.0, 1000);
        assert!((smoothed - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_smoother_step_never_exceeds_speed_budget() {
        let mut smoother = DistanceSmoother::new(0.8, 0.15);
        let mut previous = smoother.apply(2.0, 0);

        let mut now_ms = 0;
        for raw in [8.0, 0.1, 12.0, 0.1, 3.0] {
            now_ms += 250;
            let next = smoother.apply(raw, now_ms);
            let budget = 0.8 * 0.25 + 1e-9;
            assert!((next - previous).abs() <= budget);
            previous = next;
        }
    }

    #[test]
    fn test_smoother_first_sample_seeds() {
        let mut smoother = DistanceSmoother::new(0.8, 0.15);
        assert_eq!(smoother.apply(2.7, 1000), 2.7);
        assert_eq!(smoother.current(), Some(2.7));
    }

    #[test]
    fn test_smoother_reset() {
        let mut smoother = DistanceSmoother::new(0.8, 0.15);
        smoother.apply(2.7, 1000);
        smoother.reset();

        assert_eq!(smoother.current(), None);
        // Post-reset the next sample seeds fresh, no clamp against stale state
        assert_eq!(smoother.apply(0.3, 500_000), 0.3);
    }

    #[test]
    fn test_smoother_zero_dt_uses_minimum_step() {
        let mut smoother = DistanceSmoother::new(0.8, 1.0);
        smoother.apply(1.0, 1000);

        // Same-millisecond update still moves by at most max_speed * 1 ms
        let smoothed = smoother.apply(5.0, 1000);
        assert!((smoothed - 1.0008).abs() < 1e-9);
    }
}
