use serde::{Deserialize, Serialize};

/// Proximity zone, 0 = outside all zones, 3 = closest band.
pub type Zone = u8;

/// Distance thresholds mapping a smoothed distance to a raw zone.
///
/// Invariant: `zone3_max_m < zone2_max_m < zone1_max_m`, enforced at the
/// config boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoneThresholds {
    /// Upper bound of zone 3 (closest), meters
    pub zone3_max_m: f64,
    /// Upper bound of zone 2, meters
    pub zone2_max_m: f64,
    /// Upper bound of zone 1 (outermost tracked band), meters
    pub zone1_max_m: f64,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        ZoneThresholds {
            zone3_max_m: 0.5,
            zone2_max_m: 0.8,
            zone1_max_m: 1.2,
        }
    }
}

impl ZoneThresholds {
    /// Map a smoothed distance to a raw zone, before hysteresis.
    pub fn classify(&self, distance_m: f64) -> Zone {
        if distance_m <= self.zone3_max_m {
            3
        } else if distance_m <= self.zone2_max_m {
            2
        } else if distance_m <= self.zone1_max_m {
            1
        } else {
            0
        }
    }
}

/// Hysteresis filter over raw zone classifications.
///
/// A zone change is committed only after N consecutive raw observations of
/// the same candidate zone; any interleaved different candidate restarts the
/// count. Suppresses flicker when the smoothed distance rides a threshold.
#[derive(Debug)]
pub struct ZoneFilter {
    confirmations: usize,
    pending: Vec<Zone>,
}

impl ZoneFilter {
    pub fn new(confirmations: usize) -> Self {
        ZoneFilter {
            confirmations: confirmations.max(1),
            pending: Vec::new(),
        }
    }

    /// Feed one raw classification and return the confirmed zone.
    pub fn confirm(&mut self, raw_zone: Zone, current_zone: Zone) -> Zone {
        if raw_zone == current_zone {
            self.pending.clear();
            self.pending.push(raw_zone);
            return current_zone;
        }

        // A different candidate restarts the vote
        if self.pending.first() != Some(&raw_zone) {
            self.pending.clear();
            self.pending.push(raw_zone);
            return current_zone;
        }

        self.pending.push(raw_zone);
        if self.pending.len() >= self.confirmations {
            self.pending.clear();
            return raw_zone;
        }

        current_zone
    }

    /// Clear pending confirmations. Called when no beacon is selected.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_thresholds() {
        let thresholds = ZoneThresholds::default();

        assert_eq!(thresholds.classify(0.1), 3);
        assert_eq!(thresholds.classify(0.5), 3);
        assert_eq!(thresholds.classify(0.51), 2);
        assert_eq!(thresholds.classify(0.8), 2);
        assert_eq!(thresholds.classify(1.0), 1);
        assert_eq!(thresholds.classify(1.2), 1);
        assert_eq!(thresholds.classify(1.21), 0);
        assert_eq!(thresholds.classify(8.0), 0);
    }

    #[test]
    fn test_commit_after_three_confirmations() {
        let mut filter = ZoneFilter::new(3);

        assert_eq!(filter.confirm(1, 0), 0);
        assert_eq!(filter.confirm(1, 0), 0);
        // Third consecutive observation commits
        assert_eq!(filter.confirm(1, 0), 1);
    }

    #[test]
    fn test_interrupted_vote_restarts() {
        let mut filter = ZoneFilter::new(3);
        let mut current = 0;

        // [1, 2, 1, 1, 1]: zone 2 never gets three in a row, zone 1 does
        for raw in [1, 2, 1, 1] {
            current = filter.confirm(raw, current);
            assert_eq!(current, 0);
        }
        current = filter.confirm(1, current);
        assert_eq!(current, 1);
    }

    #[test]
    fn test_matching_zone_resets_vote() {
        let mut filter = ZoneFilter::new(3);

        filter.confirm(2, 1);
        filter.confirm(2, 1);
        // Back in the current zone: the pending vote for 2 is discarded
        assert_eq!(filter.confirm(1, 1), 1);
        // Zone 2 has to start over
        assert_eq!(filter.confirm(2, 1), 1);
        assert_eq!(filter.confirm(2, 1), 1);
        assert_eq!(filter.confirm(2, 1), 2);
    }

    #[test]
    fn test_single_confirmation_commits_immediately() {
        let mut filter = ZoneFilter::new(1);
        assert_eq!(filter.confirm(3, 0), 3);
    }

    #[test]
    fn test_reset_clears_pending_vote() {
        let mut filter = ZoneFilter::new(3);
        filter.confirm(2, 0);
        filter.confirm(2, 0);
        filter.reset();

        // The earlier partial vote must not carry across a reset
        assert_eq!(filter.confirm(2, 0), 0);
        assert_eq!(filter.confirm(2, 0), 0);
        assert_eq!(filter.confirm(2, 0), 2);
    }
}
