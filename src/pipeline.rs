use crate::codec::DecodedReading;
use crate::config::Config;
use crate::distance::{estimate_distance, DistanceSmoother};
use crate::registry::{BeaconReading, BeaconRegistry};
use crate::smoothing::RssiSmoother;
use crate::zone::{Zone, ZoneFilter, ZoneThresholds};
use log::debug;

/// Immutable pipeline output published to consumers after every mutation.
#[derive(Debug, Clone, Default)]
pub struct PipelineSnapshot {
    /// All tracked beacons, strongest smoothed signal first
    pub beacons: Vec<BeaconReading>,
    /// Confirmed zone, 0 = outside
    pub current_zone: Zone,
    /// Deepest zone reached this session; ratchets forward only
    pub progress_zone: Zone,
    /// Smoothed distance to the strongest beacon, when one is selected
    pub distance_m: Option<f64>,
}

impl PipelineSnapshot {
    pub fn strongest(&self) -> Option<&BeaconReading> {
        self.beacons.first()
    }
}

/// The proximity pipeline: registry update -> strongest-beacon selection ->
/// distance estimation -> zone classification, recomputed explicitly after
/// each mutation. There is no background reactivity; callers invoke
/// [`ingest`](ProximityPipeline::ingest) per decoded advertisement and
/// [`tick`](ProximityPipeline::tick) on the lifecycle period, and each call
/// returns the snapshot produced by that mutation.
#[derive(Debug)]
pub struct ProximityPipeline {
    registry: BeaconRegistry,
    thresholds: ZoneThresholds,
    zone_filter: ZoneFilter,
    distance_smoother: DistanceSmoother,
    reference_power_dbm: i32,
    path_loss_exponent: f64,
    current_zone: Zone,
    progress_zone: Zone,
    distance_m: Option<f64>,
}

impl ProximityPipeline {
    pub fn from_config(config: &Config) -> Self {
        let smoother = RssiSmoother::new(
            config.calibration.rssi_window_size,
            config.calibration.ema_alpha,
        );
        let registry = BeaconRegistry::new(
            smoother,
            config.lifecycle.inactivity_ms,
            config.lifecycle.expiry_ms,
        );

        ProximityPipeline {
            registry,
            thresholds: config.zones.thresholds,
            zone_filter: ZoneFilter::new(config.zones.confirmations),
            distance_smoother: DistanceSmoother::new(
                config.zones.max_walk_speed_mps,
                config.zones.distance_alpha,
            ),
            reference_power_dbm: config.calibration.reference_power_dbm,
            path_loss_exponent: config.calibration.path_loss_exponent,
            current_zone: 0,
            progress_zone: 0,
            distance_m: None,
        }
    }

    /// Fold one decoded advertisement into the registry and recompute.
    pub fn ingest(
        &mut self,
        decoded: &DecodedReading,
        raw_rssi: i32,
        device_address: &str,
        now_ms: i64,
    ) -> PipelineSnapshot {
        self.registry.upsert(decoded, raw_rssi, device_address, now_ms);
        self.recompute(now_ms)
    }

    /// Run one lifecycle aging pass and recompute.
    pub fn tick(&mut self, now_ms: i64) -> PipelineSnapshot {
        self.registry.tick(now_ms);
        self.recompute(now_ms)
    }

    fn recompute(&mut self, now_ms: i64) -> PipelineSnapshot {
        let beacons = self.registry.snapshot_sorted_by_strength();

        let strongest = match beacons.first() {
            Some(strongest) => strongest,
            None => {
                // Nothing selected: back to outside, and drop smoothing
                // state so it cannot leak into the next selection. The
                // progress ratchet survives within the session.
                if self.current_zone != 0 {
                    debug!("No beacons tracked, zone reset to 0");
                }
                self.current_zone = 0;
                self.distance_m = None;
                self.zone_filter.reset();
                self.distance_smoother.reset();
                return self.snapshot_with(beacons);
            }
        };

        let raw_distance = estimate_distance(
            strongest.smoothed_rssi,
            self.reference_power_dbm,
            self.path_loss_exponent,
        );
        let smoothed_distance = self.distance_smoother.apply(raw_distance, now_ms);

        let raw_zone = self.thresholds.classify(smoothed_distance);
        let confirmed = self.zone_filter.confirm(raw_zone, self.current_zone);

        if confirmed != self.current_zone {
            debug!(
                "Zone change {} -> {} at {:.2} m ({})",
                self.current_zone, confirmed, smoothed_distance, strongest.identity
            );
            self.current_zone = confirmed;
        }
        self.distance_m = Some(smoothed_distance);
        if confirmed > 0 {
            self.progress_zone = self.progress_zone.max(confirmed);
        }

        self.snapshot_with(beacons)
    }

    fn snapshot_with(&self, beacons: Vec<BeaconReading>) -> PipelineSnapshot {
        PipelineSnapshot {
            beacons,
            current_zone: self.current_zone,
            progress_zone: self.progress_zone,
            distance_m: self.distance_m,
        }
    }

    /// Current output without mutating anything.
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshot_with(self.registry.snapshot_sorted_by_strength())
    }

    /// Full session reset: registry, filter state, zone state, and the
    /// progress ratchet. Called when scanning stops or restarts.
    pub fn reset_session(&mut self) {
        self.registry.clear();
        self.zone_filter.reset();
        self.distance_smoother.reset();
        self.current_zone = 0;
        self.progress_zone = 0;
        self.distance_m = None;
    }

    pub fn current_zone(&self) -> Zone {
        self.current_zone
    }

    pub fn progress_zone(&self) -> Zone {
        self.progress_zone
    }
}
