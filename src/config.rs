use crate::codec::TrailerLayout;
use crate::zone::ZoneThresholds;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub zones: ZoneConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub narration: NarrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Trailer layout of the deployed beacon firmware generation
    pub trailer_layout: TrailerLayout,
    /// RSSI substituted when the transport delivers a reading without one
    pub fallback_rssi_dbm: i32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            trailer_layout: TrailerLayout::Calibrated,
            fallback_rssi_dbm: -100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Expected RSSI at 1 meter (dBm). The zero-point of the distance model.
    pub reference_power_dbm: i32,
    /// Path loss exponent: 2.0 = free space, 2.5-3.5 = indoors
    pub path_loss_exponent: f64,
    /// Raw samples kept per beacon for the EMA seed window
    pub rssi_window_size: usize,
    /// EMA weight of the newest raw sample
    pub ema_alpha: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            reference_power_dbm: -52,
            path_loss_exponent: 2.5,
            rssi_window_size: 7,
            ema_alpha: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    #[serde(flatten)]
    pub thresholds: ZoneThresholds,
    /// Consecutive matching classifications required to commit a zone change
    pub confirmations: usize,
    /// Fastest plausible approach/retreat speed, m/s
    pub max_walk_speed_mps: f64,
    /// Low-pass weight for the smoothed distance track
    pub distance_alpha: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        ZoneConfig {
            thresholds: ZoneThresholds::default(),
            confirmations: 3,
            max_walk_speed_mps: 0.8,
            distance_alpha: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Age after which an Active beacon is marked Inactive, ms
    pub inactivity_ms: i64,
    /// Age after which a beacon is removed outright, ms
    pub expiry_ms: i64,
    /// Lifecycle ticker period, ms
    pub tick_interval_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            inactivity_ms: 30_000,
            expiry_ms: 120_000,
            tick_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    pub enabled: bool,
    /// Path to the per-room narration content file
    pub content: String,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        NarrationConfig {
            enabled: false,
            content: "narration.json".to_string(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Boundary validation of all externally supplied parameters. The core
    /// modules assume these hold and do not re-check.
    pub fn validate(&self) -> Result<()> {
        let cal = &self.calibration;
        if !(-80..=-10).contains(&cal.reference_power_dbm) {
            bail!(
                "reference_power_dbm {} outside -80..=-10",
                cal.reference_power_dbm
            );
        }
        if !(1.0..=500.0).contains(&cal.path_loss_exponent) {
            bail!(
                "path_loss_exponent {} outside 1.0..=500.0",
                cal.path_loss_exponent
            );
        }
        if !(3..=10).contains(&cal.rssi_window_size) {
            bail!("rssi_window_size {} outside 3..=10", cal.rssi_window_size);
        }
        if !(0.0..=1.0).contains(&cal.ema_alpha) {
            bail!("ema_alpha {} outside 0..=1", cal.ema_alpha);
        }

        let zones = &self.zones;
        let t = &zones.thresholds;
        if t.zone3_max_m <= 0.0 || t.zone3_max_m >= t.zone2_max_m || t.zone2_max_m >= t.zone1_max_m
        {
            bail!(
                "zone thresholds must be positive and ascending: {} < {} < {}",
                t.zone3_max_m,
                t.zone2_max_m,
                t.zone1_max_m
            );
        }
        if zones.confirmations == 0 {
            bail!("confirmations must be at least 1");
        }
        if zones.max_walk_speed_mps <= 0.0 {
            bail!("max_walk_speed_mps must be positive");
        }
        if !(0.0..=1.0).contains(&zones.distance_alpha) {
            bail!("distance_alpha {} outside 0..=1", zones.distance_alpha);
        }

        let lifecycle = &self.lifecycle;
        if lifecycle.inactivity_ms <= 0 || lifecycle.expiry_ms <= 0 {
            bail!("lifecycle thresholds must be positive");
        }
        if lifecycle.inactivity_ms >= lifecycle.expiry_ms {
            bail!(
                "inactivity_ms ({}) must be below expiry_ms ({})",
                lifecycle.inactivity_ms,
                lifecycle.expiry_ms
            );
        }
        if lifecycle.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be positive");
        }

        Ok(())
    }
}
