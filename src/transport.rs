use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Service UUID the radio transport filters advertisements on before they
/// reach this crate. Readings for other services never arrive here.
pub const BEACON_SERVICE_UUID: &str = "0000A00A-0000-1000-8000-00805F9B34FB";

/// One advertisement reading as delivered by the (external) radio
/// transport. Anything that can feed these into an `mpsc::Sender` is a
/// valid transport; the engine only ever sees the receiving end, so test
/// doubles and the sources below plug in the same way a real radio does.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub device_address: String,
    pub service_data: Vec<u8>,
    pub rssi: Option<i32>,
    pub timestamp_ms: i64,
}

/// One line of a JSONL replay file: a recorded advertisement with its
/// offset from the start of the recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub offset_ms: u64,
    /// Service data payload as a hex string
    pub payload: String,
    pub rssi: i32,
    #[serde(default)]
    pub device: Option<String>,
}

/// Replays a recorded advertisement stream with original pacing.
pub struct ReplaySource {
    path: PathBuf,
}

impl ReplaySource {
    pub fn new(path: PathBuf) -> Self {
        ReplaySource { path }
    }

    pub async fn run(
        &self,
        tx: mpsc::Sender<Advertisement>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read replay file: {:?}", self.path))?;

        info!("Replaying advertisements from {:?}", self.path);

        let mut last_offset_ms = 0u64;
        let mut sent = 0u64;

        for (line_no, line) in content.lines().enumerate() {
            if !running.load(Ordering::SeqCst) {
                break;
            }

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let record: ReplayRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping replay line {}: {}", line_no + 1, e);
                    continue;
                }
            };

            let service_data = match parse_hex(&record.payload) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping replay line {}: {}", line_no + 1, e);
                    continue;
                }
            };

            // Recreate the original pacing between records
            let gap = record.offset_ms.saturating_sub(last_offset_ms);
            if gap > 0 {
                sleep(Duration::from_millis(gap)).await;
            }
            last_offset_ms = record.offset_ms;

            let advert = Advertisement {
                device_address: record.device.unwrap_or_else(|| "replay".to_string()),
                service_data,
                rssi: Some(record.rssi),
                timestamp_ms: chrono::Utc::now().timestamp_millis(),
            };

            if tx.send(advert).await.is_err() {
                debug!("Engine went away, stopping replay");
                break;
            }
            sent += 1;
        }

        info!("Replay finished, {} advertisements delivered", sent);
        Ok(())
    }
}

/// Deterministic wobble applied to the synthetic RSSI so smoothing has
/// something to do. Values are dBm offsets cycled per advertisement.
const WALK_NOISE_DBM: [i32; 8] = [0, -2, 1, -1, 2, 0, -3, 1];

/// Synthesizes a walk toward a single beacon: approach, dwell at the
/// closest point, retreat. Useful for demos and as an engine test double;
/// fully deterministic so runs are reproducible.
pub struct WalkSource {
    pub room_id: String,
    pub node: u8,
    pub layout: crate::codec::TrailerLayout,
    /// Modeled reference power and path-loss exponent used to synthesize
    /// RSSI from the scripted distance
    pub reference_power_dbm: i32,
    pub path_loss_exponent: f64,
    pub advertise_interval_ms: u64,
    pub start_m: f64,
    pub closest_m: f64,
    pub walk_speed_mps: f64,
    pub dwell_ms: u64,
}

impl WalkSource {
    pub fn from_config(config: &crate::config::Config, room_id: &str, node: u8) -> Self {
        WalkSource {
            room_id: room_id.to_string(),
            node,
            layout: config.scan.trailer_layout,
            reference_power_dbm: config.calibration.reference_power_dbm,
            path_loss_exponent: config.calibration.path_loss_exponent,
            advertise_interval_ms: 500,
            start_m: 3.0,
            closest_m: 0.3,
            walk_speed_mps: 0.5,
            dwell_ms: 10_000,
        }
    }

    /// Scripted distance from the beacon at `elapsed_ms` into the walk.
    fn distance_at(&self, elapsed_ms: u64) -> Option<f64> {
        let approach_ms =
            ((self.start_m - self.closest_m) / self.walk_speed_mps * 1000.0) as u64;

        if elapsed_ms < approach_ms {
            let walked = self.walk_speed_mps * elapsed_ms as f64 / 1000.0;
            return Some(self.start_m - walked);
        }
        let elapsed_ms = elapsed_ms - approach_ms;

        if elapsed_ms < self.dwell_ms {
            return Some(self.closest_m);
        }
        let elapsed_ms = elapsed_ms - self.dwell_ms;

        // Retreat leg mirrors the approach, then the walk is over
        if elapsed_ms < approach_ms {
            let walked = self.walk_speed_mps * elapsed_ms as f64 / 1000.0;
            return Some(self.closest_m + walked);
        }

        None
    }

    fn rssi_at(&self, distance_m: f64, step: usize) -> i32 {
        let ideal = self.reference_power_dbm as f64
            - 10.0 * self.path_loss_exponent * distance_m.log10();
        ideal.round() as i32 + WALK_NOISE_DBM[step % WALK_NOISE_DBM.len()]
    }

    pub async fn run(
        &self,
        tx: mpsc::Sender<Advertisement>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        info!(
            "Simulated walk: {}-B{:02}, {:.1} m -> {:.1} m at {:.1} m/s",
            self.room_id, self.node, self.start_m, self.closest_m, self.walk_speed_mps
        );

        let payload = crate::codec::encode(
            &self.room_id,
            self.node,
            (1, 0),
            self.reference_power_dbm as i8,
            3700,
            self.layout,
        );

        let mut elapsed_ms = 0u64;
        let mut step = 0usize;

        while running.load(Ordering::SeqCst) {
            let distance_m = match self.distance_at(elapsed_ms) {
                Some(distance_m) => distance_m,
                None => break,
            };

            let advert = Advertisement {
                device_address: format!("SIM:{}:{:02}", self.room_id, self.node),
                service_data: payload.clone(),
                rssi: Some(self.rssi_at(distance_m, step)),
                timestamp_ms: chrono::Utc::now().timestamp_millis(),
            };

            if tx.send(advert).await.is_err() {
                break;
            }

            step += 1;
            elapsed_ms += self.advertise_interval_ms;
            sleep(Duration::from_millis(self.advertise_interval_ms)).await;
        }

        info!("Simulated walk finished after {} advertisements", step);
        Ok(())
    }
}

/// Which advertisement source to plug into the engine.
#[derive(Debug, Clone)]
pub enum SourceKind {
    Replay(PathBuf),
    Walk { room_id: String, node: u8 },
}

impl SourceKind {
    /// Spawn the source task feeding `tx`. The handle finishes when the
    /// stream is exhausted or the running flag drops.
    pub fn spawn(
        self,
        config: &crate::config::Config,
        tx: mpsc::Sender<Advertisement>,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        match self {
            SourceKind::Replay(path) => {
                let source = ReplaySource::new(path);
                tokio::spawn(async move {
                    if let Err(e) = source.run(tx, running).await {
                        error!("Replay source error: {}", e);
                    }
                })
            }
            SourceKind::Walk { room_id, node } => {
                let source = WalkSource::from_config(config, &room_id, node);
                tokio::spawn(async move {
                    if let Err(e) = source.run(tx, running).await {
                        error!("Walk source error: {}", e);
                    }
                })
            }
        }
    }
}

/// Parse a hex string (optionally whitespace/colon separated) into bytes.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();

    if cleaned.len() % 2 != 0 {
        bail!("hex string has odd length");
    }

    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte at offset {}", i))
        })
        .collect()
}

/// Format bytes as a lowercase hex string.
pub fn format_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_round_trip() {
        let bytes = vec![0x53, 0x41, 0x4C, 0x41, 0x00, 0xA4, 0x0E];
        assert_eq!(parse_hex(&format_hex(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_parse_hex_with_separators() {
        assert_eq!(parse_hex("a4:0e 01").unwrap(), vec![0xA4, 0x0E, 0x01]);
    }

    #[test]
    fn test_parse_hex_rejects_bad_input() {
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_replay_record_parses() {
        let line = r#"{"offset_ms": 500, "payload": "53414c415f320201 00a40e", "rssi": -61}"#;
        let record: ReplayRecord = serde_json::from_str(line).unwrap();

        assert_eq!(record.offset_ms, 500);
        assert_eq!(record.rssi, -61);
        assert_eq!(record.device, None);
        assert_eq!(parse_hex(&record.payload).unwrap().len(), 11);
    }

    #[test]
    fn test_walk_profile_shape() {
        let walk = WalkSource {
            room_id: "SALA_2".to_string(),
            node: 2,
            layout: crate::codec::TrailerLayout::Calibrated,
            reference_power_dbm: -52,
            path_loss_exponent: 2.5,
            advertise_interval_ms: 500,
            start_m: 3.0,
            closest_m: 0.3,
            walk_speed_mps: 0.5,
            dwell_ms: 2_000,
        };

        // Approach takes (3.0 - 0.3) / 0.5 = 5400 ms
        assert_eq!(walk.distance_at(0), Some(3.0));
        assert!(walk.distance_at(2_700).unwrap() < 3.0);
        assert_eq!(walk.distance_at(5_400), Some(0.3));
        assert_eq!(walk.distance_at(7_000), Some(0.3));
        // Retreating
        assert!(walk.distance_at(8_000).unwrap() > 0.3);
        // Walk over
        assert_eq!(walk.distance_at(13_000), None);
    }

    #[test]
    fn test_walk_rssi_tracks_reference_at_one_meter() {
        let walk = WalkSource {
            room_id: "SALA_2".to_string(),
            node: 2,
            layout: crate::codec::TrailerLayout::Calibrated,
            reference_power_dbm: -52,
            path_loss_exponent: 2.5,
            advertise_interval_ms: 500,
            start_m: 3.0,
            closest_m: 0.3,
            walk_speed_mps: 0.5,
            dwell_ms: 2_000,
        };

        // Step 0 carries zero wobble; at 1 m the model gives the reference
        assert_eq!(walk.rssi_at(1.0, 0), -52);
    }
}
