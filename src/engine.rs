use crate::codec::{decode, CodecError};
use crate::config::Config;
use crate::pipeline::{PipelineSnapshot, ProximityPipeline};
use crate::transport::Advertisement;
use anyhow::Result;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One decoded advertisement as logged/displayed by consumers.
#[derive(Debug, Clone)]
pub struct ScanLogEntry {
    pub timestamp_ms: i64,
    pub identity: String,
    pub room_id: String,
    pub raw_rssi: i32,
    pub smoothed_rssi: i32,
    pub distance_m: Option<f64>,
    pub battery_mv: u16,
}

/// Events published by the engine to its consumer (scan log or TUI).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A reading was decoded and folded into the pipeline
    Reading(ScanLogEntry),
    /// Pipeline output changed (after an ingest or a ticker pass)
    Snapshot(PipelineSnapshot),
    /// The advertisement source has no more readings
    SourceEnded,
}

/// Counters kept across one scan session.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineCounters {
    pub readings: u64,
    pub decode_errors: u64,
    pub ticks: u64,
}

/// Drives the proximity pipeline from an advertisement channel plus the
/// lifecycle ticker, serialized in a single event loop so a callback and a
/// ticker pass can never interleave mid-mutation. Stopping is atomic: once
/// the running flag drops, no further reading mutates state and the session
/// zone state is reset.
pub struct ScanEngine {
    config: Config,
    running: Arc<AtomicBool>,
}

impl ScanEngine {
    pub fn new(config: Config, running: Arc<AtomicBool>) -> Self {
        ScanEngine { config, running }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Consume advertisements until the source ends or the engine is
    /// stopped. Every pipeline mutation publishes a fresh snapshot.
    pub async fn run(
        &self,
        mut advert_rx: mpsc::Receiver<Advertisement>,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Result<EngineCounters> {
        self.running.store(true, Ordering::SeqCst);

        let mut pipeline = ProximityPipeline::from_config(&self.config);
        let mut counters = EngineCounters::default();
        let layout = self.config.scan.trailer_layout;
        let fallback_rssi = self.config.scan.fallback_rssi_dbm;

        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.lifecycle.tick_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            "Scan started (layout {:?}, tick {} ms)",
            layout, self.config.lifecycle.tick_interval_ms
        );

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                advert = advert_rx.recv() => {
                    let advert = match advert {
                        Some(advert) => advert,
                        None => {
                            debug!("Advertisement source closed");
                            let _ = event_tx.send(EngineEvent::SourceEnded).await;
                            break;
                        }
                    };

                    // The stop flag may have dropped while we were parked
                    // on recv; a late reading must not mutate state
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }

                    match decode(&advert.service_data, layout) {
                        Ok(decoded) => {
                            let raw_rssi = advert.rssi.unwrap_or(fallback_rssi);
                            let snapshot = pipeline.ingest(
                                &decoded,
                                raw_rssi,
                                &advert.device_address,
                                advert.timestamp_ms,
                            );
                            counters.readings += 1;

                            let entry = log_entry(&decoded.identity(), &snapshot, advert.timestamp_ms, raw_rssi);
                            let _ = event_tx.send(EngineEvent::Reading(entry)).await;
                            let _ = event_tx.send(EngineEvent::Snapshot(snapshot)).await;
                        }
                        Err(CodecError::TooShort { len, min }) => {
                            // Dropped locally; the beacon will advertise again
                            debug!("Dropping short payload: {} bytes, need {}", len, min);
                            counters.decode_errors += 1;
                        }
                        Err(CodecError::Malformed(reason)) => {
                            debug!("Dropping malformed payload: {}", reason);
                            counters.decode_errors += 1;
                        }
                    }
                }
                _ = ticker.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    let snapshot = pipeline.tick(now_ms);
                    counters.ticks += 1;
                    let _ = event_tx.send(EngineEvent::Snapshot(snapshot)).await;
                }
            }
        }

        // Stopping resets the session state so nothing leaks into the next
        // scan; the final counters describe this session only
        pipeline.reset_session();
        info!(
            "Scan stopped: {} readings, {} decode errors",
            counters.readings, counters.decode_errors
        );

        Ok(counters)
    }
}

fn log_entry(
    identity: &str,
    snapshot: &PipelineSnapshot,
    timestamp_ms: i64,
    raw_rssi: i32,
) -> ScanLogEntry {
    let reading = snapshot
        .beacons
        .iter()
        .find(|b| b.identity == identity)
        .expect("ingested beacon present in snapshot");

    ScanLogEntry {
        timestamp_ms,
        identity: reading.identity.clone(),
        room_id: reading.room_id.clone(),
        raw_rssi,
        smoothed_rssi: reading.smoothed_rssi,
        distance_m: snapshot.distance_m,
        battery_mv: reading.battery_mv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, TrailerLayout};

    fn advert(room: &str, node: u8, rssi: i32, now_ms: i64) -> Advertisement {
        Advertisement {
            device_address: "AA:BB:CC".to_string(),
            service_data: encode(room, node, (1, 0), -8, 3700, TrailerLayout::Calibrated),
            rssi: Some(rssi),
            timestamp_ms: now_ms,
        }
    }

    #[tokio::test]
    async fn test_engine_processes_stream_and_stops_on_source_end() {
        let config = Config::default();
        let running = Arc::new(AtomicBool::new(true));
        let engine = ScanEngine::new(config, running);

        let (advert_tx, advert_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(64);

        for i in 0..3 {
            advert_tx
                .send(advert("SALA_2", 2, -45, 1_000 + i * 500))
                .await
                .unwrap();
        }
        drop(advert_tx);

        let counters = engine.run(advert_rx, event_tx).await.unwrap();
        assert_eq!(counters.readings, 3);
        assert_eq!(counters.decode_errors, 0);

        let mut readings = 0;
        let mut snapshots = 0;
        let mut ended = false;
        while let Some(event) = event_rx.recv().await {
            match event {
                EngineEvent::Reading(entry) => {
                    assert_eq!(entry.identity, "SALA_2-B02");
                    readings += 1;
                }
                EngineEvent::Snapshot(_) => snapshots += 1,
                EngineEvent::SourceEnded => ended = true,
            }
        }
        assert_eq!(readings, 3);
        assert!(snapshots >= 3);
        assert!(ended);
    }

    #[tokio::test]
    async fn test_engine_drops_undecodable_payloads() {
        let config = Config::default();
        let running = Arc::new(AtomicBool::new(true));
        let engine = ScanEngine::new(config, running);

        let (advert_tx, advert_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(64);

        advert_tx
            .send(Advertisement {
                device_address: "AA".to_string(),
                service_data: vec![0x01, 0x02],
                rssi: Some(-50),
                timestamp_ms: 1_000,
            })
            .await
            .unwrap();
        advert_tx.send(advert("SALA_2", 2, -45, 2_000)).await.unwrap();
        drop(advert_tx);

        let counters = engine.run(advert_rx, event_tx).await.unwrap();
        assert_eq!(counters.readings, 1);
        assert_eq!(counters.decode_errors, 1);

        // The malformed frame produced no Reading event
        let mut readings = 0;
        while let Some(event) = event_rx.recv().await {
            if let EngineEvent::Reading(_) = event {
                readings += 1;
            }
        }
        assert_eq!(readings, 1);
    }

    #[tokio::test]
    async fn test_engine_honors_stop_flag() {
        let config = Config::default();
        let running = Arc::new(AtomicBool::new(true));
        let engine = ScanEngine::new(config, running.clone());

        let (advert_tx, advert_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = mpsc::channel(64);

        advert_tx.send(advert("SALA_2", 2, -45, 1_000)).await.unwrap();

        // Source stays open; the stop flag is the only way out
        let engine_running = engine.running_flag();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            engine_running.store(false, Ordering::SeqCst);
        });

        let counters = engine.run(advert_rx, event_tx).await.unwrap();
        assert_eq!(counters.readings, 1);
        drop(advert_tx);
    }
}
