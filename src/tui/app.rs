use crate::engine::{EngineEvent, ScanLogEntry};
use crate::narration::GuideNarrator;
use crate::pipeline::PipelineSnapshot;
use crate::report::SessionStats;
use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::mpsc;

/// Maximum entries in the scan log ring buffer
const MAX_SCAN_LOG_ENTRIES: usize = 500;

/// Main application state
pub struct App {
    /// Whether the app is running
    pub running: bool,

    /// Latest pipeline output
    pub snapshot: PipelineSnapshot,

    /// Scan log entries (ring buffer)
    pub scan_log: VecDeque<ScanLogEntry>,

    /// Scan log scroll offset (0 = bottom/newest)
    pub log_scroll: usize,

    /// Session aggregates
    pub stats: SessionStats,
    pub readings: u64,

    /// Guide narration
    pub narrator: GuideNarrator,
    pub narration_enabled: bool,
    pub narration_line: Option<String>,

    /// Calibration used for the per-row distance column
    pub reference_power_dbm: i32,
    pub path_loss_exponent: f64,

    /// Source state
    pub source_ended: bool,

    /// Help overlay visible
    pub show_help: bool,

    /// Session start, for the elapsed clock
    pub started: Instant,

    /// Event receiver
    pub event_rx: mpsc::Receiver<EngineEvent>,
}

impl App {
    pub fn new(
        event_rx: mpsc::Receiver<EngineEvent>,
        narrator: GuideNarrator,
        narration_enabled: bool,
        reference_power_dbm: i32,
        path_loss_exponent: f64,
    ) -> Self {
        App {
            running: true,
            snapshot: PipelineSnapshot::default(),
            scan_log: VecDeque::with_capacity(MAX_SCAN_LOG_ENTRIES),
            log_scroll: 0,
            stats: SessionStats::new(chrono::Utc::now().timestamp_millis()),
            readings: 0,
            narrator,
            narration_enabled,
            narration_line: None,
            reference_power_dbm,
            path_loss_exponent,
            source_ended: false,
            show_help: false,
            started: Instant::now(),
            event_rx,
        }
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Reading(entry) => {
                self.readings += 1;
                self.stats.record_reading(&entry);

                self.scan_log.push_back(entry);
                while self.scan_log.len() > MAX_SCAN_LOG_ENTRIES {
                    self.scan_log.pop_front();
                }
            }
            EngineEvent::Snapshot(snapshot) => {
                self.stats.record_snapshot(&snapshot);

                if self.narration_enabled && snapshot.current_zone > 0 {
                    if let Some(strongest) = snapshot.strongest() {
                        let room_id = strongest.room_id.clone();
                        if let Some(line) =
                            self.narrator.announce(&room_id, snapshot.current_zone)
                        {
                            self.narration_line = Some(line.to_string());
                        }
                    }
                }

                self.snapshot = snapshot;
            }
            EngineEvent::SourceEnded => {
                self.source_ended = true;
            }
        }
    }

    pub fn scroll_up(&mut self) {
        if self.log_scroll < self.scan_log.len().saturating_sub(1) {
            self.log_scroll += 1;
        }
    }

    pub fn scroll_down(&mut self) {
        self.log_scroll = self.log_scroll.saturating_sub(1);
    }

    pub fn toggle_narration(&mut self) {
        self.narration_enabled = !self.narration_enabled;
        if !self.narration_enabled {
            self.narrator.reset();
        }
    }

    /// Repeat the current zone's narration on request.
    pub fn repeat_narration(&mut self) {
        if !self.narration_enabled || self.snapshot.current_zone == 0 {
            return;
        }
        let room_id = match self.snapshot.strongest() {
            Some(strongest) => strongest.room_id.clone(),
            None => return,
        };
        self.narrator.reset();
        if let Some(line) = self.narrator.announce(&room_id, self.snapshot.current_zone) {
            self.narration_line = Some(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::GuideNarrator;
    use crate::registry::{ActivityState, BeaconReading};

    fn app() -> App {
        let (_tx, rx) = mpsc::channel(8);
        App::new(
            rx,
            GuideNarrator::new(Default::default()),
            false,
            -52,
            2.5,
        )
    }

    fn entry(identity: &str) -> ScanLogEntry {
        ScanLogEntry {
            timestamp_ms: 0,
            identity: identity.to_string(),
            room_id: "SALA_2".to_string(),
            raw_rssi: -60,
            smoothed_rssi: -61,
            distance_m: Some(1.0),
            battery_mv: 3700,
        }
    }

    fn snapshot_with_zone(zone: u8) -> PipelineSnapshot {
        PipelineSnapshot {
            beacons: vec![BeaconReading {
                identity: "SALA_2-B02".to_string(),
                room_id: "SALA_2".to_string(),
                node: 2,
                raw_rssi: -60,
                smoothed_rssi: -61,
                firmware_version: "1.0".to_string(),
                tx_power_payload: None,
                battery_mv: 3700,
                device_address: "AA".to_string(),
                last_seen_ms: 0,
                activity: ActivityState::Active,
            }],
            current_zone: zone,
            progress_zone: zone,
            distance_m: Some(1.0),
        }
    }

    #[test]
    fn test_scan_log_is_bounded() {
        let mut app = app();
        for i in 0..(MAX_SCAN_LOG_ENTRIES + 20) {
            app.handle_event(EngineEvent::Reading(entry(&format!("B{:04}", i))));
        }
        assert_eq!(app.scan_log.len(), MAX_SCAN_LOG_ENTRIES);
        assert_eq!(app.readings as usize, MAX_SCAN_LOG_ENTRIES + 20);
    }

    #[test]
    fn test_snapshot_updates_state() {
        let mut app = app();
        app.handle_event(EngineEvent::Snapshot(snapshot_with_zone(2)));
        assert_eq!(app.snapshot.current_zone, 2);
        assert_eq!(app.stats.deepest_zone, 2);
    }

    #[test]
    fn test_source_ended_flag() {
        let mut app = app();
        app.handle_event(EngineEvent::SourceEnded);
        assert!(app.source_ended);
    }
}
