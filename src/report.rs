use crate::engine::{EngineCounters, ScanLogEntry};
use crate::pipeline::PipelineSnapshot;
use anyhow::Result;
use chrono::{TimeZone, Utc};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Session-level aggregates for the end-of-scan summary.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub started_ms: i64,
    pub identities: BTreeSet<String>,
    pub rooms: BTreeSet<String>,
    pub deepest_zone: u8,
    pub last_distance_m: Option<f64>,
}

impl SessionStats {
    pub fn new(started_ms: i64) -> Self {
        SessionStats {
            started_ms,
            ..Default::default()
        }
    }

    pub fn record_reading(&mut self, entry: &ScanLogEntry) {
        self.identities.insert(entry.identity.clone());
        self.rooms.insert(entry.room_id.clone());
    }

    pub fn record_snapshot(&mut self, snapshot: &PipelineSnapshot) {
        self.deepest_zone = self.deepest_zone.max(snapshot.progress_zone);
        if snapshot.distance_m.is_some() {
            self.last_distance_m = snapshot.distance_m;
        }
    }
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn write_session_summary(
        stats: &SessionStats,
        counters: &EngineCounters,
        output: Option<&Path>,
    ) -> Result<()> {
        let mut writer: Box<dyn Write> = match output {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(io::stdout()),
        };

        writeln!(writer, "========================================")?;
        writeln!(writer, "        DOCENT SCAN SESSION SUMMARY")?;
        writeln!(writer, "========================================")?;
        writeln!(writer)?;
        writeln!(writer, "Started:  {}", format_timestamp_ms(stats.started_ms))?;
        writeln!(
            writer,
            "Finished: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(writer)?;
        writeln!(writer, "Readings processed: {}", counters.readings)?;
        writeln!(writer, "Payloads dropped:   {}", counters.decode_errors)?;
        writeln!(writer, "Lifecycle passes:   {}", counters.ticks)?;
        writeln!(writer)?;

        writeln!(writer, "Beacons seen: {}", stats.identities.len())?;
        for identity in &stats.identities {
            writeln!(writer, "  - {}", identity)?;
        }
        if !stats.rooms.is_empty() {
            writeln!(
                writer,
                "Rooms: {}",
                stats.rooms.iter().cloned().collect::<Vec<_>>().join(", ")
            )?;
        }
        writeln!(writer)?;

        writeln!(writer, "Deepest zone reached: {}", stats.deepest_zone)?;
        if let Some(distance) = stats.last_distance_m {
            writeln!(writer, "Final distance: {}", format_distance(distance))?;
        }

        writeln!(writer)?;
        writeln!(writer, "========================================")?;

        Ok(())
    }
}

/// Realtime scan log line, one per decoded reading.
pub fn print_reading_realtime(entry: &ScanLogEntry, current_zone: u8) {
    let timestamp = Utc::now().format("%H:%M:%S");
    let distance = entry
        .distance_m
        .map(format_distance)
        .unwrap_or_else(|| "N/A".to_string());

    println!(
        "[{}] {} | {:4}dBm (smoothed {:4}) | ~{} | zone {} | {}mV",
        timestamp,
        entry.identity,
        entry.raw_rssi,
        entry.smoothed_rssi,
        distance,
        current_zone,
        entry.battery_mv
    );
}

/// Format distance for display
pub fn format_distance(distance_m: f64) -> String {
    if distance_m < 10.0 {
        format!("{:.1}m", distance_m)
    } else {
        format!("{:.0}m", distance_m)
    }
}

fn format_timestamp_ms(ts_ms: i64) -> String {
    Utc.timestamp_millis_opt(ts_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.34), "0.3m");
        assert_eq!(format_distance(1.26), "1.3m");
        assert_eq!(format_distance(12.4), "12m");
    }

    #[test]
    fn test_stats_track_deepest_zone() {
        let mut stats = SessionStats::new(0);

        let mut snapshot = PipelineSnapshot::default();
        snapshot.progress_zone = 2;
        stats.record_snapshot(&snapshot);
        snapshot.progress_zone = 1;
        stats.record_snapshot(&snapshot);

        assert_eq!(stats.deepest_zone, 2);
    }

    #[test]
    fn test_stats_dedupe_identities() {
        let mut stats = SessionStats::new(0);
        let entry = ScanLogEntry {
            timestamp_ms: 0,
            identity: "SALA_2-B02".to_string(),
            room_id: "SALA_2".to_string(),
            raw_rssi: -60,
            smoothed_rssi: -60,
            distance_m: None,
            battery_mv: 3700,
        };

        stats.record_reading(&entry);
        stats.record_reading(&entry);
        assert_eq!(stats.identities.len(), 1);
        assert!(stats.rooms.contains("SALA_2"));
    }
}
