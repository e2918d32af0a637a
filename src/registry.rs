use crate::codec::DecodedReading;
use crate::smoothing::RssiSmoother;
use log::debug;
use std::collections::HashMap;

/// Beacon lifecycle state. Entries past the expiry threshold are removed
/// outright rather than kept in a third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Active,
    Inactive,
}

/// Latest known observation of one physical beacon.
#[derive(Debug, Clone)]
pub struct BeaconReading {
    pub identity: String,
    pub room_id: String,
    pub node: u8,
    /// Most recent raw sample, dBm
    pub raw_rssi: i32,
    /// Filtered value, dBm
    pub smoothed_rssi: i32,
    pub firmware_version: String,
    /// Informational tx power from the payload, when the firmware sends one
    pub tx_power_payload: Option<i8>,
    pub battery_mv: u16,
    pub device_address: String,
    pub last_seen_ms: i64,
    pub activity: ActivityState,
}

impl BeaconReading {
    pub fn is_active(&self) -> bool {
        self.activity == ActivityState::Active
    }
}

/// Keyed store of the latest reading per beacon identity.
///
/// Owns both the identity map and the per-identity RSSI filter arena, so
/// evicting a beacon always discards its filter state in the same step. The
/// lifecycle thresholds satisfy `inactivity_ms < expiry_ms` (checked at the
/// config boundary).
#[derive(Debug)]
pub struct BeaconRegistry {
    beacons: HashMap<String, BeaconReading>,
    smoother: RssiSmoother,
    inactivity_ms: i64,
    expiry_ms: i64,
}

impl BeaconRegistry {
    pub fn new(smoother: RssiSmoother, inactivity_ms: i64, expiry_ms: i64) -> Self {
        BeaconRegistry {
            beacons: HashMap::new(),
            smoother,
            inactivity_ms,
            expiry_ms,
        }
    }

    /// Insert or replace the entry for a decoded reading. The entry is
    /// always marked Active with `last_seen` refreshed.
    pub fn upsert(
        &mut self,
        decoded: &DecodedReading,
        raw_rssi: i32,
        device_address: &str,
        now_ms: i64,
    ) -> &BeaconReading {
        let identity = decoded.identity();
        let smoothed_rssi = self.smoother.smooth(&identity, raw_rssi);

        let reading = BeaconReading {
            identity: identity.clone(),
            room_id: decoded.room_id.clone(),
            node: decoded.node,
            raw_rssi,
            smoothed_rssi,
            firmware_version: decoded.firmware_version(),
            tx_power_payload: decoded.tx_power_payload,
            battery_mv: decoded.battery_mv,
            device_address: device_address.to_string(),
            last_seen_ms: now_ms,
            activity: ActivityState::Active,
        };

        self.beacons.insert(identity.clone(), reading);
        &self.beacons[&identity]
    }

    /// Age all entries against the wall clock. Returns true when any entry
    /// changed state or was removed, so the caller knows to recompute.
    pub fn tick(&mut self, now_ms: i64) -> bool {
        let mut changed = false;

        let expired: Vec<String> = self
            .beacons
            .values()
            .filter(|b| now_ms - b.last_seen_ms > self.expiry_ms)
            .map(|b| b.identity.clone())
            .collect();

        for identity in expired {
            debug!("Beacon expired: {}", identity);
            self.beacons.remove(&identity);
            self.smoother.forget(&identity);
            changed = true;
        }

        for beacon in self.beacons.values_mut() {
            if beacon.activity == ActivityState::Active
                && now_ms - beacon.last_seen_ms > self.inactivity_ms
            {
                debug!("Beacon inactive: {}", beacon.identity);
                beacon.activity = ActivityState::Inactive;
                changed = true;
            }
        }

        changed
    }

    /// All tracked entries, strongest smoothed signal first. Ties break on
    /// identity ordering so the selection is deterministic.
    pub fn snapshot_sorted_by_strength(&self) -> Vec<BeaconReading> {
        let mut entries: Vec<BeaconReading> = self.beacons.values().cloned().collect();
        entries.sort_by(|a, b| {
            b.smoothed_rssi
                .cmp(&a.smoothed_rssi)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    /// Drop every entry and all filter state. Called on session stop.
    pub fn clear(&mut self) {
        self.beacons.clear();
        self.smoother.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode, TrailerLayout};

    fn reading(room: &str, node: u8) -> DecodedReading {
        let payload = encode(room, node, (1, 0), -8, 3700, TrailerLayout::Calibrated);
        decode(&payload, TrailerLayout::Calibrated).unwrap()
    }

    fn registry() -> BeaconRegistry {
        BeaconRegistry::new(RssiSmoother::new(5, 1.0), 30_000, 120_000)
    }

    #[test]
    fn test_upsert_marks_active_and_refreshes() {
        let mut reg = registry();
        reg.upsert(&reading("SALA_2", 1), -60, "AA:BB", 1_000);

        let mut now = 1_000;
        now += 31_000;
        assert!(reg.tick(now));
        assert_eq!(
            reg.snapshot_sorted_by_strength()[0].activity,
            ActivityState::Inactive
        );

        // A fresh reading reactivates the entry
        reg.upsert(&reading("SALA_2", 1), -61, "AA:BB", now);
        let snapshot = reg.snapshot_sorted_by_strength();
        assert_eq!(snapshot[0].activity, ActivityState::Active);
        assert_eq!(snapshot[0].last_seen_ms, now);
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let mut reg = registry();
        reg.upsert(&reading("SALA_2", 1), -60, "AA:BB", 0);

        assert!(reg.tick(120_001));
        assert!(reg.snapshot_sorted_by_strength().is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_expiry_discards_filter_state() {
        let mut reg = registry();
        reg.upsert(&reading("SALA_2", 1), -90, "AA:BB", 0);
        reg.tick(120_001);

        // Reappearance seeds from the fresh sample, not the stale -90
        let entry = reg.upsert(&reading("SALA_2", 1), -50, "AA:BB", 130_000);
        assert_eq!(entry.smoothed_rssi, -50);
    }

    #[test]
    fn test_tick_reports_no_change_when_idle() {
        let mut reg = registry();
        reg.upsert(&reading("SALA_2", 1), -60, "AA:BB", 0);

        assert!(!reg.tick(1_000));
        assert!(reg.tick(30_001)); // inactivity transition
        assert!(!reg.tick(30_002)); // already inactive, nothing new
    }

    #[test]
    fn test_snapshot_sorted_strongest_first() {
        let mut reg = registry();
        reg.upsert(&reading("SALA_2", 1), -72, "AA", 0);
        reg.upsert(&reading("SALA_2", 2), -55, "BB", 0);
        reg.upsert(&reading("SALA_1", 9), -63, "CC", 0);

        let ids: Vec<String> = reg
            .snapshot_sorted_by_strength()
            .into_iter()
            .map(|b| b.identity)
            .collect();
        assert_eq!(ids, vec!["SALA_2-B02", "SALA_1-B09", "SALA_2-B01"]);
    }

    #[test]
    fn test_snapshot_ties_break_on_identity() {
        let mut reg = registry();
        reg.upsert(&reading("SALA_2", 2), -60, "AA", 0);
        reg.upsert(&reading("SALA_2", 1), -60, "BB", 0);

        let ids: Vec<String> = reg
            .snapshot_sorted_by_strength()
            .into_iter()
            .map(|b| b.identity)
            .collect();
        assert_eq!(ids, vec!["SALA_2-B01", "SALA_2-B02"]);
    }
}
