use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service-data trailer layout, by beacon firmware generation.
///
/// The payload is a variable-length UTF-8 room identifier followed by a
/// fixed-size trailer. The trailer is anchored at the END of the buffer, so
/// the layout in the air must be known up front; it cannot be sniffed from
/// the payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailerLayout {
    /// 5-byte trailer: `[node][fw_major][fw_minor][battery_mv:2 LE]`
    Legacy,
    /// 6-byte trailer: `[node][fw_major][fw_minor][tx_power:i8][battery_mv:2 LE]`
    #[default]
    Calibrated,
}

impl TrailerLayout {
    pub fn trailer_len(self) -> usize {
        match self {
            TrailerLayout::Legacy => 5,
            TrailerLayout::Calibrated => 6,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// One successfully decoded beacon advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReading {
    pub room_id: String,
    pub node: u8,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    /// Tx power byte from the calibrated trailer. Informational only; the
    /// ranging reference power comes from calibration config, never from
    /// the payload.
    pub tx_power_payload: Option<i8>,
    pub battery_mv: u16,
}

impl DecodedReading {
    /// Stable beacon key: room id plus zero-padded node number, e.g. `SALA_2-B02`.
    pub fn identity(&self) -> String {
        format!("{}-B{:02}", self.room_id, self.node)
    }

    pub fn firmware_version(&self) -> String {
        format!("{}.{}", self.firmware_major, self.firmware_minor)
    }
}

/// Decode a beacon service-data payload.
///
/// # Arguments
/// * `payload` - Raw service data bytes as delivered by the transport
/// * `layout` - Trailer layout of the deployed firmware generation
///
/// # Returns
/// The decoded reading, or a `CodecError` the caller should drop locally.
/// Decode failures are never fatal; the beacon will advertise again.
pub fn decode(payload: &[u8], layout: TrailerLayout) -> Result<DecodedReading, CodecError> {
    let min = layout.trailer_len();
    if payload.len() < min {
        return Err(CodecError::TooShort {
            len: payload.len(),
            min,
        });
    }

    let (head, trailer) = payload.split_at(payload.len() - min);

    if head.is_empty() {
        return Err(CodecError::Malformed("empty room id".to_string()));
    }

    let room_id = std::str::from_utf8(head)
        .map_err(|_| CodecError::Malformed("room id is not valid UTF-8".to_string()))?
        .to_string();

    let reading = match layout {
        TrailerLayout::Legacy => DecodedReading {
            room_id,
            node: trailer[0],
            firmware_major: trailer[1],
            firmware_minor: trailer[2],
            tx_power_payload: None,
            battery_mv: u16::from_le_bytes([trailer[3], trailer[4]]),
        },
        TrailerLayout::Calibrated => DecodedReading {
            room_id,
            node: trailer[0],
            firmware_major: trailer[1],
            firmware_minor: trailer[2],
            tx_power_payload: Some(trailer[3] as i8),
            battery_mv: u16::from_le_bytes([trailer[4], trailer[5]]),
        },
    };

    Ok(reading)
}

/// Encode a service-data payload. Counterpart of [`decode`], used by the
/// simulated-walk source and by tests.
pub fn encode(
    room_id: &str,
    node: u8,
    firmware: (u8, u8),
    tx_power: i8,
    battery_mv: u16,
    layout: TrailerLayout,
) -> Vec<u8> {
    let mut payload = room_id.as_bytes().to_vec();
    payload.push(node);
    payload.push(firmware.0);
    payload.push(firmware.1);
    if layout == TrailerLayout::Calibrated {
        payload.push(tx_power as u8);
    }
    payload.extend_from_slice(&battery_mv.to_le_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_legacy_trailer() {
        // Room "SALA_2", node 2, fw 1.0, battery 3748 mV
        let payload = [b"SALA_2".as_slice(), &[0x02, 0x01, 0x00, 0xA4, 0x0E]].concat();

        let reading = decode(&payload, TrailerLayout::Legacy).unwrap();
        assert_eq!(reading.room_id, "SALA_2");
        assert_eq!(reading.node, 2);
        assert_eq!(reading.firmware_version(), "1.0");
        assert_eq!(reading.battery_mv, 3748);
        assert_eq!(reading.tx_power_payload, None);
        assert_eq!(reading.identity(), "SALA_2-B02");
    }

    #[test]
    fn test_decode_calibrated_trailer() {
        // Tx power -12 dBm as a signed byte
        let payload = [b"HALL_1".as_slice(), &[0x07, 0x02, 0x03, 0xF4, 0xA4, 0x0E]].concat();

        let reading = decode(&payload, TrailerLayout::Calibrated).unwrap();
        assert_eq!(reading.room_id, "HALL_1");
        assert_eq!(reading.node, 7);
        assert_eq!(reading.firmware_version(), "2.3");
        assert_eq!(reading.tx_power_payload, Some(-12));
        assert_eq!(reading.battery_mv, 3748);
        assert_eq!(reading.identity(), "HALL_1-B07");
    }

    #[test]
    fn test_encode_decode_round_trip() {
        for layout in [TrailerLayout::Legacy, TrailerLayout::Calibrated] {
            let payload = encode("SALA_2", 2, (1, 4), -8, 3700, layout);
            let reading = decode(&payload, layout).unwrap();

            assert_eq!(reading.room_id, "SALA_2");
            assert_eq!(reading.node, 2);
            assert_eq!(reading.firmware_major, 1);
            assert_eq!(reading.firmware_minor, 4);
            assert_eq!(reading.battery_mv, 3700);
            if layout == TrailerLayout::Calibrated {
                assert_eq!(reading.tx_power_payload, Some(-8));
            }
        }
    }

    #[test]
    fn test_too_short() {
        for len in 0..5 {
            let payload = vec![0u8; len];
            assert!(matches!(
                decode(&payload, TrailerLayout::Legacy),
                Err(CodecError::TooShort { .. })
            ));
            assert!(matches!(
                decode(&payload, TrailerLayout::Calibrated),
                Err(CodecError::TooShort { .. })
            ));
        }

        // 5 bytes is enough for a legacy trailer but not a calibrated one
        let payload = vec![0x41, 0x01, 0x01, 0x00, 0x00];
        assert!(matches!(
            decode(&payload, TrailerLayout::Calibrated),
            Err(CodecError::TooShort { min: 6, .. })
        ));
    }

    #[test]
    fn test_empty_room_id_is_malformed() {
        // Exactly one trailer, nothing left over for the room id
        let payload = vec![0x02, 0x01, 0x00, 0xA4, 0x0E];
        assert!(matches!(
            decode(&payload, TrailerLayout::Legacy),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_room_id_is_malformed() {
        let payload = [&[0xFF, 0xFE][..], &[0x02, 0x01, 0x00, 0xA4, 0x0E]].concat();
        assert!(matches!(
            decode(&payload, TrailerLayout::Legacy),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_identity_zero_padding() {
        let payload = encode("SALA_2", 12, (1, 0), 0, 3700, TrailerLayout::Legacy);
        let reading = decode(&payload, TrailerLayout::Legacy).unwrap();
        assert_eq!(reading.identity(), "SALA_2-B12");
    }
}
