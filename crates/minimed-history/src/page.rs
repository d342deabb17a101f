//! History pages and the record walker.

use chrono::FixedOffset;
use minimed_packet::crc16;
use serde_json::Value;
use tracing::debug;

use crate::{EventType, HistoryError, HistoryEvent, PumpModel, Result};

/// Bytes of trailing CRC on every page.
const CRC_LEN: usize = 2;

/// Why a walk over a page ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// All bytes before the CRC were consumed.
    EndOfData,
    /// A type byte with no known record layout.
    UnknownType { offset: usize, code: u8 },
    /// The record at `offset` runs past the end of the data.
    Truncated { offset: usize, event_type: EventType },
}

/// A page of pump history as read from the pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    data: Vec<u8>,
    model: PumpModel,
}

impl HistoryPage {
    /// Size of a full page, CRC included.
    pub const SIZE: usize = 1024;

    pub fn new(data: Vec<u8>, model: PumpModel) -> Self {
        HistoryPage { data, model }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn model(&self) -> PumpModel {
        self.model
    }

    /// True when the trailing big-endian CRC-16 matches the rest of the page.
    pub fn is_crc_valid(&self) -> bool {
        is_crc_valid(&self.data)
    }

    pub fn crc_check(&self) -> Result<()> {
        crc_check(&self.data)
    }

    /// Walk the page's records. The walk does not check the CRC.
    pub fn decode(&self) -> HistoryEvents<'_> {
        decode(&self.data, self.model)
    }

    /// Check the CRC, then decode every record.
    pub fn validated_events(&self) -> Result<Vec<HistoryEvent>> {
        self.crc_check()?;
        Ok(self.decode().collect())
    }

    /// Events as a JSON array, oldest first.
    pub fn to_json(&self, offset: Option<FixedOffset>) -> Value {
        Value::Array(self.decode().map(|e| e.to_json(offset)).collect())
    }
}

/// True when the last two bytes of `data` are the CRC-16 of the rest.
pub fn is_crc_valid(data: &[u8]) -> bool {
    crc_check(data).is_ok()
}

fn crc_check(data: &[u8]) -> Result<()> {
    if data.len() < CRC_LEN {
        return Err(HistoryError::TooShort(data.len()));
    }
    let (body, tail) = data.split_at(data.len() - CRC_LEN);
    let stored = u16::from_be_bytes([tail[0], tail[1]]);
    let computed = crc16(body);
    if computed != stored {
        return Err(HistoryError::InvalidCrc { computed, stored });
    }
    Ok(())
}

/// Walk the records of a raw page. The last two bytes are taken as the CRC
/// and never decoded.
pub fn decode(data: &[u8], model: PumpModel) -> HistoryEvents<'_> {
    let body = &data[..data.len().saturating_sub(CRC_LEN)];
    HistoryEvents {
        data: body,
        model,
        pos: 0,
        pending: None,
        stop_reason: None,
    }
}

// ============================================================================
// Record Walker
// ============================================================================

/// Lazy iterator over the events of a page.
///
/// Zero bytes between records are skipped. The walk ends quietly at the first
/// unknown type byte or truncated record; [`HistoryEvents::stop_reason`]
/// reports which. An `UnabsorbedInsulin` record is never yielded: it is held
/// for the next `BolusNormal` and dropped if none follows.
#[derive(Debug, Clone)]
pub struct HistoryEvents<'a> {
    data: &'a [u8],
    model: PumpModel,
    pos: usize,
    pending: Option<crate::UnabsorbedInsulin>,
    stop_reason: Option<StopReason>,
}

impl<'a> HistoryEvents<'a> {
    /// Set once the walk has ended.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Byte offset of the next record.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn next_record(&mut self) -> Option<HistoryEvent> {
        if self.stop_reason.is_some() {
            return None;
        }
        while self.data.get(self.pos) == Some(&0) {
            self.pos += 1;
        }
        let Some(&code) = self.data.get(self.pos) else {
            self.stop_reason = Some(StopReason::EndOfData);
            return None;
        };
        let offset = self.pos;
        let Some(event_type) = EventType::from_code(code) else {
            debug!("Unknown history record type 0x{:02x} at offset {}", code, offset);
            self.stop_reason = Some(StopReason::UnknownType { offset, code });
            return None;
        };
        let rest = &self.data[offset..];
        let len = match event_type.length(self.model, rest) {
            Some(len) if len <= rest.len() => len,
            _ => {
                debug!("Truncated {} record at offset {}", event_type.name(), offset);
                self.stop_reason = Some(StopReason::Truncated { offset, event_type });
                return None;
            }
        };
        self.pos += len;
        Some(HistoryEvent::decode(event_type, self.model, &rest[..len]))
    }
}

impl Iterator for HistoryEvents<'_> {
    type Item = HistoryEvent;

    fn next(&mut self) -> Option<HistoryEvent> {
        loop {
            match self.next_record()? {
                HistoryEvent::UnabsorbedInsulin(unabsorbed) => self.pending = Some(unabsorbed),
                HistoryEvent::BolusNormal(mut bolus) => {
                    bolus.unabsorbed_insulin = self.pending.take();
                    return Some(HistoryEvent::BolusNormal(bolus));
                }
                event => return Some(event),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_crc(mut body: Vec<u8>) -> Vec<u8> {
        let crc = crc16(&body);
        body.extend_from_slice(&crc.to_be_bytes());
        body
    }

    #[test]
    fn test_crc_check() {
        let data = page_with_crc(hex::decode("010018001800440001b8571510").unwrap());
        assert!(is_crc_valid(&data));

        let mut bad = data.clone();
        bad[3] ^= 0x01;
        match crc_check(&bad) {
            Err(HistoryError::InvalidCrc { computed, stored }) => assert_ne!(computed, stored),
            other => panic!("Expected InvalidCrc, got {:?}", other),
        }
        assert_eq!(crc_check(&[0x01]), Err(HistoryError::TooShort(1)));
    }

    #[test]
    fn test_skips_zero_padding() {
        let data = page_with_crc(hex::decode("0000160101b857151000000000").unwrap());
        let events: Vec<_> = decode(&data, PumpModel::Model551).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), EventType::TempBasalDuration);
    }

    #[test]
    fn test_stop_reason() {
        let data = page_with_crc(hex::decode("160101b8571510ff0102").unwrap());
        let mut walk = decode(&data, PumpModel::Model551);
        assert!(walk.next().is_some());
        assert!(walk.next().is_none());
        assert_eq!(
            walk.stop_reason(),
            Some(StopReason::UnknownType {
                offset: 7,
                code: 0xff
            })
        );

        let data = page_with_crc(hex::decode("160101b8571510330a01").unwrap());
        let mut walk = decode(&data, PumpModel::Model551);
        assert_eq!(walk.by_ref().count(), 1);
        assert_eq!(
            walk.stop_reason(),
            Some(StopReason::Truncated {
                offset: 7,
                event_type: EventType::TempBasal
            })
        );
    }

    #[test]
    fn test_walk_is_restartable() {
        let data = page_with_crc(hex::decode("160101b8571510160201b8571510").unwrap());
        let walk = decode(&data, PumpModel::Model551);
        let first: Vec<_> = walk.clone().collect();
        let second: Vec<_> = walk.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_unabsorbed_is_held_for_next_bolus() {
        let data = page_with_crc(
            hex::decode("5c05501e00160101b8571510010018001800440001b8571510").unwrap(),
        );
        let events: Vec<_> = decode(&data, PumpModel::Model551).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), EventType::TempBasalDuration);
        match &events[1] {
            HistoryEvent::BolusNormal(bolus) => assert!(bolus.unabsorbed_insulin.is_some()),
            other => panic!("Expected BolusNormal, got {:?}", other),
        }
    }

    #[test]
    fn test_lone_unabsorbed_is_dropped() {
        let data = page_with_crc(hex::decode("5c05501e00160101b8571510").unwrap());
        let events: Vec<_> = decode(&data, PumpModel::Model551).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), EventType::TempBasalDuration);
    }
}
