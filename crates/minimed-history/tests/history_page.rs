//! Whole-page decoding tests.

use minimed_history::{decode, EventType, HistoryEvent, HistoryPage, PumpModel, StopReason};
use minimed_packet::crc16;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const BOLUS: &str = "010018001800440001b8571510";
const TEMP_BASAL: &str = "331e01b857151000";
const TEMP_DURATION: &str = "160101b8571510";
const UNABSORBED: &str = "5c08501e00286410";

fn records(parts: &[&str]) -> Vec<u8> {
    parts.iter().flat_map(|p| hex::decode(p).unwrap()).collect()
}

/// A full page: records, zero fill, then the CRC.
fn full_page(parts: &[&str]) -> Vec<u8> {
    let mut page = records(parts);
    page.resize(HistoryPage::SIZE - 2, 0);
    let crc = crc16(&page);
    page.extend_from_slice(&crc.to_be_bytes());
    page
}

// ============================================================================
// Valid Pages
// ============================================================================

#[test]
fn test_full_page_decodes() {
    let page = HistoryPage::new(
        full_page(&[TEMP_BASAL, TEMP_DURATION, BOLUS]),
        PumpModel::Model551,
    );
    assert!(page.is_crc_valid());

    let events = page.validated_events().expect("should validate");
    let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(
        types,
        vec![
            EventType::TempBasal,
            EventType::TempBasalDuration,
            EventType::BolusNormal
        ]
    );

    let mut walk = page.decode();
    assert_eq!(walk.by_ref().count(), 3);
    assert_eq!(walk.stop_reason(), Some(StopReason::EndOfData));
}

#[test]
fn test_unabsorbed_attaches_to_bolus() {
    let page = HistoryPage::new(full_page(&[UNABSORBED, BOLUS]), PumpModel::Model551);
    let events: Vec<_> = page.decode().collect();
    assert_eq!(events.len(), 1);

    let HistoryEvent::BolusNormal(bolus) = &events[0] else {
        panic!("Expected BolusNormal, got {:?}", events[0]);
    };
    let appended = bolus
        .unabsorbed_insulin
        .as_ref()
        .expect("should carry unabsorbed insulin");
    assert_eq!(appended.records.len(), 2);

    let json = page.to_json(None);
    assert_eq!(json[0]["appended"]["data"][1]["age"], 356);
}

#[test]
fn test_decode_is_deterministic() {
    let raw = full_page(&[UNABSORBED, BOLUS, TEMP_BASAL, TEMP_DURATION]);
    let first = HistoryPage::new(raw.clone(), PumpModel::Model554).to_json(None);
    let second = HistoryPage::new(raw, PumpModel::Model554).to_json(None);
    assert_eq!(first, second);
}

// ============================================================================
// Damaged Pages
// ============================================================================

#[test]
fn test_stray_trailing_bytes_fail_crc() {
    let mut raw = records(&[TEMP_BASAL, TEMP_DURATION, BOLUS]);
    let crc = crc16(&raw);
    raw.extend_from_slice(&(!crc).to_be_bytes());

    let page = HistoryPage::new(raw, PumpModel::Model551);
    assert_eq!(page.decode().count(), 3);
    assert!(!page.is_crc_valid());
    assert!(page.validated_events().is_err());
}

#[test]
fn test_unknown_type_stops_walk() {
    let mut raw = records(&[TEMP_BASAL, "ee", TEMP_DURATION]);
    raw.extend_from_slice(&[0, 0]);
    let mut walk = decode(&raw, PumpModel::Model551);

    assert_eq!(walk.by_ref().count(), 1);
    assert_eq!(
        walk.stop_reason(),
        Some(StopReason::UnknownType {
            offset: 8,
            code: 0xee
        })
    );
}

#[test]
fn test_truncation_yields_prefix() {
    let layouts: [&[&str]; 2] = [
        &[TEMP_BASAL, TEMP_DURATION, BOLUS, TEMP_DURATION],
        &[TEMP_DURATION, UNABSORBED, BOLUS, TEMP_BASAL],
    ];
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for parts in layouts {
        let raw = full_page(parts);
        let body_len = records(parts).len();
        let complete: Vec<_> = decode(&raw, PumpModel::Model551).collect();

        for _ in 0..32 {
            // Cut inside the records; the two bytes kept at the end stand in
            // for the CRC.
            let cut = rng.gen_range(2..body_len + 2);
            let partial: Vec<_> = decode(&raw[..cut], PumpModel::Model551).collect();
            assert!(partial.len() <= complete.len());
            assert_eq!(partial[..], complete[..partial.len()]);
        }
    }
}

#[test]
fn test_cut_inside_bolus_drops_held_unabsorbed() {
    let raw = full_page(&[UNABSORBED, BOLUS]);
    let complete: Vec<_> = decode(&raw, PumpModel::Model551).collect();
    assert_eq!(complete.len(), 1);
    assert_eq!(complete[0].event_type(), EventType::BolusNormal);

    // Unabsorbed record, five bytes of the bolus, two stand-in CRC bytes.
    let mut walk = decode(&raw[..8 + 5 + 2], PumpModel::Model551);
    assert_eq!(walk.by_ref().count(), 0);
    assert_eq!(
        walk.stop_reason(),
        Some(StopReason::Truncated {
            offset: 8,
            event_type: EventType::BolusNormal
        })
    );
}
