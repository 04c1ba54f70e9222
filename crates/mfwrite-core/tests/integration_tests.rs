//! Integration tests for mfwrite-core
//!
//! These tests drive the complete check, plan and write pipeline through a
//! scripted in-memory tag.

use mfwrite_core::{
    factory, AccessConditions, Block, BlockReason, BlockTarget, Config, ConflictPosition,
    Diagnostics, Dump, Error, ExecutionOutcome, Key, KeyMap, KeyPair, KeyType, Positions,
    Result, TagConnector, TagGeometry, TagSession, TagWriter, WriteError, WriteProgress,
    WriteStatus,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const KEY_A: Key = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5];
const KEY_B: Key = [0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5];

/// Shared state of the scripted tag
#[derive(Default)]
struct TagState {
    access: BTreeMap<u8, AccessConditions>,
    dead_sectors: BTreeSet<u8>,
    fail_at: Option<(u8, u8)>,
    written: Vec<(u8, u8, Block, KeyType)>,
    sessions_open: usize,
    sessions_closed: usize,
}

struct ScriptedTag {
    geometry: TagGeometry,
    state: Arc<Mutex<TagState>>,
}

struct ScriptedSession {
    geometry: TagGeometry,
    state: Arc<Mutex<TagState>>,
}

impl TagConnector for ScriptedTag {
    fn connect(&self) -> Result<Box<dyn TagSession + Send>> {
        self.state.lock().unwrap().sessions_open += 1;
        Ok(Box::new(ScriptedSession {
            geometry: self.geometry,
            state: Arc::clone(&self.state),
        }))
    }
}

impl TagSession for ScriptedSession {
    fn tag_geometry(&self) -> TagGeometry {
        self.geometry
    }

    fn classify_writability(
        &mut self,
        positions: &Positions,
        _keys: &KeyMap,
    ) -> Result<Diagnostics> {
        let state = self.state.lock().unwrap();
        let mut diagnostics = Diagnostics::new();
        for (sector, blocks) in positions {
            if state.dead_sectors.contains(sector) {
                continue;
            }
            let access = state
                .access
                .get(sector)
                .copied()
                .unwrap_or(AccessConditions::TRANSPORT);
            let entry = diagnostics.entry(*sector).or_default();
            for block in blocks {
                entry.insert(*block, access.diagnostic(*sector, *block));
            }
        }
        Ok(diagnostics)
    }

    fn write_block(
        &mut self,
        sector: u8,
        block: u8,
        data: &Block,
        _key: &Key,
        use_as_key_b: bool,
    ) -> WriteStatus {
        let mut state = self.state.lock().unwrap();
        if state.fail_at == Some((sector, block)) {
            return WriteStatus::Failure;
        }
        let key_type = if use_as_key_b { KeyType::B } else { KeyType::A };
        state.written.push((sector, block, *data, key_type));
        WriteStatus::Success
    }

    fn close(&mut self) {
        self.state.lock().unwrap().sessions_closed += 1;
    }
}

fn scripted(geometry: TagGeometry) -> (ScriptedTag, Arc<Mutex<TagState>>) {
    let state = Arc::new(Mutex::new(TagState::default()));
    let tag = ScriptedTag {
        geometry,
        state: Arc::clone(&state),
    };
    (tag, state)
}

fn full_keys(sectors: u8) -> KeyMap {
    KeyMap::uniform(0..sectors, KeyPair::new(KEY_A, KEY_B))
}

fn sample_dump() -> Dump {
    let mut dump = Dump::new();
    for sector in 1..4 {
        for block in 0..3 {
            dump.insert(sector, block, [sector * 10 + block; 16]).unwrap();
        }
    }
    dump
}

// ============================================================================
// Planning against a tag
// ============================================================================

#[test]
fn test_plan_transport_tag() {
    let (tag, state) = scripted(TagGeometry::CLASSIC_1K);
    let writer = TagWriter::new(tag);

    let prepared = writer.prepare_dump(sample_dump(), &full_keys(16)).unwrap();

    assert_eq!(prepared.plan.len(), 9);
    assert!(prepared.report.is_empty());
    // Transport configuration makes key B readable: key A is used throughout
    assert!(prepared.plan.iter().all(|(_, _, key)| key == KeyType::A));

    let state = state.lock().unwrap();
    assert_eq!(state.sessions_open, 1);
    assert_eq!(state.sessions_closed, 1);
    assert!(state.written.is_empty());
}

#[test]
fn test_plan_mixed_access_conditions() {
    let (tag, state) = scripted(TagGeometry::CLASSIC_1K);
    {
        let mut state = state.lock().unwrap();
        // Sector 2: block 0 key B only, block 1 read-only, block 2 either key
        state.access.insert(
            2,
            AccessConditions::from_groups([0b100, 0b111, 0b000, 0b011]),
        );
        state.dead_sectors.insert(3);
    }
    let writer = TagWriter::new(tag);
    let keys = full_keys(16);

    let prepared = writer.prepare_dump(sample_dump(), &keys).unwrap();

    assert_eq!(prepared.plan.get(2, 0), Some(KeyType::B));
    assert_eq!(prepared.plan.get(2, 1), None);
    assert_eq!(prepared.plan.get(2, 2), Some(KeyType::A));
    assert!(!prepared.plan.contains_sector(3));

    let report: Vec<_> = prepared
        .report
        .entries()
        .iter()
        .map(|c| (c.position, c.reason))
        .collect();
    assert_eq!(
        report,
        vec![
            (
                ConflictPosition::Block {
                    sector: 2,
                    block: 1
                },
                BlockReason::BlockReadOnly
            ),
            (
                ConflictPosition::Sector { sector: 3 },
                BlockReason::InvalidAccessConditionsOrSectorDead
            ),
        ]
    );
}

#[test]
fn test_plan_trailer_with_read_only_access_bits() {
    let (tag, state) = scripted(TagGeometry::CLASSIC_1K);
    state
        .lock()
        .unwrap()
        .access
        .insert(5, AccessConditions::from_groups([0, 0, 0, 0b100]));
    let writer = TagWriter::new(tag);

    let mut dump = Dump::new();
    dump.insert(5, 3, factory::DEFAULT_TRAILER).unwrap();
    let keys = KeyMap::new().with(5, KeyPair::only_b(KEY_B));

    let prepared = writer.prepare_dump(dump, &keys).unwrap();
    assert!(prepared.plan.is_empty());
    assert_eq!(
        prepared.report.entries()[0].reason,
        BlockReason::AccessConditionsReadOnly
    );
}

#[test]
fn test_dump_larger_than_tag() {
    let (tag, state) = scripted(TagGeometry::MINI);
    let writer = TagWriter::new(tag);

    assert!(writer.prepare_dump(sample_dump(), &full_keys(5)).is_ok());

    let mut dump = sample_dump();
    dump.insert(7, 0, [0; 16]).unwrap();
    let result = writer.prepare_dump(dump, &full_keys(8));
    assert!(matches!(result, Err(Error::GeometryMismatch { .. })));

    let state = state.lock().unwrap();
    assert_eq!(state.sessions_open, state.sessions_closed);
}

// ============================================================================
// Writing
// ============================================================================

#[test]
fn test_write_dump_in_order() {
    let (tag, state) = scripted(TagGeometry::CLASSIC_1K);
    let writer = TagWriter::new(tag);
    let keys = full_keys(16);

    let prepared = writer.prepare_dump(sample_dump(), &keys).unwrap();
    let outcome = writer.write_dump(&prepared, &keys, None).unwrap();
    assert_eq!(outcome, ExecutionOutcome::Completed { blocks_written: 9 });

    let state = state.lock().unwrap();
    let order: Vec<_> = state.written.iter().map(|(s, b, _, _)| (*s, *b)).collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
    assert_eq!(state.written[0].2, [10; 16]);
    assert_eq!(state.sessions_open, 2);
    assert_eq!(state.sessions_closed, 2);
}

#[test]
fn test_write_dump_aborts_and_keeps_earlier_blocks() {
    let (tag, state) = scripted(TagGeometry::CLASSIC_1K);
    state.lock().unwrap().fail_at = Some((2, 1));
    let writer = TagWriter::new(tag);
    let keys = full_keys(16);

    let prepared = writer.prepare_dump(sample_dump(), &keys).unwrap();
    let result = writer.write_dump(&prepared, &keys, None);
    assert!(matches!(
        result,
        Err(Error::WriteAborted {
            sector: 2,
            block: 1,
            source: WriteError::Failed { .. }
        })
    ));

    let state = state.lock().unwrap();
    assert_eq!(state.written.len(), 4);
    assert_eq!(state.sessions_open, state.sessions_closed);
}

#[test]
fn test_write_dump_with_progress() {
    let (tag, _state) = scripted(TagGeometry::CLASSIC_1K);
    let writer = TagWriter::new(tag);
    let keys = full_keys(16);
    let prepared = writer.prepare_dump(sample_dump(), &keys).unwrap();

    let updates = Arc::new(AtomicUsize::new(0));
    let updates_clone = Arc::clone(&updates);
    writer
        .write_dump(
            &prepared,
            &keys,
            Some(Box::new(move |progress: &WriteProgress| {
                updates_clone.fetch_add(1, Ordering::SeqCst);
                assert!(progress.percentage() <= 100.0);
            })),
        )
        .unwrap();

    assert_eq!(updates.load(Ordering::SeqCst), 9);
}

#[test]
fn test_spawn_write_delivers_one_result() {
    let (tag, state) = scripted(TagGeometry::CLASSIC_1K);
    let writer = TagWriter::new(tag);
    let keys = full_keys(16);

    let prepared = writer.prepare_dump(sample_dump(), &keys).unwrap();
    let outcome = writer.spawn_write(prepared, keys, None).wait().unwrap();
    assert_eq!(outcome, ExecutionOutcome::Completed { blocks_written: 9 });
    assert_eq!(state.lock().unwrap().written.len(), 9);
}

#[test]
fn test_manufacturer_block_only_with_opt_in() {
    let mut dump = Dump::new();
    dump.insert(0, 0, [0xEE; 16]).unwrap();
    dump.insert(0, 1, [0x01; 16]).unwrap();
    let keys = full_keys(16);

    let (tag, _) = scripted(TagGeometry::CLASSIC_1K);
    let prepared = TagWriter::new(tag).prepare_dump(dump.clone(), &keys).unwrap();
    assert_eq!(prepared.plan.get(0, 0), None);
    assert!(prepared.report.is_empty());

    // Opting in still yields a read-only conflict on a regular tag
    let (tag, _) = scripted(TagGeometry::CLASSIC_1K);
    let config = Config::new().allow_manufacturer_write(true);
    let prepared = TagWriter::with_config(tag, config)
        .prepare_dump(dump, &keys)
        .unwrap();
    assert_eq!(prepared.report.entries()[0].reason, BlockReason::BlockReadOnly);
}

// ============================================================================
// Factory format and single blocks
// ============================================================================

#[test]
fn test_factory_format_4k() {
    let (tag, state) = scripted(TagGeometry::CLASSIC_4K);
    let writer = TagWriter::new(tag);
    let keys = full_keys(40);

    let prepared = writer.prepare_factory_format(&keys).unwrap();
    assert_eq!(prepared.plan.len(), 32 * 4 + 8 * 16 - 1);

    writer.write_dump(&prepared, &keys, None).unwrap();
    let state = state.lock().unwrap();
    let last = state.written.last().unwrap();
    assert_eq!((last.0, last.1), (39, 15));
    assert_eq!(last.2, factory::LAST_SECTOR_TRAILER);
}

#[test]
fn test_single_block_write() {
    let (tag, state) = scripted(TagGeometry::CLASSIC_1K);
    let writer = TagWriter::new(tag);

    let target = BlockTarget::new(6, 2).unwrap();
    writer
        .write_block(target, &[0x55; 16], &KeyPair::new(KEY_A, KEY_B))
        .unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.written, vec![(6, 2, [0x55; 16], KeyType::B)]);
    assert_eq!(state.sessions_closed, 1);
}

#[test]
fn test_json_inputs() {
    let dump = Dump::from_json(r#"{"1":{"0":"00112233445566778899AABBCCDDEEFF"}}"#).unwrap();
    let keys = KeyMap::from_json(r#"{"1":{"a":"A0A1A2A3A4A5"}}"#).unwrap();

    let (tag, _) = scripted(TagGeometry::CLASSIC_1K);
    let prepared = TagWriter::new(tag).prepare_dump(dump, &keys).unwrap();
    assert_eq!(prepared.plan.get(1, 0), Some(KeyType::A));
    assert_eq!(
        serde_json::to_string(&prepared.plan).unwrap(),
        r#"{"1":{"0":"A"}}"#
    );
}
