//! End-to-end tests over real files: write a dataset, reopen it, and check
//! that meta, full reads, selective reads, and corruption detection behave
//! exactly as the format promises.

use rcf_core::format::{
    chunkset_header_size, COL_NAMES_HEADER_SIZE, HASH_SEED, TABLE_HEADER_SIZE,
};
use rcf_core::{
    Column, ColumnAttribute, ColumnType, DefaultColumnFactory, DoubleColumn, Error, FactorColumn,
    Int32Column, Int64Column, LogicalColumn, MemTable, ReadInfo, Store, StringEncoding, TimeScale,
};
use rcf_core::{ByteColumn, CharacterColumn};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("rcf_test_{name}.rcf"))
}

/// Deterministic pseudo-random 32-bit values from a simple LCG.
fn lcg(seed: u64) -> impl FnMut() -> u64 {
    let mut rng = seed;
    move || {
        rng = rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        rng >> 33
    }
}

fn int32_column(values: Vec<i32>) -> Column {
    Column::Int32(Int32Column {
        values,
        attribute: ColumnAttribute::Int32Base,
        scale: 0,
        annotation: String::new(),
    })
}

/// A dataset with one column of every type, missing values included.
fn all_types_table(n: usize) -> MemTable {
    let mut next = lcg(0xC0FFEE);
    let mut table = MemTable::new();

    let strings: Vec<String> = (0..n)
        .map(|i| match i % 5 {
            0 => String::new(),
            1 => format!("row {i}"),
            2 => "αβγ".to_string(),
            _ => format!("{}", next()),
        })
        .collect();
    table
        .push_column(
            "name",
            Column::Character(CharacterColumn {
                values: strings,
                encoding: StringEncoding::Utf8,
                attribute: ColumnAttribute::CharacterBase,
            }),
        )
        .unwrap();

    table
        .push_column(
            "grade",
            Column::Factor(FactorColumn {
                codes: (0..n).map(|i| (i % 4) as i32).collect(),
                levels: vec!["low".into(), "mid".into(), "high".into()],
                encoding: StringEncoding::Utf8,
                attribute: ColumnAttribute::FactorOrdered,
                annotation: String::new(),
            }),
        )
        .unwrap();

    table
        .push_column(
            "count",
            Column::Int32(Int32Column {
                values: (0..n)
                    .map(|i| {
                        if i % 11 == 0 {
                            rcf_core::types::MISSING_INT32
                        } else {
                            (next() as i32).wrapping_abs() % 100_000
                        }
                    })
                    .collect(),
                attribute: ColumnAttribute::Int32Base,
                scale: rcf_core::types::SCALE_KILO,
                annotation: String::new(),
            }),
        )
        .unwrap();

    table
        .push_column(
            "when",
            Column::Double(DoubleColumn {
                values: (0..n)
                    .map(|i| match i % 7 {
                        0 => rcf_core::types::missing_double(),
                        1 => -0.0,
                        _ => next() as f64 / 1000.0,
                    })
                    .collect(),
                attribute: ColumnAttribute::DoubleTimestampSeconds,
                scale: TimeScale::Seconds as i16,
                annotation: "Europe/Amsterdam".to_string(),
            }),
        )
        .unwrap();

    table
        .push_column(
            "flag",
            Column::Logical(LogicalColumn {
                values: (0..n)
                    .map(|i| match i % 3 {
                        0 => Some(false),
                        1 => Some(true),
                        _ => None,
                    })
                    .collect(),
                attribute: ColumnAttribute::LogicalBase,
                annotation: String::new(),
            }),
        )
        .unwrap();

    table
        .push_column(
            "id",
            Column::Int64(Int64Column {
                values: (0..n)
                    .map(|i| {
                        if i % 13 == 0 {
                            rcf_core::types::MISSING_INT64
                        } else {
                            (next() as i64) << 20
                        }
                    })
                    .collect(),
                attribute: ColumnAttribute::Int64Base,
                scale: 0,
                annotation: String::new(),
            }),
        )
        .unwrap();

    table
        .push_column(
            "raw",
            Column::Byte(ByteColumn {
                values: (0..n).map(|i| (i % 251) as u8).collect(),
                attribute: ColumnAttribute::ByteBase,
                annotation: String::new(),
            }),
        )
        .unwrap();

    table
}

/// Column equality with doubles compared bit-for-bit (NaN payloads count).
fn assert_columns_equal(expected: &Column, actual: &Column, what: &str) {
    match (expected, actual) {
        (Column::Double(a), Column::Double(b)) => {
            assert_eq!(a.attribute, b.attribute, "{what}: attribute");
            assert_eq!(a.scale, b.scale, "{what}: scale");
            assert_eq!(a.annotation, b.annotation, "{what}: annotation");
            assert_eq!(a.values.len(), b.values.len(), "{what}: length");
            for (i, (x, y)) in a.values.iter().zip(&b.values).enumerate() {
                assert_eq!(x.to_bits(), y.to_bits(), "{what}: row {i}");
            }
        }
        _ => assert_eq!(expected, actual, "{what}"),
    }
}

fn round_trip(table: &MemTable, compression: u8, name: &str) -> (MemTable, ReadInfo) {
    let store = Store::new(temp_path(name));
    store.write(table, compression).unwrap();

    let mut back = MemTable::new();
    let info = store.read_all(&mut back, &DefaultColumnFactory).unwrap();
    back.set_names(&info.selected_cols);
    (back, info)
}

// ── Round trips ────────────────────────────────────────────────────────────

#[test]
fn round_trip_all_types_all_compression_levels() {
    let table = all_types_table(1_000);
    for compression in [0u8, 10, 30, 50, 65, 75, 100] {
        let (back, info) =
            round_trip(&table, compression, &format!("all_types_{compression}"));
        assert_eq!(info.selected_cols, table.names(), "compression {compression}");
        for (col, (expected, actual)) in
            table.columns().iter().zip(back.columns()).enumerate()
        {
            assert_columns_equal(
                expected,
                actual,
                &format!("compression {compression}, column {col}"),
            );
        }
    }
}

#[test]
fn round_trip_single_row_every_type() {
    let table = all_types_table(1);
    let (back, info) = round_trip(&table, 100, "single_row");
    assert_eq!(info.selected_cols.len(), 7);
    for (expected, actual) in table.columns().iter().zip(back.columns()) {
        assert_columns_equal(expected, actual, "single row");
    }
}

#[test]
fn single_int_column_meta_and_range() {
    let mut table = MemTable::new();
    table.push_column("v", int32_column(vec![1, 2, 3])).unwrap();

    let store = Store::new(temp_path("single_int"));
    store.write(&table, 0).unwrap();

    let meta = store.meta().unwrap();
    assert_eq!(meta.n_rows, 3);
    assert_eq!(meta.n_cols(), 1);
    assert_eq!(meta.names, ["v"]);
    assert_eq!(meta.types, [ColumnType::Int32]);
    assert!(meta.keys.is_empty());

    let mut back = MemTable::new();
    store
        .read(&mut back, None, 2, Some(3), &DefaultColumnFactory)
        .unwrap();
    let Column::Int32(col) = &back.columns()[0] else {
        panic!("expected an int32 column");
    };
    assert_eq!(col.values, [2, 3]);
}

#[test]
fn double_payloads_survive_mid_compression() {
    let mut table = MemTable::new();
    table
        .push_column(
            "x",
            Column::Double(DoubleColumn {
                values: vec![f64::NAN, 1.5, -0.0],
                attribute: ColumnAttribute::DoubleBase,
                scale: 0,
                annotation: String::new(),
            }),
        )
        .unwrap();

    let (back, _) = round_trip(&table, 50, "double_payloads");
    let Column::Double(col) = &back.columns()[0] else {
        panic!("expected a double column");
    };
    assert_eq!(col.values[0].to_bits(), f64::NAN.to_bits());
    assert_eq!(col.values[1], 1.5);
    assert_eq!(col.values[2].to_bits(), (-0.0f64).to_bits());
}

#[test]
fn character_encoding_tag_preserved() {
    let mut table = MemTable::new();
    table
        .push_column(
            "s",
            Column::Character(CharacterColumn {
                values: vec!["".into(), "a".into(), "αβ".into()],
                encoding: StringEncoding::Utf8,
                attribute: ColumnAttribute::CharacterBase,
            }),
        )
        .unwrap();

    let (back, _) = round_trip(&table, 75, "char_encoding");
    let Column::Character(col) = &back.columns()[0] else {
        panic!("expected a character column");
    };
    assert_eq!(col.values, ["", "a", "αβ"]);
    assert_eq!(col.encoding, StringEncoding::Utf8);
}

#[test]
fn ordered_factor_round_trip() {
    let mut table = MemTable::new();
    table
        .push_column(
            "grade",
            Column::Factor(FactorColumn {
                codes: vec![1, 3, 0, 2],
                levels: vec!["low".into(), "mid".into(), "high".into()],
                encoding: StringEncoding::Native,
                attribute: ColumnAttribute::FactorOrdered,
                annotation: String::new(),
            }),
        )
        .unwrap();

    let (back, _) = round_trip(&table, 40, "ordered_factor");
    let Column::Factor(col) = &back.columns()[0] else {
        panic!("expected a factor column");
    };
    assert_eq!(col.codes, [1, 3, 0, 2]);
    assert_eq!(col.levels, ["low", "mid", "high"]);
    assert_eq!(col.attribute, ColumnAttribute::FactorOrdered);
}

// ── Selective reads ────────────────────────────────────────────────────────

#[test]
fn column_subset_in_selection_order() {
    let table = all_types_table(500);
    let store = Store::new(temp_path("subset_order"));
    store.write(&table, 30).unwrap();

    let mut back = MemTable::new();
    let info = store
        .read(
            &mut back,
            Some(&["id", "name"]),
            1,
            None,
            &DefaultColumnFactory,
        )
        .unwrap();
    assert_eq!(info.selected_cols, ["id", "name"]);
    assert!(matches!(back.columns()[0], Column::Int64(_)));
    assert!(matches!(back.columns()[1], Column::Character(_)));
    assert_columns_equal(table.column_by_name("id").unwrap(), &back.columns()[0], "id");
    assert_columns_equal(
        table.column_by_name("name").unwrap(),
        &back.columns()[1],
        "name",
    );
}

#[test]
fn row_ranges_across_block_boundaries() {
    // 10_000 int32 rows span three 4096-element blocks; strings span many
    // more bulk blocks. Ranges are chosen to hit block starts, interiors,
    // spans, and the final row.
    let mut next = lcg(7);
    let values: Vec<i32> = (0..10_000).map(|_| next() as i32).collect();
    let strings: Vec<String> = (0..10_000).map(|i| format!("row-{i}-{}", next())).collect();

    let mut table = MemTable::new();
    table.push_column("v", int32_column(values.clone())).unwrap();
    table
        .push_column(
            "s",
            Column::Character(CharacterColumn {
                values: strings.clone(),
                encoding: StringEncoding::Native,
                attribute: ColumnAttribute::CharacterBase,
            }),
        )
        .unwrap();

    for compression in [0u8, 45, 90] {
        let store = Store::new(temp_path(&format!("ranges_{compression}")));
        store.write(&table, compression).unwrap();

        for (from, to) in [
            (1u64, 100u64),
            (4096, 4097),
            (4000, 8500),
            (9999, 10_000),
            (10_000, 10_000),
            (1, 10_000),
        ] {
            let mut back = MemTable::new();
            store
                .read(&mut back, None, from, Some(to), &DefaultColumnFactory)
                .unwrap();
            let lo = (from - 1) as usize;
            let hi = to as usize;
            let Column::Int32(v) = &back.columns()[0] else {
                panic!("expected int32");
            };
            let Column::Character(s) = &back.columns()[1] else {
                panic!("expected character");
            };
            assert_eq!(v.values, values[lo..hi], "rows [{from}, {to}] c={compression}");
            assert_eq!(s.values, strings[lo..hi], "rows [{from}, {to}] c={compression}");
        }
    }
}

// ── Keys ───────────────────────────────────────────────────────────────────

#[test]
fn meta_reports_key_positions() {
    let mut table = all_types_table(50);
    table.set_keys(vec![2, 0]).unwrap();

    let store = Store::new(temp_path("meta_keys"));
    store.write(&table, 0).unwrap();

    let meta = store.meta().unwrap();
    assert_eq!(meta.keys, [2, 0]);
    assert_eq!(meta.version, rcf_core::format::FORMAT_VERSION);
}

#[test]
fn key_index_preserved_as_prefix_only() {
    let mut table = all_types_table(50);
    // keys: count (2), flag (4), id (5)
    table.set_keys(vec![2, 4, 5]).unwrap();

    let store = Store::new(temp_path("key_prefix"));
    store.write(&table, 0).unwrap();

    // all keys selected, shuffled selection order
    let mut back = MemTable::new();
    let info = store
        .read(
            &mut back,
            Some(&["id", "count", "flag"]),
            1,
            None,
            &DefaultColumnFactory,
        )
        .unwrap();
    assert_eq!(info.key_index, [1, 2, 0]);

    // middle key dropped: only the prefix before it survives
    let mut back = MemTable::new();
    let info = store
        .read(
            &mut back,
            Some(&["count", "id"]),
            1,
            None,
            &DefaultColumnFactory,
        )
        .unwrap();
    assert_eq!(info.key_index, [0]);

    // first key dropped: nothing survives
    let mut back = MemTable::new();
    let info = store
        .read(
            &mut back,
            Some(&["flag", "id"]),
            1,
            None,
            &DefaultColumnFactory,
        )
        .unwrap();
    assert!(info.key_index.is_empty());
}

// ── Error paths ────────────────────────────────────────────────────────────

#[test]
fn bad_selections_and_ranges() {
    let mut table = MemTable::new();
    table.push_column("v", int32_column(vec![1, 2, 3])).unwrap();
    let store = Store::new(temp_path("bad_requests"));
    store.write(&table, 0).unwrap();

    let mut sink = MemTable::new();
    let err = store
        .read(&mut sink, Some(&["missing"]), 1, None, &DefaultColumnFactory)
        .unwrap_err();
    assert!(matches!(err, Error::ColumnNotFound(name) if name == "missing"));

    let err = store
        .read(&mut sink, None, 0, None, &DefaultColumnFactory)
        .unwrap_err();
    assert!(matches!(err, Error::BadRange(_)));

    let err = store
        .read(&mut sink, None, 3, Some(2), &DefaultColumnFactory)
        .unwrap_err();
    assert!(matches!(err, Error::BadRange(_)));

    let err = store
        .read(&mut sink, None, 4, None, &DefaultColumnFactory)
        .unwrap_err();
    assert!(matches!(err, Error::BadRange(_)));
}

#[test]
fn empty_datasets_rejected() {
    let store = Store::new(temp_path("empty"));

    let table = MemTable::new();
    assert!(matches!(store.write(&table, 0), Err(Error::NoColumns)));

    let mut table = MemTable::new();
    table.push_column("v", int32_column(Vec::new())).unwrap();
    assert!(matches!(store.write(&table, 0), Err(Error::NoData)));
}

#[test]
fn compression_out_of_range_rejected() {
    let mut table = MemTable::new();
    table.push_column("v", int32_column(vec![1])).unwrap();
    let store = Store::new(temp_path("bad_compression"));
    assert!(matches!(
        store.write(&table, 101),
        Err(Error::BadCompression(101))
    ));
}

#[test]
fn missing_file_is_open_error() {
    let store = Store::new(temp_path("does_not_exist_anywhere"));
    let _ = std::fs::remove_file(store.path());
    assert!(matches!(store.meta(), Err(Error::OpenRead(_))));
}

// ── Corruption detection ───────────────────────────────────────────────────

/// Byte length of a character column stream written at compression 0.
fn char_stream_len(values: &[&str], offsets_block: usize, char_block: usize) -> usize {
    let n = values.len();
    let bulk: usize = values.iter().map(|v| v.len()).sum();
    let offsets_stream = 16 + 8 * n.div_ceil(offsets_block) + 4 * n;
    let bulk_stream = 16 + 8 * bulk.div_ceil(char_block) + bulk;
    16 + offsets_stream + bulk_stream
}

fn write_corruptible(name: &str) -> (Store, Vec<u8>) {
    let mut table = MemTable::new();
    table.push_column("a", int32_column(vec![1, 2, 3])).unwrap();
    let store = Store::new(temp_path(name));
    store.write(&table, 0).unwrap();
    let bytes = std::fs::read(store.path()).unwrap();
    (store, bytes)
}

fn flip_and_restore(store: &Store, bytes: &[u8], offset: usize) -> Vec<u8> {
    let mut corrupted = bytes.to_vec();
    corrupted[offset] ^= 0x01;
    std::fs::write(store.path(), &corrupted).unwrap();
    corrupted
}

#[test]
fn table_header_corruption_means_not_rcf() {
    let (store, bytes) = write_corruptible("corrupt_a");
    flip_and_restore(&store, &bytes, 10);
    assert!(matches!(store.meta(), Err(Error::NotRcfFile)));
}

#[test]
fn chunkset_corruption_is_damaged_header() {
    let (store, bytes) = write_corruptible("corrupt_c");
    // chunkset body starts 8 bytes into node C at offset 44
    flip_and_restore(&store, &bytes, TABLE_HEADER_SIZE + 13);
    assert!(matches!(store.meta(), Err(Error::DamagedHeader("chunkset"))));
}

#[test]
fn col_names_header_corruption_is_damaged_header() {
    let (store, bytes) = write_corruptible("corrupt_names");
    let names_off = TABLE_HEADER_SIZE + chunkset_header_size(1);
    flip_and_restore(&store, &bytes, names_off + 10);
    assert!(matches!(
        store.meta(),
        Err(Error::DamagedHeader("column names"))
    ));
}

#[test]
fn key_index_corruption_is_damaged_header() {
    let mut table = MemTable::new();
    table.push_column("a", int32_column(vec![1, 2])).unwrap();
    table.push_column("b", int32_column(vec![3, 4])).unwrap();
    table.set_keys(vec![1]).unwrap();
    let store = Store::new(temp_path("corrupt_b"));
    store.write(&table, 0).unwrap();

    let bytes = std::fs::read(store.path()).unwrap();
    // key index body: the i32 position at offset 44 + 8
    flip_and_restore(&store, &bytes, TABLE_HEADER_SIZE + 8);
    assert!(matches!(
        store.meta(),
        Err(Error::DamagedHeader("key index"))
    ));
}

#[test]
fn chunk_index_corruption_fails_read_but_not_meta() {
    let (store, bytes) = write_corruptible("corrupt_d");
    let names_len = char_stream_len(&["a"], 4096, 16384);
    let d_off = TABLE_HEADER_SIZE + chunkset_header_size(1) + COL_NAMES_HEADER_SIZE + names_len;
    flip_and_restore(&store, &bytes, d_off + 9);

    // meta never touches node D
    assert!(store.meta().is_ok());

    let mut sink = MemTable::new();
    let err = store.read_all(&mut sink, &DefaultColumnFactory).unwrap_err();
    assert!(matches!(err, Error::DamagedChunkIndex("chunk index")));
}

#[test]
fn data_chunk_corruption_fails_read() {
    let (store, bytes) = write_corruptible("corrupt_e");
    let names_len = char_stream_len(&["a"], 4096, 16384);
    let d_off = TABLE_HEADER_SIZE + chunkset_header_size(1) + COL_NAMES_HEADER_SIZE + names_len;
    let e_off = d_off + rcf_core::format::CHUNK_INDEX_SIZE;
    flip_and_restore(&store, &bytes, e_off + 25);

    let mut sink = MemTable::new();
    let err = store.read_all(&mut sink, &DefaultColumnFactory).unwrap_err();
    assert!(matches!(err, Error::DamagedChunkIndex("data chunk")));
}

#[test]
fn every_metadata_byte_is_hash_protected() {
    // With one column and no keys the metadata region is A | C | names
    // header; flipping any byte of it (hash slots included) must fail meta.
    let (store, bytes) = write_corruptible("exhaustive_flip");
    let meta_len = TABLE_HEADER_SIZE + chunkset_header_size(1) + COL_NAMES_HEADER_SIZE;
    for off in 0..meta_len {
        let mut corrupted = bytes.clone();
        corrupted[off] ^= 0x01;
        std::fs::write(store.path(), &corrupted).unwrap();
        assert!(store.meta().is_err(), "byte flip at {off} went undetected");
    }
}

#[test]
fn future_version_is_rejected() {
    let (store, bytes) = write_corruptible("future_version");
    // raise versionMax and re-seal the table header so only the version
    // check can fail
    let mut doctored = bytes.clone();
    doctored[24..28].copy_from_slice(&99u32.to_le_bytes());
    let hash = xxhash_rust::xxh64::xxh64(&doctored[8..TABLE_HEADER_SIZE], HASH_SEED);
    doctored[0..8].copy_from_slice(&hash.to_le_bytes());
    std::fs::write(store.path(), &doctored).unwrap();

    assert!(matches!(
        store.meta(),
        Err(Error::UnsupportedVersion {
            required: 99,
            supported: _
        })
    ));
}

// ── File-level properties ──────────────────────────────────────────────────

#[test]
fn identical_inputs_produce_identical_files() {
    let table = all_types_table(300);
    for compression in [0u8, 30, 80] {
        let store_a = Store::new(temp_path(&format!("idem_a_{compression}")));
        let store_b = Store::new(temp_path(&format!("idem_b_{compression}")));
        store_a.write(&table, compression).unwrap();
        store_b.write(&table, compression).unwrap();
        assert_eq!(
            std::fs::read(store_a.path()).unwrap(),
            std::fs::read(store_b.path()).unwrap(),
            "compression {compression}"
        );
    }
}

#[test]
fn compression_shrinks_redundant_data() {
    // highly repetitive data so the advisory ordering is overwhelmingly safe
    let mut table = MemTable::new();
    table
        .push_column(
            "v",
            int32_column((0..100_000).map(|i| i % 16).collect()),
        )
        .unwrap();

    let mut sizes = Vec::new();
    for compression in [0u8, 50, 100] {
        let store = Store::new(temp_path(&format!("mono_{compression}")));
        store.write(&table, compression).unwrap();
        sizes.push(std::fs::metadata(store.path()).unwrap().len());
    }
    eprintln!("sizes at c=0/50/100: {sizes:?}");
    assert!(sizes[1] < sizes[0], "c=50 should beat raw on redundant data");
    assert!(sizes[2] <= sizes[1], "c=100 should not lose to c=50");
}
