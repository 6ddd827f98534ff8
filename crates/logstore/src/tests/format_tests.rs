use crate::*;

fn sample_header(generation: u32) -> Header {
    let mut files = [FileSlot::default(); FILES_MAX];
    files[0].set_name("events");
    files[0].version = 0x1234;
    files[0].start_block = 9;
    files[2].version = 0xFFFF;
    files[2].size = 1_000_000;

    Header {
        version: HEADER_VERSION,
        generation,
        write_block: 42,
        write_offset: 317,
        timestamp: 1_700_000_000,
        files,
    }
}

/// Frames a record of `file` into `block` at `offset` under `version`.
fn frame_record(block: &mut Block, offset: usize, file: u8, version: u16, payload: &[u8]) {
    let mut entry = EntryHeader {
        file,
        size: payload.len() as u16,
        available: payload.len() as u16,
        crc: 0,
    };
    entry.crc = record_crc(version, &entry, payload);
    entry.encode_into(&mut block[offset..offset + ENTRY_SIZE]);
    block[offset + ENTRY_SIZE..offset + ENTRY_SIZE + payload.len()].copy_from_slice(payload);
}

fn table_with_version(file: usize, version: u16) -> [FileSlot; FILES_MAX] {
    let mut files = [FileSlot::default(); FILES_MAX];
    files[file].version = version;
    files
}

// -------------------- Header codec --------------------

#[test]
fn header_roundtrip() {
    let header = sample_header(77);
    let mut buf = [0u8; HEADER_SIZE];
    header.encode_into(&mut buf);

    let decoded = Header::decode_validated(&buf).expect("valid crc");
    assert_eq!(decoded, header);
}

#[test]
fn header_any_corrupt_byte_fails_validation() {
    let header = sample_header(3);
    let mut buf = [0u8; HEADER_SIZE];
    header.encode_into(&mut buf);

    for i in 0..HEADER_SIZE {
        let mut corrupt = buf;
        corrupt[i] ^= 0x01;
        assert!(
            Header::decode_validated(&corrupt).is_none(),
            "flip at byte {} went undetected",
            i
        );
    }
}

#[test]
fn two_header_copies_fit_block_zero() {
    assert!(2 * HEADER_SIZE <= BLOCK_SIZE);
}

// -------------------- Entry codec --------------------

#[test]
fn entry_roundtrip() {
    let entry = EntryHeader {
        file: 3,
        size: 100,
        available: 200,
        crc: 0xBEEF,
    };
    let mut buf = [0u8; ENTRY_SIZE];
    entry.encode_into(&mut buf);
    assert_eq!(EntryHeader::decode(&buf), entry);
}

#[test]
fn file_slot_name_roundtrip_and_truncation() {
    let mut slot = FileSlot::default();
    slot.set_name("log");
    assert_eq!(slot.name_str(), "log");

    slot.set_name("a-name-longer-than-twelve");
    assert_eq!(slot.name_str(), "a-name-longe");
    assert_eq!(slot.name_str().len(), FILE_NAME_MAX);
}

// -------------------- Record validation predicate --------------------

#[test]
fn blank_block_is_not_a_record() {
    let block = [0u8; BLOCK_SIZE];
    let files = table_with_version(0, 1);
    assert_eq!(check_record(&block, 0, &files), RecordCheck::BadRange);
}

#[test]
fn well_formed_record_validates() {
    let mut block = [0u8; BLOCK_SIZE];
    let files = table_with_version(1, 0xABCD);
    frame_record(&mut block, 0, 1, 0xABCD, b"hello world");

    match check_record(&block, 0, &files) {
        RecordCheck::Valid(entry) => {
            assert_eq!(entry.file, 1);
            assert_eq!(entry.size, 11);
            assert_eq!(entry.available, 11);
        }
        other => panic!("expected Valid, got {:?}", other),
    }
}

#[test]
fn payload_bit_flip_is_stale() {
    let mut block = [0u8; BLOCK_SIZE];
    let files = table_with_version(0, 5);
    frame_record(&mut block, 0, 0, 5, b"payload");

    block[ENTRY_SIZE + 2] ^= 0x40;
    assert_eq!(check_record(&block, 0, &files), RecordCheck::Stale);
}

#[test]
fn version_bump_orphans_record() {
    let mut block = [0u8; BLOCK_SIZE];
    frame_record(&mut block, 0, 0, 5, b"old epoch");

    // Same bytes, newer epoch: the record is no longer recognized.
    let files = table_with_version(0, 6);
    assert_eq!(check_record(&block, 0, &files), RecordCheck::Stale);

    // Under its own epoch it still validates.
    let files = table_with_version(0, 5);
    assert!(matches!(check_record(&block, 0, &files), RecordCheck::Valid(_)));
}

#[test]
fn out_of_range_fields_are_rejected() {
    let files = table_with_version(0, 1);

    // file index beyond the table
    let mut block = [0u8; BLOCK_SIZE];
    frame_record(&mut block, 0, 0, 1, b"x");
    block[0] = FILES_MAX as u8;
    assert_eq!(check_record(&block, 0, &files), RecordCheck::BadRange);

    // size of zero
    let mut block = [0u8; BLOCK_SIZE];
    let entry = EntryHeader {
        file: 0,
        size: 0,
        available: 4,
        crc: 0,
    };
    entry.encode_into(&mut block[..ENTRY_SIZE]);
    assert_eq!(check_record(&block, 0, &files), RecordCheck::BadRange);

    // size exceeding available
    let entry = EntryHeader {
        file: 0,
        size: 10,
        available: 4,
        crc: 0,
    };
    entry.encode_into(&mut block[..ENTRY_SIZE]);
    assert_eq!(check_record(&block, 0, &files), RecordCheck::BadRange);

    // frame hanging past the block end
    let entry = EntryHeader {
        file: 0,
        size: 300,
        available: 300,
        crc: 0,
    };
    entry.encode_into(&mut block[400..400 + ENTRY_SIZE]);
    assert_eq!(check_record(&block, 400, &files), RecordCheck::BadRange);
}

#[test]
fn offset_too_close_to_block_end_is_rejected() {
    let block = [0u8; BLOCK_SIZE];
    let files = table_with_version(0, 1);
    assert_eq!(
        check_record(&block, BLOCK_SIZE - ENTRY_SIZE + 1, &files),
        RecordCheck::BadRange
    );
}

#[test]
fn record_crc_depends_on_seed_and_both_ranges() {
    let entry = EntryHeader {
        file: 0,
        size: 4,
        available: 4,
        crc: 0,
    };

    let base = record_crc(1, &entry, b"data");
    assert_ne!(base, record_crc(2, &entry, b"data"), "seed ignored");
    assert_ne!(base, record_crc(1, &entry, b"atad"), "payload ignored");

    let mut other = entry;
    other.available = 5;
    assert_ne!(base, record_crc(1, &other, b"data"), "frame ignored");
}
