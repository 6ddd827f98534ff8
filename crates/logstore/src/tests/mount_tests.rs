use super::helpers::*;
use crate::*;

fn bare_header(generation: u32) -> Header {
    Header {
        version: HEADER_VERSION,
        generation,
        write_block: FIRST,
        write_offset: 0,
        timestamp: 0,
        files: [FileSlot::default(); FILES_MAX],
    }
}

/// Plants header copies directly into block 0 of a fresh device.
fn device_with_copies(h0: Option<&Header>, h1: Option<&Header>) -> MemBlockDevice {
    let mut dev = MemBlockDevice::new(64);
    let block0 = dev.block_mut(0);
    if let Some(h) = h0 {
        h.encode_into(&mut block0[..HEADER_SIZE]);
    }
    if let Some(h) = h1 {
        h.encode_into(&mut block0[HEADER_SIZE..2 * HEADER_SIZE]);
    }
    dev
}

// -------------------- Fresh mounts --------------------

#[test]
fn wipe_starts_at_generation_zero_and_first_block() {
    let store = small_store();
    let stats = store.stats();

    assert_eq!(stats.generation, 0);
    assert_eq!(stats.active_copy, 0);
    assert_eq!(stats.write_block, FIRST);
    assert_eq!(stats.write_offset, 0);
}

#[test]
fn blank_media_synthesizes_header() {
    // No wipe requested, but neither copy validates on zeroed media.
    let dev = MemBlockDevice::new(64);
    let store = Store::mount(dev, Geometry::new(FIRST), &specs(), false).unwrap();

    assert_eq!(store.generation(), 0);
    assert_eq!(store.write_position(), (FIRST, 0));
}

#[test]
fn wipe_discards_valid_media() {
    let dev = device_with_copies(Some(&bare_header(41)), None);
    let store = Store::mount(dev, Geometry::new(FIRST), &specs(), true).unwrap();
    assert_eq!(store.generation(), 0);
}

#[test]
fn registered_names_and_settings_visible() {
    let store = small_store();

    let events = store.file_info(0).unwrap();
    assert_eq!(events.name, "events");
    assert_eq!(events.priority, 200);
    assert!(!events.sync);
    assert_eq!(events.size, 0);
    assert_eq!(events.start_block, FIRST);

    let metrics = store.file_info(1).unwrap();
    assert_eq!(metrics.name, "metrics");
    assert_eq!(metrics.priority, 100);
}

#[test]
fn too_many_specs_rejected() {
    let many: Vec<FileSpec> = (0..FILES_MAX + 1)
        .map(|i| FileSpec::new(format!("f{}", i), 100, false))
        .collect();
    let result = Store::mount(MemBlockDevice::new(64), Geometry::new(FIRST), &many, true);
    assert!(matches!(result, Err(StoreError::TooManyFiles(n)) if n == FILES_MAX + 1));
}

// -------------------- Copy selection --------------------

#[test]
fn both_valid_newest_generation_wins() {
    let dev = device_with_copies(Some(&bare_header(4)), Some(&bare_header(9)));
    let store = Store::mount(dev, Geometry::new(FIRST), &specs(), false).unwrap();
    assert_eq!(store.generation(), 9);
    assert_eq!(store.active_copy(), 1);

    let dev = device_with_copies(Some(&bare_header(9)), Some(&bare_header(4)));
    let store = Store::mount(dev, Geometry::new(FIRST), &specs(), false).unwrap();
    assert_eq!(store.generation(), 9);
    assert_eq!(store.active_copy(), 0);
}

#[test]
fn single_valid_copy_selected_regardless_of_generation() {
    // Copy 1 carries a huge generation but is torn; copy 0 must win.
    let mut dev = device_with_copies(Some(&bare_header(2)), Some(&bare_header(9000)));
    dev.block_mut(0)[HEADER_SIZE + 3] ^= 0xFF;

    let store = Store::mount(dev, Geometry::new(FIRST), &specs(), false).unwrap();
    assert_eq!(store.generation(), 2);
    assert_eq!(store.active_copy(), 0);

    // Mirror image: copy 0 torn, copy 1 intact.
    let mut dev = device_with_copies(Some(&bare_header(9000)), Some(&bare_header(2)));
    dev.block_mut(0)[3] ^= 0xFF;

    let store = Store::mount(dev, Geometry::new(FIRST), &specs(), false).unwrap();
    assert_eq!(store.generation(), 2);
    assert_eq!(store.active_copy(), 1);
}

// -------------------- Sync ping-pong --------------------

#[test]
fn sync_bumps_generation_and_toggles_copy() {
    let mut store = small_store();
    store.append(0, b"0123456789").unwrap();
    assert_eq!(store.write_position(), (FIRST, (ENTRY_SIZE + 10) as u16));

    store.sync().unwrap();
    assert_eq!(store.generation(), 1);
    assert_eq!(store.active_copy(), 1);

    store.sync().unwrap();
    assert_eq!(store.generation(), 2);
    assert_eq!(store.active_copy(), 0);
}

#[test]
fn sync_preserves_the_other_copy_on_media() {
    let mut store = small_store();
    store.sync().unwrap(); // generation 1 into slot 1
    store.sync().unwrap(); // generation 2 into slot 0

    let dev = store.into_device();
    let block0 = dev.block(0);
    let copy0 = Header::decode_validated(&block0[..HEADER_SIZE]).expect("copy 0 intact");
    let copy1 =
        Header::decode_validated(&block0[HEADER_SIZE..2 * HEADER_SIZE]).expect("copy 1 intact");

    assert_eq!(copy0.generation, 2);
    assert_eq!(copy1.generation, 1);
}

#[test]
fn remount_resumes_from_last_sync() {
    let mut store = small_store();
    store.append(0, b"carried over").unwrap();
    store.touch(1_700_000_123);
    store.sync().unwrap();
    let version_before = store.file_info(0).unwrap().version;

    let dev = store.into_device();
    let mut store = Store::mount(dev, Geometry::new(FIRST), &specs(), false).unwrap();

    assert_eq!(store.generation(), 1);
    assert_eq!(store.stats().timestamp, 1_700_000_123);
    assert_eq!(store.file_info(0).unwrap().version, version_before);
    assert_eq!(read_all(&mut store, 0), vec![b"carried over".to_vec()]);
}

#[test]
fn unsynced_appends_do_not_survive_remount() {
    let mut store = small_store();
    store.append(0, b"durable").unwrap();
    store.sync().unwrap();
    store.append(0, b"buffered only").unwrap();

    // Drop without sync: the second record never left the cache, and the
    // header still points one record in.
    let dev = store.into_device();
    let mut store = Store::mount(dev, Geometry::new(FIRST), &specs(), false).unwrap();
    assert_eq!(read_all(&mut store, 0), vec![b"durable".to_vec()]);
}

// -------------------- File-image persistence --------------------

#[test]
fn survives_reopen_of_file_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.img");

    {
        let dev = FileBlockDevice::create(&path, 64).unwrap();
        let mut store = Store::mount(dev, Geometry::new(FIRST), &specs(), true).unwrap();
        store.append(0, b"persisted").unwrap();
        store.sync().unwrap();
    }

    let dev = FileBlockDevice::open(&path).unwrap();
    let mut store = Store::mount(dev, Geometry::new(FIRST), &specs(), false).unwrap();
    assert_eq!(store.generation(), 1);
    assert_eq!(read_all(&mut store, 0), vec![b"persisted".to_vec()]);
}
