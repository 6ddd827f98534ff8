use crate::*;

/// First usable data block for in-memory test devices.
pub const FIRST: u32 = 1;

/// Two demo files: "events" yields to "metrics" on slot reuse.
pub fn specs() -> Vec<FileSpec> {
    vec![
        FileSpec::new("events", 200, false),
        FileSpec::new("metrics", 100, false),
    ]
}

/// Wiped store on a 64-block in-memory device.
pub fn small_store() -> Store<MemBlockDevice> {
    store_with(64, Geometry::new(FIRST), &specs())
}

/// Wiped store with explicit geometry and specs.
pub fn store_with(
    blocks: u32,
    geometry: Geometry,
    specs: &[FileSpec],
) -> Store<MemBlockDevice> {
    Store::mount(MemBlockDevice::new(blocks), geometry, specs, true).unwrap()
}

/// Collects every remaining record of `file` from a fresh cursor.
pub fn read_all<D: BlockDevice>(store: &mut Store<D>, file: u8) -> Vec<Vec<u8>> {
    let mut cursor = RecordCursor::start();
    let mut records = Vec::new();
    while let Some(payload) = store.next_record(file, &mut cursor).unwrap() {
        records.push(payload);
    }
    records
}

/// A payload that, once framed, fills most of a block: 490 bytes leaves
/// 512 - (7 + 490) = 15 bytes of tail, too small for another frame.
pub fn near_block_payload(byte: u8) -> Vec<u8> {
    vec![byte; 490]
}
