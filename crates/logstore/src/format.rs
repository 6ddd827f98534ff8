//! On-media layout: superblock copies, file table slots, and record frames.
//!
//! All integers are little-endian and packed with no padding.
//!
//! ## Block 0 — two superblock copies back to back
//!
//! ```text
//! [Header copy 0: 173 bytes][Header copy 1: 173 bytes][unused...]
//! ```
//!
//! ## Header (173 bytes)
//!
//! ```text
//! [version: u8][generation: u32][write_block: u32][write_offset: u16]
//! [timestamp: u32][FileSlot; 6][crc: u16]
//! ```
//!
//! `crc` covers the 171 preceding bytes of the same copy only.
//!
//! ## FileSlot (26 bytes)
//!
//! ```text
//! [name: 12 bytes][version: u16][start_block: u32][end_block: u32][size: u32]
//! ```
//!
//! ## Record frame (within a data block)
//!
//! ```text
//! [file: u8][size: u16][available: u16][crc: u16][payload: available bytes]
//! ```
//!
//! Frames are packed end to end until a block cannot hold another one. The
//! record `crc` is seeded with the owning file's *current* version before
//! folding in the first five header bytes and then `size` payload bytes, so a
//! version bump (truncate) silently invalidates every older record without
//! touching its bytes.

use blockdev::{Block, BLOCK_SIZE};
use byteorder::{ByteOrder, LittleEndian};

/// Number of fixed file slots in the table. The slot index doubles as the
/// on-media file number, so this is part of the format.
pub const FILES_MAX: usize = 6;

/// Maximum stored file name length, in bytes.
pub const FILE_NAME_MAX: usize = 12;

/// On-media layout version written into new headers.
pub const HEADER_VERSION: u8 = 1;

/// Size of one serialized [`Header`] copy.
pub const HEADER_SIZE: usize = 15 + FILES_MAX * FileSlot::BYTES + 2;

/// Size of a serialized [`EntryHeader`].
pub const ENTRY_SIZE: usize = 7;

// Both superblock copies must fit in block 0.
const _: () = assert!(2 * HEADER_SIZE <= BLOCK_SIZE);

/// One entry of the fixed file table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileSlot {
    /// NUL-padded file name.
    pub name: [u8; FILE_NAME_MAX],
    /// Epoch tag; changes only on truncate or header synthesis.
    pub version: u16,
    /// First block a sequential read of this file visits.
    pub start_block: u32,
    /// Block that most recently received a record of this file.
    pub end_block: u32,
    /// Total payload bytes appended since the last truncate.
    pub size: u32,
}

impl FileSlot {
    /// Serialized size of one slot.
    pub const BYTES: usize = FILE_NAME_MAX + 2 + 4 + 4 + 4;

    fn encode_into(&self, buf: &mut [u8]) {
        buf[..FILE_NAME_MAX].copy_from_slice(&self.name);
        LittleEndian::write_u16(&mut buf[12..14], self.version);
        LittleEndian::write_u32(&mut buf[14..18], self.start_block);
        LittleEndian::write_u32(&mut buf[18..22], self.end_block);
        LittleEndian::write_u32(&mut buf[22..26], self.size);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut name = [0u8; FILE_NAME_MAX];
        name.copy_from_slice(&buf[..FILE_NAME_MAX]);
        Self {
            name,
            version: LittleEndian::read_u16(&buf[12..14]),
            start_block: LittleEndian::read_u32(&buf[14..18]),
            end_block: LittleEndian::read_u32(&buf[18..22]),
            size: LittleEndian::read_u32(&buf[22..26]),
        }
    }

    /// Stores `name`, truncated to [`FILE_NAME_MAX`] bytes and NUL-padded.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0u8; FILE_NAME_MAX];
        let n = name.len().min(FILE_NAME_MAX);
        self.name[..n].copy_from_slice(&name.as_bytes()[..n]);
    }

    /// Returns the stored name up to the first NUL, lossily decoded.
    #[must_use]
    pub fn name_str(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FILE_NAME_MAX);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

/// In-memory superblock. Two copies live in block 0; the one with the valid
/// CRC and the greater generation is canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Layout version, currently [`HEADER_VERSION`].
    pub version: u8,
    /// Incremented once per sync; selects the newer copy at mount.
    pub generation: u32,
    /// Block the next append will try first.
    pub write_block: u32,
    /// Offset within `write_block` the next append will try first.
    pub write_offset: u16,
    /// Caller-supplied wall-clock stamp, persisted at sync.
    pub timestamp: u32,
    /// The fixed file table.
    pub files: [FileSlot; FILES_MAX],
}

impl Header {
    /// Serializes this header into `buf[..HEADER_SIZE]`, computing and
    /// appending the trailing CRC.
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0] = self.version;
        LittleEndian::write_u32(&mut buf[1..5], self.generation);
        LittleEndian::write_u32(&mut buf[5..9], self.write_block);
        LittleEndian::write_u16(&mut buf[9..11], self.write_offset);
        LittleEndian::write_u32(&mut buf[11..15], self.timestamp);

        let mut at = 15;
        for slot in &self.files {
            slot.encode_into(&mut buf[at..at + FileSlot::BYTES]);
            at += FileSlot::BYTES;
        }

        let crc = crc16::checksum(&buf[..HEADER_SIZE - 2]);
        LittleEndian::write_u16(&mut buf[HEADER_SIZE - 2..HEADER_SIZE], crc);
    }

    /// Decodes one header copy from `buf[..HEADER_SIZE]`, returning it only
    /// if the stored CRC matches the preceding bytes.
    #[must_use]
    pub fn decode_validated(buf: &[u8]) -> Option<Self> {
        let stored = LittleEndian::read_u16(&buf[HEADER_SIZE - 2..HEADER_SIZE]);
        if stored != crc16::checksum(&buf[..HEADER_SIZE - 2]) {
            return None;
        }

        let mut files = [FileSlot::default(); FILES_MAX];
        let mut at = 15;
        for slot in &mut files {
            *slot = FileSlot::decode(&buf[at..at + FileSlot::BYTES]);
            at += FileSlot::BYTES;
        }

        Some(Self {
            version: buf[0],
            generation: LittleEndian::read_u32(&buf[1..5]),
            write_block: LittleEndian::read_u32(&buf[5..9]),
            write_offset: LittleEndian::read_u16(&buf[9..11]),
            timestamp: LittleEndian::read_u32(&buf[11..15]),
            files,
        })
    }
}

/// Frame header preceding every record's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    /// Owning file slot index.
    pub file: u8,
    /// Logical payload length.
    pub size: u16,
    /// Reserved slot capacity; `size <= available`.
    pub available: u16,
    /// Epoch-seeded CRC over the first five frame bytes and the payload.
    pub crc: u16,
}

impl EntryHeader {
    /// Serializes this frame header into `buf[..ENTRY_SIZE]`.
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0] = self.file;
        LittleEndian::write_u16(&mut buf[1..3], self.size);
        LittleEndian::write_u16(&mut buf[3..5], self.available);
        LittleEndian::write_u16(&mut buf[5..7], self.crc);
    }

    /// Decodes a frame header from `buf[..ENTRY_SIZE]`.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            file: buf[0],
            size: LittleEndian::read_u16(&buf[1..3]),
            available: LittleEndian::read_u16(&buf[3..5]),
            crc: LittleEndian::read_u16(&buf[5..7]),
        }
    }

    /// The five header bytes covered by the record CRC.
    fn crc_input(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0] = self.file;
        LittleEndian::write_u16(&mut bytes[1..3], self.size);
        LittleEndian::write_u16(&mut bytes[3..5], self.available);
        bytes
    }
}

/// Computes a record's CRC under a given file epoch.
///
/// The checksum is seeded with `file_version`, then folded over the frame
/// header (excluding its own CRC field) and `payload`. A record written under
/// an earlier version of its file recomputes to a different value and is
/// classified [`RecordCheck::Stale`] from then on.
#[must_use]
pub fn record_crc(file_version: u16, entry: &EntryHeader, payload: &[u8]) -> u16 {
    let crc = crc16::update(file_version, &entry.crc_input());
    crc16::update(crc, payload)
}

/// Classification of the bytes at a block offset.
///
/// This is the single validity predicate used by the allocator (anything but
/// `Valid` means "free from this offset to the block end") and by the reader
/// (anything but `Valid` means "no more records in this block").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCheck {
    /// A well-formed record whose CRC matches its file's current epoch.
    Valid(EntryHeader),
    /// Field values out of range or a frame that does not fit the block.
    /// Never-written space and torn writes both land here.
    BadRange,
    /// Frame-shaped bytes whose epoch-seeded CRC does not match: bit rot, a
    /// torn payload, or a record orphaned by a truncate.
    Stale,
}

/// Validates the bytes at `offset` within `block` against the current file
/// table.
#[must_use]
pub fn check_record(block: &Block, offset: usize, files: &[FileSlot; FILES_MAX]) -> RecordCheck {
    if offset + ENTRY_SIZE > BLOCK_SIZE {
        return RecordCheck::BadRange;
    }

    let entry = EntryHeader::decode(&block[offset..offset + ENTRY_SIZE]);

    if entry.file as usize >= FILES_MAX {
        return RecordCheck::BadRange;
    }
    if entry.size == 0
        || entry.size as usize >= BLOCK_SIZE
        || entry.available == 0
        || entry.available as usize >= BLOCK_SIZE
        || entry.size > entry.available
    {
        return RecordCheck::BadRange;
    }
    if offset + ENTRY_SIZE + entry.available as usize > BLOCK_SIZE {
        return RecordCheck::BadRange;
    }

    let payload = &block[offset + ENTRY_SIZE..offset + ENTRY_SIZE + entry.size as usize];
    let expected = record_crc(files[entry.file as usize].version, &entry, payload);
    if entry.crc != expected {
        return RecordCheck::Stale;
    }

    RecordCheck::Valid(entry)
}
