//! # logstore — Log-Structured Record Store for Block Media
//!
//! A minimal record store for block-addressed persistent media (an SD card,
//! a raw partition, a flat file image) on targets with no operating-system
//! filesystem. A small fixed number of named logical files share one
//! contiguous block range; appends are variable-length, CRC-guarded records,
//! and the store recovers cleanly from power loss or partial writes.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                     STORE                        │
//! │                                                  │
//! │ write.rs → find_slot → frame record → cache      │
//! │              |                                   │
//! │              |  (sync flag / block full?)        │
//! │              v                                   │
//! │          recovery.rs sync() → flush + ping-pong  │
//! │                               superblock write   │
//! │                                                  │
//! │ read.rs → cursor walk → check_record → payload   │
//! └──────────────────────────────────────────────────┘
//!        |                       |
//!        v                       v
//!   cache.rs (1 block)      crc16 (epoch-seeded)
//!        |
//!        v
//!   blockdev::BlockDevice (512-byte sectors)
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                              |
//! |--------------|------------------------------------------------------|
//! | `lib.rs`     | `Store` struct, errors, settings, accessors, `Debug` |
//! | [`format`]   | On-media layout, codecs, record validity predicate   |
//! | `cache.rs`   | Single-block cache with dirty tracking               |
//! | `recovery.rs`| Mount (two-copy selection/synthesis), sync, touch    |
//! | `alloc.rs`   | Bounded block search with priority slot reuse        |
//! | `write.rs`   | Append and truncate                                  |
//! | `read.rs`    | Cursor-driven sequential reader                      |
//!
//! ## Crash Safety
//!
//! Block 0 holds two superblock copies. Each sync flushes the data block,
//! bumps the generation, and rewrites only the *other* copy, so the copy just
//! read as canonical survives a torn header write. Records carry a CRC seeded
//! with their file's current version; truncate bumps the version, which turns
//! every older record into unrecognized free space without erasing a byte.
//!
//! ## Concurrency
//!
//! None. A `Store` has exactly one owner and every operation takes
//! `&mut self` and runs to completion; wrap the whole store in one mutex if
//! it must be shared. There is no reader isolation across appends: a
//! priority reuse may overwrite a record another cursor has not yet visited.

mod alloc;
mod cache;
pub mod format;
mod read;
mod recovery;
mod write;

pub use alloc::SEEK_BLOCKS_MAX;
pub use blockdev::{Block, BlockDevice, DeviceError, FileBlockDevice, MemBlockDevice, BLOCK_SIZE};
pub use format::{
    check_record, record_crc, EntryHeader, FileSlot, Header, RecordCheck, ENTRY_SIZE,
    FILES_MAX, FILE_NAME_MAX, HEADER_SIZE, HEADER_VERSION,
};
pub use read::RecordCursor;

use cache::BlockCache;
use thiserror::Error;

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced to callers.
///
/// Corruption is deliberately absent: a failed record validation is absorbed
/// as "end of valid data / free space" during scans and never aborts an
/// operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying device I/O failed; the operation aborted with in-memory
    /// state left as documented on each method.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// No reusable or free slot was found within the bounded block search.
    #[error("no free slot within the bounded block search")]
    AllocationExhausted,

    /// The payload (plus framing) cannot fit in a single block, or is empty.
    #[error("payload of {len} bytes cannot be framed in one block")]
    CapacityExceeded {
        /// Rejected payload length.
        len: usize,
    },

    /// File slot index outside the fixed table.
    #[error("file {0} out of range (table holds {FILES_MAX} slots)")]
    BadFileId(u8),

    /// More file specs than the fixed table holds.
    #[error("{0} file specs exceed the {FILES_MAX}-slot table")]
    TooManyFiles(usize),

    /// The single-block cache held dirty block `{0}` when a different block
    /// was requested. Internal contract violation; flush first.
    #[error("cache holds dirty block {0}; flush before loading another")]
    CacheBusy(u32),
}

/// Default first usable data block; block 0 is the superblock and a few
/// blocks after it stay reserved.
pub const DEFAULT_FIRST_BLOCK: u32 = 8;

/// Placement of the data ring on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// First usable data block.
    pub first_block: u32,
    /// Wrap bound: reaching this block wraps the write position back to
    /// `first_block`. `None` means `block_count - 2`.
    pub last_block: Option<u32>,
}

impl Geometry {
    /// Geometry starting at `first_block`, wrapping at the device default.
    #[must_use]
    pub fn new(first_block: u32) -> Self {
        Self {
            first_block,
            last_block: None,
        }
    }

    /// Overrides the wrap bound; useful for exercising wraparound on a small
    /// region of a large device.
    #[must_use]
    pub fn with_last_block(mut self, last_block: u32) -> Self {
        self.last_block = Some(last_block);
        self
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(DEFAULT_FIRST_BLOCK)
    }
}

/// Mount-time description of one file slot.
#[derive(Debug, Clone)]
pub struct FileSpec {
    /// Name stored in the file table (truncated to [`FILE_NAME_MAX`] bytes).
    pub name: String,
    /// Precedence for slot reuse; 0 is highest, 255 lowest.
    pub priority: u8,
    /// Write-through: sync after every append to this file.
    pub sync: bool,
}

impl FileSpec {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, priority: u8, sync: bool) -> Self {
        Self {
            name: name.into(),
            priority,
            sync,
        }
    }
}

/// Volatile per-file settings; never persisted, supplied at mount.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileSettings {
    pub(crate) sync: bool,
    pub(crate) priority: u8,
}

impl Default for FileSettings {
    fn default() -> Self {
        // Unregistered slots sync never and yield to everyone.
        Self {
            sync: false,
            priority: u8::MAX,
        }
    }
}

/// Snapshot of the mutable write position and header identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Which of the two superblock copies was read as canonical (0 or 1).
    pub active_copy: usize,
    /// Current header generation.
    pub generation: u32,
    /// Block the next append will try first.
    pub write_block: u32,
    /// Offset the next append will try first.
    pub write_offset: u16,
    /// Last `touch`ed timestamp.
    pub timestamp: u32,
}

/// Per-file view combining the persisted slot and its runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Stored name.
    pub name: String,
    /// Current epoch.
    pub version: u16,
    /// Payload bytes appended since the last truncate.
    pub size: u32,
    /// First block a fresh cursor visits.
    pub start_block: u32,
    /// Runtime precedence.
    pub priority: u8,
    /// Runtime write-through flag.
    pub sync: bool,
}

/// The record store handle. One owner, synchronous operations throughout.
pub struct Store<D: BlockDevice> {
    pub(crate) dev: D,
    pub(crate) header: Header,
    pub(crate) active_copy: usize,
    pub(crate) cache: BlockCache,
    pub(crate) geometry: Geometry,
    pub(crate) total_blocks: u32,
    pub(crate) settings: [FileSettings; FILES_MAX],
}

impl<D: BlockDevice> Store<D> {
    /// Returns the current header generation.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.header.generation
    }

    /// Returns which superblock copy is currently active (0 or 1).
    #[must_use]
    pub fn active_copy(&self) -> usize {
        self.active_copy
    }

    /// Returns the current write position as `(block, offset)`.
    #[must_use]
    pub fn write_position(&self) -> (u32, u16) {
        (self.header.write_block, self.header.write_offset)
    }

    /// Diagnostics snapshot: active copy, generation, and write position.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            active_copy: self.active_copy,
            generation: self.header.generation,
            write_block: self.header.write_block,
            write_offset: self.header.write_offset,
            timestamp: self.header.timestamp,
        }
    }

    /// Returns the number of file slots in the table.
    #[must_use]
    pub fn file_count(&self) -> usize {
        FILES_MAX
    }

    /// Returns the combined persisted + runtime view of one file slot.
    pub fn file_info(&self, file: u8) -> Result<FileInfo> {
        self.check_file_id(file)?;
        let slot = &self.header.files[file as usize];
        let settings = &self.settings[file as usize];
        Ok(FileInfo {
            name: slot.name_str(),
            version: slot.version,
            size: slot.size,
            start_block: slot.start_block,
            priority: settings.priority,
            sync: settings.sync,
        })
    }

    /// Consumes the store, returning the underlying device.
    ///
    /// Buffered record bytes that were never synced stay unwritten.
    pub fn into_device(self) -> D {
        self.dev
    }

    pub(crate) fn check_file_id(&self, file: u8) -> Result<()> {
        if (file as usize) < FILES_MAX {
            Ok(())
        } else {
            Err(StoreError::BadFileId(file))
        }
    }
}

impl<D: BlockDevice> std::fmt::Debug for Store<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("active_copy", &self.active_copy)
            .field("generation", &self.header.generation)
            .field("write_block", &self.header.write_block)
            .field("write_offset", &self.header.write_offset)
            .field("total_blocks", &self.total_blocks)
            .field("first_block", &self.geometry.first_block)
            .field("dirty", &self.cache.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests;
