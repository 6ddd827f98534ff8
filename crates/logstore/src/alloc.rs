//! Bounded block-search allocator.
//!
//! `find_slot` looks for a writable offset for `required` bytes (frame header
//! plus payload): first in the current write block from the current write
//! offset, then by walking forward one block at a time, wrapping at the end
//! of the usable range. The walk gives up after [`SEEK_BLOCKS_MAX`] block
//! advances, which caps worst-case append latency instead of scanning the
//! whole device.
//!
//! Within a block, anything that fails record validation marks free space
//! from that offset to the block end — never-written media and corruption
//! are indistinguishable and both mean "writable". A valid record may still
//! be claimed in place when its owner's runtime priority is numerically
//! greater than or equal to the requester's and its reserved capacity covers
//! the request.

use blockdev::{Block, BlockDevice, BLOCK_SIZE};
use tracing::{debug, trace};

use crate::format::{check_record, FileSlot, RecordCheck, ENTRY_SIZE, FILES_MAX};
use crate::{FileSettings, Result, Store, StoreError};

/// Maximum number of block advances per allocation.
pub const SEEK_BLOCKS_MAX: u16 = 5;

impl<D: BlockDevice> Store<D> {
    /// First block past the usable range; reaching it wraps the write
    /// position back to the first usable block.
    pub(crate) fn wrap_limit(&self) -> u32 {
        self.geometry
            .last_block
            .unwrap_or_else(|| self.total_blocks.saturating_sub(2))
    }

    /// Finds a slot for `required` bytes on behalf of `file`, leaving the
    /// header's write position at the chosen block and offset.
    ///
    /// A dirty cache is synced before the search leaves its block, so
    /// buffered records always reach media before the write position moves
    /// on. On failure the write position is left where the search stopped;
    /// it is not rolled back.
    pub(crate) fn find_slot(&mut self, file: u8, required: u16) -> Result<()> {
        let priority = self.settings[file as usize].priority;
        let mut offset = self.header.write_offset;
        let mut visited: u16 = 0;

        loop {
            if required as usize + offset as usize >= BLOCK_SIZE {
                trace!(
                    block = self.header.write_block,
                    offset,
                    required,
                    "block cannot fit request; advancing"
                );

                if self.cache.is_dirty() {
                    self.sync()?;
                }

                self.header.write_block += 1;
                self.header.write_offset = 0;
                offset = 0;
                visited += 1;

                if self.header.write_block >= self.wrap_limit() {
                    debug!(first_block = self.geometry.first_block, "write position wrapped");
                    self.header.write_block = self.geometry.first_block;
                }
            }

            self.cache.ensure(&mut self.dev, self.header.write_block)?;

            if let Some(found) = scan_block(
                self.cache.bytes(),
                offset,
                required,
                priority,
                &self.header.files,
                &self.settings,
            ) {
                self.header.write_offset = found;
                debug!(
                    file,
                    block = self.header.write_block,
                    offset = found,
                    required,
                    remaining = BLOCK_SIZE - (found + required) as usize,
                    "allocated"
                );
                return Ok(());
            }

            // Nothing usable here; force the advance at the top of the loop.
            offset = BLOCK_SIZE as u16;

            if visited >= SEEK_BLOCKS_MAX {
                return Err(StoreError::AllocationExhausted);
            }
        }
    }
}

/// Scans one block from `start` for an offset able to hold `required` bytes.
///
/// The caller guarantees `start + required < BLOCK_SIZE` on entry.
fn scan_block(
    block: &Block,
    start: u16,
    required: u16,
    priority: u8,
    files: &[FileSlot; FILES_MAX],
    settings: &[FileSettings; FILES_MAX],
) -> Option<u16> {
    let mut offset = start;

    loop {
        match check_record(block, offset as usize, files) {
            RecordCheck::BadRange | RecordCheck::Stale => {
                // Free from here to the block end.
                return Some(offset);
            }
            RecordCheck::Valid(entry) => {
                let occupant = settings[entry.file as usize].priority;
                if occupant >= priority && entry.available >= required {
                    trace!(offset, occupant, priority, "claiming occupied slot");
                    return Some(offset);
                }
                offset += ENTRY_SIZE as u16 + entry.available;
            }
        }

        if offset as usize + required as usize >= BLOCK_SIZE {
            return None;
        }
    }
}
