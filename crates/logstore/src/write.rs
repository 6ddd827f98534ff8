//! Append path and logical truncation.

use blockdev::{BlockDevice, BLOCK_SIZE};
use tracing::debug;

use crate::format::{record_crc, EntryHeader, ENTRY_SIZE};
use crate::{Result, Store, StoreError};

impl<D: BlockDevice> Store<D> {
    /// Appends `payload` as one record of `file`.
    ///
    /// The record is framed into the cached write block and buffered; it
    /// reaches media at the next [`sync`](Store::sync), immediately when the
    /// file's `sync` flag is set, or when the allocator leaves the block.
    ///
    /// # Errors
    ///
    /// - [`StoreError::CapacityExceeded`] if `payload` is empty or the frame
    ///   cannot fit in one block; rejected before any I/O.
    /// - [`StoreError::AllocationExhausted`] if no slot exists within the
    ///   bounded search. Truncating or syncing may free space for a retry.
    /// - [`StoreError::Device`] on I/O failure.
    pub fn append(&mut self, file: u8, payload: &[u8]) -> Result<()> {
        self.check_file_id(file)?;

        let required = ENTRY_SIZE + payload.len();
        if payload.is_empty() || required >= BLOCK_SIZE {
            return Err(StoreError::CapacityExceeded {
                len: payload.len(),
            });
        }
        let required = required as u16;

        self.find_slot(file, required)?;

        let mut entry = EntryHeader {
            file,
            size: payload.len() as u16,
            available: payload.len() as u16,
            crc: 0,
        };
        entry.crc = record_crc(
            self.header.files[file as usize].version,
            &entry,
            payload,
        );

        let offset = self.header.write_offset as usize;
        let buf = self.cache.bytes_mut();
        entry.encode_into(&mut buf[offset..offset + ENTRY_SIZE]);
        buf[offset + ENTRY_SIZE..offset + ENTRY_SIZE + payload.len()].copy_from_slice(payload);
        self.cache.mark_dirty();

        debug!(
            file,
            block = self.header.write_block,
            offset,
            len = payload.len(),
            "appended"
        );

        self.header.write_offset += required;

        let write_block = self.header.write_block;
        let slot = &mut self.header.files[file as usize];
        slot.size += payload.len() as u32;
        slot.end_block = write_block;

        if self.settings[file as usize].sync {
            self.sync()?;
        }

        Ok(())
    }

    /// Logically empties `file` without erasing a byte.
    ///
    /// Bumps the file's version and points its start block at the current
    /// write block. Every record written under the old version now fails the
    /// epoch-seeded CRC: the reader skips it and the allocator treats it as
    /// free space. Durable at the next sync.
    pub fn truncate(&mut self, file: u8) -> Result<()> {
        self.check_file_id(file)?;

        let write_block = self.header.write_block;
        let slot = &mut self.header.files[file as usize];
        slot.version = slot.version.wrapping_add(1);
        slot.start_block = write_block;
        slot.end_block = write_block;
        slot.size = 0;

        debug!(file, version = slot.version, start_block = write_block, "truncated");
        Ok(())
    }
}
