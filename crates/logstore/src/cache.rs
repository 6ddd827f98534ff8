//! Single-block cache between the store and the device.
//!
//! Exactly one block is resident at a time, which bounds RAM to one sector
//! regardless of device size or file count. Small record writes accumulate in
//! the cached block and reach the device in one flush.

use blockdev::{Block, BlockDevice, BLOCK_SIZE};

use crate::StoreError;

pub(crate) struct BlockCache {
    buf: Box<Block>,
    block: Option<u32>,
    dirty: bool,
}

impl BlockCache {
    pub(crate) fn new() -> Self {
        Self {
            buf: Box::new([0u8; BLOCK_SIZE]),
            block: None,
            dirty: false,
        }
    }

    /// Makes `block` resident, reading it from the device on a miss.
    ///
    /// A dirty cache refuses to load a different block: the caller must
    /// [`flush`](Self::flush) first, so buffered record bytes are never
    /// silently dropped.
    pub(crate) fn ensure<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        block: u32,
    ) -> Result<(), StoreError> {
        if self.block == Some(block) {
            return Ok(());
        }
        if self.dirty {
            // self.block is always Some while dirty
            return Err(StoreError::CacheBusy(self.block.unwrap_or(0)));
        }

        dev.read_block(block, &mut self.buf)?;
        self.block = Some(block);
        Ok(())
    }

    /// Writes the cached block back if dirty, then forgets it.
    ///
    /// A clean cache keeps its contents; only a write-back invalidates the
    /// cached block number.
    pub(crate) fn flush<D: BlockDevice>(&mut self, dev: &mut D) -> Result<(), StoreError> {
        if self.dirty {
            if let Some(block) = self.block {
                dev.write_block(block, &self.buf)?;
            }
            self.block = None;
            self.dirty = false;
        }
        Ok(())
    }

    pub(crate) fn bytes(&self) -> &Block {
        &self.buf
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut Block {
        &mut self.buf
    }

    pub(crate) fn mark_dirty(&mut self) {
        debug_assert!(self.block.is_some(), "marking an empty cache dirty");
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn cached_block(&self) -> Option<u32> {
        self.block
    }
}
