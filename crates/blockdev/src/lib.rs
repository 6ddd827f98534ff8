//! # blockdev — Block Device Boundary
//!
//! The storage medium underneath the record store is addressed exclusively at
//! fixed-size sector granularity: one 512-byte block per read or write, no
//! partial transfers, no scatter/gather. This crate defines that boundary as
//! the [`BlockDevice`] trait and provides two host-side implementations:
//!
//! - [`MemBlockDevice`] — a zero-filled in-memory device for tests. Exposes
//!   [`MemBlockDevice::block_mut`] so tests can corrupt "media" directly.
//! - [`FileBlockDevice`] — a flat file image, one block per 512-byte slice,
//!   used by the interactive shell to persist a store across runs.
//!
//! Real targets (an SD card behind an SPI driver, a raw partition) implement
//! the same three methods; the store core never sees anything else.
//!
//! Devices are `&mut self` throughout: the store owns its device and every
//! operation runs synchronously on the caller's context.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;

/// Fixed sector size of the underlying medium, in bytes.
pub const BLOCK_SIZE: usize = 512;

/// One device sector.
pub type Block = [u8; BLOCK_SIZE];

/// Errors surfaced by a block device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// An underlying host I/O error.
    #[error("device io error: {0}")]
    Io(#[from] io::Error),

    /// The requested block index lies beyond the device capacity.
    #[error("block {block} out of range (device has {count} blocks)")]
    OutOfRange {
        /// The offending block index.
        block: u32,
        /// Total number of blocks on the device.
        count: u32,
    },
}

/// A synchronous single-sector block device.
pub trait BlockDevice {
    /// Reads the block at `block` into `buf`.
    fn read_block(&mut self, block: u32, buf: &mut Block) -> Result<(), DeviceError>;

    /// Writes `buf` to the block at `block`.
    fn write_block(&mut self, block: u32, buf: &Block) -> Result<(), DeviceError>;

    /// Returns the total number of blocks on the device.
    fn block_count(&self) -> u32;
}

/// In-memory block device. All blocks start zero-filled, matching fresh
/// flash/SD media beyond the high-water mark.
pub struct MemBlockDevice {
    blocks: Vec<Block>,
}

impl MemBlockDevice {
    /// Creates a zero-filled device with `count` blocks.
    #[must_use]
    pub fn new(count: u32) -> Self {
        Self {
            blocks: vec![[0u8; BLOCK_SIZE]; count as usize],
        }
    }

    /// Direct mutable access to a block's bytes, bypassing the trait.
    ///
    /// Intended for tests that simulate torn writes or bit rot on media.
    ///
    /// # Panics
    ///
    /// Panics if `block` is out of range.
    pub fn block_mut(&mut self, block: u32) -> &mut Block {
        &mut self.blocks[block as usize]
    }

    /// Direct read-only access to a block's bytes, bypassing the trait.
    ///
    /// # Panics
    ///
    /// Panics if `block` is out of range.
    #[must_use]
    pub fn block(&self, block: u32) -> &Block {
        &self.blocks[block as usize]
    }
}

impl BlockDevice for MemBlockDevice {
    fn read_block(&mut self, block: u32, buf: &mut Block) -> Result<(), DeviceError> {
        let src = self
            .blocks
            .get(block as usize)
            .ok_or(DeviceError::OutOfRange {
                block,
                count: self.block_count(),
            })?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_block(&mut self, block: u32, buf: &Block) -> Result<(), DeviceError> {
        let count = self.block_count();
        let dst = self
            .blocks
            .get_mut(block as usize)
            .ok_or(DeviceError::OutOfRange { block, count })?;
        dst.copy_from_slice(buf);
        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.blocks.len() as u32
    }
}

impl std::fmt::Debug for MemBlockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemBlockDevice")
            .field("block_count", &self.blocks.len())
            .finish()
    }
}

/// Block device backed by a flat file image.
///
/// Block `n` occupies bytes `[n * 512, (n + 1) * 512)` of the file.
pub struct FileBlockDevice {
    file: File,
    block_count: u32,
}

impl FileBlockDevice {
    /// Creates (or opens) an image at `path` sized to `count` blocks.
    ///
    /// An existing file is extended (zero-filled) if it is smaller than the
    /// requested capacity; it is never shrunk.
    pub fn create<P: AsRef<Path>>(path: P, count: u32) -> Result<Self, DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let wanted = count as u64 * BLOCK_SIZE as u64;
        if file.metadata()?.len() < wanted {
            file.set_len(wanted)?;
        }

        Ok(Self {
            file,
            block_count: count,
        })
    }

    /// Opens an existing image, deriving the block count from the file size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DeviceError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let block_count = (len / BLOCK_SIZE as u64) as u32;

        Ok(Self { file, block_count })
    }

    fn seek_to(&mut self, block: u32) -> Result<(), DeviceError> {
        if block >= self.block_count {
            return Err(DeviceError::OutOfRange {
                block,
                count: self.block_count,
            });
        }
        self.file
            .seek(SeekFrom::Start(block as u64 * BLOCK_SIZE as u64))?;
        Ok(())
    }
}

impl BlockDevice for FileBlockDevice {
    fn read_block(&mut self, block: u32, buf: &mut Block) -> Result<(), DeviceError> {
        self.seek_to(block)?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&mut self, block: u32, buf: &Block) -> Result<(), DeviceError> {
        self.seek_to(block)?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.block_count
    }
}

impl std::fmt::Debug for FileBlockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBlockDevice")
            .field("block_count", &self.block_count)
            .finish()
    }
}
