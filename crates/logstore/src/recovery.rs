//! Mount-time header recovery and the sync path.
//!
//! Block 0 carries two header copies back to back. Mount validates each
//! copy's CRC independently and picks the survivor:
//!
//! - both invalid, or a wipe was requested → synthesize a fresh header with
//!   random per-file versions and the write position at the first usable
//!   block;
//! - exactly one valid → that copy (the other is presumed torn);
//! - both valid → the strictly greater generation wins. Ties cannot occur:
//!   the generation is bumped exactly once per sync and the two slots
//!   alternate.
//!
//! Sync writes the header into the slot *not* just read as canonical, via a
//! read-modify-write of block 0, so the previous copy survives a crash
//! mid-write.

use blockdev::{BlockDevice, BLOCK_SIZE};
use tracing::{debug, info};

use crate::cache::BlockCache;
use crate::format::{FileSlot, Header, FILES_MAX, HEADER_SIZE, HEADER_VERSION};
use crate::{FileSettings, FileSpec, Geometry, Result, Store, StoreError};

impl<D: BlockDevice> Store<D> {
    /// Mounts a store on `dev`.
    ///
    /// `specs` configures up to [`FILES_MAX`] file slots: the runtime
    /// priority and sync flag always come from the spec, while persisted
    /// fields (name, version, start block) come from media whenever a valid
    /// header is recovered. With `wipe`, or when neither header copy
    /// validates, a fresh header is synthesized in memory; it reaches media
    /// at the first [`sync`](Store::sync).
    pub fn mount(mut dev: D, geometry: Geometry, specs: &[FileSpec], wipe: bool) -> Result<Self> {
        if specs.len() > FILES_MAX {
            return Err(StoreError::TooManyFiles(specs.len()));
        }

        let total_blocks = dev.block_count();

        let mut block0 = [0u8; BLOCK_SIZE];
        dev.read_block(0, &mut block0)?;

        let copy0 = Header::decode_validated(&block0[..HEADER_SIZE]);
        let copy1 = Header::decode_validated(&block0[HEADER_SIZE..2 * HEADER_SIZE]);

        let (header, active_copy) = if wipe {
            info!(wipe, "synthesizing fresh header");
            (synthesize_header(specs, &geometry), 0)
        } else {
            match (copy0, copy1) {
                (None, None) => {
                    info!("no valid header copy; synthesizing");
                    (synthesize_header(specs, &geometry), 0)
                }
                (Some(h), None) => (h, 0),
                (None, Some(h)) => (h, 1),
                (Some(h0), Some(h1)) => {
                    if h0.generation > h1.generation {
                        (h0, 0)
                    } else {
                        (h1, 1)
                    }
                }
            }
        };

        let mut settings = [FileSettings::default(); FILES_MAX];
        for (slot, spec) in settings.iter_mut().zip(specs) {
            *slot = FileSettings {
                sync: spec.sync,
                priority: spec.priority,
            };
        }

        debug!(
            active_copy,
            generation = header.generation,
            write_block = header.write_block,
            write_offset = header.write_offset,
            "mounted"
        );

        Ok(Self {
            dev,
            header,
            active_copy,
            cache: BlockCache::new(),
            geometry,
            total_blocks,
            settings,
        })
    }

    /// Flushes buffered record bytes and persists the header.
    ///
    /// Order matters: the dirty data block is written first, then the
    /// generation is bumped, the active copy index toggles, and the header
    /// lands in the newly active slot of block 0. A failed device write does
    /// not roll back the in-memory generation bump; callers retry `sync`
    /// until it succeeds or treat persistent failure as fatal.
    pub fn sync(&mut self) -> Result<()> {
        self.cache.flush(&mut self.dev)?;

        self.header.generation = self.header.generation.wrapping_add(1);
        self.active_copy ^= 1;
        self.write_header()?;

        debug!(
            generation = self.header.generation,
            active_copy = self.active_copy,
            "sync"
        );
        Ok(())
    }

    /// Stamps the in-memory header's timestamp; persisted at the next sync.
    pub fn touch(&mut self, timestamp: u32) {
        self.header.timestamp = timestamp;
    }

    /// Read-modify-write of block 0 targeting only the active copy's slot,
    /// leaving the other copy's bytes exactly as they were.
    fn write_header(&mut self) -> Result<()> {
        let mut block0 = [0u8; BLOCK_SIZE];
        self.dev.read_block(0, &mut block0)?;

        let at = self.active_copy * HEADER_SIZE;
        self.header.encode_into(&mut block0[at..at + HEADER_SIZE]);

        self.dev.write_block(0, &block0)?;
        Ok(())
    }
}

/// Builds a fresh header: generation 0, write position at the first usable
/// block, and a random version for every slot so records from any previous
/// life of the media are unrecognized.
fn synthesize_header(specs: &[FileSpec], geometry: &Geometry) -> Header {
    let mut files = [FileSlot::default(); FILES_MAX];

    for (i, slot) in files.iter_mut().enumerate() {
        if let Some(spec) = specs.get(i) {
            slot.set_name(&spec.name);
        }
        slot.version = rand::random::<u16>();
        slot.start_block = geometry.first_block;
        slot.end_block = geometry.first_block;
        debug!(file = i, version = slot.version, "fresh file version");
    }

    Header {
        version: HEADER_VERSION,
        generation: 0,
        write_block: geometry.first_block,
        write_offset: 0,
        timestamp: 0,
        files,
    }
}
