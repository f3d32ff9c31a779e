//! A fixed-capacity ring buffer for streaming one class of data to the
//! device through repeated map/write/unmap cycles.

use super::{align_up, BufferClass};
use crate::{
    context::{FenceId, GpuContext},
    error::{StreamError, UsageError},
};

use std::slice;

use anyhow::{Context, Result};
use log::error;

/// How many fence-tracked sectors the buffer is divided into.
pub const SYNC_SECTORS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Mapping {
    offset: usize,
    size: usize,
}

/// A circular byte region that is logically infinite: when a mapping request
/// does not fit before the end, the write cursor wraps to offset 0.
///
/// Committed data is fence-tracked per sector, so a later mapping that would
/// overwrite a region the device has not consumed yet stalls on that sector's
/// fence instead of corrupting in-flight data. At most one mapping may be
/// open at a time, and it must be closed with the exact byte count written.
pub struct StreamBuffer {
    class: BufferClass,

    /// Backing slab. Kept as `u64` so views of the written data
    /// (16-bit indices, float attributes) stay aligned.
    storage: Box<[u64]>,

    capacity: usize,
    sector_size: usize,

    /// Next free byte. Only advanced by `unmap`.
    cursor: usize,

    /// Fence guarding each sector's previously committed contents.
    fences: [Option<FenceId>; SYNC_SECTORS],

    mapping: Option<Mapping>,
}

impl StreamBuffer {
    /// Create a buffer of at least `capacity` bytes, rounded up so it splits
    /// evenly into sectors.
    pub fn new(class: BufferClass, capacity: usize) -> Self {
        let capacity = align_up(capacity.max(1), SYNC_SECTORS * 8);

        StreamBuffer {
            class,
            storage: vec![0u64; capacity / 8].into_boxed_slice(),
            capacity,
            sector_size: capacity / SYNC_SECTORS,
            cursor: 0,
            fences: [None; SYNC_SECTORS],
            mapping: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next offset a mapping would start at, before alignment.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Reserve up to `max_size` bytes aligned to `alignment`, wrapping to
    /// offset 0 if the request does not fit before the end of the buffer.
    /// Returns the base offset of the reserved region.
    ///
    /// A request larger than the whole buffer is a configuration error and
    /// fails with [`StreamError::OutOfSpace`].
    pub fn map(
        &mut self,
        ctx: &mut dyn GpuContext,
        max_size: usize,
        alignment: usize,
    ) -> Result<usize> {
        if self.mapping.is_some() {
            return Err(UsageError::AlreadyMapped.into());
        }
        if max_size > self.capacity {
            return Err(StreamError::OutOfSpace {
                requested: max_size,
                capacity: self.capacity,
            }
            .into());
        }

        let mut offset = align_up(self.cursor, alignment.max(1));
        if offset + max_size > self.capacity {
            offset = 0;
        }

        self.wait_region(ctx, offset, max_size);

        self.mapping = Some(Mapping {
            offset,
            size: max_size,
        });

        Ok(offset)
    }

    /// The writable region of the open mapping.
    pub fn mapped_mut(&mut self) -> Result<&mut [u8]> {
        let m = self.mapping.ok_or(UsageError::NotMapped)?;
        Ok(&mut self.bytes_mut()[m.offset..m.offset + m.size])
    }

    /// Commit exactly `used` bytes from the mapping base: upload them to the
    /// device, advance the cursor, and record a fence over the committed
    /// sectors. Committing zero bytes closes the mapping without advancing
    /// anything.
    pub fn unmap(&mut self, ctx: &mut dyn GpuContext, used: usize) -> Result<()> {
        let m = self.mapping.take().ok_or(UsageError::NotMapped)?;
        if used > m.size {
            return Err(UsageError::CommitTooLarge {
                used,
                reserved: m.size,
            }
            .into());
        }
        if used == 0 {
            return Ok(());
        }

        let class = self.class;
        let data = &self.bytes_mut()[m.offset..m.offset + used];
        // Not idempotent-safe to retry mid-frame, so a failed upload is
        // reported and the frame continues best-effort.
        if let Err(e) = ctx.upload(class, m.offset, data) {
            error!("Error uploading {} bytes of stream data: {}", used, e);
        }

        self.cursor = m.offset + used;

        let fence = ctx
            .insert_fence()
            .context("Error inserting stream buffer fence")?;
        for sector in self.sector_range(m.offset, used) {
            self.fences[sector] = Some(fence);
        }

        Ok(())
    }

    /// Stall until the device has consumed any in-flight data inside
    /// `[offset, offset + len)`.
    fn wait_region(&mut self, ctx: &mut dyn GpuContext, offset: usize, len: usize) {
        for sector in self.sector_range(offset, len) {
            if let Some(fence) = self.fences[sector].take() {
                if let Err(e) = ctx.wait_fence(fence) {
                    error!("Error waiting on stream buffer fence: {}", e);
                }
            }
        }
    }

    /// Sectors intersecting `[offset, offset + len)`.
    fn sector_range(&self, offset: usize, len: usize) -> std::ops::RangeInclusive<usize> {
        if len == 0 {
            // Empty range
            return 1..=0;
        }
        let first = offset / self.sector_size;
        let last = (offset + len - 1) / self.sector_size;
        first..=last.min(SYNC_SECTORS - 1)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // Safe: u8 has no alignment requirement and the slab is exactly
        // `capacity` bytes long.
        unsafe { slice::from_raw_parts_mut(self.storage.as_mut_ptr() as *mut u8, self.capacity) }
    }
}
