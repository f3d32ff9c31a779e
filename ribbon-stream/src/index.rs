//! Generates 16-bit index streams for batches of sequential primitives.

use crate::error::UsageError;

use anyhow::Result;

/// Sentinel index that terminates one strip and begins another when
/// primitive restart is active.
pub const RESTART_INDEX: u16 = 0xFFFF;

/// Appends indices into the mapped index region for one batch.
///
/// Stateless across batches: [`IndexGenerator::start`] resets both counters
/// and must be called once per batch before any primitives are added. The
/// destination slice is supplied with every call since the mapping it points
/// into changes per batch.
#[derive(Debug, Default)]
pub struct IndexGenerator {
    /// Added to every emitted index. Zero when the platform supports
    /// base-vertex draws; otherwise the batch's base vertex, so both code
    /// paths reference identical vertices.
    base: u16,

    /// Convert independent triangles to restart-separated strips.
    restart: bool,

    index_len: u32,
    num_verts: u32,
}

impl IndexGenerator {
    /// Begin a new batch. `restart` enables the strip-with-restart encoding
    /// for triangles.
    pub fn start(&mut self, base: u16, restart: bool) {
        self.base = base;
        self.restart = restart;
        self.index_len = 0;
        self.num_verts = 0;
    }

    /// Indices emitted since `start`.
    pub fn index_len(&self) -> u32 {
        self.index_len
    }

    /// Distinct vertices referenced since `start`.
    pub fn num_verts(&self) -> u32 {
        self.num_verts
    }

    /// Append `count` points over sequential vertices.
    pub fn add_points(&mut self, dst: &mut [u16], count: u32) -> Result<()> {
        self.reserve(dst, count)?;
        for _ in 0..count {
            self.push(dst, self.num_verts as u16);
            self.num_verts += 1;
        }
        Ok(())
    }

    /// Append `count` independent lines over sequential vertices.
    pub fn add_lines(&mut self, dst: &mut [u16], count: u32) -> Result<()> {
        self.reserve(dst, count * 2)?;
        for _ in 0..count {
            let v = self.num_verts as u16;
            self.push(dst, v);
            self.push(dst, v + 1);
            self.num_verts += 2;
        }
        Ok(())
    }

    /// Append `count` independent triangles over sequential vertices.
    ///
    /// With primitive restart active each triangle becomes a three-index
    /// strip, separated from the previous one by [`RESTART_INDEX`], so a
    /// whole batch draws as a single `TriangleStrip`. Without it a plain
    /// triangle list is emitted.
    pub fn add_triangles(&mut self, dst: &mut [u16], count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        let needed = if self.restart {
            // 3 per triangle plus a restart between each pair, and one more
            // restart if this call extends an earlier strip.
            count * 4 - if self.index_len == 0 { 1 } else { 0 }
        } else {
            count * 3
        };
        self.reserve(dst, needed)?;

        for _ in 0..count {
            if self.restart && self.index_len != 0 {
                let i = self.index_len as usize;
                dst[i] = RESTART_INDEX;
                self.index_len += 1;
            }

            let v = self.num_verts as u16;
            self.push(dst, v);
            self.push(dst, v + 1);
            self.push(dst, v + 2);
            self.num_verts += 3;
        }
        Ok(())
    }

    fn push(&mut self, dst: &mut [u16], index: u16) {
        dst[self.index_len as usize] = index.wrapping_add(self.base);
        self.index_len += 1;
    }

    fn reserve(&self, dst: &[u16], extra: u32) -> Result<(), UsageError> {
        if self.index_len as usize + extra as usize > dst.len() {
            return Err(UsageError::IndexOverflow);
        }
        Ok(())
    }
}
