//! The seam between the streaming core and the host graphics device.
//!
//! Everything the vertex manager needs from the device goes through
//! [`GpuContext`], so the core can be driven against a real backend, the
//! no-op [`NullContext`], or a recording mock in tests. The no-op variant is
//! chosen at construction time rather than by conditional compilation.

use crate::buffers::BufferClass;

use anyhow::Result;
use ribbon_types::{ColorMask, Primitive};

/// Identifies a fence inserted into the device's command stream.
pub type FenceId = u64;

/// The narrow graphics-context interface consumed by the streaming core.
///
/// Calls are assumed valid against a live context; a rejected call is
/// reported by the caller through logging and execution continues
/// best-effort. There is no retry.
pub trait GpuContext {
    /// Make `data` visible to the device at `offset` within the buffer for
    /// `class`. For a persistently-mapped backend this may be a flush of the
    /// written range rather than a copy.
    fn upload(&mut self, class: BufferClass, offset: usize, data: &[u8]) -> Result<()>;

    /// Insert a fence after all commands submitted so far.
    fn insert_fence(&mut self) -> Result<FenceId>;

    /// Block until the device has consumed everything before `fence`.
    fn wait_fence(&mut self, fence: FenceId) -> Result<()>;

    /// Bind the vertex layout identified by `format_id`. Only called when
    /// the active format actually changed.
    fn bind_vertex_layout(&mut self, format_id: u64) -> Result<()>;

    fn set_color_mask(&mut self, mask: ColorMask) -> Result<()>;

    fn set_blend_enabled(&mut self, enabled: bool) -> Result<()>;

    /// Submit one indexed draw over 16-bit indices starting at
    /// `index_offset` bytes into the index buffer.
    fn draw_indexed(
        &mut self,
        topology: Primitive,
        index_offset: usize,
        index_count: u32,
        base_vertex: u32,
    ) -> Result<()>;
}

/// A context that accepts everything and draws nothing.
///
/// Used when the video backend is disabled, and as a stand-in while
/// bringing up new platforms.
#[derive(Debug, Default)]
pub struct NullContext {
    next_fence: FenceId,
}

impl GpuContext for NullContext {
    fn upload(&mut self, _class: BufferClass, _offset: usize, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn insert_fence(&mut self) -> Result<FenceId> {
        self.next_fence += 1;
        Ok(self.next_fence)
    }

    fn wait_fence(&mut self, _fence: FenceId) -> Result<()> {
        Ok(())
    }

    fn bind_vertex_layout(&mut self, _format_id: u64) -> Result<()> {
        Ok(())
    }

    fn set_color_mask(&mut self, _mask: ColorMask) -> Result<()> {
        Ok(())
    }

    fn set_blend_enabled(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        _topology: Primitive,
        _index_offset: usize,
        _index_count: u32,
        _base_vertex: u32,
    ) -> Result<()> {
        Ok(())
    }
}
