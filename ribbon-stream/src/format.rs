//! The seam to the active vertex format.

use crate::context::GpuContext;

use anyhow::Result;

/// Describes the layout of the vertex data a producer writes.
///
/// The manager only rebinds the layout when `id` changes between flushes, so
/// `id` must be stable for a given layout and distinct between layouts.
pub trait VertexFormat {
    /// Bytes per vertex.
    fn stride(&self) -> u32;

    /// Mask of vertex components present, passed through to shader
    /// variant selection.
    fn components(&self) -> u32;

    /// Identity used to skip redundant layout rebinds.
    fn id(&self) -> u64;

    /// Point the device's attribute fetch at this layout.
    fn bind_attribute_pointers(&self, ctx: &mut dyn GpuContext) -> Result<()>;
}
