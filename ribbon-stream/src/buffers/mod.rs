//! Ring stream buffers for streamed vertex and index data.

mod stream;

pub use stream::{StreamBuffer, SYNC_SECTORS};

/// Which data class a stream buffer carries. The device side keeps one
/// backing buffer per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferClass {
    Vertex,
    Index,
}

/// Round `value` up to the nearest multiple of `alignment`.
/// `alignment` must be > 0.
pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment > 0);
    (value + alignment - 1) / alignment * alignment
}
