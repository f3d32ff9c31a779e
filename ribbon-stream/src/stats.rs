//! Per-frame streaming counters.

/// Counters accumulated across the flushes of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Bytes of vertex data committed this frame.
    pub vertex_bytes_streamed: u64,

    /// Bytes of index data committed this frame.
    pub index_bytes_streamed: u64,

    /// Indexed draw calls issued this frame.
    pub indexed_draw_calls: u64,
}

impl FrameStats {
    pub fn reset(&mut self) {
        *self = FrameStats::default();
    }
}
