//! Streaming configuration.

use std::path::PathBuf;

/// Sizes and diagnostic switches for the vertex manager.
///
/// Buffer capacities bound how much geometry can be in flight at once;
/// batch sizes bound how much one `reset_buffer`/`flush` cycle may emit.
/// Each batch capacity must fit inside its stream buffer.
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct StreamingConfig {
    /// Total vertex ring buffer capacity in bytes.
    pub vertex_buffer_size: usize,

    /// Total index ring buffer capacity in bytes.
    pub index_buffer_size: usize,

    /// Bytes of vertex data reserved per batch.
    pub vertex_batch_size: usize,

    /// Indices reserved per batch.
    pub index_batch_len: usize,

    /// Dump bound shader source after each flush.
    pub dump_shaders: bool,

    /// Dump the render target after each flush.
    pub dump_targets: bool,

    /// Directory diagnostic dumps are written to.
    pub dump_path: PathBuf,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        StreamingConfig {
            vertex_buffer_size: 4 * 1024 * 1024,
            index_buffer_size: 1024 * 1024,
            vertex_batch_size: 512 * 1024,
            index_batch_len: 64 * 1024,
            dump_shaders: false,
            dump_targets: false,
            dump_path: PathBuf::from("."),
        }
    }
}
