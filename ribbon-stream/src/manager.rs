//! Collects batched geometry in the stream buffers and submits it to the
//! device, including the two-pass destination-alpha fallback.

use crate::{
    buffers::{BufferClass, StreamBuffer},
    config::StreamingConfig,
    context::GpuContext,
    diag::DiagnosticSink,
    error::UsageError,
    format::VertexFormat,
    index::IndexGenerator,
    shader::{PassVariant, ShaderBinder},
    stats::FrameStats,
};

use std::{convert::TryFrom, slice, sync::Arc};

use anyhow::{Context, Result};
use arrayvec::ArrayVec;
use log::{debug, error, warn};
use ribbon_types::{BlendMode, Capabilities, ColorMask, Primitive};

/// Owns both stream buffers and drives one batch through the
/// map/write/flush cycle per call sequence:
/// [`reset_buffer`](VertexManager::reset_buffer), raw vertex writes through
/// [`vertex_data_mut`](VertexManager::vertex_data_mut), primitive recording,
/// then [`flush`](VertexManager::flush).
///
/// Everything happens on one rendering thread; the only synchronisation is
/// the stream buffers' fencing against the device's asynchronous reads.
pub struct VertexManager {
    ctx: Box<dyn GpuContext>,
    shaders: Box<dyn ShaderBinder>,
    diag: Box<dyn DiagnosticSink>,

    caps: Capabilities,
    config: StreamingConfig,

    vertex_buffer: StreamBuffer,
    index_buffer: StreamBuffer,
    index_gen: IndexGenerator,

    /// Vertex the committed indices count from, derived from the vertex
    /// mapping offset.
    base_vertex: u32,

    /// Byte offset of the committed index range.
    index_offset: usize,

    current_primitive: Primitive,

    format: Option<Arc<dyn VertexFormat>>,
    last_bound_format: Option<u64>,
    blend: BlendMode,

    /// Numbers the diagnostic dump files.
    save_target_id: u32,

    /// Set when the producer touched the render target since the last
    /// flush; cleared at the end of every flush.
    target_cache_dirty: bool,

    stats: FrameStats,
}

impl VertexManager {
    pub fn new(
        ctx: Box<dyn GpuContext>,
        shaders: Box<dyn ShaderBinder>,
        diag: Box<dyn DiagnosticSink>,
        caps: Capabilities,
        config: StreamingConfig,
    ) -> Result<Self> {
        let vertex_buffer = StreamBuffer::new(BufferClass::Vertex, config.vertex_buffer_size);
        let index_buffer = StreamBuffer::new(BufferClass::Index, config.index_buffer_size);

        if config.vertex_batch_size > vertex_buffer.capacity()
            || config.index_batch_len * 2 > index_buffer.capacity()
        {
            return Err(UsageError::BatchTooLarge).context("Error validating streaming config");
        }

        Ok(VertexManager {
            ctx,
            shaders,
            diag,
            caps,
            config,
            vertex_buffer,
            index_buffer,
            index_gen: IndexGenerator::default(),
            base_vertex: 0,
            index_offset: 0,
            current_primitive: Primitive::Triangles,
            format: None,
            last_bound_format: None,
            blend: BlendMode::default(),
            save_target_id: 0,
            target_cache_dirty: false,
            stats: FrameStats::default(),
        })
    }

    /// Open a fresh batch: map both buffers at full batch capacity and
    /// restart index generation against the new index mapping.
    pub fn reset_buffer(&mut self, stride: u32) -> Result<()> {
        let stride = stride.max(1) as usize;

        let vertex_offset = self
            .vertex_buffer
            .map(self.ctx.as_mut(), self.config.vertex_batch_size, stride)
            .context("Error mapping vertex stream buffer")?;
        self.base_vertex = (vertex_offset / stride) as u32;

        self.index_offset = self
            .index_buffer
            .map(self.ctx.as_mut(), self.config.index_batch_len * 2, 2)
            .context("Error mapping index stream buffer")?;

        // Without base-vertex draws the base is folded into the indices as
        // they are generated; both paths must reference identical vertices.
        let base = if self.caps.base_vertex {
            0
        } else {
            u16::try_from(self.base_vertex).unwrap_or_else(|_| {
                warn!(
                    "Base vertex {} does not fit 16-bit indices; wrapping",
                    self.base_vertex
                );
                self.base_vertex as u16
            })
        };
        self.index_gen.start(base, self.caps.primitive_restart);

        Ok(())
    }

    /// The mapped vertex region the producer writes raw vertex data into.
    /// Exactly `num_verts() * stride` bytes of it are committed at flush.
    pub fn vertex_data_mut(&mut self) -> Result<&mut [u8]> {
        self.vertex_buffer
            .mapped_mut()
            .context("Error accessing vertex mapping")
    }

    pub fn add_points(&mut self, count: u32) -> Result<()> {
        self.current_primitive = Primitive::Points;
        let dst = index_dest(&mut self.index_buffer)?;
        self.index_gen
            .add_points(dst, count)
            .context("Error adding points to batch")
    }

    pub fn add_lines(&mut self, count: u32) -> Result<()> {
        self.current_primitive = Primitive::Lines;
        let dst = index_dest(&mut self.index_buffer)?;
        self.index_gen
            .add_lines(dst, count)
            .context("Error adding lines to batch")
    }

    pub fn add_triangles(&mut self, count: u32) -> Result<()> {
        self.current_primitive = Primitive::Triangles;
        let dst = index_dest(&mut self.index_buffer)?;
        self.index_gen
            .add_triangles(dst, count)
            .context("Error adding triangles to batch")
    }

    /// Indices emitted into the current batch.
    pub fn index_len(&self) -> u32 {
        self.index_gen.index_len()
    }

    /// Distinct vertices referenced by the current batch.
    pub fn num_verts(&self) -> u32 {
        self.index_gen.num_verts()
    }

    pub fn set_vertex_format(&mut self, format: Arc<dyn VertexFormat>) {
        self.format = Some(format);
    }

    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        self.blend = blend;
    }

    pub fn mark_target_cache_dirty(&mut self) {
        self.target_cache_dirty = true;
    }

    pub fn target_cache_dirty(&self) -> bool {
        self.target_cache_dirty
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn reset_frame_stats(&mut self) {
        self.stats.reset();
    }

    /// Commit exactly the bytes the batch actually emitted. Committing the
    /// full reserved capacity instead would waste fence-tracked space.
    pub fn prepare_draw_buffers(&mut self, stride: u32) -> Result<()> {
        let vertex_bytes = self.index_gen.num_verts() as usize * stride as usize;
        let index_bytes = self.index_gen.index_len() as usize * 2;

        self.vertex_buffer
            .unmap(self.ctx.as_mut(), vertex_bytes)
            .context("Error committing vertex data")?;
        self.index_buffer
            .unmap(self.ctx.as_mut(), index_bytes)
            .context("Error committing index data")?;

        self.stats.vertex_bytes_streamed += vertex_bytes as u64;
        self.stats.index_bytes_streamed += index_bytes as u64;

        Ok(())
    }

    /// Submit one indexed draw over the committed range. Draw rejection is
    /// logged and the frame continues; there is no retry.
    fn draw(&mut self) {
        let index_count = self.index_gen.index_len();
        if index_count == 0 {
            debug!("Skipping draw of empty batch");
            return;
        }

        let topology = match self.current_primitive {
            Primitive::Triangles if self.caps.primitive_restart => Primitive::TriangleStrip,
            p => p,
        };
        let base_vertex = if self.caps.base_vertex {
            self.base_vertex
        } else {
            0
        };

        match self
            .ctx
            .draw_indexed(topology, self.index_offset, index_count, base_vertex)
        {
            Ok(()) => self.stats.indexed_draw_calls += 1,
            Err(e) => error!("Error submitting indexed draw: {}", e),
        }
    }

    /// Flush the current batch to the device.
    ///
    /// With dual-source blending one draw covers both regular rendering and
    /// destination alpha. Without it, `use_dst_alpha` forces a second,
    /// alpha-only draw with colour writes masked off and blending disabled,
    /// restoring blend state afterwards.
    pub fn flush(&mut self, use_dst_alpha: bool) -> Result<()> {
        let format = self
            .format
            .clone()
            .ok_or(UsageError::NoVertexFormat)
            .context("Error flushing batch")?;
        let stride = format.stride();

        // Only rebind the layout when the active format actually changed.
        if self.last_bound_format != Some(format.id()) {
            if let Err(e) = self.ctx.bind_vertex_layout(format.id()) {
                error!("Error binding vertex layout: {}", e);
            }
            self.last_bound_format = Some(format.id());
        }

        self.prepare_draw_buffers(stride)?;

        let dual_source = self.caps.dual_source_blend;

        let mut passes: ArrayVec<[PassVariant; 2]> = ArrayVec::new();
        passes.push(if dual_source && use_dst_alpha {
            PassVariant::DualSourceBlend
        } else {
            PassVariant::Standard
        });
        if use_dst_alpha && !dual_source {
            passes.push(PassVariant::AlphaOnly);
        }

        for (pass, variant) in passes.into_iter().enumerate() {
            if let Err(e) = self.shaders.select_variant(variant, format.components()) {
                error!("Error selecting shader variant {:?}: {}", variant, e);
            }

            if pass == 0 {
                // Per-frame constants are uploaded once per flush, never
                // per pass.
                if let Err(e) = self.shaders.upload_frame_constants() {
                    error!("Error uploading frame constants: {}", e);
                }

                if let Err(e) = format.bind_attribute_pointers(self.ctx.as_mut()) {
                    error!("Error binding vertex attribute pointers: {}", e);
                }

                self.draw();
            } else {
                // Alpha-only fallback pass: only the alpha channel is
                // written and blending must not apply.
                self.apply_ctx(|ctx| ctx.set_color_mask(ColorMask::ALPHA_ONLY));
                self.apply_ctx(|ctx| ctx.set_blend_enabled(false));

                self.draw();

                let blend = self.blend;
                self.apply_ctx(|ctx| ctx.set_color_mask(blend.mask));
                if blend.enable || blend.subtract {
                    self.apply_ctx(|ctx| ctx.set_blend_enabled(true));
                }
            }
        }

        self.dump_diagnostics();

        self.save_target_id += 1;
        self.target_cache_dirty = false;

        Ok(())
    }

    /// Run a context call under the log-and-continue policy.
    fn apply_ctx(&mut self, f: impl FnOnce(&mut dyn GpuContext) -> Result<()>) {
        if let Err(e) = f(self.ctx.as_mut()) {
            error!("Graphics context error: {}", e);
        }
    }

    fn dump_diagnostics(&mut self) {
        if self.config.dump_shaders {
            if let Some(source) = self.shaders.active_source() {
                let ps = self
                    .config
                    .dump_path
                    .join(format!("ps{:03}.txt", self.save_target_id));
                if let Err(e) = self.diag.write_text(&ps, &source.fragment) {
                    error!("Error dumping fragment shader: {}", e);
                }

                let vs = self
                    .config
                    .dump_path
                    .join(format!("vs{:03}.txt", self.save_target_id));
                if let Err(e) = self.diag.write_text(&vs, &source.vertex) {
                    error!("Error dumping vertex shader: {}", e);
                }
            }
        }

        if self.config.dump_targets {
            let path = self
                .config
                .dump_path
                .join(format!("targ{:03}.png", self.save_target_id));
            if let Err(e) = self.diag.save_render_target(&path) {
                error!("Error dumping render target: {}", e);
            }
        }
    }
}

/// View the mapped index region as 16-bit indices. The mapping is 2-aligned
/// inside an 8-aligned slab.
fn index_dest(buf: &mut StreamBuffer) -> Result<&mut [u16]> {
    let bytes = buf
        .mapped_mut()
        .context("Error accessing index mapping")?;
    Ok(unsafe { slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut u16, bytes.len() / 2) })
}
