//! Streams a few triangles through the vertex manager against the no-op
//! graphics context, with and without the destination-alpha fallback.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use ribbon_stream::{
    context::{GpuContext, NullContext},
    diag::NullSink,
    error::full_error_display,
    format::VertexFormat,
    shader::NullBinder,
    StreamingConfigBuilder, VertexManager,
};
use ribbon_types::{BlendMode, Capabilities, ColorMask};

/// Position (3 floats) + colour (4 floats) + padding, 32 bytes per vertex.
struct DemoFormat;

impl VertexFormat for DemoFormat {
    fn stride(&self) -> u32 {
        32
    }

    fn components(&self) -> u32 {
        0b11
    }

    fn id(&self) -> u64 {
        1
    }

    fn bind_attribute_pointers(&self, _ctx: &mut dyn GpuContext) -> Result<()> {
        Ok(())
    }
}

fn main() {
    TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .unwrap();

    if let Err(err) = run() {
        log::error!("{}", full_error_display(err));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = StreamingConfigBuilder::default()
        .vertex_batch_size(64 * 1024_usize)
        .index_batch_len(16 * 1024_usize)
        .build()
        .context("Error building streaming config")?;

    // No dual-source blending, so the destination-alpha flush below takes
    // the two-pass fallback.
    let caps = Capabilities {
        primitive_restart: true,
        dual_source_blend: false,
        base_vertex: true,
    };

    let mut manager = VertexManager::new(
        Box::new(NullContext::default()),
        Box::new(NullBinder),
        Box::new(NullSink),
        caps,
        config,
    )
    .context("Error creating vertex manager")?;

    manager.set_vertex_format(Arc::new(DemoFormat));
    manager.set_blend_mode(BlendMode {
        enable: true,
        subtract: false,
        mask: ColorMask::ALL,
    });

    let stride = 32;

    // A regular batch.
    manager.reset_buffer(stride)?;
    write_triangles(&mut manager, 2)?;
    manager.flush(false).context("Error flushing batch")?;

    // A batch that needs destination alpha: two draws on this platform.
    manager.reset_buffer(stride)?;
    write_triangles(&mut manager, 1)?;
    manager.flush(true).context("Error flushing dst-alpha batch")?;

    let stats = manager.stats();
    info!(
        "Streamed {} vertex bytes, {} index bytes, {} draw calls",
        stats.vertex_bytes_streamed, stats.index_bytes_streamed, stats.indexed_draw_calls
    );

    Ok(())
}

fn write_triangles(manager: &mut VertexManager, count: u32) -> Result<()> {
    let bytes = manager.vertex_data_mut()?;
    for byte in bytes[..count as usize * 3 * 32].iter_mut() {
        *byte = 0;
    }
    manager.add_triangles(count)?;
    Ok(())
}
