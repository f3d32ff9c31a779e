//! End-to-end batch scenarios driven through recording collaborators.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Result;

use ribbon_stream::{
    buffers::BufferClass,
    context::{FenceId, GpuContext},
    diag::DiagnosticSink,
    format::VertexFormat,
    shader::{PassVariant, ShaderBinder, ShaderSource},
    StreamingConfig, StreamingConfigBuilder, VertexManager,
};
use ribbon_types::{BlendMode, Capabilities, ColorMask, Primitive};

/// Everything the manager asked the device to do, in order.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Upload {
        class: BufferClass,
        offset: usize,
        data: Vec<u8>,
    },
    BindLayout(u64),
    SetColorMask(ColorMask),
    SetBlendEnabled(bool),
    Draw {
        topology: Primitive,
        index_offset: usize,
        index_count: u32,
        base_vertex: u32,
    },
}

#[derive(Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    next_fence: FenceId,
}

impl GpuContext for Recorder {
    fn upload(&mut self, class: BufferClass, offset: usize, data: &[u8]) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Upload {
            class,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn insert_fence(&mut self) -> Result<FenceId> {
        self.next_fence += 1;
        Ok(self.next_fence)
    }

    fn wait_fence(&mut self, _fence: FenceId) -> Result<()> {
        Ok(())
    }

    fn bind_vertex_layout(&mut self, format_id: u64) -> Result<()> {
        self.calls.lock().unwrap().push(Call::BindLayout(format_id));
        Ok(())
    }

    fn set_color_mask(&mut self, mask: ColorMask) -> Result<()> {
        self.calls.lock().unwrap().push(Call::SetColorMask(mask));
        Ok(())
    }

    fn set_blend_enabled(&mut self, enabled: bool) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::SetBlendEnabled(enabled));
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        topology: Primitive,
        index_offset: usize,
        index_count: u32,
        base_vertex: u32,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Draw {
            topology,
            index_offset,
            index_count,
            base_vertex,
        });
        Ok(())
    }
}

#[derive(Default)]
struct RecordingBinder {
    variants: Arc<Mutex<Vec<PassVariant>>>,
    constant_uploads: Arc<Mutex<usize>>,
}

impl ShaderBinder for RecordingBinder {
    fn select_variant(&mut self, variant: PassVariant, _components: u32) -> Result<()> {
        self.variants.lock().unwrap().push(variant);
        Ok(())
    }

    fn upload_frame_constants(&mut self) -> Result<()> {
        *self.constant_uploads.lock().unwrap() += 1;
        Ok(())
    }

    fn active_source(&self) -> Option<ShaderSource> {
        Some(ShaderSource {
            vertex: "vs source".to_string(),
            fragment: "ps source".to_string(),
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl DiagnosticSink for RecordingSink {
    fn write_text(&mut self, path: &Path, _contents: &str) -> Result<()> {
        self.paths.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn save_render_target(&mut self, path: &Path) -> Result<()> {
        self.paths.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

struct TestFormat {
    id: u64,
    stride: u32,
}

impl VertexFormat for TestFormat {
    fn stride(&self) -> u32 {
        self.stride
    }

    fn components(&self) -> u32 {
        0b111
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn bind_attribute_pointers(&self, _ctx: &mut dyn GpuContext) -> Result<()> {
        Ok(())
    }
}

fn small_config() -> StreamingConfig {
    StreamingConfigBuilder::default()
        .vertex_buffer_size(4096_usize)
        .index_buffer_size(2048_usize)
        .vertex_batch_size(1024_usize)
        .index_batch_len(256_usize)
        .build()
        .unwrap()
}

struct Harness {
    manager: VertexManager,
    calls: Arc<Mutex<Vec<Call>>>,
    variants: Arc<Mutex<Vec<PassVariant>>>,
    constant_uploads: Arc<Mutex<usize>>,
}

fn harness(caps: Capabilities, config: StreamingConfig) -> Harness {
    let recorder = Recorder::default();
    let calls = recorder.calls.clone();

    let binder = RecordingBinder::default();
    let variants = binder.variants.clone();
    let constant_uploads = binder.constant_uploads.clone();

    let mut manager = VertexManager::new(
        Box::new(recorder),
        Box::new(binder),
        Box::new(ribbon_stream::diag::NullSink),
        caps,
        config,
    )
    .unwrap();
    manager.set_vertex_format(Arc::new(TestFormat { id: 1, stride: 32 }));

    Harness {
        manager,
        calls,
        variants,
        constant_uploads,
    }
}

fn draws(calls: &[Call]) -> Vec<Call> {
    calls
        .iter()
        .filter(|c| matches!(c, Call::Draw { .. }))
        .cloned()
        .collect()
}

/// Write `count` vertices of recognisable bytes into the open mapping.
fn write_vertices(manager: &mut VertexManager, count: usize, stride: usize) {
    let data = manager.vertex_data_mut().unwrap();
    for (i, byte) in data[..count * stride].iter_mut().enumerate() {
        *byte = i as u8;
    }
}

#[test]
fn single_triangle_list_draws_once() {
    let mut h = harness(Capabilities::default(), small_config());

    h.manager.reset_buffer(32).unwrap();
    write_vertices(&mut h.manager, 3, 32);
    h.manager.add_triangles(1).unwrap();

    assert_eq!(h.manager.index_len(), 3);
    assert_eq!(h.manager.num_verts(), 3);

    h.manager.flush(false).unwrap();

    let calls = h.calls.lock().unwrap();
    let draw_calls = draws(&calls);
    assert_eq!(
        draw_calls,
        vec![Call::Draw {
            topology: Primitive::Triangles,
            index_offset: 0,
            index_count: 3,
            base_vertex: 0,
        }]
    );

    // Exactly the emitted bytes were committed, not the reserved capacity.
    let uploads: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            Call::Upload { class, data, .. } => Some((*class, data.len())),
            _ => None,
        })
        .collect();
    assert_eq!(
        uploads,
        vec![(BufferClass::Vertex, 96), (BufferClass::Index, 6)]
    );

    assert_eq!(*h.variants.lock().unwrap(), vec![PassVariant::Standard]);
}

#[test]
fn restart_capability_draws_triangle_strip() {
    let caps = Capabilities {
        primitive_restart: true,
        ..Capabilities::default()
    };
    let mut h = harness(caps, small_config());

    h.manager.reset_buffer(32).unwrap();
    write_vertices(&mut h.manager, 6, 32);
    h.manager.add_triangles(2).unwrap();
    h.manager.flush(false).unwrap();

    let calls = h.calls.lock().unwrap();
    match &draws(&calls)[..] {
        [Call::Draw {
            topology,
            index_count,
            ..
        }] => {
            assert_eq!(*topology, Primitive::TriangleStrip);
            // 4n - 1 indices with the restart sentinel between triangles.
            assert_eq!(*index_count, 7);
        }
        other => panic!("unexpected draw calls: {:?}", other),
    }
}

#[test]
fn dst_alpha_without_dual_source_draws_twice() {
    let mut h = harness(Capabilities::default(), small_config());
    h.manager.set_blend_mode(BlendMode {
        enable: true,
        subtract: false,
        mask: ColorMask::ALL,
    });

    h.manager.reset_buffer(32).unwrap();
    write_vertices(&mut h.manager, 3, 32);
    h.manager.add_triangles(1).unwrap();
    h.manager.flush(true).unwrap();

    let calls = h.calls.lock().unwrap();
    let draw_positions: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Call::Draw { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(draw_positions.len(), 2);

    // The second draw is bracketed by alpha-only state...
    let between = &calls[draw_positions[0] + 1..draw_positions[1]];
    assert!(between.contains(&Call::SetColorMask(ColorMask::ALPHA_ONLY)));
    assert!(between.contains(&Call::SetBlendEnabled(false)));

    // ...and the original state comes back afterwards, including blending,
    // since the configured blend mode requires it.
    let after = &calls[draw_positions[1] + 1..];
    assert!(after.contains(&Call::SetColorMask(ColorMask::ALL)));
    assert!(after.contains(&Call::SetBlendEnabled(true)));

    assert_eq!(
        *h.variants.lock().unwrap(),
        vec![PassVariant::Standard, PassVariant::AlphaOnly]
    );
}

#[test]
fn blend_stays_off_when_mode_does_not_require_it() {
    let mut h = harness(Capabilities::default(), small_config());
    h.manager.set_blend_mode(BlendMode::default());

    h.manager.reset_buffer(32).unwrap();
    write_vertices(&mut h.manager, 3, 32);
    h.manager.add_triangles(1).unwrap();
    h.manager.flush(true).unwrap();

    let calls = h.calls.lock().unwrap();
    let enables = calls
        .iter()
        .filter(|c| **c == Call::SetBlendEnabled(true))
        .count();
    assert_eq!(enables, 0);
}

#[test]
fn dual_source_blend_needs_one_pass() {
    let caps = Capabilities {
        dual_source_blend: true,
        ..Capabilities::default()
    };
    let mut h = harness(caps, small_config());

    h.manager.reset_buffer(32).unwrap();
    write_vertices(&mut h.manager, 3, 32);
    h.manager.add_triangles(1).unwrap();
    h.manager.flush(true).unwrap();

    let calls = h.calls.lock().unwrap();
    assert_eq!(draws(&calls).len(), 1);
    assert!(!calls
        .iter()
        .any(|c| matches!(c, Call::SetColorMask(_) | Call::SetBlendEnabled(_))));
    assert_eq!(
        *h.variants.lock().unwrap(),
        vec![PassVariant::DualSourceBlend]
    );
}

#[test]
fn frame_constants_upload_once_per_flush() {
    let mut h = harness(Capabilities::default(), small_config());

    h.manager.reset_buffer(32).unwrap();
    write_vertices(&mut h.manager, 3, 32);
    h.manager.add_triangles(1).unwrap();
    h.manager.flush(true).unwrap();

    // Two passes, one constants upload.
    assert_eq!(*h.constant_uploads.lock().unwrap(), 1);
}

#[test]
fn empty_batch_commits_nothing_and_skips_the_draw() {
    let mut h = harness(Capabilities::default(), small_config());

    h.manager.reset_buffer(32).unwrap();
    h.manager.flush(false).unwrap();

    {
        let calls = h.calls.lock().unwrap();
        assert!(draws(&calls).is_empty());
        assert!(!calls.iter().any(|c| matches!(c, Call::Upload { .. })));
    }

    // The cursor did not advance: the next batch maps at offset 0 again.
    h.manager.reset_buffer(32).unwrap();
    write_vertices(&mut h.manager, 3, 32);
    h.manager.add_triangles(1).unwrap();
    h.manager.flush(false).unwrap();

    let calls = h.calls.lock().unwrap();
    match calls
        .iter()
        .find(|c| matches!(c, Call::Upload { class, .. } if *class == BufferClass::Vertex))
    {
        Some(Call::Upload { offset, .. }) => assert_eq!(*offset, 0),
        other => panic!("expected a vertex upload, got {:?}", other),
    }
}

#[test]
fn layout_rebind_only_happens_on_format_change() {
    let mut h = harness(Capabilities::default(), small_config());

    for _ in 0..2 {
        h.manager.reset_buffer(32).unwrap();
        write_vertices(&mut h.manager, 3, 32);
        h.manager.add_triangles(1).unwrap();
        h.manager.flush(false).unwrap();
    }

    h.manager
        .set_vertex_format(Arc::new(TestFormat { id: 2, stride: 32 }));
    h.manager.reset_buffer(32).unwrap();
    write_vertices(&mut h.manager, 3, 32);
    h.manager.add_triangles(1).unwrap();
    h.manager.flush(false).unwrap();

    let calls = h.calls.lock().unwrap();
    let binds: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            Call::BindLayout(id) => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(binds, vec![1, 2]);
}

/// The with/without base-vertex paths must produce an identical effective
/// vertex for every index they emit.
#[test]
fn base_vertex_paths_are_equivalent() {
    fn effective_indices(caps: Capabilities) -> Vec<u32> {
        let mut h = harness(caps, small_config());

        // First batch advances the cursor so the second has a non-zero
        // base vertex.
        h.manager.reset_buffer(32).unwrap();
        write_vertices(&mut h.manager, 6, 32);
        h.manager.add_triangles(2).unwrap();
        h.manager.flush(false).unwrap();

        h.manager.reset_buffer(32).unwrap();
        write_vertices(&mut h.manager, 3, 32);
        h.manager.add_triangles(1).unwrap();
        h.manager.flush(false).unwrap();

        let calls = h.calls.lock().unwrap();
        let index_uploads: Vec<Vec<u16>> = calls
            .iter()
            .filter_map(|c| match c {
                Call::Upload { class, data, .. } if *class == BufferClass::Index => Some(
                    data.chunks_exact(2)
                        .map(|b| u16::from_ne_bytes([b[0], b[1]]))
                        .collect(),
                ),
                _ => None,
            })
            .collect();
        let bases: Vec<u32> = calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw { base_vertex, .. } => Some(*base_vertex),
                _ => None,
            })
            .collect();
        assert_eq!(index_uploads.len(), bases.len());

        // Effective vertex for the second batch's indices.
        index_uploads[1]
            .iter()
            .map(|i| *i as u32 + bases[1])
            .collect()
    }

    let with_base_vertex = effective_indices(Capabilities {
        base_vertex: true,
        ..Capabilities::default()
    });
    let without_base_vertex = effective_indices(Capabilities::default());

    assert_eq!(with_base_vertex, vec![6, 7, 8]);
    assert_eq!(with_base_vertex, without_base_vertex);
}

#[test]
fn flush_clears_target_cache_invalidation() {
    let mut h = harness(Capabilities::default(), small_config());

    h.manager.mark_target_cache_dirty();
    assert!(h.manager.target_cache_dirty());

    h.manager.reset_buffer(32).unwrap();
    h.manager.add_triangles(1).unwrap();
    h.manager.flush(false).unwrap();

    assert!(!h.manager.target_cache_dirty());
}

#[test]
fn shader_dumps_are_numbered_by_flush() {
    let recorder = Recorder::default();
    let binder = RecordingBinder::default();
    let sink = RecordingSink::default();
    let paths = sink.paths.clone();

    let config = StreamingConfigBuilder::default()
        .vertex_buffer_size(4096_usize)
        .index_buffer_size(2048_usize)
        .vertex_batch_size(1024_usize)
        .index_batch_len(256_usize)
        .dump_shaders(true)
        .dump_path(PathBuf::from("dumps"))
        .build()
        .unwrap();

    let mut manager = VertexManager::new(
        Box::new(recorder),
        Box::new(binder),
        Box::new(sink),
        Capabilities::default(),
        config,
    )
    .unwrap();
    manager.set_vertex_format(Arc::new(TestFormat { id: 1, stride: 32 }));

    for _ in 0..2 {
        manager.reset_buffer(32).unwrap();
        manager.add_triangles(1).unwrap();
        manager.flush(false).unwrap();
    }

    let paths = paths.lock().unwrap();
    let names: Vec<_> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["ps000.txt", "vs000.txt", "ps001.txt", "vs001.txt"]);
}
