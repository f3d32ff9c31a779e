//! The seam to the shader program cache.

use anyhow::Result;

/// Which shader variant a draw pass needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassVariant {
    /// Regular rendering, no destination-alpha handling.
    Standard,

    /// Regular rendering and destination alpha in one pass. Only valid when
    /// the platform supports dual-source blending.
    DualSourceBlend,

    /// Second pass of the fallback: writes the alpha channel only.
    AlphaOnly,
}

/// Vertex and fragment source of the bound program, for diagnostics.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

/// Selects and binds shader programs for the streaming core.
///
/// Program compilation and caching live behind this trait and are not part
/// of the streaming core.
pub trait ShaderBinder {
    /// Bind the program for `variant` and the given vertex component mask.
    fn select_variant(&mut self, variant: PassVariant, components: u32) -> Result<()>;

    /// Upload per-frame shader constants. Called once per flush, never per
    /// pass.
    fn upload_frame_constants(&mut self) -> Result<()>;

    /// Source text of the currently bound program, if the binder keeps it.
    fn active_source(&self) -> Option<ShaderSource> {
        None
    }
}

/// Binder used when no shader cache is attached.
#[derive(Debug, Default)]
pub struct NullBinder;

impl ShaderBinder for NullBinder {
    fn select_variant(&mut self, _variant: PassVariant, _components: u32) -> Result<()> {
        Ok(())
    }

    fn upload_frame_constants(&mut self) -> Result<()> {
        Ok(())
    }
}
