//! Optional diagnostic output, gated by config flags.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::debug;

/// Receives per-flush diagnostic dumps when they are enabled.
pub trait DiagnosticSink {
    /// Write shader source text to `path`.
    fn write_text(&mut self, path: &Path, contents: &str) -> Result<()>;

    /// Save an image of the current render target to `path`.
    fn save_render_target(&mut self, path: &Path) -> Result<()>;
}

/// Discards all diagnostics.
#[derive(Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn write_text(&mut self, _path: &Path, _contents: &str) -> Result<()> {
        Ok(())
    }

    fn save_render_target(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Writes text dumps to the filesystem. Render-target readback needs device
/// support, so this sink only records that it was requested.
#[derive(Debug, Default)]
pub struct FsSink;

impl DiagnosticSink for FsSink {
    fn write_text(&mut self, path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents)
            .with_context(|| format!("Error writing shader dump to {}", path.display()))
    }

    fn save_render_target(&mut self, path: &Path) -> Result<()> {
        debug!(
            "Render target dump requested at {} but this sink has no device readback",
            path.display()
        );
        Ok(())
    }
}
