//! Common types for all ribbon crates.

/// Topology used when submitting an indexed draw.
///
/// `TriangleStrip` only appears as a draw topology: batched triangles are
/// converted to a restart-separated strip when the platform supports
/// primitive restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    Triangles,
    TriangleStrip,
}

/// Which colour channels a draw is allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMask {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
}

impl ColorMask {
    pub const ALL: ColorMask = ColorMask {
        red: true,
        green: true,
        blue: true,
        alpha: true,
    };

    /// Used by the second pass of the destination-alpha workaround.
    pub const ALPHA_ONLY: ColorMask = ColorMask {
        red: false,
        green: false,
        blue: false,
        alpha: true,
    };
}

impl Default for ColorMask {
    fn default() -> Self {
        ColorMask::ALL
    }
}

/// The blend state configured for the current batch.
///
/// After the alpha-only pass of the destination-alpha workaround, blending is
/// re-enabled only if `enable` or `subtract` is set here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlendMode {
    /// Blending enabled for colour output.
    pub enable: bool,

    /// A subtractive blend equation is in use. Treated like `enable` when
    /// deciding whether blending must be restored.
    pub subtract: bool,

    /// The channel mask in effect outside any workaround pass.
    pub mask: ColorMask,
}

/// Platform capabilities detected once at startup. Read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// A sentinel index value may terminate one strip and begin another
    /// within a single draw call.
    pub primitive_restart: bool,

    /// Destination alpha can be produced in the same pass as regular
    /// rendering. Without it the renderer falls back to a second,
    /// alpha-only pass.
    pub dual_source_blend: bool,

    /// Indexed draws accept a base-vertex offset. Without it the base
    /// vertex must be folded into the indices as they are generated.
    pub base_vertex: bool,
}
