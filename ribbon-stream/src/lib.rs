//! Batches emulated-GPU geometry into ring stream buffers and submits it to
//! the host graphics context, including the two-pass fallback for
//! destination-alpha blending on platforms without dual-source blend.
//!
//! The graphics device itself is an external collaborator reached through
//! [`context::GpuContext`]; everything here runs on one rendering thread.

#[macro_use]
extern crate derive_builder;

pub mod buffers;
pub mod config;
pub mod context;
pub mod diag;
pub mod error;
pub mod format;
pub mod index;
pub mod manager;
pub mod shader;
pub mod stats;

pub use config::{StreamingConfig, StreamingConfigBuilder};
pub use manager::VertexManager;
