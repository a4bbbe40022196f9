//! Error taxonomy for the rendering core
//!
//! Fatal initialization failures are surfaced to the caller and mean the
//! preview is unusable on this device. Per-frame failures never appear here;
//! they are handled locally inside the draw path so the render loop survives.

use thiserror::Error;

/// Fatal GPU pipeline errors raised on the initialization path.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The rendering context could not be used at all.
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("vertex shader compile failed: {0}")]
    VertexCompile(String),
    #[error("fragment shader compile failed: {0}")]
    FragmentCompile(String),
    #[error("program link failed: {0}")]
    Link(String),
    #[error("uniform location not found: {0}")]
    UniformMissing(&'static str),
    #[error("gl object creation failed: {0}")]
    Create(String),
}

/// Capture-path errors. Fatal to a single capture attempt only; the live
/// render loop is unaffected.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture framebuffer incomplete: 0x{0:x}")]
    FramebufferIncomplete(u32),
    #[error("gl object creation failed: {0}")]
    Create(String),
}
