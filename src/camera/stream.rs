//! Media stream boundary
//!
//! Platform camera access lives behind these traits: the orchestrator asks a
//! backend for a stream matching its constraints, borrows the stream's video
//! source for rendering, and stops every track on teardown.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::render::{FrameUnavailable, VideoSource};

/// Which physical camera to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera, pointed away from the user. Preferred for signage.
    #[default]
    Environment,
    /// Front camera.
    User,
}

/// Device-selection hints for stream acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Preferred camera facing; a hint, not a requirement.
    pub facing: FacingMode,
    /// Ideal capture width in pixels.
    pub ideal_width: u32,
    /// Ideal capture height in pixels.
    pub ideal_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// An acquired camera stream.
pub trait MediaStream: Send {
    /// The live video source backing the stream.
    fn source(&self) -> &dyn VideoSource;
    /// Whether the underlying track has signalled end-of-stream.
    fn ended(&self) -> bool;
    /// Stop all tracks. Idempotent.
    fn stop(&mut self);
}

/// Platform camera access.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Acquire a stream matching the constraints as closely as the device
    /// allows.
    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn MediaStream>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints_prefer_environment_camera() {
        let c = StreamConstraints::default();
        assert_eq!(c.facing, FacingMode::Environment);
        assert_eq!(c.ideal_width, 1280);
        assert_eq!(c.ideal_height, 720);
    }
}
