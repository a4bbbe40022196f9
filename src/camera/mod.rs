//! Camera stream orchestration
//!
//! Owns media stream acquisition and release, and wires capture taps into
//! the preprocessing + recognition pipeline. Failures from user actions are
//! surfaced as localized messages ready for display; per-frame rendering
//! failures never reach this layer.

pub mod stream;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::render::{CameraRenderer, TapEvent};
use crate::vision::{
    vocabulary, BinarizeSettings, Binarizer, RecognizerFactory, RecognizerSettings, ScanPipeline,
    ScanResult,
};

pub use stream::{
    CameraBackend, FacingMode, FrameUnavailable, MediaStream, StreamConstraints, VideoSource,
};

/// Localized message shown when the camera cannot be acquired.
pub const CAMERA_ACCESS_FAILED: &str = "カメラへのアクセスに失敗しました。";
/// Localized message shown when capture processing fails.
pub const PROCESSING_FAILED: &str = "画像処理に失敗しました。";

/// A failure carrying a message suitable for direct display to the user.
///
/// The underlying cause is kept for logs; the message is what the UI shows.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct UserFacingError {
    /// Localized display message
    pub message: &'static str,
    /// Underlying cause
    pub cause: anyhow::Error,
}

/// Orchestrates the camera stream and the tap-to-scan chain.
pub struct CameraProvider {
    backend: Box<dyn CameraBackend>,
    constraints: StreamConstraints,
    scan: ScanPipeline,
    stream: Option<Box<dyn MediaStream>>,
}

impl CameraProvider {
    pub fn new(
        backend: Box<dyn CameraBackend>,
        recognizers: Box<dyn RecognizerFactory>,
        config: &AppConfig,
    ) -> Self {
        let constraints = StreamConstraints {
            facing: config.camera.facing,
            ideal_width: config.camera.ideal_width,
            ideal_height: config.camera.ideal_height,
        };
        let scan = ScanPipeline::new(
            Binarizer::new(BinarizeSettings {
                blur_sigma: config.preprocessing.blur_sigma,
                threshold_block_radius: config.preprocessing.threshold_block_radius,
            }),
            recognizers,
            RecognizerSettings {
                language: config.recognition.language.clone(),
                char_whitelist: vocabulary::char_whitelist(),
            },
        );

        Self {
            backend,
            constraints,
            scan,
            stream: None,
        }
    }

    /// Acquire the camera stream. A no-op when already streaming.
    pub async fn start(&mut self) -> Result<(), UserFacingError> {
        if self.stream.is_some() {
            return Ok(());
        }

        info!(
            "acquiring camera stream ({:?}, ideal {}x{})",
            self.constraints.facing, self.constraints.ideal_width, self.constraints.ideal_height
        );
        match self.backend.open(&self.constraints).await {
            Ok(stream) => {
                self.stream = Some(stream);
                info!("camera stream acquired");
                Ok(())
            }
            Err(cause) => {
                warn!("camera acquisition failed: {cause:#}");
                Err(UserFacingError {
                    message: CAMERA_ACCESS_FAILED,
                    cause,
                })
            }
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Drive one scheduled render tick. Stops the renderer when the stream
    /// has ended; returns whether the caller should schedule another tick.
    pub fn tick(&mut self, renderer: &mut CameraRenderer) -> bool {
        let Some(stream) = self.stream.as_ref() else {
            return false;
        };
        if stream.ended() {
            renderer.stop();
            return false;
        }

        let (width, height) = stream.source().dimensions();
        if width > 0 && height > 0 {
            renderer.set_video_dimensions(width, height);
        }
        renderer.on_tick(stream.source())
    }

    /// Process a capture tap: binarize the snapshot, recognize text and
    /// resolve it against the facility vocabulary.
    pub async fn handle_tap(&self, tap: &TapEvent) -> Result<ScanResult, UserFacingError> {
        match self.scan.scan(&tap.snapshot).await {
            Ok(result) => {
                info!(
                    "tap at ({}, {}) resolved to {:?}",
                    tap.x, tap.y, result.facility
                );
                Ok(result)
            }
            Err(cause) => {
                warn!("capture processing failed: {cause:#}");
                Err(UserFacingError {
                    message: PROCESSING_FAILED,
                    cause,
                })
            }
        }
    }

    /// Stop all tracks and release the stream. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("camera stream released");
        }
    }
}

impl Drop for CameraProvider {
    fn drop(&mut self) {
        self.stop();
    }
}
