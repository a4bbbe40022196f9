//! Live camera preview rendering
//!
//! GPU-rendered, aspect-cropped preview of a live video source with
//! tap-to-capture snapshots. The renderer owns the GL pipeline, the
//! offscreen capture target and the cached layout state; the host supplies
//! the context, viewport resize notifications and scheduled ticks.

pub mod capture;
pub mod layout;
pub mod pipeline;
pub mod run_loop;

use std::sync::Arc;

use glow::HasContext;
use tracing::debug;

use crate::error::{CaptureError, RenderError};

pub use capture::{CaptureTarget, ColorSpace, Snapshot};
pub use layout::{clamp_tap, compute_crop, CropLayout, UvRect, ViewportMetrics};
pub use pipeline::GpuPipeline;
pub use run_loop::{select_tick_source, LoopState, RenderLoop, SchedulerProbe, TickSource};

/// How the host should configure the GL context backing the preview.
///
/// The preview wants an opaque, non-antialiased, performance-prioritized
/// surface with no depth or stencil storage and no persisted drawing
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    pub alpha: bool,
    pub antialias: bool,
    pub depth: bool,
    pub stencil: bool,
    pub prefer_high_performance: bool,
    pub preserve_drawing_buffer: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            alpha: false,
            antialias: false,
            depth: false,
            stencil: false,
            prefer_high_performance: true,
            preserve_drawing_buffer: false,
        }
    }
}

/// Live video frame provider.
///
/// Owned by the orchestrator and borrowed by the renderer for the duration
/// of a draw. `frame_pixels` may fail while the source is not yet decodable;
/// the draw path treats that as a transient, retried condition.
pub trait VideoSource {
    /// Native pixel dimensions of the source.
    fn dimensions(&self) -> (u32, u32);
    /// Whether a displayable frame is available.
    fn is_frame_ready(&self) -> bool;
    /// Borrow the current frame as tightly packed top-to-bottom RGBA rows.
    fn frame_pixels(&self) -> Result<&[u8], FrameUnavailable>;
}

/// The current frame cannot be borrowed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameUnavailable;

/// A user-initiated capture: device-pixel tap coordinates on the canvas
/// plus a snapshot of the preview at the moment of the tap.
#[derive(Debug)]
pub struct TapEvent {
    /// Tap X in device pixels, clamped to the canvas extents
    pub x: i32,
    /// Tap Y in device pixels, clamped to the canvas extents
    pub y: i32,
    /// Preview snapshot at display resolution
    pub snapshot: Snapshot,
}

/// GPU preview renderer for a live camera stream.
pub struct CameraRenderer {
    gl: Arc<glow::Context>,
    pipeline: GpuPipeline,
    capture: CaptureTarget,
    run_loop: RenderLoop,
    overscan: f32,
    video_dimensions: Option<(u32, u32)>,
    viewport: Option<ViewportMetrics>,
    layout: Option<CropLayout>,
    canvas_size: (i32, i32),
}

impl CameraRenderer {
    pub fn new(gl: Arc<glow::Context>, overscan: f32, tick_source: TickSource) -> Self {
        Self {
            gl,
            pipeline: GpuPipeline::new(),
            capture: CaptureTarget::new(),
            run_loop: RenderLoop::new(tick_source),
            overscan,
            video_dimensions: None,
            viewport: None,
            layout: None,
            canvas_size: (0, 0),
        }
    }

    /// Compile the pipeline. Fatal on failure: the preview cannot run on
    /// this device.
    pub fn initialize(&mut self) -> Result<(), RenderError> {
        self.pipeline.initialize(&self.gl)?;

        // A layout computed before initialization has not reached the GPU
        // yet; upload it now so the first draw is not skipped.
        if let (Some((video_w, video_h)), Some(layout)) = (self.video_dimensions, self.layout) {
            self.pipeline
                .update_crop_uniform(&self.gl, &layout, video_w as f32, video_h as f32);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.run_loop.is_running()
    }

    pub fn layout(&self) -> Option<&CropLayout> {
        self.layout.as_ref()
    }

    /// Record the source's native dimensions, recomputing the crop layout
    /// when they change.
    pub fn set_video_dimensions(&mut self, width: u32, height: u32) {
        if self.video_dimensions == Some((width, height)) || width == 0 || height == 0 {
            return;
        }
        self.video_dimensions = Some((width, height));
        self.refresh_layout();
    }

    /// Apply a host resize notification, recomputing the crop layout when
    /// the metrics actually changed.
    pub fn set_viewport(&mut self, metrics: ViewportMetrics) {
        if self.viewport == Some(metrics) {
            return;
        }
        self.viewport = Some(metrics);
        self.refresh_layout();
    }

    /// Change the overscan zoom factor (clamped to a minimum of 1.0 by the
    /// layout math).
    pub fn set_overscan(&mut self, overscan: f32) {
        if self.overscan == overscan {
            return;
        }
        self.overscan = overscan;
        self.refresh_layout();
    }

    fn refresh_layout(&mut self) {
        let (Some((video_w, video_h)), Some(metrics)) = (self.video_dimensions, self.viewport)
        else {
            return;
        };
        if metrics.css_width <= 0.0 || metrics.css_height <= 0.0 {
            return;
        }

        let layout = compute_crop(
            video_w as f32,
            video_h as f32,
            metrics.css_width,
            metrics.css_height,
            metrics.device_pixel_ratio,
            self.overscan,
        );

        let device_size = layout.device_size();
        if device_size != self.canvas_size && device_size.0 > 0 && device_size.1 > 0 {
            if !self.pipeline.is_context_lost() {
                unsafe {
                    self.gl.viewport(0, 0, device_size.0, device_size.1);
                }
            }
            self.canvas_size = device_size;
            debug!(
                "preview surface resized to {}x{} device pixels",
                device_size.0, device_size.1
            );
        }

        self.pipeline
            .update_crop_uniform(&self.gl, &layout, video_w as f32, video_h as f32);
        self.layout = Some(layout);
    }

    /// One scheduled tick of the render loop. Draws the current frame while
    /// the loop is running; returns whether the caller should schedule
    /// another tick.
    pub fn on_tick(&mut self, source: &dyn VideoSource) -> bool {
        let Self {
            gl,
            pipeline,
            run_loop,
            ..
        } = self;
        run_loop.tick(|| pipeline.draw_frame(gl, source))
    }

    /// Stop the render loop. Synchronous and idempotent; no draw occurs
    /// afterwards, even for an already-queued tick.
    pub fn stop(&mut self) {
        self.run_loop.stop();
    }

    /// Capture the preview at the given CSS-space tap position.
    ///
    /// Returns `Ok(None)` while the preview is not ready to capture.
    pub fn tap(&mut self, css_x: f32, css_y: f32) -> Result<Option<TapEvent>, CaptureError> {
        let Some(layout) = self.layout else {
            return Ok(None);
        };
        let (x, y) = clamp_tap(
            css_x,
            css_y,
            layout.device_pixel_ratio,
            self.canvas_size.0,
            self.canvas_size.1,
        );
        let snapshot = self
            .capture
            .snapshot(&self.gl, &self.pipeline, Some(&layout))?;
        Ok(snapshot.map(|snapshot| TapEvent { x, y, snapshot }))
    }

    /// Capture the preview without an associated tap position.
    pub fn snapshot(&mut self) -> Result<Option<Snapshot>, CaptureError> {
        self.capture
            .snapshot(&self.gl, &self.pipeline, self.layout.as_ref())
    }

    /// The GL context was lost: all GPU resources are invalid and every
    /// draw or capture call becomes a no-op until restore.
    pub fn notify_context_lost(&mut self) {
        self.pipeline.notify_context_lost();
        self.capture.invalidate();
    }

    /// The GL context was restored: reinitialize the pipeline from scratch
    /// and re-apply the current layout. Rendering resumes without a
    /// remount.
    pub fn notify_context_restored(&mut self) -> Result<(), RenderError> {
        self.pipeline.notify_context_restored(&self.gl)?;

        if self.canvas_size.0 > 0 && self.canvas_size.1 > 0 {
            unsafe {
                self.gl.viewport(0, 0, self.canvas_size.0, self.canvas_size.1);
            }
        }
        if let (Some((video_w, video_h)), Some(layout)) = (self.video_dimensions, self.layout) {
            self.pipeline
                .update_crop_uniform(&self.gl, &layout, video_w as f32, video_h as f32);
        }
        Ok(())
    }

    /// Stop the loop and release every GL object exactly once.
    pub fn destroy(&mut self) {
        self.run_loop.stop();
        self.pipeline.destroy(&self.gl);
        if self.pipeline.is_context_lost() {
            self.capture.invalidate();
        } else {
            self.capture.release(&self.gl);
        }
    }
}
