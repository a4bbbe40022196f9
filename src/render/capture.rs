//! Offscreen capture of the live preview
//!
//! Re-runs the preview draw into an offscreen framebuffer sized to the
//! display resolution and reads the pixels back, producing a snapshot of
//! exactly what is on screen without disturbing the live rendering state.

use std::num::NonZeroU32;
use std::time::Instant;

use glow::HasContext;
use tracing::debug;

use crate::error::CaptureError;

use super::layout::CropLayout;
use super::pipeline::GpuPipeline;

/// Color interpretation of a snapshot's pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Standard non-linear sRGB
    #[default]
    Srgb,
    /// No color space information available
    Untagged,
}

/// A captured frame of the preview at display resolution.
///
/// Rows are in conventional top-to-bottom order; pixels are tightly packed
/// RGBA.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in device pixels
    pub width: u32,
    /// Frame height in device pixels
    pub height: u32,
    /// Color interpretation of `data`
    pub color_space: ColorSpace,
    /// Timestamp when the snapshot was taken
    pub timestamp: Instant,
}

impl Snapshot {
    pub fn new(data: Vec<u8>, width: u32, height: u32, color_space: ColorSpace) -> Self {
        Self {
            data,
            width,
            height,
            color_space,
            timestamp: Instant::now(),
        }
    }

    /// Snapshot dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Reverse the row order of a tightly packed RGBA buffer: source row
/// `height - 1 - y` becomes destination row `y`. Readback delivers rows
/// bottom-to-top while snapshots are top-to-bottom.
pub(crate) fn flip_rows(src: &[u8], width: usize, height: usize) -> Vec<u8> {
    let stride = width * 4;
    let mut dst = vec![0u8; src.len()];
    for y in 0..height {
        let s = (height - 1 - y) * stride;
        dst[y * stride..(y + 1) * stride].copy_from_slice(&src[s..s + stride]);
    }
    dst
}

/// GL bindings touched by a capture, saved before and restored after so the
/// next live draw observes the exact state it left behind.
struct SavedBindings {
    framebuffer: Option<glow::NativeFramebuffer>,
    viewport: [i32; 4],
    program: Option<glow::NativeProgram>,
    vao: Option<glow::NativeVertexArray>,
}

impl SavedBindings {
    unsafe fn save(gl: &glow::Context) -> Self {
        let mut viewport = [0i32; 4];
        gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);
        Self {
            framebuffer: NonZeroU32::new(gl.get_parameter_i32(glow::FRAMEBUFFER_BINDING) as u32)
                .map(glow::NativeFramebuffer),
            viewport,
            program: NonZeroU32::new(gl.get_parameter_i32(glow::CURRENT_PROGRAM) as u32)
                .map(glow::NativeProgram),
            vao: NonZeroU32::new(gl.get_parameter_i32(glow::VERTEX_ARRAY_BINDING) as u32)
                .map(glow::NativeVertexArray),
        }
    }

    unsafe fn restore(&self, gl: &glow::Context) {
        gl.bind_framebuffer(glow::FRAMEBUFFER, self.framebuffer);
        gl.viewport(
            self.viewport[0],
            self.viewport[1],
            self.viewport[2],
            self.viewport[3],
        );
        gl.use_program(self.program);
        gl.bind_vertex_array(self.vao);
    }
}

/// Offscreen texture + framebuffer pair sized to the display resolution.
///
/// Lazily (re)allocated only when the requested size differs from the last
/// allocation; exclusively owned here and never touched by the live draw
/// path.
pub struct CaptureTarget {
    texture: Option<glow::NativeTexture>,
    framebuffer: Option<glow::NativeFramebuffer>,
    size: Option<(i32, i32)>,
}

impl CaptureTarget {
    pub fn new() -> Self {
        Self {
            texture: None,
            framebuffer: None,
            size: None,
        }
    }

    /// (Re)allocate the offscreen pair if the requested size changed.
    ///
    /// On an incomplete framebuffer the partial allocation is torn down and
    /// nulled so the next attempt starts clean.
    pub fn ensure_target(
        &mut self,
        gl: &glow::Context,
        width: i32,
        height: i32,
    ) -> Result<(), CaptureError> {
        if self.size == Some((width, height)) && self.framebuffer.is_some() {
            return Ok(());
        }

        self.release(gl);

        unsafe {
            let tex = gl
                .create_texture()
                .map_err(|e| CaptureError::Create(format!("create_texture failed: {e:?}")))?;
            gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            // NEAREST is enough for an offscreen capture target
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::NEAREST as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::NEAREST as i32,
            );
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                None,
            );

            let fbo = match gl.create_framebuffer() {
                Ok(fbo) => fbo,
                Err(e) => {
                    gl.delete_texture(tex);
                    return Err(CaptureError::Create(format!(
                        "create_framebuffer failed: {e:?}"
                    )));
                }
            };
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(tex),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.bind_texture(glow::TEXTURE_2D, None);

            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_texture(tex);
                gl.delete_framebuffer(fbo);
                self.texture = None;
                self.framebuffer = None;
                self.size = None;
                return Err(CaptureError::FramebufferIncomplete(status));
            }

            self.texture = Some(tex);
            self.framebuffer = Some(fbo);
            self.size = Some((width, height));
            debug!("capture target allocated at {}x{}", width, height);
        }

        Ok(())
    }

    /// Snapshot exactly what is on screen, at full device-pixel resolution.
    ///
    /// Returns `Ok(None)` when a prerequisite (program, vertex array, live
    /// texture or layout) is missing: the preview simply is not ready yet.
    /// The draw is replayed into the capture framebuffer rather than read
    /// from a previously rendered buffer, so the result always reflects the
    /// crop state at the moment of the call. Every binding touched is saved
    /// and restored so the live loop is unaffected.
    pub fn snapshot(
        &mut self,
        gl: &glow::Context,
        pipeline: &GpuPipeline,
        layout: Option<&CropLayout>,
    ) -> Result<Option<Snapshot>, CaptureError> {
        if pipeline.is_context_lost() {
            return Ok(None);
        }
        let (Some(program), Some(vao), Some(live_texture)) =
            (pipeline.program(), pipeline.vao(), pipeline.live_texture())
        else {
            return Ok(None);
        };
        let Some(layout) = layout else {
            return Ok(None);
        };

        let (width, height) = layout.device_size();
        if width <= 0 || height <= 0 {
            return Ok(None);
        }

        let saved = unsafe { SavedBindings::save(gl) };

        if let Err(e) = self.ensure_target(gl, width, height) {
            unsafe { saved.restore(gl) };
            return Err(e);
        }

        let data = unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, self.framebuffer);
            gl.viewport(0, 0, width, height);
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(live_texture));
            gl.use_program(Some(program));
            gl.bind_vertex_array(Some(vao));
            gl.draw_arrays(glow::TRIANGLES, 0, 3);
            gl.bind_vertex_array(None);

            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            let mut pixels = vec![0u8; (width * height * 4) as usize];
            gl.read_pixels(
                0,
                0,
                width,
                height,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(&mut pixels),
            );

            saved.restore(gl);

            flip_rows(&pixels, width as usize, height as usize)
        };

        Ok(Some(Snapshot::new(
            data,
            width as u32,
            height as u32,
            ColorSpace::Srgb,
        )))
    }

    /// The context is gone: drop references without touching it.
    pub fn invalidate(&mut self) {
        self.texture = None;
        self.framebuffer = None;
        self.size = None;
    }

    /// Deterministic release of the offscreen pair.
    pub fn release(&mut self, gl: &glow::Context) {
        unsafe {
            if let Some(tex) = self.texture.take() {
                gl.delete_texture(tex);
            }
            if let Some(fbo) = self.framebuffer.take() {
                gl.delete_framebuffer(fbo);
            }
        }
        self.size = None;
    }
}

impl Default for CaptureTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_rows(rows: &[[u8; 4]]) -> Vec<u8> {
        rows.iter().flatten().copied().collect()
    }

    #[test]
    fn test_flip_rows_reverses_row_order() {
        // 1x3 image: rows a, b, c from the bottom up
        let src = rgba_rows(&[[1, 1, 1, 255], [2, 2, 2, 255], [3, 3, 3, 255]]);
        let flipped = flip_rows(&src, 1, 3);
        assert_eq!(
            flipped,
            rgba_rows(&[[3, 3, 3, 255], [2, 2, 2, 255], [1, 1, 1, 255]])
        );
    }

    #[test]
    fn test_flip_rows_preserves_pixels_within_a_row() {
        // 2x2 image with distinct pixels
        let src = rgba_rows(&[
            [10, 0, 0, 255],
            [20, 0, 0, 255],
            [30, 0, 0, 255],
            [40, 0, 0, 255],
        ]);
        let flipped = flip_rows(&src, 2, 2);
        assert_eq!(
            flipped,
            rgba_rows(&[
                [30, 0, 0, 255],
                [40, 0, 0, 255],
                [10, 0, 0, 255],
                [20, 0, 0, 255],
            ])
        );
    }

    #[test]
    fn test_flip_rows_is_an_involution() {
        let src: Vec<u8> = (0u8..=255).cycle().take(4 * 3 * 5).collect();
        assert_eq!(flip_rows(&flip_rows(&src, 3, 5), 3, 5), src);
    }

    #[test]
    fn test_identical_input_yields_identical_snapshots() {
        // Two captures of the same readback must be pixel-identical.
        let src: Vec<u8> = (0u8..=255).cycle().take(4 * 4 * 4).collect();
        assert_eq!(flip_rows(&src, 4, 4), flip_rows(&src, 4, 4));
    }

    #[test]
    fn test_snapshot_defaults_to_srgb() {
        let snap = Snapshot::new(vec![0; 4], 1, 1, ColorSpace::default());
        assert_eq!(snap.color_space, ColorSpace::Srgb);
        assert_eq!(snap.dimensions(), (1, 1));
    }
}
