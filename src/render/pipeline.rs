//! GPU pipeline for the live preview
//!
//! Owns the compiled shader program, the attribute-less vertex array and the
//! live video texture. The vertex stage generates a fullscreen triangle from
//! `gl_VertexID`; the fragment stage samples the video texture through a
//! uniform rectangle restricting the sampled region to the current crop.

use glow::HasContext;
use tracing::{debug, warn};

use crate::error::RenderError;

use super::layout::{CropLayout, UvRect};
use super::VideoSource;

const VERT_SRC: &str = r#"#version 330 core
uniform vec4 u_uv_rect;
out vec2 v_uv;
void main() {
    vec2 pos = (gl_VertexID == 0) ? vec2(-1.0, -1.0)
             : (gl_VertexID == 1) ? vec2( 3.0, -1.0)
             :                      vec2(-1.0,  3.0);
    gl_Position = vec4(pos, 0.0, 1.0);
    vec2 base = pos * 0.5 + 0.5;
    v_uv = mix(u_uv_rect.xy, u_uv_rect.zw, base);
}
"#;

const FRAG_SRC: &str = r#"#version 330 core
in vec2 v_uv;
uniform sampler2D u_texture;
out vec4 out_color;
void main() {
    out_color = texture(u_texture, v_uv);
}
"#;

/// Compile and link the preview program.
pub(crate) unsafe fn compile_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> Result<glow::NativeProgram, RenderError> {
    let vs = gl
        .create_shader(glow::VERTEX_SHADER)
        .map_err(|e| RenderError::Create(format!("create_shader(VS) failed: {e:?}")))?;
    gl.shader_source(vs, vert_src);
    gl.compile_shader(vs);
    if !gl.get_shader_compile_status(vs) {
        let log = gl.get_shader_info_log(vs);
        gl.delete_shader(vs);
        return Err(RenderError::VertexCompile(log));
    }

    let fs = gl
        .create_shader(glow::FRAGMENT_SHADER)
        .map_err(|e| RenderError::Create(format!("create_shader(FS) failed: {e:?}")))?;
    gl.shader_source(fs, frag_src);
    gl.compile_shader(fs);
    if !gl.get_shader_compile_status(fs) {
        let log = gl.get_shader_info_log(fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        return Err(RenderError::FragmentCompile(log));
    }

    let program = gl
        .create_program()
        .map_err(|e| RenderError::Create(format!("create_program failed: {e:?}")))?;
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);

    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(RenderError::Link(log));
    }

    Ok(program)
}

/// Whether the live texture must be (re)allocated for the given native video
/// dimensions. Dimension changes are rare (camera restart), so this must not
/// trigger on every frame.
pub(crate) fn needs_realloc(allocated: Option<(u32, u32)>, video_w: u32, video_h: u32) -> bool {
    allocated != Some((video_w, video_h))
}

/// Shader program, vertex array and live video texture for the preview.
///
/// Every GL object acquired in [`initialize`](Self::initialize) is released
/// exactly once, on whichever of teardown or context loss comes first.
pub struct GpuPipeline {
    program: Option<glow::NativeProgram>,
    vao: Option<glow::NativeVertexArray>,
    u_uv_rect: Option<glow::NativeUniformLocation>,
    live_texture: Option<glow::NativeTexture>,
    live_texture_size: Option<(u32, u32)>,
    last_uv: Option<UvRect>,
    context_lost: bool,
}

impl GpuPipeline {
    pub fn new() -> Self {
        Self {
            program: None,
            vao: None,
            u_uv_rect: None,
            live_texture: None,
            live_texture_size: None,
            last_uv: None,
            context_lost: false,
        }
    }

    /// Compile the program, resolve uniforms and create the vertex array.
    ///
    /// Fatal on failure: the preview cannot run on this device. Any objects
    /// created before the failing step are released before returning.
    pub fn initialize(&mut self, gl: &glow::Context) -> Result<(), RenderError> {
        // Re-initialization releases the previous objects first so nothing
        // acquired here is ever released more or less than once.
        self.destroy(gl);

        unsafe {
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.disable(glow::DEPTH_TEST);
            gl.disable(glow::BLEND);
            gl.clear_color(0.0, 0.0, 0.0, 1.0);

            let program = compile_program(gl, VERT_SRC, FRAG_SRC)?;

            gl.use_program(Some(program));
            let u_texture = match gl.get_uniform_location(program, "u_texture") {
                Some(loc) => loc,
                None => {
                    gl.delete_program(program);
                    return Err(RenderError::UniformMissing("u_texture"));
                }
            };
            let u_uv_rect = match gl.get_uniform_location(program, "u_uv_rect") {
                Some(loc) => loc,
                None => {
                    gl.delete_program(program);
                    return Err(RenderError::UniformMissing("u_uv_rect"));
                }
            };
            gl.uniform_1_i32(Some(&u_texture), 0);

            // Vertex positions come from gl_VertexID; the VAO carries no
            // attribute buffers.
            let vao = match gl.create_vertex_array() {
                Ok(vao) => vao,
                Err(e) => {
                    gl.delete_program(program);
                    return Err(RenderError::Create(format!("create_vertex_array: {e}")));
                }
            };

            self.program = Some(program);
            self.vao = Some(vao);
            self.u_uv_rect = Some(u_uv_rect);
        }

        self.context_lost = false;
        self.last_uv = None;
        debug!("gpu pipeline initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    pub(crate) fn program(&self) -> Option<glow::NativeProgram> {
        self.program
    }

    pub(crate) fn vao(&self) -> Option<glow::NativeVertexArray> {
        self.vao
    }

    pub(crate) fn live_texture(&self) -> Option<glow::NativeTexture> {
        self.live_texture
    }

    /// Upload the crop rectangle as a UV uniform, skipping the upload when
    /// the value is unchanged since the last call.
    pub fn update_crop_uniform(
        &mut self,
        gl: &glow::Context,
        layout: &CropLayout,
        video_w: f32,
        video_h: f32,
    ) {
        if self.context_lost {
            return;
        }
        let (Some(program), Some(loc)) = (self.program, self.u_uv_rect.as_ref()) else {
            return;
        };

        let uv = layout.uv_rect(video_w, video_h);
        if self.last_uv == Some(uv) {
            return;
        }

        unsafe {
            gl.use_program(Some(program));
            gl.uniform_4_f32(Some(loc), uv.u0, uv.v0, uv.u1, uv.v1);
        }
        self.last_uv = Some(uv);
    }

    /// True once a crop uniform has been uploaded at least once.
    pub fn has_layout(&self) -> bool {
        self.last_uv.is_some()
    }

    /// Render the current video frame to the bound framebuffer.
    ///
    /// A no-op while the context is lost, before initialization, before the
    /// first layout, or while the source has no displayable frame. A frame
    /// whose pixels cannot be borrowed yet is a transient condition: the
    /// live texture is discarded and reallocated on the next attempt.
    pub fn draw_frame(&mut self, gl: &glow::Context, source: &dyn VideoSource) {
        if self.context_lost {
            return;
        }
        let (Some(program), Some(vao)) = (self.program, self.vao) else {
            return;
        };
        if self.last_uv.is_none() || !source.is_frame_ready() {
            return;
        }
        let (video_w, video_h) = source.dimensions();
        if video_w == 0 || video_h == 0 {
            return;
        }

        unsafe {
            if needs_realloc(self.live_texture_size, video_w, video_h) || self.live_texture.is_none()
            {
                if let Some(old) = self.live_texture.take() {
                    gl.delete_texture(old);
                }
                self.live_texture_size = None;

                let tex = match gl.create_texture() {
                    Ok(tex) => tex,
                    Err(e) => {
                        warn!("live texture creation failed: {e}");
                        return;
                    }
                };
                gl.active_texture(glow::TEXTURE0);
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
                gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_MIN_FILTER,
                    glow::LINEAR as i32,
                );
                gl.tex_parameter_i32(
                    glow::TEXTURE_2D,
                    glow::TEXTURE_MAG_FILTER,
                    glow::LINEAR as i32,
                );
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    glow::RGBA8 as i32,
                    video_w as i32,
                    video_h as i32,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    None,
                );
                self.live_texture = Some(tex);
                self.live_texture_size = Some((video_w, video_h));
                debug!("live texture allocated at {}x{}", video_w, video_h);
            } else {
                gl.active_texture(glow::TEXTURE0);
                gl.bind_texture(glow::TEXTURE_2D, self.live_texture);
            }

            match source.frame_pixels() {
                Ok(pixels) if pixels.len() == (video_w * video_h * 4) as usize => {
                    gl.tex_sub_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        0,
                        0,
                        video_w as i32,
                        video_h as i32,
                        glow::RGBA,
                        glow::UNSIGNED_BYTE,
                        glow::PixelUnpackData::Slice(pixels),
                    );
                }
                _ => {
                    // Source not decodable yet; retry with a fresh
                    // allocation on the next frame.
                    if let Some(tex) = self.live_texture.take() {
                        gl.delete_texture(tex);
                    }
                    self.live_texture_size = None;
                    return;
                }
            }

            gl.use_program(Some(program));
            gl.bind_vertex_array(Some(vao));
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.draw_arrays(glow::TRIANGLES, 0, 3);
            gl.bind_vertex_array(None);
        }
    }

    /// The context is gone: every GPU-side object is invalid. References and
    /// derived caches are cleared without touching the context; no GL entry
    /// point runs again until [`notify_context_restored`](Self::notify_context_restored).
    pub fn notify_context_lost(&mut self) {
        warn!("gl context lost, releasing pipeline references");
        self.context_lost = true;
        self.program = None;
        self.vao = None;
        self.u_uv_rect = None;
        self.live_texture = None;
        self.live_texture_size = None;
        self.last_uv = None;
    }

    /// Re-run initialization from scratch after a context restore.
    pub fn notify_context_restored(&mut self, gl: &glow::Context) -> Result<(), RenderError> {
        debug!("gl context restored, reinitializing pipeline");
        self.context_lost = false;
        self.initialize(gl)
    }

    /// Deterministic release of all owned GL objects.
    pub fn destroy(&mut self, gl: &glow::Context) {
        if !self.context_lost {
            unsafe {
                if let Some(program) = self.program.take() {
                    gl.delete_program(program);
                }
                if let Some(vao) = self.vao.take() {
                    gl.delete_vertex_array(vao);
                }
                if let Some(tex) = self.live_texture.take() {
                    gl.delete_texture(tex);
                }
            }
        }
        self.program = None;
        self.vao = None;
        self.u_uv_rect = None;
        self.live_texture = None;
        self.live_texture_size = None;
        self.last_uv = None;
    }
}

impl Default for GpuPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realloc_only_on_dimension_change() {
        assert!(needs_realloc(None, 1280, 720));
        assert!(!needs_realloc(Some((1280, 720)), 1280, 720));
        assert!(needs_realloc(Some((1280, 720)), 1920, 1080));
        assert!(needs_realloc(Some((1280, 720)), 720, 1280));
    }

    #[test]
    fn test_context_loss_clears_state() {
        let mut pipeline = GpuPipeline::new();
        pipeline.notify_context_lost();
        assert!(pipeline.is_context_lost());
        assert!(!pipeline.is_initialized());
        assert!(pipeline.program().is_none());
        assert!(pipeline.vao().is_none());
        assert!(pipeline.live_texture().is_none());
        assert!(!pipeline.has_layout());
    }
}
