use glam::{Mat4, Vec3};

use super::pipeline::ShaderProgram;
use super::session::RenderSession;
use crate::config::Config;
use crate::shader::program::UniformLocation;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.3,
    g: 0.3,
    b: 0.3,
    a: 1.0,
};

/// Window events the frame loop reacts to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameEvent {
    CloseRequested,
    EscapePressed,
    Resized { width: u32, height: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminating,
}

/// Camera, light and animation constants resolved from the config.
#[derive(Clone, Debug)]
pub struct SceneParams {
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    pub eye: Vec3,
    pub target: Vec3,
    pub light_pos: Vec3,
    pub translation: Vec3,
    pub tilt_radians: f32,
    pub rotation_speed: f32,
    pub amplitude_gain: f32,
}

impl SceneParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fov_y_radians: config.camera.fov_degrees.to_radians(),
            near: config.camera.near,
            far: config.camera.far,
            eye: Vec3::from_array(config.camera.eye),
            target: Vec3::from_array(config.camera.target),
            light_pos: Vec3::from_array(config.light.position),
            translation: Vec3::from_array(config.animation.translation),
            tilt_radians: config.animation.tilt_degrees.to_radians(),
            rotation_speed: config.animation.rotation_speed,
            amplitude_gain: config.animation.amplitude_gain,
        }
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect, self.near, self.far)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    /// translate · tilt · spin · pulse; the amplitude scale is innermost so the
    /// mesh swells in its own frame.
    pub fn model(&self, elapsed_secs: f32, amplitude: f32) -> Mat4 {
        let pulse = 1.0 + self.amplitude_gain * amplitude;
        Mat4::from_translation(self.translation)
            * Mat4::from_rotation_x(self.tilt_radians)
            * Mat4::from_rotation_y(elapsed_secs * self.rotation_speed)
            * Mat4::from_scale(Vec3::splat(pulse))
    }
}

/// Exponential smoothing of the per-frame amplitude probe.
#[derive(Clone, Copy, Debug)]
pub struct AmplitudeSmoother {
    factor: f32,
    value: f32,
}

impl AmplitudeSmoother {
    pub fn new(factor: f32) -> Self {
        Self {
            factor: factor.clamp(0.0, 0.99),
            value: 0.0,
        }
    }

    pub fn update(&mut self, raw: f32) -> f32 {
        self.value = self.factor * self.value + (1.0 - self.factor) * raw;
        self.value
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct UniformSet {
    projection: Option<UniformLocation>,
    view: Option<UniformLocation>,
    model: Option<UniformLocation>,
    light_pos: Option<UniformLocation>,
    view_pos: Option<UniformLocation>,
}

impl UniformSet {
    fn resolve(program: &ShaderProgram) -> Self {
        let lookup = |name: &str| {
            let location = program.uniform_location(name);
            if location.is_none() {
                log::warn!(
                    "Uniform `{}` is not declared by the shader; writes to it are ignored",
                    name
                );
            }
            location
        };
        Self {
            projection: lookup("projection"),
            view: lookup("view"),
            model: lookup("model"),
            light_pos: lookup("lightPos"),
            view_pos: lookup("viewPos"),
        }
    }
}

/// Per-frame control: reacts to window events, recomputes uniforms and draws.
pub struct FrameDriver {
    scene: SceneParams,
    smoother: AmplitudeSmoother,
    uniforms: UniformSet,
    projection: Mat4,
    view: Mat4,
    state: LoopState,
}

impl FrameDriver {
    pub fn new(scene: SceneParams, smoothing: f32, aspect: f32) -> Self {
        Self {
            projection: scene.projection(aspect),
            view: scene.view(),
            scene,
            smoother: AmplitudeSmoother::new(smoothing),
            uniforms: UniformSet::default(),
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Resolve uniform names against the session's program and write the
    /// values that only change on resize or never.
    pub fn install(&mut self, session: &mut RenderSession) {
        self.uniforms = UniformSet::resolve(&session.program);
        let program = &mut session.program;
        program.set_mat4(self.uniforms.projection, &self.projection);
        program.set_mat4(self.uniforms.view, &self.view);
        program.set_vec3(self.uniforms.light_pos, self.scene.light_pos);
        program.set_vec3(self.uniforms.view_pos, self.scene.eye);
        program.flush_uniforms(&session.gpu.queue);
    }

    /// Loop-state bookkeeping for one event. Returns the new surface size when
    /// the projection was recomputed.
    pub fn apply_event(&mut self, event: FrameEvent) -> Option<(u32, u32)> {
        match event {
            FrameEvent::CloseRequested | FrameEvent::EscapePressed => {
                self.state = LoopState::Terminating;
                None
            }
            FrameEvent::Resized { width, height } => {
                if width == 0 || height == 0 {
                    return None;
                }
                self.projection = self.scene.projection(width as f32 / height as f32);
                Some((width, height))
            }
        }
    }

    pub fn handle_event(&mut self, session: &mut RenderSession, event: FrameEvent) -> LoopState {
        if let Some((width, height)) = self.apply_event(event) {
            log::debug!("Resized to {}x{}", width, height);
            session.gpu.resize(width, height);
            session.program.set_mat4(self.uniforms.projection, &self.projection);
        }
        self.state
    }

    /// Model matrix for the current elapsed time and raw amplitude.
    pub fn model_for(&mut self, elapsed_secs: f32, raw_amplitude: f32) -> Mat4 {
        let amplitude = self.smoother.update(raw_amplitude);
        self.scene.model(elapsed_secs, amplitude)
    }

    pub fn render_frame(&mut self, session: &mut RenderSession) -> LoopState {
        if self.state == LoopState::Terminating {
            return self.state;
        }

        let elapsed = session.started.elapsed().as_secs_f32();
        let model = self.model_for(elapsed, session.sampler.current_amplitude());

        let program = &mut session.program;
        program.set_mat4(self.uniforms.projection, &self.projection);
        program.set_mat4(self.uniforms.view, &self.view);
        program.set_mat4(self.uniforms.model, &model);
        program.set_vec3(self.uniforms.light_pos, self.scene.light_pos);
        program.set_vec3(self.uniforms.view_pos, self.scene.eye);
        program.flush_uniforms(&session.gpu.queue);

        let frame = match session.gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                session.gpu.reconfigure();
                return self.state;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory, stopping");
                self.state = LoopState::Terminating;
                return self.state;
            }
            Err(err) => {
                log::warn!("Skipping frame: {}", err);
                return self.state;
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = session
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mesh_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &session.gpu.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            session.program.bind(&mut render_pass);
            session.mesh.draw(&mut render_pass);
        }

        session.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> SceneParams {
        SceneParams::from_config(&Config::default())
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn close_and_escape_terminate() {
        for event in [FrameEvent::CloseRequested, FrameEvent::EscapePressed] {
            let mut driver = FrameDriver::new(scene(), 0.0, 4.0 / 3.0);
            assert_eq!(driver.state(), LoopState::Running);
            assert_eq!(driver.apply_event(event), None);
            assert_eq!(driver.state(), LoopState::Terminating);
        }
    }

    #[test]
    fn resize_recomputes_projection_with_same_fov() {
        let params = scene();
        let mut driver = FrameDriver::new(params.clone(), 0.0, 4.0 / 3.0);
        let resized = driver.apply_event(FrameEvent::Resized {
            width: 1600,
            height: 900,
        });
        assert_eq!(resized, Some((1600, 900)));
        assert_eq!(driver.projection, params.projection(1600.0 / 900.0));
        assert_eq!(driver.state(), LoopState::Running);
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let params = scene();
        let mut driver = FrameDriver::new(params.clone(), 0.0, 2.0);
        assert_eq!(driver.apply_event(FrameEvent::Resized { width: 0, height: 600 }), None);
        assert_eq!(driver.projection, params.projection(2.0));
    }

    #[test]
    fn silent_audio_leaves_unit_scale() {
        let mut params = scene();
        params.tilt_radians = 0.0;
        params.translation = Vec3::ZERO;
        let model = params.model(0.0, 0.0);
        assert!(close(model.transform_point3(Vec3::X), Vec3::X));
    }

    #[test]
    fn amplitude_scales_in_local_frame() {
        let mut params = scene();
        params.translation = Vec3::new(5.0, 0.0, 0.0);
        params.tilt_radians = std::f32::consts::FRAC_PI_2;
        params.amplitude_gain = 1.0;

        let model = params.model(0.0, 1.0);
        // Translation is not scaled by the pulse
        assert!(close(model.transform_point3(Vec3::ZERO), Vec3::new(5.0, 0.0, 0.0)));
        // Local +Y doubles, then tilts onto +Z
        assert!(close(model.transform_point3(Vec3::Y), Vec3::new(5.0, 0.0, 2.0)));
    }

    #[test]
    fn spin_follows_elapsed_time() {
        let mut params = scene();
        params.tilt_radians = 0.0;
        params.rotation_speed = std::f32::consts::FRAC_PI_2;
        let model = params.model(1.0, 0.0);
        assert!(close(model.transform_point3(Vec3::X), Vec3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn smoother_passes_raw_values_when_disabled() {
        let mut smoother = AmplitudeSmoother::new(0.0);
        assert_eq!(smoother.update(0.8), 0.8);
        assert_eq!(smoother.update(0.1), 0.1);
    }

    #[test]
    fn smoother_lags_toward_target() {
        let mut smoother = AmplitudeSmoother::new(0.5);
        assert_eq!(smoother.update(1.0), 0.5);
        assert_eq!(smoother.update(1.0), 0.75);
    }
}
