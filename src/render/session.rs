use std::sync::Arc;
use std::time::Instant;

use wgpu::util::DeviceExt;
use winit::window::Window;

use super::gpu::GpuContext;
use super::pipeline::ShaderProgram;
use crate::audio::decode::AudioBuffer;
use crate::audio::output::AudioOutput;
use crate::audio::sampler::AmplitudeSampler;
use crate::error::Result;
use crate::mesh::MeshData;
use crate::shader::program::LinkedProgram;

pub struct MeshBuffers {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    pub fn upload(device: &wgpu::Device, mesh: &MeshData) -> Self {
        debug_assert!(mesh.is_well_formed());

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.index_count == 0 {
            return;
        }
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Everything validated before the window exists.
pub struct Assets {
    pub program: LinkedProgram,
    pub mesh: MeshData,
    pub audio: AudioBuffer,
    pub looping: bool,
}

/// The single owner of GPU state and audio playback for one run.
///
/// Dropping it releases the pipeline, buffers, surface and audio stream.
pub struct RenderSession {
    pub gpu: GpuContext,
    pub program: ShaderProgram,
    pub mesh: MeshBuffers,
    pub sampler: Arc<AmplitudeSampler>,
    pub audio: AudioOutput,
    pub started: Instant,
}

impl RenderSession {
    pub fn new(window: Arc<Window>, assets: Assets, vsync: bool) -> Result<Self> {
        let gpu = GpuContext::new(window, vsync)?;
        let program = ShaderProgram::create(&gpu, assets.program)?;
        let mesh = MeshBuffers::upload(&gpu.device, &assets.mesh);

        let sampler = Arc::new(AmplitudeSampler::attach(assets.audio));
        log::info!(
            "Playing {:.1}s of audio ({} channel(s), {}Hz)",
            sampler.duration_secs(),
            sampler.channels(),
            sampler.sample_rate()
        );
        let audio = AudioOutput::start(Arc::clone(&sampler), assets.looping)?;

        Ok(Self {
            gpu,
            program,
            mesh,
            sampler,
            audio,
            started: Instant::now(),
        })
    }

    pub fn shutdown(self) {
        self.audio.pause();
        log::debug!(
            "Releasing GPU resources at {:.1}s of playback",
            self.sampler.position_secs()
        );
    }
}
