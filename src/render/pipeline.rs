use std::borrow::Cow;

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use super::gpu::{GpuContext, DEPTH_FORMAT};
use crate::error::{Result, VisualiserError};
use crate::mesh::FLOATS_PER_VERTEX;
use crate::shader::compile::compile_stage;
use crate::shader::program::{link, LinkedProgram, ProgramLayout, UniformLocation, UniformStaging};
use crate::shader::source::ShaderSource;
use crate::shader::Stage;

const POSITION_LOCATION: u32 = 0;
const NORMAL_LOCATION: u32 = 1;

const UNIFORM_GROUP: u32 = 0;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
];

/// Compile both stages of `source` and link them.
pub fn build_program(source: &ShaderSource) -> Result<LinkedProgram> {
    let vertex = compile_stage(Stage::Vertex, source.stage(Stage::Vertex))?;
    let fragment = compile_stage(Stage::Fragment, source.stage(Stage::Fragment))?;
    link(vertex, fragment)
}

/// Linked program realised on the GPU, with its uniform block.
pub struct ShaderProgram {
    pub pipeline: wgpu::RenderPipeline,
    layout: ProgramLayout,
    staging: UniformStaging,
    uniforms: Option<(wgpu::Buffer, wgpu::BindGroup)>,
}

impl ShaderProgram {
    pub fn create(gpu: &GpuContext, linked: LinkedProgram) -> Result<Self> {
        let LinkedProgram {
            vertex_source,
            fragment_source,
            layout,
        } = linked;

        if let Some(location) = layout
            .vertex_inputs
            .iter()
            .find(|&&l| l != POSITION_LOCATION && l != NORMAL_LOCATION)
        {
            return Err(VisualiserError::Link {
                log: format!(
                    "vertex input at location {} is not provided by the mesh (0 = position, 1 = normal)",
                    location
                ),
            });
        }

        if let Some(ref block) = layout.uniform_block {
            if block.group != UNIFORM_GROUP {
                return Err(VisualiserError::Link {
                    log: format!(
                        "uniform block must use set = {}, found set = {}",
                        UNIFORM_GROUP, block.group
                    ),
                });
            }
        }

        let device = &gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("vertex_stage"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(vertex_source),
                stage: Stage::Vertex.naga_stage(),
                defines: Default::default(),
            },
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fragment_stage"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(fragment_source),
                stage: Stage::Fragment.naga_stage(),
                defines: Default::default(),
            },
        });

        let uniform_layout = layout.uniform_block.as_ref().map(|block| {
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("uniform_block_layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: block.binding,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });
            (bind_group_layout, block.binding)
        });

        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> =
            uniform_layout.iter().map(|(bgl, _)| bgl).collect();

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("program_layout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: (FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &MESH_ATTRIBUTES,
        }];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mesh_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let staging = UniformStaging::new(layout.uniform_size());
        let uniforms = uniform_layout.map(|(bgl, binding)| {
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("uniform_block"),
                contents: staging.bytes(),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform_bind_group"),
                layout: &bgl,
                entries: &[wgpu::BindGroupEntry {
                    binding,
                    resource: buffer.as_entire_binding(),
                }],
            });
            (buffer, bind_group)
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(VisualiserError::Link {
                log: error.to_string(),
            });
        }

        match layout.uniform_block {
            Some(ref block) => log::info!(
                "Linked program: vertex inputs {:?}, uniform block ({}, {}) of {} bytes with {:?}",
                layout.vertex_inputs,
                block.group,
                block.binding,
                block.size,
                block.members.keys().collect::<Vec<_>>()
            ),
            None => {
                log::warn!("Linked program declares no uniform block; uniform writes are ignored")
            }
        }

        Ok(Self {
            pipeline,
            layout,
            staging,
            uniforms,
        })
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.layout.uniform_location(name)
    }

    pub fn set_mat4(&mut self, location: Option<UniformLocation>, value: &Mat4) {
        self.staging.write_mat4(location, value);
    }

    pub fn set_vec3(&mut self, location: Option<UniformLocation>, value: Vec3) {
        self.staging.write_vec3(location, value);
    }

    /// Upload the uniform block if anything changed since the last flush.
    pub fn flush_uniforms(&mut self, queue: &wgpu::Queue) {
        let Some((ref buffer, _)) = self.uniforms else {
            return;
        };
        if let Some(bytes) = self.staging.take_dirty() {
            queue.write_buffer(buffer, 0, bytes);
        }
    }

    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        if let Some((_, ref bind_group)) = self.uniforms {
            pass.set_bind_group(UNIFORM_GROUP, bind_group, &[]);
        }
    }
}
