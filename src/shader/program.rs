use std::collections::BTreeMap;

use glam::{Mat4, Vec3};

use super::compile::CompiledStage;
use super::Stage;
use crate::error::{Result, VisualiserError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Mat4,
    Vec3,
    Float,
    Other,
}

impl UniformKind {
    fn byte_len(self) -> usize {
        match self {
            UniformKind::Mat4 => 64,
            UniformKind::Vec3 => 12,
            UniformKind::Float => 4,
            UniformKind::Other => 0,
        }
    }
}

/// Byte offset of a named member inside the program's uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub kind: UniformKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub members: BTreeMap<String, UniformLocation>,
}

impl UniformBlock {
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.members.get(name).copied()
    }
}

/// Reflection of a linked program.
#[derive(Clone, Debug, Default)]
pub struct ProgramLayout {
    pub vertex_inputs: Vec<u32>,
    pub uniform_block: Option<UniformBlock>,
}

impl ProgramLayout {
    /// `None` for names the program does not declare; writes through it are no-ops.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniform_block.as_ref().and_then(|block| block.location(name))
    }

    pub fn uniform_size(&self) -> u32 {
        self.uniform_block.as_ref().map_or(0, |block| block.size)
    }
}

/// Vertex and fragment stages that passed the interface checks.
#[derive(Debug)]
pub struct LinkedProgram {
    pub vertex_source: String,
    pub fragment_source: String,
    pub layout: ProgramLayout,
}

/// Link a vertex and a fragment stage. Both compiled units are consumed.
pub fn link(vertex: CompiledStage, fragment: CompiledStage) -> Result<LinkedProgram> {
    let mut problems = Vec::new();

    for (unit, expected) in [(&vertex, Stage::Vertex), (&fragment, Stage::Fragment)] {
        if unit.stage != expected {
            problems.push(format!("expected a {} stage, got {}", expected, unit.stage));
        } else if !unit.interface.has_entry_point {
            problems.push(format!("{} stage has no `main` entry point", unit.stage));
        }
    }

    for location in &fragment.interface.inputs {
        if !vertex.interface.outputs.contains(location) {
            problems.push(format!(
                "fragment input at location {} is not written by the vertex stage",
                location
            ));
        }
    }

    let uniform_block = match merge_uniform_blocks(&vertex, &fragment) {
        Ok(block) => block,
        Err(mut errs) => {
            problems.append(&mut errs);
            None
        }
    };

    if !problems.is_empty() {
        return Err(VisualiserError::Link {
            log: problems.join("\n"),
        });
    }

    Ok(LinkedProgram {
        layout: ProgramLayout {
            vertex_inputs: vertex.interface.inputs,
            uniform_block,
        },
        vertex_source: vertex.source,
        fragment_source: fragment.source,
    })
}

fn merge_uniform_blocks(
    vertex: &CompiledStage,
    fragment: &CompiledStage,
) -> std::result::Result<Option<UniformBlock>, Vec<String>> {
    let mut merged: Option<UniformBlock> = None;
    let mut problems = Vec::new();

    let blocks = vertex
        .interface
        .uniform_blocks
        .iter()
        .chain(fragment.interface.uniform_blocks.iter());

    for block in blocks {
        if merged.is_none() {
            merged = Some(block.clone());
            continue;
        }
        let Some(current) = merged.as_mut() else {
            continue;
        };

        if (current.group, current.binding) != (block.group, block.binding) {
            problems.push(format!(
                "only one uniform block is supported, found bindings ({}, {}) and ({}, {})",
                current.group, current.binding, block.group, block.binding
            ));
            continue;
        }

        for (name, location) in &block.members {
            match current.members.get(name) {
                Some(existing) if existing != location => problems.push(format!(
                    "uniform `{}` is declared differently across stages (offset {} vs {})",
                    name, existing.offset, location.offset
                )),
                Some(_) => {}
                None => {
                    current.members.insert(name.clone(), *location);
                }
            }
        }
        current.size = current.size.max(block.size);
    }

    if problems.is_empty() {
        Ok(merged)
    } else {
        Err(problems)
    }
}

/// CPU copy of the uniform block, flushed to the GPU when dirty.
#[derive(Clone, Debug)]
pub struct UniformStaging {
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformStaging {
    pub fn new(size: u32) -> Self {
        Self {
            bytes: vec![0; size as usize],
            dirty: false,
        }
    }

    pub fn write_mat4(&mut self, location: Option<UniformLocation>, value: &Mat4) {
        self.write(location, UniformKind::Mat4, bytemuck::cast_slice(&value.to_cols_array()));
    }

    pub fn write_vec3(&mut self, location: Option<UniformLocation>, value: Vec3) {
        self.write(location, UniformKind::Vec3, bytemuck::cast_slice(&value.to_array()));
    }

    fn write(&mut self, location: Option<UniformLocation>, kind: UniformKind, data: &[u8]) {
        let Some(location) = location else {
            return;
        };
        if location.kind != kind {
            return;
        }
        let start = location.offset as usize;
        let end = start + kind.byte_len();
        if end > self.bytes.len() || data.len() != kind.byte_len() {
            return;
        }
        self.bytes[start..end].copy_from_slice(data);
        self.dirty = true;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the block contents once per batch of writes.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if std::mem::take(&mut self.dirty) {
            Some(&self.bytes)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::compile::compile_stage;

    const MINIMAL_VERTEX: &str = "#version 450
layout(location = 0) in vec2 position;
void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}
";

    const WHITE_FRAGMENT: &str = "#version 450
layout(location = 0) out vec4 color;
void main() {
    color = vec4(1.0, 1.0, 1.0, 1.0);
}
";

    const LIT_VERTEX: &str = "#version 450
layout(location = 0) in vec3 aPos;
layout(location = 1) in vec3 aNormal;
layout(set = 0, binding = 0) uniform Frame {
    mat4 projection;
    mat4 view;
    mat4 model;
    vec3 lightPos;
    vec3 viewPos;
};
layout(location = 0) out vec3 vNormal;
void main() {
    vNormal = (model * vec4(aNormal, 0.0)).xyz;
    gl_Position = projection * view * model * vec4(aPos, 1.0);
}
";

    const LIT_FRAGMENT: &str = "#version 450
layout(set = 0, binding = 0) uniform Frame {
    mat4 projection;
    mat4 view;
    mat4 model;
    vec3 lightPos;
    vec3 viewPos;
};
layout(location = 0) in vec3 vNormal;
layout(location = 0) out vec4 color;
void main() {
    float d = max(dot(normalize(vNormal), normalize(lightPos - viewPos)), 0.0);
    color = vec4(vec3(d), 1.0);
}
";

    fn build(vs: &str, fs: &str) -> Result<LinkedProgram> {
        let vertex = compile_stage(Stage::Vertex, vs)?;
        let fragment = compile_stage(Stage::Fragment, fs)?;
        link(vertex, fragment)
    }

    #[test]
    fn minimal_program_links_without_uniforms() {
        let program = build(MINIMAL_VERTEX, WHITE_FRAGMENT).unwrap();
        assert!(program.layout.uniform_block.is_none());
        assert_eq!(program.layout.vertex_inputs, vec![0]);

        let projection = program.layout.uniform_location("projection");
        assert!(projection.is_none());

        let mut staging = UniformStaging::new(program.layout.uniform_size());
        staging.write_mat4(projection, &Mat4::IDENTITY);
        staging.write_vec3(program.layout.uniform_location("lightPos"), Vec3::ONE);
        assert!(staging.bytes().is_empty());
        assert!(staging.take_dirty().is_none());
    }

    #[test]
    fn lit_program_merges_uniforms_across_stages() {
        let program = build(LIT_VERTEX, LIT_FRAGMENT).unwrap();
        let layout = &program.layout;
        assert_eq!(layout.vertex_inputs, vec![0, 1]);
        for name in ["projection", "view", "model", "lightPos", "viewPos"] {
            assert!(layout.uniform_location(name).is_some(), "missing {}", name);
        }
        assert!(layout.uniform_location("time").is_none());
        assert_eq!(layout.uniform_location("model").unwrap().kind, UniformKind::Mat4);
        assert_eq!(layout.uniform_location("viewPos").unwrap().kind, UniformKind::Vec3);
    }

    #[test]
    fn unmatched_fragment_input_fails_to_link() {
        let fs = "#version 450
layout(location = 3) in vec3 vColor;
layout(location = 0) out vec4 color;
void main() {
    color = vec4(vColor, 1.0);
}
";
        match build(MINIMAL_VERTEX, fs) {
            Err(VisualiserError::Link { log }) => assert!(log.contains("location 3")),
            other => panic!("expected link error, got {:?}", other.map(|p| p.layout)),
        }
    }

    #[test]
    fn swapped_stages_fail_to_link() {
        let vertex = compile_stage(Stage::Vertex, MINIMAL_VERTEX).unwrap();
        let fragment = compile_stage(Stage::Fragment, WHITE_FRAGMENT).unwrap();
        assert!(matches!(link(fragment, vertex), Err(VisualiserError::Link { .. })));
    }

    #[test]
    fn staging_writes_land_at_offsets() {
        let program = build(LIT_VERTEX, LIT_FRAGMENT).unwrap();
        let layout = &program.layout;
        let mut staging = UniformStaging::new(layout.uniform_size());

        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        staging.write_mat4(layout.uniform_location("model"), &model);
        staging.write_vec3(layout.uniform_location("lightPos"), Vec3::new(4.0, 5.0, 6.0));

        let floats: Vec<f32> = staging
            .take_dirty()
            .unwrap()
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let model_at = layout.uniform_location("model").unwrap().offset as usize / 4;
        assert_eq!(&floats[model_at..model_at + 16], &model.to_cols_array()[..]);

        let light_at = layout.uniform_location("lightPos").unwrap().offset as usize / 4;
        assert_eq!(&floats[light_at..light_at + 3], &[4.0, 5.0, 6.0]);

        assert!(staging.take_dirty().is_none());
    }

    #[test]
    fn kind_mismatch_is_ignored() {
        let program = build(LIT_VERTEX, LIT_FRAGMENT).unwrap();
        let mut staging = UniformStaging::new(program.layout.uniform_size());
        staging.write_vec3(program.layout.uniform_location("model"), Vec3::ONE);
        assert!(staging.take_dirty().is_none());
    }
}
