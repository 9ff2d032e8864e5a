use std::collections::BTreeMap;

use naga::{AddressSpace, Binding, Handle, Module, Scalar, Type, TypeInner, VectorSize};

use super::program::{UniformBlock, UniformKind, UniformLocation};
use super::Stage;
use crate::error::{Result, VisualiserError};

/// A single stage that parsed and validated cleanly.
///
/// Owned until [`super::program::link`] consumes it.
#[derive(Debug)]
pub struct CompiledStage {
    pub stage: Stage,
    pub source: String,
    pub interface: StageInterface,
}

/// What a stage reads and writes, as seen by the linker.
#[derive(Clone, Debug, Default)]
pub struct StageInterface {
    pub has_entry_point: bool,
    pub inputs: Vec<u32>,
    pub outputs: Vec<u32>,
    pub uniform_blocks: Vec<UniformBlock>,
}

/// Compile one stage of GLSL. Parse and validation diagnostics come back in
/// `VisualiserError::Compile` rendered against the stage source.
pub fn compile_stage(stage: Stage, text: &str) -> Result<CompiledStage> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.naga_stage());

    let module = frontend.parse(&options, text).map_err(|errors| VisualiserError::Compile {
        stage,
        log: errors.emit_to_string(text),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    );
    validator.validate(&module).map_err(|error| VisualiserError::Compile {
        stage,
        log: error.emit_to_string(text),
    })?;

    let interface = reflect(&module, stage);
    log::debug!(
        "Compiled {} stage: inputs {:?}, outputs {:?}, {} uniform block(s)",
        stage,
        interface.inputs,
        interface.outputs,
        interface.uniform_blocks.len()
    );

    Ok(CompiledStage {
        stage,
        source: text.to_string(),
        interface,
    })
}

fn reflect(module: &Module, stage: Stage) -> StageInterface {
    let mut interface = StageInterface::default();

    if let Some(entry) = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage.naga_stage())
    {
        interface.has_entry_point = true;
        for arg in &entry.function.arguments {
            collect_locations(module, arg.binding.as_ref(), arg.ty, &mut interface.inputs);
        }
        if let Some(ref result) = entry.function.result {
            collect_locations(module, result.binding.as_ref(), result.ty, &mut interface.outputs);
        }
    }
    interface.inputs.sort_unstable();
    interface.outputs.sort_unstable();

    for (_, var) in module.global_variables.iter() {
        if var.space != AddressSpace::Uniform {
            continue;
        }
        let Some(ref binding) = var.binding else {
            continue;
        };
        if let TypeInner::Struct { ref members, span } = module.types[var.ty].inner {
            let mut locations = BTreeMap::new();
            for member in members {
                let Some(ref name) = member.name else {
                    continue;
                };
                locations.insert(
                    name.clone(),
                    UniformLocation {
                        offset: member.offset,
                        kind: uniform_kind(&module.types[member.ty]),
                    },
                );
            }
            interface.uniform_blocks.push(UniformBlock {
                group: binding.group,
                binding: binding.binding,
                size: span,
                members: locations,
            });
        }
    }

    interface
}

fn collect_locations(
    module: &Module,
    binding: Option<&Binding>,
    ty: Handle<Type>,
    out: &mut Vec<u32>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(*location),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { ref members, .. } = module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.binding.as_ref(), member.ty, out);
                }
            }
        }
    }
}

fn uniform_kind(ty: &Type) -> UniformKind {
    match ty.inner {
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar == Scalar::F32 => UniformKind::Mat4,
        TypeInner::Vector {
            size: VectorSize::Tri,
            scalar,
        } if scalar == Scalar::F32 => UniformKind::Vec3,
        TypeInner::Scalar(scalar) if scalar == Scalar::F32 => UniformKind::Float,
        _ => UniformKind::Other,
    }
}
