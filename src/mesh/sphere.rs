//! Analytic sphere tessellation.

use std::f32::consts::{FRAC_PI_2, PI};

use super::MeshData;

/// Per-axis limit; keeps `rings * sectors` and every index inside `u32`.
pub const MAX_TESSELLATION: u32 = 4096;

/// Generate a ring/sector sphere of `radius`.
///
/// Produces `rings * sectors` vertices and two triangles per grid cell, so
/// `6 * (rings - 1) * (sectors - 1)` indices. Normals are the unscaled unit
/// sphere points.
pub fn generate_sphere(radius: f32, rings: u32, sectors: u32) -> MeshData {
    if rings < 2 || sectors < 2 {
        log::warn!(
            "Sphere needs at least 2 rings and 2 sectors (got {}x{}), clamping",
            rings,
            sectors
        );
    }
    if rings > MAX_TESSELLATION || sectors > MAX_TESSELLATION {
        log::warn!(
            "Sphere tessellation {}x{} exceeds {} per axis, clamping",
            rings,
            sectors,
            MAX_TESSELLATION
        );
    }
    let rings = rings.clamp(2, MAX_TESSELLATION);
    let sectors = sectors.clamp(2, MAX_TESSELLATION);

    let ring_step = 1.0 / (rings - 1) as f32;
    let sector_step = 1.0 / (sectors - 1) as f32;

    let mut mesh = MeshData {
        vertices: Vec::with_capacity(rings as usize * sectors as usize * super::FLOATS_PER_VERTEX),
        indices: Vec::with_capacity(6 * (rings as usize - 1) * (sectors as usize - 1)),
    };

    for r in 0..rings {
        let polar = PI * r as f32 * ring_step;
        let y = (-FRAC_PI_2 + polar).sin();
        for s in 0..sectors {
            let azimuth = 2.0 * PI * s as f32 * sector_step;
            let x = azimuth.cos() * polar.sin();
            let z = azimuth.sin() * polar.sin();
            mesh.push_vertex([x * radius, y * radius, z * radius], [x, y, z]);
        }
    }

    for r in 0..rings - 1 {
        for s in 0..sectors - 1 {
            let a = r * sectors + s;
            let b = r * sectors + s + 1;
            let c = (r + 1) * sectors + s + 1;
            let d = (r + 1) * sectors + s;
            mesh.indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }

    mesh
}
