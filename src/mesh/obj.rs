//! Wavefront OBJ import, reduced to position + normal.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use super::MeshData;
use crate::error::{Result, VisualiserError};

#[derive(Clone, Copy, Debug)]
pub struct ObjOptions {
    /// Applied to positions as they are read.
    pub scale: f32,
    /// Share one vertex per distinct (position, normal) index pair.
    pub deduplicate: bool,
}

impl Default for ObjOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            deduplicate: false,
        }
    }
}

/// One output vertex per face corner, indices `0..N` in file order.
pub fn load_mesh(path: &Path, scale: f32) -> Result<MeshData> {
    load_mesh_with(
        path,
        &ObjOptions {
            scale,
            ..Default::default()
        },
    )
}

pub fn load_mesh_with(path: &Path, options: &ObjOptions) -> Result<MeshData> {
    let file = std::fs::File::open(path).map_err(|source| VisualiserError::AssetUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mesh = parse(std::io::BufReader::new(file), options, path)?;
    log::info!(
        "Loaded mesh {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

struct Corner {
    position: usize,
    uv: usize,
    normal: usize,
}

pub fn parse<R: BufRead>(reader: R, options: &ObjOptions, origin: &Path) -> Result<MeshData> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut faces: Vec<([Corner; 3], usize)> = Vec::new();
    let mut warned_polygon = false;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let malformed = |message: String| VisualiserError::AssetMalformed {
            path: origin.to_path_buf(),
            line: line_no,
            message,
        };
        let line = line.map_err(|e| malformed(e.to_string()))?;

        let mut fields = line.split_whitespace();
        let Some(record) = fields.next() else {
            continue;
        };

        match record {
            "v" => {
                let [x, y, z] = parse_floats::<3>(&mut fields).map_err(malformed)?;
                positions.push([x * options.scale, y * options.scale, z * options.scale]);
            }
            "vt" => tex_coords.push(parse_floats::<2>(&mut fields).map_err(malformed)?),
            "vn" => normals.push(parse_floats::<3>(&mut fields).map_err(malformed)?),
            "f" => {
                let tokens: Vec<&str> = fields.collect();
                if tokens.len() < 3 {
                    return Err(malformed(format!("face has {} corners, need 3", tokens.len())));
                }
                if tokens.len() > 3 && !warned_polygon {
                    log::warn!(
                        "{}:{}: face with {} corners, only the first 3 are used",
                        origin.display(),
                        line_no,
                        tokens.len()
                    );
                    warned_polygon = true;
                }
                let corner = |token: &str| parse_corner(token).map_err(&malformed);
                faces.push(([corner(tokens[0])?, corner(tokens[1])?, corner(tokens[2])?], line_no));
            }
            _ => {}
        }
    }

    log::debug!(
        "OBJ {}: {} positions, {} uvs (dropped), {} normals, {} faces",
        origin.display(),
        positions.len(),
        tex_coords.len(),
        normals.len(),
        faces.len()
    );

    let mut mesh = MeshData {
        vertices: Vec::with_capacity(faces.len() * 3 * super::FLOATS_PER_VERTEX),
        indices: Vec::with_capacity(faces.len() * 3),
    };
    let mut shared: HashMap<(usize, usize), u32> = HashMap::new();

    for (corners, line_no) in &faces {
        for corner in corners {
            let resolve = |what: &str, index: usize, len: usize| {
                if index == 0 || index > len {
                    Err(VisualiserError::AssetMalformed {
                        path: origin.to_path_buf(),
                        line: *line_no,
                        message: format!("{} index {} out of range (have {})", what, index, len),
                    })
                } else {
                    Ok(index - 1)
                }
            };
            let p = resolve("position", corner.position, positions.len())?;
            resolve("uv", corner.uv, tex_coords.len())?;
            let n = resolve("normal", corner.normal, normals.len())?;

            let index = if options.deduplicate {
                *shared
                    .entry((p, n))
                    .or_insert_with(|| mesh.push_vertex(positions[p], normals[n]))
            } else {
                mesh.push_vertex(positions[p], normals[n])
            };
            mesh.indices.push(index);
        }
    }

    Ok(mesh)
}

fn parse_floats<'a, const N: usize>(
    fields: &mut impl Iterator<Item = &'a str>,
) -> std::result::Result<[f32; N], String> {
    let mut out = [0.0f32; N];
    for slot in out.iter_mut() {
        let token = fields
            .next()
            .ok_or_else(|| format!("expected {} numbers", N))?;
        *slot = token
            .parse()
            .map_err(|_| format!("invalid number `{}`", token))?;
    }
    Ok(out)
}

fn parse_corner(token: &str) -> std::result::Result<Corner, String> {
    let mut parts = token.split('/');
    let mut next_index = |what: &str| -> std::result::Result<usize, String> {
        let part = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| format!("corner `{}` is missing its {} index", token, what))?;
        part.parse()
            .map_err(|_| format!("corner `{}` has an invalid {} index", token, what))
    };
    let position = next_index("position")?;
    let uv = next_index("uv")?;
    let normal = next_index("normal")?;
    Ok(Corner {
        position,
        uv,
        normal,
    })
}
