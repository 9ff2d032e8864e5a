pub mod obj;
pub mod sphere;

/// position.xyz followed by normal.xyz
pub const FLOATS_PER_VERTEX: usize = 6;

/// Interleaved position/normal vertices with a triangle-list index buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[cfg(test)]
    pub fn position(&self, index: u32) -> [f32; 3] {
        let base = index as usize * FLOATS_PER_VERTEX;
        [self.vertices[base], self.vertices[base + 1], self.vertices[base + 2]]
    }

    #[cfg(test)]
    pub fn normal(&self, index: u32) -> [f32; 3] {
        let base = index as usize * FLOATS_PER_VERTEX + 3;
        [self.vertices[base], self.vertices[base + 1], self.vertices[base + 2]]
    }

    pub(crate) fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3]) -> u32 {
        let index = self.vertex_count() as u32;
        self.vertices.extend_from_slice(&position);
        self.vertices.extend_from_slice(&normal);
        index
    }

    /// Every index is in range and the indices form whole triangles.
    pub fn is_well_formed(&self) -> bool {
        let count = self.vertex_count() as u32;
        self.vertices.len() % FLOATS_PER_VERTEX == 0
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| i < count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_checks_range_and_triangles() {
        let mut mesh = MeshData::default();
        for _ in 0..3 {
            mesh.push_vertex([0.0; 3], [0.0, 1.0, 0.0]);
        }
        mesh.indices = vec![0, 1, 2];
        assert!(mesh.is_well_formed());

        mesh.indices = vec![0, 1, 3];
        assert!(!mesh.is_well_formed());

        mesh.indices = vec![0, 1];
        assert!(!mesh.is_well_formed());
    }
}
