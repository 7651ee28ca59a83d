//! Edge-based face adjacency for meshes.
//!
//! Two triangles are adjacent iff they share an edge (both endpoint vertices).
//! Edges are keyed by sorted vertex index pairs so winding does not matter.

use hashbrown::HashMap;

/// Face adjacency information derived from mesh connectivity.
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Maps each undirected edge (sorted vertex pair) to the faces sharing it.
    pub edge_to_faces: HashMap<(u32, u32), Vec<u32>>,
}

impl MeshAdjacency {
    /// Build adjacency from a face list.
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<u32>> =
            HashMap::with_capacity(faces.len() * 3 / 2);

        for (face_idx, &[a, b, c]) in faces.iter().enumerate() {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                let key = if u < v { (u, v) } else { (v, u) };
                edge_to_faces.entry(key).or_default().push(face_idx as u32);
            }
        }

        Self { edge_to_faces }
    }

    /// Number of boundary edges (edges with exactly one adjacent face).
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces.values().filter(|f| f.len() == 1).count()
    }

    /// Number of non-manifold edges (edges shared by more than 2 faces).
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces.values().filter(|f| f.len() > 2).count()
    }

    /// Build the face-to-face neighbor lists over shared edges.
    ///
    /// Edges shared by more than two faces (non-manifold) still contribute:
    /// all faces on such an edge are treated as mutual neighbors, so a fused
    /// non-manifold junction keeps its patch connected.
    pub fn face_neighbors(&self, face_count: usize) -> Vec<Vec<u32>> {
        let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); face_count];

        for faces in self.edge_to_faces.values() {
            if faces.len() < 2 {
                continue;
            }
            for i in 0..faces.len() {
                for j in (i + 1)..faces.len() {
                    neighbors[faces[i] as usize].push(faces[j]);
                    neighbors[faces[j] as usize].push(faces[i]);
                }
            }
        }

        neighbors
    }
}
