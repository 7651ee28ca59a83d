//! Topological connectivity analysis.
//!
//! Flood fill over the face-adjacency graph. Two faces belong to the same
//! patch iff they are connected through shared edges. Exact and loss-free,
//! but blind to distinct objects that share even a single edge.

use tracing::debug;

use crate::adjacency::MeshAdjacency;
use crate::types::Mesh;

/// Group faces into edge-connected patches.
///
/// Returns one face-index list per patch, in discovery order (first face
/// index ascending). Every input face appears in exactly one patch.
pub fn face_patches(mesh: &Mesh) -> Vec<Vec<u32>> {
    let face_count = mesh.face_count();
    if face_count == 0 {
        return Vec::new();
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let neighbors = adjacency.face_neighbors(face_count);

    let mut visited = vec![false; face_count];
    let mut patches: Vec<Vec<u32>> = Vec::new();
    let mut stack: Vec<u32> = Vec::new();

    for seed in 0..face_count {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        stack.push(seed as u32);

        let mut patch = Vec::new();
        while let Some(face) = stack.pop() {
            patch.push(face);
            for &next in &neighbors[face as usize] {
                if !visited[next as usize] {
                    visited[next as usize] = true;
                    stack.push(next);
                }
            }
        }
        patches.push(patch);
    }

    debug!(
        faces = face_count,
        patches = patches.len(),
        boundary_edges = adjacency.boundary_edge_count(),
        non_manifold_edges = adjacency.non_manifold_edge_count(),
        "connectivity analysis"
    );

    patches
}
