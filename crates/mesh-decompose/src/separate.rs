//! Mesh separation into physically distinct components.
//!
//! A scanned assembly often arrives as a single fused mesh even though it
//! represents several physical objects. Topological connectivity alone is a
//! strict lower bound on the object count whenever parts touch, so the
//! separator runs an ordered chain of strategies with different assumptions:
//!
//! 1. **Forced-k** (only with a caller-supplied count): deterministic k-means
//!    over face centroids.
//! 2. **Topological**: connected components of the face-adjacency graph.
//!    Exact, loses no geometry.
//! 3. **Spatial**: radius clustering of vertices, for meshes that are one
//!    topological patch but geometrically far apart.
//! 4. **Voxelized**: occupancy grid + morphological erosion to break thin
//!    bridges between touching objects. Approximate near the erosion radius.
//! 5. **Single-fallback**: the whole mesh as one component.
//!
//! A strategy that fails internally is logged and skipped; the chain never
//! propagates an error unless the input mesh itself is empty.

use kiddo::KdTree;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cluster;
use crate::components;
use crate::error::{DecomposeError, DecomposeResult};
use crate::tracing_ext::OperationTimer;
use crate::types::{Mesh, Vertex};
use crate::voxel;

/// Which strategy produced a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Face-adjacency connected components.
    Topological,
    /// Radius clustering of vertex positions.
    Spatial,
    /// Voxel occupancy grid with morphological erosion.
    Voxelized,
    /// K-means with a caller-forced cluster count.
    ForcedK,
    /// Whole mesh returned as a single component.
    SingleFallback,
}

impl Strategy {
    /// Stable string name, used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Topological => "topological",
            Strategy::Spatial => "spatial",
            Strategy::Voxelized => "voxelized",
            Strategy::ForcedK => "forced-k",
            Strategy::SingleFallback => "single-fallback",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One separated sub-mesh, believed to correspond to a single physical object.
///
/// Created by the separator and never mutated afterwards; feature extraction
/// and classification are pure functions of a component.
#[derive(Debug, Clone)]
pub struct Component {
    /// Stable id, consecutive from 0 within one separation result.
    pub id: u32,
    /// The component's re-indexed mesh. Face indices only reference vertices
    /// within this component.
    pub mesh: Mesh,
    /// Strategy that produced this component.
    pub strategy: Strategy,
    /// Vertex count of the source mesh this component was cut from.
    pub source_vertex_count: usize,
    /// Face count of the source mesh this component was cut from.
    pub source_face_count: usize,
}

impl Component {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.mesh.face_count()
    }

    /// Enclosed volume of the component mesh.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.mesh.volume()
    }
}

/// Options controlling the separation strategies.
#[derive(Debug, Clone)]
pub struct SeparateParams {
    /// Distance threshold for spatial clustering and fragment merging,
    /// in mesh units (default 25.0, scaled for millimeter meshes).
    pub spatial_threshold: f64,

    /// Minimum face count for a component to survive on its own. Smaller
    /// fragments are merged into the nearest surviving component.
    pub min_component_size: usize,

    /// Fragments below this face count are dropped as noise instead of
    /// being merged.
    pub fragment_floor: usize,

    /// Voxel grid resolution for the voxelized strategy, in mesh units.
    pub voxel_size: f64,

    /// Morphological erosion radius for the voxelized strategy, in voxels.
    pub erosion_size: usize,

    /// Caller-supplied hint: partition into exactly this many groups.
    pub forced_component_count: Option<usize>,

    /// Hard cap on voxel grid cells. Grids beyond this are rejected so the
    /// voxel strategy stays bounded (cost scales with volume / voxel_size³).
    pub max_voxel_count: usize,

    /// Normal-angle threshold (degrees) beyond which a crease is considered
    /// a bridge between objects rather than part of one surface. Empirically
    /// tuned; the voxel erosion radius is the active bridge breaker.
    pub bridge_normal_angle_deg: f64,

    /// Seed for the forced-k strategy. Same mesh + seed + k gives identical
    /// assignments.
    pub kmeans_seed: u64,

    /// Iteration cap for k-means refinement.
    pub kmeans_max_iterations: usize,
}

impl Default for SeparateParams {
    fn default() -> Self {
        Self {
            spatial_threshold: 25.0,
            min_component_size: 100,
            fragment_floor: 10,
            voxel_size: 1.0,
            erosion_size: 1,
            forced_component_count: None,
            max_voxel_count: 64_000_000,
            bridge_normal_angle_deg: 120.0,
            kmeans_seed: 42,
            kmeans_max_iterations: 50,
        }
    }
}

impl SeparateParams {
    /// Check parameter sanity.
    pub fn validate(&self) -> DecomposeResult<()> {
        if self.voxel_size <= 0.0 {
            return Err(DecomposeError::invalid_params(format!(
                "voxel_size must be positive, got {}",
                self.voxel_size
            )));
        }
        if self.spatial_threshold <= 0.0 {
            return Err(DecomposeError::invalid_params(format!(
                "spatial_threshold must be positive, got {}",
                self.spatial_threshold
            )));
        }
        if self.forced_component_count == Some(0) {
            return Err(DecomposeError::invalid_params(
                "forced_component_count must be at least 1",
            ));
        }
        if self.max_voxel_count == 0 {
            return Err(DecomposeError::invalid_params(
                "max_voxel_count must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Separate a mesh into components representing distinct physical objects.
///
/// Never returns an empty list on success: a mesh that resists every
/// strategy degrades to a single component labeled
/// [`Strategy::SingleFallback`].
///
/// # Errors
///
/// `EmptyMesh` if the input has no faces, `InvalidParams` for nonsensical
/// options. Internal strategy failures are logged and absorbed.
pub fn separate(mesh: &Mesh, params: &SeparateParams) -> DecomposeResult<Vec<Component>> {
    if mesh.faces.is_empty() {
        return Err(DecomposeError::empty_mesh(
            "cannot separate a mesh with no faces",
        ));
    }
    params.validate()?;

    let _timer = OperationTimer::new("separate");

    // Forced count takes precedence over everything else.
    if let Some(k) = params.forced_component_count {
        match cluster::forced_k_groups(mesh, k, params) {
            Ok(groups) if !groups.is_empty() => {
                debug!(requested = k, found = groups.len(), "forced-k grouping");
                return Ok(finalize(mesh, groups, Strategy::ForcedK, params));
            }
            Ok(_) => {
                warn!("forced-k produced no surviving groups, falling through");
            }
            Err(e) => {
                warn!(error = %e, "forced-k strategy failed, falling through");
            }
        }
    }

    // Topological connectivity is exact; accept it whenever it finds more
    // than one surface patch.
    let patches = components::face_patches(mesh);
    info!(patches = patches.len(), "topological analysis");
    if patches.len() > 1 {
        return Ok(finalize(mesh, patches, Strategy::Topological, params));
    }

    // One fused patch: try geometric separation.
    match cluster::spatial_groups(mesh, params.spatial_threshold) {
        Ok(groups) if groups.len() > 1 => {
            debug!(clusters = groups.len(), "spatial clustering succeeded");
            return Ok(finalize(mesh, groups, Strategy::Spatial, params));
        }
        Ok(_) => {
            debug!("spatial clustering found a single region");
        }
        Err(e) => {
            warn!(error = %e, "spatial strategy failed, falling through");
        }
    }

    match voxel::voxel_groups(mesh, params) {
        Ok(groups) if groups.len() > 1 => {
            debug!(regions = groups.len(), "voxel erosion succeeded");
            return Ok(finalize(mesh, groups, Strategy::Voxelized, params));
        }
        Ok(_) => {
            debug!("voxel erosion found a single region");
        }
        Err(e) => {
            warn!(error = %e, "voxelized strategy failed, falling through");
        }
    }

    info!("all strategies found one object, returning single-fallback");
    Ok(vec![Component {
        id: 0,
        mesh: mesh.clone(),
        strategy: Strategy::SingleFallback,
        source_vertex_count: mesh.vertex_count(),
        source_face_count: mesh.face_count(),
    }])
}

/// Extract a re-indexed sub-mesh from a set of face indices.
///
/// The result owns fresh vertex and face arrays; face indices reference only
/// vertices within the sub-mesh. Vertex order follows first appearance in the
/// face list, so extraction is deterministic.
pub(crate) fn extract_submesh(mesh: &Mesh, face_indices: &[u32]) -> Mesh {
    use hashbrown::HashMap;

    let mut old_to_new: HashMap<u32, u32> = HashMap::new();
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::with_capacity(face_indices.len());

    for &face_idx in face_indices {
        let face = mesh.faces[face_idx as usize];
        let mut remapped = [0u32; 3];
        for (slot, &old_idx) in remapped.iter_mut().zip(face.iter()) {
            let new_idx = *old_to_new.entry(old_idx).or_insert_with(|| {
                vertices.push(mesh.vertices[old_idx as usize].clone());
                (vertices.len() - 1) as u32
            });
            *slot = new_idx;
        }
        faces.push(remapped);
    }

    Mesh { vertices, faces }
}

/// Turn face-index groups into finished components: merge undersized
/// fragments into their nearest survivor, drop sub-floor noise, re-id.
fn finalize(
    mesh: &Mesh,
    mut groups: Vec<Vec<u32>>,
    strategy: Strategy,
    params: &SeparateParams,
) -> Vec<Component> {
    // Largest first, matching the reporting convention downstream.
    groups.sort_by_key(|g| std::cmp::Reverse(g.len()));

    let survivors: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.len() >= params.min_component_size)
        .map(|(i, _)| i)
        .collect();

    if survivors.is_empty() {
        // Nothing meets the size bar; keep every group rather than inventing
        // an empty result.
        debug!(
            groups = groups.len(),
            min_size = params.min_component_size,
            "no group meets min_component_size, keeping all"
        );
    } else if survivors.len() < groups.len() {
        merge_fragments(mesh, &mut groups, &survivors, params);
    }

    let source_vertex_count = mesh.vertex_count();
    let source_face_count = mesh.face_count();

    groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .enumerate()
        .map(|(id, faces)| Component {
            id: id as u32,
            mesh: extract_submesh(mesh, &faces),
            strategy,
            source_vertex_count,
            source_face_count,
        })
        .collect()
}

/// Merge fragments below `min_component_size` into the nearest surviving
/// group (by face-centroid distance); drop fragments below the floor.
fn merge_fragments(
    mesh: &Mesh,
    groups: &mut Vec<Vec<u32>>,
    survivors: &[usize],
    params: &SeparateParams,
) {
    let mut tree: KdTree<f64, 3> = KdTree::new();
    for &si in survivors {
        let c = group_centroid(mesh, &groups[si]);
        tree.add(&[c[0], c[1], c[2]], si as u64);
    }

    let mut merged = 0usize;
    let mut dropped = 0usize;

    for gi in 0..groups.len() {
        if survivors.contains(&gi) || groups[gi].is_empty() {
            continue;
        }
        if groups[gi].len() < params.fragment_floor {
            dropped += 1;
            groups[gi].clear();
            continue;
        }

        let c = group_centroid(mesh, &groups[gi]);
        let nearest = tree.nearest_one::<kiddo::SquaredEuclidean>(&[c[0], c[1], c[2]]);
        let target = nearest.item as usize;
        let fragment = std::mem::take(&mut groups[gi]);
        groups[target].extend(fragment);
        merged += 1;
    }

    if merged > 0 || dropped > 0 {
        info!(merged, dropped, "fragment cleanup");
    }
}

fn group_centroid(mesh: &Mesh, faces: &[u32]) -> [f64; 3] {
    let mut sum = [0.0f64; 3];
    for &fi in faces {
        let c = mesh.face_centroid(fi as usize);
        sum[0] += c.x;
        sum[1] += c.y;
        sum[2] += c.z;
    }
    let n = faces.len().max(1) as f64;
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{cube_at, cylinder_mesh, merge_meshes};

    fn loose_params() -> SeparateParams {
        SeparateParams {
            min_component_size: 1,
            fragment_floor: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_mesh_is_fatal() {
        let mesh = Mesh::new();
        let err = separate(&mesh, &SeparateParams::default()).unwrap_err();
        assert!(matches!(err, DecomposeError::EmptyMesh { .. }));
    }

    #[test]
    fn test_invalid_params() {
        let mesh = cube_at(0.0, 0.0, 0.0, 1.0);
        let params = SeparateParams {
            voxel_size: 0.0,
            ..Default::default()
        };
        let err = separate(&mesh, &params).unwrap_err();
        assert!(matches!(err, DecomposeError::InvalidParams { .. }));
    }

    #[test]
    fn test_single_cube_falls_back() {
        let mesh = cube_at(0.0, 0.0, 0.0, 10.0);
        let params = SeparateParams {
            min_component_size: 1,
            fragment_floor: 1,
            // Coarse voxels so a solid cube stays one region
            voxel_size: 2.0,
            ..Default::default()
        };
        let comps = separate(&mesh, &params).unwrap();
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].strategy, Strategy::SingleFallback);
        assert_eq!(comps[0].face_count(), mesh.face_count());
    }

    #[test]
    fn test_two_disjoint_cubes_topological() {
        let mesh = merge_meshes(&[cube_at(0.0, 0.0, 0.0, 1.0), cube_at(10.0, 0.0, 0.0, 1.0)]);
        let comps = separate(&mesh, &loose_params()).unwrap();
        assert_eq!(comps.len(), 2);
        assert!(comps.iter().all(|c| c.strategy == Strategy::Topological));
        for c in &comps {
            assert_eq!(c.face_count(), 12);
            assert_eq!(c.vertex_count(), 8);
            assert!((c.volume() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_component_ids_are_consecutive() {
        let mesh = merge_meshes(&[
            cube_at(0.0, 0.0, 0.0, 1.0),
            cube_at(10.0, 0.0, 0.0, 1.0),
            cube_at(20.0, 0.0, 0.0, 1.0),
        ]);
        let comps = separate(&mesh, &loose_params()).unwrap();
        let ids: Vec<u32> = comps.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_forced_count_takes_precedence() {
        let mesh = merge_meshes(&[cube_at(0.0, 0.0, 0.0, 1.0), cube_at(10.0, 0.0, 0.0, 1.0)]);
        let params = SeparateParams {
            forced_component_count: Some(2),
            min_component_size: 1,
            fragment_floor: 1,
            ..Default::default()
        };
        let comps = separate(&mesh, &params).unwrap();
        assert_eq!(comps.len(), 2);
        assert!(comps.iter().all(|c| c.strategy == Strategy::ForcedK));
    }

    #[test]
    fn test_small_fragment_merged_into_survivor() {
        // A face-rich cylinder (256 faces) and a tiny satellite cube
        let mesh = merge_meshes(&[
            cylinder_mesh(5.0, 40.0, 64),
            cube_at(100.0, 0.0, 0.0, 0.5),
        ]);
        // Both clear a low bar
        let params = SeparateParams {
            min_component_size: 12,
            fragment_floor: 1,
            ..Default::default()
        };
        let comps = separate(&mesh, &params).unwrap();
        assert_eq!(comps.len(), 2);

        // Raise the bar above the satellite's 12 faces: it merges into the
        // cylinder
        let params = SeparateParams {
            min_component_size: 100,
            fragment_floor: 1,
            ..Default::default()
        };
        let comps = separate(&mesh, &params).unwrap();
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].face_count(), 256 + 12);
    }

    #[test]
    fn test_sub_floor_fragment_dropped() {
        let mesh = merge_meshes(&[
            cylinder_mesh(5.0, 40.0, 64),
            cube_at(100.0, 0.0, 0.0, 0.5),
        ]);
        let params = SeparateParams {
            min_component_size: 100,
            fragment_floor: 13,
            ..Default::default()
        };
        let comps = separate(&mesh, &params).unwrap();
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].face_count(), 256);
    }

    #[test]
    fn test_submesh_indices_are_local() {
        let mesh = merge_meshes(&[cube_at(0.0, 0.0, 0.0, 1.0), cube_at(10.0, 0.0, 0.0, 1.0)]);
        let comps = separate(&mesh, &loose_params()).unwrap();
        for c in &comps {
            let n = c.vertex_count() as u32;
            for face in &c.mesh.faces {
                assert!(face.iter().all(|&i| i < n));
            }
        }
    }
}
