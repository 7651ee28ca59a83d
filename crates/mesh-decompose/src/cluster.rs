//! Geometric clustering strategies: forced-count k-means and radius-based
//! spatial grouping.
//!
//! Both operate on positions only and ignore connectivity, which is exactly
//! why they catch what the topological pass cannot: distinct objects fused
//! into one surface patch.

use kiddo::KdTree;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{DecomposeError, DecomposeResult};
use crate::separate::SeparateParams;
use crate::types::Mesh;

/// Partition faces into exactly `k` groups by k-means over face centroids.
///
/// Deterministic for a fixed mesh, `k` and seed: farthest-point
/// initialization from a seeded starting pick, then Lloyd iterations up to
/// the configured cap. Empty clusters are omitted from the result, so fewer
/// than `k` groups can come back.
pub fn forced_k_groups(
    mesh: &Mesh,
    k: usize,
    params: &SeparateParams,
) -> DecomposeResult<Vec<Vec<u32>>> {
    let face_count = mesh.face_count();
    if k == 0 {
        return Err(DecomposeError::invalid_params(
            "forced_component_count must be at least 1",
        ));
    }
    let k = k.min(face_count);

    let centroids: Vec<[f64; 3]> = (0..face_count)
        .map(|i| {
            let c = mesh.face_centroid(i);
            [c.x, c.y, c.z]
        })
        .collect();

    let mut centers = farthest_point_init(&centroids, k, params.kmeans_seed);
    let mut assignment = vec![0usize; face_count];

    for iteration in 0..params.kmeans_max_iterations {
        let mut changed = false;
        for (i, p) in centroids.iter().enumerate() {
            let best = nearest_center(p, &centers);
            if assignment[i] != best {
                assignment[i] = best;
                changed = true;
            }
        }

        if !changed && iteration > 0 {
            debug!(iteration, "k-means converged");
            break;
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (i, p) in centroids.iter().enumerate() {
            let c = assignment[i];
            sums[c][0] += p[0];
            sums[c][1] += p[1];
            sums[c][2] += p[2];
            counts[c] += 1;
        }
        for (c, center) in centers.iter_mut().enumerate() {
            if counts[c] > 0 {
                let n = counts[c] as f64;
                *center = [sums[c][0] / n, sums[c][1] / n, sums[c][2] / n];
            }
        }
    }

    let mut groups: Vec<Vec<u32>> = vec![Vec::new(); k];
    for (face, &cluster) in assignment.iter().enumerate() {
        groups[cluster].push(face as u32);
    }
    groups.retain(|g| !g.is_empty());

    Ok(groups)
}

/// Group faces by spatial proximity of their vertices.
///
/// Vertices within `threshold` of each other (transitively) form one
/// cluster; each face follows the majority label of its vertices. Returns
/// one face-index list per cluster.
pub fn spatial_groups(mesh: &Mesh, threshold: f64) -> DecomposeResult<Vec<Vec<u32>>> {
    let vertex_count = mesh.vertex_count();
    if vertex_count == 0 {
        return Ok(Vec::new());
    }
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(DecomposeError::strategy_failed(
            "spatial",
            format!("non-positive clustering threshold {threshold}"),
        ));
    }

    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, v) in mesh.vertices.iter().enumerate() {
        tree.add(&[v.position.x, v.position.y, v.position.z], i as u64);
    }

    // kiddo works in squared distances
    let radius_sq = threshold * threshold;

    const UNLABELED: u32 = u32::MAX;
    let mut labels = vec![UNLABELED; vertex_count];
    let mut next_label = 0u32;
    let mut queue: Vec<u32> = Vec::new();

    for seed in 0..vertex_count {
        if labels[seed] != UNLABELED {
            continue;
        }
        labels[seed] = next_label;
        queue.push(seed as u32);

        while let Some(vi) = queue.pop() {
            let p = mesh.vertices[vi as usize].position;
            let hits = tree.within::<kiddo::SquaredEuclidean>(&[p.x, p.y, p.z], radius_sq);
            for hit in &hits {
                let neighbor = hit.item as usize;
                if labels[neighbor] == UNLABELED {
                    labels[neighbor] = next_label;
                    queue.push(hit.item as u32);
                }
            }
        }
        next_label += 1;
    }

    debug!(clusters = next_label, threshold, "spatial vertex clustering");

    let mut groups: Vec<Vec<u32>> = vec![Vec::new(); next_label as usize];
    for (face_idx, face) in mesh.faces.iter().enumerate() {
        let votes = [
            labels[face[0] as usize],
            labels[face[1] as usize],
            labels[face[2] as usize],
        ];
        let label = majority_label(votes);
        groups[label as usize].push(face_idx as u32);
    }
    groups.retain(|g| !g.is_empty());

    Ok(groups)
}

/// Majority vote over three labels; ties fall to the first vertex's label.
fn majority_label(votes: [u32; 3]) -> u32 {
    if votes[1] == votes[2] {
        votes[1]
    } else {
        votes[0]
    }
}

fn farthest_point_init(points: &[[f64; 3]], k: usize, seed: u64) -> Vec<[f64; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers: Vec<[f64; 3]> = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);

    // Distance from each point to its nearest chosen center
    let mut min_dist: Vec<f64> = points.iter().map(|p| dist_sq(p, &centers[0])).collect();

    while centers.len() < k {
        let (farthest, _) = min_dist
            .iter()
            .enumerate()
            .fold((0usize, f64::NEG_INFINITY), |(bi, bd), (i, &d)| {
                if d > bd {
                    (i, d)
                } else {
                    (bi, bd)
                }
            });
        let next = points[farthest];
        for (p, d) in points.iter().zip(min_dist.iter_mut()) {
            *d = d.min(dist_sq(p, &next));
        }
        centers.push(next);
    }

    centers
}

fn nearest_center(p: &[f64; 3], centers: &[[f64; 3]]) -> usize {
    let mut best = 0usize;
    let mut best_d = f64::INFINITY;
    for (i, c) in centers.iter().enumerate() {
        let d = dist_sq(p, c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

#[inline]
fn dist_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{cube_at, merge_meshes};

    #[test]
    fn test_forced_k_separates_distant_cubes() {
        let mesh = merge_meshes(&[cube_at(0.0, 0.0, 0.0, 1.0), cube_at(50.0, 0.0, 0.0, 1.0)]);
        let groups = forced_k_groups(&mesh, 2, &SeparateParams::default()).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 12);
        assert_eq!(groups[1].len(), 12);
    }

    #[test]
    fn test_forced_k_deterministic() {
        let mesh = merge_meshes(&[
            cube_at(0.0, 0.0, 0.0, 1.0),
            cube_at(20.0, 0.0, 0.0, 1.0),
            cube_at(0.0, 20.0, 0.0, 1.0),
        ]);
        let params = SeparateParams::default();
        let a = forced_k_groups(&mesh, 3, &params).unwrap();
        let b = forced_k_groups(&mesh, 3, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_forced_k_clamps_to_face_count() {
        let mesh = cube_at(0.0, 0.0, 0.0, 1.0);
        let groups = forced_k_groups(&mesh, 100, &SeparateParams::default()).unwrap();
        let total: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, 12);
    }

    #[test]
    fn test_forced_k_zero_is_invalid() {
        let mesh = cube_at(0.0, 0.0, 0.0, 1.0);
        assert!(forced_k_groups(&mesh, 0, &SeparateParams::default()).is_err());
    }

    #[test]
    fn test_spatial_groups_by_distance() {
        let mesh = merge_meshes(&[cube_at(0.0, 0.0, 0.0, 1.0), cube_at(100.0, 0.0, 0.0, 1.0)]);
        let groups = spatial_groups(&mesh, 25.0).unwrap();
        assert_eq!(groups.len(), 2);
        let total: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, 24);
    }

    #[test]
    fn test_spatial_groups_close_objects_fuse() {
        // Gap of 2 units is well inside the 25-unit threshold
        let mesh = merge_meshes(&[cube_at(0.0, 0.0, 0.0, 1.0), cube_at(3.0, 0.0, 0.0, 1.0)]);
        let groups = spatial_groups(&mesh, 25.0).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_spatial_groups_bad_threshold() {
        let mesh = cube_at(0.0, 0.0, 0.0, 1.0);
        assert!(spatial_groups(&mesh, 0.0).is_err());
        assert!(spatial_groups(&mesh, f64::NAN).is_err());
    }
}
