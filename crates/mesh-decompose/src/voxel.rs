//! Voxelization-based separation.
//!
//! The last real strategy in the chain: rasterize the mesh into a binary
//! occupancy grid, fill the enclosed interior, erode to break thin bridges,
//! label the surviving 6-connected regions, dilate the labels back out, and
//! assign the original triangles to regions. Results are approximate within
//! the erosion radius, which is the price of cutting bridges that topology
//! and distance clustering cannot see.

use kiddo::float::kdtree::KdTree;

/// Kd-tree bucket size. Voxel cell centers lie on a lattice, so many points
/// share a coordinate on a single axis; kiddo panics if a full bucket is
/// axis-degenerate, which the default bucket size of 32 does not tolerate.
type CellTree = KdTree<f64, u64, 3, 512, u32>;
use nalgebra::Point3;
use tracing::debug;

use crate::error::{DecomposeError, DecomposeResult};
use crate::separate::SeparateParams;
use crate::types::Mesh;

const STRATEGY: &str = "voxelized";

/// Binary occupancy grid over a padded mesh AABB.
struct VoxelGrid {
    origin: Point3<f64>,
    size: f64,
    dims: [usize; 3],
    occupied: Vec<bool>,
}

impl VoxelGrid {
    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    #[inline]
    fn cell_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Cell containing a world point, or None outside the grid.
    fn cell_of(&self, p: &Point3<f64>) -> Option<[usize; 3]> {
        let local = (p - self.origin) / self.size;
        if local.x < 0.0 || local.y < 0.0 || local.z < 0.0 {
            return None;
        }
        let (x, y, z) = (local.x as usize, local.y as usize, local.z as usize);
        if x >= self.dims[0] || y >= self.dims[1] || z >= self.dims[2] {
            return None;
        }
        Some([x, y, z])
    }

    /// World-space center of a cell.
    fn cell_center(&self, cell: [usize; 3]) -> Point3<f64> {
        Point3::new(
            self.origin.x + (cell[0] as f64 + 0.5) * self.size,
            self.origin.y + (cell[1] as f64 + 0.5) * self.size,
            self.origin.z + (cell[2] as f64 + 0.5) * self.size,
        )
    }

    fn neighbors6(&self, cell: [usize; 3]) -> impl Iterator<Item = [usize; 3]> + '_ {
        const OFFSETS: [[i64; 3]; 6] = [
            [1, 0, 0],
            [-1, 0, 0],
            [0, 1, 0],
            [0, -1, 0],
            [0, 0, 1],
            [0, 0, -1],
        ];
        OFFSETS.iter().filter_map(move |o| {
            let x = cell[0] as i64 + o[0];
            let y = cell[1] as i64 + o[1];
            let z = cell[2] as i64 + o[2];
            if x < 0
                || y < 0
                || z < 0
                || x >= self.dims[0] as i64
                || y >= self.dims[1] as i64
                || z >= self.dims[2] as i64
            {
                None
            } else {
                Some([x as usize, y as usize, z as usize])
            }
        })
    }
}

/// Separate faces into groups via erosion of the voxelized solid.
///
/// A single group (or none after over-erosion) means the strategy found no
/// split; the caller treats that as fall-through, not failure. Hard errors
/// are reserved for grids exceeding `max_voxel_count`.
pub fn voxel_groups(mesh: &Mesh, params: &SeparateParams) -> DecomposeResult<Vec<Vec<u32>>> {
    let face_count = mesh.face_count();
    if face_count == 0 {
        return Ok(Vec::new());
    }

    let mut grid = build_grid(mesh, params)?;
    rasterize_surface(mesh, &mut grid);
    fill_interior(&mut grid);

    let solid = grid.occupied.clone();
    for _ in 0..params.erosion_size {
        erode(&mut grid);
    }

    let labels = label_regions(&grid, params.min_component_size);
    let region_count = labels.iter().copied().max().unwrap_or(0) as usize;
    debug!(
        dims = ?grid.dims,
        regions = region_count,
        erosion = params.erosion_size,
        "voxel erosion labeling"
    );

    if region_count < 2 {
        // No split found; report the whole mesh as one group
        return Ok(vec![(0..face_count as u32).collect()]);
    }

    let labels = dilate_labels(&grid, &solid, labels);
    assign_faces(mesh, &grid, &labels, region_count)
}

fn build_grid(mesh: &Mesh, params: &SeparateParams) -> DecomposeResult<VoxelGrid> {
    let (min, max) = mesh.bounds().ok_or_else(|| {
        DecomposeError::strategy_failed(STRATEGY, "mesh has no vertices to voxelize")
    })?;

    let size = params.voxel_size;
    // Pad so erosion and the exterior flood fill have empty border cells
    let margin = (params.erosion_size + 1) as f64 * size;
    let origin = Point3::new(min.x - margin, min.y - margin, min.z - margin);

    let mut dims = [0usize; 3];
    let extent = [
        max.x - min.x + 2.0 * margin,
        max.y - min.y + 2.0 * margin,
        max.z - min.z + 2.0 * margin,
    ];
    for (d, e) in dims.iter_mut().zip(extent.iter()) {
        *d = (e / size).ceil() as usize + 1;
    }

    let cell_count = dims[0]
        .checked_mul(dims[1])
        .and_then(|v| v.checked_mul(dims[2]))
        .ok_or_else(|| DecomposeError::strategy_failed(STRATEGY, "voxel grid size overflow"))?;
    if cell_count > params.max_voxel_count {
        return Err(DecomposeError::strategy_failed(
            STRATEGY,
            format!(
                "grid of {}x{}x{} = {} cells exceeds cap of {}",
                dims[0], dims[1], dims[2], cell_count, params.max_voxel_count
            ),
        ));
    }

    Ok(VoxelGrid {
        origin,
        size,
        dims,
        occupied: vec![false; cell_count],
    })
}

/// Mark every cell touched by a triangle, by sampling each triangle at
/// roughly half-voxel spacing in barycentric coordinates.
fn rasterize_surface(mesh: &Mesh, grid: &mut VoxelGrid) {
    let step = grid.size * 0.5;

    for tri in mesh.triangles() {
        let e1 = tri.v1 - tri.v0;
        let e2 = tri.v2 - tri.v0;
        let longest = e1.norm().max(e2.norm()).max((tri.v2 - tri.v1).norm());
        let n = ((longest / step).ceil() as usize).max(1);

        for i in 0..=n {
            for j in 0..=(n - i) {
                let a = i as f64 / n as f64;
                let b = j as f64 / n as f64;
                let p = tri.v0 + e1 * a + e2 * b;
                if let Some(cell) = grid.cell_of(&p) {
                    let idx = grid.index(cell[0], cell[1], cell[2]);
                    grid.occupied[idx] = true;
                }
            }
        }
    }
}

/// Flood fill the exterior from the grid corner, then mark everything that is
/// neither exterior nor surface as interior solid.
fn fill_interior(grid: &mut VoxelGrid) {
    let mut exterior = vec![false; grid.cell_count()];
    let mut stack: Vec<[usize; 3]> = Vec::new();

    // The padded border guarantees the corner cell is empty
    if !grid.occupied[0] {
        exterior[0] = true;
        stack.push([0, 0, 0]);
    }

    while let Some(cell) = stack.pop() {
        let neighbors: Vec<[usize; 3]> = grid.neighbors6(cell).collect();
        for next in neighbors {
            let idx = grid.index(next[0], next[1], next[2]);
            if !exterior[idx] && !grid.occupied[idx] {
                exterior[idx] = true;
                stack.push(next);
            }
        }
    }

    for (occ, ext) in grid.occupied.iter_mut().zip(exterior.iter()) {
        if !*ext {
            *occ = true;
        }
    }
}

/// One 6-connected erosion step: a cell survives iff all 6 neighbors are
/// occupied (grid boundary counts as empty).
fn erode(grid: &mut VoxelGrid) {
    let mut next = vec![false; grid.cell_count()];

    for z in 0..grid.dims[2] {
        for y in 0..grid.dims[1] {
            for x in 0..grid.dims[0] {
                let idx = grid.index(x, y, z);
                if !grid.occupied[idx] {
                    continue;
                }
                let mut neighbor_count = 0;
                let mut all_occupied = true;
                for n in grid.neighbors6([x, y, z]) {
                    neighbor_count += 1;
                    if !grid.occupied[grid.index(n[0], n[1], n[2])] {
                        all_occupied = false;
                        break;
                    }
                }
                next[idx] = all_occupied && neighbor_count == 6;
            }
        }
    }

    grid.occupied = next;
}

/// Label 6-connected occupied regions, dropping regions smaller than
/// `min_cells`. Labels are 1-based; 0 means unlabeled.
fn label_regions(grid: &VoxelGrid, min_cells: usize) -> Vec<u32> {
    let mut labels = vec![0u32; grid.cell_count()];
    let mut next_label = 0u32;
    let mut stack: Vec<[usize; 3]> = Vec::new();

    for z in 0..grid.dims[2] {
        for y in 0..grid.dims[1] {
            for x in 0..grid.dims[0] {
                let seed = grid.index(x, y, z);
                if !grid.occupied[seed] || labels[seed] != 0 {
                    continue;
                }
                next_label += 1;
                labels[seed] = next_label;
                stack.push([x, y, z]);

                let mut region = vec![seed];
                while let Some(cell) = stack.pop() {
                    for n in grid.neighbors6(cell) {
                        let idx = grid.index(n[0], n[1], n[2]);
                        if grid.occupied[idx] && labels[idx] == 0 {
                            labels[idx] = next_label;
                            region.push(idx);
                            stack.push(n);
                        }
                    }
                }

                if region.len() < min_cells {
                    // Noise region: unlabel and hand the id back, so labels
                    // stay dense 1..=n
                    for idx in region {
                        labels[idx] = 0;
                    }
                    next_label -= 1;
                }
            }
        }
    }

    labels
}

/// Grow labels back over the pre-erosion solid by multi-source BFS, so every
/// originally occupied cell ends up with the label of its nearest region.
fn dilate_labels(grid: &VoxelGrid, solid: &[bool], mut labels: Vec<u32>) -> Vec<u32> {
    let mut frontier: Vec<[usize; 3]> = Vec::new();
    for z in 0..grid.dims[2] {
        for y in 0..grid.dims[1] {
            for x in 0..grid.dims[0] {
                if labels[grid.index(x, y, z)] != 0 {
                    frontier.push([x, y, z]);
                }
            }
        }
    }

    while !frontier.is_empty() {
        let mut next_frontier: Vec<[usize; 3]> = Vec::new();
        for cell in frontier {
            let label = labels[grid.index(cell[0], cell[1], cell[2])];
            for n in grid.neighbors6(cell) {
                let idx = grid.index(n[0], n[1], n[2]);
                if solid[idx] && labels[idx] == 0 {
                    labels[idx] = label;
                    next_frontier.push(n);
                }
            }
        }
        frontier = next_frontier;
    }

    labels
}

/// Assign each face to a region by its centroid's cell label, falling back to
/// the nearest labeled cell for centroids that land in empty space.
fn assign_faces(
    mesh: &Mesh,
    grid: &VoxelGrid,
    labels: &[u32],
    region_count: usize,
) -> DecomposeResult<Vec<Vec<u32>>> {
    let mut tree: CellTree = CellTree::new();
    let mut labeled_cells = 0usize;
    for z in 0..grid.dims[2] {
        for y in 0..grid.dims[1] {
            for x in 0..grid.dims[0] {
                let idx = grid.index(x, y, z);
                if labels[idx] != 0 {
                    let c = grid.cell_center([x, y, z]);
                    tree.add(&[c.x, c.y, c.z], idx as u64);
                    labeled_cells += 1;
                }
            }
        }
    }
    if labeled_cells == 0 {
        return Err(DecomposeError::strategy_failed(
            STRATEGY,
            "no labeled voxels to assign faces to",
        ));
    }

    let mut groups: Vec<Vec<u32>> = vec![Vec::new(); region_count];
    for face_idx in 0..mesh.face_count() {
        let centroid = mesh.face_centroid(face_idx);

        let label = match grid.cell_of(&centroid) {
            Some(cell) => {
                let direct = labels[grid.index(cell[0], cell[1], cell[2])];
                if direct != 0 {
                    direct
                } else {
                    nearest_label(&tree, labels, &centroid)
                }
            }
            None => nearest_label(&tree, labels, &centroid),
        };
        groups[(label - 1) as usize].push(face_idx as u32);
    }
    groups.retain(|g| !g.is_empty());

    Ok(groups)
}

fn nearest_label(tree: &CellTree, labels: &[u32], p: &Point3<f64>) -> u32 {
    let hit = tree.nearest_one::<kiddo::SquaredEuclidean>(&[p.x, p.y, p.z]);
    labels[hit.item as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{box_at, cube_at, merge_meshes};

    fn voxel_params() -> SeparateParams {
        SeparateParams {
            voxel_size: 1.0,
            erosion_size: 1,
            min_component_size: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_cube_one_region() {
        let mesh = cube_at(0.0, 0.0, 0.0, 8.0);
        let groups = voxel_groups(&mesh, &voxel_params()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 12);
    }

    #[test]
    fn test_bridged_cubes_split() {
        // Two 8-unit cubes joined by a 1-unit-thick bridge. One erosion step
        // at 1-unit voxels removes the bridge entirely.
        let mesh = merge_meshes(&[
            cube_at(0.0, 0.0, 0.0, 8.0),
            cube_at(16.0, 0.0, 0.0, 8.0),
            box_at(8.0, 0.0, 0.0, 8.0, 1.0, 1.0),
        ]);
        let groups = voxel_groups(&mesh, &voxel_params()).unwrap();
        assert_eq!(groups.len(), 2, "groups: {:?}", groups.len());

        // Every face assigned exactly once
        let total: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, mesh.face_count());
    }

    #[test]
    fn test_voxel_cap_enforced() {
        let mesh = cube_at(0.0, 0.0, 0.0, 100.0);
        let params = SeparateParams {
            max_voxel_count: 1000,
            ..voxel_params()
        };
        let err = voxel_groups(&mesh, &params).unwrap_err();
        assert!(matches!(err, DecomposeError::StrategyFailed { .. }));
    }

    #[test]
    fn test_over_erosion_falls_back_to_single_group() {
        // A 2-unit cube at 1-unit voxels cannot survive one erosion step
        let mesh = cube_at(0.0, 0.0, 0.0, 2.0);
        let groups = voxel_groups(&mesh, &voxel_params()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), mesh.face_count());
    }
}
