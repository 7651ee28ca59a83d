//! Synthetic mesh builders shared by unit tests.

use std::f64::consts::TAU;

use nalgebra::Point3;

use crate::types::{Mesh, Vertex};

/// Closed axis-aligned box centered at (cx, cy, cz) with the given extents.
pub fn box_at(cx: f64, cy: f64, cz: f64, sx: f64, sy: f64, sz: f64) -> Mesh {
    let (hx, hy, hz) = (sx / 2.0, sy / 2.0, sz / 2.0);
    let mut mesh = Mesh::with_capacity(8, 12);
    let corners = [
        [cx - hx, cy - hy, cz - hz],
        [cx + hx, cy - hy, cz - hz],
        [cx + hx, cy + hy, cz - hz],
        [cx - hx, cy + hy, cz - hz],
        [cx - hx, cy - hy, cz + hz],
        [cx + hx, cy - hy, cz + hz],
        [cx + hx, cy + hy, cz + hz],
        [cx - hx, cy + hy, cz + hz],
    ];
    for [x, y, z] in corners {
        mesh.vertices.push(Vertex::from_coords(x, y, z));
    }
    // Outward winding, positive signed volume
    let faces: [[u32; 3]; 12] = [
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    mesh.faces.extend(faces);
    mesh
}

/// Closed cube centered at (cx, cy, cz).
pub fn cube_at(cx: f64, cy: f64, cz: f64, size: f64) -> Mesh {
    box_at(cx, cy, cz, size, size, size)
}

/// Closed capped cylinder centered at the origin with its axis along Z.
pub fn cylinder_mesh(radius: f64, height: f64, segments: usize) -> Mesh {
    let h = height / 2.0;
    let mut mesh = Mesh::with_capacity(2 * segments + 2, 4 * segments);

    for ring_z in [-h, h] {
        for i in 0..segments {
            let theta = TAU * i as f64 / segments as f64;
            mesh.vertices.push(Vertex::new(Point3::new(
                radius * theta.cos(),
                radius * theta.sin(),
                ring_z,
            )));
        }
    }
    let bottom_center = mesh.vertices.len() as u32;
    mesh.vertices.push(Vertex::from_coords(0.0, 0.0, -h));
    let top_center = mesh.vertices.len() as u32;
    mesh.vertices.push(Vertex::from_coords(0.0, 0.0, h));

    let n = segments as u32;
    for i in 0..n {
        let j = (i + 1) % n;
        let (b0, b1) = (i, j);
        let (t0, t1) = (n + i, n + j);
        // Side quad, outward
        mesh.faces.push([b0, b1, t1]);
        mesh.faces.push([b0, t1, t0]);
        // Caps
        mesh.faces.push([bottom_center, b1, b0]);
        mesh.faces.push([top_center, t0, t1]);
    }

    mesh
}

/// Concatenate meshes into one, offsetting face indices.
pub fn merge_meshes(meshes: &[Mesh]) -> Mesh {
    let mut merged = Mesh::new();
    for mesh in meshes {
        let offset = merged.vertices.len() as u32;
        merged.vertices.extend(mesh.vertices.iter().cloned());
        merged
            .faces
            .extend(mesh.faces.iter().map(|f| f.map(|i| i + offset)));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylinder_is_closed_with_expected_volume() {
        let mesh = cylinder_mesh(5.0, 40.0, 64);
        // n-gon prism volume: (1/2) n r^2 sin(2pi/n) h
        let expected = 0.5 * 64.0 * 25.0 * (TAU / 64.0).sin() * 40.0;
        assert!(
            (mesh.signed_volume() - expected).abs() < 1e-6,
            "volume {} vs {}",
            mesh.signed_volume(),
            expected
        );
    }

    #[test]
    fn test_merge_preserves_volume() {
        let merged = merge_meshes(&[cube_at(0.0, 0.0, 0.0, 2.0), cube_at(10.0, 0.0, 0.0, 1.0)]);
        assert!((merged.volume() - 9.0).abs() < 1e-9);
        assert_eq!(merged.face_count(), 24);
    }
}
