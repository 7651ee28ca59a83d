//! Principal-axis analysis and oriented bounding boxes.
//!
//! The feature extractor and the specialized matchers both consume the PCA
//! spectrum of a component's vertex cloud, so the covariance decomposition is
//! computed once here and shared.

use nalgebra::{Matrix3, Point3, Rotation3, Vector3};

use crate::types::Mesh;

/// PCA decomposition of a mesh's vertex positions.
#[derive(Debug, Clone)]
pub struct PrincipalAxes {
    /// Vertex centroid the decomposition is centered on.
    pub centroid: Point3<f64>,
    /// Eigenvalues of the covariance matrix, sorted descending.
    pub eigenvalues: [f64; 3],
    /// Unit eigenvectors matching `eigenvalues`, columns sorted the same way.
    pub axes: Matrix3<f64>,
}

/// An oriented bounding box aligned to the principal axes.
#[derive(Debug, Clone)]
pub struct OrientedBoundingBox {
    /// Box center in world coordinates.
    pub center: Point3<f64>,
    /// Half-extents along each principal axis, sorted descending.
    pub half_extents: Vector3<f64>,
    /// Rotation from local (principal-axis) to world coordinates.
    pub rotation: Rotation3<f64>,
    /// Box volume (product of full extents).
    pub volume: f64,
}

impl OrientedBoundingBox {
    /// Full extents (2 × half-extents), sorted descending.
    #[inline]
    pub fn extents(&self) -> [f64; 3] {
        [
            2.0 * self.half_extents.x,
            2.0 * self.half_extents.y,
            2.0 * self.half_extents.z,
        ]
    }
}

/// Compute the principal axes of a mesh's vertex cloud.
///
/// Returns None for meshes with fewer than 3 vertices, where the covariance
/// matrix is meaningless.
pub fn principal_axes(mesh: &Mesh) -> Option<PrincipalAxes> {
    if mesh.vertex_count() < 3 {
        return None;
    }

    let centroid = mesh.centroid()?;
    let cov = covariance_matrix(mesh, &centroid);

    let eigen = cov.symmetric_eigen();

    // Sort eigenpairs descending by eigenvalue
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let eigenvalues = [
        eigen.eigenvalues[order[0]].max(0.0),
        eigen.eigenvalues[order[1]].max(0.0),
        eigen.eigenvalues[order[2]].max(0.0),
    ];

    let mut axes = Matrix3::zeros();
    for (col, &src) in order.iter().enumerate() {
        axes.set_column(col, &eigen.eigenvectors.column(src));
    }

    // Keep a right-handed frame so the rotation is proper
    let c0 = axes.column(0).into_owned();
    let c1 = axes.column(1).into_owned();
    let c2 = axes.column(2).into_owned();
    if c0.cross(&c1).dot(&c2) < 0.0 {
        axes.set_column(2, &(-c2));
    }

    Some(PrincipalAxes {
        centroid,
        eigenvalues,
        axes,
    })
}

/// Compute an oriented bounding box from a PCA decomposition.
///
/// Projects all vertices into the principal-axis frame and takes the local
/// AABB. Not the minimal-volume box in general, but close for the solid
/// shapes the classifier deals with.
pub fn oriented_bounding_box(mesh: &Mesh, axes: &PrincipalAxes) -> OrientedBoundingBox {
    let rotation = Rotation3::from_matrix_unchecked(axes.axes);
    let inverse = rotation.inverse();

    let mut local_min = Vector3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
    let mut local_max = Vector3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);

    for v in &mesh.vertices {
        let local = inverse * (v.position - axes.centroid);
        local_min.x = local_min.x.min(local.x);
        local_min.y = local_min.y.min(local.y);
        local_min.z = local_min.z.min(local.z);
        local_max.x = local_max.x.max(local.x);
        local_max.y = local_max.y.max(local.y);
        local_max.z = local_max.z.max(local.z);
    }

    let half_extents = (local_max - local_min) / 2.0;
    let local_center = (local_min + local_max) / 2.0;
    let center = Point3::from(axes.centroid.coords + rotation * local_center);

    let volume = 8.0 * half_extents.x * half_extents.y * half_extents.z;

    OrientedBoundingBox {
        center,
        half_extents,
        rotation,
        volume,
    }
}

fn covariance_matrix(mesh: &Mesh, centroid: &Point3<f64>) -> Matrix3<f64> {
    let mut cov = Matrix3::zeros();

    for v in &mesh.vertices {
        let d = v.position - centroid;
        cov += d * d.transpose();
    }

    cov / mesh.vertex_count() as f64
}
