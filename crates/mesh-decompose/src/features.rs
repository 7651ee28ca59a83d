//! Geometric feature extraction for classification.
//!
//! Every component is reduced to a fixed schema of scalar features before
//! any labeling happens; the classifier and the signature tables only ever
//! see this vector, never the mesh. Extraction is a pure function of the
//! component geometry.

use serde::Serialize;
use tracing::debug;

use crate::error::{DecomposeError, DecomposeResult};
use crate::obb;
use crate::separate::Component;

/// Ratio reported when an eigenvalue denominator is effectively zero,
/// signaling a planar or linear vertex cloud. Finite so the value stays
/// serializable and orderable.
pub const PLANAR_SENTINEL: f64 = 1e6;

/// Feature identifiers, in the order signature tables list them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BboxFillRatio,
    PcaRatio,
    Elongation,
    Isotropy,
    VolumeToSurface,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::BboxFillRatio,
        Feature::PcaRatio,
        Feature::Elongation,
        Feature::Isotropy,
        Feature::VolumeToSurface,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::BboxFillRatio => "bbox_fill_ratio",
            Feature::PcaRatio => "pca_ratio",
            Feature::Elongation => "elongation",
            Feature::Isotropy => "isotropy",
            Feature::VolumeToSurface => "volume_to_surface",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scalar features of one component.
///
/// Scale-dependent values (`volume_to_surface`) are in mesh units; the
/// eigenvalue ratios are dimensionless. `pca_ratio` and `elongation` are
/// always ≥ 1 because the covariance spectrum is sorted descending.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureVector {
    /// Enclosed volume over oriented-bounding-box volume, in (0, 1] for
    /// sane geometry. Near 1 for solid boxes, ~0.79 for cylinders, ~0.52
    /// for spheres.
    pub bbox_fill_ratio: f64,
    /// λ2/λ3 of the covariance spectrum. Near 1 for circular
    /// cross-sections, large for flat shapes.
    pub pca_ratio: f64,
    /// λ1/λ2: how stretched the shape is along its dominant axis.
    pub elongation: f64,
    /// λ3/λ1 in (0, 1]: 1 for isotropic clouds, → 0 for rods and plates.
    pub isotropy: f64,
    /// Volume over surface area, in mesh units.
    pub volume_to_surface: f64,
    pub vertex_count: usize,
    pub face_count: usize,
}

impl FeatureVector {
    /// Look up a feature by identifier.
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::BboxFillRatio => self.bbox_fill_ratio,
            Feature::PcaRatio => self.pca_ratio,
            Feature::Elongation => self.elongation,
            Feature::Isotropy => self.isotropy,
            Feature::VolumeToSurface => self.volume_to_surface,
        }
    }
}

/// Extract the feature vector of a component.
///
/// # Errors
///
/// `DegenerateGeometry` when the component has fewer than 4 vertices or
/// non-positive enclosed volume; such components carry no classifiable
/// shape information.
pub fn extract(component: &Component) -> DecomposeResult<FeatureVector> {
    let mesh = &component.mesh;
    let vertex_count = mesh.vertex_count();
    let volume = mesh.volume();

    if vertex_count < 4 || volume <= 0.0 {
        return Err(DecomposeError::degenerate_geometry(
            component.id,
            vertex_count,
            volume,
        ));
    }

    let axes = obb::principal_axes(mesh).ok_or_else(|| {
        DecomposeError::degenerate_geometry(component.id, vertex_count, volume)
    })?;
    let bounding = obb::oriented_bounding_box(mesh, &axes);

    let [l1, l2, l3] = axes.eigenvalues;
    // Degenerate spectra map to the sentinel instead of infinity
    let eps = l1.max(f64::MIN_POSITIVE) * 1e-12;
    let pca_ratio = if l3 > eps {
        l2 / l3
    } else {
        PLANAR_SENTINEL
    };
    let elongation = if l2 > eps { l1 / l2 } else { PLANAR_SENTINEL };
    let isotropy = if l1 > 0.0 { l3 / l1 } else { 0.0 };

    let bbox_fill_ratio = if bounding.volume > 0.0 {
        volume / bounding.volume
    } else {
        0.0
    };

    let surface_area = mesh.surface_area();
    let volume_to_surface = if surface_area > 0.0 {
        volume / surface_area
    } else {
        0.0
    };

    let features = FeatureVector {
        bbox_fill_ratio,
        pca_ratio,
        elongation,
        isotropy,
        volume_to_surface,
        vertex_count,
        face_count: mesh.face_count(),
    };

    debug!(
        component = component.id,
        fill = %format!("{bbox_fill_ratio:.3}"),
        pca = %format!("{pca_ratio:.3}"),
        elongation = %format!("{elongation:.3}"),
        "extracted features"
    );

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::separate::Strategy;
    use crate::testutil::{box_at, cube_at, cylinder_mesh};
    use crate::types::Mesh;
    use approx::assert_relative_eq;

    fn component_of(mesh: Mesh) -> Component {
        let (v, f) = (mesh.vertex_count(), mesh.face_count());
        Component {
            id: 0,
            mesh,
            strategy: Strategy::SingleFallback,
            source_vertex_count: v,
            source_face_count: f,
        }
    }

    #[test]
    fn test_cube_features() {
        let fv = extract(&component_of(cube_at(0.0, 0.0, 0.0, 10.0))).unwrap();
        assert_relative_eq!(fv.bbox_fill_ratio, 1.0, epsilon = 1e-6);
        assert_relative_eq!(fv.elongation, 1.0, epsilon = 1e-6);
        assert_relative_eq!(fv.isotropy, 1.0, epsilon = 1e-6);
        // For a cube of side s, V/A = s/6
        assert_relative_eq!(fv.volume_to_surface, 10.0 / 6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cylinder_features() {
        let fv = extract(&component_of(cylinder_mesh(5.0, 40.0, 64))).unwrap();
        // Circular cross-section: the two minor eigenvalues match
        assert_relative_eq!(fv.pca_ratio, 1.0, epsilon = 0.05);
        assert!(fv.elongation > 3.0, "elongation {}", fv.elongation);
        // pi/4 of the bounding box is filled, modulo tessellation
        assert!(
            (fv.bbox_fill_ratio - std::f64::consts::FRAC_PI_4).abs() < 0.05,
            "fill {}",
            fv.bbox_fill_ratio
        );
    }

    #[test]
    fn test_elongated_box() {
        let fv = extract(&component_of(box_at(0.0, 0.0, 0.0, 40.0, 4.0, 4.0))).unwrap();
        assert!(fv.elongation > 5.0);
        assert_relative_eq!(fv.pca_ratio, 1.0, epsilon = 1e-6);
        assert_relative_eq!(fv.bbox_fill_ratio, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_too_few_vertices_is_degenerate() {
        let mut mesh = Mesh::new();
        mesh.vertices
            .push(crate::types::Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices
            .push(crate::types::Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices
            .push(crate::types::Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);

        let err = extract(&component_of(mesh)).unwrap_err();
        assert!(matches!(err, DecomposeError::DegenerateGeometry { .. }));
    }

    #[test]
    fn test_zero_volume_is_degenerate() {
        // Two coincident opposite-winding triangles enclose nothing
        let mut mesh = Mesh::new();
        for c in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]] {
            mesh.vertices
                .push(crate::types::Vertex::from_coords(c[0], c[1], c[2]));
        }
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([2, 1, 3]);

        let err = extract(&component_of(mesh)).unwrap_err();
        assert!(matches!(err, DecomposeError::DegenerateGeometry { .. }));
    }

    #[test]
    fn test_feature_lookup_matches_fields() {
        let fv = extract(&component_of(cube_at(0.0, 0.0, 0.0, 2.0))).unwrap();
        for feature in Feature::ALL {
            let looked_up = fv.get(feature);
            assert!(looked_up.is_finite());
        }
        assert_eq!(fv.get(Feature::BboxFillRatio), fv.bbox_fill_ratio);
        assert_eq!(fv.get(Feature::Elongation), fv.elongation);
    }
}
