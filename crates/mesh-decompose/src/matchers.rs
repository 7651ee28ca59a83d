//! Specialized signature matchers.
//!
//! Matchers annotate components with domain tags after classification. They
//! are strictly additive: a matcher never changes the base label, only
//! attaches evidence, and any number of matchers may fire on one component.
//! Registration is a plain list, so callers can extend the set without
//! touching this module.

use serde::Serialize;

use crate::classify::Classification;
use crate::obb;
use crate::separate::Component;

/// A domain annotation attached to a component by a matcher.
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    /// Stable tag name, e.g. `battery_like`.
    pub name: &'static str,
    /// Named measurements backing the tag.
    pub measurements: Vec<(&'static str, f64)>,
}

/// Inspects a classified component and optionally attaches a tag.
///
/// Implementations must be side-effect-free; they see the component and the
/// finished classification but change neither.
pub trait SignatureMatcher: Send + Sync {
    /// Stable matcher name for logs.
    fn name(&self) -> &'static str;

    fn inspect(&self, component: &Component, classification: &Classification) -> Option<Tag>;
}

/// An ordered list of matchers run against every classified component.
pub struct MatcherSet {
    matchers: Vec<Box<dyn SignatureMatcher>>,
}

impl MatcherSet {
    /// An empty set; tags will never be attached.
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// The built-in matchers.
    pub fn standard() -> Self {
        Self {
            matchers: vec![Box::new(BatteryMatcher::default())],
        }
    }

    /// Add a matcher to the set.
    pub fn with(mut self, matcher: Box<dyn SignatureMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Run every matcher, collecting the tags that fire.
    pub fn run(&self, component: &Component, classification: &Classification) -> Vec<Tag> {
        self.matchers
            .iter()
            .filter_map(|m| m.inspect(component, classification))
            .collect()
    }
}

impl std::fmt::Debug for MatcherSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatcherSet")
            .field("matchers", &self.matchers.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Flags components whose proportions match a cylindrical cell battery:
/// strongly elongated along one axis with a circular cross-section.
#[derive(Debug, Clone)]
pub struct BatteryMatcher {
    /// Minimum λ1/λ3 eigenvalue ratio along the dominant axis.
    pub min_aspect: f64,
    /// Accepted λ2/λ3 interval for a round cross-section.
    pub radial_range: (f64, f64),
    /// Minimum vertex count; tiny fragments produce unreliable spectra.
    pub min_vertices: usize,
}

impl Default for BatteryMatcher {
    fn default() -> Self {
        Self {
            min_aspect: 3.0,
            radial_range: (0.8, 1.2),
            min_vertices: 100,
        }
    }
}

impl SignatureMatcher for BatteryMatcher {
    fn name(&self) -> &'static str {
        "battery"
    }

    fn inspect(&self, component: &Component, _classification: &Classification) -> Option<Tag> {
        if component.vertex_count() < self.min_vertices {
            return None;
        }
        let axes = obb::principal_axes(&component.mesh)?;
        let [l1, l2, l3] = axes.eigenvalues;
        if l3 <= 0.0 {
            return None;
        }

        let aspect = l1 / l3;
        let radial = l2 / l3;
        let round = radial >= self.radial_range.0 && radial <= self.radial_range.1;

        if aspect > self.min_aspect && round {
            Some(Tag {
                name: "battery_like",
                measurements: vec![("aspect_ratio", aspect), ("radial_ratio", radial)],
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, ClassifyParams};
    use crate::features;
    use crate::separate::Strategy;
    use crate::signatures::SignatureTable;
    use crate::testutil::{cube_at, cylinder_mesh};
    use crate::types::Mesh;

    fn classified(mesh: Mesh) -> (Component, Classification) {
        let (v, f) = (mesh.vertex_count(), mesh.face_count());
        let component = Component {
            id: 0,
            mesh,
            strategy: Strategy::SingleFallback,
            source_vertex_count: v,
            source_face_count: f,
        };
        let fv = features::extract(&component).unwrap();
        let c = classify(&fv, &SignatureTable::standard(), &ClassifyParams::default());
        (component, c)
    }

    #[test]
    fn test_battery_fires_on_elongated_cylinder() {
        let (component, classification) = classified(cylinder_mesh(5.0, 40.0, 64));
        let tags = MatcherSet::standard().run(&component, &classification);
        assert_eq!(tags.len(), 1);
        let tag = &tags[0];
        assert_eq!(tag.name, "battery_like");
        let aspect = tag
            .measurements
            .iter()
            .find(|(n, _)| *n == "aspect_ratio")
            .map(|(_, v)| *v)
            .unwrap();
        assert!(aspect > 3.0);
    }

    #[test]
    fn test_battery_ignores_cube() {
        let (component, classification) = classified(cube_at(0.0, 0.0, 0.0, 10.0));
        let tags = MatcherSet::standard().run(&component, &classification);
        assert!(tags.is_empty());
    }

    #[test]
    fn test_battery_ignores_stubby_cylinder() {
        // Round but not elongated enough
        let (component, classification) = classified(cylinder_mesh(5.0, 8.0, 64));
        let matcher = BatteryMatcher::default();
        assert!(matcher.inspect(&component, &classification).is_none());
    }

    #[test]
    fn test_battery_min_vertex_gate() {
        // 8 segments -> 18 vertices, below the 100-vertex floor
        let (component, classification) = classified(cylinder_mesh(5.0, 40.0, 8));
        let matcher = BatteryMatcher::default();
        assert!(matcher.inspect(&component, &classification).is_none());
    }

    #[test]
    fn test_matchers_never_change_labels() {
        let (component, classification) = classified(cylinder_mesh(5.0, 40.0, 64));
        let label_before = classification.label;
        let _ = MatcherSet::standard().run(&component, &classification);
        assert_eq!(classification.label, label_before);
    }
}
