//! Decompose triangle meshes into typed geometric primitives.
//!
//! A scanned or exported assembly often arrives as one fused mesh covering
//! several physical objects. This crate separates such a mesh into
//! components, reduces each component to a fixed vector of geometric
//! features, and labels it as a primitive shape (cylinder, box, sphere,
//! hollow box, cone, or complex) with a confidence score. Specialized
//! matchers can attach domain tags (for example `battery_like`) on top of
//! the base label.
//!
//! # Pipeline
//!
//! 1. **Separate** ([`separate`]): an ordered chain of strategies —
//!    forced-count k-means, topological connectivity, spatial clustering,
//!    voxel erosion — with a single-component fallback. See
//!    [`separate::SeparateParams`].
//! 2. **Extract** ([`features`]): per-component feature vector from the PCA
//!    spectrum and oriented bounding box of the vertex cloud.
//! 3. **Classify** ([`classify`]): a heuristic decision tree reconciled with
//!    a weighted signature-interval match; the signature opinion overrides
//!    the heuristic only when strictly stronger.
//! 4. **Match** ([`matchers`]): additive domain tags.
//!
//! The whole pipeline runs through [`decompose`]:
//!
//! ```
//! use mesh_decompose::{decompose, DecomposeParams, Mesh};
//!
//! // An empty mesh is the only fatal input
//! let result = decompose(&Mesh::new(), &DecomposeParams::default());
//! assert!(result.is_err());
//! ```
//!
//! Mesh loading, repair, and CAD export are deliberately out of scope; the
//! crate consumes already-loaded geometry and produces structured results.
//!
//! # Logging
//!
//! All stages emit `tracing` events; install a subscriber and set
//! `RUST_LOG=mesh_decompose=debug` to watch the strategy chain and
//! per-component decisions.

pub mod adjacency;
pub mod classify;
pub mod cluster;
pub mod components;
pub mod decompose;
pub mod error;
pub mod features;
pub mod matchers;
pub mod obb;
pub mod separate;
pub mod signatures;
pub mod tracing_ext;
pub mod types;
pub mod voxel;

#[cfg(test)]
pub(crate) mod testutil;

pub use classify::{classify, Classification, ClassifyParams, FeatureCheck, MatchResult};
pub use decompose::{
    decompose, decompose_with, ClassifiedComponent, ComponentReport, DecomposeParams,
    DecompositionReport, DecompositionResult,
};
pub use error::{DecomposeError, DecomposeResult, ErrorCode};
pub use features::{Feature, FeatureVector};
pub use matchers::{BatteryMatcher, MatcherSet, SignatureMatcher, Tag};
pub use obb::{OrientedBoundingBox, PrincipalAxes};
pub use separate::{separate, Component, SeparateParams, Strategy};
pub use signatures::{FeatureRange, ShapeClass, ShapeSignature, SignatureTable};
pub use types::{Mesh, Triangle, Vertex};
