//! Top-level decomposition controller.
//!
//! Chains the pipeline: separate the mesh into components, then for each
//! component extract features, classify, and run the specialized matchers.
//! Components run in parallel; each stage is a pure function of its
//! component, so the only coordination point is collecting the results.

use hashbrown::HashMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::classify::{classify, Classification, ClassifyParams};
use crate::error::DecomposeResult;
use crate::features::{self, FeatureVector};
use crate::matchers::{MatcherSet, Tag};
use crate::separate::{separate, Component, SeparateParams, Strategy};
use crate::signatures::SignatureTable;
use crate::tracing_ext::{log_mesh_stats, OperationTimer};
use crate::types::Mesh;

/// Options for a full decomposition run.
#[derive(Debug, Clone, Default)]
pub struct DecomposeParams {
    pub separate: SeparateParams,
    pub classify: ClassifyParams,
}

/// Per-component outcome of the classification pipeline.
#[derive(Debug, Clone)]
pub enum ComponentReport {
    Classified {
        features: FeatureVector,
        classification: Classification,
        tags: Vec<Tag>,
    },
    /// Feature extraction rejected the component; the geometry is kept but
    /// carries no label.
    Unclassifiable { reason: String },
}

impl ComponentReport {
    /// Label string for census and reporting.
    pub fn label_str(&self) -> &'static str {
        match self {
            ComponentReport::Classified { classification, .. } => classification.label.as_str(),
            ComponentReport::Unclassifiable { .. } => "unclassifiable",
        }
    }
}

/// A component together with its pipeline outcome.
#[derive(Debug, Clone)]
pub struct ClassifiedComponent {
    pub component: Component,
    pub report: ComponentReport,
}

/// Count of components per assigned label.
#[derive(Debug, Clone, Serialize)]
pub struct CensusEntry {
    pub label: String,
    pub count: usize,
}

/// Distance between the vertex centroids of two components.
#[derive(Debug, Clone, Serialize)]
pub struct CenterDistance {
    pub a: u32,
    pub b: u32,
    pub distance: f64,
}

/// The full result of decomposing one mesh.
#[derive(Debug, Clone)]
pub struct DecompositionResult {
    /// Components in separator order (largest first).
    pub components: Vec<ClassifiedComponent>,
    /// The strategy that produced the components.
    pub strategy: Strategy,
    /// Enclosed volume of the input mesh.
    pub input_volume: f64,
    /// Sum of component volumes.
    pub output_volume: f64,
    /// Components per label, sorted by label.
    pub census: Vec<CensusEntry>,
    /// Pairwise centroid distances, for assembly-structure analysis.
    pub center_distances: Vec<CenterDistance>,
}

impl DecompositionResult {
    /// Output volume over input volume. Close to 1 when separation
    /// conserved geometry; erosion artifacts and dropped noise fragments
    /// pull it down.
    pub fn volume_conservation_ratio(&self) -> f64 {
        if self.input_volume > 0.0 {
            self.output_volume / self.input_volume
        } else {
            0.0
        }
    }

    /// Build a serializable summary of the run, without mesh geometry.
    pub fn report(&self) -> DecompositionReport {
        DecompositionReport {
            strategy: self.strategy,
            component_count: self.components.len(),
            input_volume: self.input_volume,
            output_volume: self.output_volume,
            volume_conservation_ratio: self.volume_conservation_ratio(),
            census: self.census.clone(),
            center_distances: self.center_distances.clone(),
            components: self.components.iter().map(ComponentSummary::of).collect(),
        }
    }
}

/// Serializable run summary for JSON diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct DecompositionReport {
    pub strategy: Strategy,
    pub component_count: usize,
    pub input_volume: f64,
    pub output_volume: f64,
    pub volume_conservation_ratio: f64,
    pub census: Vec<CensusEntry>,
    pub center_distances: Vec<CenterDistance>,
    pub components: Vec<ComponentSummary>,
}

/// Per-component entry of a [`DecompositionReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSummary {
    pub id: u32,
    pub label: String,
    pub confidence: Option<f64>,
    pub overridden: bool,
    pub vertex_count: usize,
    pub face_count: usize,
    pub volume: f64,
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unclassifiable_reason: Option<String>,
}

impl ComponentSummary {
    fn of(cc: &ClassifiedComponent) -> Self {
        let (confidence, overridden, tags, features, reason) = match &cc.report {
            ComponentReport::Classified {
                features,
                classification,
                tags,
            } => (
                Some(classification.confidence),
                classification.overridden,
                tags.clone(),
                Some(features.clone()),
                None,
            ),
            ComponentReport::Unclassifiable { reason } => {
                (None, false, Vec::new(), None, Some(reason.clone()))
            }
        };

        Self {
            id: cc.component.id,
            label: cc.report.label_str().to_string(),
            confidence,
            overridden,
            vertex_count: cc.component.vertex_count(),
            face_count: cc.component.face_count(),
            volume: cc.component.volume(),
            tags,
            features,
            unclassifiable_reason: reason,
        }
    }
}

/// Decompose a mesh with the standard signature table and matcher set.
///
/// # Errors
///
/// Only `EmptyMesh` and `InvalidParams` surface here; everything downstream
/// of separation degrades per component instead of failing the run.
pub fn decompose(mesh: &Mesh, params: &DecomposeParams) -> DecomposeResult<DecompositionResult> {
    decompose_with(
        mesh,
        params,
        &SignatureTable::standard(),
        &MatcherSet::standard(),
    )
}

/// Decompose with an explicit signature table and matcher set.
pub fn decompose_with(
    mesh: &Mesh,
    params: &DecomposeParams,
    table: &SignatureTable,
    matchers: &MatcherSet,
) -> DecomposeResult<DecompositionResult> {
    let _timer = OperationTimer::with_context("decompose", mesh.face_count(), mesh.vertex_count());
    log_mesh_stats(mesh, "decompose input");

    let input_volume = mesh.volume();
    let components = separate(mesh, &params.separate)?;
    let strategy = components[0].strategy;

    let classified: Vec<ClassifiedComponent> = components
        .into_par_iter()
        .map(|component| {
            let report = run_pipeline(&component, table, matchers, &params.classify);
            ClassifiedComponent { component, report }
        })
        .collect();

    let output_volume: f64 = classified.iter().map(|c| c.component.volume()).sum();
    let census = build_census(&classified);
    let center_distances = build_center_distances(&classified);

    info!(
        components = classified.len(),
        strategy = strategy.as_str(),
        conservation = format!("{:.3}", if input_volume > 0.0 {
            output_volume / input_volume
        } else {
            0.0
        }),
        "decomposition complete"
    );

    Ok(DecompositionResult {
        components: classified,
        strategy,
        input_volume,
        output_volume,
        census,
        center_distances,
    })
}

fn run_pipeline(
    component: &Component,
    table: &SignatureTable,
    matchers: &MatcherSet,
    params: &ClassifyParams,
) -> ComponentReport {
    let features = match features::extract(component) {
        Ok(fv) => fv,
        Err(e) => {
            warn!(
                component = component.id,
                error = %e,
                "component is unclassifiable"
            );
            return ComponentReport::Unclassifiable {
                reason: e.to_string(),
            };
        }
    };

    let classification = classify(&features, table, params);
    let tags = matchers.run(component, &classification);

    ComponentReport::Classified {
        features,
        classification,
        tags,
    }
}

fn build_census(components: &[ClassifiedComponent]) -> Vec<CensusEntry> {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for cc in components {
        *counts.entry(cc.report.label_str()).or_insert(0) += 1;
    }

    let mut census: Vec<CensusEntry> = counts
        .into_iter()
        .map(|(label, count)| CensusEntry {
            label: label.to_string(),
            count,
        })
        .collect();
    census.sort_by(|a, b| a.label.cmp(&b.label));
    census
}

fn build_center_distances(components: &[ClassifiedComponent]) -> Vec<CenterDistance> {
    let centroids: Vec<_> = components
        .iter()
        .filter_map(|cc| cc.component.mesh.centroid().map(|c| (cc.component.id, c)))
        .collect();

    let mut distances = Vec::new();
    for i in 0..centroids.len() {
        for j in (i + 1)..centroids.len() {
            distances.push(CenterDistance {
                a: centroids[i].0,
                b: centroids[j].0,
                distance: (centroids[j].1 - centroids[i].1).norm(),
            });
        }
    }
    distances
}
