//! Two-opinion shape classification.
//!
//! Every component gets two independent opinions: a fixed heuristic decision
//! tree over three features, and a weighted interval match against the
//! signature table. The signature opinion wins only when it is both strong
//! in absolute terms (strictly above the override threshold) and strictly
//! stronger than the heuristic; otherwise the heuristic stands. Both
//! opinions are always kept in the result so callers can audit the call.

use serde::Serialize;
use tracing::debug;

use crate::features::FeatureVector;
use crate::signatures::{ShapeClass, ShapeSignature, SignatureTable};

/// Classification tuning knobs.
#[derive(Debug, Clone)]
pub struct ClassifyParams {
    /// A signature match must strictly exceed this confidence (and the
    /// heuristic's) to override the heuristic label.
    pub override_confidence_threshold: f64,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            override_confidence_threshold: 75.0,
        }
    }
}

/// The heuristic decision tree's opinion.
#[derive(Debug, Clone, Serialize)]
pub struct HeuristicOpinion {
    pub label: ShapeClass,
    /// Fixed per-branch confidence, 0-100.
    pub confidence: f64,
}

/// Membership record for one feature against one signature interval.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureCheck {
    pub feature: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub in_range: bool,
    /// Confidence points deducted for this feature.
    pub penalty: f64,
}

/// The signature matcher's opinion on one shape.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub label: ShapeClass,
    /// Weighted in-range score, 0-100.
    pub confidence: f64,
    pub checks: Vec<FeatureCheck>,
}

/// Final reconciled classification of a component.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub label: ShapeClass,
    pub confidence: f64,
    pub heuristic: HeuristicOpinion,
    /// Best signature match, when the table is non-empty.
    pub signature: Option<MatchResult>,
    /// True when the signature opinion overrode the heuristic.
    pub overridden: bool,
}

/// Classify a feature vector against the signature table.
pub fn classify(
    features: &FeatureVector,
    table: &SignatureTable,
    params: &ClassifyParams,
) -> Classification {
    let heuristic = heuristic_opinion(features);
    let signature = best_match(features, table);

    let (label, confidence, overridden) = match &signature {
        Some(m)
            if m.confidence > params.override_confidence_threshold
                && m.confidence > heuristic.confidence =>
        {
            (m.label, m.confidence, true)
        }
        _ => (heuristic.label, heuristic.confidence, false),
    };

    debug!(
        label = label.as_str(),
        confidence,
        heuristic = heuristic.label.as_str(),
        overridden,
        "classified component"
    );

    Classification {
        label,
        confidence,
        heuristic,
        signature,
        overridden,
    }
}

/// Fixed decision tree over fill ratio, cross-section roundness and
/// elongation. Branch order matters: the fill intervals overlap, and the
/// earlier, more specific branches claim their region first.
fn heuristic_opinion(features: &FeatureVector) -> HeuristicOpinion {
    let fill = features.bbox_fill_ratio;
    let round = features.pca_ratio < 1.5;
    let elongated = features.elongation > 1.5;

    let (label, confidence) = if (0.85..=1.05).contains(&fill) {
        (ShapeClass::Box, 85.0)
    } else if (0.35..=0.85).contains(&fill) && round && elongated {
        (ShapeClass::Cylinder, 80.0)
    } else if (0.48..=0.56).contains(&fill) && features.isotropy > 0.8 {
        (ShapeClass::Sphere, 75.0)
    } else if (0.15..=0.30).contains(&fill) && round && features.elongation > 2.0 {
        (ShapeClass::Cone, 60.0)
    } else if (0.15..=0.50).contains(&fill) {
        (ShapeClass::HollowBox, 75.0)
    } else {
        (ShapeClass::Complex, 40.0)
    };

    HeuristicOpinion { label, confidence }
}

/// Score every signature and keep the best. Confidence ties go to the more
/// specific signature (smaller summed interval width).
fn best_match(features: &FeatureVector, table: &SignatureTable) -> Option<MatchResult> {
    let mut best: Option<(MatchResult, f64)> = None;

    for sig in table.signatures() {
        let result = score_signature(features, sig);
        let width = sig.total_width();

        let better = match &best {
            None => true,
            Some((current, current_width)) => {
                result.confidence > current.confidence
                    || (result.confidence == current.confidence && width < *current_width)
            }
        };
        if better {
            best = Some((result, width));
        }
    }

    best.map(|(m, _)| m)
}

/// Weighted interval scoring: each feature contributes its full weight when
/// inside the accepted interval, and forfeits weight linearly with the
/// normalized distance outside, capped at the full weight one interval-width
/// away.
fn score_signature(features: &FeatureVector, signature: &ShapeSignature) -> MatchResult {
    let mut confidence = 100.0;
    let mut checks = Vec::with_capacity(signature.ranges.len());

    for range in &signature.ranges {
        let value = features.get(range.feature);
        let distance = range.distance_to(value);
        let in_range = distance == 0.0;

        let penalty = if in_range {
            0.0
        } else {
            let width = range.width().max(f64::MIN_POSITIVE);
            range.weight * (distance / width).min(1.0)
        };
        confidence -= penalty;

        checks.push(FeatureCheck {
            feature: range.feature.as_str(),
            value,
            min: range.min,
            max: range.max,
            in_range,
            penalty,
        });
    }

    MatchResult {
        label: signature.shape,
        confidence: confidence.max(0.0),
        checks,
    }
}
