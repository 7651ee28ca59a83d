//! Shape signatures: per-primitive feature intervals with weights.
//!
//! A signature is pure data. The table is built once and passed explicitly
//! through the classification pipeline; there is no global registry, so two
//! decompositions with different tables can run side by side.

use serde::Serialize;

use crate::features::Feature;

/// The primitive shapes the classifier can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeClass {
    Cylinder,
    Box,
    Sphere,
    HollowBox,
    Cone,
    /// No primitive fits; the catch-all label.
    Complex,
}

impl ShapeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeClass::Cylinder => "cylinder",
            ShapeClass::Box => "box",
            ShapeClass::Sphere => "sphere",
            ShapeClass::HollowBox => "hollow_box",
            ShapeClass::Cone => "cone",
            ShapeClass::Complex => "complex",
        }
    }
}

impl std::fmt::Display for ShapeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A closed accepted interval for one feature, with its scoring weight.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRange {
    pub feature: Feature,
    pub min: f64,
    pub max: f64,
    /// Confidence points this feature contributes when in range; the same
    /// amount is forfeited (linearly) as the value drifts out of range.
    pub weight: f64,
}

impl FeatureRange {
    pub fn new(feature: Feature, min: f64, max: f64, weight: f64) -> Self {
        debug_assert!(min <= max);
        Self {
            feature,
            min,
            max,
            weight,
        }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Distance from `value` to the interval; 0 inside.
    pub fn distance_to(&self, value: f64) -> f64 {
        if value < self.min {
            self.min - value
        } else if value > self.max {
            value - self.max
        } else {
            0.0
        }
    }
}

/// One primitive's accepted feature intervals.
#[derive(Debug, Clone, Serialize)]
pub struct ShapeSignature {
    pub shape: ShapeClass,
    pub ranges: Vec<FeatureRange>,
}

impl ShapeSignature {
    /// Sum of all interval widths. A smaller total means a more specific
    /// signature; used to break confidence ties.
    pub fn total_width(&self) -> f64 {
        self.ranges.iter().map(|r| r.width()).sum()
    }
}

/// An immutable collection of shape signatures.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureTable {
    signatures: Vec<ShapeSignature>,
}

impl SignatureTable {
    /// Build a table from explicit signatures.
    pub fn new(signatures: Vec<ShapeSignature>) -> Self {
        Self { signatures }
    }

    pub fn signatures(&self) -> &[ShapeSignature] {
        &self.signatures
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// The built-in table covering the five recognized primitives.
    ///
    /// Intervals are tuned for mechanical parts in millimeter units; the
    /// dimensionless ratios carry most of the weight so the table degrades
    /// gracefully at other scales.
    pub fn standard() -> Self {
        use Feature::*;

        Self::new(vec![
            ShapeSignature {
                shape: ShapeClass::Cylinder,
                ranges: vec![
                    FeatureRange::new(BboxFillRatio, 0.70, 0.85, 35.0),
                    FeatureRange::new(PcaRatio, 0.8, 1.2, 30.0),
                    FeatureRange::new(Elongation, 1.5, 50.0, 15.0),
                    FeatureRange::new(Isotropy, 0.001, 0.6, 10.0),
                    FeatureRange::new(VolumeToSurface, 0.1, 50.0, 10.0),
                ],
            },
            ShapeSignature {
                shape: ShapeClass::Box,
                ranges: vec![
                    FeatureRange::new(BboxFillRatio, 0.85, 1.05, 35.0),
                    FeatureRange::new(PcaRatio, 0.9, 20.0, 30.0),
                    FeatureRange::new(Elongation, 0.9, 20.0, 15.0),
                    FeatureRange::new(Isotropy, 0.05, 1.0, 10.0),
                    FeatureRange::new(VolumeToSurface, 0.1, 100.0, 10.0),
                ],
            },
            ShapeSignature {
                shape: ShapeClass::Sphere,
                ranges: vec![
                    FeatureRange::new(BboxFillRatio, 0.48, 0.56, 35.0),
                    FeatureRange::new(PcaRatio, 0.8, 1.2, 30.0),
                    FeatureRange::new(Elongation, 0.9, 1.2, 15.0),
                    FeatureRange::new(Isotropy, 0.8, 1.0, 10.0),
                    FeatureRange::new(VolumeToSurface, 0.05, 100.0, 10.0),
                ],
            },
            ShapeSignature {
                shape: ShapeClass::HollowBox,
                ranges: vec![
                    FeatureRange::new(BboxFillRatio, 0.15, 0.50, 35.0),
                    FeatureRange::new(PcaRatio, 0.9, 30.0, 30.0),
                    FeatureRange::new(Elongation, 0.9, 30.0, 15.0),
                    FeatureRange::new(Isotropy, 0.02, 1.0, 10.0),
                    FeatureRange::new(VolumeToSurface, 0.05, 20.0, 10.0),
                ],
            },
            ShapeSignature {
                shape: ShapeClass::Cone,
                ranges: vec![
                    FeatureRange::new(BboxFillRatio, 0.15, 0.30, 35.0),
                    FeatureRange::new(PcaRatio, 0.8, 1.2, 30.0),
                    FeatureRange::new(Elongation, 1.5, 50.0, 15.0),
                    FeatureRange::new(Isotropy, 0.001, 0.6, 10.0),
                    FeatureRange::new(VolumeToSurface, 0.05, 50.0, 10.0),
                ],
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_distance() {
        let r = FeatureRange::new(Feature::BboxFillRatio, 0.5, 1.0, 35.0);
        assert_eq!(r.distance_to(0.75), 0.0);
        assert!((r.distance_to(0.4) - 0.1).abs() < 1e-12);
        assert!((r.distance_to(1.2) - 0.2).abs() < 1e-12);
        assert!(r.contains(0.5));
        assert!(r.contains(1.0));
        assert!(!r.contains(1.0000001));
    }

    #[test]
    fn test_standard_table_weights_sum_to_100() {
        for sig in SignatureTable::standard().signatures() {
            let total: f64 = sig.ranges.iter().map(|r| r.weight).sum();
            assert!(
                (total - 100.0).abs() < 1e-9,
                "{} weights sum to {}",
                sig.shape,
                total
            );
        }
    }

    #[test]
    fn test_standard_table_covers_every_feature_once() {
        for sig in SignatureTable::standard().signatures() {
            assert_eq!(sig.ranges.len(), Feature::ALL.len());
            for feature in Feature::ALL {
                assert_eq!(
                    sig.ranges.iter().filter(|r| r.feature == feature).count(),
                    1,
                    "{} missing {}",
                    sig.shape,
                    feature
                );
            }
        }
    }

    #[test]
    fn test_specificity_ordering() {
        let table = SignatureTable::standard();
        let cylinder = &table.signatures()[0];
        let boxy = &table.signatures()[1];
        assert!(cylinder.total_width() < boxy.total_width());
    }
}
