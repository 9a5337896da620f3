//! Nearest-centroid reference classifier
//!
//! Classifies a reading by the closest per-class feature averages. The
//! healthy class doubles as the reference baseline for suggestions.

use crate::error::InferenceError;
use crate::payload::{Baseline, SensorReading};

use super::{Classification, HealthClassifier, HEALTHY_LABEL};

/// A classifier built from per-class average feature values
///
/// Not a substitute for a trained model; it exists so the pipeline can run
/// end-to-end (demos, tests) with deterministic output.
#[derive(Debug, Clone)]
pub struct BaselineClassifier {
    /// (label, centroid) pairs; the healthy class is always present
    classes: Vec<(String, Baseline)>,
    /// Reference baseline used for suggestion math
    healthy: Baseline,
}

impl BaselineClassifier {
    /// Create a classifier knowing only the healthy class averages
    pub fn new(healthy: Baseline) -> Self {
        Self {
            classes: vec![(HEALTHY_LABEL.to_string(), healthy)],
            healthy,
        }
    }

    /// Add a non-healthy class with its average feature values
    pub fn with_class(mut self, label: impl Into<String>, centroid: Baseline) -> Self {
        self.classes.push((label.into(), centroid));
        self
    }

    /// The healthy reference baseline
    pub fn baseline(&self) -> Baseline {
        self.healthy
    }
}

impl HealthClassifier for BaselineClassifier {
    fn classify(&self, reading: &SensorReading) -> Result<Classification, InferenceError> {
        let (label, _) = self
            .classes
            .iter()
            .min_by(|(_, a), (_, b)| {
                a.distance_sq(reading)
                    .total_cmp(&b.distance_sq(reading))
            })
            .ok_or_else(|| InferenceError::new("classifier has no classes"))?;

        if label == HEALTHY_LABEL {
            Ok(Classification::healthy())
        } else {
            Ok(Classification {
                label: label.clone(),
                suggestions: self.healthy.suggestions(reading),
            })
        }
    }
}
