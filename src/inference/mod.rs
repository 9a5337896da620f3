//! Inference adapter boundary
//!
//! The classification and detection models are external collaborators. This
//! module defines the narrow traits the ingest handler consumes, and a
//! baseline nearest-centroid classifier so demos and tests have a working
//! adapter without a trained model.
//!
//! Adapters are injected as immutable dependencies (`Arc`), never ambient
//! globals, and are treated as blocking and potentially slow: the ingest
//! handler runs them on `spawn_blocking` and awaits the result, which keeps
//! per-producer ordering intact.

pub mod baseline;

pub use baseline::BaselineClassifier;

use crate::error::InferenceError;
use crate::payload::{Detection, SensorReading, Suggestion};

/// Label the reference class carries
pub const HEALTHY_LABEL: &str = "Healthy";

/// Classification result for one sensor reading
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Predicted health label
    pub label: String,
    /// Adjustments toward the healthy baseline; empty for a healthy reading
    pub suggestions: Vec<Suggestion>,
}

impl Classification {
    /// A healthy classification carries no suggestions
    pub fn healthy() -> Self {
        Self {
            label: HEALTHY_LABEL.to_string(),
            suggestions: Vec::new(),
        }
    }

    /// Whether this classification is the healthy reference class
    pub fn is_healthy(&self) -> bool {
        self.label == HEALTHY_LABEL
    }
}

/// Health classification model boundary
///
/// `classify` may block; callers run it off the async executor.
pub trait HealthClassifier: Send + Sync {
    /// Classify one reading and derive its adjustment suggestions
    fn classify(&self, reading: &SensorReading) -> Result<Classification, InferenceError>;
}

/// Object detection model boundary
///
/// `detect` receives the decoded image bytes and may block.
pub trait FrameDetector: Send + Sync {
    /// Detect objects in one camera frame
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, InferenceError>;
}
