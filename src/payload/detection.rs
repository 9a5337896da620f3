//! Object detection payload

use serde::{Deserialize, Serialize};

/// One detected object in a camera frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box as `[x1, y1, x2, y2]` pixel coordinates
    #[serde(rename = "box")]
    pub bbox: [f64; 4],

    /// Detected class label
    pub label: String,

    /// Detection confidence in `0.0..=1.0`
    pub confidence: f64,
}

impl Detection {
    /// Create a new detection
    pub fn new(bbox: [f64; 4], label: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }
}
