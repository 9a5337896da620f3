//! Adjustment suggestions against the healthy reference baseline
//!
//! A suggestion is the signed difference between an observed feature value
//! and the precomputed average for the healthy class: increase if the
//! baseline exceeds the observation, decrease otherwise, with the absolute
//! difference as magnitude.
//!
//! The core carries exact `f64` magnitudes; the two-decimal human string
//! ("Increase Soil Moisture by 15.00") is a `Display` concern so consumers
//! that want structured numbers are not stuck parsing text.

use serde::{Deserialize, Serialize};

use super::reading::SensorReading;

/// Named measurement features of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "Soil_Moisture")]
    SoilMoisture,
    #[serde(rename = "Soil_Temperature")]
    SoilTemperature,
    #[serde(rename = "Humidity")]
    Humidity,
}

impl Feature {
    /// All features, in wire order
    pub const ALL: [Feature; 3] = [
        Feature::SoilMoisture,
        Feature::SoilTemperature,
        Feature::Humidity,
    ];
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feature::SoilMoisture => write!(f, "Soil Moisture"),
            Feature::SoilTemperature => write!(f, "Soil Temperature"),
            Feature::Humidity => write!(f, "Humidity"),
        }
    }
}

/// Direction of a suggested adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Increase => write!(f, "Increase"),
            Direction::Decrease => write!(f, "Decrease"),
        }
    }
}

/// One suggested adjustment toward the healthy baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Feature to adjust
    pub feature: Feature,
    /// Which way to adjust it
    pub direction: Direction,
    /// Absolute distance to the baseline value
    pub magnitude: f64,
}

impl Suggestion {
    /// Compute the suggestion for one feature from its observed and baseline
    /// values
    pub fn between(feature: Feature, observed: f64, baseline: f64) -> Self {
        let diff = baseline - observed;
        Self {
            feature,
            direction: if diff > 0.0 {
                Direction::Increase
            } else {
                Direction::Decrease
            },
            magnitude: diff.abs(),
        }
    }
}

impl std::fmt::Display for Suggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} by {:.2}",
            self.direction, self.feature, self.magnitude
        )
    }
}

/// Precomputed average feature values for the healthy class
///
/// Loaded once at startup (the adapter's concern) and read-only afterward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    #[serde(rename = "Soil_Moisture")]
    pub soil_moisture: f64,
    #[serde(rename = "Soil_Temperature")]
    pub soil_temperature: f64,
    #[serde(rename = "Humidity")]
    pub humidity: f64,
}

impl Baseline {
    /// Create a new baseline
    pub fn new(soil_moisture: f64, soil_temperature: f64, humidity: f64) -> Self {
        Self {
            soil_moisture,
            soil_temperature,
            humidity,
        }
    }

    /// Baseline value for one feature
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::SoilMoisture => self.soil_moisture,
            Feature::SoilTemperature => self.soil_temperature,
            Feature::Humidity => self.humidity,
        }
    }

    /// Observed value for one feature of a reading
    pub fn observed(reading: &SensorReading, feature: Feature) -> f64 {
        match feature {
            Feature::SoilMoisture => reading.soil_moisture,
            Feature::SoilTemperature => reading.soil_temperature,
            Feature::Humidity => reading.humidity,
        }
    }

    /// Suggestions moving every feature of `reading` toward this baseline
    pub fn suggestions(&self, reading: &SensorReading) -> Vec<Suggestion> {
        Feature::ALL
            .iter()
            .map(|&feature| {
                Suggestion::between(feature, Self::observed(reading, feature), self.value(feature))
            })
            .collect()
    }

    /// Squared Euclidean distance from a reading to this baseline
    ///
    /// Used by the nearest-centroid reference classifier.
    pub fn distance_sq(&self, reading: &SensorReading) -> f64 {
        Feature::ALL
            .iter()
            .map(|&feature| {
                let d = Self::observed(reading, feature) - self.value(feature);
                d * d
            })
            .sum()
    }
}
