//! Inbound and outbound wire messages
//!
//! One JSON object per text frame, tagged by `event`:
//!
//! ```json
//! {"event":"sensor_data","data":{"Soil_Moisture":30,"Soil_Temperature":20,"Humidity":50}}
//! {"event":"process_frame","data":"data:image/jpeg;base64,/9j/4AAQ..."}
//! {"event":"health_update","data":{"live_data":{...},"plant_health_status":"Healthy","improvement_suggestions":[]}}
//! {"event":"detection_results","data":{"detections":[...]}}
//! ```

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::MalformedInput;

use super::detection::Detection;
use super::reading::SensorReading;
use super::suggest::Suggestion;

/// A camera frame transported as a base64 data URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FramePayload(String);

impl FramePayload {
    /// Wrap an already-encoded data URL
    pub fn new(data_url: impl Into<String>) -> Self {
        Self(data_url.into())
    }

    /// Encode raw image bytes into a data URL payload
    pub fn encode(mime: &str, image: &[u8]) -> Self {
        let encoded = general_purpose::STANDARD.encode(image);
        Self(format!("data:{mime};base64,{encoded}"))
    }

    /// Decode the payload into raw image bytes
    ///
    /// The payload must look like `data:<mime>;base64,<encoded>`; the header
    /// before the first comma is discarded.
    pub fn decode(&self) -> Result<Bytes, MalformedInput> {
        let (header, encoded) = self
            .0
            .split_once(',')
            .ok_or(MalformedInput::NotADataUrl)?;
        if !header.starts_with("data:") {
            return Err(MalformedInput::NotADataUrl);
        }

        let decoded = general_purpose::STANDARD.decode(encoded.trim())?;
        Ok(Bytes::from(decoded))
    }
}

/// A message received from the producer device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Structured sensor reading
    SensorData(SensorReading),
    /// Encoded camera frame
    ProcessFrame(FramePayload),
}

impl InboundMessage {
    /// Parse one inbound text frame
    pub fn parse(raw: &str) -> Result<Self, MalformedInput> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Health classification result, echoing the input reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthUpdate {
    /// Echo of the reading that produced this result
    pub live_data: SensorReading,
    /// Classification label ("Healthy", "Moderate Stress", ...)
    pub plant_health_status: String,
    /// Adjustments toward the healthy baseline; empty when healthy
    pub improvement_suggestions: Vec<Suggestion>,
}

/// Detection result for one camera frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResults {
    /// Detected objects, possibly empty
    pub detections: Vec<Detection>,
}

/// An event broadcast to every connected viewer
///
/// Produced once per ingest event and fanned out unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Classification result for a sensor reading
    HealthUpdate(HealthUpdate),
    /// Detections for a camera frame
    DetectionResults(DetectionResults),
}

impl OutboundEvent {
    /// Create a health update event
    pub fn health_update(
        live_data: SensorReading,
        status: impl Into<String>,
        suggestions: Vec<Suggestion>,
    ) -> Self {
        Self::HealthUpdate(HealthUpdate {
            live_data,
            plant_health_status: status.into(),
            improvement_suggestions: suggestions,
        })
    }

    /// Create a detection results event
    pub fn detection_results(detections: Vec<Detection>) -> Self {
        Self::DetectionResults(DetectionResults { detections })
    }

    /// Serialize into a newline-terminated text frame
    ///
    /// Serialized once per broadcast; the returned `Bytes` is cheap to clone
    /// so every client queue shares the same allocation.
    pub fn to_frame(&self) -> Result<Bytes, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    }
}
