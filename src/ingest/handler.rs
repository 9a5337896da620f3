//! Per-message ingest pipeline

use std::sync::Arc;

use crate::dispatch::{BroadcastReport, Broadcaster};
use crate::error::{InferenceError, IngestError};
use crate::inference::{FrameDetector, HealthClassifier};
use crate::payload::{InboundMessage, OutboundEvent};
use crate::stats::ServerStats;

/// Handles inbound producer messages
///
/// Invoked once per message from a connection's read loop, sequentially, so
/// per-producer ordering is preserved end to end. The inference call is the
/// only slow step; it runs on the blocking pool and is awaited before the
/// next message of that stream is processed.
pub struct IngestHandler<C, D> {
    classifier: Arc<C>,
    detector: Arc<D>,
    broadcaster: Broadcaster,
    stats: Arc<ServerStats>,
}

impl<C, D> IngestHandler<C, D>
where
    C: HealthClassifier + 'static,
    D: FrameDetector + 'static,
{
    /// Create a handler over the two adapter boundaries and a broadcaster
    pub fn new(
        classifier: Arc<C>,
        detector: Arc<D>,
        broadcaster: Broadcaster,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            classifier,
            detector,
            broadcaster,
            stats,
        }
    }

    /// The broadcaster this handler publishes through
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Shared server statistics
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Handle one raw inbound text frame
    ///
    /// A malformed message is dropped with no broadcast and no registry
    /// mutation; an inference failure skips the broadcast for that message
    /// only. Either way the caller's read loop continues.
    pub async fn on_message(&self, raw: &str) -> Result<BroadcastReport, IngestError> {
        let message = InboundMessage::parse(raw).map_err(|e| {
            self.stats.record_malformed();
            IngestError::Malformed(e)
        })?;

        let event = match message {
            InboundMessage::SensorData(reading) => {
                let classifier = Arc::clone(&self.classifier);
                let classification = self
                    .run_inference(move || classifier.classify(&reading))
                    .await?;

                tracing::debug!(
                    label = %classification.label,
                    suggestions = classification.suggestions.len(),
                    "Reading classified"
                );
                OutboundEvent::health_update(
                    reading,
                    classification.label,
                    classification.suggestions,
                )
            }
            InboundMessage::ProcessFrame(frame) => {
                let image = frame.decode().map_err(|e| {
                    self.stats.record_malformed();
                    IngestError::Malformed(e)
                })?;

                let detector = Arc::clone(&self.detector);
                let detections = self
                    .run_inference(move || detector.detect(&image))
                    .await?;

                tracing::debug!(detections = detections.len(), "Frame processed");
                OutboundEvent::detection_results(detections)
            }
        };

        Ok(self.broadcaster.broadcast(&event)?)
    }

    /// Run a blocking adapter call off the async executor
    async fn run_inference<T, F>(&self, call: F) -> Result<T, IngestError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, InferenceError> + Send + 'static,
    {
        let result = tokio::task::spawn_blocking(call)
            .await
            .map_err(|e| InferenceError::new(format!("inference task failed: {e}")))
            .and_then(|r| r);

        result.map_err(|e| {
            self.stats.record_inference_failure();
            IngestError::Inference(e)
        })
    }
}
