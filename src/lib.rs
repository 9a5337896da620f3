//! # leafcast-rs
//!
//! Realtime plant telemetry broadcast server library.
//!
//! A producer device (e.g. a soil sensor node or a camera feed) pushes
//! readings or frames over a persistent connection; the server runs an
//! injected inference adapter (health classification or object detection)
//! and fans the result out to every currently connected viewer, best-effort.
//!
//! ```text
//! producer ──► Session ──► IngestHandler ──► adapter (classify/detect)
//!                                               │
//!                                               ▼
//!                                          Broadcaster
//!                                               │ snapshot()
//!                                        ClientRegistry
//!                                       ┌───────┼───────┐
//!                                       ▼       ▼       ▼
//!                                   viewer   viewer   viewer
//! ```
//!
//! The registry/dispatcher core never iterates its live membership: a
//! broadcast walks a point-in-time snapshot, per-client failures are
//! isolated, and dead clients are pruned after the delivery loop. One slow
//! or dead viewer can never stall the others.
//!
//! # Example
//!
//! ```no_run
//! use leafcast_rs::inference::BaselineClassifier;
//! use leafcast_rs::payload::Baseline;
//! use leafcast_rs::server::{Server, ServerConfig};
//! # struct NoDetector;
//! # impl leafcast_rs::inference::FrameDetector for NoDetector {
//! #     fn detect(&self, _: &[u8]) -> Result<Vec<leafcast_rs::payload::Detection>, leafcast_rs::error::InferenceError> {
//! #         Ok(Vec::new())
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> leafcast_rs::error::Result<()> {
//!     let classifier = BaselineClassifier::new(Baseline::new(45.0, 23.0, 78.0));
//!     let server = Server::new(ServerConfig::default(), classifier, NoDetector);
//!     server.run().await
//! }
//! ```

pub mod dispatch;
pub mod error;
pub mod inference;
pub mod ingest;
pub mod payload;
pub mod registry;
pub mod server;
pub mod stats;

pub use dispatch::{BroadcastReport, Broadcaster};
pub use error::{DeliveryError, Error, InferenceError, IngestError, MalformedInput, Result};
pub use inference::{BaselineClassifier, Classification, FrameDetector, HealthClassifier};
pub use ingest::IngestHandler;
pub use payload::{
    Baseline, Detection, Direction, Feature, InboundMessage, OutboundEvent, SensorReading,
    Suggestion,
};
pub use registry::{ClientHandle, ClientId, ClientRegistry, Registration};
pub use server::{Server, ServerConfig};
pub use stats::{ServerStats, StatsSnapshot};
