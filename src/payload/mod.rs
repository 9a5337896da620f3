//! Wire data model
//!
//! Types for the two producer message kinds (sensor readings and camera
//! frames) and the two broadcast event kinds (health updates and detection
//! results), plus the adjustment-suggestion math applied against the healthy
//! reference baseline.
//!
//! Everything here is an immutable value: a reading is consumed once by the
//! inference adapter, a result event is serialized once and fanned out
//! unmodified to every registered client.

pub mod detection;
pub mod message;
pub mod reading;
pub mod suggest;

pub use detection::Detection;
pub use message::{FramePayload, InboundMessage, OutboundEvent};
pub use reading::SensorReading;
pub use suggest::{Baseline, Direction, Feature, Suggestion};
