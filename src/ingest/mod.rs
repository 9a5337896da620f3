//! Ingest handling
//!
//! Turns one inbound producer message into one broadcast: parse, run the
//! inference adapter, fan the result out. Failures are message-scoped and
//! never terminate the producer's stream.

pub mod handler;

pub use handler::IngestHandler;
