//! Broadcast dispatcher
//!
//! Fans one result event out to every client in a registry snapshot,
//! isolating per-client failures and pruning dead clients after the loop.

pub mod broadcaster;

pub use broadcaster::{BroadcastReport, Broadcaster};
