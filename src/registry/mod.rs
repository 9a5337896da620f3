//! Connection registry for broadcast fan-out
//!
//! The registry is the only shared mutable state in the crate: a set of live
//! client handles, mutated from every connection task and read by the
//! broadcaster.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ClientRegistry>
//!                  ┌──────────────────────────┐
//!                  │ clients: HashMap<        │
//!                  │   ClientId,              │
//!                  │   ClientHandle {         │
//!                  │     tx: mpsc::Sender,    │
//!                  │   }                      │
//!                  │ >                        │
//!                  └────────────┬─────────────┘
//!                               │ snapshot()
//!          ┌────────────────────┼────────────────────┐
//!          ▼                    ▼                    ▼
//!     [Client A]           [Client B]           [Client C]
//!     queue ─► TCP         queue ─► TCP         queue ─► TCP
//! ```
//!
//! Broadcasting never iterates the live set: it takes a `snapshot()` (a
//! point-in-time copy of the handles) and walks that, so membership can
//! change mid-broadcast without a race. Removal is idempotent, which lets a
//! failed send and a closing connection race on the same client safely.
//!
//! # Zero-Copy Design
//!
//! Handles carry `bytes::Bytes` frames into per-client queues. A broadcast
//! serializes the event once; every queue shares the same reference-counted
//! allocation.

pub mod client;
pub mod store;

pub use client::{ClientHandle, ClientId};
pub use store::{ClientRegistry, Registration};
