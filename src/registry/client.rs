//! Client identity and send-queue handle

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::DeliveryError;

/// Unique identity of one viewer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Create a client id
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cheap-to-clone handle to one client's outbound send queue
///
/// The registry owns membership; the connection's writer task owns the
/// receiving half and the socket. Liveness is implicit: a closed channel
/// means the writer task is gone and the peer is presumed dead.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    tx: mpsc::Sender<Bytes>,
}

impl ClientHandle {
    /// Wrap an existing sender
    pub fn new(id: ClientId, tx: mpsc::Sender<Bytes>) -> Self {
        Self { id, tx }
    }

    /// Create a handle together with the receiving half of its queue
    pub fn channel(id: ClientId, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { id, tx }, rx)
    }

    /// This client's id
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Queue one serialized frame for this client without blocking
    ///
    /// A full queue drops the frame for this client only; a closed queue
    /// means the client is gone and should be removed.
    pub fn try_send(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull(self.id),
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed(self.id),
        })
    }

    /// Whether the receiving half has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
