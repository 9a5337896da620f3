//! Client registry implementation
//!
//! Membership reflects reality as of the last successful operation: a client
//! present in the set is believed sendable, and a failed send is the only
//! legitimate trigger for removal. The set is created empty at process start
//! and lives for the process lifetime.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::client::{ClientHandle, ClientId};

/// Thread-safe set of live client connections
///
/// Guarded by a std `RwLock` rather than an async lock: every guarded
/// section is a bounded map operation, and removal must also run from
/// `Drop` where no async context exists. Serialization, inference and
/// socket sends all happen outside the lock.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientHandle>>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a client; idempotent if the id is already present
    pub fn add(&self, handle: ClientHandle) {
        let id = handle.id();
        let count = {
            let mut clients = self.write_clients();
            clients.insert(id, handle);
            clients.len()
        };

        tracing::debug!(client = %id, clients = count, "Client registered");
    }

    /// Remove a client if present
    ///
    /// Returns whether the client was present. Removing an absent client is
    /// a no-op, which makes a failed send and a closing connection safe to
    /// race on the same id.
    pub fn remove(&self, id: ClientId) -> bool {
        let (removed, count) = {
            let mut clients = self.write_clients();
            let removed = clients.remove(&id).is_some();
            (removed, clients.len())
        };

        if removed {
            tracing::debug!(client = %id, clients = count, "Client removed");
        }
        removed
    }

    /// Point-in-time copy of the current members
    ///
    /// Safe to iterate while the live set is concurrently mutated; broadcast
    /// iteration must always go through this copy, never the live map.
    /// Member order is unspecified.
    pub fn snapshot(&self) -> Vec<ClientHandle> {
        self.read_clients().values().cloned().collect()
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        self.read_clients().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.read_clients().is_empty()
    }

    /// Whether a client is currently registered
    pub fn contains(&self, id: ClientId) -> bool {
        self.read_clients().contains_key(&id)
    }

    /// Add a client and return a guard that removes it exactly once on drop
    ///
    /// Connection lifecycles hold this guard for their whole `Open` phase so
    /// every exit path, including abrupt ones, performs the removal.
    pub fn register(self: &Arc<Self>, handle: ClientHandle) -> Registration {
        let id = handle.id();
        self.add(handle);
        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Remove every client whose channel is closed
    ///
    /// Returns the number of clients removed. Dead clients are normally
    /// removed by a failed send; this sweep catches channels that died
    /// between broadcasts.
    pub fn prune(&self) -> usize {
        let dead: Vec<ClientId> = self
            .snapshot()
            .iter()
            .filter(|handle| handle.is_closed())
            .map(|handle| handle.id())
            .collect();

        let mut removed = 0;
        for id in dead {
            if self.remove(id) {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Pruned dead clients");
        }
        removed
    }

    /// Spawn a background task that prunes dead clients on an interval
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_prune_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.prune();
            }
        })
    }

    fn read_clients(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ClientId, ClientHandle>> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_clients(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ClientId, ClientHandle>> {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped registry membership
///
/// Dropping the guard removes the client. Because removal is idempotent, a
/// dispatcher-triggered removal racing the guard is harmless.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<ClientRegistry>,
    id: ClientId,
}

impl Registration {
    /// Id of the registered client
    pub fn id(&self) -> ClientId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: u64) -> ClientHandle {
        ClientHandle::channel(ClientId::new(id), 4).0
    }

    #[test]
    fn test_add_remove_snapshot() {
        let registry = ClientRegistry::new();

        registry.add(handle(1));
        registry.add(handle(2));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(ClientId::new(1)));
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), ClientId::new(2));
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = ClientRegistry::new();

        registry.add(handle(1));
        registry.add(handle(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = ClientRegistry::new();
        registry.add(handle(1));

        assert!(registry.remove(ClientId::new(1)));
        assert!(!registry.remove(ClientId::new(1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_unaffected_by_later_mutation() {
        let registry = ClientRegistry::new();
        registry.add(handle(1));
        registry.add(handle(2));

        let snapshot = registry.snapshot();
        registry.remove(ClientId::new(1));
        registry.add(handle(3));

        let ids: Vec<u64> = snapshot.iter().map(|h| h.id().get()).collect();
        assert_eq!(snapshot.len(), 2);
        assert!(ids.contains(&1) && ids.contains(&2));
    }

    #[test]
    fn test_concurrent_mutation_and_snapshot() {
        let registry = Arc::new(ClientRegistry::new());
        let mut threads = Vec::new();

        for base in 0..4u64 {
            let registry = Arc::clone(&registry);
            threads.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let id = base * 100 + i;
                    registry.add(handle(id));
                    // Snapshots must always be a complete-at-some-instant view
                    let snapshot = registry.snapshot();
                    assert!(snapshot.iter().any(|h| h.id() == ClientId::new(id)));
                    registry.remove(ClientId::new(id));
                }
            }));
        }

        for t in threads {
            t.join().unwrap();
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_double_remove() {
        let registry = Arc::new(ClientRegistry::new());
        registry.add(handle(1));

        let a = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.remove(ClientId::new(1)))
        };
        let b = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.remove(ClientId::new(1)))
        };

        let (ra, rb) = (a.join().unwrap(), b.join().unwrap());
        // Exactly one of the two removals wins; neither faults
        assert!(ra ^ rb);
        assert!(!registry.contains(ClientId::new(1)));
    }

    #[test]
    fn test_registration_guard_removes_on_drop() {
        let registry = Arc::new(ClientRegistry::new());

        {
            let registration = registry.register(handle(1));
            assert_eq!(registration.id(), ClientId::new(1));
            assert!(registry.contains(ClientId::new(1)));
        }
        assert!(!registry.contains(ClientId::new(1)));
    }

    #[test]
    fn test_registration_guard_after_dispatcher_removal() {
        let registry = Arc::new(ClientRegistry::new());

        let registration = registry.register(handle(1));
        // Dispatcher removed the client first (failed send path)
        registry.remove(ClientId::new(1));
        drop(registration);

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_closed_channels() {
        let registry = ClientRegistry::new();

        let (alive, _rx) = ClientHandle::channel(ClientId::new(1), 4);
        let (dead, dead_rx) = ClientHandle::channel(ClientId::new(2), 4);
        registry.add(alive);
        registry.add(dead);

        drop(dead_rx);
        assert_eq!(registry.prune(), 1);
        assert!(registry.contains(ClientId::new(1)));
        assert!(!registry.contains(ClientId::new(2)));
    }
}
