//! Telemetry server listener
//!
//! Handles the TCP accept loop and spawns one session task per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::dispatch::Broadcaster;
use crate::error::Result;
use crate::inference::{FrameDetector, HealthClassifier};
use crate::ingest::IngestHandler;
use crate::registry::{ClientId, ClientRegistry};
use crate::stats::ServerStats;

use super::config::ServerConfig;
use super::session::Session;

/// Realtime telemetry broadcast server
///
/// Accepts producer/viewer connections, classifies or detects on inbound
/// messages and fans results out to every connected client.
pub struct Server<C, D> {
    config: ServerConfig,
    handler: Arc<IngestHandler<C, D>>,
    registry: Arc<ClientRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<C, D> Server<C, D>
where
    C: HealthClassifier + 'static,
    D: FrameDetector + 'static,
{
    /// Create a server with the given configuration and inference adapters
    pub fn new(config: ServerConfig, classifier: C, detector: D) -> Self {
        let registry = Arc::new(ClientRegistry::new());
        let stats = Arc::new(ServerStats::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&stats));
        let handler = Arc::new(IngestHandler::new(
            Arc::new(classifier),
            Arc::new(detector),
            broadcaster,
            stats,
        ));

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            handler,
            registry,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the client registry
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Shared server statistics
    pub fn stats(&self) -> &Arc<ServerStats> {
        self.handler.stats()
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// Binds the configured address and blocks until the server is shut
    /// down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server on an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "Telemetry server listening");

        // Background sweep for clients that died between broadcasts
        let _prune_handle = self.registry.spawn_prune_task(self.config.prune_interval);

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Telemetry server listening");

        let prune_handle = self.registry.spawn_prune_task(self.config.prune_interval);

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        prune_handle.abort();

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit; the permit lives as long as the session
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = ClientId::new(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(session_id = %session_id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let session = Session::new(
            session_id,
            peer_addr.to_string(),
            Arc::clone(&self.handler),
            Arc::clone(&self.registry),
            self.config.clone(),
        );

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = session.run(socket).await {
                tracing::debug!(session_id = %session_id, error = %e, "Connection error");
            }

            tracing::debug!(session_id = %session_id, "Connection closed");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::inference::baseline::BaselineClassifier;
    use crate::payload::{Baseline, Detection};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    struct NoDetector;

    impl FrameDetector for NoDetector {
        fn detect(&self, _: &[u8]) -> std::result::Result<Vec<Detection>, InferenceError> {
            Ok(Vec::new())
        }
    }

    async fn start_server(
        config: ServerConfig,
    ) -> (Arc<Server<BaselineClassifier, NoDetector>>, SocketAddr) {
        let classifier = BaselineClassifier::new(Baseline::new(45.0, 23.0, 78.0))
            .with_class("High Stress", Baseline::new(15.0, 32.0, 35.0));
        let server = Arc::new(Server::new(config, classifier, NoDetector));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let serving = Arc::clone(&server);
        tokio::spawn(async move {
            let _ = serving.serve(listener).await;
        });

        (server, addr)
    }

    async fn wait_for_clients(server: &Server<BaselineClassifier, NoDetector>, n: usize) {
        for _ in 0..200 {
            if server.registry().len() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("registry never reached {n} clients");
    }

    #[tokio::test]
    async fn test_tcp_roundtrip_and_fanout() {
        let (server, addr) = start_server(ServerConfig::default()).await;

        let producer = TcpStream::connect(addr).await.unwrap();
        let viewer = TcpStream::connect(addr).await.unwrap();
        wait_for_clients(&server, 2).await;

        let (producer_read, mut producer_write) = producer.into_split();
        let (viewer_read, _viewer_write) = viewer.into_split();

        producer_write
            .write_all(
                b"{\"event\":\"sensor_data\",\"data\":{\"Soil_Moisture\":30,\"Soil_Temperature\":20,\"Humidity\":50}}\n",
            )
            .await
            .unwrap();

        for read_half in [viewer_read, producer_read] {
            let mut lines = BufReader::new(read_half).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let json: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert_eq!(json["event"], "health_update");
            assert_eq!(json["data"]["live_data"]["Humidity"], 50.0);
        }

        let snapshot = server.stats().snapshot();
        assert_eq!(snapshot.broadcasts, 1);
        assert_eq!(snapshot.deliveries, 2);
    }

    #[tokio::test]
    async fn test_disconnect_prunes_registry() {
        let (server, addr) = start_server(ServerConfig::default()).await;

        let client = TcpStream::connect(addr).await.unwrap();
        wait_for_clients(&server, 1).await;

        drop(client);
        wait_for_clients(&server, 0).await;
        assert_eq!(server.stats().clients_connected(), 0);
    }

    #[tokio::test]
    async fn test_connection_limit_rejects_excess() {
        let (server, addr) = start_server(ServerConfig::default().max_connections(1)).await;

        let first = TcpStream::connect(addr).await.unwrap();
        wait_for_clients(&server, 1).await;

        // Second connection is accepted by the OS but closed by the server
        let second = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(second).lines();
        assert!(matches!(lines.next_line().await, Ok(None) | Err(_)));
        assert_eq!(server.registry().len(), 1);

        drop(first);
        wait_for_clients(&server, 0).await;
        // Give the session task a moment to release its permit
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Capacity freed; a new connection gets in
        let _third = TcpStream::connect(addr).await.unwrap();
        wait_for_clients(&server, 1).await;
    }
}
