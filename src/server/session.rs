//! Per-connection lifecycle
//!
//! Each accepted connection runs one `Session` task: register in the client
//! registry, spawn a writer task draining the client's send queue, then read
//! newline-delimited JSON frames and feed them to the ingest handler.
//!
//! The lifecycle is `Connecting -> Open -> Closed`. Registration is held as
//! an RAII guard for the whole `Open` phase, so every exit path (peer close,
//! read error, writer failure) performs exactly one registry removal. A
//! dispatcher-triggered removal racing the guard is a no-op.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;

use crate::error::{IngestError, MalformedInput, Result};
use crate::inference::{FrameDetector, HealthClassifier};
use crate::ingest::IngestHandler;
use crate::registry::{ClientHandle, ClientId, ClientRegistry};

use super::config::ServerConfig;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accepted, not yet registered
    Connecting,
    /// Registered and serving; the only phase that broadcasts reach
    Open,
    /// Terminal; no reopening
    Closed,
}

/// Per-session lifecycle state
#[derive(Debug)]
pub struct SessionState {
    /// Session id, doubles as the registry client id
    pub id: ClientId,
    /// Current phase
    pub phase: SessionPhase,
    /// When the connection was accepted
    pub connected_at: Instant,
    /// Inbound messages handled on this session
    pub messages_in: u64,
}

impl SessionState {
    /// Create state for a newly accepted connection
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            phase: SessionPhase::Connecting,
            connected_at: Instant::now(),
            messages_in: 0,
        }
    }

    /// Transition `Connecting -> Open` on registration
    pub fn open(&mut self) {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Open;
        }
    }

    /// Transition to the terminal `Closed` phase
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    /// Whether the session is serving
    pub fn is_open(&self) -> bool {
        self.phase == SessionPhase::Open
    }

    /// Session duration so far
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

/// One client connection's serving task
pub struct Session<C, D> {
    state: SessionState,
    peer: String,
    handler: Arc<IngestHandler<C, D>>,
    registry: Arc<ClientRegistry>,
    config: ServerConfig,
}

impl<C, D> Session<C, D>
where
    C: HealthClassifier + 'static,
    D: FrameDetector + 'static,
{
    /// Create a session for an accepted connection
    pub fn new(
        id: ClientId,
        peer: impl Into<String>,
        handler: Arc<IngestHandler<C, D>>,
        registry: Arc<ClientRegistry>,
        config: ServerConfig,
    ) -> Self {
        Self {
            state: SessionState::new(id),
            peer: peer.into(),
            handler,
            registry,
            config,
        }
    }

    /// Serve the connection until the peer disconnects or the transport
    /// fails
    ///
    /// Generic over the transport so tests can drive it with an in-memory
    /// duplex stream.
    pub async fn run<S>(mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);

        let (handle, rx) = ClientHandle::channel(self.state.id, self.config.client_queue_capacity);
        let registration = self.registry.register(handle);
        self.state.open();
        self.handler.stats().client_connected();
        tracing::info!(
            session_id = %self.state.id,
            peer = %self.peer,
            clients = self.registry.len(),
            "Client connected"
        );

        let writer = tokio::spawn(write_loop(write_half, rx, self.state.id));

        let result = self.read_loop(read_half).await;

        // Teardown: dropping the guard is the single removal point
        drop(registration);
        self.state.close();
        self.handler.stats().client_disconnected();

        if let Err(e) = writer.await {
            tracing::error!(session_id = %self.state.id, error = ?e, "Writer task panicked");
        }

        match &result {
            Ok(()) => tracing::info!(
                session_id = %self.state.id,
                messages = self.state.messages_in,
                duration_ms = self.state.duration().as_millis() as u64,
                clients = self.registry.len(),
                "Client disconnected"
            ),
            Err(e) => tracing::info!(
                session_id = %self.state.id,
                error = %e,
                "Client connection errored"
            ),
        }
        result
    }

    async fn read_loop<R>(&mut self, read_half: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(read_half);
        let mut line = Vec::new();
        // One byte past the limit distinguishes "exactly at the limit" from
        // "over it" without buffering the excess.
        let read_cap = self.config.max_frame_size as u64 + 1;

        loop {
            line.clear();
            let n = (&mut reader)
                .take(read_cap)
                .read_until(b'\n', &mut line)
                .await?;
            if n == 0 {
                // Peer closed the connection
                return Ok(());
            }

            // The cap fired mid-frame: the peer is streaming past the limit
            // without a newline. Drop everything up to the next frame start
            // so the oversized remainder is never buffered.
            if line.last() != Some(&b'\n') && n as u64 == read_cap {
                let err = MalformedInput::FrameTooLarge {
                    size: n,
                    limit: self.config.max_frame_size,
                };
                self.handler.stats().record_malformed();
                tracing::warn!(session_id = %self.state.id, error = %err, "Frame dropped");
                discard_to_newline(&mut reader).await?;
                continue;
            }

            let raw = match std::str::from_utf8(&line) {
                Ok(s) => s.trim(),
                Err(_) => {
                    self.handler.stats().record_malformed();
                    tracing::warn!(session_id = %self.state.id, "Frame dropped: not utf-8");
                    continue;
                }
            };
            if raw.is_empty() {
                continue;
            }
            self.state.messages_in += 1;

            // Message-scoped failures never end the session
            match self.handler.on_message(raw).await {
                Ok(report) => tracing::trace!(
                    session_id = %self.state.id,
                    delivered = report.delivered,
                    "Message handled"
                ),
                Err(e @ IngestError::Malformed(_)) => {
                    tracing::warn!(session_id = %self.state.id, error = %e, "Message dropped");
                }
                Err(e) => {
                    tracing::error!(session_id = %self.state.id, error = %e, "Message handling failed");
                }
            }
        }
    }
}

/// Skip input up to and including the next newline without retaining it
///
/// Consumes the reader's internal buffer chunk by chunk, so discarding an
/// arbitrarily long oversized frame uses constant memory.
async fn discard_to_newline<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            // EOF; the next read reports the close
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

/// Drain one client's send queue into its socket
///
/// Exits when the queue closes (client removed from the registry) or a write
/// fails. A write failure drops the receiver, which closes the queue and
/// makes the next broadcast prune this client.
async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<Bytes>, id: ClientId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            tracing::debug!(session_id = %id, error = %e, "Write failed, stopping writer");
            return;
        }
    }

    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Broadcaster;
    use crate::inference::baseline::BaselineClassifier;
    use crate::inference::FrameDetector;
    use crate::error::InferenceError;
    use crate::payload::{Baseline, Detection};
    use crate::stats::ServerStats;
    use std::time::Duration;

    struct NoDetector;

    impl FrameDetector for NoDetector {
        fn detect(&self, _: &[u8]) -> std::result::Result<Vec<Detection>, InferenceError> {
            Ok(Vec::new())
        }
    }

    type TestHandler = IngestHandler<BaselineClassifier, NoDetector>;

    fn test_handler() -> (Arc<TestHandler>, Arc<ClientRegistry>) {
        let registry = Arc::new(ClientRegistry::new());
        let stats = Arc::new(ServerStats::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&stats));
        let classifier = BaselineClassifier::new(Baseline::new(45.0, 23.0, 78.0))
            .with_class("High Stress", Baseline::new(15.0, 32.0, 35.0));
        let handler = Arc::new(IngestHandler::new(
            Arc::new(classifier),
            Arc::new(NoDetector),
            broadcaster,
            stats,
        ));
        (handler, registry)
    }

    fn spawn_session(
        id: u64,
        handler: &Arc<TestHandler>,
        registry: &Arc<ClientRegistry>,
    ) -> (tokio::io::DuplexStream, tokio::task::JoinHandle<Result<()>>) {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let session = Session::new(
            ClientId::new(id),
            format!("test-peer-{id}"),
            Arc::clone(handler),
            Arc::clone(registry),
            ServerConfig::default(),
        );
        (client_end, tokio::spawn(session.run(server_end)))
    }

    async fn wait_for_clients(registry: &ClientRegistry, n: usize) {
        for _ in 0..100 {
            if registry.len() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("registry never reached {n} clients");
    }

    #[test]
    fn test_session_phase_transitions() {
        let mut state = SessionState::new(ClientId::new(1));
        assert_eq!(state.phase, SessionPhase::Connecting);

        state.open();
        assert!(state.is_open());

        state.close();
        assert_eq!(state.phase, SessionPhase::Closed);

        // Closed is terminal
        state.open();
        assert_eq!(state.phase, SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_producer_reading_fans_out_to_viewer() {
        let (handler, registry) = test_handler();

        let (producer_end, _producer_task) = spawn_session(1, &handler, &registry);
        let (viewer_end, _viewer_task) = spawn_session(2, &handler, &registry);
        wait_for_clients(&registry, 2).await;

        let (producer_read, mut producer_write) = tokio::io::split(producer_end);
        let (viewer_read, _viewer_write) = tokio::io::split(viewer_end);

        producer_write
            .write_all(
                b"{\"event\":\"sensor_data\",\"data\":{\"Soil_Moisture\":16,\"Soil_Temperature\":31,\"Humidity\":36}}\n",
            )
            .await
            .unwrap();

        // Both connections receive the broadcast, producer included
        for read_half in [viewer_read, producer_read] {
            let mut lines = BufReader::new(read_half).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let json: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert_eq!(json["event"], "health_update");
            assert_eq!(json["data"]["plant_health_status"], "High Stress");
            assert_eq!(json["data"]["live_data"]["Soil_Moisture"], 16.0);
        }
    }

    #[tokio::test]
    async fn test_peer_close_removes_client() {
        let (handler, registry) = test_handler();

        let (client_end, task) = spawn_session(1, &handler, &registry);
        wait_for_clients(&registry, 1).await;
        assert!(registry.contains(ClientId::new(1)));

        drop(client_end);
        task.await.unwrap().unwrap();

        assert!(registry.snapshot().is_empty());
        assert_eq!(handler.stats().clients_connected(), 0);
    }

    /// Transport whose reads fail immediately; writes are swallowed
    struct BrokenStream;

    impl tokio::io::AsyncRead for BrokenStream {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
            _: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer reset",
            )))
        }
    }

    impl tokio::io::AsyncWrite for BrokenStream {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_error_still_removes_client() {
        let (handler, registry) = test_handler();

        let session = Session::new(
            ClientId::new(1),
            "test-peer",
            Arc::clone(&handler),
            Arc::clone(&registry),
            ServerConfig::default(),
        );

        let result = session.run(BrokenStream).await;
        assert!(result.is_err());

        // The error exit path still performed the removal
        assert!(registry.snapshot().is_empty());
        assert_eq!(handler.stats().clients_connected(), 0);
    }

    #[tokio::test]
    async fn test_malformed_message_does_not_end_session() {
        let (handler, registry) = test_handler();

        let (client_end, _task) = spawn_session(1, &handler, &registry);
        wait_for_clients(&registry, 1).await;

        let (read_half, mut write_half) = tokio::io::split(client_end);
        write_half.write_all(b"this is not json\n").await.unwrap();
        write_half
            .write_all(
                b"{\"event\":\"sensor_data\",\"data\":{\"Soil_Moisture\":44,\"Soil_Temperature\":23,\"Humidity\":77}}\n",
            )
            .await
            .unwrap();

        // Only the valid message produced a broadcast; session still alive
        let mut lines = BufReader::new(read_half).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["data"]["plant_health_status"], "Healthy");
        assert_eq!(json["data"]["improvement_suggestions"], serde_json::json!([]));

        assert!(registry.contains(ClientId::new(1)));
        assert_eq!(handler.stats().snapshot().malformed_messages, 1);
    }

    #[tokio::test]
    async fn test_oversized_frame_dropped_session_continues() {
        let (handler, registry) = test_handler();

        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let session = Session::new(
            ClientId::new(1),
            "test-peer",
            Arc::clone(&handler),
            Arc::clone(&registry),
            ServerConfig::default().max_frame_size(128),
        );
        let _task = tokio::spawn(session.run(server_end));
        wait_for_clients(&registry, 1).await;

        let (read_half, mut write_half) = tokio::io::split(client_end);
        let oversized = format!("{}\n", "x".repeat(256));
        write_half.write_all(oversized.as_bytes()).await.unwrap();
        write_half
            .write_all(
                b"{\"event\":\"sensor_data\",\"data\":{\"Soil_Moisture\":44,\"Soil_Temperature\":23,\"Humidity\":77}}\n",
            )
            .await
            .unwrap();

        let mut lines = BufReader::new(read_half).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert!(line.contains("health_update"));
        assert_eq!(handler.stats().snapshot().malformed_messages, 1);
        assert!(registry.contains(ClientId::new(1)));
    }

    #[tokio::test]
    async fn test_frame_limit_fires_before_newline_arrives() {
        let (handler, registry) = test_handler();

        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let session = Session::new(
            ClientId::new(1),
            "test-peer",
            Arc::clone(&handler),
            Arc::clone(&registry),
            ServerConfig::default().max_frame_size(128),
        );
        let _task = tokio::spawn(session.run(server_end));
        wait_for_clients(&registry, 1).await;

        let (read_half, mut write_half) = tokio::io::split(client_end);

        // Stream well past the limit without ever sending a newline. The
        // frame must be rejected during accumulation, not after termination.
        write_half.write_all(&[b'x'; 4096]).await.unwrap();
        for _ in 0..100 {
            if handler.stats().snapshot().malformed_messages == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(handler.stats().snapshot().malformed_messages, 1);

        // Terminating the oversized frame resynchronizes the stream
        write_half.write_all(b"\n").await.unwrap();
        write_half
            .write_all(
                b"{\"event\":\"sensor_data\",\"data\":{\"Soil_Moisture\":44,\"Soil_Temperature\":23,\"Humidity\":77}}\n",
            )
            .await
            .unwrap();

        let mut lines = BufReader::new(read_half).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert!(line.contains("health_update"));
        assert_eq!(handler.stats().snapshot().malformed_messages, 1);
        assert!(registry.contains(ClientId::new(1)));
    }
}
