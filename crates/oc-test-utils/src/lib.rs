//! Test harness for Operations Controller integration tests.
//!
//! Spawns a real server (in-memory tenant store, random port) and provides a
//! WebSocket test client that speaks the production event catalog.
//!
//! # Example
//!
//! ```rust,ignore
//! let server = TestServer::spawn().await?;
//! let mut admin = WsClient::connect(&server.ws_url()).await?;
//! admin.send(&ClientEvent::LoginAdmin { .. }).await?;
//! let event = admin.recv().await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use common::secret::SecretString;
use common::types::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use ops_controller::actors::{CoordinatorActor, CoordinatorHandle, CoordinatorSettings};
use ops_controller::protocol::{ClientEvent, ServerEvent};
use ops_controller::server::{build_router, AppState};
use ops_controller::store::{MemoryStore, TenantStore};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// Provisioning key every test server is configured with.
pub const TEST_PROVISIONING_KEY: &str = "test-master-key";

/// How long a test client waits for an expected event.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a test client waits when asserting silence.
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// A running Operations Controller instance for tests.
pub struct TestServer {
    addr: SocketAddr,
    /// Direct coordinator access for state inspection.
    pub coordinator: CoordinatorHandle,
    /// The store backing the server, for direct assertions.
    pub store: Arc<MemoryStore>,
    _task: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a server on a random port over a fresh in-memory store.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let store = Arc::new(MemoryStore::new());

        let settings = CoordinatorSettings {
            provisioning_key: SecretString::from(TEST_PROVISIONING_KEY),
            // minimum cost keeps credential tests fast
            bcrypt_cost: 4,
            default_channels: vec!["CHANNEL 1".to_string(), "LOGISTICS".to_string()],
        };
        let tenant_store: Arc<dyn TenantStore> = store.clone();
        let (coordinator, _actor_task) =
            CoordinatorActor::spawn(tenant_store, settings, CancellationToken::new());

        let app = build_router(AppState {
            coordinator: coordinator.clone(),
            outbound_buffer: 64,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind test listener")?;
        let addr = listener.local_addr().context("local addr")?;
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "test server exited");
            }
        });

        Ok(Self {
            addr,
            coordinator,
            store,
            _task: task,
        })
    }

    /// WebSocket endpoint URL.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// WebSocket test client speaking the production event catalog.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Connection id announced by the server's `ready` event.
    pub connection_id: ConnectionId,
}

impl WsClient {
    /// Connect and consume the initial `ready` event.
    pub async fn connect(ws_url: &str) -> Result<Self, anyhow::Error> {
        let (stream, _response) = connect_async(ws_url).await.context("ws connect")?;
        let mut client = Self {
            stream,
            connection_id: ConnectionId::new(),
        };

        match client.recv().await? {
            ServerEvent::Ready { connection_id } => {
                client.connection_id = connection_id;
                Ok(client)
            }
            other => Err(anyhow!("expected ready event, got {other:?}")),
        }
    }

    /// Send one client event.
    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), anyhow::Error> {
        let text = serde_json::to_string(event).context("encode client event")?;
        self.stream
            .send(Message::Text(text))
            .await
            .context("ws send")
    }

    /// Send a raw text frame (for malformed-input tests).
    pub async fn send_raw(&mut self, text: &str) -> Result<(), anyhow::Error> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .context("ws send raw")
    }

    /// Receive the next server event, skipping non-text frames.
    pub async fn recv(&mut self) -> Result<ServerEvent, anyhow::Error> {
        tokio::time::timeout(RECV_TIMEOUT, self.next_event())
            .await
            .context("timed out waiting for a server event")?
    }

    /// Assert no event arrives within a short window.
    pub async fn expect_silence(&mut self) -> Result<(), anyhow::Error> {
        match tokio::time::timeout(SILENCE_WINDOW, self.next_event()).await {
            Err(_elapsed) => Ok(()),
            Ok(Ok(event)) => Err(anyhow!("expected silence, got {event:?}")),
            Ok(Err(e)) => Err(e.context("stream failed while asserting silence")),
        }
    }

    /// Close the connection (transport teardown).
    pub async fn close(mut self) -> Result<(), anyhow::Error> {
        self.stream.close(None).await.context("ws close")
    }

    async fn next_event(&mut self) -> Result<ServerEvent, anyhow::Error> {
        loop {
            let frame = self
                .stream
                .next()
                .await
                .ok_or_else(|| anyhow!("connection closed"))??;
            match frame {
                Message::Text(text) => {
                    return serde_json::from_str(&text)
                        .with_context(|| format!("decode server event: {text}"));
                }
                Message::Close(_) => return Err(anyhow!("connection closed")),
                _ => {}
            }
        }
    }
}
