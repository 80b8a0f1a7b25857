//! `websocket`: a websocket client transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use linkme::distributed_slice;
use parking_lot::Mutex;
use switchyard_core::{ArgValue, ClassSpec, Component, ParamType, ParameterSpec};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request, header};
use tokio_tungstenite::tungstenite::{Error, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::component::{RELAY_TRANSPORTS, RelayTransport, TransportHandler};
use crate::error::{RelayError, RelayResult};
use crate::relay::RelayStatus;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

const OUTBOUND_BUFFER: usize = 256;

/// Connection settings for [`WebsocketTransport`].
#[derive(Debug, Clone)]
pub struct WebsocketConfig {
    pub server: String,
    /// Sent as `Authorization: Bearer <token>`.
    pub authorization: Option<String>,
    pub reconnect: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl WebsocketConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            authorization: None,
            reconnect: true,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }

    fn request(&self) -> RelayResult<Request<()>> {
        let mut request = self
            .server
            .as_str()
            .into_client_request()
            .map_err(RelayError::transport)?;
        if let Some(token) = &self.authorization {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(RelayError::transport)?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }
        Ok(request)
    }

    async fn connect(&self) -> RelayResult<WsStream> {
        let (stream, _response) = connect_async(self.request()?)
            .await
            .map_err(|e| RelayError::transport(format!("connecting to {} failed: {e}", self.server)))?;
        Ok(stream)
    }
}

/// Handles of a running connection task.
struct Connection {
    outbound: mpsc::Sender<Vec<u8>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// How a session ended.
enum SessionEnd {
    Shutdown,
    Lost,
}

/// State owned by the background connection task.
struct ClientLoop {
    config: WebsocketConfig,
    handler: Arc<dyn TransportHandler>,
    outbound: mpsc::Receiver<Vec<u8>>,
    shutdown: watch::Receiver<bool>,
    current_delay: Duration,
}

impl ClientLoop {
    async fn run(mut self, mut stream: Option<WsStream>) {
        loop {
            let ws = match stream.take() {
                Some(ws) => ws,
                None => match self.reconnect().await {
                    Some(ws) => ws,
                    None => break,
                },
            };
            self.handler.on_status(RelayStatus::Connected);
            self.current_delay = self.config.initial_delay;

            let (tx, rx) = ws.split();
            match self.session(tx, rx).await {
                SessionEnd::Shutdown => break,
                SessionEnd::Lost => {
                    self.handler.on_status(RelayStatus::Disconnected);
                    if !self.config.reconnect {
                        info!(server = %self.config.server, "Connection lost, not reconnecting");
                        break;
                    }
                }
            }
        }
    }

    /// Waits out the current delay and tries again until connected.
    /// Returns `None` on shutdown.
    async fn reconnect(&mut self) -> Option<WsStream> {
        loop {
            warn!(server = %self.config.server, delay = ?self.current_delay, "Reconnecting...");
            tokio::select! {
                _ = self.shutdown.changed() => return None,
                _ = tokio::time::sleep(self.current_delay) => {}
            }
            if *self.shutdown.borrow() {
                return None;
            }

            self.handler.on_status(RelayStatus::Initializing);
            let attempt = tokio::select! {
                _ = self.shutdown.changed() => return None,
                attempt = self.config.connect() => attempt,
            };
            match attempt {
                Ok(ws) => {
                    info!(server = %self.config.server, "Reconnected successfully");
                    return Some(ws);
                }
                Err(e) => {
                    warn!(server = %self.config.server, error = %e, "Reconnection failed");
                    self.handler.on_status(RelayStatus::Disconnected);
                    self.current_delay = std::cmp::min(
                        Duration::from_secs_f64(
                            self.current_delay.as_secs_f64() * self.config.backoff_multiplier,
                        ),
                        self.config.max_delay,
                    );
                }
            }
        }
    }

    async fn session(&mut self, mut tx: WsSink, mut rx: WsSource) -> SessionEnd {
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        if let Err(e) = tx.close().await {
                            debug!(server = %self.config.server, error = %e, "Closing connection failed");
                        }
                        return SessionEnd::Shutdown;
                    }
                }

                Some(frame) = self.outbound.recv() => {
                    let message = Message::Text(String::from_utf8_lossy(&frame).into_owned().into());
                    if let Err(e) = tx.send(message).await {
                        warn!(server = %self.config.server, error = %e, "Failed to send frame");
                        return SessionEnd::Lost;
                    }
                }

                message = rx.next() => {
                    if !self.handle_message(&mut tx, message).await {
                        return SessionEnd::Lost;
                    }
                }
            }
        }
    }

    /// Returns `false` once the connection is gone.
    async fn handle_message(
        &self,
        tx: &mut WsSink,
        message: Option<Result<Message, Error>>,
    ) -> bool {
        match message {
            Some(Ok(Message::Text(text))) => {
                trace!(len = text.len(), "Received text frame");
                self.handler.on_frame(text.as_bytes().to_vec()).await;
                true
            }
            Some(Ok(Message::Binary(data))) => {
                trace!(len = data.len(), "Received binary frame");
                self.handler.on_frame(data.to_vec()).await;
                true
            }
            Some(Ok(Message::Ping(data))) => {
                if let Err(e) = tx.send(Message::Pong(data)).await {
                    debug!(server = %self.config.server, error = %e, "Failed to answer ping");
                }
                true
            }
            Some(Ok(Message::Pong(_))) => true,
            Some(Ok(Message::Close(_))) | Some(Ok(Message::Frame(_))) => {
                info!(server = %self.config.server, "Server closed connection");
                false
            }
            Some(Err(e)) => {
                warn!(server = %self.config.server, error = %e, "WebSocket error");
                false
            }
            None => {
                info!(server = %self.config.server, "WebSocket stream ended");
                false
            }
        }
    }
}

/// Websocket client transport with automatic reconnects.
pub struct WebsocketTransport {
    config: WebsocketConfig,
    connection: Mutex<Option<Connection>>,
}

impl WebsocketTransport {
    pub fn new(config: WebsocketConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RelayTransport for WebsocketTransport {
    /// Connects once. With reconnects enabled a failed first attempt is
    /// retried in the background instead of failing.
    async fn init(&self, handler: Arc<dyn TransportHandler>) -> RelayResult<()> {
        info!(server = %self.config.server, "Connecting to WebSocket server");
        let stream = match self.config.connect().await {
            Ok(stream) => Some(stream),
            Err(e) if self.config.reconnect => {
                warn!(server = %self.config.server, error = %e, "Initial connection failed");
                handler.on_status(RelayStatus::Disconnected);
                None
            }
            Err(e) => return Err(e),
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let client = ClientLoop {
            config: self.config.clone(),
            handler,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
            current_delay: self.config.initial_delay,
        };
        let task = tokio::spawn(client.run(stream));

        let previous = self.connection.lock().replace(Connection {
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            task,
        });
        if let Some(previous) = previous {
            let _ = previous.shutdown.send(true);
        }
        Ok(())
    }

    async fn send(&self, frame: Vec<u8>) -> RelayResult<()> {
        let outbound = self
            .connection
            .lock()
            .as_ref()
            .map(|c| c.outbound.clone())
            .ok_or_else(|| RelayError::transport("not connected"))?;
        outbound
            .send(frame)
            .await
            .map_err(|_| RelayError::transport("connection closed"))
    }

    async fn deinit(&self) -> RelayResult<()> {
        let Some(connection) = self.connection.lock().take() else {
            return Ok(());
        };
        let _ = connection.shutdown.send(true);
        if connection.task.await.is_err() {
            debug!(server = %self.config.server, "Connection task ended abnormally");
        }
        Ok(())
    }
}

#[distributed_slice(RELAY_TRANSPORTS)]
fn websocket() -> Component<dyn RelayTransport> {
    Component::new(
        ClassSpec::new("websocket")
            .describe("Connect to a websocket server and exchange frames with it")
            .param(
                ParameterSpec::required("server", ParamType::String)
                    .describe("The URI of the server, e.g. wss://ws.nadybot.org"),
            )
            .param(
                ParameterSpec::optional("authorization", ParamType::Secret)
                    .describe("Bearer token sent when connecting"),
            )
            .param(
                ParameterSpec::optional("reconnect", ParamType::Bool)
                    .default_value(ArgValue::Bool(true))
                    .describe("Reconnect when the connection is lost"),
            )
            .param(
                ParameterSpec::optional("reconnect-delay", ParamType::Int)
                    .default_value(ArgValue::Int(5))
                    .describe("Seconds to wait before the first reconnect attempt"),
            ),
        |args, _| {
            let server = args.require_str("server")?;
            if !server.starts_with("ws://") && !server.starts_with("wss://") {
                return Err(format!("{server} is not a ws:// or wss:// URI").into());
            }
            let mut config = WebsocketConfig::new(server);
            config.authorization = args.str("authorization").map(str::to_string);
            config.reconnect = args.bool_or("reconnect", true);
            config.initial_delay = Duration::from_secs(args.int_or("reconnect-delay", 5).max(1) as u64);
            Ok(Arc::new(WebsocketTransport::new(config)) as Arc<dyn RelayTransport>)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::ServiceMap;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request as ServerRequest, Response,
    };

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<Vec<u8>>>,
        statuses: Mutex<Vec<RelayStatus>>,
    }

    #[async_trait]
    impl TransportHandler for Recorder {
        async fn on_frame(&self, frame: Vec<u8>) {
            self.frames.lock().push(frame);
        }

        fn on_status(&self, status: RelayStatus) {
            self.statuses.lock().push(status);
        }
    }

    async fn eventually(check: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    /// Accepts one client, greets it, then echoes every text frame with a
    /// prefix. Returns the server URI and the received Authorization header.
    async fn greeting_server() -> (String, Arc<Mutex<Option<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri = format!("ws://{}", listener.local_addr().unwrap());
        let auth = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&auth);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |request: &ServerRequest, response: Response| -> Result<Response, ErrorResponse> {
                *seen.lock() = request
                    .headers()
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Ok(response)
            };
            let mut ws = accept_hdr_async(stream, callback).await.unwrap();
            ws.send(Message::Text("hello".into())).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    let reply = format!("echo:{}", text.as_str());
                    ws.send(Message::Text(reply.into())).await.unwrap();
                }
            }
        });
        (uri, auth)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exchanges_frames_with_the_server() {
        let (uri, auth) = greeting_server().await;
        let mut config = WebsocketConfig::new(uri);
        config.authorization = Some("t0ken".into());
        config.reconnect = false;
        let transport = WebsocketTransport::new(config);
        let recorder = Arc::new(Recorder::default());

        transport.init(recorder.clone()).await.unwrap();
        eventually(|| !recorder.frames.lock().is_empty()).await;
        transport.send(b"ping".to_vec()).await.unwrap();
        eventually(|| recorder.frames.lock().len() == 2).await;

        assert_eq!(recorder.frames.lock()[0], b"hello");
        assert_eq!(recorder.frames.lock()[1], b"echo:ping");
        assert_eq!(auth.lock().as_deref(), Some("Bearer t0ken"));
        assert_eq!(recorder.statuses.lock().first(), Some(&RelayStatus::Connected));

        transport.deinit().await.unwrap();
        assert!(matches!(
            transport.send(b"late".to_vec()).await,
            Err(RelayError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_without_reconnect_fails_init() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let mut config = WebsocketConfig::new(uri);
        config.reconnect = false;
        let transport = WebsocketTransport::new(config);
        let result = transport.init(Arc::new(Recorder::default())).await;
        assert!(matches!(result, Err(RelayError::Transport(_))));
    }

    #[tokio::test]
    async fn unreachable_server_with_reconnect_keeps_trying() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let mut config = WebsocketConfig::new(uri);
        config.initial_delay = Duration::from_millis(10);
        let transport = WebsocketTransport::new(config);
        let recorder = Arc::new(Recorder::default());
        transport.init(recorder.clone()).await.unwrap();

        eventually(|| recorder.statuses.lock().contains(&RelayStatus::Initializing)).await;
        assert_eq!(recorder.statuses.lock()[0], RelayStatus::Disconnected);
        transport.deinit().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_hanging_connect() {
        // Accepts TCP but never answers the websocket handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri = format!("ws://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let mut config = WebsocketConfig::new(uri);
        config.initial_delay = Duration::from_millis(10);
        let recorder = Arc::new(Recorder::default());
        let (_outbound_tx, outbound_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let client = ClientLoop {
            config: config.clone(),
            handler: recorder.clone(),
            outbound: outbound_rx,
            shutdown: shutdown_rx,
            current_delay: config.initial_delay,
        };
        let task = tokio::spawn(client.run(None));

        eventually(|| recorder.statuses.lock().contains(&RelayStatus::Initializing)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!recorder.statuses.lock().contains(&RelayStatus::Connected));
    }

    #[test]
    fn factory_validates_the_uri() {
        let services = ServiceMap::new();
        assert!(
            websocket()
                .build("transport", [("server", "http://example.org")], &services)
                .is_err()
        );
        assert!(
            websocket()
                .build("transport", [("server", "wss://ws.nadybot.org"), ("reconnect-delay", "1")], &services)
                .is_ok()
        );
        assert!(websocket().spec.is_secret("authorization"));
    }
}
