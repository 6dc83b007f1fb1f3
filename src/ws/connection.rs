#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use super::config::Config;
use super::error::TransportError;
use super::lifecycle::{CloseEvent, Lifecycle, OpenEvent};
use super::traits::{Completion, Connection, ReceiveCompletion, Transport};
use super::{CloseCode, Frame, Message};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Work submitted by a [`TungsteniteConnection`] to its session task.
enum Command {
    Send {
        message: Message,
        completion: Completion,
    },
    Receive {
        completion: ReceiveCompletion,
    },
    Ping {
        completion: Completion,
    },
    Close {
        code: CloseCode,
        reason: Option<Vec<u8>>,
    },
}

impl Command {
    fn fail(self, error: TransportError) {
        match self {
            Self::Send { completion, .. } | Self::Ping { completion } => completion(Err(error)),
            Self::Receive { completion } => completion(Err(error)),
            Self::Close { .. } => {}
        }
    }
}

impl From<Message> for WsMessage {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => WsMessage::Text(text.into()),
            Message::Binary(bytes) => WsMessage::Binary(bytes.into()),
        }
    }
}

/// [`Transport`] backed by `tokio-tungstenite`.
///
/// Every [`open`](Transport::open) spawns one session task on the runtime the
/// transport was built with. The task performs the handshake, then serves the
/// connection's commands in submission order while reading inbound frames.
/// Inbound data frames are buffered until a receive asks for them, up to
/// [`Config::max_buffered_frames`].
///
/// # Example
///
/// ```rust, no_run
/// use websocket_networking::ws::{Config, Transport as _, Lifecycle, TungsteniteTransport};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let transport = TungsteniteTransport::current(Config::default())?;
///     let url = "wss://example.test/socket".parse()?;
///     let _connection = transport.open(&url, Lifecycle::new());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    config: Arc<Config>,
    runtime: Handle,
}

impl TungsteniteTransport {
    /// Create a transport spawning its sessions onto `runtime`.
    #[must_use]
    pub fn new(config: Config, runtime: Handle) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
        }
    }

    /// Create a transport bound to the Tokio runtime of the calling context.
    pub fn current(config: Config) -> Result<Self, TryCurrentError> {
        Ok(Self::new(config, Handle::try_current()?))
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Transport for TungsteniteTransport {
    type Connection = TungsteniteConnection;

    fn open(&self, url: &Url, lifecycle: Lifecycle) -> Self::Connection {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let id = Uuid::new_v4();

        let session = Session {
            id,
            url: url.to_string(),
            lifecycle,
            commands: commands_rx,
            sink: None,
            source: None,
            buffered: VecDeque::new(),
            max_buffered: self.config.max_buffered_frames,
            pending_receives: VecDeque::new(),
            pending_pings: PendingPings::default(),
            closed: None,
            close_notified: false,
        };

        self.runtime
            .spawn(session.run(Arc::clone(&self.config), shutdown.clone()));

        TungsteniteConnection {
            inner: Arc::new(ConnectionInner {
                id,
                url: url.to_string(),
                commands: commands_tx,
                shutdown,
            }),
        }
    }
}

#[derive(Debug)]
struct ConnectionInner {
    id: Uuid,
    url: String,
    commands: mpsc::UnboundedSender<Command>,
    /// Aborts a handshake still in flight
    shutdown: CancellationToken,
}

/// Handle to one session opened by [`TungsteniteTransport`].
///
/// Clones share the same session. The session task stops once every clone is
/// dropped, failing whatever it still owed.
#[derive(Debug, Clone)]
pub struct TungsteniteConnection {
    inner: Arc<ConnectionInner>,
}

impl TungsteniteConnection {
    /// Identifier of the session, as it appears in logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    fn submit(&self, command: Command) {
        if let Err(mpsc::error::SendError(command)) = self.inner.commands.send(command) {
            // The session task is gone, usually with its runtime, so nothing can
            // be spawned there. Completions still must not run inline.
            std::thread::spawn(move || command.fail(TransportError::closed()));
        }
    }
}

impl Connection for TungsteniteConnection {
    fn url(&self) -> Option<&str> {
        Some(&self.inner.url)
    }

    fn send(&self, message: Message, completion: Completion) {
        self.submit(Command::Send {
            message,
            completion,
        });
    }

    fn receive(&self, completion: ReceiveCompletion) {
        self.submit(Command::Receive { completion });
    }

    fn ping(&self, completion: Completion) {
        self.submit(Command::Ping { completion });
    }

    fn cancel(&self, code: CloseCode, reason: Option<Vec<u8>>) {
        self.submit(Command::Close { code, reason });
        self.inner.shutdown.cancel();
    }
}

/// Pings waiting for their pong.
///
/// Each ping carries a counter as payload, which the peer echoes in its pong.
/// A pong answers the ping it echoes and every older one. Pongs matching no
/// pending ping are unsolicited and ignored.
#[derive(Default)]
struct PendingPings {
    next: u64,
    waiting: VecDeque<(u64, Completion)>,
}

impl PendingPings {
    /// Reserve the payload for the next ping.
    fn next_payload(&mut self) -> u64 {
        let payload = self.next;
        self.next = self.next.wrapping_add(1);
        payload
    }

    fn push(&mut self, payload: u64, completion: Completion) {
        self.waiting.push_back((payload, completion));
    }

    fn answer(&mut self, pong: &[u8]) {
        let Ok(bytes) = <[u8; 8]>::try_from(pong) else {
            return;
        };
        let payload = u64::from_be_bytes(bytes);
        let Some(index) = self.waiting.iter().position(|(sent, _)| *sent == payload) else {
            return;
        };

        for (_, completion) in self.waiting.drain(..=index) {
            completion(Ok(()));
        }
    }

    fn fail_all(&mut self, error: &TransportError) {
        for (_, completion) in self.waiting.drain(..) {
            completion(Err(error.clone()));
        }
    }

    #[cfg(any(test, feature = "tracing"))]
    fn len(&self) -> usize {
        self.waiting.len()
    }
}

/// State owned by the task driving one connection.
///
/// Dropping it, when the loop ends or when the runtime discards the task, fails
/// every command and completion it still holds.
struct Session {
    #[cfg_attr(
        not(feature = "tracing"),
        expect(dead_code, reason = "Only read when logging")
    )]
    id: Uuid,
    url: String,
    lifecycle: Lifecycle,
    commands: mpsc::UnboundedReceiver<Command>,
    sink: Option<WsSink>,
    source: Option<WsSource>,
    /// Data frames read ahead of any receive
    buffered: VecDeque<Frame>,
    max_buffered: Option<usize>,
    pending_receives: VecDeque<ReceiveCompletion>,
    pending_pings: PendingPings,
    /// Set once the session stopped carrying traffic
    closed: Option<TransportError>,
    close_notified: bool,
}

impl Session {
    async fn run(mut self, config: Arc<Config>, shutdown: CancellationToken) {
        match handshake(&self.url, &config, &shutdown).await {
            Ok((stream, protocol)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(id = %self.id, url = %self.url, ?protocol, "WebSocket connected");

                let (sink, source) = stream.split();
                self.sink = Some(sink);
                self.source = Some(source);
                self.lifecycle
                    .notify_open(&OpenEvent::new(Some(self.url.clone()), protocol));
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(id = %self.id, url = %self.url, error = %e, "Unable to connect");
                self.closed = Some(e);
            }
        }

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command).await;
                }

                message = next_message(&mut self.source) => {
                    self.handle_message(message).await;
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            id = %self.id,
            pending_receives = self.pending_receives.len(),
            pending_pings = self.pending_pings.len(),
            "All connection handles dropped, stopping session"
        );
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send {
                message,
                completion,
            } => {
                let result = match self.sink.as_mut() {
                    Some(sink) => sink
                        .send(WsMessage::from(message))
                        .await
                        .map_err(TransportError::from),
                    None => Err(self.closed_error()),
                };
                completion(result);
            }
            Command::Receive { completion } => {
                if let Some(frame) = self.buffered.pop_front() {
                    completion(Ok(frame));
                } else if self.closed.is_some() {
                    completion(Err(self.closed_error()));
                } else {
                    self.pending_receives.push_back(completion);
                }
            }
            Command::Ping { completion } => {
                let payload = self.pending_pings.next_payload();
                match self.sink.as_mut() {
                    Some(sink) => {
                        let ping = WsMessage::Ping(payload.to_be_bytes().to_vec().into());
                        match sink.send(ping).await {
                            Ok(()) => self.pending_pings.push(payload, completion),
                            Err(e) => completion(Err(e.into())),
                        }
                    }
                    None => completion(Err(self.closed_error())),
                }
            }
            Command::Close { code, reason } => {
                self.close(code, reason, TransportError::closed()).await;
            }
        }
    }

    async fn handle_message(&mut self, message: Option<Result<WsMessage, tungstenite::Error>>) {
        match message {
            Some(Ok(WsMessage::Text(text))) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(id = %self.id, %text, "Received WebSocket text frame");
                self.deliver(Frame::Text(text.as_str().to_owned()));
            }
            Some(Ok(WsMessage::Binary(bytes))) => self.deliver(Frame::Binary(bytes.to_vec())),
            Some(Ok(WsMessage::Pong(payload))) => self.pending_pings.answer(&payload),
            Some(Ok(WsMessage::Ping(_))) => {
                // Answered by tungstenite on the next write.
            }
            Some(Ok(WsMessage::Close(frame))) => {
                let (code, reason) = frame.map_or((CloseCode::NO_STATUS, None), |frame| {
                    let reason = frame.reason.as_bytes().to_vec();
                    (frame.code.into(), (!reason.is_empty()).then_some(reason))
                });

                #[cfg(feature = "tracing")]
                tracing::debug!(id = %self.id, %code, "WebSocket closed by peer");

                self.shut(TransportError::closed());
                self.notify_close(code, reason);
            }
            Some(Ok(WsMessage::Frame(_))) => self.deliver(Frame::Other),
            Some(Err(e)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(id = %self.id, error = %e, "WebSocket read failed");
                self.source = None;
                self.shut(e.into());
            }
            None => {
                self.source = None;
                self.shut(TransportError::closed());
            }
        }

        if self.overflowed() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                id = %self.id,
                buffered = self.buffered.len(),
                "Inbound buffer limit exceeded, closing WebSocket"
            );
            self.close(
                CloseCode::POLICY,
                None,
                TransportError::new("WebSocket inbound buffer limit exceeded"),
            )
            .await;
        }
    }

    /// Send a close frame and stop carrying traffic, failing later operations
    /// with `error`. The read half stays open to consume the peer's close reply.
    async fn close(&mut self, code: CloseCode, reason: Option<Vec<u8>>, error: TransportError) {
        let Some(mut sink) = self.sink.take() else {
            return;
        };

        let reason = reason
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        let frame = CloseFrame {
            code: code.into(),
            reason: reason.into(),
        };

        if let Err(e) = sink.send(WsMessage::Close(Some(frame))).await {
            #[cfg(feature = "tracing")]
            tracing::debug!(id = %self.id, error = %e, "Unable to send close frame");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }

        self.shut(error);
        self.notify_close(code, None);
    }

    fn deliver(&mut self, frame: Frame) {
        if self.closed.is_some() {
            return;
        }

        match self.pending_receives.pop_front() {
            Some(completion) => completion(Ok(frame)),
            None => self.buffered.push_back(frame),
        }
    }

    fn overflowed(&self) -> bool {
        self.closed.is_none()
            && self
                .max_buffered
                .is_some_and(|max| self.buffered.len() > max)
    }

    /// Mark the session closed and fail everything still waiting on the peer.
    fn shut(&mut self, error: TransportError) {
        self.sink = None;
        let error = self.closed.get_or_insert(error).clone();

        for completion in self.pending_receives.drain(..) {
            completion(Err(error.clone()));
        }
        self.pending_pings.fail_all(&error);
    }

    fn notify_close(&mut self, code: CloseCode, reason: Option<Vec<u8>>) {
        if std::mem::replace(&mut self.close_notified, true) {
            return;
        }
        self.lifecycle
            .notify_close(&CloseEvent::new(Some(self.url.clone()), code, reason));
    }

    fn closed_error(&self) -> TransportError {
        self.closed.clone().unwrap_or_else(TransportError::closed)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.commands.close();
        self.shut(TransportError::closed());

        let error = self.closed_error();
        while let Ok(command) = self.commands.try_recv() {
            command.fail(error.clone());
        }
    }
}

async fn next_message(
    source: &mut Option<WsSource>,
) -> Option<Result<WsMessage, tungstenite::Error>> {
    match source {
        Some(source) => source.next().await,
        None => std::future::pending().await,
    }
}

async fn handshake(
    url: &str,
    config: &Config,
    shutdown: &CancellationToken,
) -> Result<(WsStream, Option<String>), TransportError> {
    let mut request = url.into_client_request()?;
    if let Some(protocols) = config.protocol_header() {
        let value =
            HeaderValue::from_str(&protocols).map_err(|e| TransportError::new(e.to_string()))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(%url, "Opening WebSocket connection");

    tokio::select! {
        result = connect_async_with_config(
            request,
            Some(WebSocketConfig::from(config)),
            config.disable_nagle,
        ) => {
            let (stream, response) = result?;
            let protocol = response
                .headers()
                .get(SEC_WEBSOCKET_PROTOCOL)
                .and_then(|value| value.to_str().ok())
                .map(ToOwned::to_owned);
            Ok((stream, protocol))
        }
        () = shutdown.cancelled() => Err(TransportError::new("WebSocket connection cancelled")),
    }
}
