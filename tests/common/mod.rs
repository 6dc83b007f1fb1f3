#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Each integration test only uses part of the shared helpers"
)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use url::Url;
use websocket_networking::error::Error;
use websocket_networking::ws::{
    CloseCode, Completion, Connection, Frame, Lifecycle, Message, ReceiveCompletion, Transport,
    TransportError,
};
use websocket_networking::{SocketClient, SocketNetworking};

pub const ENDPOINT: &str = "wss://example.test/socket";

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub seq: u64,
}

#[must_use]
pub fn ping_envelope(seq: u64) -> Envelope {
    Envelope {
        kind: "ping".to_owned(),
        seq,
    }
}

#[must_use]
pub fn endpoint() -> Url {
    ENDPOINT.parse().unwrap()
}

/// Error callback forwarding into a channel.
///
/// The channel yields `None` once the callback was dropped without running.
pub fn error_channel() -> (
    impl FnOnce(Error) + Send + 'static,
    mpsc::UnboundedReceiver<Error>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |error| {
            drop(tx.send(error));
        },
        rx,
    )
}

/// Issue one receive and wait for its completion.
pub async fn receive_one<N, M>(client: &N, handle: &N::Handle) -> websocket_networking::Result<M>
where
    N: SocketNetworking,
    M: serde::de::DeserializeOwned + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    client.receive(handle, move |result: websocket_networking::Result<M>| {
        drop(tx.send(result));
    });
    timeout(WAIT, rx).await.unwrap().unwrap()
}

/// Everything the scripted transport observed, plus the completions it still owes.
#[derive(Default)]
pub struct Script {
    pub opened: Vec<(String, Lifecycle)>,
    pub sent: Vec<Message>,
    pub cancelled: Vec<(CloseCode, Option<Vec<u8>>)>,
    pub pings: usize,
    /// Frames answered automatically, from another thread, by the next receives
    pub inbound: VecDeque<Result<Frame, TransportError>>,
    send_completions: VecDeque<Completion>,
    receive_completions: VecDeque<ReceiveCompletion>,
    ping_completions: VecDeque<Completion>,
}

/// In-memory [`Transport`] driven by the test.
///
/// Completions are held until the test resolves them, so none of them ever
/// runs before the call that registered it returned.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    hide_url: bool,
}

impl ScriptedTransport {
    /// A transport whose connections expose no URL.
    #[must_use]
    pub fn without_url() -> Self {
        Self {
            script: Arc::default(),
            hide_url: true,
        }
    }

    pub fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        f(&mut self.script.lock().unwrap())
    }

    pub fn push_inbound(&self, frame: Result<Frame, TransportError>) {
        self.with_script(|script| script.inbound.push_back(frame));
    }

    pub fn complete_send(&self, result: Result<(), TransportError>) {
        let completion = self.with_script(|script| script.send_completions.pop_front());
        completion.expect("no send in flight")(result);
    }

    pub fn complete_receive(&self, result: Result<Frame, TransportError>) {
        let completion = self.with_script(|script| script.receive_completions.pop_front());
        completion.expect("no receive in flight")(result);
    }

    pub fn complete_ping(&self, result: Result<(), TransportError>) {
        let completion = self.with_script(|script| script.ping_completions.pop_front());
        completion.expect("no ping in flight")(result);
    }

    /// Deliver the most recently sent text message back as an inbound text frame.
    pub fn echo_last_send(&self) {
        let text = self.with_script(|script| match script.sent.last() {
            Some(Message::Text(text)) => text.clone(),
            other => panic!("nothing to echo: {other:?}"),
        });
        self.complete_receive(Ok(Frame::Text(text)));
    }

    #[must_use]
    pub fn in_flight(&self) -> (usize, usize, usize) {
        self.with_script(|script| {
            (
                script.send_completions.len(),
                script.receive_completions.len(),
                script.ping_completions.len(),
            )
        })
    }
}

impl Transport for ScriptedTransport {
    type Connection = ScriptedConnection;

    fn open(&self, url: &Url, lifecycle: Lifecycle) -> Self::Connection {
        self.with_script(|script| script.opened.push((url.to_string(), lifecycle)));
        ScriptedConnection {
            script: Arc::clone(&self.script),
            url: (!self.hide_url).then(|| url.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
    url: Option<String>,
}

impl Connection for ScriptedConnection {
    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn send(&self, message: Message, completion: Completion) {
        let mut script = self.script.lock().unwrap();
        script.sent.push(message);
        script.send_completions.push_back(completion);
    }

    fn receive(&self, completion: ReceiveCompletion) {
        let mut script = self.script.lock().unwrap();
        match script.inbound.pop_front() {
            Some(frame) => {
                std::thread::spawn(move || completion(frame));
            }
            None => script.receive_completions.push_back(completion),
        }
    }

    fn ping(&self, completion: Completion) {
        let mut script = self.script.lock().unwrap();
        script.pings += 1;
        script.ping_completions.push_back(completion);
    }

    fn cancel(&self, code: CloseCode, reason: Option<Vec<u8>>) {
        self.script.lock().unwrap().cancelled.push((code, reason));
    }
}

/// Local WebSocket server echoing every text and binary frame it receives.
pub struct MockWsServer {
    addr: SocketAddr,
    /// Frames pushed to ALL connected clients
    push_tx: broadcast::Sender<WsMessage>,
    /// Data and close frames received from clients
    events_rx: mpsc::UnboundedReceiver<WsMessage>,
}

impl MockWsServer {
    /// Start a mock WebSocket server on a random port.
    ///
    /// The first sub-protocol a client offers, if any, is accepted.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (push_tx, _) = broadcast::channel::<WsMessage>(100);
        let (events_tx, events_rx) = mpsc::unbounded_channel::<WsMessage>();

        let broadcast_tx = push_tx.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, accept_protocol).await
                else {
                    continue;
                };

                let (mut write, mut read) = ws_stream.split();
                let events_tx = events_tx.clone();
                let mut push_rx = broadcast_tx.subscribe();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(msg @ (WsMessage::Text(_) | WsMessage::Binary(_)))) => {
                                        drop(events_tx.send(msg.clone()));
                                        if write.send(msg).await.is_err() {
                                            break;
                                        }
                                    }
                                    Some(Ok(msg @ WsMessage::Close(_))) => {
                                        // Keep reading so the close reply gets flushed
                                        drop(events_tx.send(msg));
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            msg = push_rx.recv() => {
                                match msg {
                                    Ok(msg) => {
                                        if write.send(msg).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            push_tx,
            events_rx,
        }
    }

    #[must_use]
    pub fn ws_url(&self, path: &str) -> Url {
        format!("ws://{}{}", self.addr, path).parse().unwrap()
    }

    /// Send a frame to all connected clients.
    pub fn push(&self, message: WsMessage) {
        drop(self.push_tx.send(message));
    }

    /// Number of clients currently subscribed to pushes.
    #[must_use]
    pub fn clients(&self) -> usize {
        self.push_tx.receiver_count()
    }

    /// Wait until at least one client finished its handshake.
    pub async fn wait_for_client(&self) {
        timeout(WAIT, async {
            while self.clients() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    /// Receive the next frame a client sent.
    pub async fn recv_event(&mut self) -> Option<WsMessage> {
        timeout(WAIT, self.events_rx.recv()).await.ok().flatten()
    }
}

fn accept_protocol(request: &Request, mut response: Response) -> Result<Response, ErrorResponse> {
    let offered = request
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .map(ToOwned::to_owned);

    if let Some(protocol) = offered {
        response
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_str(&protocol).unwrap());
    }

    Ok(response)
}
