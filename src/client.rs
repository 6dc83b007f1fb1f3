use futures::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::runtime::TryCurrentError;
use tokio::sync::oneshot;
use url::Url;

use crate::Result;
use crate::error::Error;
use crate::serde_helpers;
use crate::ws::{
    CloseCode, Config, Connection as _, Frame, Lifecycle, Message, Transport, TransportError,
    TungsteniteTransport,
};

/// Description of a send failure caused by a value that could not be encoded.
pub const MALFORMED_MESSAGE: &str = "Malformed message data.";

/// Description of a receive failure caused by a frame kind this crate does not know.
pub const UNKNOWN_FRAME: &str = "New web socket message type.";

/// Typed JSON messaging over a WebSocket connection.
///
/// Every operation reports its outcome through the supplied callback, which may
/// run on a different thread than the call site. Implement this trait to stand
/// in for [`SocketClient`] in tests.
pub trait SocketNetworking: Send + Sync {
    type Handle: Clone + Send + Sync + 'static;

    /// Open a connection to `url` without waiting for the handshake.
    fn connect(&self, url: &Url) -> Self::Handle;

    /// Send `message` as a JSON text frame.
    ///
    /// `on_error` runs at most once: synchronously if `message` cannot be
    /// encoded, later if the transport fails to deliver it. It never runs on
    /// success.
    fn send<M, F>(&self, message: &M, handle: &Self::Handle, on_error: F)
    where
        M: Serialize + ?Sized,
        F: FnOnce(Error) + Send + 'static;

    /// Receive exactly one frame and decode it as `M`.
    ///
    /// This is one-shot: call it again after `on_receive` ran to keep receiving.
    fn receive<M, F>(&self, handle: &Self::Handle, on_receive: F)
    where
        M: DeserializeOwned + 'static,
        F: FnOnce(Result<M>) + Send + 'static;

    /// Send a keepalive ping. `on_error` runs once if it fails, never otherwise.
    fn ping<F>(&self, handle: &Self::Handle, on_error: F)
    where
        F: FnOnce(Error) + Send + 'static;

    /// Request closure with `code`. Fire-and-forget.
    fn disconnect(&self, handle: &Self::Handle, code: CloseCode);
}

/// [`SocketNetworking`] over any [`Transport`].
///
/// The client holds no session state: it encodes and decodes JSON and maps
/// transport failures into [`Error`], nothing more. Retries, reconnection and
/// timeouts are left to the caller and the transport.
///
/// # Examples
///
/// ```rust, no_run
/// use serde::{Deserialize, Serialize};
/// use websocket_networking::ws::CloseCode;
/// use websocket_networking::{SocketClient, SocketNetworking as _};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Ping {
///     #[serde(rename = "type")]
///     kind: String,
///     seq: u64,
/// }
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = SocketClient::current()?;
///     let handle = client.connect(&"wss://example.test/socket".parse()?);
///
///     let ping = Ping { kind: "ping".to_owned(), seq: 1 };
///     client.send(&ping, &handle, |error| eprintln!("{error}"));
///     client.receive(&handle, |result: websocket_networking::Result<Ping>| {
///         println!("{result:?}");
///     });
///
///     client.disconnect(&handle, CloseCode::NORMAL);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SocketClient<T: Transport = TungsteniteTransport> {
    transport: T,
}

impl SocketClient<TungsteniteTransport> {
    /// Create a client over the default `tokio-tungstenite` transport, bound to
    /// the Tokio runtime of the calling context.
    pub fn current() -> std::result::Result<Self, TryCurrentError> {
        Ok(Self::new(TungsteniteTransport::current(Config::default())?))
    }
}

impl<T: Transport> SocketClient<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stream every inbound frame decoded as `M`.
    ///
    /// Re-arms the one-shot [`receive`](SocketNetworking::receive) after each
    /// frame. Frames that fail to decode are yielded as errors and the stream
    /// continues; a transport failure is yielded once and ends the stream.
    pub fn messages<M>(
        &self,
        handle: &T::Connection,
    ) -> impl Stream<Item = Result<M>> + Send + 'static + use<T, M>
    where
        M: DeserializeOwned + Send + 'static,
    {
        let handle = handle.clone();

        async_stream::stream! {
            loop {
                let (tx, rx) = oneshot::channel();
                handle.receive(Box::new(move |result| {
                    _ = tx.send(result);
                }));

                let url = handle.url().map(ToOwned::to_owned);
                match rx.await {
                    Ok(Ok(frame)) => {
                        yield decode_frame(&frame).map_err(|description| Error::receive(url, description));
                    }
                    Ok(Err(e)) => {
                        yield Err(Error::receive(url, e.description));
                        break;
                    }
                    Err(_) => {
                        yield Err(Error::receive(url, TransportError::closed().description));
                        break;
                    }
                }
            }
        }
    }
}

impl<T: Transport> SocketNetworking for SocketClient<T> {
    type Handle = T::Connection;

    fn connect(&self, url: &Url) -> Self::Handle {
        self.transport.open(url, inert_lifecycle())
    }

    fn send<M, F>(&self, message: &M, handle: &Self::Handle, on_error: F)
    where
        M: Serialize + ?Sized,
        F: FnOnce(Error) + Send + 'static,
    {
        let url = handle.url().map(ToOwned::to_owned);
        let Ok(text) = serde_helpers::encode(message) else {
            return on_error(Error::send(url, MALFORMED_MESSAGE));
        };

        handle.send(
            Message::Text(text),
            Box::new(move |result| {
                if let Err(e) = result {
                    on_error(Error::send(url, e.description));
                }
            }),
        );
    }

    fn receive<M, F>(&self, handle: &Self::Handle, on_receive: F)
    where
        M: DeserializeOwned + 'static,
        F: FnOnce(Result<M>) + Send + 'static,
    {
        let url = handle.url().map(ToOwned::to_owned);

        handle.receive(Box::new(move |result| {
            let decoded = match result {
                Ok(frame) => decode_frame(&frame),
                Err(e) => Err(e.description),
            };
            on_receive(decoded.map_err(|description| Error::receive(url, description)));
        }));
    }

    fn ping<F>(&self, handle: &Self::Handle, on_error: F)
    where
        F: FnOnce(Error) + Send + 'static,
    {
        let url = handle.url().map(ToOwned::to_owned);

        handle.ping(Box::new(move |result| {
            if let Err(e) = result {
                on_error(Error::ping(url, e.description));
            }
        }));
    }

    fn disconnect(&self, handle: &Self::Handle, code: CloseCode) {
        handle.cancel(code, None);
    }
}

/// The client's lifecycle delegate. Open and close notifications are consumed
/// without effect.
fn inert_lifecycle() -> Lifecycle {
    Lifecycle::new().on_open(|_| {}).on_close(|_| {})
}

/// Decode a text or binary frame as JSON, returning the failure description otherwise.
fn decode_frame<M: DeserializeOwned>(frame: &Frame) -> std::result::Result<M, String> {
    match frame.payload() {
        Some(bytes) => serde_helpers::decode(bytes).map_err(|e| e.to_string()),
        None => Err(UNKNOWN_FRAME.to_owned()),
    }
}
