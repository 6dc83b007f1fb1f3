//! Transport capability traits.

use url::Url;

use super::{CloseCode, Frame, Lifecycle, Message, TransportError};

/// Completion for operations that carry no value on success.
pub type Completion = Box<dyn FnOnce(Result<(), TransportError>) + Send + 'static>;

/// Completion for a single receive.
pub type ReceiveCompletion = Box<dyn FnOnce(Result<Frame, TransportError>) + Send + 'static>;

/// Raw WebSocket capability set consumed by [`SocketClient`](crate::SocketClient).
///
/// Implement this for test doubles or alternative WebSocket stacks. The crate
/// ships [`TungsteniteTransport`](super::TungsteniteTransport).
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    /// Open a session to `url` and start it immediately.
    ///
    /// Must not wait for the handshake. `lifecycle` receives the session's open
    /// and close notifications.
    fn open(&self, url: &Url, lifecycle: Lifecycle) -> Self::Connection;
}

/// Handle to one transport session.
///
/// Every completion handed to these methods must be invoked exactly once, and
/// never before the method that received it returns.
pub trait Connection: Clone + Send + Sync + 'static {
    /// Best-effort URL the session was opened with.
    fn url(&self) -> Option<&str>;

    fn send(&self, message: Message, completion: Completion);

    /// Deliver exactly one inbound frame, or the failure that prevented it.
    fn receive(&self, completion: ReceiveCompletion);

    /// Send a keepalive ping. Succeeds once the peer answered.
    fn ping(&self, completion: Completion);

    /// Request closure. Never fails, never blocks.
    fn cancel(&self, code: CloseCode, reason: Option<Vec<u8>>);
}
