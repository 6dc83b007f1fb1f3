//! Connection lifecycle notifications.
//!
//! A [`Transport`](super::Transport) reports when a session opens and when it
//! closes through the [`Lifecycle`] callback pair injected at
//! [`open`](super::Transport::open) time. Both callbacks are optional.
//!
//! ```rust
//! use websocket_networking::ws::Lifecycle;
//!
//! let lifecycle = Lifecycle::new()
//!     .on_open(|event| assert!(event.url.is_some()))
//!     .on_close(|event| assert!(event.code.as_u16() >= 1000));
//! ```

use std::fmt;
use std::sync::Arc;

use super::CloseCode;

/// A session finished its opening handshake.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEvent {
    pub url: Option<String>,
    /// Sub-protocol negotiated by the server, if any
    pub protocol: Option<String>,
}

impl OpenEvent {
    #[must_use]
    pub fn new(url: Option<String>, protocol: Option<String>) -> Self {
        Self { url, protocol }
    }
}

/// A session closed.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub url: Option<String>,
    pub code: CloseCode,
    /// Raw close reason payload, absent when the peer sent none
    pub reason: Option<Vec<u8>>,
}

impl CloseEvent {
    #[must_use]
    pub fn new(url: Option<String>, code: CloseCode, reason: Option<Vec<u8>>) -> Self {
        Self { url, code, reason }
    }
}

pub type OnOpenCallback = Arc<dyn Fn(&OpenEvent) + Send + Sync>;

pub type OnCloseCallback = Arc<dyn Fn(&CloseEvent) + Send + Sync>;

/// Callback pair receiving open and close notifications for one session.
#[derive(Clone, Default)]
pub struct Lifecycle {
    on_open: Option<OnOpenCallback>,
    on_close: Option<OnCloseCallback>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

impl Lifecycle {
    /// Create a callback pair with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&OpenEvent) + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&CloseEvent) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Deliver an open notification. Called by transports.
    pub fn notify_open(&self, event: &OpenEvent) {
        if let Some(on_open) = &self.on_open {
            on_open(event);
        }
    }

    /// Deliver a close notification. Called by transports.
    pub fn notify_close(&self, event: &CloseEvent) {
        if let Some(on_close) = &self.on_close {
            on_close(event);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on_open.is_none() && self.on_close.is_none()
    }
}
