//! WebSocket transport layer.
//!
//! This module defines the raw capability set the [`SocketClient`](crate::SocketClient)
//! is written against, and ships one implementation of it.
//!
//! # Architecture
//!
//! - [`Transport`] / [`Connection`]: open sessions and drive send, receive, ping and close
//! - [`Lifecycle`]: callback pair receiving open and close notifications
//! - [`TungsteniteTransport`]: production transport built on `tokio-tungstenite`
//!
//! # Example
//!
//! ```ignore
//! // A test double only needs to implement the two traits
//! struct ScriptedTransport { /* ... */ }
//!
//! impl Transport for ScriptedTransport {
//!     type Connection = ScriptedConnection;
//!     fn open(&self, url: &Url, lifecycle: Lifecycle) -> ScriptedConnection { /* ... */ }
//! }
//!
//! let client = SocketClient::new(ScriptedTransport::default());
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod traits;

pub use config::Config;
pub use connection::{TungsteniteConnection, TungsteniteTransport};
pub use error::TransportError;
pub use frame::{CloseCode, Frame, Message};
pub use lifecycle::{CloseEvent, Lifecycle, OpenEvent};
pub use traits::*;
