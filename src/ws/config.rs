#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 << 20;
const DEFAULT_MAX_FRAME_SIZE: usize = 16 << 20;
const DEFAULT_WRITE_BUFFER_SIZE: usize = 128 * 1024;
const DEFAULT_MAX_BUFFERED_FRAMES: usize = 4096;

/// Configuration for sessions opened by [`TungsteniteTransport`](super::TungsteniteTransport).
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Largest inbound message accepted. `None` means no limit.
    pub max_message_size: Option<usize>,
    /// Largest single inbound frame accepted. `None` means no limit.
    pub max_frame_size: Option<usize>,
    /// Outbound bytes buffered before a write is flushed to the socket
    pub write_buffer_size: usize,
    /// Hard cap on buffered outbound bytes; writes beyond it fail
    pub max_write_buffer_size: usize,
    /// Set `TCP_NODELAY` on the underlying socket
    pub disable_nagle: bool,
    /// Sub-protocols offered in `Sec-WebSocket-Protocol`, in preference order
    pub protocols: Vec<String>,
    /// Inbound data frames held while no receive is pending. Exceeding it
    /// closes the session with [`CloseCode::POLICY`](super::CloseCode::POLICY).
    /// `None` means no limit.
    pub max_buffered_frames: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
            max_frame_size: Some(DEFAULT_MAX_FRAME_SIZE),
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            max_write_buffer_size: usize::MAX,
            disable_nagle: true,
            protocols: Vec::new(),
            max_buffered_frames: Some(DEFAULT_MAX_BUFFERED_FRAMES),
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_max_message_size(mut self, size: Option<usize>) -> Self {
        self.max_message_size = size;
        self
    }

    #[must_use]
    pub fn with_max_frame_size(mut self, size: Option<usize>) -> Self {
        self.max_frame_size = size;
        self
    }

    #[must_use]
    pub fn with_max_buffered_frames(mut self, frames: Option<usize>) -> Self {
        self.max_buffered_frames = frames;
        self
    }

    #[must_use]
    pub fn with_disable_nagle(mut self, disable_nagle: bool) -> Self {
        self.disable_nagle = disable_nagle;
        self
    }

    /// Value of the `Sec-WebSocket-Protocol` request header, if any protocols are offered.
    pub(crate) fn protocol_header(&self) -> Option<String> {
        (!self.protocols.is_empty()).then(|| self.protocols.join(", "))
    }
}

impl From<&Config> for WebSocketConfig {
    fn from(config: &Config) -> Self {
        WebSocketConfig::default()
            .max_message_size(config.max_message_size)
            .max_frame_size(config.max_frame_size)
            .write_buffer_size(config.write_buffer_size)
            .max_write_buffer_size(config.max_write_buffer_size)
    }
}
