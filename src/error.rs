use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

/// Domain tag shared by every [`Error`] produced by this crate.
pub const DOMAIN: &str = "Networking";

/// Placeholder rendered in place of a missing connection URL.
const NO_URL: &str = "no_url";

/// The operation an [`Error`] originates from.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Serializing or transmitting an outbound message failed
    Send,
    /// Receiving or decoding an inbound frame failed
    Receive,
    /// A keepalive ping failed
    Ping,
}

impl Kind {
    /// Stable numeric code for cross-system reporting.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Send => -9001,
            Self::Receive => -9002,
            Self::Ping => -9003,
        }
    }

    #[must_use]
    pub const fn domain(self) -> &'static str {
        DOMAIN
    }

    const fn operation(self) -> &'static str {
        match self {
            Self::Send => "Message sending",
            Self::Receive => "Message receiving",
            Self::Ping => "Ping",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    url: Option<String>,
    description: String,
    backtrace: Backtrace,
}

impl Error {
    pub fn new<S: Into<String>>(kind: Kind, url: Option<String>, description: S) -> Self {
        Self {
            kind,
            url,
            description: description.into(),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn send<S: Into<String>>(url: Option<String>, description: S) -> Self {
        Self::new(Kind::Send, url, description)
    }

    pub fn receive<S: Into<String>>(url: Option<String>, description: S) -> Self {
        Self::new(Kind::Receive, url, description)
    }

    pub fn ping<S: Into<String>>(url: Option<String>, description: S) -> Self {
        Self::new(Kind::Ping, url, description)
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Shorthand for `self.kind().code()`.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    #[must_use]
    pub fn domain(&self) -> &'static str {
        DOMAIN
    }

    /// Best-effort URL of the connection the failure happened on.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The underlying cause, without the operation and URL prefix.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed: {}, {}",
            self.kind.operation(),
            self.url.as_deref().unwrap_or(NO_URL),
            self.description
        )
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_per_kind() {
        assert_eq!(Kind::Send.code(), -9001);
        assert_eq!(Kind::Receive.code(), -9002);
        assert_eq!(Kind::Ping.code(), -9003);
    }

    #[test]
    fn code_does_not_depend_on_payload() {
        let first = Error::send(Some("wss://a.test".to_owned()), "boom");
        let second = Error::send(None, "something else entirely");

        assert_eq!(first.code(), second.code());
        assert_eq!(first.domain(), "Networking");
        assert_eq!(second.kind().domain(), DOMAIN);
    }

    #[test]
    fn display_includes_operation_url_and_description() {
        let error = Error::receive(Some("wss://example.test/socket".to_owned()), "bad frame");

        assert_eq!(
            error.to_string(),
            "Message receiving failed: wss://example.test/socket, bad frame"
        );
    }

    #[test]
    fn display_uses_placeholder_without_url() {
        let error = Error::ping(None, "connection reset");

        assert_eq!(error.to_string(), "Ping failed: no_url, connection reset");
        assert_eq!(error.url(), None);
        assert_eq!(error.description(), "connection reset");
    }

    #[test]
    fn send_display_should_succeed() {
        let error = Error::send(Some("ws://localhost".to_owned()), "Malformed message data.");

        assert_eq!(
            error.to_string(),
            "Message sending failed: ws://localhost, Malformed message data."
        );
    }
}
