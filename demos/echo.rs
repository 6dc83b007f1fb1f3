//! Echo round trip against a public WebSocket echo server.
//!
//! Sends a few JSON envelopes, reads them back one by one, then follows the
//! connection as a stream for a short while before closing it.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example echo --features tracing -- wss://echo.websocket.org
//! ```

use std::time::Duration;

use futures::StreamExt as _;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use websocket_networking::ws::CloseCode;
use websocket_networking::{SocketClient, SocketNetworking as _};

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    seq: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "wss://echo.websocket.org".to_owned());

    let client = SocketClient::current()?;
    let handle = client.connect(&endpoint.parse()?);
    info!(endpoint = %endpoint, "connecting");

    client.ping(&handle, |error| {
        warn!(code = error.code(), error = %error, "ping failed");
    });

    for seq in 1..=3 {
        let envelope = Envelope {
            kind: "ping".to_owned(),
            seq,
        };
        client.send(&envelope, &handle, |error| {
            warn!(code = error.code(), error = %error, "send failed");
        });

        let (tx, rx) = oneshot::channel();
        client.receive(&handle, move |result: websocket_networking::Result<Envelope>| {
            _ = tx.send(result);
        });

        match timeout(Duration::from_secs(5), rx).await {
            Ok(Ok(Ok(echoed))) => info!(seq = echoed.seq, kind = %echoed.kind, "echoed"),
            // Some echo servers greet with a banner that is not an envelope
            Ok(Ok(Err(error))) => debug!(code = error.code(), error = %error, "skipped frame"),
            Ok(Err(_)) => warn!("receive dropped without completing"),
            Err(_) => warn!(seq, "timed out waiting for echo"),
        }
    }

    client.send(
        &Envelope {
            kind: "tail".to_owned(),
            seq: 4,
        },
        &handle,
        |error| warn!(error = %error, "send failed"),
    );

    let mut stream = Box::pin(client.messages::<Envelope>(&handle));
    while let Ok(Some(result)) = timeout(Duration::from_secs(2), stream.next()).await {
        match result {
            Ok(envelope) => info!(stream = "messages", seq = envelope.seq, kind = %envelope.kind),
            Err(error) => debug!(stream = "messages", error = %error),
        }
    }

    client.disconnect(&handle, CloseCode::NORMAL);
    info!("disconnected");

    Ok(())
}
