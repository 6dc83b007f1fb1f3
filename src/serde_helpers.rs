//! JSON encoding and decoding of WebSocket payloads.
//!
//! When the `tracing` feature is enabled, decoding also logs warnings for any
//! unknown fields encountered, and the JSON path of any decoding failure.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encode an outbound value as JSON text.
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Decode an inbound payload with unknown field warnings.
///
/// Unknown fields trigger warnings but do not cause decoding to fail.
///
/// # Example
///
/// ```ignore
/// let payload = br#"{"type": "ping", "seq": 1, "extra": true}"#;
/// let message: Ping = decode(payload)?;
/// // Logs: WARN Unknown field "extra" with value true in Ping
/// ```
#[cfg(feature = "tracing")]
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    use std::any::type_name;

    tracing::trace!(
        type_name = %type_name::<T>(),
        len = bytes.len(),
        "decoding WebSocket payload"
    );

    let mut unknown_paths: Vec<String> = Vec::new();
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);

    let result: T = serde_ignored::deserialize(&mut deserializer, |path| {
        unknown_paths.push(path.to_string());
    })
    .inspect_err(|_| {
        // Decode again with serde_path_to_error to report where it failed
        let deserializer = &mut serde_json::Deserializer::from_slice(bytes);
        let path_result: Result<T, _> = serde_path_to_error::deserialize(deserializer);
        if let Err(path_err) = path_result {
            tracing::error!(
                type_name = %type_name::<T>(),
                path = %path_err.path(),
                error = %path_err.inner(),
                "decoding WebSocket payload failed"
            );
        }
    })?;
    deserializer.end()?;

    for path in unknown_paths {
        tracing::warn!(
            type_name = %type_name::<T>(),
            field = %path,
            "unknown field in WebSocket payload"
        );
    }

    Ok(result)
}

/// Pass-through decoding when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(bytes)
}
