// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `WeatherFlow` client.
//!
//! Failures are grouped by concern: decoding inbound frames, talking to the
//! WebSocket server, and validating configuration. Decode and protocol
//! errors are recovered inside the connection task (counted, logged and
//! folded into the backoff cycle); they only reach callers through the
//! decoder's public API.

use thiserror::Error;

/// The main error type for this library.
///
/// The client itself only returns `Config`, `AlreadyStarted` and `Stopped`.
/// `Decode` and `Protocol` exist so code calling [`decode`](crate::decode)
/// directly, or reporting logged connection failures, can use `?` into
/// [`Result`].
#[derive(Debug, Error)]
pub enum Error {
    /// A frame could not be decoded into a known message.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Client configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `start` was called on a client whose connection task already runs.
    #[error("client already started")]
    AlreadyStarted,

    /// `start` was called on a client that has been stopped.
    #[error("client has been stopped")]
    Stopped,
}

/// Errors raised while decoding an inbound text frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not a valid JSON document of the expected shape.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The `type` discriminator is absent or not a string.
    #[error("missing type")]
    MissingType,

    /// The `type` discriminator names a message this client does not handle.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A positional field is not an array.
    #[error("field {field} is not a positional tuple")]
    NotATuple {
        /// The wire field holding the tuple.
        field: &'static str,
    },

    /// A positional tuple has the wrong number of elements.
    #[error("field {field} has {actual} elements, expected {expected}")]
    TupleLength {
        /// The wire field holding the tuple.
        field: &'static str,
        /// Number of slots in the schema.
        expected: usize,
        /// Number of elements received.
        actual: usize,
    },

    /// A tuple element does not match the kind its slot requires.
    #[error("{field}[{index}] ({slot}) must be {expected}")]
    InvalidSlot {
        /// The wire field holding the tuple.
        field: &'static str,
        /// Name of the slot.
        slot: &'static str,
        /// Position of the slot in the tuple.
        index: usize,
        /// Description of the accepted kind.
        expected: &'static str,
    },
}

/// Errors related to the WebSocket connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// WebSocket transport error while reading.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The handshake with the server failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The handshake did not complete in time.
    #[error("connection timed out after {0} ms")]
    Timeout(u64),

    /// The server sent a frame other than text.
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// No frame arrived within the idle timeout.
    #[error("no frame received for {0} s")]
    IdleTimeout(u64),

    /// A directive could not be written to the socket.
    #[error("failed to send {directive}: {reason}")]
    SendFailed {
        /// The directive type that failed.
        directive: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// Invalid endpoint URL.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors related to client configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// No token or URL was supplied.
    #[error("an API token or endpoint URL is required")]
    MissingEndpoint,

    /// The backoff base does not grow the delay.
    #[error("backoff base must be greater than 1, got {0}")]
    InvalidBackoffBase(f64),

    /// The backoff unit is zero.
    #[error("backoff unit must be non-zero")]
    ZeroBackoffUnit,

    /// The maximum backoff is below a single unit.
    #[error("maximum backoff must be at least one unit")]
    MaxBelowUnit,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_type_display() {
        assert_eq!(DecodeError::MissingType.to_string(), "missing type");
    }

    #[test]
    fn unsupported_type_names_tag() {
        let err = DecodeError::UnsupportedType("evt_strike".to_string());
        assert_eq!(err.to_string(), "unsupported type: evt_strike");
    }

    #[test]
    fn tuple_length_display() {
        let err = DecodeError::TupleLength {
            field: "ob",
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "field ob has 2 elements, expected 3");
    }

    #[test]
    fn error_from_decode_error() {
        let err: Error = DecodeError::MissingType.into();
        assert!(matches!(err, Error::Decode(DecodeError::MissingType)));
    }

    #[test]
    fn decode_converts_with_question_mark() {
        fn tag(payload: &[u8]) -> Result<&'static str> {
            Ok(crate::decode(payload)?.type_tag())
        }

        assert_eq!(tag(br#"{"type":"connection_opened"}"#).unwrap(), "connection_opened");
        assert!(matches!(
            tag(br#"{"type":"evt_strike"}"#),
            Err(Error::Decode(DecodeError::UnsupportedType(t))) if t == "evt_strike"
        ));
    }

    #[test]
    fn error_from_protocol_error() {
        let err: Error = ProtocolError::ConnectionClosed.into();
        assert!(matches!(err, Error::Protocol(ProtocolError::ConnectionClosed)));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidBackoffBase(1.0);
        assert_eq!(err.to_string(), "backoff base must be greater than 1, got 1");
    }
}
