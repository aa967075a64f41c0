#![forbid(unsafe_code)]

use serde_json::Value;
use thiserror::Error;

use crate::messages::{ClientMessage, ServerMessage};

/// Default maximum size of a single websocket text message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("invalid JSON payload: {0}")]
	BadJson(#[source] serde_json::Error),

	#[error("message exceeds maximum size: len={len} max={max}")]
	TooLarge { len: usize, max: usize },

	#[error("unknown message type: {0}")]
	InvalidType(String),
}

impl DecodeError {
	pub const fn code(&self) -> &'static str {
		match self {
			DecodeError::BadJson(_) | DecodeError::TooLarge { .. } => "BAD_JSON",
			DecodeError::InvalidType(_) => "INVALID_TYPE",
		}
	}
}

/// Decode one client text message.
///
/// Unparseable JSON and malformed payloads are `BAD_JSON`; a well-formed object
/// whose `type` is missing or unknown is `INVALID_TYPE`.
pub fn decode_client_message(raw: &str, max_size: usize) -> Result<ClientMessage, DecodeError> {
	if raw.len() > max_size {
		return Err(DecodeError::TooLarge {
			len: raw.len(),
			max: max_size,
		});
	}

	let value: Value = serde_json::from_str(raw).map_err(DecodeError::BadJson)?;

	let kind = match value.get("type") {
		Some(Value::String(s)) => s.as_str(),
		Some(other) => return Err(DecodeError::InvalidType(other.to_string())),
		None => return Err(DecodeError::InvalidType("<missing>".to_string())),
	};
	if !ClientMessage::KINDS.contains(&kind) {
		return Err(DecodeError::InvalidType(kind.to_string()));
	}

	serde_json::from_value(value).map_err(DecodeError::BadJson)
}

/// Decode with [`DEFAULT_MAX_MESSAGE_SIZE`].
pub fn decode_client_message_default(raw: &str) -> Result<ClientMessage, DecodeError> {
	decode_client_message(raw, DEFAULT_MAX_MESSAGE_SIZE)
}

/// Encode a server message as JSON text.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, serde_json::Error> {
	serde_json::to_string(msg)
}

/// Encode a client message as JSON text (used by test clients and tooling).
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, serde_json::Error> {
	serde_json::to_string(msg)
}
