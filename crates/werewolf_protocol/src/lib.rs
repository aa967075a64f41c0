#![forbid(unsafe_code)]

pub mod codec;
pub mod messages;
pub mod text;

pub use codec::{
	DEFAULT_MAX_MESSAGE_SIZE, DecodeError, decode_client_message, decode_client_message_default, encode_client_message,
	encode_server_message,
};
pub use messages::{ClientMessage, ServerMessage};
pub use text::{MAX_CHAT_CHARS, TextError, normalize_chat_text};
