#![forbid(unsafe_code)]

use thiserror::Error;

/// Longest chat message accepted, in characters after trimming.
pub const MAX_CHAT_CHARS: usize = 300;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("chat must be 1-{MAX_CHAT_CHARS} characters, got {len}")]
pub struct TextError {
	pub len: usize,
}

impl TextError {
	pub const fn code(&self) -> &'static str {
		"BAD_TEXT"
	}
}

/// Trim `text` and check it is non-empty and at most [`MAX_CHAT_CHARS`].
pub fn normalize_chat_text(text: &str) -> Result<String, TextError> {
	let trimmed = text.trim();
	let len = trimmed.chars().count();
	if len == 0 || len > MAX_CHAT_CHARS {
		return Err(TextError { len });
	}
	Ok(trimmed.to_string())
}
