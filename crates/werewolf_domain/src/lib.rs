#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for parsing identifiers and enum names from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("unknown phase: {0}")]
	UnknownPhase(String),
	#[error("unknown verdict choice: {0}")]
	UnknownVerdict(String),
}

macro_rules! string_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);

		impl $name {
			/// Create a non-empty identifier.
			pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
				let id = id.into();
				if id.trim().is_empty() {
					return Err(ParseIdError::Empty);
				}
				Ok(Self(id))
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}

			pub fn into_string(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl FromStr for $name {
			type Err = ParseIdError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s.to_string())
			}
		}

		impl TryFrom<String> for $name {
			type Error = ParseIdError;

			fn try_from(s: String) -> Result<Self, Self::Error> {
				Self::new(s)
			}
		}

		impl From<$name> for String {
			fn from(id: $name) -> String {
				id.0
			}
		}
	};
}

string_id!(
	/// Globally unique game identifier.
	GameId
);

string_id!(
	/// Player identifier, unique within one game.
	PlayerId
);

string_id!(
	/// Stable per-human identity supplied by the client; never generated server-side.
	AccountId
);

impl GameId {
	/// Create a new random game id.
	pub fn new_v4() -> Self {
		Self(uuid::Uuid::new_v4().to_string())
	}
}

impl PlayerId {
	/// Create a new random player id.
	pub fn new_v4() -> Self {
		Self(uuid::Uuid::new_v4().to_string())
	}
}

/// Match phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
	Lobby,
	Night,
	DayDiscussion,
	Trial,
	DayVerdict,
	GameOver,
}

impl Phase {
	/// Stable wire identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			Phase::Lobby => "LOBBY",
			Phase::Night => "NIGHT",
			Phase::DayDiscussion => "DAY_DISCUSSION",
			Phase::Trial => "TRIAL",
			Phase::DayVerdict => "DAY_VERDICT",
			Phase::GameOver => "GAME_OVER",
		}
	}

	/// Whether the phase carries a deadline (everything except LOBBY and GAME_OVER).
	pub const fn is_timed(self) -> bool {
		!matches!(self, Phase::Lobby | Phase::GameOver)
	}

	/// Whether `next` is a legal successor of `self`.
	pub const fn can_transition_to(self, next: Phase) -> bool {
		matches!(
			(self, next),
			(Phase::Lobby, Phase::Night)
				| (Phase::Night, Phase::DayDiscussion)
				| (Phase::Night, Phase::GameOver)
				| (Phase::DayDiscussion, Phase::Trial)
				| (Phase::DayDiscussion, Phase::Night)
				| (Phase::Trial, Phase::DayVerdict)
				| (Phase::DayVerdict, Phase::Night)
				| (Phase::DayVerdict, Phase::GameOver)
		)
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Phase {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}

		match s.to_ascii_uppercase().as_str() {
			"LOBBY" => Ok(Phase::Lobby),
			"NIGHT" => Ok(Phase::Night),
			"DAY_DISCUSSION" => Ok(Phase::DayDiscussion),
			"TRIAL" => Ok(Phase::Trial),
			"DAY_VERDICT" => Ok(Phase::DayVerdict),
			"GAME_OVER" => Ok(Phase::GameOver),
			other => Err(ParseIdError::UnknownPhase(other.to_string())),
		}
	}
}

/// Hidden role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
	Subject,
	Traitor,
}

impl Role {
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::Subject => "SUBJECT",
			Role::Traitor => "TRAITOR",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Winning side, set once the match is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Winner {
	Traitors,
	Subjects,
}

impl Winner {
	pub const fn as_str(self) -> &'static str {
		match self {
			Winner::Traitors => "TRAITORS",
			Winner::Subjects => "SUBJECTS",
		}
	}
}

impl fmt::Display for Winner {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Day verdict ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictChoice {
	Hang,
	Spare,
}

impl VerdictChoice {
	pub const fn as_str(self) -> &'static str {
		match self {
			VerdictChoice::Hang => "HANG",
			VerdictChoice::Spare => "SPARE",
		}
	}
}

impl fmt::Display for VerdictChoice {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for VerdictChoice {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}

		match s.to_ascii_uppercase().as_str() {
			"HANG" => Ok(VerdictChoice::Hang),
			"SPARE" => Ok(VerdictChoice::Spare),
			other => Err(ParseIdError::UnknownVerdict(other.to_string())),
		}
	}
}

/// Rendered chat streams.
///
/// `Trial` is never produced by generic chat routing; trial speech travels as a
/// dedicated message. It is listed so clients can render a consistent set of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatChannel {
	Lobby,
	Day,
	NightTraitors,
	Trial,
	GameOver,
}

impl ChatChannel {
	pub const fn as_str(self) -> &'static str {
		match self {
			ChatChannel::Lobby => "LOBBY",
			ChatChannel::Day => "DAY",
			ChatChannel::NightTraitors => "NIGHT_TRAITORS",
			ChatChannel::Trial => "TRIAL",
			ChatChannel::GameOver => "GAME_OVER",
		}
	}
}

impl fmt::Display for ChatChannel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
