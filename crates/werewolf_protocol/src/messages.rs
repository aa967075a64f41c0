#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use werewolf_domain::{AccountId, ChatChannel, GameId, PlayerId, VerdictChoice};
use werewolf_engine::GameView;

/// Commands a client may send.
///
/// The server checks every `gameId`/`playerId` against the identity bound to the
/// connection; a client can never act for someone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
	tag = "type",
	content = "payload",
	rename_all = "SCREAMING_SNAKE_CASE",
	rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
	/// Create a fresh lobby with the sender as host.
	CreateGame {
		account_id: AccountId,
		name: String,
		#[serde(default)]
		min_players: Option<i64>,
	},
	/// Join an existing lobby.
	JoinGame {
		game_id: GameId,
		account_id: AccountId,
		name: String,
	},
	StartGame {
		game_id: GameId,
		player_id: PlayerId,
	},
	/// Leave the lobby, or mark yourself disconnected once the match is running.
	LeaveGame {
		game_id: GameId,
		player_id: PlayerId,
	},
	NightVote {
		game_id: GameId,
		player_id: PlayerId,
		target_id: PlayerId,
	},
	DayNominate {
		game_id: GameId,
		player_id: PlayerId,
		target_id: PlayerId,
	},
	/// Accused-only speech during TRIAL.
	TrialChat {
		game_id: GameId,
		player_id: PlayerId,
		text: String,
	},
	/// Phase-routed chat; the channel is derived server-side.
	Chat {
		game_id: GameId,
		player_id: PlayerId,
		text: String,
	},
	DayVerdictVote {
		game_id: GameId,
		player_id: PlayerId,
		choice: VerdictChoice,
	},
	/// Debug only: fill the lobby with bots.
	DebugPopulateLobby {
		game_id: GameId,
		player_id: PlayerId,
		#[serde(default)]
		total_players: Option<u32>,
	},
	/// Debug only: fire the current phase's timeout now.
	DebugForceTimeout {
		game_id: GameId,
		player_id: PlayerId,
	},
}

impl ClientMessage {
	/// Every accepted `type` tag.
	pub const KINDS: &'static [&'static str] = &[
		"CREATE_GAME",
		"JOIN_GAME",
		"START_GAME",
		"LEAVE_GAME",
		"NIGHT_VOTE",
		"DAY_NOMINATE",
		"TRIAL_CHAT",
		"CHAT",
		"DAY_VERDICT_VOTE",
		"DEBUG_POPULATE_LOBBY",
		"DEBUG_FORCE_TIMEOUT",
	];

	/// Wire `type` tag of this message.
	pub const fn kind(&self) -> &'static str {
		match self {
			ClientMessage::CreateGame { .. } => "CREATE_GAME",
			ClientMessage::JoinGame { .. } => "JOIN_GAME",
			ClientMessage::StartGame { .. } => "START_GAME",
			ClientMessage::LeaveGame { .. } => "LEAVE_GAME",
			ClientMessage::NightVote { .. } => "NIGHT_VOTE",
			ClientMessage::DayNominate { .. } => "DAY_NOMINATE",
			ClientMessage::TrialChat { .. } => "TRIAL_CHAT",
			ClientMessage::Chat { .. } => "CHAT",
			ClientMessage::DayVerdictVote { .. } => "DAY_VERDICT_VOTE",
			ClientMessage::DebugPopulateLobby { .. } => "DEBUG_POPULATE_LOBBY",
			ClientMessage::DebugForceTimeout { .. } => "DEBUG_FORCE_TIMEOUT",
		}
	}

	/// `(gameId, playerId)` the message claims to act as, for bound-identity commands.
	pub fn acting_as(&self) -> Option<(&GameId, &PlayerId)> {
		match self {
			ClientMessage::CreateGame { .. } | ClientMessage::JoinGame { .. } => None,
			ClientMessage::StartGame { game_id, player_id }
			| ClientMessage::LeaveGame { game_id, player_id }
			| ClientMessage::NightVote { game_id, player_id, .. }
			| ClientMessage::DayNominate { game_id, player_id, .. }
			| ClientMessage::TrialChat { game_id, player_id, .. }
			| ClientMessage::Chat { game_id, player_id, .. }
			| ClientMessage::DayVerdictVote { game_id, player_id, .. }
			| ClientMessage::DebugPopulateLobby { game_id, player_id, .. }
			| ClientMessage::DebugForceTimeout { game_id, player_id } => Some((game_id, player_id)),
		}
	}
}

/// Messages the server emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
	tag = "type",
	content = "payload",
	rename_all = "SCREAMING_SNAKE_CASE",
	rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
	Error {
		code: String,
		message: String,
	},
	GameCreated {
		game: Box<GameView>,
		player_id: PlayerId,
	},
	PlayerJoined {
		game: Box<GameView>,
		player_id: PlayerId,
	},
	/// Redacted snapshot for the receiving viewer.
	GameState {
		game: Box<GameView>,
	},
	Chat {
		game_id: GameId,
		player_id: PlayerId,
		text: String,
		channel: ChatChannel,
		timestamp: i64,
	},
	TrialChat {
		game_id: GameId,
		player_id: PlayerId,
		text: String,
		timestamp: i64,
	},
}

impl ServerMessage {
	pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
		ServerMessage::Error {
			code: code.into(),
			message: message.into(),
		}
	}

	pub const fn kind(&self) -> &'static str {
		match self {
			ServerMessage::Error { .. } => "ERROR",
			ServerMessage::GameCreated { .. } => "GAME_CREATED",
			ServerMessage::PlayerJoined { .. } => "PLAYER_JOINED",
			ServerMessage::GameState { .. } => "GAME_STATE",
			ServerMessage::Chat { .. } => "CHAT",
			ServerMessage::TrialChat { .. } => "TRIAL_CHAT",
		}
	}
}
