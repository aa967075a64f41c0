#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use werewolf_domain::{GameId, Phase, PlayerId, Role, Winner};

use crate::RuleError;
use crate::state::{GameState, Player};

/// Fields every viewer may see about every player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPlayerView {
	pub player_id: PlayerId,
	pub name: String,
	pub alive: bool,
	pub connected: bool,
	pub is_host: bool,
}

/// The viewer's own entry, including their role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfPlayerView {
	#[serde(flatten)]
	pub player: PublicPlayerView,
	pub role: Option<Role>,
}

/// Per-viewer projection of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
	pub game_id: GameId,
	pub phase: Phase,
	pub day_number: u32,
	pub night_number: u32,
	pub accused_id: Option<PlayerId>,
	pub last_killed_id: Option<PlayerId>,
	pub phase_ends_at: i64,
	pub winner: Option<Winner>,
	pub players: Vec<PublicPlayerView>,
	pub you: SelfPlayerView,
}

impl From<&Player> for PublicPlayerView {
	fn from(p: &Player) -> Self {
		Self {
			player_id: p.player_id.clone(),
			name: p.name.clone(),
			alive: p.alive,
			connected: p.connected,
			is_host: p.is_host,
		}
	}
}

/// Redact `state` for `viewer_id`: roles are stripped from everyone but the viewer.
///
/// Must be rebuilt per recipient; a view is never valid for anyone else.
pub fn build_game_view(state: &GameState, viewer_id: &PlayerId) -> Result<GameView, RuleError> {
	let viewer = state.player(viewer_id).ok_or(RuleError::PlayerNotFound)?;

	Ok(GameView {
		game_id: state.game_id.clone(),
		phase: state.phase,
		day_number: state.day_number,
		night_number: state.night_number,
		accused_id: state.accused_id.clone(),
		last_killed_id: state.last_killed_id.clone(),
		phase_ends_at: state.phase_ends_at,
		winner: state.winner,
		players: state.players.iter().map(PublicPlayerView::from).collect(),
		you: SelfPlayerView {
			player: PublicPlayerView::from(viewer),
			role: viewer.role,
		},
	})
}
