#![forbid(unsafe_code)]

use std::time::Duration;

use werewolf_domain::{AccountId, GameId, Phase, PlayerId, Role, VerdictChoice, Winner};

use crate::ballots::Ballots;

/// Default minimum roster size to start a match.
pub const DEFAULT_MIN_PLAYERS: u32 = 4;

/// Largest roster a game may be configured for or filled to.
pub const MAX_PLAYERS: u32 = 64;

/// Time allowed in each timed phase before it auto-resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDurations {
	pub night: Duration,
	pub day_discussion: Duration,
	pub trial: Duration,
	pub day_verdict: Duration,
}

impl Default for PhaseDurations {
	fn default() -> Self {
		Self {
			night: Duration::from_secs(60),
			day_discussion: Duration::from_secs(120),
			trial: Duration::from_secs(30),
			day_verdict: Duration::from_secs(30),
		}
	}
}

impl PhaseDurations {
	/// Duration of `phase`, or `None` for untimed phases.
	pub fn for_phase(&self, phase: Phase) -> Option<Duration> {
		match phase {
			Phase::Night => Some(self.night),
			Phase::DayDiscussion => Some(self.day_discussion),
			Phase::Trial => Some(self.trial),
			Phase::DayVerdict => Some(self.day_verdict),
			Phase::Lobby | Phase::GameOver => None,
		}
	}

	/// Absolute deadline (unix ms) for entering `phase` at `now`; 0 for untimed phases.
	pub fn deadline(&self, phase: Phase, now: i64) -> i64 {
		match self.for_phase(phase) {
			Some(d) => now.saturating_add(i64::try_from(d.as_millis()).unwrap_or(i64::MAX)),
			None => 0,
		}
	}
}

/// Per-game options. Fixed at creation, except for the debug roster relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOptions {
	pub min_players: u32,
	pub durations: PhaseDurations,
}

impl Default for GameOptions {
	fn default() -> Self {
		Self {
			min_players: DEFAULT_MIN_PLAYERS,
			durations: PhaseDurations::default(),
		}
	}
}

/// Client-supplied overrides applied on top of server defaults at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionOverrides {
	pub min_players: Option<i64>,
}

/// Who is joining: caller-supplied account plus server-assigned player id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
	pub account_id: AccountId,
	pub player_id: PlayerId,
	pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
	pub player_id: PlayerId,
	pub account_id: AccountId,
	pub name: String,
	/// Unset until the match starts.
	pub role: Option<Role>,
	pub alive: bool,
	pub connected: bool,
	pub is_host: bool,
}

impl Player {
	pub(crate) fn from_identity(identity: PlayerIdentity, is_host: bool) -> Self {
		Self {
			player_id: identity.player_id,
			account_id: identity.account_id,
			name: identity.name,
			role: None,
			alive: true,
			connected: true,
			is_host,
		}
	}

	pub fn is_alive_traitor(&self) -> bool {
		self.alive && self.role == Some(Role::Traitor)
	}
}

/// Authoritative state of one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
	pub game_id: GameId,
	pub phase: Phase,
	pub day_number: u32,
	pub night_number: u32,
	/// Join order.
	pub players: Vec<Player>,
	/// Set only during TRIAL and DAY_VERDICT.
	pub accused_id: Option<PlayerId>,
	pub last_killed_id: Option<PlayerId>,
	/// Unix ms; meaningless in LOBBY and GAME_OVER.
	pub phase_ends_at: i64,
	pub winner: Option<Winner>,
	pub options: GameOptions,

	pub night_votes: Ballots<PlayerId>,
	pub nominations: Ballots<PlayerId>,
	pub verdict_votes: Ballots<VerdictChoice>,
}

impl GameState {
	pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
		self.players.iter().find(|p| p.player_id == *player_id)
	}

	pub(crate) fn player_mut(&mut self, player_id: &PlayerId) -> Option<&mut Player> {
		self.players.iter_mut().find(|p| p.player_id == *player_id)
	}

	pub fn host(&self) -> Option<&Player> {
		self.players.iter().find(|p| p.is_host)
	}

	pub fn is_host(&self, player_id: &PlayerId) -> bool {
		self.host().is_some_and(|h| h.player_id == *player_id)
	}

	pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
		self.players.iter().filter(|p| p.alive)
	}

	pub fn alive_count(&self) -> usize {
		self.alive_players().count()
	}

	pub fn alive_traitor_count(&self) -> usize {
		self.players.iter().filter(|p| p.is_alive_traitor()).count()
	}

	pub fn alive_subject_count(&self) -> usize {
		self.players
			.iter()
			.filter(|p| p.alive && p.role == Some(Role::Subject))
			.count()
	}

	/// Alive players allowed to vote on the current accused.
	pub fn verdict_voters(&self) -> impl Iterator<Item = &Player> {
		self.alive_players()
			.filter(move |p| self.accused_id.as_ref() != Some(&p.player_id))
	}

	/// A lobby whose last player left; the owner should evict it.
	pub fn is_abandoned(&self) -> bool {
		self.players.is_empty()
	}

	pub(crate) fn clear_ballots(&mut self) {
		self.night_votes.clear();
		self.nominations.clear();
		self.verdict_votes.clear();
	}
}
