#![forbid(unsafe_code)]

use thiserror::Error;
use werewolf_domain::{ChatChannel, Phase, PlayerId};
use werewolf_engine::{GameState, Player};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
	#[error("use TRIAL_CHAT during the trial")]
	UseTrialChat,

	#[error("only the accused may chat during the trial")]
	NotAccused,

	#[error("{0}")]
	NotAllowed(&'static str),
}

impl ChatError {
	pub const fn code(&self) -> &'static str {
		"INVALID_CHAT"
	}
}

/// Who receives a routed chat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
	Room,
	AliveTraitors,
}

impl Audience {
	/// Checked per recipient at delivery time against the current player record.
	pub fn admits(self, player: &Player) -> bool {
		match self {
			Audience::Room => true,
			Audience::AliveTraitors => player.is_alive_traitor(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatRoute {
	pub channel: ChatChannel,
	pub audience: Audience,
}

/// Derive the channel and audience for a generic CHAT from the phase and the sender.
pub fn resolve_chat_route(state: &GameState, sender: &Player) -> Result<ChatRoute, ChatError> {
	let route = |channel: ChatChannel, audience: Audience| -> Result<ChatRoute, ChatError> {
		Ok(ChatRoute { channel, audience })
	};

	match state.phase {
		Phase::Lobby if sender.connected => route(ChatChannel::Lobby, Audience::Room),
		Phase::Lobby => Err(ChatError::NotAllowed("disconnected players cannot chat")),
		Phase::DayDiscussion | Phase::DayVerdict if sender.alive => route(ChatChannel::Day, Audience::Room),
		Phase::DayDiscussion | Phase::DayVerdict => Err(ChatError::NotAllowed("the dead cannot speak")),
		Phase::Night if sender.is_alive_traitor() => route(ChatChannel::NightTraitors, Audience::AliveTraitors),
		Phase::Night => Err(ChatError::NotAllowed("only living traitors may chat at night")),
		Phase::Trial => Err(ChatError::UseTrialChat),
		Phase::GameOver => route(ChatChannel::GameOver, Audience::Room),
	}
}

/// TRIAL_CHAT is open only to the accused, only during TRIAL.
pub fn authorize_trial_chat(state: &GameState, sender_id: &PlayerId) -> Result<(), ChatError> {
	if state.phase != Phase::Trial || state.accused_id.as_ref() != Some(sender_id) {
		return Err(ChatError::NotAccused);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use werewolf_domain::{AccountId, GameId, Role};
	use werewolf_engine::{GameOptions, OptionOverrides, PlayerIdentity, add_player_to_lobby, create_initial_game};

	use super::*;

	fn pid(s: &str) -> PlayerId {
		PlayerId::new(s).unwrap()
	}

	fn game(phase: Phase) -> GameState {
		let ident = |id: &str| PlayerIdentity {
			account_id: AccountId::new(format!("acct-{id}")).unwrap(),
			player_id: pid(id),
			name: id.to_string(),
		};
		let mut s = create_initial_game(
			GameId::new("g").unwrap(),
			ident("t"),
			&GameOptions::default(),
			&OptionOverrides::default(),
		)
		.unwrap();
		for id in ["a", "b", "dead"] {
			s = add_player_to_lobby(&s, ident(id)).unwrap();
		}
		if phase != Phase::Lobby {
			for p in s.players.iter_mut() {
				p.role = Some(if p.player_id.as_str() == "t" { Role::Traitor } else { Role::Subject });
				p.alive = p.player_id.as_str() != "dead";
			}
		}
		s.phase = phase;
		s
	}

	fn sender<'a>(s: &'a GameState, id: &str) -> &'a Player {
		s.player(&pid(id)).unwrap()
	}

	#[test]
	fn lobby_is_open_to_connected_players() {
		let mut s = game(Phase::Lobby);
		let r = resolve_chat_route(&s, sender(&s, "a")).unwrap();
		assert_eq!(r.channel, ChatChannel::Lobby);
		assert_eq!(r.audience, Audience::Room);

		s.players[1].connected = false;
		assert!(matches!(resolve_chat_route(&s, &s.players[1]), Err(ChatError::NotAllowed(_))));
	}

	#[test]
	fn day_requires_alive_sender() {
		for phase in [Phase::DayDiscussion, Phase::DayVerdict] {
			let s = game(phase);
			assert_eq!(resolve_chat_route(&s, sender(&s, "a")).unwrap().channel, ChatChannel::Day);
			assert!(resolve_chat_route(&s, sender(&s, "dead")).is_err());
		}
	}

	#[test]
	fn night_is_traitors_only() {
		let s = game(Phase::Night);
		let r = resolve_chat_route(&s, sender(&s, "t")).unwrap();
		assert_eq!(r.channel, ChatChannel::NightTraitors);
		assert_eq!(r.audience, Audience::AliveTraitors);
		assert!(resolve_chat_route(&s, sender(&s, "a")).is_err());

		assert!(r.audience.admits(sender(&s, "t")));
		assert!(!r.audience.admits(sender(&s, "a")));
	}

	#[test]
	fn trial_redirects_to_trial_chat() {
		let mut s = game(Phase::Trial);
		assert_eq!(resolve_chat_route(&s, sender(&s, "a")), Err(ChatError::UseTrialChat));

		s.accused_id = Some(pid("a"));
		assert!(authorize_trial_chat(&s, &pid("a")).is_ok());
		assert_eq!(authorize_trial_chat(&s, &pid("b")), Err(ChatError::NotAccused));

		s.phase = Phase::DayVerdict;
		assert_eq!(authorize_trial_chat(&s, &pid("a")), Err(ChatError::NotAccused));
	}

	#[test]
	fn game_over_is_open_to_everyone() {
		let s = game(Phase::GameOver);
		let r = resolve_chat_route(&s, sender(&s, "dead")).unwrap();
		assert_eq!(r.channel, ChatChannel::GameOver);
		assert!(r.audience.admits(sender(&s, "dead")));
	}

	#[test]
	fn dead_traitor_leaves_the_night_audience() {
		let mut s = game(Phase::Night);
		let route = resolve_chat_route(&s, sender(&s, "t")).unwrap();
		s.players[0].alive = false;
		assert!(!route.audience.admits(&s.players[0]));
		assert_eq!(ChatError::UseTrialChat.code(), "INVALID_CHAT");
	}
}
