#![forbid(unsafe_code)]

use std::collections::HashSet;

use werewolf_domain::{AccountId, Phase, PlayerId};

use crate::RuleError;
use crate::state::{GameState, MAX_PLAYERS, Player, PlayerIdentity};

/// Fill the lobby with synthetic players up to `total_players` (default: `minPlayers`).
///
/// The target may not exceed [`MAX_PLAYERS`]. Lowers `minPlayers` to the resulting
/// roster size when needed so the host can start right away.
pub fn populate_lobby_with_bots(state: &GameState, total_players: Option<u32>) -> Result<GameState, RuleError> {
	if state.phase != Phase::Lobby {
		return Err(RuleError::InvalidDebug(
			"can only populate the lobby before the game starts".to_string(),
		));
	}

	let target = total_players.unwrap_or(state.options.min_players);
	if target > MAX_PLAYERS {
		return Err(RuleError::InvalidDebug(format!(
			"cannot populate more than {MAX_PLAYERS} players, asked for {target}"
		)));
	}
	let target = target as usize;

	let taken_players: HashSet<&str> = state.players.iter().map(|p| p.player_id.as_str()).collect();
	let taken_accounts: HashSet<&str> = state.players.iter().map(|p| p.account_id.as_str()).collect();

	let mut bots = Vec::with_capacity(target.saturating_sub(state.players.len()));
	let mut index = state.players.len() + 1;
	while state.players.len() + bots.len() < target {
		let n = index;
		index += 1;
		let player_id = format!("bot-{n}");
		let account_id = format!("debug-bot-{player_id}");
		if taken_players.contains(player_id.as_str()) || taken_accounts.contains(account_id.as_str()) {
			continue;
		}

		let identity = PlayerIdentity {
			account_id: AccountId::new(account_id).map_err(|e| RuleError::InvalidDebug(e.to_string()))?,
			player_id: PlayerId::new(player_id).map_err(|e| RuleError::InvalidDebug(e.to_string()))?,
			name: format!("Bot {n}"),
		};
		bots.push(Player::from_identity(identity, false));
	}
	let mut next = state.clone();
	next.players.extend(bots);

	let roster = u32::try_from(next.players.len()).unwrap_or(u32::MAX);
	if next.options.min_players > roster {
		next.options.min_players = roster;
	}

	Ok(next)
}

#[cfg(test)]
mod tests {
	use werewolf_domain::GameId;

	use super::*;
	use crate::state::{GameOptions, OptionOverrides};
	use crate::transitions::{create_initial_game, remove_player_from_lobby, start_game};

	fn host_lobby(min_players: i64) -> GameState {
		create_initial_game(
			GameId::new("g").unwrap(),
			PlayerIdentity {
				account_id: AccountId::new("acct-h").unwrap(),
				player_id: PlayerId::new("h").unwrap(),
				name: "Host".to_string(),
			},
			&GameOptions::default(),
			&OptionOverrides {
				min_players: Some(min_players),
			},
		)
		.unwrap()
	}

	#[test]
	fn fills_to_min_players_by_default() {
		let state = populate_lobby_with_bots(&host_lobby(5), None).unwrap();
		assert_eq!(state.players.len(), 5);
		assert_eq!(state.players[1].player_id.as_str(), "bot-2");
		assert_eq!(state.players[1].name, "Bot 2");
		assert_eq!(state.players[1].account_id.as_str(), "debug-bot-bot-2");
		assert!(!state.players[1].is_host);
	}

	#[test]
	fn lowers_min_players_to_roster() {
		let state = populate_lobby_with_bots(&host_lobby(8), Some(3)).unwrap();
		assert_eq!(state.players.len(), 3);
		assert_eq!(state.options.min_players, 3);
		assert!(start_game(&state, &PlayerId::new("h").unwrap(), 0).is_ok());
	}

	#[test]
	fn skips_bot_ids_already_taken() {
		let state = populate_lobby_with_bots(&host_lobby(4), Some(3)).unwrap();
		let state = remove_player_from_lobby(&state, &PlayerId::new("bot-2").unwrap()).unwrap();
		// Roster is [h, bot-3]; the next free id at or above 3 is bot-4.
		let state = populate_lobby_with_bots(&state, Some(3)).unwrap();
		let ids: Vec<_> = state.players.iter().map(|p| p.player_id.as_str().to_string()).collect();
		assert_eq!(ids, vec!["h", "bot-3", "bot-4"]);
	}

	#[test]
	fn roster_is_capped() {
		let lobby = host_lobby(4);
		for asked in [MAX_PLAYERS + 1, u32::MAX] {
			let err = populate_lobby_with_bots(&lobby, Some(asked)).unwrap_err();
			assert_eq!(err.code(), "INVALID_DEBUG");
		}

		let full = populate_lobby_with_bots(&host_lobby(i64::from(MAX_PLAYERS)), None).unwrap();
		assert_eq!(full.players.len(), MAX_PLAYERS as usize);
		assert_eq!(full.players.last().unwrap().player_id.as_str(), format!("bot-{MAX_PLAYERS}"));
	}

	#[test]
	fn skips_account_ids_already_taken() {
		let lobby = host_lobby(3);
		let lobby = crate::transitions::add_player_to_lobby(
			&lobby,
			PlayerIdentity {
				account_id: AccountId::new("debug-bot-bot-3").unwrap(),
				player_id: PlayerId::new("guest").unwrap(),
				name: "Guest".to_string(),
			},
		)
		.unwrap();
		let state = populate_lobby_with_bots(&lobby, None).unwrap();
		let ids: Vec<_> = state.players.iter().map(|p| p.player_id.as_str().to_string()).collect();
		assert_eq!(ids, vec!["h", "guest", "bot-4"]);
	}

	#[test]
	fn rejected_outside_lobby() {
		let mut state = host_lobby(1);
		state.phase = Phase::Night;
		assert_eq!(populate_lobby_with_bots(&state, None).unwrap_err().code(), "INVALID_DEBUG");
	}
}
