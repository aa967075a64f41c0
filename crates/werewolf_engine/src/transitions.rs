#![forbid(unsafe_code)]

//! Phase state machine.
//!
//! Every transition takes the current state by reference and returns a new state, or
//! a [`RuleError`] leaving the input untouched. Nothing here performs I/O or reads a
//! clock: `now` is always supplied by the caller (unix ms).

use rand::Rng;
use rand::seq::SliceRandom;
use werewolf_domain::{GameId, Phase, PlayerId, Role, VerdictChoice, Winner};

use crate::RuleError;
use crate::state::{GameOptions, GameState, MAX_PLAYERS, OptionOverrides, Player, PlayerIdentity};

/// Signature shared by all timeout-driven transitions.
pub type TimeoutTransition = fn(&GameState, i64) -> Result<GameState, RuleError>;

/// Build a fresh LOBBY with `host` as its only player.
pub fn create_initial_game(
	game_id: GameId,
	host: PlayerIdentity,
	defaults: &GameOptions,
	overrides: &OptionOverrides,
) -> Result<GameState, RuleError> {
	let mut options = *defaults;
	if let Some(min_players) = overrides.min_players {
		if !(1..=i64::from(MAX_PLAYERS)).contains(&min_players) {
			return Err(RuleError::InvalidOptions(format!(
				"minPlayers must be between 1 and {MAX_PLAYERS}, got {min_players}"
			)));
		}
		options.min_players = u32::try_from(min_players)
			.map_err(|_| RuleError::InvalidOptions(format!("minPlayers out of range: {min_players}")))?;
	}

	Ok(GameState {
		game_id,
		phase: Phase::Lobby,
		day_number: 0,
		night_number: 0,
		players: vec![Player::from_identity(host, true)],
		accused_id: None,
		last_killed_id: None,
		phase_ends_at: 0,
		winner: None,
		options,
		night_votes: Default::default(),
		nominations: Default::default(),
		verdict_votes: Default::default(),
	})
}

/// Append a non-host player to the lobby.
pub fn add_player_to_lobby(state: &GameState, identity: PlayerIdentity) -> Result<GameState, RuleError> {
	require_phase(state, Phase::Lobby)?;

	if state
		.players
		.iter()
		.any(|p| p.account_id == identity.account_id || p.player_id == identity.player_id)
	{
		return Err(RuleError::DuplicatePlayer);
	}

	let mut next = state.clone();
	next.players.push(Player::from_identity(identity, false));
	Ok(next)
}

/// Remove a player before the match starts; host passes to the earliest remaining joiner.
///
/// Removing the last player yields an abandoned lobby (see [`GameState::is_abandoned`]).
pub fn remove_player_from_lobby(state: &GameState, player_id: &PlayerId) -> Result<GameState, RuleError> {
	require_phase(state, Phase::Lobby)?;

	let idx = state
		.players
		.iter()
		.position(|p| p.player_id == *player_id)
		.ok_or(RuleError::PlayerNotFound)?;

	let mut next = state.clone();
	let removed = next.players.remove(idx);
	if removed.is_host
		&& let Some(heir) = next.players.first_mut()
	{
		heir.is_host = true;
	}
	Ok(next)
}

/// Flip a player's connection flag. Unknown players leave the state unchanged.
pub fn set_player_connection(state: &GameState, player_id: &PlayerId, connected: bool) -> GameState {
	let mut next = state.clone();
	if let Some(player) = next.player_mut(player_id) {
		player.connected = connected;
	}
	next
}

/// Number of traitors for a roster of `players`.
pub fn traitor_count(players: usize) -> usize {
	(players / 4).max(1)
}

/// Host starts the match: assign roles and enter the first NIGHT.
pub fn start_game(state: &GameState, caller: &PlayerId, now: i64) -> Result<GameState, RuleError> {
	start_game_with_rng(state, caller, now, &mut rand::rng())
}

/// [`start_game`] with an explicit RNG for the role shuffle.
pub fn start_game_with_rng<R: Rng + ?Sized>(
	state: &GameState,
	caller: &PlayerId,
	now: i64,
	rng: &mut R,
) -> Result<GameState, RuleError> {
	require_phase(state, Phase::Lobby)?;
	if !state.is_host(caller) {
		return Err(RuleError::NotHost);
	}

	let present = state.players.len();
	if present < state.options.min_players as usize {
		return Err(RuleError::NotEnoughPlayers {
			required: state.options.min_players,
			present,
		});
	}

	let mut order: Vec<usize> = (0..present).collect();
	order.shuffle(rng);
	let traitors = traitor_count(present);

	let mut next = state.clone();
	for p in next.players.iter_mut() {
		p.role = Some(Role::Subject);
		p.alive = true;
	}
	for &idx in order.iter().take(traitors) {
		next.players[idx].role = Some(Role::Traitor);
	}

	next.night_number = 1;
	next.last_killed_id = None;
	next.winner = None;
	enter_phase(&mut next, Phase::Night, now);
	Ok(next)
}

/// Record (or replace) an alive traitor's kill vote.
pub fn record_night_vote(state: &GameState, voter_id: &PlayerId, target_id: &PlayerId) -> Result<GameState, RuleError> {
	require_phase(state, Phase::Night)?;

	let voter = state.player(voter_id).ok_or(RuleError::PlayerNotFound)?;
	if !voter.is_alive_traitor() {
		return Err(RuleError::NotEligible("only living traitors may vote at night"));
	}
	require_alive_target(state, voter_id, target_id)?;

	let mut next = state.clone();
	next.night_votes.cast(voter_id.clone(), target_id.clone());
	Ok(next)
}

/// True once every alive traitor has a ballot (vacuously true with none alive).
pub fn are_night_votes_complete(state: &GameState) -> bool {
	state
		.players
		.iter()
		.filter(|p| p.is_alive_traitor())
		.all(|p| state.night_votes.contains(&p.player_id))
}

/// Apply the night kill by plurality and move to DAY_DISCUSSION or GAME_OVER.
pub fn resolve_night(state: &GameState, now: i64) -> Result<GameState, RuleError> {
	require_phase(state, Phase::Night)?;

	let mut next = state.clone();
	if let Some(victim) = state.night_votes.plurality()
		&& let Some(player) = next.player_mut(&victim)
	{
		player.alive = false;
		next.last_killed_id = Some(victim);
	}

	match evaluate_winner(&next) {
		Some(winner) => finish(&mut next, winner),
		None => {
			next.day_number += 1;
			enter_phase(&mut next, Phase::DayDiscussion, now);
		}
	}
	Ok(next)
}

/// Record (or replace) a nomination; a majority for one target opens the TRIAL at once.
pub fn record_nomination(
	state: &GameState,
	nominator_id: &PlayerId,
	target_id: &PlayerId,
	now: i64,
) -> Result<GameState, RuleError> {
	require_phase(state, Phase::DayDiscussion)?;

	let nominator = state.player(nominator_id).ok_or(RuleError::PlayerNotFound)?;
	if !nominator.alive {
		return Err(RuleError::NotEligible("only living players may nominate"));
	}
	require_alive_target(state, nominator_id, target_id)?;

	let mut next = state.clone();
	next.nominations.cast(nominator_id.clone(), target_id.clone());

	let majority = majority_of(next.alive_count());
	if next.nominations.count_for(target_id) >= majority {
		next.accused_id = Some(target_id.clone());
		enter_phase(&mut next, Phase::Trial, now);
	}
	Ok(next)
}

/// Day ran out without a majority: straight to the next NIGHT, nobody dies.
pub fn skip_day_to_night(state: &GameState, now: i64) -> Result<GameState, RuleError> {
	require_phase(state, Phase::DayDiscussion)?;

	let mut next = state.clone();
	next.night_number += 1;
	enter_phase(&mut next, Phase::Night, now);
	Ok(next)
}

/// Close the accused's defense and open the verdict vote.
pub fn start_day_verdict(state: &GameState, now: i64) -> Result<GameState, RuleError> {
	require_phase(state, Phase::Trial)?;

	let mut next = state.clone();
	enter_phase(&mut next, Phase::DayVerdict, now);
	Ok(next)
}

/// Record (or replace) a verdict ballot from an alive, non-accused player.
pub fn record_verdict_vote(
	state: &GameState,
	voter_id: &PlayerId,
	choice: VerdictChoice,
) -> Result<GameState, RuleError> {
	require_phase(state, Phase::DayVerdict)?;

	let voter = state.player(voter_id).ok_or(RuleError::PlayerNotFound)?;
	if !voter.alive {
		return Err(RuleError::NotEligible("only living players may vote"));
	}
	if state.accused_id.as_ref() == Some(voter_id) {
		return Err(RuleError::NotEligible("the accused cannot vote on their own verdict"));
	}

	let mut next = state.clone();
	next.verdict_votes.cast(voter_id.clone(), choice);
	Ok(next)
}

/// True once every eligible verdict voter has cast a ballot.
pub fn are_all_verdict_votes_in(state: &GameState) -> bool {
	state
		.verdict_voters()
		.all(|p| state.verdict_votes.contains(&p.player_id))
}

/// Hang on a strict majority of eligible voters (absent ballots count as not-hang).
pub fn resolve_day_verdict(state: &GameState, now: i64) -> Result<GameState, RuleError> {
	require_phase(state, Phase::DayVerdict)?;

	let eligible = state.verdict_voters().count();
	let hangs = state
		.verdict_votes
		.iter()
		.filter(|(_, choice)| **choice == VerdictChoice::Hang)
		.count();

	let mut next = state.clone();
	if hangs * 2 > eligible
		&& let Some(accused) = state.accused_id.clone()
		&& let Some(player) = next.player_mut(&accused)
	{
		player.alive = false;
	}
	next.accused_id = None;

	match evaluate_winner(&next) {
		Some(winner) => finish(&mut next, winner),
		None => {
			next.night_number += 1;
			enter_phase(&mut next, Phase::Night, now);
		}
	}
	Ok(next)
}

/// Winner if the match is decided.
pub fn evaluate_winner(state: &GameState) -> Option<Winner> {
	let traitors = state.alive_traitor_count();
	if traitors == 0 {
		return Some(Winner::Subjects);
	}
	if traitors >= state.alive_subject_count() {
		return Some(Winner::Traitors);
	}
	None
}

/// Transition fired when `phase`'s deadline elapses.
pub fn timeout_transition(phase: Phase) -> Option<TimeoutTransition> {
	match phase {
		Phase::Night => Some(resolve_night),
		Phase::DayDiscussion => Some(skip_day_to_night),
		Phase::Trial => Some(start_day_verdict),
		Phase::DayVerdict => Some(resolve_day_verdict),
		Phase::Lobby | Phase::GameOver => None,
	}
}

/// Apply the current phase's timeout transition.
pub fn apply_timeout(state: &GameState, now: i64) -> Result<GameState, RuleError> {
	let transition = timeout_transition(state.phase).ok_or(RuleError::WrongPhase(state.phase))?;
	transition(state, now)
}

/// `floor(n / 2) + 1`.
pub fn majority_of(n: usize) -> usize {
	n / 2 + 1
}

fn require_phase(state: &GameState, phase: Phase) -> Result<(), RuleError> {
	if state.phase != phase {
		return Err(RuleError::WrongPhase(state.phase));
	}
	Ok(())
}

fn require_alive_target(state: &GameState, actor: &PlayerId, target_id: &PlayerId) -> Result<(), RuleError> {
	if actor == target_id {
		return Err(RuleError::InvalidTarget("cannot target yourself"));
	}
	match state.player(target_id) {
		Some(target) if target.alive => Ok(()),
		Some(_) => Err(RuleError::InvalidTarget("target is dead")),
		None => Err(RuleError::InvalidTarget("target is not in this game")),
	}
}

fn enter_phase(state: &mut GameState, phase: Phase, now: i64) {
	state.phase = phase;
	state.clear_ballots();
	if !matches!(phase, Phase::Trial | Phase::DayVerdict) {
		state.accused_id = None;
	}
	state.phase_ends_at = state.options.durations.deadline(phase, now);
}

fn finish(state: &mut GameState, winner: Winner) {
	state.winner = Some(winner);
	state.phase = Phase::GameOver;
	state.accused_id = None;
	state.clear_ballots();
	state.phase_ends_at = 0;
}
