#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use werewolf_domain::GameId;
use werewolf_engine::{GameState, RuleError};

#[derive(Debug, Error)]
#[error("game already exists: {0}")]
pub struct GameExists(pub GameId);

/// One game's cell. `None` once evicted, so callers that raced the eviction see
/// `GAME_NOT_FOUND` instead of a stale game.
type Slot = Arc<Mutex<Option<GameState>>>;

/// Authoritative in-memory game table.
///
/// The map lock is held only long enough to find a slot; the slot's mutex is what
/// serializes transitions of one game. Different games never contend.
#[derive(Debug, Default)]
pub struct SessionStore {
	games: RwLock<HashMap<GameId, Slot>>,
}

impl SessionStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of the current state.
	#[allow(dead_code)]
	pub fn get(&self, game_id: &GameId) -> Option<GameState> {
		self.slot(game_id)?.lock().clone()
	}

	pub fn create(&self, state: GameState) -> Result<(), GameExists> {
		let mut games = self.games.write();
		if games.contains_key(&state.game_id) {
			return Err(GameExists(state.game_id));
		}
		games.insert(state.game_id.clone(), Arc::new(Mutex::new(Some(state))));
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.games.read().len()
	}

	/// Atomically replace the game with `transition(current)`.
	#[allow(dead_code)]
	pub fn with_game<E>(
		&self,
		game_id: &GameId,
		transition: impl FnOnce(&GameState) -> Result<GameState, E>,
	) -> Result<GameState, E>
	where
		E: From<RuleError>,
	{
		self.with_game_and(game_id, transition, |_, _| ()).map(|(next, ())| next)
	}

	/// [`with_game`](Self::with_game), then `on_commit(previous, next)` while the game is
	/// still locked.
	///
	/// A transition that leaves the lobby empty evicts the game instead of storing it;
	/// `on_commit` still runs and sees the abandoned state.
	pub fn with_game_and<E, T>(
		&self,
		game_id: &GameId,
		transition: impl FnOnce(&GameState) -> Result<GameState, E>,
		on_commit: impl FnOnce(&GameState, &GameState) -> T,
	) -> Result<(GameState, T), E>
	where
		E: From<RuleError>,
	{
		let slot = self.slot(game_id).ok_or(RuleError::GameNotFound)?;
		let mut guard = slot.lock();
		let current = guard.as_ref().ok_or(RuleError::GameNotFound)?;

		let next = transition(current)?;
		let previous = if next.is_abandoned() {
			let previous = guard.take();
			self.games.write().remove(game_id);
			previous
		} else {
			guard.replace(next.clone())
		};
		let previous = previous.ok_or(RuleError::GameNotFound)?;

		let out = on_commit(&previous, &next);
		Ok((next, out))
	}

	/// Run `read` against the locked current state without changing it.
	pub fn inspect<E, T>(&self, game_id: &GameId, read: impl FnOnce(&GameState) -> Result<T, E>) -> Result<T, E>
	where
		E: From<RuleError>,
	{
		let slot = self.slot(game_id).ok_or(RuleError::GameNotFound)?;
		let guard = slot.lock();
		let current = guard.as_ref().ok_or(RuleError::GameNotFound)?;
		read(current)
	}

	/// Evict the game if `pred` holds for its current state. Returns whether it was removed.
	pub fn remove_if(&self, game_id: &GameId, pred: impl FnOnce(&GameState) -> bool) -> bool {
		let Some(slot) = self.slot(game_id) else {
			return false;
		};
		let mut guard = slot.lock();
		if !guard.as_ref().is_some_and(pred) {
			return false;
		}
		guard.take();
		self.games.write().remove(game_id);
		true
	}

	fn slot(&self, game_id: &GameId) -> Option<Slot> {
		self.games.read().get(game_id).cloned()
	}
}

#[cfg(test)]
mod tests {
	use std::thread;

	use werewolf_domain::{AccountId, Phase, PlayerId};
	use werewolf_engine::{
		GameOptions, OptionOverrides, PlayerIdentity, add_player_to_lobby, create_initial_game, remove_player_from_lobby,
	};

	use super::*;

	fn ident(id: &str) -> PlayerIdentity {
		PlayerIdentity {
			account_id: AccountId::new(format!("acct-{id}")).unwrap(),
			player_id: PlayerId::new(id).unwrap(),
			name: id.to_string(),
		}
	}

	fn lobby(game: &str) -> GameState {
		create_initial_game(
			GameId::new(game).unwrap(),
			ident("host"),
			&GameOptions::default(),
			&OptionOverrides::default(),
		)
		.unwrap()
	}

	#[test]
	fn create_rejects_duplicate_ids() {
		let store = SessionStore::new();
		store.create(lobby("g")).unwrap();
		assert!(store.create(lobby("g")).is_err());
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn with_game_on_missing_game_is_game_not_found() {
		let store = SessionStore::new();
		let err = store
			.with_game(&GameId::new("nope").unwrap(), |s| Ok::<_, RuleError>(s.clone()))
			.unwrap_err();
		assert_eq!(err, RuleError::GameNotFound);
	}

	#[test]
	fn failed_transition_leaves_state_untouched() {
		let store = SessionStore::new();
		let gid = GameId::new("g").unwrap();
		store.create(lobby("g")).unwrap();
		let before = store.get(&gid).unwrap();

		let err = store
			.with_game(&gid, |s| remove_player_from_lobby(s, &PlayerId::new("ghost").unwrap()))
			.unwrap_err();
		assert_eq!(err, RuleError::PlayerNotFound);
		assert_eq!(store.get(&gid).unwrap(), before);
	}

	#[test]
	fn on_commit_sees_previous_and_next() {
		let store = SessionStore::new();
		let gid = GameId::new("g").unwrap();
		store.create(lobby("g")).unwrap();

		let (next, sizes) = store
			.with_game_and(
				&gid,
				|s| add_player_to_lobby(s, ident("a")),
				|prev, next| (prev.players.len(), next.players.len()),
			)
			.unwrap();
		assert_eq!(sizes, (1, 2));
		assert_eq!(store.get(&gid).unwrap(), next);
	}

	#[test]
	fn abandoned_lobby_is_evicted() {
		let store = SessionStore::new();
		let gid = GameId::new("g").unwrap();
		store.create(lobby("g")).unwrap();

		let (next, ()) = store
			.with_game_and(
				&gid,
				|s| remove_player_from_lobby(s, &PlayerId::new("host").unwrap()),
				|_, next| assert!(next.is_abandoned()),
			)
			.unwrap();
		assert!(next.players.is_empty());
		assert!(store.get(&gid).is_none());
		assert_eq!(store.len(), 0);

		let err = store.inspect(&gid, |s| Ok::<_, RuleError>(s.phase)).unwrap_err();
		assert_eq!(err, RuleError::GameNotFound);
	}

	#[test]
	fn remove_if_respects_predicate() {
		let store = SessionStore::new();
		let gid = GameId::new("g").unwrap();
		store.create(lobby("g")).unwrap();

		assert!(!store.remove_if(&gid, |s| s.phase == Phase::GameOver));
		assert!(store.get(&gid).is_some());
		assert!(store.remove_if(&gid, |s| s.phase == Phase::Lobby));
		assert!(store.get(&gid).is_none());
	}

	#[test]
	fn concurrent_updates_to_one_game_are_serialized() {
		let store = Arc::new(SessionStore::new());
		let gid = GameId::new("g").unwrap();
		store.create(lobby("g")).unwrap();

		let handles: Vec<_> = (0..8)
			.map(|t| {
				let store = Arc::clone(&store);
				let gid = gid.clone();
				thread::spawn(move || {
					for i in 0..25 {
						store
							.with_game(&gid, |s| add_player_to_lobby(s, ident(&format!("t{t}-{i}"))))
							.unwrap();
					}
				})
			})
			.collect();
		for h in handles {
			h.join().unwrap();
		}

		assert_eq!(store.get(&gid).unwrap().players.len(), 1 + 8 * 25);
	}
}
