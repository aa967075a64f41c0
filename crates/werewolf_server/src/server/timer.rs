#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};
use werewolf_domain::{GameId, Phase};
use werewolf_engine::{GameState, timeout_transition};

/// Emitted when an armed deadline elapses.
///
/// Carries the phase and deadline it was armed for; the consumer must ignore it if the
/// game has moved on since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTimeout {
	pub game_id: GameId,
	pub phase: Phase,
	pub phase_ends_at: i64,
}

impl PhaseTimeout {
	/// Whether `state` is still the one this deadline was armed for.
	pub fn matches(&self, state: &GameState) -> bool {
		state.game_id == self.game_id && state.phase == self.phase && state.phase_ends_at == self.phase_ends_at
	}
}

/// At most one pending deadline per game.
#[derive(Debug)]
pub struct PhaseTimer {
	pending: Mutex<HashMap<GameId, AbortHandle>>,
	fired_tx: mpsc::UnboundedSender<PhaseTimeout>,
}

impl PhaseTimer {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<PhaseTimeout>) {
		let (fired_tx, fired_rx) = mpsc::unbounded_channel();
		let timer = Self {
			pending: Mutex::new(HashMap::new()),
			fired_tx,
		};
		(timer, fired_rx)
	}

	/// Cancel any deadline for `state.game_id`, then arm a new one if the phase is timed.
	///
	/// Must be called from within a tokio runtime.
	pub fn schedule(&self, state: &GameState, now: i64) {
		let mut pending = self.pending.lock();
		if let Some(prev) = pending.remove(&state.game_id) {
			prev.abort();
		}

		if timeout_transition(state.phase).is_none() {
			return;
		}

		let delay = Duration::from_millis(u64::try_from(state.phase_ends_at.saturating_sub(now)).unwrap_or(0));
		let fired = PhaseTimeout {
			game_id: state.game_id.clone(),
			phase: state.phase,
			phase_ends_at: state.phase_ends_at,
		};
		let tx = self.fired_tx.clone();

		trace!(game_id = %fired.game_id, phase = %fired.phase, delay_ms = delay.as_millis() as u64, "phase timer armed");
		let handle = tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			debug!(game_id = %fired.game_id, phase = %fired.phase, "phase deadline elapsed");
			let _ = tx.send(fired);
		});
		pending.insert(state.game_id.clone(), handle.abort_handle());
	}

	/// Cancel and forget the game's deadline.
	pub fn clear(&self, game_id: &GameId) {
		if let Some(prev) = self.pending.lock().remove(game_id) {
			prev.abort();
		}
	}

	/// Number of games with a deadline entry.
	#[cfg(test)]
	pub fn armed_count(&self) -> usize {
		self.pending.lock().len()
	}
}

#[cfg(test)]
mod tests {
	use tokio::time::timeout;
	use werewolf_domain::{AccountId, PlayerId};
	use werewolf_engine::{
		GameOptions, OptionOverrides, PhaseDurations, PlayerIdentity, add_player_to_lobby, create_initial_game,
		start_game,
	};

	use super::*;

	fn ident(id: &str) -> PlayerIdentity {
		PlayerIdentity {
			account_id: AccountId::new(format!("acct-{id}")).unwrap(),
			player_id: PlayerId::new(id).unwrap(),
			name: id.to_string(),
		}
	}

	fn night(game: &str, night_ms: u64, now: i64) -> GameState {
		let options = GameOptions {
			durations: PhaseDurations {
				night: Duration::from_millis(night_ms),
				..PhaseDurations::default()
			},
			..GameOptions::default()
		};
		let mut s = create_initial_game(GameId::new(game).unwrap(), ident("h"), &options, &OptionOverrides::default()).unwrap();
		for id in ["a", "b", "c"] {
			s = add_player_to_lobby(&s, ident(id)).unwrap();
		}
		start_game(&s, &PlayerId::new("h").unwrap(), now).unwrap()
	}

	#[tokio::test]
	async fn fires_once_with_the_armed_deadline() {
		let (timer, mut rx) = PhaseTimer::new();
		let state = night("g", 20, 1_000);
		timer.schedule(&state, 1_000);
		assert_eq!(timer.armed_count(), 1);

		let fired = timeout(Duration::from_secs(2), rx.recv())
			.await
			.expect("timer fired")
			.expect("channel open");
		assert!(fired.matches(&state));
		assert_eq!(fired.phase, Phase::Night);

		assert!(timeout(Duration::from_millis(60), rx.recv()).await.is_err());
	}

	#[tokio::test]
	async fn rescheduling_cancels_the_previous_deadline() {
		let (timer, mut rx) = PhaseTimer::new();
		let first = night("g", 30, 1_000);
		timer.schedule(&first, 1_000);

		let mut second = first.clone();
		second.phase_ends_at += 1;
		timer.schedule(&second, 1_000);
		assert_eq!(timer.armed_count(), 1);

		let fired = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
		assert_eq!(fired.phase_ends_at, second.phase_ends_at);
		assert!(!fired.matches(&first));
		assert!(timeout(Duration::from_millis(80), rx.recv()).await.is_err());
	}

	#[tokio::test]
	async fn past_deadlines_fire_immediately() {
		let (timer, mut rx) = PhaseTimer::new();
		let state = night("g", 10, 1_000);
		timer.schedule(&state, 1_000_000);
		assert!(timeout(Duration::from_millis(500), rx.recv()).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn untimed_phases_and_clear_leave_nothing_armed() {
		let (timer, mut rx) = PhaseTimer::new();
		let state = night("g", 20, 1_000);
		timer.schedule(&state, 1_000);
		timer.clear(&state.game_id);
		assert_eq!(timer.armed_count(), 0);

		let lobby = create_initial_game(
			GameId::new("l").unwrap(),
			ident("h"),
			&GameOptions::default(),
			&OptionOverrides::default(),
		)
		.unwrap();
		timer.schedule(&lobby, 1_000);
		assert_eq!(timer.armed_count(), 0);

		assert!(timeout(Duration::from_millis(80), rx.recv()).await.is_err());
	}
}
