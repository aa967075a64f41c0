#![forbid(unsafe_code)]

//! Session gateway: binds connections to players and drives the engine.
//!
//! Every mutating command goes through [`SessionStore::with_game_and`], so the commit,
//! the timer re-arm and the per-viewer snapshot fan-out all happen under the game's
//! lock. Errors go back to the originating connection only.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use werewolf_domain::{AccountId, GameId, Phase, PlayerId, VerdictChoice};
use werewolf_engine::{
	GameOptions, GameState, OptionOverrides, PlayerIdentity, RuleError, add_player_to_lobby, apply_timeout,
	are_all_verdict_votes_in, are_night_votes_complete, build_game_view, create_initial_game, populate_lobby_with_bots,
	record_night_vote, record_nomination, record_verdict_vote, remove_player_from_lobby, resolve_day_verdict,
	resolve_night, set_player_connection, start_game, timeout_transition,
};
use werewolf_protocol::{
	ClientMessage, DEFAULT_MAX_MESSAGE_SIZE, DecodeError, ServerMessage, TextError, decode_client_message,
	normalize_chat_text,
};

use crate::server::chat::{ChatError, authorize_trial_chat, resolve_chat_route};
use crate::server::room_hub::{ConnId, Outbound, RoomHub};
use crate::server::store::SessionStore;
use crate::server::timer::{PhaseTimeout, PhaseTimer};
use crate::util::time::Clock;

#[derive(Debug, Error)]
pub enum GatewayError {
	#[error(transparent)]
	Rule(#[from] RuleError),

	#[error(transparent)]
	Decode(#[from] DecodeError),

	#[error(transparent)]
	Text(#[from] TextError),

	#[error(transparent)]
	Chat(#[from] ChatError),

	#[error("connection is not joined to a game")]
	NoContext,

	#[error("connection is already bound to a game")]
	AlreadyInGame,

	#[error("payload references another game")]
	WrongGame,

	#[error("cannot act on behalf of another player")]
	NotYou,

	#[error("debug actions are disabled on this server")]
	DebugDisabled,

	#[error(transparent)]
	Internal(#[from] anyhow::Error),
}

impl GatewayError {
	pub fn code(&self) -> &'static str {
		match self {
			GatewayError::Rule(e) => e.code(),
			GatewayError::Decode(e) => e.code(),
			GatewayError::Text(e) => e.code(),
			GatewayError::Chat(e) => e.code(),
			GatewayError::NoContext => "NO_CONTEXT",
			GatewayError::AlreadyInGame => "ALREADY_IN_GAME",
			GatewayError::WrongGame => "WRONG_GAME",
			GatewayError::NotYou => "NOT_YOU",
			GatewayError::DebugDisabled => "DEBUG_DISABLED",
			GatewayError::Internal(_) => "SERVER_ERROR",
		}
	}

	/// Text sent to the client. Internal details stay in the logs.
	fn client_message(&self) -> String {
		match self {
			GatewayError::Internal(_) => "internal error".to_string(),
			other => other.to_string(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
	/// Enables DEBUG_POPULATE_LOBBY and DEBUG_FORCE_TIMEOUT.
	pub debug: bool,
	/// Options every new game starts from.
	pub defaults: GameOptions,
	pub max_message_size: usize,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			debug: false,
			defaults: GameOptions::default(),
			max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
		}
	}
}

/// Identity a connection acts as once it created or joined a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
	pub account_id: AccountId,
	pub player_id: PlayerId,
	pub game_id: GameId,
}

pub struct Gateway {
	cfg: GatewayConfig,
	store: SessionStore,
	timer: PhaseTimer,
	hub: RoomHub,
	contexts: Mutex<HashMap<ConnId, ConnectionContext>>,
	clock: Arc<dyn Clock>,
}

/// Why a fired deadline was not applied.
enum TimeoutSkip {
	Stale,
	Rule(RuleError),
}

impl From<RuleError> for TimeoutSkip {
	fn from(e: RuleError) -> Self {
		TimeoutSkip::Rule(e)
	}
}

impl Gateway {
	pub fn new(cfg: GatewayConfig, hub: RoomHub, clock: Arc<dyn Clock>) -> (Arc<Self>, mpsc::UnboundedReceiver<PhaseTimeout>) {
		let (timer, fired_rx) = PhaseTimer::new();
		let gateway = Arc::new(Self {
			cfg,
			store: SessionStore::new(),
			timer,
			hub,
			contexts: Mutex::new(HashMap::new()),
			clock,
		});
		(gateway, fired_rx)
	}

	/// Apply fired phase deadlines until the timer goes away.
	pub fn spawn_timeout_loop(self: &Arc<Self>, mut fired_rx: mpsc::UnboundedReceiver<PhaseTimeout>) -> JoinHandle<()> {
		let gateway = Arc::clone(self);
		tokio::spawn(async move {
			while let Some(fired) = fired_rx.recv().await {
				gateway.handle_timeout(fired);
			}
		})
	}

	/// Snapshot of a game, if it exists.
	#[cfg(test)]
	pub fn game(&self, game_id: &GameId) -> Option<GameState> {
		self.store.get(game_id)
	}

	/// Identity bound to a connection, if any.
	#[cfg(test)]
	pub fn context(&self, conn_id: ConnId) -> Option<ConnectionContext> {
		self.contexts.lock().get(&conn_id).cloned()
	}

	/// Decode and run one inbound text message; failures become a single ERROR reply.
	pub fn handle_text(&self, outbound: &Outbound, raw: &str) {
		let msg = match decode_client_message(raw, self.cfg.max_message_size) {
			Ok(msg) => msg,
			Err(e) => {
				self.reply_error(outbound, &GatewayError::from(e));
				return;
			}
		};

		let kind = msg.kind();
		metrics::counter!("werewolf_server_commands_total", "type" => kind).increment(1);
		debug!(conn_id = outbound.conn_id(), kind, "command received");

		if let Err(e) = self.handle_command(outbound, msg) {
			self.reply_error(outbound, &e);
		}
	}

	pub fn handle_command(&self, outbound: &Outbound, msg: ClientMessage) -> Result<(), GatewayError> {
		let conn_id = outbound.conn_id();
		if let Some((game_id, player_id)) = msg.acting_as() {
			self.require_context(conn_id, game_id, player_id)?;
		}

		let now = self.clock.now_ms();
		match msg {
			ClientMessage::CreateGame {
				account_id,
				name,
				min_players,
			} => self.create_game(outbound, account_id, name, min_players),

			ClientMessage::JoinGame {
				game_id,
				account_id,
				name,
			} => self.join_game(outbound, game_id, account_id, name, now),

			ClientMessage::StartGame { game_id, player_id } => {
				let next = self.transact(&game_id, now, |s| Ok(start_game(s, &player_id, now)?))?;
				info!(game_id = %game_id, players = next.players.len(), "game started");
				Ok(())
			}

			ClientMessage::LeaveGame { game_id, player_id } => {
				self.hub.leave(&game_id, conn_id);
				let result = self.transact(&game_id, now, |s| Ok(depart(s, &player_id)?));
				self.detach(conn_id);
				info!(conn_id, game_id = %game_id, player_id = %player_id, "player left game");
				result.map(|_| ())
			}

			ClientMessage::NightVote {
				game_id,
				player_id,
				target_id,
			} => {
				self.transact(&game_id, now, |s| {
					let next = record_night_vote(s, &player_id, &target_id)?;
					if are_night_votes_complete(&next) {
						return Ok(resolve_night(&next, now)?);
					}
					Ok(next)
				})?;
				Ok(())
			}

			ClientMessage::DayNominate {
				game_id,
				player_id,
				target_id,
			} => {
				self.transact(&game_id, now, |s| Ok(record_nomination(s, &player_id, &target_id, now)?))?;
				Ok(())
			}

			ClientMessage::DayVerdictVote {
				game_id,
				player_id,
				choice,
			} => self.verdict_vote(&game_id, &player_id, choice, now),

			ClientMessage::TrialChat {
				game_id,
				player_id,
				text,
			} => self.store.inspect(&game_id, |s| {
				authorize_trial_chat(s, &player_id)?;
				let text = normalize_chat_text(&text)?;
				self.hub.publish(
					&game_id,
					&ServerMessage::TrialChat {
						game_id: game_id.clone(),
						player_id: player_id.clone(),
						text,
						timestamp: now,
					},
				);
				Ok::<_, GatewayError>(())
			}),

			ClientMessage::Chat {
				game_id,
				player_id,
				text,
			} => self.store.inspect(&game_id, |s| {
				let sender = s.player(&player_id).ok_or(RuleError::PlayerNotFound)?;
				let text = normalize_chat_text(&text)?;
				let route = resolve_chat_route(s, sender)?;

				let msg = ServerMessage::Chat {
					game_id: game_id.clone(),
					player_id: player_id.clone(),
					text,
					channel: route.channel,
					timestamp: now,
				};
				self.hub.publish_with(&game_id, |viewer| {
					s.player(viewer)
						.filter(|p| route.audience.admits(p))
						.map(|_| msg.clone())
				});
				debug!(game_id = %game_id, channel = %route.channel, "chat routed");
				Ok::<_, GatewayError>(())
			}),

			ClientMessage::DebugPopulateLobby {
				game_id,
				player_id,
				total_players,
			} => {
				self.require_debug()?;
				let next = self.transact(&game_id, now, |s| {
					require_host(s, &player_id)?;
					Ok(populate_lobby_with_bots(s, total_players)?)
				})?;
				info!(game_id = %game_id, players = next.players.len(), "debug: lobby populated");
				Ok(())
			}

			ClientMessage::DebugForceTimeout { game_id, player_id } => {
				self.require_debug()?;
				self.transact(&game_id, now, |s| {
					require_host(s, &player_id)?;
					let transition = timeout_transition(s.phase)
						.ok_or_else(|| RuleError::InvalidDebug(format!("no timeout behavior for phase {}", s.phase)))?;
					Ok(transition(s, now)?)
				})?;
				info!(game_id = %game_id, "debug: phase timeout forced");
				Ok(())
			}
		}
	}

	/// Apply a fired deadline if the game is still where it was when the timer was armed.
	pub fn handle_timeout(&self, fired: PhaseTimeout) {
		let now = self.clock.now_ms();
		let result = self.store.with_game_and(
			&fired.game_id,
			|s| {
				if !fired.matches(s) {
					return Err(TimeoutSkip::Stale);
				}
				Ok(apply_timeout(s, now)?)
			},
			|prev, next| self.commit(prev, next, now),
		);

		match result {
			Ok(_) => {
				metrics::counter!("werewolf_server_phase_timeouts_total", "phase" => fired.phase.as_str()).increment(1);
				debug!(game_id = %fired.game_id, phase = %fired.phase, "phase timeout applied");
			}
			Err(TimeoutSkip::Stale) => {
				debug!(game_id = %fired.game_id, phase = %fired.phase, "stale phase timer ignored");
			}
			Err(TimeoutSkip::Rule(RuleError::GameNotFound)) => {
				debug!(game_id = %fired.game_id, "phase timer for a removed game ignored");
			}
			Err(TimeoutSkip::Rule(e)) => {
				warn!(game_id = %fired.game_id, phase = %fired.phase, error = %e, "phase timeout transition failed");
			}
		}
	}

	/// Connection closed: leave the lobby, or mark the player disconnected mid-match.
	pub fn disconnect(&self, conn_id: ConnId) {
		let Some(ctx) = self.contexts.lock().get(&conn_id).cloned() else {
			return;
		};
		self.hub.leave(&ctx.game_id, conn_id);

		let now = self.clock.now_ms();
		match self.transact(&ctx.game_id, now, |s| Ok(depart(s, &ctx.player_id)?)) {
			Ok(_) => info!(conn_id, game_id = %ctx.game_id, player_id = %ctx.player_id, "player disconnected"),
			Err(e) => debug!(conn_id, game_id = %ctx.game_id, error = %e, "disconnect after game ended"),
		}
		self.detach(conn_id);
	}

	fn create_game(
		&self,
		outbound: &Outbound,
		account_id: AccountId,
		name: String,
		min_players: Option<i64>,
	) -> Result<(), GatewayError> {
		self.require_unbound(outbound.conn_id())?;

		let game_id = GameId::new_v4();
		let player_id = PlayerId::new_v4();
		let state = create_initial_game(
			game_id.clone(),
			PlayerIdentity {
				account_id: account_id.clone(),
				player_id: player_id.clone(),
				name,
			},
			&self.cfg.defaults,
			&OptionOverrides { min_players },
		)?;

		self.store.create(state).map_err(anyhow::Error::from)?;
		metrics::counter!("werewolf_server_games_created_total").increment(1);
		metrics::gauge!("werewolf_server_active_games").set(self.store.len() as f64);
		info!(conn_id = outbound.conn_id(), game_id = %game_id, player_id = %player_id, "game created");

		self.store.inspect(&game_id, |s| {
			self.attach(
				outbound,
				ConnectionContext {
					account_id,
					player_id: player_id.clone(),
					game_id: game_id.clone(),
				},
			);
			outbound.push(ServerMessage::GameCreated {
				game: Box::new(build_game_view(s, &player_id)?),
				player_id: player_id.clone(),
			});
			self.publish_state(s);
			Ok::<_, GatewayError>(())
		})
	}

	fn join_game(
		&self,
		outbound: &Outbound,
		game_id: GameId,
		account_id: AccountId,
		name: String,
		now: i64,
	) -> Result<(), GatewayError> {
		self.require_unbound(outbound.conn_id())?;

		let player_id = PlayerId::new_v4();
		let identity = PlayerIdentity {
			account_id: account_id.clone(),
			player_id: player_id.clone(),
			name,
		};

		self.store.with_game_and(
			&game_id,
			|s| -> Result<GameState, GatewayError> { Ok(add_player_to_lobby(s, identity)?) },
			|prev, next| {
				self.attach(
					outbound,
					ConnectionContext {
						account_id,
						player_id: player_id.clone(),
						game_id: game_id.clone(),
					},
				);
				match build_game_view(next, &player_id) {
					Ok(view) => {
						outbound.push(ServerMessage::PlayerJoined {
							game: Box::new(view),
							player_id: player_id.clone(),
						});
					}
					Err(e) => warn!(game_id = %game_id, error = %e, "joined player missing from view"),
				}
				self.commit(prev, next, now);
			},
		)?;

		info!(conn_id = outbound.conn_id(), game_id = %game_id, player_id = %player_id, "player joined");
		Ok(())
	}

	fn verdict_vote(
		&self,
		game_id: &GameId,
		player_id: &PlayerId,
		choice: VerdictChoice,
		now: i64,
	) -> Result<(), GatewayError> {
		let next = self.transact(game_id, now, |s| {
			let next = record_verdict_vote(s, player_id, choice)?;
			if are_all_verdict_votes_in(&next) {
				return Ok(resolve_day_verdict(&next, now)?);
			}
			Ok(next)
		})?;
		debug!(game_id = %game_id, phase = %next.phase, "verdict vote recorded");
		Ok(())
	}

	/// Mutate, then re-arm the timer and fan out snapshots, all under the game lock.
	fn transact(
		&self,
		game_id: &GameId,
		now: i64,
		transition: impl FnOnce(&GameState) -> Result<GameState, GatewayError>,
	) -> Result<GameState, GatewayError> {
		self.store
			.with_game_and(game_id, transition, |prev, next| self.commit(prev, next, now))
			.map(|(next, ())| next)
	}

	fn commit(&self, prev: &GameState, next: &GameState, now: i64) {
		if next.is_abandoned() {
			self.timer.clear(&next.game_id);
			self.hub.close_room(&next.game_id);
			metrics::gauge!("werewolf_server_active_games").set(self.store.len() as f64);
			info!(game_id = %next.game_id, "lobby abandoned; game removed");
			return;
		}

		self.timer.schedule(next, now);

		if prev.phase != next.phase {
			info!(
				game_id = %next.game_id,
				from = %prev.phase,
				to = %next.phase,
				day = next.day_number,
				night = next.night_number,
				"phase change"
			);
		}
		if next.phase == Phase::GameOver
			&& prev.phase != Phase::GameOver
			&& let Some(winner) = next.winner
		{
			metrics::counter!("werewolf_server_games_finished_total", "winner" => winner.as_str()).increment(1);
			info!(game_id = %next.game_id, winner = %winner, "game over");
		}

		self.publish_state(next);
	}

	/// Send every member of the room their own redacted view.
	fn publish_state(&self, state: &GameState) {
		self.hub.publish_with(&state.game_id, |viewer| match build_game_view(state, viewer) {
			Ok(view) => Some(ServerMessage::GameState { game: Box::new(view) }),
			Err(e) => {
				warn!(game_id = %state.game_id, viewer = %viewer, error = %e, "no view for room member");
				None
			}
		});
	}

	fn attach(&self, outbound: &Outbound, ctx: ConnectionContext) {
		debug!(
			conn_id = outbound.conn_id(),
			account_id = %ctx.account_id,
			player_id = %ctx.player_id,
			game_id = %ctx.game_id,
			"connection bound"
		);
		self.hub.join(&ctx.game_id, ctx.player_id.clone(), outbound.clone());
		self.contexts.lock().insert(outbound.conn_id(), ctx);
	}

	/// Unbind a connection. A game nobody is connected to any more is dropped with its timer.
	fn detach(&self, conn_id: ConnId) {
		let Some(ctx) = self.contexts.lock().remove(&conn_id) else {
			return;
		};
		if self.hub.leave(&ctx.game_id, conn_id) > 0 {
			return;
		}
		if self.store.remove_if(&ctx.game_id, |_| true) {
			self.timer.clear(&ctx.game_id);
			metrics::gauge!("werewolf_server_active_games").set(self.store.len() as f64);
			info!(game_id = %ctx.game_id, "unwatched game removed");
		}
	}

	fn require_unbound(&self, conn_id: ConnId) -> Result<(), GatewayError> {
		if self.contexts.lock().contains_key(&conn_id) {
			return Err(GatewayError::AlreadyInGame);
		}
		Ok(())
	}

	fn require_context(&self, conn_id: ConnId, game_id: &GameId, player_id: &PlayerId) -> Result<(), GatewayError> {
		let contexts = self.contexts.lock();
		let ctx = contexts.get(&conn_id).ok_or(GatewayError::NoContext)?;
		if ctx.game_id != *game_id {
			return Err(GatewayError::WrongGame);
		}
		if ctx.player_id != *player_id {
			return Err(GatewayError::NotYou);
		}
		Ok(())
	}

	fn require_debug(&self) -> Result<(), GatewayError> {
		if !self.cfg.debug {
			return Err(GatewayError::DebugDisabled);
		}
		Ok(())
	}

	fn reply_error(&self, outbound: &Outbound, err: &GatewayError) {
		let code = err.code();
		metrics::counter!("werewolf_server_command_errors_total", "code" => code).increment(1);
		match err {
			GatewayError::Internal(e) => error!(conn_id = outbound.conn_id(), error = ?e, "command failed unexpectedly"),
			_ => debug!(conn_id = outbound.conn_id(), code, error = %err, "command rejected"),
		}
		outbound.push(ServerMessage::error(code, err.client_message()));
	}
}

/// Leave before the match starts, or stay in the roster as disconnected once it runs.
fn depart(state: &GameState, player_id: &PlayerId) -> Result<GameState, RuleError> {
	if state.phase == Phase::Lobby {
		return remove_player_from_lobby(state, player_id);
	}
	Ok(set_player_connection(state, player_id, false))
}

fn require_host(state: &GameState, player_id: &PlayerId) -> Result<(), RuleError> {
	if !state.is_host(player_id) {
		return Err(RuleError::NotHost);
	}
	Ok(())
}
