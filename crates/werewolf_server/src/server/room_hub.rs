#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use werewolf_domain::{GameId, PlayerId};
use werewolf_protocol::ServerMessage;

pub type ConnId = u64;

/// Items emitted on a connection's outbound stream.
#[derive(Debug, Clone)]
pub enum RoomHubItem {
	Message(Box<ServerMessage>),

	/// The connection is lagging and this many messages were dropped.
	Lagged { dropped: u64 },
}

/// Bounded outbound queue of one connection.
///
/// Sends never block: when the queue is full the message is dropped and counted, and
/// the count is reported as a `Lagged` marker once the queue drains.
#[derive(Debug, Clone)]
pub struct Outbound {
	conn_id: ConnId,
	tx: mpsc::Sender<RoomHubItem>,
	pending_lag: Arc<AtomicU64>,
}

impl Outbound {
	pub fn channel(conn_id: ConnId, capacity: usize) -> (Self, mpsc::Receiver<RoomHubItem>) {
		let (tx, rx) = mpsc::channel(capacity.max(1));
		let outbound = Self {
			conn_id,
			tx,
			pending_lag: Arc::new(AtomicU64::new(0)),
		};
		(outbound, rx)
	}

	pub fn conn_id(&self) -> ConnId {
		self.conn_id
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	/// Enqueue `msg`. Returns false if it was dropped.
	pub fn push(&self, msg: ServerMessage) -> bool {
		match self.tx.try_send(RoomHubItem::Message(Box::new(msg))) {
			Ok(()) => {
				let pending = self.pending_lag.load(Ordering::Relaxed);
				if pending > 0 && self.tx.try_send(RoomHubItem::Lagged { dropped: pending }).is_ok() {
					self.pending_lag.fetch_sub(pending, Ordering::Relaxed);
				}
				true
			}
			Err(mpsc::error::TrySendError::Full(_)) => {
				self.pending_lag.fetch_add(1, Ordering::Relaxed);
				false
			}
			Err(mpsc::error::TrySendError::Closed(_)) => false,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct RoomHubConfig {
	pub debug_logs: bool,
}

/// Per-game set of attached connections.
#[derive(Debug, Clone)]
pub struct RoomHub {
	inner: Arc<Mutex<Inner>>,
	cfg: RoomHubConfig,
}

#[derive(Debug, Default)]
struct Inner {
	rooms: HashMap<GameId, RoomEntry>,
}

#[derive(Debug, Default)]
struct RoomEntry {
	members: Vec<Member>,
}

#[derive(Debug)]
struct Member {
	player_id: PlayerId,
	outbound: Outbound,
}

impl RoomHub {
	pub fn new(cfg: RoomHubConfig) -> Self {
		Self {
			inner: Arc::new(Mutex::new(Inner::default())),
			cfg,
		}
	}

	/// Attach a connection, acting as `player_id`, to a game's room.
	pub fn join(&self, game_id: &GameId, player_id: PlayerId, outbound: Outbound) {
		let mut inner = self.inner.lock();
		let entry = inner.rooms.entry(game_id.clone()).or_default();

		prune_closed_members(entry);
		entry.members.retain(|m| m.outbound.conn_id() != outbound.conn_id());
		entry.members.push(Member { player_id, outbound });

		if self.cfg.debug_logs {
			debug!(game_id = %game_id, members = entry.members.len(), "room hub: joined");
		}
	}

	/// Detach a connection. Returns the number of members left in the room.
	pub fn leave(&self, game_id: &GameId, conn_id: ConnId) -> usize {
		let mut inner = self.inner.lock();
		let Some(entry) = inner.rooms.get_mut(game_id) else {
			return 0;
		};

		entry.members.retain(|m| m.outbound.conn_id() != conn_id);
		prune_closed_members(entry);

		let left = entry.members.len();
		if left == 0 {
			inner.rooms.remove(game_id);
		}
		left
	}

	/// Drop the whole room.
	pub fn close_room(&self, game_id: &GameId) {
		self.inner.lock().rooms.remove(game_id);
	}

	/// Deliver to every member; `build` picks each viewer's message, or skips them with `None`.
	pub fn publish_with(&self, game_id: &GameId, mut build: impl FnMut(&PlayerId) -> Option<ServerMessage>) {
		let mut inner = self.inner.lock();
		let Some(entry) = inner.rooms.get_mut(game_id) else {
			return;
		};

		prune_closed_members(entry);

		let mut dropped_total: u64 = 0;
		for member in &entry.members {
			let Some(msg) = build(&member.player_id) else {
				continue;
			};
			if !member.outbound.push(msg) {
				dropped_total += 1;
			}
		}

		if entry.members.is_empty() {
			inner.rooms.remove(game_id);
		}

		if self.cfg.debug_logs && dropped_total > 0 {
			debug!(
				game_id = %game_id,
				dropped = dropped_total,
				"room hub: dropped due to full connection queues"
			);
		}
	}

	/// Deliver the same message to every member.
	pub fn publish(&self, game_id: &GameId, msg: &ServerMessage) {
		self.publish_with(game_id, |_| Some(msg.clone()));
	}

	/// Live members per room.
	#[cfg(test)]
	pub fn room_member_counts(&self) -> HashMap<GameId, usize> {
		let inner = self.inner.lock();
		inner
			.rooms
			.iter()
			.map(|(k, v)| (k.clone(), v.members.iter().filter(|m| !m.outbound.is_closed()).count()))
			.collect()
	}
}

fn prune_closed_members(entry: &mut RoomEntry) {
	entry.members.retain(|m| !m.outbound.is_closed());
}
