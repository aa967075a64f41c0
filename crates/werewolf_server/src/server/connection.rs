#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use werewolf_protocol::{ServerMessage, encode_server_message};

use crate::config::DEFAULT_SUBSCRIBER_QUEUE_CAPACITY;
use crate::server::gateway::Gateway;
use crate::server::room_hub::{ConnId, Outbound, RoomHubItem};

/// How long the writer may keep flushing after the reader has finished.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
	/// Outbound queue depth; messages beyond it are dropped and reported as lag.
	pub queue_capacity: usize,
}

impl Default for ConnectionSettings {
	fn default() -> Self {
		Self {
			queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
		}
	}
}

/// Serve one websocket client until it closes.
///
/// Inbound text frames are handed to the gateway in arrival order; a separate writer
/// task drains the connection's outbound queue to the socket.
pub async fn handle_connection(
	conn_id: ConnId,
	stream: TcpStream,
	gateway: Arc<Gateway>,
	settings: ConnectionSettings,
) -> anyhow::Result<()> {
	let ws = tokio_tungstenite::accept_async(stream)
		.await
		.context("websocket handshake")?;
	let (mut sink, mut frames) = ws.split();

	let (outbound, mut outbound_rx) = Outbound::channel(conn_id, settings.queue_capacity);

	let writer = tokio::spawn(async move {
		while let Some(item) = outbound_rx.recv().await {
			let msg = match item {
				RoomHubItem::Message(msg) => msg,
				RoomHubItem::Lagged { dropped } => {
					warn!(conn_id, dropped, "outbound queue full; messages dropped");
					continue;
				}
			};
			let text = match encode_server_message(&msg) {
				Ok(text) => text,
				Err(e) => {
					warn!(conn_id, kind = msg.kind(), error = %e, "failed to encode server message");
					continue;
				}
			};
			if let Err(e) = sink.send(Message::text(text)).await {
				debug!(conn_id, error = %e, "websocket send failed");
				break;
			}
		}
		let _ = sink.close().await;
	});

	while let Some(frame) = frames.next().await {
		match frame {
			Ok(Message::Text(text)) => gateway.handle_text(&outbound, text.as_str()),
			Ok(Message::Binary(_)) => {
				outbound.push(ServerMessage::error("BAD_JSON", "binary frames are not supported"));
			}
			Ok(Message::Close(frame)) => {
				debug!(conn_id, ?frame, "client closed websocket");
				break;
			}
			Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
			Err(e) => {
				debug!(conn_id, error = %e, "websocket read failed");
				break;
			}
		}
	}

	gateway.disconnect(conn_id);
	drop(outbound);

	if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
		warn!(conn_id, "writer did not finish in time");
	}
	info!(conn_id, "connection closed");
	Ok(())
}
