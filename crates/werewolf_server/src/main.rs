#![forbid(unsafe_code)]

mod config;
mod server;
mod util;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use werewolf_protocol::DEFAULT_MAX_MESSAGE_SIZE;
use werewolf_util::endpoint::WsEndpoint;

use crate::server::connection::{ConnectionSettings, handle_connection};
use crate::server::gateway::{Gateway, GatewayConfig};
use crate::server::health::{HealthState, spawn_health_server};
use crate::server::room_hub::{RoomHub, RoomHubConfig};
use crate::util::time::SystemClock;

const DEFAULT_BIND: &str = "ws://127.0.0.1:8080";

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: werewolf_server [--bind ws://host:port]\n\
\n\
Options:\n\
\t--bind    Bind endpoint (default: {DEFAULT_BIND})\n\
\t         Format: ws://host:port\n\
\t--help   Show this help\n\
"
	);
	std::process::exit(2)
}

fn parse_args() -> SocketAddr {
	let mut bind_endpoint = DEFAULT_BIND.to_string();

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--bind" | "--listen" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--bind must be non-empty (expected ws://host:port)");
					usage_and_exit();
				}
				bind_endpoint = v;
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	WsEndpoint::parse(&bind_endpoint)
		.and_then(|bind| bind.socket_addr())
		.unwrap_or_else(|e| {
			eprintln!("{e}");
			usage_and_exit();
		})
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,werewolf_server=debug".to_string());

	let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
		.ok()
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty());
	let base = tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::new(filter))
		.with(tracing_subscriber::fmt::layer().with_target(false));

	let Some(endpoint) = otlp_endpoint else {
		base.init();
		return;
	};

	use opentelemetry::global;
	use opentelemetry::trace::TracerProvider as _;
	use opentelemetry_otlp::WithExportConfig;

	match opentelemetry_otlp::SpanExporter::builder()
		.with_tonic()
		.with_endpoint(endpoint.clone())
		.build()
	{
		Ok(exporter) => {
			let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
				.with_batch_exporter(exporter)
				.build();
			let tracer = tracer_provider.tracer("werewolf_server");
			global::set_tracer_provider(tracer_provider);

			base.with(tracing_opentelemetry::layer().with_tracer(tracer)).init();
			info!(endpoint = %endpoint, "otlp tracing enabled");
		}
		Err(e) => {
			base.init();
			warn!(error = %e, "failed to initialize otlp tracing");
		}
	}
}

/// Parse an optional `host:port` setting, warning (and skipping) when it is malformed.
fn side_listener_addr(what: &str, bind: Option<&str>) -> Option<SocketAddr> {
	let bind = bind?;
	bind.parse::<SocketAddr>()
		.inspect_err(|e| warn!(error = %e, %bind, listener = what, "invalid bind address (expected host:port)"))
		.ok()
}

fn init_metrics(addr: SocketAddr) {
	match metrics_exporter_prometheus::PrometheusBuilder::new()
		.with_http_listener(addr)
		.install()
	{
		Ok(()) => info!(%addr, "metrics exporter listening"),
		Err(e) => warn!(error = %e, "failed to start metrics exporter"),
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();

	let bind_addr = parse_args();

	let config_path = crate::config::default_config_path()?;
	let server_cfg = crate::config::load_server_config_from_path(&config_path)?;
	info!(path = %config_path.display(), "loaded server config (toml + env overrides)");

	if let Some(addr) = side_listener_addr("metrics", server_cfg.server.metrics_bind.as_deref()) {
		init_metrics(addr);
	}

	let health_state = HealthState::new();
	if let Some(addr) = side_listener_addr("health", server_cfg.server.health_bind.as_deref()) {
		spawn_health_server(addr, health_state.clone());
		info!(%addr, "health server listening");
	}

	let gateway_cfg = GatewayConfig {
		debug: server_cfg.game.debug,
		defaults: server_cfg.game.options,
		max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
	};
	let room_hub = RoomHub::new(RoomHubConfig { debug_logs: false });
	let (gateway, fired_rx) = Gateway::new(gateway_cfg, room_hub, Arc::new(SystemClock));
	let _timeouts = gateway.spawn_timeout_loop(fired_rx);

	let conn_settings = ConnectionSettings {
		queue_capacity: server_cfg.server.subscriber_queue_capacity,
	};

	let listener = TcpListener::bind(bind_addr)
		.await
		.with_context(|| format!("bind {bind_addr}"))?;
	info!(bind = %bind_addr, debug = server_cfg.game.debug, "werewolf_server: websocket listener ready");

	health_state.mark_ready();

	let mut next_conn_id: u64 = 1;

	loop {
		let (stream, remote) = tokio::select! {
			accepted = listener.accept() => match accepted {
				Ok(pair) => pair,
				Err(e) => {
					warn!(error = %e, "accept failed");
					continue;
				}
			},
			_ = tokio::signal::ctrl_c() => {
				info!("shutdown requested");
				break;
			}
		};

		let conn_id = next_conn_id;
		next_conn_id += 1;
		metrics::counter!("werewolf_server_connections_total").increment(1);
		info!(conn_id, %remote, "accepted connection");

		let gateway = Arc::clone(&gateway);
		let conn_settings = conn_settings.clone();
		tokio::spawn(async move {
			metrics::gauge!("werewolf_server_active_connections").increment(1.0);
			if let Err(e) = handle_connection(conn_id, stream, gateway, conn_settings).await {
				warn!(conn_id, error = %e, "connection handler exited with error");
			}
			metrics::gauge!("werewolf_server_active_connections").decrement(1.0);
		});
	}

	Ok(())
}
