#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use serde::Deserialize;
use tracing::{info, warn};
use werewolf_engine::{DEFAULT_MIN_PLAYERS, GameOptions, MAX_PLAYERS, PhaseDurations};

/// Default per-connection outbound queue depth.
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

/// Default config path: `~/.werewolf/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".werewolf").join("config.toml"))
}

/// Load TOML from `path` (missing file means defaults), then apply env overrides.
pub fn load_server_config_from_path(path: &Path) -> anyhow::Result<ServerConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = ServerConfig::from_file(file_cfg);

	apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());

	Ok(cfg)
}

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub server: ServerSettings,
	pub game: GameSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
	/// Optional metrics exporter bind address (host:port).
	pub metrics_bind: Option<String>,
	/// Optional health/readiness HTTP bind address (host:port).
	pub health_bind: Option<String>,
	/// Maximum number of queued outbound messages per connection.
	pub subscriber_queue_capacity: usize,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self {
			metrics_bind: None,
			health_bind: None,
			subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct GameSettings {
	/// Enables the DEBUG_* commands.
	pub debug: bool,
	/// Defaults every new game starts from.
	pub options: GameOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	#[serde(default)]
	server: FileServerSettings,

	#[serde(default)]
	game: FileGameSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileServerSettings {
	metrics_bind: Option<String>,
	health_bind: Option<String>,
	subscriber_queue_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileGameSettings {
	debug: Option<bool>,
	min_players: Option<u32>,
	night_secs: Option<u64>,
	day_secs: Option<u64>,
	trial_secs: Option<u64>,
	verdict_secs: Option<u64>,
}

impl ServerConfig {
	fn from_file(file: FileConfig) -> Self {
		let defaults = PhaseDurations::default();
		let durations = PhaseDurations {
			night: secs_or_default("night_secs", file.game.night_secs, defaults.night),
			day_discussion: secs_or_default("day_secs", file.game.day_secs, defaults.day_discussion),
			trial: secs_or_default("trial_secs", file.game.trial_secs, defaults.trial),
			day_verdict: secs_or_default("verdict_secs", file.game.verdict_secs, defaults.day_verdict),
		};

		let min_players = match file.game.min_players {
			Some(n) if n == 0 || n > MAX_PLAYERS => {
				warn!(min_players = n, max = MAX_PLAYERS, "game config: min_players out of range; using default");
				DEFAULT_MIN_PLAYERS
			}
			Some(n) => n,
			None => DEFAULT_MIN_PLAYERS,
		};

		let subscriber_queue_capacity = match file.server.subscriber_queue_capacity {
			Some(0) => {
				warn!("server config: subscriber_queue_capacity must be positive; using default");
				DEFAULT_SUBSCRIBER_QUEUE_CAPACITY
			}
			Some(n) => n,
			None => DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
		};

		Self {
			server: ServerSettings {
				metrics_bind: file.server.metrics_bind.filter(|s| !s.trim().is_empty()),
				health_bind: file.server.health_bind.filter(|s| !s.trim().is_empty()),
				subscriber_queue_capacity,
			},
			game: GameSettings {
				debug: file.game.debug.unwrap_or(false),
				options: GameOptions { min_players, durations },
			},
		}
	}
}

fn secs_or_default(key: &str, secs: Option<u64>, default: Duration) -> Duration {
	match secs {
		Some(0) => {
			warn!(key, "game config: phase duration must be positive; using default");
			default
		}
		Some(s) => Duration::from_secs(s),
		None => default,
	}
}

fn parse_env_bool(v: &str) -> Option<bool> {
	match v.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}

fn parse_positive<T: std::str::FromStr + PartialOrd + Default>(v: &str) -> Option<T> {
	v.trim().parse::<T>().ok().filter(|n| *n > T::default())
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn apply_env_overrides(cfg: &mut ServerConfig, env: impl Fn(&str) -> Option<String>) {
	if let Some(v) = env("WEREWOLF_METRICS_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.metrics_bind = Some(v);
			info!("server config: metrics_bind overridden by env");
		}
	}

	if let Some(v) = env("WEREWOLF_HEALTH_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.health_bind = Some(v);
			info!("server config: health_bind overridden by env");
		}
	}

	if let Some(v) = env("WEREWOLF_SUBSCRIBER_QUEUE_CAPACITY")
		&& let Some(capacity) = parse_positive::<usize>(&v)
	{
		cfg.server.subscriber_queue_capacity = capacity;
		info!(capacity, "server config: subscriber_queue_capacity overridden by env");
	}

	if let Some(v) = env("WEREWOLF_DEBUG")
		&& let Some(enabled) = parse_env_bool(&v)
	{
		cfg.game.debug = enabled;
		info!(enabled, "game config: debug overridden by env");
	}

	if let Some(v) = env("WEREWOLF_MIN_PLAYERS")
		&& let Some(min_players) = parse_positive::<u32>(&v).filter(|n| *n <= MAX_PLAYERS)
	{
		cfg.game.options.min_players = min_players;
		info!(min_players, "game config: min_players overridden by env");
	}

	let durations = &mut cfg.game.options.durations;
	for (key, slot) in [
		("WEREWOLF_NIGHT_SECS", &mut durations.night),
		("WEREWOLF_DAY_SECS", &mut durations.day_discussion),
		("WEREWOLF_TRIAL_SECS", &mut durations.trial),
		("WEREWOLF_VERDICT_SECS", &mut durations.day_verdict),
	] {
		let Some(v) = env(key) else {
			continue;
		};
		match parse_positive::<u64>(&v) {
			Some(secs) => {
				*slot = Duration::from_secs(secs);
				info!(key, secs, "game config: phase duration overridden by env");
			}
			None => warn!(key, value = %v, "game config: ignoring non-positive phase duration"),
		}
	}

	if cfg.game.debug {
		warn!("game config: debug commands are enabled");
	}
}
