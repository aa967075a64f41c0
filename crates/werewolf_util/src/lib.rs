#![forbid(unsafe_code)]

pub mod endpoint {
	use std::net::SocketAddr;

	use thiserror::Error;

	pub const WS_SCHEME: &str = "ws://";

	#[derive(Debug, Error, Clone, PartialEq, Eq)]
	pub enum EndpointError {
		#[error("endpoint must be non-empty (expected ws://host:port)")]
		Empty,

		#[error("invalid endpoint (expected ws://host:port): {0}")]
		Scheme(String),

		#[error("endpoint must not carry a path, query or fragment: {0}")]
		Trailing(String),

		#[error("invalid endpoint host: {0}")]
		Host(String),

		#[error("IPv6 hosts must be bracketed like ws://[::1]:8080: {0}")]
		UnbracketedIpv6(String),

		#[error("invalid endpoint port (expected 1..=65535): {0}")]
		Port(String),

		#[error("bind host must be an IP literal: {0}")]
		NotIpLiteral(String),
	}

	/// Parsed `ws://host:port` listen endpoint.
	#[derive(Debug, Clone, PartialEq, Eq, Hash)]
	pub struct WsEndpoint {
		pub host: String,
		pub port: u16,
	}

	impl WsEndpoint {
		/// `host:port`, IPv6 stays bracketed.
		pub fn hostport(&self) -> String {
			format!("{}:{}", self.host, self.port)
		}

		/// Resolve to a bindable address; DNS names are not looked up.
		pub fn socket_addr(&self) -> Result<SocketAddr, EndpointError> {
			self.hostport()
				.parse()
				.map_err(|_| EndpointError::NotIpLiteral(self.host.clone()))
		}

		pub fn parse(s: &str) -> Result<Self, EndpointError> {
			let s = s.trim();
			if s.is_empty() {
				return Err(EndpointError::Empty);
			}

			let rest = s
				.strip_prefix(WS_SCHEME)
				.ok_or_else(|| EndpointError::Scheme(s.to_string()))?;

			// A single trailing slash is what most clients print for a bare origin.
			let rest = rest.strip_suffix('/').unwrap_or(rest);
			if rest.contains(['/', '?', '#']) {
				return Err(EndpointError::Trailing(s.to_string()));
			}

			let (host, port) = rest
				.rsplit_once(':')
				.ok_or_else(|| EndpointError::Port(s.to_string()))?;

			let host = host.trim();
			if host.is_empty() {
				return Err(EndpointError::Host(s.to_string()));
			}
			if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
				return Err(EndpointError::UnbracketedIpv6(s.to_string()));
			}

			let port = match port.trim().parse::<u16>() {
				Ok(p) if p != 0 => p,
				_ => return Err(EndpointError::Port(s.to_string())),
			};

			Ok(Self {
				host: host.to_string(),
				port,
			})
		}
	}

	impl std::fmt::Display for WsEndpoint {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			write!(f, "{WS_SCHEME}{}", self.hostport())
		}
	}

	impl std::str::FromStr for WsEndpoint {
		type Err = EndpointError;

		fn from_str(s: &str) -> Result<Self, Self::Err> {
			Self::parse(s)
		}
	}

}
