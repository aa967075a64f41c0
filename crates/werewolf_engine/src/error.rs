#![forbid(unsafe_code)]

use thiserror::Error;
use werewolf_domain::Phase;

/// Rule violations raised by engine transitions.
///
/// All of these are recoverable: the offending command is rejected and the game
/// state is left untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
	#[error("game not found")]
	GameNotFound,

	#[error("action not allowed during {0}")]
	WrongPhase(Phase),

	#[error("player already in game")]
	DuplicatePlayer,

	#[error("player not found in game")]
	PlayerNotFound,

	#[error("only the host may do that")]
	NotHost,

	#[error("need at least {required} players to start, have {present}")]
	NotEnoughPlayers { required: u32, present: usize },

	#[error("{0}")]
	NotEligible(&'static str),

	#[error("{0}")]
	InvalidTarget(&'static str),

	#[error("invalid game options: {0}")]
	InvalidOptions(String),

	#[error("{0}")]
	InvalidDebug(String),
}

impl RuleError {
	/// Stable wire code.
	pub const fn code(&self) -> &'static str {
		match self {
			RuleError::GameNotFound => "GAME_NOT_FOUND",
			RuleError::WrongPhase(_) => "WRONG_PHASE",
			RuleError::DuplicatePlayer => "DUPLICATE_PLAYER",
			RuleError::PlayerNotFound => "PLAYER_NOT_FOUND",
			RuleError::NotHost => "NOT_HOST",
			RuleError::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
			RuleError::NotEligible(_) => "NOT_ELIGIBLE",
			RuleError::InvalidTarget(_) => "INVALID_TARGET",
			RuleError::InvalidOptions(_) => "INVALID_OPTIONS",
			RuleError::InvalidDebug(_) => "INVALID_DEBUG",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_stable() {
		assert_eq!(RuleError::WrongPhase(Phase::Night).code(), "WRONG_PHASE");
		assert_eq!(
			RuleError::NotEnoughPlayers {
				required: 4,
				present: 2
			}
			.code(),
			"NOT_ENOUGH_PLAYERS"
		);
		assert_eq!(RuleError::InvalidDebug("x".into()).code(), "INVALID_DEBUG");
	}

	#[test]
	fn messages_carry_context() {
		let err = RuleError::NotEnoughPlayers {
			required: 4,
			present: 2,
		};
		assert_eq!(err.to_string(), "need at least 4 players to start, have 2");
		assert_eq!(
			RuleError::WrongPhase(Phase::DayVerdict).to_string(),
			"action not allowed during DAY_VERDICT"
		);
	}
}
