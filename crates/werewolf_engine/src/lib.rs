#![forbid(unsafe_code)]

pub mod ballots;
pub mod debug;
pub mod error;
pub mod state;
pub mod transitions;
pub mod view;

pub use ballots::{Ballots, Tally};
pub use debug::populate_lobby_with_bots;
pub use error::RuleError;
pub use state::{
	DEFAULT_MIN_PLAYERS, GameOptions, GameState, MAX_PLAYERS, OptionOverrides, PhaseDurations, Player, PlayerIdentity,
};
pub use transitions::{
	TimeoutTransition, add_player_to_lobby, apply_timeout, are_all_verdict_votes_in, are_night_votes_complete,
	create_initial_game, evaluate_winner, majority_of, record_night_vote, record_nomination, record_verdict_vote,
	remove_player_from_lobby, resolve_day_verdict, resolve_night, set_player_connection, skip_day_to_night,
	start_day_verdict, start_game, start_game_with_rng, timeout_transition, traitor_count,
};
pub use view::{GameView, PublicPlayerView, SelfPlayerView, build_game_view};
