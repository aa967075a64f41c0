use rand::SeedableRng;
use rand::rngs::StdRng;
use werewolf_domain::{AccountId, GameId, Phase, PlayerId, Role, VerdictChoice, Winner};
use werewolf_engine::{
	GameOptions, GameState, OptionOverrides, PlayerIdentity, add_player_to_lobby, are_all_verdict_votes_in,
	are_night_votes_complete, build_game_view, create_initial_game, record_night_vote, record_nomination,
	record_verdict_vote, resolve_day_verdict, resolve_night, skip_day_to_night, start_day_verdict,
	start_game_with_rng,
};

const NOW: i64 = 1_700_000_000_000;

fn pid(s: &str) -> PlayerId {
	PlayerId::new(s).expect("valid PlayerId")
}

fn identity(id: &str) -> PlayerIdentity {
	PlayerIdentity {
		account_id: AccountId::new(format!("acct-{id}")).expect("valid AccountId"),
		player_id: pid(id),
		name: format!("Player {id}"),
	}
}

fn lobby_of(ids: &[&str], min_players: i64) -> GameState {
	let mut state = create_initial_game(
		GameId::new("game-1").expect("valid GameId"),
		identity(ids[0]),
		&GameOptions::default(),
		&OptionOverrides {
			min_players: Some(min_players),
		},
	)
	.expect("create game");
	for id in &ids[1..] {
		state = add_player_to_lobby(&state, identity(id)).expect("join lobby");
	}
	state
}

/// A game forced into `phase` with the given traitors; everyone else is a subject.
fn running(phase: Phase, traitors: &[&str], subjects: &[&str]) -> GameState {
	let ids: Vec<&str> = traitors.iter().chain(subjects.iter()).copied().collect();
	let mut state = lobby_of(&ids, 1);
	for p in state.players.iter_mut() {
		p.role = Some(if traitors.contains(&p.player_id.as_str()) {
			Role::Traitor
		} else {
			Role::Subject
		});
	}
	state.phase = phase;
	state.day_number = 1;
	state.night_number = 1;
	state.phase_ends_at = NOW;
	state
}

fn traitor_ids(state: &GameState) -> Vec<PlayerId> {
	state
		.players
		.iter()
		.filter(|p| p.role == Some(Role::Traitor))
		.map(|p| p.player_id.clone())
		.collect()
}

#[test]
fn four_player_game_starts_with_one_traitor_at_night() {
	let state = lobby_of(&["h", "a", "b", "c"], 4);
	assert_eq!(state.players.len(), 4);

	let mut rng = StdRng::seed_from_u64(42);
	let started = start_game_with_rng(&state, &pid("h"), NOW, &mut rng).expect("start");

	assert_eq!(started.phase, Phase::Night);
	assert_eq!(started.night_number, 1);
	assert_eq!(traitor_ids(&started).len(), 1);
	assert!(started.players.iter().all(|p| p.alive));
}

#[test]
fn unanimous_traitors_kill_subject_and_day_begins() {
	let mut rng = StdRng::seed_from_u64(3);
	let state = lobby_of(&["h", "a", "b", "c", "d", "e", "f", "g"], 4);
	let night = start_game_with_rng(&state, &pid("h"), NOW, &mut rng).expect("start");

	let traitors = traitor_ids(&night);
	let victim = night
		.players
		.iter()
		.find(|p| p.role == Some(Role::Subject))
		.map(|p| p.player_id.clone())
		.expect("a subject");

	let mut s = night.clone();
	for t in &traitors {
		s = record_night_vote(&s, t, &victim).expect("night vote");
	}
	assert!(are_night_votes_complete(&s));

	let day = resolve_night(&s, NOW + 5).expect("resolve night");
	assert_eq!(day.phase, Phase::DayDiscussion);
	assert_eq!(day.day_number, night.day_number + 1);
	assert_eq!(day.last_killed_id, Some(victim.clone()));
	assert!(!day.player(&victim).unwrap().alive);
	assert!(day.night_votes.is_empty());
	assert_eq!(day.phase_ends_at, NOW + 5 + 120_000);
}

#[test]
fn night_plurality_and_tie_break() {
	let state = running(Phase::Night, &["a", "b", "c"], &["x", "y", "z", "w", "v", "u"]);

	let s = record_night_vote(&state, &pid("a"), &pid("x")).unwrap();
	let s = record_night_vote(&s, &pid("b"), &pid("x")).unwrap();
	let s = record_night_vote(&s, &pid("c"), &pid("y")).unwrap();
	let resolved = resolve_night(&s, NOW).unwrap();
	assert_eq!(resolved.last_killed_id, Some(pid("x")));

	let s = record_night_vote(&state, &pid("a"), &pid("x")).unwrap();
	let s = record_night_vote(&s, &pid("b"), &pid("y")).unwrap();
	let resolved = resolve_night(&s, NOW).unwrap();
	assert_eq!(resolved.last_killed_id, Some(pid("x")));
	assert!(resolved.player(&pid("y")).unwrap().alive);
}

#[test]
fn nomination_needs_strict_majority_of_the_living() {
	let state = running(Phase::DayDiscussion, &["t"], &["a", "b", "c", "d", "e"]);
	assert_eq!(state.alive_count(), 6);

	let mut s = state.clone();
	for n in ["a", "b", "c"] {
		s = record_nomination(&s, &pid(n), &pid("t"), NOW).unwrap();
	}
	assert_eq!(s.phase, Phase::DayDiscussion);
	assert!(s.accused_id.is_none());

	let s = record_nomination(&s, &pid("d"), &pid("t"), NOW + 1).unwrap();
	assert_eq!(s.phase, Phase::Trial);
	assert_eq!(s.accused_id, Some(pid("t")));
	assert!(s.nominations.is_empty());
	assert_eq!(s.phase_ends_at, NOW + 1 + 30_000);
}

#[test]
fn changing_a_nomination_moves_the_vote() {
	let state = running(Phase::DayDiscussion, &["t"], &["a", "b", "c", "d", "e"]);
	let s = record_nomination(&state, &pid("a"), &pid("t"), NOW).unwrap();
	let s = record_nomination(&s, &pid("a"), &pid("b"), NOW).unwrap();
	assert_eq!(s.nominations.len(), 1);
	assert_eq!(s.nominations.count_for(&pid("t")), 0);
	assert_eq!(s.nominations.count_for(&pid("b")), 1);
}

fn verdict_with(hangs: &[&str], spares: &[&str]) -> GameState {
	// 7 alive: accused + 5 eligible voters + 1 more traitor so nobody wins on the hang.
	let mut state = running(Phase::Trial, &["t1", "t2"], &["acc", "a", "b", "c", "d"]);
	state.accused_id = Some(pid("acc"));
	let mut s = start_day_verdict(&state, NOW).unwrap();
	assert_eq!(s.verdict_voters().count(), 6);

	// Kill t2 so exactly 5 voters remain eligible.
	s.players.iter_mut().find(|p| p.player_id.as_str() == "t2").unwrap().alive = false;
	assert_eq!(s.verdict_voters().count(), 5);

	for v in hangs {
		s = record_verdict_vote(&s, &pid(v), VerdictChoice::Hang).unwrap();
	}
	for v in spares {
		s = record_verdict_vote(&s, &pid(v), VerdictChoice::Spare).unwrap();
	}
	s
}

#[test]
fn three_of_five_hang_executes() {
	let s = verdict_with(&["a", "b", "c"], &[]);
	assert!(!are_all_verdict_votes_in(&s));
	let next = resolve_day_verdict(&s, NOW).unwrap();
	assert!(!next.player(&pid("acc")).unwrap().alive);
	assert_eq!(next.phase, Phase::Night);
	assert!(next.accused_id.is_none());
	assert!(next.verdict_votes.is_empty());
}

#[test]
fn two_of_five_hang_spares() {
	let s = verdict_with(&["a", "b"], &[]);
	let next = resolve_day_verdict(&s, NOW).unwrap();
	assert!(next.player(&pid("acc")).unwrap().alive);
	assert_eq!(next.phase, Phase::Night);
	assert_eq!(next.night_number, s.night_number + 1);
}

#[test]
fn all_votes_in_detects_completion() {
	let s = verdict_with(&["a", "b"], &["c", "d", "t1"]);
	assert!(are_all_verdict_votes_in(&s));
}

#[test]
fn day_timeout_without_majority_skips_to_night() {
	let mut state = running(Phase::DayDiscussion, &["t"], &["a", "b", "c", "d"]);
	state.last_killed_id = Some(pid("d"));
	state.players.iter_mut().find(|p| p.player_id.as_str() == "d").unwrap().alive = false;

	let s = record_nomination(&state, &pid("a"), &pid("b"), NOW).unwrap();
	let next = skip_day_to_night(&s, NOW + 10).unwrap();

	assert_eq!(next.phase, Phase::Night);
	assert_eq!(next.night_number, state.night_number + 1);
	assert_eq!(next.last_killed_id, state.last_killed_id);
	assert!(next.nominations.is_empty());
	assert_eq!(next.phase_ends_at, NOW + 10 + 60_000);
}

#[test]
fn game_over_is_terminal() {
	let state = running(Phase::Night, &["t"], &["a", "b"]);
	let s = record_night_vote(&state, &pid("t"), &pid("a")).unwrap();
	let over = resolve_night(&s, NOW).unwrap();
	assert_eq!(over.phase, Phase::GameOver);
	assert_eq!(over.winner, Some(Winner::Traitors));

	assert_eq!(record_night_vote(&over, &pid("t"), &pid("b")).unwrap_err().code(), "WRONG_PHASE");
	assert_eq!(record_nomination(&over, &pid("b"), &pid("t"), NOW).unwrap_err().code(), "WRONG_PHASE");
	assert_eq!(record_verdict_vote(&over, &pid("b"), VerdictChoice::Hang).unwrap_err().code(), "WRONG_PHASE");
	assert!(resolve_night(&over, NOW).is_err());
	assert!(skip_day_to_night(&over, NOW).is_err());
	assert!(start_day_verdict(&over, NOW).is_err());
	assert!(resolve_day_verdict(&over, NOW).is_err());
	assert!(werewolf_engine::apply_timeout(&over, NOW).is_err());
}

#[test]
fn reassembled_views_reproduce_only_own_roles() {
	let mut rng = StdRng::seed_from_u64(11);
	let state = lobby_of(&["h", "a", "b", "c", "d", "e", "f", "g"], 4);
	let state = start_game_with_rng(&state, &pid("h"), NOW, &mut rng).unwrap();

	for viewer in &state.players {
		let view = build_game_view(&state, &viewer.player_id).unwrap();
		assert_eq!(view.you.player.player_id, viewer.player_id);
		assert_eq!(view.you.role, viewer.role);
		assert_eq!(view.players.len(), state.players.len());

		let json = serde_json::to_value(&view).unwrap();
		let text = json["players"].to_string();
		assert!(!text.contains("TRAITOR") && !text.contains("SUBJECT"));
	}

	let reassembled: Vec<(PlayerId, Option<Role>)> = state
		.players
		.iter()
		.map(|p| {
			let v = build_game_view(&state, &p.player_id).unwrap();
			(v.you.player.player_id, v.you.role)
		})
		.collect();
	let expected: Vec<(PlayerId, Option<Role>)> =
		state.players.iter().map(|p| (p.player_id.clone(), p.role)).collect();
	assert_eq!(reassembled, expected);
}
