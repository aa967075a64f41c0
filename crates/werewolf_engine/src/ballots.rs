#![forbid(unsafe_code)]

use werewolf_domain::PlayerId;

/// Per-phase ballot box: at most one entry per voter, kept in cast order.
///
/// Re-casting replaces the voter's previous entry and moves it to the end, so the
/// position of an entry is the time its current choice was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballots<V> {
	entries: Vec<(PlayerId, V)>,
}

impl<V> Default for Ballots<V> {
	fn default() -> Self {
		Self { entries: Vec::new() }
	}
}

impl<V> Ballots<V> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record `value` for `voter`, replacing any earlier entry (last vote counts).
	pub fn cast(&mut self, voter: PlayerId, value: V) {
		self.entries.retain(|(v, _)| *v != voter);
		self.entries.push((voter, value));
	}

	pub fn get(&self, voter: &PlayerId) -> Option<&V> {
		self.entries.iter().find(|(v, _)| v == voter).map(|(_, value)| value)
	}

	pub fn contains(&self, voter: &PlayerId) -> bool {
		self.entries.iter().any(|(v, _)| v == voter)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Entries in cast order.
	pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &V)> {
		self.entries.iter().map(|(voter, value)| (voter, value))
	}

	pub fn voters(&self) -> impl Iterator<Item = &PlayerId> {
		self.entries.iter().map(|(voter, _)| voter)
	}
}

/// Vote count for a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
	pub target: PlayerId,
	pub count: usize,
	/// Cast-order position of the earliest ballot naming this target.
	pub first_cast: usize,
}

impl Ballots<PlayerId> {
	/// Count ballots per target, in order of each target's first appearance.
	pub fn tally(&self) -> Vec<Tally> {
		let mut out: Vec<Tally> = Vec::new();
		for (idx, (_, target)) in self.entries.iter().enumerate() {
			match out.iter_mut().find(|t| t.target == *target) {
				Some(t) => t.count += 1,
				None => out.push(Tally {
					target: target.clone(),
					count: 1,
					first_cast: idx,
				}),
			}
		}
		out
	}

	/// Plurality target; ties go to the earliest-cast ballot, then ascending player id.
	pub fn plurality(&self) -> Option<PlayerId> {
		self.tally()
			.into_iter()
			.min_by(|a, b| {
				b.count
					.cmp(&a.count)
					.then(a.first_cast.cmp(&b.first_cast))
					.then_with(|| a.target.cmp(&b.target))
			})
			.map(|t| t.target)
	}

	/// Number of ballots naming `target`.
	pub fn count_for(&self, target: &PlayerId) -> usize {
		self.entries.iter().filter(|(_, t)| t == target).count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pid(s: &str) -> PlayerId {
		PlayerId::new(s).expect("valid PlayerId")
	}

	#[test]
	fn recast_replaces_and_moves_to_end() {
		let mut b = Ballots::new();
		b.cast(pid("a"), pid("x"));
		b.cast(pid("b"), pid("y"));
		b.cast(pid("a"), pid("z"));

		assert_eq!(b.len(), 2);
		assert_eq!(b.get(&pid("a")), Some(&pid("z")));
		let order: Vec<_> = b.voters().cloned().collect();
		assert_eq!(order, vec![pid("b"), pid("a")]);
	}

	#[test]
	fn plurality_prefers_highest_count() {
		let mut b = Ballots::new();
		b.cast(pid("a"), pid("x"));
		b.cast(pid("b"), pid("x"));
		b.cast(pid("c"), pid("y"));
		assert_eq!(b.plurality(), Some(pid("x")));
	}

	#[test]
	fn plurality_tie_goes_to_earliest_cast() {
		let mut b = Ballots::new();
		b.cast(pid("a"), pid("x"));
		b.cast(pid("b"), pid("y"));
		assert_eq!(b.plurality(), Some(pid("x")));

		let mut b = Ballots::new();
		b.cast(pid("a"), pid("y"));
		b.cast(pid("b"), pid("x"));
		assert_eq!(b.plurality(), Some(pid("y")));
	}

	#[test]
	fn tie_order_follows_recast_time() {
		let mut b = Ballots::new();
		b.cast(pid("a"), pid("x"));
		b.cast(pid("b"), pid("y"));
		// a changes their mind to x again: now y was cast first.
		b.cast(pid("a"), pid("x"));
		assert_eq!(b.plurality(), Some(pid("y")));
	}

	#[test]
	fn empty_ballots_have_no_plurality() {
		let b: Ballots<PlayerId> = Ballots::new();
		assert!(b.plurality().is_none());
		assert!(b.tally().is_empty());
	}
}
