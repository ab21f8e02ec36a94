use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::TokenId;

/// Next-token counts observed after one context.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges are
/// weighted by their number of observations.
///
/// ## Invariants
/// - Each occurrence count is strictly positive (entries are only created by
///   [`Followers::add`])
/// - Counts only grow during training and are never modified afterwards
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Followers {
	/// Example: { 4 => 42, 17 => 3 }
	transitions: HashMap<TokenId, u64>,
}

impl Followers {
	/// Records one occurrence of `next`.
	pub fn add(&mut self, next: TokenId) {
		*self.transitions.entry(next).or_insert(0) += 1;
	}

	pub fn count(&self, next: TokenId) -> u64 {
		self.transitions.get(&next).copied().unwrap_or(0)
	}

	/// Sum of all occurrence counts.
	pub fn total(&self) -> u64 {
		self.transitions.values().sum()
	}

	/// Number of distinct next tokens.
	pub fn distinct(&self) -> usize {
		self.transitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}

	/// Iterates `(next token, count)` pairs in unspecified order.
	pub fn iter(&self) -> impl Iterator<Item = (TokenId, u64)> + '_ {
		self.transitions.iter().map(|(next, count)| (*next, *count))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn add_accumulates_counts() {
		let mut followers = Followers::default();
		followers.add(3);
		followers.add(3);
		followers.add(1);

		assert_eq!(followers.count(3), 2);
		assert_eq!(followers.count(1), 1);
		assert_eq!(followers.count(9), 0);
		assert_eq!(followers.total(), 3);
		assert_eq!(followers.distinct(), 2);
	}

	#[test]
	fn new_followers_are_empty() {
		let followers = Followers::default();
		assert!(followers.is_empty());
		assert_eq!(followers.total(), 0);
	}
}
