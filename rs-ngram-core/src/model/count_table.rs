use std::borrow::Borrow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::TokenId;
use super::followers::Followers;
use crate::error::{Error, Result};

/// Owned context of an n-gram: the `order - 1` tokens preceding the next one.
///
/// Hashes exactly like the underlying slice, so tables can be queried with
/// `&[TokenId]` without allocating.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextKey(Vec<TokenId>);

impl ContextKey {
	pub fn tokens(&self) -> &[TokenId] {
		&self.0
	}
}

impl From<&[TokenId]> for ContextKey {
	fn from(tokens: &[TokenId]) -> Self {
		Self(tokens.to_vec())
	}
}

impl Borrow<[TokenId]> for ContextKey {
	fn borrow(&self) -> &[TokenId] {
		&self.0
	}
}

/// Frequency table of a single n-gram order.
///
/// Maps every observed context (length `order - 1`) to the counts of the
/// tokens that followed it. The same structure also stores Kneser-Ney
/// continuation counts, where a count is the number of distinct tokens seen
/// in front of `(context, next)` one order up.
///
/// # Invariants
/// - `order` is always >= 1
/// - Every key has exactly `order - 1` tokens
/// - Every stored count is >= 1
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CountTable {
	order: usize,
	contexts: HashMap<ContextKey, Followers>,
}

impl CountTable {
	/// Creates an empty table of order `order`.
	///
	/// # Errors
	/// Returns [`Error::InvalidOrder`] if `order < 1`.
	pub fn new(order: usize) -> Result<Self> {
		if order < 1 {
			return Err(Error::InvalidOrder(order));
		}
		Ok(Self { order, contexts: HashMap::new() })
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Records one occurrence of `next` after `context`.
	///
	/// `context` must hold exactly `order - 1` tokens.
	pub(crate) fn add(&mut self, context: &[TokenId], next: TokenId) {
		debug_assert_eq!(context.len(), self.order - 1);
		match self.contexts.get_mut(context) {
			Some(followers) => followers.add(next),
			None => {
				let mut followers = Followers::default();
				followers.add(next);
				self.contexts.insert(ContextKey::from(context), followers);
			}
		}
	}

	/// Returns the followers of `context`, if it was ever observed.
	pub fn followers(&self, context: &[TokenId]) -> Option<&Followers> {
		self.contexts.get(context)
	}

	/// Number of distinct contexts.
	pub fn len(&self) -> usize {
		self.contexts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.contexts.is_empty()
	}

	/// Number of distinct `(context, next)` pairs.
	pub fn pair_count(&self) -> usize {
		self.contexts.values().map(Followers::distinct).sum()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&ContextKey, &Followers)> {
		self.contexts.iter()
	}

	/// Checks the structural invariants of a deserialized table.
	pub(crate) fn validate(&self, expected_order: usize, vocab_size: usize) -> Result<()> {
		if self.order != expected_order {
			return Err(Error::ArtifactCorrupt(format!(
				"table declares order {} at position of order {}",
				self.order, expected_order
			)));
		}
		let in_vocab = |id: TokenId| (id as usize) < vocab_size;

		for (context, followers) in &self.contexts {
			if context.tokens().len() != self.order - 1 {
				return Err(Error::ArtifactCorrupt(format!(
					"order {} context {:?} has {} tokens",
					self.order,
					context.tokens(),
					context.tokens().len()
				)));
			}
			if let Some(id) = context.tokens().iter().copied().find(|id| !in_vocab(*id)) {
				return Err(Error::ArtifactCorrupt(format!("context token id {id} outside vocabulary of {vocab_size}")));
			}
			if followers.is_empty() {
				return Err(Error::ArtifactCorrupt(format!("order {} context {:?} has no followers", self.order, context.tokens())));
			}
			for (next, count) in followers.iter() {
				if !in_vocab(next) {
					return Err(Error::ArtifactCorrupt(format!("token id {next} outside vocabulary of {vocab_size}")));
				}
				if count == 0 {
					return Err(Error::ArtifactCorrupt(format!("zero count stored for token {next} at order {}", self.order)));
				}
			}
		}
		Ok(())
	}
}
