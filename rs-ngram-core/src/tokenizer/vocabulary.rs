use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::TokenId;

/// Bidirectional mapping between token text and a dense id.
///
/// Ids are contiguous from `0` to `len - 1`, in insertion order.
///
/// # Invariants
/// - `by_id[id]` and `by_text[&by_id[id]] == id` always agree
/// - No token text appears twice
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
	by_id: Vec<String>,
	by_text: HashMap<String, TokenId>,
}

impl Vocabulary {
	/// Builds a vocabulary from token texts in order.
	///
	/// Duplicates are skipped, the first occurrence keeps its id.
	pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
		let mut vocabulary = Self { by_id: Vec::new(), by_text: HashMap::new() };
		for token in tokens {
			vocabulary.insert(token);
		}
		vocabulary
	}

	fn insert(&mut self, token: String) {
		if self.by_text.contains_key(&token) {
			return;
		}
		let id = self.by_id.len() as TokenId;
		self.by_text.insert(token.clone(), id);
		self.by_id.push(token);
	}

	pub fn len(&self) -> usize {
		self.by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_id.is_empty()
	}

	/// Returns the text of `id`, or `None` if the id is out of range.
	pub fn token(&self, id: TokenId) -> Option<&str> {
		self.by_id.get(id as usize).map(String::as_str)
	}

	/// Returns the id of `token`, or `None` if it is unknown.
	pub fn id(&self, token: &str) -> Option<TokenId> {
		self.by_text.get(token).copied()
	}

	pub fn tokens(&self) -> impl Iterator<Item = &str> {
		self.by_id.iter().map(String::as_str)
	}
}

impl From<Vec<String>> for Vocabulary {
	fn from(tokens: Vec<String>) -> Self {
		Self::new(tokens)
	}
}

impl From<Vocabulary> for Vec<String> {
	fn from(vocabulary: Vocabulary) -> Self {
		vocabulary.by_id
	}
}
