use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Tokenizer, Vocabulary};
use crate::error::{Error, Result};
use crate::model::TokenId;

/// Character-level tokenizer: one token per Unicode scalar value.
///
/// The vocabulary is the sorted set of characters seen in the corpus, so
/// building it twice from the same text yields identical ids.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CharTokenizer {
	vocabulary: Vocabulary,
}

impl CharTokenizer {
	/// Builds a tokenizer covering every character of `corpus`.
	pub fn from_corpus(corpus: &str) -> Self {
		let chars: BTreeSet<char> = corpus.chars().collect();
		Self { vocabulary: Vocabulary::new(chars.into_iter().map(String::from)) }
	}

	/// Builds a tokenizer over an existing vocabulary.
	///
	/// # Errors
	/// Returns [`Error::UnknownSymbol`] if an entry is not exactly one character.
	pub fn from_vocabulary(vocabulary: Vocabulary) -> Result<Self> {
		if let Some(bad) = vocabulary.tokens().find(|token| token.chars().count() != 1) {
			return Err(Error::UnknownSymbol(bad.to_owned()));
		}
		Ok(Self { vocabulary })
	}
}

impl Tokenizer for CharTokenizer {
	fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
		let mut buffer = [0u8; 4];
		text.chars()
			.map(|c| {
				let symbol: &str = c.encode_utf8(&mut buffer);
				self.vocabulary.id(symbol).ok_or_else(|| Error::UnknownSymbol(symbol.to_owned()))
			})
			.collect()
	}

	fn decode(&self, ids: &[TokenId]) -> Result<String> {
		ids.iter()
			.map(|&id| {
				self.vocabulary.token(id).ok_or(Error::UnknownTokenId {
					id,
					vocab_size: self.vocabulary.len(),
				})
			})
			.collect()
	}

	fn vocab_size(&self) -> usize {
		self.vocabulary.len()
	}

	/// `char-<fnv1a of the vocabulary>`, so two tokenizers built from different
	/// character sets never share an identifier.
	fn identifier(&self) -> String {
		const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
		const PRIME: u64 = 0x0000_0100_0000_01b3;

		let mut hash = OFFSET;
		for token in self.vocabulary.tokens() {
			for byte in token.bytes().chain(std::iter::once(0xff)) {
				hash ^= u64::from(byte);
				hash = hash.wrapping_mul(PRIME);
			}
		}
		format!("char-{hash:016x}")
	}

	fn vocabulary(&self) -> Vocabulary {
		self.vocabulary.clone()
	}
}
