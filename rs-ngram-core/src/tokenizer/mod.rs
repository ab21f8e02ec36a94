//! Tokenizer boundary.
//!
//! The n-gram core never segments text itself: it receives token ids from a
//! [`Tokenizer`] and hands generated ids back to it for decoding.
//! [`CharTokenizer`] is a small character-level implementation used by the
//! demo and the tests.

mod char_tokenizer;
mod vocabulary;

pub use char_tokenizer::CharTokenizer;
pub use vocabulary::Vocabulary;

use crate::error::Result;
use crate::model::TokenId;

/// Converts text to dense token ids and back.
///
/// Implementations must be deterministic: the same text always encodes to
/// the same ids, otherwise trained context keys cannot be reproduced at
/// generation time. Decoding must be concatenative: `decode(a ++ b)` equals
/// `decode(a) + decode(b)`, since generation decodes one token at a time.
pub trait Tokenizer {
	/// Encodes a string into token ids.
	///
	/// # Errors
	/// Returns [`Error::UnknownSymbol`](crate::Error::UnknownSymbol) if a symbol is not in the vocabulary.
	fn encode(&self, text: &str) -> Result<Vec<TokenId>>;

	/// Decodes token ids into a string.
	///
	/// # Errors
	/// Returns [`Error::UnknownTokenId`](crate::Error::UnknownTokenId) if an id is out of range.
	fn decode(&self, ids: &[TokenId]) -> Result<String>;

	/// Number of distinct tokens; valid ids are `0..vocab_size()`.
	fn vocab_size(&self) -> usize;

	/// Stable identifier recorded in trained artifacts.
	fn identifier(&self) -> String;

	/// Id to text mapping, stored in trained artifacts.
	fn vocabulary(&self) -> Vocabulary;
}
