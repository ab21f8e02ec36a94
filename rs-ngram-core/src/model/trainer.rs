use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::TokenId;
use super::artifact::{Artifact, Metadata};
use super::count_table::CountTable;
use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;

/// Which smoothing family an artifact is trained for.
///
/// Kneser-Ney needs continuation counts on top of the raw tables, Simple
/// Backoff does not.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmoothingKind {
	SimpleBackoff,
	KneserNey,
}

/// Training parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainerConfig {
	/// Highest n-gram order (1 = unigram).
	pub order: usize,
	pub smoothing: SmoothingKind,
}

impl Default for TrainerConfig {
	fn default() -> Self {
		Self { order: 3, smoothing: SmoothingKind::KneserNey }
	}
}

/// Builds an [`Artifact`] from tokenized text in a single pass.
#[derive(Clone, Debug)]
pub struct Trainer {
	config: TrainerConfig,
}

impl Trainer {
	/// # Errors
	/// Returns [`Error::InvalidOrder`] if `config.order < 1`.
	pub fn new(config: TrainerConfig) -> Result<Self> {
		if config.order < 1 {
			return Err(Error::InvalidOrder(config.order));
		}
		Ok(Self { config })
	}

	pub fn config(&self) -> &TrainerConfig {
		&self.config
	}

	/// Trains on a single token sequence.
	///
	/// # Errors
	/// - [`Error::EmptyCorpus`] if `token_ids` is empty
	/// - [`Error::UnknownTokenId`] if an id is outside the tokenizer vocabulary
	pub fn train<T>(&self, token_ids: &[TokenId], tokenizer: &T) -> Result<Artifact>
	where
		T: Tokenizer + ?Sized,
	{
		self.train_documents([token_ids], tokenizer)
	}

	/// Trains on several independent sequences (lines, sentences, files...).
	///
	/// Windows never span two sequences. For every position `i` of a sequence
	/// and every order `k` with `k <= i + 1`, the table of order `k` receives
	/// one occurrence of `ids[i]` after `ids[i + 1 - k..i]`, so all lower
	/// orders are filled in the same pass.
	///
	/// # Errors
	/// - [`Error::EmptyCorpus`] if no sequence holds any token
	/// - [`Error::UnknownTokenId`] if an id is outside the tokenizer vocabulary
	pub fn train_documents<'a, I, T>(&self, documents: I, tokenizer: &T) -> Result<Artifact>
	where
		I: IntoIterator<Item = &'a [TokenId]>,
		T: Tokenizer + ?Sized,
	{
		let order = self.config.order;
		let vocabulary = tokenizer.vocabulary();
		let vocab_size = vocabulary.len();

		let mut tables = (1..=order).map(CountTable::new).collect::<Result<Vec<_>>>()?;
		let mut total_tokens: u64 = 0;

		for ids in documents {
			if let Some(&id) = ids.iter().find(|&&id| id as usize >= vocab_size) {
				return Err(Error::UnknownTokenId { id, vocab_size });
			}

			for i in 0..ids.len() {
				let next = ids[i];
				for (k, table) in tables.iter_mut().enumerate().take(i + 1) {
					// table of order k + 1, context of k tokens
					table.add(&ids[i - k..i], next);
				}
			}
			total_tokens += ids.len() as u64;
		}

		if total_tokens == 0 {
			return Err(Error::EmptyCorpus);
		}

		for table in &tables {
			log::debug!(
				"order {}: {} contexts, {} distinct n-grams",
				table.order(),
				table.len(),
				table.pair_count()
			);
		}

		let continuation = match self.config.smoothing {
			SmoothingKind::KneserNey => Some(continuation_tables(&tables)?),
			SmoothingKind::SimpleBackoff => None,
		};

		let metadata = Metadata::new(
			order,
			total_tokens,
			unix_timestamp(),
			tokenizer.identifier(),
			self.config.smoothing,
		);

		log::info!(
			"trained order-{} model on {} tokens (vocabulary {})",
			order,
			total_tokens,
			vocab_size
		);

		Ok(Artifact::new(vocabulary, tables, continuation, metadata))
	}
}

/// Derives the continuation tables for orders `1..order`.
///
/// Entry `(context, w)` of the order-`k` continuation table counts the
/// distinct tokens `v` such that `(v, context..., w)` was observed at order
/// `k + 1`. Since each `(higher context, w)` pair is stored once in the
/// higher table, counting pairs by suffix gives exactly that number.
fn continuation_tables(tables: &[CountTable]) -> Result<Vec<CountTable>> {
	let mut continuation = Vec::with_capacity(tables.len().saturating_sub(1));

	for higher in tables.iter().skip(1) {
		let mut table = CountTable::new(higher.order() - 1)?;
		for (context, followers) in higher.iter() {
			let suffix = &context.tokens()[1..];
			for (next, _) in followers.iter() {
				table.add(suffix, next);
			}
		}
		continuation.push(table);
	}

	Ok(continuation)
}

fn unix_timestamp() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tokenizer::CharTokenizer;

	const A: TokenId = 0;
	const B: TokenId = 1;
	const C: TokenId = 2;
	const D: TokenId = 3;

	fn abcd() -> CharTokenizer {
		CharTokenizer::from_corpus("ABCD")
	}

	fn train(order: usize, smoothing: SmoothingKind, ids: &[TokenId]) -> Artifact {
		Trainer::new(TrainerConfig { order, smoothing }).unwrap().train(ids, &abcd()).unwrap()
	}

	#[test]
	fn counts_every_order_in_one_pass() {
		let artifact = train(3, SmoothingKind::SimpleBackoff, &[A, B, C, A, B, D]);

		let unigram = artifact.table(1).unwrap().followers(&[]).unwrap();
		assert_eq!(unigram.count(A), 2);
		assert_eq!(unigram.count(B), 2);
		assert_eq!(unigram.count(C), 1);
		assert_eq!(unigram.count(D), 1);

		let bigram = artifact.table(2).unwrap();
		assert_eq!(bigram.len(), 3);
		assert_eq!(bigram.followers(&[A]).unwrap().count(B), 2);
		assert_eq!(bigram.followers(&[B]).unwrap().count(C), 1);
		assert_eq!(bigram.followers(&[B]).unwrap().count(D), 1);
		assert_eq!(bigram.followers(&[C]).unwrap().count(A), 1);
		assert!(bigram.followers(&[D]).is_none());

		let trigram = artifact.table(3).unwrap();
		assert_eq!(trigram.followers(&[A, B]).unwrap().distinct(), 2);
		assert_eq!(trigram.followers(&[B, C]).unwrap().count(A), 1);
		assert_eq!(trigram.followers(&[C, A]).unwrap().count(B), 1);

		assert_eq!(artifact.metadata().total_tokens, 6);
		assert_eq!(artifact.metadata().order, 3);
	}

	#[test]
	fn no_zero_counts_are_stored() {
		let artifact = train(4, SmoothingKind::KneserNey, &[A, B, C, A, B, D, D, A, C]);
		let tables = (1..=4)
			.filter_map(|order| artifact.table(order))
			.chain((1..4).filter_map(|order| artifact.continuation_table(order)));
		for table in tables {
			for (_, followers) in table.iter() {
				assert!(followers.iter().all(|(_, count)| count >= 1));
			}
		}
	}

	#[test]
	fn empty_corpus_is_fatal() {
		let trainer = Trainer::new(TrainerConfig::default()).unwrap();
		assert!(matches!(trainer.train(&[], &abcd()), Err(Error::EmptyCorpus)));

		let empty: [&[TokenId]; 2] = [&[], &[]];
		assert!(matches!(trainer.train_documents(empty, &abcd()), Err(Error::EmptyCorpus)));
	}

	#[test]
	fn order_zero_is_rejected() {
		let config = TrainerConfig { order: 0, smoothing: SmoothingKind::SimpleBackoff };
		assert!(matches!(Trainer::new(config), Err(Error::InvalidOrder(0))));
	}

	#[test]
	fn ids_outside_vocabulary_are_rejected() {
		let trainer = Trainer::new(TrainerConfig::default()).unwrap();
		assert!(matches!(
			trainer.train(&[A, 9], &abcd()),
			Err(Error::UnknownTokenId { id: 9, vocab_size: 4 })
		));
	}

	#[test]
	fn windows_do_not_cross_documents() {
		let trainer = Trainer::new(TrainerConfig { order: 2, smoothing: SmoothingKind::SimpleBackoff }).unwrap();
		let documents: [&[TokenId]; 2] = [&[A, B], &[C, D]];
		let artifact = trainer.train_documents(documents, &abcd()).unwrap();

		assert!(artifact.table(2).unwrap().followers(&[B]).is_none());
		assert_eq!(artifact.metadata().total_tokens, 4);
	}

	#[test]
	fn continuation_counts_distinct_left_contexts() {
		// B is preceded by A twice and by D once: two distinct left contexts
		let artifact = train(2, SmoothingKind::KneserNey, &[A, B, C, A, B, D, B]);
		let continuation = artifact.continuation_table(1).unwrap();
		let unigram = continuation.followers(&[]).unwrap();

		assert_eq!(unigram.count(B), 2);
		assert_eq!(unigram.count(C), 1);
		assert_eq!(unigram.count(A), 1);
		assert_eq!(unigram.count(D), 1);
	}

	#[test]
	fn backoff_training_skips_continuation_tables() {
		let artifact = train(3, SmoothingKind::SimpleBackoff, &[A, B, C]);
		assert!(!artifact.has_continuation_counts());
	}
}
