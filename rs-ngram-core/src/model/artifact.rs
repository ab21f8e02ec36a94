use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::count_table::CountTable;
use super::trainer::{SmoothingKind, Trainer, TrainerConfig};
use super::TokenId;
use crate::error::{Error, Result};
use crate::io::{cached_artifact_path, read_corpus_lines};
use crate::tokenizer::{Tokenizer, Vocabulary};

/// Version of the binary layout written by [`Artifact::save`].
pub const FORMAT_VERSION: u32 = 1;

/// Name of the pseudo-random generator seeded generation relies on.
///
/// Recorded in every artifact so a reimplementation knows which stream a
/// given seed refers to.
pub const RNG_ALGORITHM: &str = "chacha8";

/// Training metadata stored alongside the count tables.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
	pub order: usize,
	pub total_tokens: u64,
	/// Seconds since the Unix epoch.
	pub trained_at: u64,
	pub tokenizer_id: String,
	pub smoothing: SmoothingKind,
	pub rng_algorithm: String,
}

impl Metadata {
	pub(crate) fn new(
		order: usize,
		total_tokens: u64,
		trained_at: u64,
		tokenizer_id: String,
		smoothing: SmoothingKind,
	) -> Self {
		Self { order, total_tokens, trained_at, tokenizer_id, smoothing, rng_algorithm: RNG_ALGORITHM.to_owned() }
	}
}

/// Trained n-gram model: count tables for every order, optional
/// continuation tables, the vocabulary and metadata.
///
/// An artifact is immutable once produced. It is shared read-only by any
/// number of concurrent generation calls.
///
/// # Invariants
/// - `tables[k - 1]` is the table of order `k`, for `k` in `1..=order`
/// - `continuation`, when present, holds the tables of orders `1..order`
/// - Every stored count is >= 1 and every token id is < `vocab_size`
/// - `vocabulary.len() == vocab_size`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
	format_version: u32,
	vocab_size: usize,
	vocabulary: Vocabulary,
	tables: Vec<CountTable>,
	continuation: Option<Vec<CountTable>>,
	metadata: Metadata,
}

impl Artifact {
	pub(crate) fn new(
		vocabulary: Vocabulary,
		tables: Vec<CountTable>,
		continuation: Option<Vec<CountTable>>,
		metadata: Metadata,
	) -> Self {
		Self { format_version: FORMAT_VERSION, vocab_size: vocabulary.len(), vocabulary, tables, continuation, metadata }
	}

	/// Path of the artifact [`Artifact::from_corpus_file`] caches for a corpus:
	/// `<stem>.bin` next to it.
	pub fn cache_path<P: AsRef<Path>>(corpus_path: P) -> Result<PathBuf> {
		Ok(cached_artifact_path(corpus_path.as_ref())?)
	}

	/// Reads a corpus file line by line and trains an artifact from it.
	///
	/// If the cached artifact (see [`Artifact::cache_path`]) exists and was
	/// trained with the same order, smoothing and tokenizer, it is loaded
	/// instead of retraining. Otherwise the freshly trained artifact is written
	/// there, replacing any stale one. Each line is tokenized and trained as an
	/// independent sequence.
	pub fn from_corpus_file<P, T>(corpus_path: P, tokenizer: &T, config: TrainerConfig) -> Result<Self>
	where
		P: AsRef<Path>,
		T: Tokenizer + ?Sized,
	{
		let artifact_path = Self::cache_path(&corpus_path)?;
		if artifact_path.exists() {
			let cached = Self::load(&artifact_path)?;
			if cached.was_trained_with(&config, tokenizer) {
				return Ok(cached);
			}
			log::info!(
				"{} holds an order-{} {:?} artifact for {}, retraining as order-{} {:?} for {}",
				artifact_path.display(),
				cached.order(),
				cached.metadata.smoothing,
				cached.metadata.tokenizer_id,
				config.order,
				config.smoothing,
				tokenizer.identifier()
			);
		}

		let lines = read_corpus_lines(&corpus_path)?;
		let documents = lines.iter().map(|line| tokenizer.encode(line)).collect::<Result<Vec<_>>>()?;

		let trainer = Trainer::new(config)?;
		let artifact = trainer.train_documents(documents.iter().map(Vec::as_slice), tokenizer)?;
		artifact.save(&artifact_path)?;
		Ok(artifact)
	}

	pub fn order(&self) -> usize {
		self.metadata.order
	}

	pub fn vocab_size(&self) -> usize {
		self.vocab_size
	}

	pub fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	/// Vocabulary of the tokenizer the artifact was trained with.
	pub fn vocabulary(&self) -> &Vocabulary {
		&self.vocabulary
	}

	/// Whether training with `config` and `tokenizer` would produce an
	/// artifact of the same shape.
	pub fn was_trained_with<T: Tokenizer + ?Sized>(&self, config: &TrainerConfig, tokenizer: &T) -> bool {
		self.metadata.order == config.order
			&& self.metadata.smoothing == config.smoothing
			&& self.metadata.tokenizer_id == tokenizer.identifier()
			&& self.vocab_size == tokenizer.vocab_size()
	}

	/// Raw count table of `order`, or `None` outside `1..=self.order()`.
	pub fn table(&self, order: usize) -> Option<&CountTable> {
		order.checked_sub(1).and_then(|index| self.tables.get(index))
	}

	/// Continuation table of `order`, or `None` if the artifact was not
	/// trained for Kneser-Ney or `order` is outside `1..self.order()`.
	pub fn continuation_table(&self, order: usize) -> Option<&CountTable> {
		let index = order.checked_sub(1)?;
		self.continuation.as_ref()?.get(index)
	}

	pub fn has_continuation_counts(&self) -> bool {
		self.continuation.is_some()
	}

	/// Returns an error if `id` is not a valid token of this artifact.
	pub fn check_token(&self, id: TokenId) -> Result<()> {
		if id as usize >= self.vocab_size {
			return Err(Error::UnknownTokenId { id, vocab_size: self.vocab_size });
		}
		Ok(())
	}

	/// Serializes the artifact with `postcard`.
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Ok(postcard::to_stdvec(self)?)
	}

	/// Deserializes and validates an artifact.
	///
	/// # Errors
	/// Returns [`Error::ArtifactCorrupt`] if the bytes cannot be decoded or the
	/// decoded record breaks an invariant. Nothing is partially loaded.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		let artifact: Self =
			postcard::from_bytes(bytes).map_err(|e| Error::ArtifactCorrupt(format!("cannot decode: {e}")))?;
		artifact.validate()?;
		Ok(artifact)
	}

	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let bytes = self.to_bytes()?;
		std::fs::write(&path, &bytes)?;
		log::info!("saved artifact to {} ({} bytes)", path.as_ref().display(), bytes.len());
		Ok(())
	}

	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let bytes = std::fs::read(&path)?;
		let artifact = Self::from_bytes(&bytes)?;
		log::info!(
			"loaded order-{} artifact from {} ({} tokens, vocabulary {})",
			artifact.order(),
			path.as_ref().display(),
			artifact.metadata.total_tokens,
			artifact.vocab_size
		);
		Ok(artifact)
	}

	fn validate(&self) -> Result<()> {
		if self.format_version != FORMAT_VERSION {
			return Err(Error::ArtifactCorrupt(format!(
				"unsupported format version {} (expected {FORMAT_VERSION})",
				self.format_version
			)));
		}
		if self.metadata.rng_algorithm != RNG_ALGORITHM {
			return Err(Error::ArtifactCorrupt(format!("unknown rng algorithm {:?}", self.metadata.rng_algorithm)));
		}
		let order = self.metadata.order;
		if order < 1 || self.tables.len() != order {
			return Err(Error::ArtifactCorrupt(format!(
				"metadata declares order {order} but {} tables are stored",
				self.tables.len()
			)));
		}
		if self.vocab_size == 0 {
			return Err(Error::ArtifactCorrupt("empty vocabulary".to_owned()));
		}
		if self.vocabulary.len() != self.vocab_size {
			return Err(Error::ArtifactCorrupt(format!(
				"vocabulary holds {} tokens but vocabulary size is {}",
				self.vocabulary.len(),
				self.vocab_size
			)));
		}
		if self.metadata.total_tokens == 0 {
			return Err(Error::ArtifactCorrupt("trained on zero tokens".to_owned()));
		}

		for (index, table) in self.tables.iter().enumerate() {
			table.validate(index + 1, self.vocab_size)?;
		}
		if self.table(1).and_then(|unigram| unigram.followers(&[])).is_none() {
			return Err(Error::ArtifactCorrupt("unigram table is empty".to_owned()));
		}

		match (&self.continuation, self.metadata.smoothing) {
			(Some(continuation), SmoothingKind::KneserNey) => {
				if continuation.len() != order - 1 {
					return Err(Error::ArtifactCorrupt(format!(
						"expected {} continuation tables, found {}",
						order - 1,
						continuation.len()
					)));
				}
				for (index, table) in continuation.iter().enumerate() {
					table.validate(index + 1, self.vocab_size)?;
				}
			}
			(None, SmoothingKind::SimpleBackoff) => {}
			(Some(_), SmoothingKind::SimpleBackoff) => {
				return Err(Error::ArtifactCorrupt("continuation tables on a simple backoff artifact".to_owned()));
			}
			(None, SmoothingKind::KneserNey) => {
				return Err(Error::ArtifactCorrupt("Kneser-Ney artifact without continuation tables".to_owned()));
			}
		}

		Ok(())
	}
}
