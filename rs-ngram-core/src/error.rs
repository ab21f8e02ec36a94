use crate::model::TokenId;

/// Errors produced by training, artifact persistence and generation.
///
/// Every variant except [`Error::DeadEnd`] stops the current operation and is
/// returned to the caller. `DeadEnd` is raised by the sampler and turned into a
/// natural stop by the generation loop, so callers of
/// [`Model::generate`](crate::model::generator::Model::generate) never see it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Training was called without a single token.
	#[error("cannot train on an empty corpus")]
	EmptyCorpus,

	/// The requested n-gram order is not usable (must be >= 1).
	#[error("n-gram order must be >= 1, got {0}")]
	InvalidOrder(usize),

	/// A prompt or context referenced an id outside the trained vocabulary.
	#[error("unknown token id {id} (vocabulary size is {vocab_size})")]
	UnknownTokenId { id: TokenId, vocab_size: usize },

	/// Sampling temperature must be a finite value > 0.
	#[error("temperature must be > 0, got {0}")]
	InvalidTemperature(f64),

	/// A smoothing or configuration parameter is out of range.
	#[error("invalid {name} = {value}: {reason}")]
	InvalidParameter { name: &'static str, value: f64, reason: &'static str },

	/// No candidate token at any order.
	#[error("no next-token candidates")]
	DeadEnd,

	/// The persisted artifact does not satisfy its structural invariants.
	#[error("corrupt artifact: {0}")]
	ArtifactCorrupt(String),

	/// Kneser-Ney smoothing was requested on an artifact trained without
	/// continuation counts.
	#[error("artifact has no continuation counts, retrain it for Kneser-Ney smoothing")]
	MissingContinuationCounts,

	/// The tokenizer handed to the model is not the one the artifact was trained with.
	#[error("tokenizer mismatch: artifact expects {expected}, got {found}")]
	TokenizerMismatch { expected: String, found: String },

	/// The tokenizer met a symbol that is not part of its vocabulary.
	#[error("symbol {0:?} is not in the vocabulary")]
	UnknownSymbol(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("artifact serialization failed: {0}")]
	Serialization(#[from] postcard::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
