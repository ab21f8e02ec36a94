use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::TokenId;
use super::artifact::Artifact;
use super::request::{FinishReason, GenerationRequest, GenerationResponse, Usage};
use super::sampler::Sampler;
use super::smoothing::{Scores, Smoothing};
use super::trainer::SmoothingKind;
use crate::error::{Error, Result};
use crate::tokenizer::{Tokenizer, Vocabulary};

const DEFAULT_MODEL_NAME: &str = "ngram";

/// Generation loop over a trained [`Artifact`].
///
/// A `Model` is an explicit handle: callers keep it for as long as they serve
/// requests and may share it between threads. [`Model::generate`] takes
/// `&self` and keeps all per-request state on its own stack.
///
/// # Responsibilities
/// - Tokenize the prompt and check it against the artifact vocabulary
/// - Repeatedly score the trailing context and sample the next token
/// - Stop on `max_tokens`, a stop sequence, or a dead end
/// - Decode the result and report usage and latency
#[derive(Debug)]
pub struct Model<T> {
	artifact: Arc<Artifact>,
	tokenizer: T,
	smoothing: Smoothing,
	name: String,
}

/// Phases of a generation call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
	Generating,
	Terminated(FinishReason),
}

/// Per-request state, owned by a single [`Model::generate`] call.
struct GenerationState {
	tokens: Vec<TokenId>,
	/// Index of the first generated token in `tokens`.
	cursor: usize,
	usage: Usage,
	/// Continuation decoded so far, one token at a time.
	text: String,
	/// Byte offset in `text` where a stop sequence starts.
	stop_at: Option<usize>,
}

impl GenerationState {
	fn new(prompt: Vec<TokenId>) -> Self {
		let cursor = prompt.len();
		Self {
			tokens: prompt,
			cursor,
			usage: Usage { input_tokens: cursor, output_tokens: 0, total_tokens: cursor },
			text: String::new(),
			stop_at: None,
		}
	}

	/// Last `order - 1` tokens, or all of them if the sequence is shorter.
	fn context(&self, order: usize) -> &[TokenId] {
		let start = self.tokens.len().saturating_sub(order - 1);
		&self.tokens[start..]
	}

	fn push(&mut self, token: TokenId) {
		self.tokens.push(token);
		self.usage.output_tokens += 1;
		self.usage.total_tokens += 1;
	}
}

impl<T: Tokenizer> Model<T> {
	/// Creates a model over an artifact.
	///
	/// # Errors
	/// - [`Error::InvalidParameter`] if the smoothing parameters are out of range
	/// - [`Error::MissingContinuationCounts`] for Kneser-Ney on an artifact trained without them
	/// - [`Error::TokenizerMismatch`] if `tokenizer` is not the one used for training
	pub fn new(artifact: impl Into<Arc<Artifact>>, tokenizer: T, smoothing: Smoothing) -> Result<Self> {
		let artifact = artifact.into();
		smoothing.validate()?;

		if smoothing.kind() == SmoothingKind::KneserNey && !artifact.has_continuation_counts() {
			return Err(Error::MissingContinuationCounts);
		}

		let metadata = artifact.metadata();
		if tokenizer.identifier() != metadata.tokenizer_id || tokenizer.vocab_size() != artifact.vocab_size() {
			return Err(Error::TokenizerMismatch {
				expected: format!("{} ({} tokens)", metadata.tokenizer_id, artifact.vocab_size()),
				found: format!("{} ({} tokens)", tokenizer.identifier(), tokenizer.vocab_size()),
			});
		}

		Ok(Self { artifact, tokenizer, smoothing, name: DEFAULT_MODEL_NAME.to_owned() })
	}

	/// Loads an artifact from disk; the model is named after the file stem.
	pub fn load<P: AsRef<Path>>(path: P, tokenizer: T, smoothing: Smoothing) -> Result<Self> {
		let artifact = Artifact::load(&path)?;
		Ok(Self::new(artifact, tokenizer, smoothing)?.with_name(name_of(path.as_ref())))
	}

	/// Loads an artifact from disk and rebuilds its tokenizer from the stored
	/// vocabulary, e.g. `Model::load_with(path, smoothing, CharTokenizer::from_vocabulary)`.
	///
	/// # Errors
	/// Same as [`Model::new`], plus whatever `build` returns.
	pub fn load_with<P, F>(path: P, smoothing: Smoothing, build: F) -> Result<Self>
	where
		P: AsRef<Path>,
		F: FnOnce(Vocabulary) -> Result<T>,
	{
		let artifact = Artifact::load(&path)?;
		let tokenizer = build(artifact.vocabulary().clone())?;
		Ok(Self::new(artifact, tokenizer, smoothing)?.with_name(name_of(path.as_ref())))
	}

	#[must_use]
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	/// `<name>-<smoothing>-<order>`, e.g. `shakespeare-kn-3`.
	pub fn identifier(&self) -> String {
		format!("{}-{}-{}", self.name, self.smoothing.tag(), self.artifact.order())
	}

	pub fn artifact(&self) -> &Arc<Artifact> {
		&self.artifact
	}

	pub fn tokenizer(&self) -> &T {
		&self.tokenizer
	}

	pub fn smoothing(&self) -> Smoothing {
		self.smoothing
	}

	/// Continues `request.prompt`.
	///
	/// # Errors
	/// - [`Error::InvalidTemperature`] before any work is done
	/// - any tokenizer error while encoding the prompt
	/// - [`Error::UnknownTokenId`] if the prompt encodes outside the vocabulary
	pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
		let started = Instant::now();
		let sampler = Sampler::new(request.temperature(), request.top_k)?;
		let prompt = self.tokenizer.encode(&request.prompt)?;
		self.run(prompt, sampler, request, started)
	}

	/// Continues an already tokenized prompt; `request.prompt` is ignored.
	///
	/// # Errors
	/// Same as [`Model::generate`].
	pub fn generate_from_ids(&self, prompt: &[TokenId], request: &GenerationRequest) -> Result<GenerationResponse> {
		let started = Instant::now();
		let sampler = Sampler::new(request.temperature(), request.top_k)?;
		self.run(prompt.to_vec(), sampler, request, started)
	}

	fn run(
		&self,
		prompt: Vec<TokenId>,
		sampler: Sampler,
		request: &GenerationRequest,
		started: Instant,
	) -> Result<GenerationResponse> {
		for &id in &prompt {
			self.artifact.check_token(id)?;
		}

		let mut rng = match request.seed {
			Some(seed) => ChaCha8Rng::seed_from_u64(seed),
			None => ChaCha8Rng::from_os_rng(),
		};

		let mut state = GenerationState::new(prompt);
		let stop_window = request.stop_sequences.iter().map(String::len).max().unwrap_or(0);
		let mut phase = if request.max_tokens == 0 {
			Phase::Terminated(FinishReason::MaxTokens)
		} else {
			Phase::Generating
		};

		let finish_reason = loop {
			match phase {
				Phase::Terminated(reason) => break reason,
				Phase::Generating => phase = self.step(&mut state, &sampler, &mut rng, request, stop_window)?,
			}
		};

		let prompt_text = self.tokenizer.decode(&state.tokens[..state.cursor])?;
		let mut continuation = std::mem::take(&mut state.text);
		if let Some(at) = state.stop_at {
			continuation.truncate(at);
		}

		log::debug!(
			"{}: stopped with {:?} after {} tokens",
			self.identifier(),
			finish_reason,
			state.usage.output_tokens
		);

		Ok(GenerationResponse {
			generated_text: prompt_text + &continuation,
			usage: state.usage,
			latency_ms: started.elapsed().as_millis() as u64,
			model_identifier: self.identifier(),
			finish_reason,
			seed: request.seed,
		})
	}

	/// Samples and appends one token, then checks the terminal conditions.
	fn step(
		&self,
		state: &mut GenerationState,
		sampler: &Sampler,
		rng: &mut ChaCha8Rng,
		request: &GenerationRequest,
		stop_window: usize,
	) -> Result<Phase> {
		let scores = self.smoothing.score(state.context(self.artifact.order()), &self.artifact);
		let Some(token) = next_token(sampler, &scores, rng)? else {
			return Ok(Phase::Terminated(FinishReason::DeadEnd));
		};
		log::trace!("step {}: sampled {} out of {} candidates", state.usage.output_tokens, token, scores.len());
		state.push(token);

		let piece = self.tokenizer.decode(&[token])?;
		let from = window_start(&state.text, stop_window);
		state.text.push_str(&piece);

		// earlier steps found no match, so a new one ends in `piece`
		if let Some(at) = find_stop(&state.text, from, &request.stop_sequences) {
			state.stop_at = Some(at);
			return Ok(Phase::Terminated(FinishReason::StopSequence));
		}

		if state.usage.output_tokens >= request.max_tokens {
			return Ok(Phase::Terminated(FinishReason::MaxTokens));
		}
		Ok(Phase::Generating)
	}
}

/// Samples the next token, or `None` when no candidate is left.
fn next_token(sampler: &Sampler, scores: &Scores, rng: &mut ChaCha8Rng) -> Result<Option<TokenId>> {
	match sampler.sample(scores, rng) {
		Ok(token) => Ok(Some(token)),
		Err(Error::DeadEnd) => Ok(None),
		Err(e) => Err(e),
	}
}

fn name_of(path: &Path) -> String {
	path.file_stem()
		.map_or_else(|| DEFAULT_MODEL_NAME.to_owned(), |stem| stem.to_string_lossy().into_owned())
}

/// Earliest byte at which a stop sequence of at most `window` bytes can start
/// if it overlaps text appended after `old`. Rounded down to a char boundary.
fn window_start(old: &str, window: usize) -> usize {
	let mut start = (old.len() + 1).saturating_sub(window).min(old.len());
	while !old.is_char_boundary(start) {
		start -= 1;
	}
	start
}

/// Byte offset of the earliest stop sequence found in `text[from..]`.
fn find_stop(text: &str, from: usize, stop_sequences: &[String]) -> Option<usize> {
	let tail = &text[from..];
	stop_sequences
		.iter()
		.filter(|stop| !stop.is_empty())
		.filter_map(|stop| tail.find(stop.as_str()))
		.min()
		.map(|at| from + at)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::trainer::{Trainer, TrainerConfig};
	use crate::tokenizer::CharTokenizer;

	fn model(corpus: &str, order: usize, smoothing: Smoothing) -> Model<CharTokenizer> {
		let tokenizer = CharTokenizer::from_corpus(corpus);
		let ids = tokenizer.encode(corpus).unwrap();
		let config = TrainerConfig { order, smoothing: smoothing.kind() };
		let artifact = Trainer::new(config).unwrap().train(&ids, &tokenizer).unwrap();
		Model::new(artifact, tokenizer, smoothing).unwrap()
	}

	#[test]
	fn context_is_trailing_window() {
		let state = GenerationState::new(vec![1, 2, 3, 4]);
		assert_eq!(state.context(3), &[3, 4]);
		assert_eq!(state.context(1), &[] as &[TokenId]);
		assert_eq!(state.context(9), &[1, 2, 3, 4]);
	}

	#[test]
	fn usage_counts_prompt_and_output() {
		let mut state = GenerationState::new(vec![0, 1]);
		state.push(2);
		assert_eq!(state.usage, Usage { input_tokens: 2, output_tokens: 1, total_tokens: 3 });
		assert_eq!(&state.tokens[state.cursor..], &[2]);
	}

	#[test]
	fn find_stop_returns_earliest_match() {
		let stops = vec!["lo".to_owned(), "el".to_owned(), String::new()];
		assert_eq!(find_stop("hello", 0, &stops), Some(1));
		assert_eq!(find_stop("hello", 2, &stops), Some(3));
		assert_eq!(find_stop("xyz", 0, &stops), None);
	}

	#[test]
	fn window_covers_stops_overlapping_the_new_text() {
		// "hel" decoded so far, stops up to 3 bytes long
		assert_eq!(window_start("hel", 3), 1);
		assert_eq!(window_start("hel", 10), 0);
		assert_eq!(window_start("hel", 1), 3);
		// never splits a character: 'é' spans bytes 1..3
		assert_eq!(window_start("hé", 2), 1);
	}

	#[test]
	fn empty_scores_end_generation_naturally() {
		let sampler = Sampler::new(1.0, 0).unwrap();
		let mut rng = ChaCha8Rng::seed_from_u64(0);
		assert_eq!(next_token(&sampler, &Scores::new(), &mut rng).unwrap(), None);

		let zeros: Scores = [(0, 0.0), (1, 0.0)].into_iter().collect();
		assert_eq!(next_token(&sampler, &zeros, &mut rng).unwrap(), None);

		let single: Scores = [(4, 2.5)].into_iter().collect();
		assert_eq!(next_token(&sampler, &single, &mut rng).unwrap(), Some(4));
	}

	#[test]
	fn model_is_named_after_file_stem() {
		assert_eq!(name_of(Path::new("./data/shakespeare.bin")), "shakespeare");
		assert_eq!(name_of(Path::new("names.bin")), "names");
		assert_eq!(name_of(Path::new("..")), DEFAULT_MODEL_NAME);
	}

	#[test]
	fn identifier_names_strategy_and_order() {
		let m = model("abcabd", 3, Smoothing::default()).with_name("letters");
		assert_eq!(m.identifier(), "letters-kn-3");
		let m = model("abcabd", 2, Smoothing::simple_backoff(0.4).unwrap());
		assert_eq!(m.identifier(), "ngram-backoff-2");
	}

	#[test]
	fn kneser_ney_needs_continuation_counts() {
		let tokenizer = CharTokenizer::from_corpus("abc");
		let ids = tokenizer.encode("abc").unwrap();
		let config = TrainerConfig { order: 2, smoothing: SmoothingKind::SimpleBackoff };
		let artifact = Trainer::new(config).unwrap().train(&ids, &tokenizer).unwrap();
		assert!(matches!(
			Model::new(artifact, tokenizer, Smoothing::default()),
			Err(Error::MissingContinuationCounts)
		));
	}

	#[test]
	fn foreign_tokenizer_is_rejected() {
		let tokenizer = CharTokenizer::from_corpus("abc");
		let ids = tokenizer.encode("abc").unwrap();
		let artifact = Trainer::new(TrainerConfig::default()).unwrap().train(&ids, &tokenizer).unwrap();
		let other = CharTokenizer::from_corpus("xyz");
		assert!(matches!(
			Model::new(artifact, other, Smoothing::default()),
			Err(Error::TokenizerMismatch { .. })
		));
	}

	#[test]
	fn invalid_temperature_fails_before_encoding() {
		let m = model("abcabd", 3, Smoothing::default());
		let mut request = GenerationRequest::new("zzz not in vocabulary");
		// bypass the setter the way a deserialized request would
		request.temperature = -1.0;
		assert!(matches!(m.generate(&request), Err(Error::InvalidTemperature(t)) if t == -1.0));
	}

	#[test]
	fn stop_sequence_truncates_continuation() {
		let m = model("ab.ab.ab.", 2, Smoothing::simple_backoff(0.0).unwrap());
		let request = GenerationRequest::new("a").with_max_tokens(20).with_seed(3).with_stop_sequence(".");
		let response = m.generate(&request).unwrap();

		// a->b and b->. are the only bigrams, with no backoff mass
		assert_eq!(response.generated_text, "ab");
		assert_eq!(response.finish_reason, FinishReason::StopSequence);
		assert_eq!(response.usage.output_tokens, 2);
	}

	#[test]
	fn stop_sequence_spanning_several_tokens_is_found() {
		let m = model("ab.ab.ab.", 2, Smoothing::simple_backoff(0.0).unwrap());
		let request = GenerationRequest::new("a").with_max_tokens(20).with_seed(3).with_stop_sequence(".a");
		let response = m.generate(&request).unwrap();

		// continuation "b.a": the stop starts at byte 1 and needs two tokens
		assert_eq!(response.generated_text, "ab");
		assert_eq!(response.finish_reason, FinishReason::StopSequence);
		assert_eq!(response.usage.output_tokens, 3);
	}

	#[test]
	fn multibyte_stop_sequence_is_cut_on_its_first_byte() {
		let m = model("xé→xé→xé→", 2, Smoothing::simple_backoff(0.0).unwrap());
		let request = GenerationRequest::new("x").with_max_tokens(20).with_seed(1).with_stop_sequence("é→x");
		let response = m.generate(&request).unwrap();
		assert_eq!(response.generated_text, "x");
		assert_eq!(response.usage.output_tokens, 3);
	}

	#[test]
	fn loads_without_an_external_tokenizer() {
		let dir = tempdir::TempDir::new("rs-ngram-load-with").unwrap();
		let path = dir.path().join("letters.bin");
		let trained = model("abcabd", 3, Smoothing::default());
		trained.artifact().save(&path).unwrap();

		let loaded = Model::load_with(&path, Smoothing::default(), CharTokenizer::from_vocabulary).unwrap();
		assert_eq!(loaded.tokenizer(), trained.tokenizer());
		assert_eq!(loaded.identifier(), "letters-kn-3");

		let request = GenerationRequest::new("ab").with_max_tokens(8).with_seed(11);
		assert_eq!(loaded.generate(&request).unwrap().generated_text, trained.generate(&request).unwrap().generated_text);
	}

	#[test]
	fn stop_sequence_in_prompt_is_ignored() {
		let m = model("ab.ab.ab.", 2, Smoothing::simple_backoff(0.0).unwrap());
		let request = GenerationRequest::new("b.a").with_max_tokens(1).with_seed(3).with_stop_sequence(".");
		let response = m.generate(&request).unwrap();
		assert_eq!(response.generated_text, "b.ab");
		assert_eq!(response.finish_reason, FinishReason::MaxTokens);
	}
}
