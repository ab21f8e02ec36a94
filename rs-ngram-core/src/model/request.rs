use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_TOKENS: usize = 64;
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

/// Parameters of one generation call.
///
/// # Reproducibility
/// A request with `seed: Some(_)` is reproducible: the same request against
/// the same artifact and smoothing always produces the same text. With
/// `seed: None` the sampler is seeded from the operating system and the
/// output differs between calls.
///
/// # Invariants
/// - `temperature` is finite and > 0 when set through [`GenerationRequest::set_temperature`];
///   values that arrive through serde are checked again before sampling
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GenerationRequest {
	/// Text the generation continues from.
	pub prompt: String,

	/// Maximum number of tokens appended to the prompt.
	pub max_tokens: usize,

	/// Sharpness of the distribution (1.0 = unchanged, toward 0 = arg-max).
	pub(crate) temperature: f64,

	/// Number of best candidates kept before sampling (0 = all).
	pub top_k: usize,

	/// Seed of the sampler RNG; `None` for non-reproducible output.
	pub seed: Option<u64>,

	/// Generation stops as soon as the continuation contains one of these.
	pub stop_sequences: Vec<String>,
}

impl Default for GenerationRequest {
	fn default() -> Self {
		Self {
			prompt: String::new(),
			max_tokens: DEFAULT_MAX_TOKENS,
			temperature: DEFAULT_TEMPERATURE,
			top_k: 0,
			seed: None,
			stop_sequences: Vec::new(),
		}
	}
}

impl GenerationRequest {
	/// Creates a request for `prompt` with default settings.
	pub fn new(prompt: impl Into<String>) -> Self {
		Self { prompt: prompt.into(), ..Self::default() }
	}

	pub fn temperature(&self) -> f64 {
		self.temperature
	}

	/// Sets the sampling temperature.
	///
	/// # Errors
	/// Returns [`Error::InvalidTemperature`] if the value is not finite and > 0.
	pub fn set_temperature(&mut self, temperature: f64) -> Result<()> {
		if !(temperature.is_finite() && temperature > 0.0) {
			return Err(Error::InvalidTemperature(temperature));
		}
		self.temperature = temperature;
		Ok(())
	}

	#[must_use]
	pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
		self.max_tokens = max_tokens;
		self
	}

	#[must_use]
	pub fn with_top_k(mut self, top_k: usize) -> Self {
		self.top_k = top_k;
		self
	}

	#[must_use]
	pub fn with_seed(mut self, seed: u64) -> Self {
		self.seed = Some(seed);
		self
	}

	/// Adds a stop sequence; empty strings are ignored.
	#[must_use]
	pub fn with_stop_sequence(mut self, stop: impl Into<String>) -> Self {
		let stop = stop.into();
		if !stop.is_empty() {
			self.stop_sequences.push(stop);
		}
		self
	}

	/// Whether the output of this request can be reproduced.
	pub fn is_reproducible(&self) -> bool {
		self.seed.is_some()
	}
}

/// Token accounting of one generation call.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
	/// Tokens in the encoded prompt.
	pub input_tokens: usize,
	/// Tokens appended by the generation.
	pub output_tokens: usize,
	pub total_tokens: usize,
}

/// Why a generation call stopped. None of these is an error.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishReason {
	/// `max_tokens` tokens were appended.
	MaxTokens,
	/// The continuation reached a stop sequence.
	StopSequence,
	/// No candidate was left at any order (natural stop).
	DeadEnd,
}

/// Result of one generation call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationResponse {
	/// Prompt followed by the continuation, cut before any matched stop sequence.
	pub generated_text: String,
	pub usage: Usage,
	pub latency_ms: u64,
	pub model_identifier: String,
	pub finish_reason: FinishReason,
	/// Seed used, echoed from the request; `None` means the call was not reproducible.
	pub seed: Option<u64>,
}

impl GenerationResponse {
	pub fn latency(&self) -> Duration {
		Duration::from_millis(self.latency_ms)
	}
}
