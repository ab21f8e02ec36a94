use rand::Rng;

use super::TokenId;
use super::smoothing::Scores;
use crate::error::{Error, Result};

/// Turns a score distribution into one token id.
///
/// Steps, in order:
/// 1. drop non-positive scores; nothing left is a [`Error::DeadEnd`]
/// 2. sort by score descending, ties by ascending token id
/// 3. keep the first `top_k` entries (`0` keeps all)
/// 4. raise each kept score to `1 / temperature`, computed as
///    `(score / max)^(1 / temperature)` so small temperatures cannot overflow
/// 5. normalize and pick by cumulative sum against one uniform draw in `[0, 1)`
///
/// Given the same scores, parameters and RNG state, the result is always the same.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sampler {
	temperature: f64,
	top_k: usize,
}

impl Sampler {
	/// # Errors
	/// Returns [`Error::InvalidTemperature`] if `temperature` is not a finite value > 0.
	pub fn new(temperature: f64, top_k: usize) -> Result<Self> {
		if !(temperature.is_finite() && temperature > 0.0) {
			return Err(Error::InvalidTemperature(temperature));
		}
		Ok(Self { temperature, top_k })
	}

	pub fn temperature(&self) -> f64 {
		self.temperature
	}

	pub fn top_k(&self) -> usize {
		self.top_k
	}

	/// Draws one token from `scores`, consuming exactly one value from `rng`.
	///
	/// # Errors
	/// Returns [`Error::DeadEnd`] if no token has a positive score.
	pub fn sample<R: Rng>(&self, scores: &Scores, rng: &mut R) -> Result<TokenId> {
		let probabilities = self.probabilities(scores);
		if probabilities.is_empty() {
			return Err(Error::DeadEnd);
		}
		let draw: f64 = rng.random();
		Ok(select(&probabilities, draw))
	}

	/// Kept candidates with their normalized probabilities, most likely first.
	pub fn probabilities(&self, scores: &Scores) -> Vec<(TokenId, f64)> {
		let mut candidates: Vec<(TokenId, f64)> = scores
			.iter()
			.filter(|(_, score)| score.is_finite() && **score > 0.0)
			.map(|(token, score)| (*token, *score))
			.collect();

		// stable sort keeps ascending token id among equal scores
		candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
		if self.top_k > 0 {
			candidates.truncate(self.top_k);
		}

		let Some(&(_, max)) = candidates.first() else {
			return candidates;
		};
		let exponent = 1.0 / self.temperature;
		for (_, score) in &mut candidates {
			*score = (*score / max).powf(exponent);
		}

		let total: f64 = candidates.iter().map(|(_, weight)| weight).sum();
		for (_, weight) in &mut candidates {
			*weight /= total;
		}
		candidates
	}
}

/// Convenience wrapper building a [`Sampler`] for a single draw.
pub fn sample<R: Rng>(scores: &Scores, temperature: f64, top_k: usize, rng: &mut R) -> Result<TokenId> {
	Sampler::new(temperature, top_k)?.sample(scores, rng)
}

/// Cumulative-sum inversion: first candidate whose running total exceeds `draw`.
///
/// Falls back to the last candidate when rounding leaves the total just below `draw`.
pub(crate) fn select(probabilities: &[(TokenId, f64)], draw: f64) -> TokenId {
	let mut cumulative = 0.0;
	for &(token, probability) in probabilities {
		cumulative += probability;
		if draw < cumulative {
			return token;
		}
	}
	probabilities[probabilities.len() - 1].0
}
