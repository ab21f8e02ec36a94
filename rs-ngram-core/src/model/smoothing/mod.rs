//! Smoothing strategies: turn count tables plus a context into next-token scores.
//!
//! Both strategies are pure functions over an immutable [`Artifact`], so a
//! single [`Smoothing`] value can serve any number of concurrent requests.

mod backoff;
mod kneser_ney;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::TokenId;
use super::artifact::Artifact;
use super::trainer::SmoothingKind;
use crate::error::{Error, Result};

/// Unnormalized next-token scores, ordered by token id.
///
/// The ordering keeps floating point accumulation and sampling independent
/// of hash map iteration order.
pub type Scores = BTreeMap<TokenId, f64>;

pub const DEFAULT_BACKOFF_WEIGHT: f64 = 0.4;
pub const DEFAULT_DISCOUNT: f64 = 0.75;

/// Smoothing strategy, selected once per model.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum Smoothing {
	/// Count-weighted blend of the highest observed order with the lower
	/// ones: `(1 - backoff_weight) * count + backoff_weight * lower`.
	SimpleBackoff { backoff_weight: f64 },
	/// Interpolated Kneser-Ney with absolute discount `discount`.
	KneserNey { discount: f64 },
}

impl Default for Smoothing {
	fn default() -> Self {
		Self::KneserNey { discount: DEFAULT_DISCOUNT }
	}
}

impl Smoothing {
	/// # Errors
	/// Returns [`Error::InvalidParameter`] unless `0 <= backoff_weight <= 1`.
	pub fn simple_backoff(backoff_weight: f64) -> Result<Self> {
		let smoothing = Self::SimpleBackoff { backoff_weight };
		smoothing.validate()?;
		Ok(smoothing)
	}

	/// # Errors
	/// Returns [`Error::InvalidParameter`] unless `0 < discount < 1`.
	pub fn kneser_ney(discount: f64) -> Result<Self> {
		let smoothing = Self::KneserNey { discount };
		smoothing.validate()?;
		Ok(smoothing)
	}

	/// Checks parameter ranges; needed for values that came through serde.
	pub fn validate(&self) -> Result<()> {
		match *self {
			Self::SimpleBackoff { backoff_weight } if !(0.0..=1.0).contains(&backoff_weight) => {
				Err(Error::InvalidParameter {
					name: "backoff_weight",
					value: backoff_weight,
					reason: "must be between 0.0 and 1.0",
				})
			}
			Self::KneserNey { discount } if !(discount > 0.0 && discount < 1.0) => Err(Error::InvalidParameter {
				name: "discount",
				value: discount,
				reason: "must be strictly between 0.0 and 1.0",
			}),
			_ => Ok(()),
		}
	}

	pub fn kind(&self) -> SmoothingKind {
		match self {
			Self::SimpleBackoff { .. } => SmoothingKind::SimpleBackoff,
			Self::KneserNey { .. } => SmoothingKind::KneserNey,
		}
	}

	/// Short tag used in model identifiers.
	pub fn tag(&self) -> &'static str {
		match self {
			Self::SimpleBackoff { .. } => "backoff",
			Self::KneserNey { .. } => "kn",
		}
	}

	/// Scores every candidate next token after `context`.
	///
	/// Only the last `order - 1` tokens of `context` are used; a shorter
	/// context starts at the order it can fill. Ties are left to the sampler.
	pub fn score(&self, context: &[TokenId], artifact: &Artifact) -> Scores {
		let order = artifact.order().min(context.len() + 1);
		let context = &context[context.len() - (order - 1)..];

		match *self {
			Self::SimpleBackoff { backoff_weight } => backoff::score(artifact, context, order, backoff_weight),
			Self::KneserNey { discount } => kneser_ney::score(artifact, context, order, discount),
		}
	}
}

/// Same score for every token of the vocabulary.
fn uniform(vocab_size: usize) -> Scores {
	let probability = 1.0 / vocab_size as f64;
	(0..vocab_size).map(|id| (id as TokenId, probability)).collect()
}

/// Adds `weight * lower[w]` to `scores[w]` for every token of `lower`.
fn blend(scores: &mut Scores, lower: Scores, weight: f64) {
	for (token, score) in lower {
		*scores.entry(token).or_insert(0.0) += weight * score;
	}
}
