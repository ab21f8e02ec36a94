use super::{Scores, blend, uniform};
use crate::model::TokenId;
use crate::model::artifact::Artifact;

/// Simple backoff scoring at `order`, with `context` of `order - 1` tokens.
///
/// - Observed context above order 1: raw counts weighted by
///   `1 - backoff_weight`, plus the lower-order scores weighted by
///   `backoff_weight`, merged by token id.
/// - Unobserved context: the lower order alone, without any weighting.
/// - Order 1: raw unigram counts, or a uniform distribution if the unigram
///   table is somehow empty.
pub(super) fn score(artifact: &Artifact, context: &[TokenId], order: usize, backoff_weight: f64) -> Scores {
	let followers = artifact
		.table(order)
		.and_then(|table| table.followers(context))
		.filter(|followers| !followers.is_empty());

	match followers {
		Some(followers) if order == 1 => followers.iter().map(|(next, count)| (next, count as f64)).collect(),
		Some(followers) => {
			let high_weight = 1.0 - backoff_weight;
			let mut scores: Scores =
				followers.iter().map(|(next, count)| (next, high_weight * count as f64)).collect();
			blend(&mut scores, score(artifact, &context[1..], order - 1, backoff_weight), backoff_weight);
			scores
		}
		None if order > 1 => score(artifact, &context[1..], order - 1, backoff_weight),
		None => uniform(artifact.vocab_size()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::smoothing::Smoothing;
	use crate::model::trainer::{SmoothingKind, Trainer, TrainerConfig};
	use crate::tokenizer::{CharTokenizer, Tokenizer};

	const A: TokenId = 0;
	const B: TokenId = 1;
	const C: TokenId = 2;
	const D: TokenId = 3;

	fn artifact(text: &str) -> Artifact {
		let tokenizer = CharTokenizer::from_corpus("ABCDE");
		let ids = tokenizer.encode(text).unwrap();
		let config = TrainerConfig { order: 3, smoothing: SmoothingKind::SimpleBackoff };
		Trainer::new(config).unwrap().train(&ids, &tokenizer).unwrap()
	}

	fn close(a: f64, b: f64) -> bool {
		(a - b).abs() < 1e-9
	}

	#[test]
	fn observed_top_context_blends_all_orders() {
		let artifact = artifact("ABCABD");
		let scores = score(&artifact, &[A, B], 3, 0.4);

		// order 3: C=1, D=1; order 2 after B: C=1, D=1; unigram: A=2, B=2, C=1, D=1
		// C = 0.6*1 + 0.4*(0.6*1 + 0.4*1) = 1.0
		assert!(close(scores[&C], 1.0));
		assert!(close(scores[&D], 1.0));
		// A = 0.4*0.4*2
		assert!(close(scores[&A], 0.32));
		assert!(close(scores[&B], 0.32));
	}

	#[test]
	fn unobserved_context_backs_off_without_weighting() {
		let artifact = artifact("ABCABD");
		// (D, A) never occurs at order 3, (A) occurs at order 2
		let backed_off = score(&artifact, &[D, A], 3, 0.4);
		let direct = score(&artifact, &[A], 2, 0.4);
		assert_eq!(backed_off, direct);
	}

	#[test]
	fn context_only_known_to_unigram_still_has_mass() {
		let artifact = artifact("ABCABD");
		// D never precedes anything
		let scores = Smoothing::SimpleBackoff { backoff_weight: 0.4 }.score(&[D, D], &artifact);
		assert!(scores.values().sum::<f64>() > 0.0);
		assert!(close(scores[&A], 2.0));
	}

	#[test]
	fn observed_context_gets_nonzero_score_at_extreme_weights() {
		let artifact = artifact("ABCABD");
		for weight in [0.0, 1.0] {
			let scores = score(&artifact, &[A, B], 3, weight);
			assert!(scores[&C] > 0.0, "weight {weight}");
			assert!(scores[&D] > 0.0, "weight {weight}");
		}
	}

	#[test]
	fn missing_unigram_falls_back_to_uniform() {
		let artifact = artifact("ABCABD");
		// order 0 never exists, so this exercises the uniform branch directly
		let scores = score(&artifact, &[], 0, 0.4);
		assert_eq!(scores.len(), 5);
	}
}
