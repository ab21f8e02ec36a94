use super::{Scores, blend, uniform};
use crate::model::TokenId;
use crate::model::artifact::Artifact;
use crate::model::followers::Followers;

/// Interpolated Kneser-Ney at the highest order, using raw counts.
///
/// For an observed context with total count `n` and `t` distinct followers:
///
/// ```text
/// score(w) = max(c(w) - D, 0) / n  +  (D * t / n) * continuation(w)
/// ```
///
/// An unobserved context backs off to the next lower order, still on raw
/// counts, so the longest context seen in training drives the distribution.
pub(super) fn score(artifact: &Artifact, context: &[TokenId], order: usize, discount: f64) -> Scores {
	if order == 0 {
		return uniform(artifact.vocab_size());
	}

	match observed(artifact.table(order).and_then(|table| table.followers(context))) {
		Some(followers) => discounted(artifact, followers, context, order, discount),
		None => score(artifact, lower(context), order - 1, discount),
	}
}

/// Lower-order Kneser-Ney term, built from continuation counts.
///
/// The mass of `w` is the number of distinct tokens seen right before
/// `(context, w)`, over the number of distinct such pairs, discounted and
/// interpolated the same way as the top order. Order 0 is uniform over the
/// vocabulary, which keeps every valid token reachable.
fn continuation(artifact: &Artifact, context: &[TokenId], order: usize, discount: f64) -> Scores {
	if order == 0 {
		return uniform(artifact.vocab_size());
	}

	match observed(artifact.continuation_table(order).and_then(|table| table.followers(context))) {
		Some(followers) => discounted(artifact, followers, context, order, discount),
		None => continuation(artifact, lower(context), order - 1, discount),
	}
}

fn discounted(artifact: &Artifact, followers: &Followers, context: &[TokenId], order: usize, discount: f64) -> Scores {
	let total = followers.total() as f64;
	let mut scores: Scores = followers
		.iter()
		.map(|(next, count)| (next, (count as f64 - discount).max(0.0) / total))
		.collect();

	let leftover = discount * followers.distinct() as f64 / total;
	blend(&mut scores, continuation(artifact, lower(context), order - 1, discount), leftover);
	scores
}

fn observed(followers: Option<&Followers>) -> Option<&Followers> {
	followers.filter(|followers| !followers.is_empty())
}

fn lower(context: &[TokenId]) -> &[TokenId] {
	context.get(1..).unwrap_or(context)
}
