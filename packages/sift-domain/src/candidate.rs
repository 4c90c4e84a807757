use std::{cmp::Ordering, collections::HashSet, sync::Arc};

use serde::Serialize;

use crate::Chunk;

/// Which stage last assigned a candidate's score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
	Vector,
	Lexical,
	Fused,
	Reranked,
	Adjusted,
}
impl ScoreKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Lexical => "lexical",
			Self::Fused => "fused",
			Self::Reranked => "reranked",
			Self::Adjusted => "adjusted",
		}
	}
}

/// Per-query pairing of a chunk with a score.
#[derive(Clone, Debug, Serialize)]
pub struct Candidate {
	pub chunk: Arc<Chunk>,
	pub score: f32,
	pub score_kind: ScoreKind,
	/// Score before the diversity adjustment, present once the candidate has been adjusted.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prior_score: Option<f32>,
	/// Set on excerpts cut from a parent chunk by context expansion.
	pub is_partial_parent: bool,
	/// Child chunk an excerpt was expanded from.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub origin_chunk_id: Option<String>,
}
impl Candidate {
	pub fn new(chunk: Arc<Chunk>, score: f32, score_kind: ScoreKind) -> Self {
		Self {
			chunk,
			score,
			score_kind,
			prior_score: None,
			is_partial_parent: false,
			origin_chunk_id: None,
		}
	}

	pub fn content_hash(&self) -> String {
		self.chunk.content_hash()
	}

	/// Score the diversity adjustment starts from.
	pub fn unadjusted_score(&self) -> f32 {
		match (self.score_kind, self.prior_score) {
			(ScoreKind::Adjusted, Some(prior)) => prior,
			_ => self.score,
		}
	}
}

/// Descending order with NaN sorted last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Stable descending sort, equal scores keep their input order.
pub fn sort_by_score(candidates: &mut [Candidate]) {
	candidates.sort_by(|a, b| cmp_f32_desc(a.score, b.score));
}

pub fn is_ranked(candidates: &[Candidate]) -> bool {
	candidates.windows(2).all(|pair| cmp_f32_desc(pair[0].score, pair[1].score) != Ordering::Greater)
}

/// Min-max normalizes values into `[0, 1]`.
///
/// A flat batch maps to `1.0` when its common value is positive and to `0.0` otherwise.
pub fn min_max_normalize(values: &mut [f32]) {
	if values.is_empty() {
		return;
	}

	let mut min = f32::INFINITY;
	let mut max = f32::NEG_INFINITY;

	for value in values.iter_mut() {
		if !value.is_finite() {
			*value = 0.0;
		}

		min = min.min(*value);
		max = max.max(*value);
	}

	let range = max - min;

	if range <= f32::EPSILON {
		let flat = if max > 0.0 { 1.0 } else { 0.0 };

		values.iter_mut().for_each(|value| *value = flat);

		return;
	}

	for value in values.iter_mut() {
		*value = ((*value - min) / range).clamp(0.0, 1.0);
	}
}

/// Clips a score into `[0, 1]`, reporting whether the input was malformed.
pub fn clip_score(score: f32) -> (f32, bool) {
	if score.is_nan() {
		return (0.0, true);
	}
	if (0.0..=1.0).contains(&score) {
		return (score, false);
	}

	(score.clamp(0.0, 1.0), true)
}

/// Keeps the first candidate of every content hash, preserving order.
pub fn dedup_by_content(candidates: Vec<Candidate>) -> Vec<Candidate> {
	let mut seen = HashSet::new();

	candidates.into_iter().filter(|candidate| seen.insert(candidate.content_hash())).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(id: &str, text: &str, score: f32) -> Candidate {
		Candidate::new(Arc::new(Chunk::new(id, text, "a.pdf")), score, ScoreKind::Fused)
	}

	#[test]
	fn min_max_spreads_batch_over_unit_interval() {
		let mut values = vec![2.0, 4.0, 3.0];

		min_max_normalize(&mut values);

		assert_eq!(values, vec![0.0, 1.0, 0.5]);
	}

	#[test]
	fn min_max_flat_batch() {
		let mut positive = vec![0.4, 0.4];
		let mut zero = vec![0.0, 0.0];

		min_max_normalize(&mut positive);
		min_max_normalize(&mut zero);

		assert_eq!(positive, vec![1.0, 1.0]);
		assert_eq!(zero, vec![0.0, 0.0]);
	}

	#[test]
	fn clip_reports_malformed_scores() {
		assert_eq!(clip_score(0.3), (0.3, false));
		assert_eq!(clip_score(f32::NAN), (0.0, true));
		assert_eq!(clip_score(f32::INFINITY), (1.0, true));
		assert_eq!(clip_score(-2.0), (0.0, true));
	}

	#[test]
	fn sort_is_stable_for_ties() {
		let mut list = vec![candidate("a", "one", 0.5), candidate("b", "two", 0.9), candidate("c", "three", 0.5)];

		sort_by_score(&mut list);

		let ids: Vec<&str> = list.iter().map(|c| c.chunk.id.as_str()).collect();

		assert_eq!(ids, vec!["b", "a", "c"]);
		assert!(is_ranked(&list));
	}

	#[test]
	fn dedup_uses_text_not_id() {
		let list = vec![candidate("a", "same", 0.9), candidate("b", "same ", 0.8), candidate("c", "other", 0.7)];
		let kept = dedup_by_content(list);

		assert_eq!(kept.len(), 2);
		assert_eq!(kept[0].chunk.id, "a");
		assert_eq!(kept[1].chunk.id, "c");
	}
}
