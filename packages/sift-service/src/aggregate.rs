//! File-level aggregation for exhaustive questions.

use std::collections::{BTreeSet, HashMap};

use sift_domain::{Candidate, FileAggregate, cmp_f32_desc, sort_by_score};

const TOP_CHUNKS: usize = 3;
const WEIGHTED_TOP: [f32; TOP_CHUNKS] = [0.5, 0.3, 0.2];
const COUNT_SATURATION: f32 = 10.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AggregationStrategy {
	/// Highest member score.
	Max,
	/// Mean of all member scores.
	Mean,
	/// Weighted sum of the top three member scores.
	#[default]
	Weighted,
	/// Member count saturating at ten.
	Count,
}
impl AggregationStrategy {
	pub fn parse(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"max" => Self::Max,
			"mean" => Self::Mean,
			"count" => Self::Count,
			_ => Self::Weighted,
		}
	}

	/// Scores a group whose members are sorted by descending score.
	pub fn score(self, members: &[Candidate]) -> f32 {
		if members.is_empty() {
			return 0.0;
		}

		match self {
			Self::Max => members[0].score,
			Self::Mean =>
				members.iter().map(|member| member.score).sum::<f32>() / members.len() as f32,
			Self::Weighted => {
				let top = members.len().min(TOP_CHUNKS);
				let weights = &WEIGHTED_TOP[..top];
				let total: f32 = weights.iter().sum();

				members.iter().zip(weights).map(|(member, weight)| member.score * weight).sum::<f32>()
					/ total
			},
			Self::Count => (members.len() as f32 / COUNT_SATURATION).min(1.0),
		}
	}
}

/// Groups candidates by source file and ranks the files.
pub fn aggregate(
	candidates: &[Candidate],
	top_n: usize,
	min_chunks: usize,
	strategy: AggregationStrategy,
) -> Vec<FileAggregate> {
	let mut order: Vec<String> = Vec::new();
	let mut groups: HashMap<String, Vec<Candidate>> = HashMap::new();

	for candidate in candidates {
		let file = &candidate.chunk.source_file;

		if !groups.contains_key(file) {
			order.push(file.clone());
		}

		groups.entry(file.clone()).or_default().push(candidate.clone());
	}

	let mut files: Vec<FileAggregate> = order
		.into_iter()
		.filter_map(|file| {
			let mut members = groups.remove(&file)?;

			if members.len() < min_chunks {
				return None;
			}

			sort_by_score(&mut members);

			let aggregate_score = strategy.score(&members);
			let page_numbers: BTreeSet<u32> = members.iter().filter_map(|m| m.chunk.page).collect();
			let matching_chunk_count = members.len();

			members.truncate(TOP_CHUNKS);

			Some(FileAggregate {
				file_name: file,
				aggregate_score,
				matching_chunk_count,
				top_chunks: members,
				page_numbers,
			})
		})
		.collect();

	files.sort_by(|a, b| cmp_f32_desc(a.aggregate_score, b.aggregate_score));
	files.truncate(top_n);

	files
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use sift_domain::{Chunk, ScoreKind};

	fn hit(file: &str, page: u32, score: f32) -> Candidate {
		let id = format!("{file}-{page}-{score}");

		let chunk = Chunk::new(id.clone(), id, file).with_page(page);

		Candidate::new(Arc::new(chunk), score, ScoreKind::Reranked)
	}

	fn corpus() -> Vec<Candidate> {
		vec![
			hit("a.pdf", 1, 0.9),
			hit("b.pdf", 2, 0.95),
			hit("a.pdf", 3, 0.8),
			hit("a.pdf", 3, 0.7),
			hit("c.pdf", 1, 0.2),
		]
	}

	#[test]
	fn weighted_renormalizes_short_groups() {
		let files = aggregate(&corpus(), 10, 1, AggregationStrategy::Weighted);

		assert_eq!(files[0].file_name, "b.pdf");
		assert!((files[0].aggregate_score - 0.95).abs() < 1e-6);
		assert_eq!(files[1].file_name, "a.pdf");
		assert!((files[1].aggregate_score - 0.83).abs() < 1e-6);
		assert_eq!(files[1].matching_chunk_count, 3);
		assert_eq!(files[1].page_numbers, BTreeSet::from([1, 3]));
	}

	#[test]
	fn strategies() {
		let max = aggregate(&corpus(), 10, 1, AggregationStrategy::Max);
		let mean = aggregate(&corpus(), 10, 1, AggregationStrategy::Mean);
		let count = aggregate(&corpus(), 10, 1, AggregationStrategy::Count);

		assert_eq!(max[0].file_name, "b.pdf");
		assert!((mean[1].aggregate_score - 0.8).abs() < 1e-6);
		assert_eq!(count[0].file_name, "a.pdf");
		assert!((count[0].aggregate_score - 0.3).abs() < 1e-6);
	}

	#[test]
	fn min_chunks_and_top_n() {
		let files = aggregate(&corpus(), 1, 2, AggregationStrategy::Weighted);

		assert_eq!(files.len(), 1);
		assert_eq!(files[0].file_name, "a.pdf");
	}

	#[test]
	fn top_chunks_are_bounded_and_sorted() {
		let mut hits = corpus();

		hits.push(hit("a.pdf", 9, 0.99));

		let files = aggregate(&hits, 10, 1, AggregationStrategy::Max);
		let a = files.iter().find(|f| f.file_name == "a.pdf").expect("missing a.pdf");
		let scores: Vec<f32> = a.top_chunks.iter().map(|c| c.score).collect();

		assert_eq!(scores, vec![0.99, 0.9, 0.8]);
	}

	#[test]
	fn weighted_is_monotonic_in_top_scores() {
		let base = vec![hit("a.pdf", 1, 0.6), hit("a.pdf", 2, 0.5), hit("a.pdf", 3, 0.4)];
		let before = AggregationStrategy::Weighted.score(&base);

		for idx in 0..3 {
			for bump in [0.05, 0.15, 0.3] {
				let mut raised = base.clone();

				raised[idx].score += bump;

				sort_by_score(&mut raised);

				assert!(AggregationStrategy::Weighted.score(&raised) >= before);
			}
		}
	}
}
