use std::collections::BTreeSet;

use serde::Serialize;

use crate::Candidate;

/// File-level relevance derived from chunk hits, presented as a ranked table row.
#[derive(Clone, Debug, Serialize)]
pub struct FileAggregate {
	pub file_name: String,
	pub aggregate_score: f32,
	pub matching_chunk_count: usize,
	/// Best member chunks in score order, at most three.
	pub top_chunks: Vec<Candidate>,
	pub page_numbers: BTreeSet<u32>,
}
