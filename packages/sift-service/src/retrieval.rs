//! Hybrid dense + lexical retrieval.

use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

use crate::{Diagnostic, Error, Result, SiftService, cancellable, diagnostics::Backend};
use sift_config::Retrieval;
use sift_domain::{Candidate, Chunk, ScoreKind, min_max_normalize, sort_by_score, text};

impl SiftService {
	/// Retrieves up to `fan_out` fused candidates for one query.
	///
	/// An unreachable dense backend degrades to the keyword-indexed lexical path. Only when that
	/// path fails too does the call return [`Error::BackendExhausted`].
	pub async fn retrieve(
		&self,
		query: &str,
		fan_out: usize,
		cancel: &CancellationToken,
	) -> Result<(Vec<Candidate>, Vec<Diagnostic>)> {
		let mut diagnostics = Vec::new();

		match self.dense_hits(query, fan_out, cancel).await? {
			Ok(hits) => {
				let candidates = fuse(query, hits, &self.cfg.retrieval, fan_out);

				tracing::debug!(query, candidates = candidates.len(), "Hybrid retrieval finished.");

				return Ok((candidates, diagnostics));
			},
			Err(diagnostic) => diagnostics.push(diagnostic),
		}

		let tokens = text::tokenize(query);
		let lookup = cancellable(cancel, self.stores.keywords.lookup(&tokens, fan_out)).await?;
		let chunks = match lookup {
			Ok(chunks) => chunks,
			Err(err) => {
				diagnostics.push(Diagnostic::backend_unavailable(Backend::Keyword, &err));

				return Err(Error::BackendExhausted {
					message: format!("Dense and keyword retrieval both failed: {err}"),
				});
			},
		};
		let candidates = lexical_only(query, chunks, fan_out);

		tracing::info!(query, candidates = candidates.len(), "Lexical-only retrieval finished.");

		Ok((candidates, diagnostics))
	}

	/// Runs every query concurrently and merges the per-query lists by content hash.
	pub async fn retrieve_many(
		&self,
		queries: &[String],
		fan_out: usize,
		cancel: &CancellationToken,
	) -> Result<(Vec<Candidate>, Vec<Diagnostic>)> {
		if let [query] = queries {
			return self.retrieve(query, fan_out, cancel).await;
		}

		let concurrency = (self.cfg.service.max_concurrency as usize).max(1);
		let mut results: Vec<(usize, Result<(Vec<Candidate>, Vec<Diagnostic>)>)> =
			stream::iter(0..queries.len())
				.map(|idx| async move { (idx, self.retrieve(&queries[idx], fan_out, cancel).await) })
				.buffer_unordered(concurrency)
				.collect()
				.await;

		results.sort_by_key(|(idx, _)| *idx);

		let mut lists = Vec::new();
		let mut diagnostics = Vec::new();
		let mut first_err = None;

		for (_, result) in results {
			match result {
				Ok((candidates, diags)) => {
					lists.push(candidates);
					diagnostics.extend(diags);
				},
				Err(Error::Cancelled) => return Err(Error::Cancelled),
				Err(err) => {
					tracing::warn!(error = %err, "Dropping a failed rewritten query.");

					first_err.get_or_insert(err);
				},
			}
		}

		if lists.is_empty()
			&& let Some(err) = first_err
		{
			return Err(err);
		}

		Ok((merge_by_content(lists, fan_out), diagnostics))
	}

	async fn dense_hits(
		&self,
		query: &str,
		fan_out: usize,
		cancel: &CancellationToken,
	) -> Result<std::result::Result<Vec<(Arc<Chunk>, f32)>, Diagnostic>> {
		let texts = vec![query.to_string()];
		let embedded =
			cancellable(cancel, self.providers.embedding.embed(&self.cfg.providers.embedding, &texts))
				.await?;
		let embedding = match embedded {
			Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
			Ok(_) =>
				return Ok(Err(Diagnostic::backend_unavailable(
					Backend::Embedding,
					"Embedding provider returned no vectors.",
				))),
			Err(err) => return Ok(Err(Diagnostic::backend_unavailable(Backend::Embedding, err))),
		};
		let searched = cancellable(cancel, self.stores.vectors.search(&embedding, fan_out)).await?;

		Ok(searched.map_err(|err| Diagnostic::backend_unavailable(Backend::Vector, err)))
	}
}

/// Fuses vector distances with query-token overlap.
///
/// Both signals are min-max normalized across the batch before weighting, the chunk's type weight
/// is applied to the weighted sum, and the result is normalized again so the best candidate scores
/// `1.0`.
pub fn fuse(
	query: &str,
	hits: Vec<(Arc<Chunk>, f32)>,
	cfg: &Retrieval,
	fan_out: usize,
) -> Vec<Candidate> {
	let query_tokens = text::token_set(query);
	let mut similarities: Vec<f32> =
		hits.iter().map(|(_, distance)| (cfg.reference_range - distance).max(0.0)).collect();
	let mut overlaps: Vec<f32> = hits
		.iter()
		.map(|(chunk, _)| text::overlap_ratio(&query_tokens, &text::token_set(&chunk.text)))
		.collect();

	min_max_normalize(&mut similarities);
	min_max_normalize(&mut overlaps);

	let mut fused: Vec<f32> = hits
		.iter()
		.zip(similarities.iter().zip(&overlaps))
		.map(|((chunk, _), (sim, overlap))| {
			(cfg.vector_weight * sim + cfg.lexical_weight * overlap) * chunk.effective_type_weight()
		})
		.collect();

	normalize_scores(&mut fused);

	let candidates = hits
		.into_iter()
		.zip(fused)
		.map(|((chunk, _), score)| Candidate::new(chunk, score, ScoreKind::Fused))
		.collect();

	rank_and_truncate(candidates, fan_out)
}

/// Scores keyword-lookup results by token overlap alone.
pub fn lexical_only(query: &str, chunks: Vec<Arc<Chunk>>, fan_out: usize) -> Vec<Candidate> {
	let query_tokens = text::token_set(query);
	let mut scores: Vec<f32> = chunks
		.iter()
		.map(|chunk| {
			text::overlap_ratio(&query_tokens, &text::token_set(&chunk.text))
				* chunk.effective_type_weight()
		})
		.collect();

	normalize_scores(&mut scores);

	let candidates = chunks
		.into_iter()
		.zip(scores)
		.map(|(chunk, score)| Candidate::new(chunk, score, ScoreKind::Lexical))
		.collect();

	rank_and_truncate(candidates, fan_out)
}

/// Merges ranked lists, keeping the best score per content hash, then re-ranks.
pub fn merge_by_content(lists: Vec<Vec<Candidate>>, fan_out: usize) -> Vec<Candidate> {
	let mut merged: Vec<Candidate> = Vec::new();
	let mut index: HashMap<String, usize> = HashMap::new();

	for candidate in lists.into_iter().flatten() {
		let hash = candidate.content_hash();

		match index.get(&hash) {
			Some(pos) =>
				if candidate.score > merged[*pos].score {
					merged[*pos] = candidate;
				},
			None => {
				index.insert(hash, merged.len());
				merged.push(candidate);
			},
		}
	}

	let mut scores: Vec<f32> = merged.iter().map(|candidate| candidate.score).collect();

	normalize_scores(&mut scores);

	for (candidate, score) in merged.iter_mut().zip(scores) {
		candidate.score = score;
	}

	rank_and_truncate(merged, fan_out)
}

/// Min-max normalization where a flat batch maps to `1.0`.
fn normalize_scores(values: &mut [f32]) {
	min_max_normalize(values);

	if values.iter().all(|value| *value == 0.0) {
		values.iter_mut().for_each(|value| *value = 1.0);
	}
}

fn rank_and_truncate(mut candidates: Vec<Candidate>, fan_out: usize) -> Vec<Candidate> {
	let mut seen = HashSet::new();

	candidates.retain(|candidate| seen.insert(candidate.chunk.id.clone()));

	sort_by_score(&mut candidates);

	candidates.truncate(fan_out);

	candidates
}
