//! Small-to-large context expansion.

use std::{
	collections::HashSet,
	sync::Arc,
};

use serde_json::Map;
use tokio_util::sync::CancellationToken;

use crate::{Diagnostic, Result, SiftService, cancellable, diagnostics::Backend};
use sift_config::Expansion;
use sift_domain::{Candidate, Chunk, sort_by_score, text};

impl SiftService {
	/// Adds bounded parent excerpts after their children, then removes near-duplicates and keeps
	/// the best `top_k`.
	pub async fn expand(
		&self,
		candidates: Vec<Candidate>,
		top_k: usize,
		cancel: &CancellationToken,
	) -> Result<(Vec<Candidate>, Vec<Diagnostic>)> {
		let cfg = &self.cfg.expansion;
		let mut diagnostics = Vec::new();
		let mut seen_hashes = HashSet::new();
		let mut processed_parents = HashSet::new();
		let mut expanded = 0;
		let mut out = Vec::with_capacity(candidates.len() + cfg.max_parents as usize);
		let mut ordered = candidates;

		sort_by_score(&mut ordered);

		for candidate in ordered {
			if !seen_hashes.insert(candidate.content_hash()) {
				continue;
			}

			let parent_id = candidate.chunk.parent_chunk_id.clone();

			out.push(candidate);

			let Some(parent_id) = parent_id else { continue };

			if expanded >= cfg.max_parents || !processed_parents.insert(parent_id.clone()) {
				continue;
			}

			let parent = match self.parent(&parent_id, cancel).await? {
				Ok(Some(parent)) => parent,
				Ok(None) => {
					tracing::debug!(parent_chunk_id = %parent_id, "Parent chunk not found.");

					diagnostics.push(Diagnostic::ParentNotFound { parent_chunk_id: parent_id });

					continue;
				},
				Err(diagnostic) => {
					diagnostics.push(diagnostic);

					continue;
				},
			};
			let Some(child) = out.last() else { continue };
			let Some(excerpt) = partial_parent(child, &parent, cfg) else { continue };

			if !seen_hashes.insert(excerpt.content_hash()) {
				continue;
			}

			out.push(excerpt);

			expanded += 1;
		}

		let out = dedup_similar(out, cfg.dedup_threshold, top_k);

		tracing::debug!(parents = expanded, passages = out.len(), "Context expansion finished.");

		Ok((out, diagnostics))
	}

	/// Parent lookup through the shared LRU cache. Misses are not cached.
	async fn parent(
		&self,
		parent_id: &str,
		cancel: &CancellationToken,
	) -> Result<std::result::Result<Option<Arc<Chunk>>, Diagnostic>> {
		if let Some(hit) = self.parent_cache.get(parent_id) {
			return Ok(Ok(Some(hit)));
		}

		let fetched = cancellable(cancel, self.stores.parents.get_parent(parent_id)).await?;

		match fetched {
			Ok(Some(parent)) => {
				self.parent_cache.insert(parent_id.to_string(), parent.clone());

				Ok(Ok(Some(parent)))
			},
			Ok(None) => Ok(Ok(None)),
			Err(err) => Ok(Err(Diagnostic::backend_unavailable(Backend::ParentStore, err))),
		}
	}
}

/// Builds the excerpt candidate for `child`, or `None` when the parent adds nothing new.
pub fn partial_parent(child: &Candidate, parent: &Chunk, cfg: &Expansion) -> Option<Candidate> {
	let near_duplicate = cfg.near_duplicate_threshold;

	if text::jaccard_similarity(&parent.text, &child.chunk.text) >= near_duplicate {
		tracing::debug!(parent_chunk_id = %parent.id, "Parent is a near-duplicate of its child.");

		return None;
	}

	let excerpt =
		excerpt_around(&parent.text, &child.chunk.text, cfg.partial_context_chars as usize);

	if excerpt.is_empty() || text::jaccard_similarity(&excerpt, &child.chunk.text) >= near_duplicate
	{
		return None;
	}

	let chunk = Chunk {
		id: format!("{}#partial:{}", parent.id, child.chunk.id),
		text: excerpt,
		source_file: parent.source_file.clone(),
		page: parent.page.or(child.chunk.page),
		chunk_type: parent.chunk_type,
		parent_chunk_id: None,
		type_weight: parent.type_weight,
		section_title: parent.section_title.clone().or_else(|| child.chunk.section_title.clone()),
		heading_level: parent.heading_level,
		extra: Map::new(),
	};
	let mut candidate = Candidate::new(
		Arc::new(chunk),
		child.score * cfg.partial_score_discount,
		child.score_kind,
	);

	candidate.is_partial_parent = true;
	candidate.origin_chunk_id = Some(child.chunk.id.clone());

	Some(candidate)
}

/// `context_chars` characters on each side of `child` inside `parent`, or the parent's first
/// `2 * context_chars` characters when the child text is not found verbatim.
pub fn excerpt_around(parent: &str, child: &str, context_chars: usize) -> String {
	let needle = child.trim();
	let located = if needle.is_empty() { None } else { parent.find(needle) };
	let Some(byte_start) = located else {
		return parent.chars().take(context_chars * 2).collect::<String>().trim().to_string();
	};
	let char_start = parent[..byte_start].chars().count();
	let char_len = needle.chars().count();
	let from = char_start.saturating_sub(context_chars);
	let to = char_start + char_len + context_chars;

	parent.chars().skip(from).take(to - from).collect::<String>().trim().to_string()
}

/// Greedy pairwise near-duplicate removal over a score-sorted list, keeping the higher score.
pub fn dedup_similar(
	mut candidates: Vec<Candidate>,
	threshold: f32,
	top_k: usize,
) -> Vec<Candidate> {
	sort_by_score(&mut candidates);

	let mut kept: Vec<Candidate> = Vec::new();
	let mut kept_tokens: Vec<(String, HashSet<String>)> = Vec::new();
	let mut hashes = HashSet::new();

	for candidate in candidates {
		let hash = candidate.content_hash();

		if hashes.contains(&hash) {
			continue;
		}

		let tokens = text::token_set(&candidate.chunk.text);
		let duplicate = kept_tokens.iter().any(|(other_hash, other)| {
			text::jaccard_of_sets(&tokens, other, *other_hash == hash) >= threshold
		});

		if duplicate {
			continue;
		}

		hashes.insert(hash.clone());
		kept_tokens.push((hash, tokens));
		kept.push(candidate);

		if kept.len() >= top_k {
			break;
		}
	}

	kept
}
