//! Cross-encoder reranking with graceful pass-through.

use tokio_util::sync::CancellationToken;

use crate::{Diagnostic, Result, SiftService, cancellable, diagnostics::Backend};
use sift_domain::{Candidate, ScoreKind, clip_score, sort_by_score};

impl SiftService {
	/// Rescores `candidates` against `query` and keeps the best `keep`.
	///
	/// Without a configured scorer, or when the scorer fails, the input comes back untouched.
	pub async fn rerank(
		&self,
		query: &str,
		candidates: Vec<Candidate>,
		keep: usize,
		cancel: &CancellationToken,
	) -> Result<(Vec<Candidate>, Vec<Diagnostic>)> {
		let mut diagnostics = Vec::new();
		let Some(rerank_cfg) = self.cfg.providers.rerank.as_ref() else {
			tracing::debug!("No rerank provider configured, passing candidates through.");

			return Ok((candidates, diagnostics));
		};

		if candidates.is_empty() {
			return Ok((candidates, diagnostics));
		}

		let docs: Vec<String> =
			candidates.iter().map(|candidate| candidate.chunk.text.clone()).collect();
		let scored =
			cancellable(cancel, self.providers.rerank.rerank(rerank_cfg, query, &docs)).await?;
		let scores = match scored {
			Ok(scores) if scores.len() == candidates.len() => scores,
			Ok(scores) => {
				diagnostics.push(Diagnostic::backend_unavailable(
					Backend::Rerank,
					format!("Expected {} scores, got {}.", candidates.len(), scores.len()),
				));

				return Ok((candidates, diagnostics));
			},
			Err(err) => {
				diagnostics.push(Diagnostic::backend_unavailable(Backend::Rerank, err));

				return Ok((candidates, diagnostics));
			},
		};
		let (reranked, malformed) = apply_scores(candidates, &scores, keep);

		if malformed > 0 {
			tracing::warn!(count = malformed, "Clipped malformed rerank scores.");

			diagnostics.push(Diagnostic::MalformedScore { count: malformed });
		}

		Ok((reranked, diagnostics))
	}
}

/// Attaches clipped scores, sorts, and truncates. Returns the number of clipped scores.
pub fn apply_scores(
	mut candidates: Vec<Candidate>,
	scores: &[f32],
	keep: usize,
) -> (Vec<Candidate>, usize) {
	let mut malformed = 0;

	for (candidate, raw) in candidates.iter_mut().zip(scores) {
		let (score, was_malformed) = clip_score(*raw);

		if was_malformed {
			malformed += 1;
		}

		candidate.score = score;
		candidate.score_kind = ScoreKind::Reranked;
		candidate.prior_score = None;
	}

	sort_by_score(&mut candidates);

	candidates.truncate(keep);

	(candidates, malformed)
}
