//! End-to-end query orchestration.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
	AggregationStrategy, Classification, ClassifierStats, Diagnostic, Error, Result, SiftService,
	aggregate, cancellable,
	ranking::{FilterParams, SourceKey, adjust, filter},
};
use sift_domain::{Candidate, FileAggregate, dedup_by_content, is_ranked};

/// What the pipeline found for one question.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum Outcome {
	Passages(Vec<Candidate>),
	Files(Vec<FileAggregate>),
	/// Retrieval produced nothing relevant. Not an error.
	NoEvidence,
}

/// Self-contained result of one query, consumed once by the answer stage.
#[derive(Clone, Debug, Serialize)]
pub struct QueryResponse {
	pub query_id: Uuid,
	pub question: String,
	pub classification: Classification,
	/// Queries actually retrieved with, the question first.
	pub queries: Vec<String>,
	pub outcome: Outcome,
	pub diagnostics: Vec<Diagnostic>,
}
impl QueryResponse {
	/// Passage sources. Empty for the file-table branch.
	pub fn sources(&self) -> &[Candidate] {
		match &self.outcome {
			Outcome::Passages(passages) => passages,
			_ => &[],
		}
	}

	pub fn files(&self) -> &[FileAggregate] {
		match &self.outcome {
			Outcome::Files(files) => files,
			_ => &[],
		}
	}

	pub fn has_evidence(&self) -> bool {
		!matches!(self.outcome, Outcome::NoEvidence)
	}
}

impl SiftService {
	/// Runs one question through routing, retrieval and ranking.
	///
	/// Degraded collaborators are reported as diagnostics. Only an empty question, exhaustion of
	/// every retrieval signal, storage failures, or cancellation return an error.
	pub async fn query(
		&self,
		question: &str,
		cancel: &CancellationToken,
		stats: Option<&ClassifierStats>,
	) -> Result<QueryResponse> {
		let question = question.trim();

		if question.is_empty() {
			return Err(Error::InvalidRequest {
				message: "question must be non-empty.".to_string(),
			});
		}
		if cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}

		let query_id = Uuid::new_v4();
		let span = tracing::info_span!("query", query_id = %query_id);

		self.run_query(query_id, question, cancel, stats).instrument(span).await
	}

	async fn run_query(
		&self,
		query_id: Uuid,
		question: &str,
		cancel: &CancellationToken,
		stats: Option<&ClassifierStats>,
	) -> Result<QueryResponse> {
		let mut diagnostics = Vec::new();
		let (classification, diags) = cancellable(cancel, self.classify(question, stats)).await?;

		diagnostics.extend(diags);

		let tuning = classification.tuning.clone();
		let queries = if tuning.multi_query_enabled {
			let (queries, diags) = self.rewrite_queries(question, cancel).await?;

			diagnostics.extend(diags);

			queries
		} else {
			vec![question.to_string()]
		};
		let (retrieved, diags) =
			self.retrieve_many(&queries, tuning.fan_out_width as usize, cancel).await?;

		diagnostics.extend(diags);

		tracing::info!(
			question_type = %classification.question_type,
			confidence = classification.confidence,
			queries = queries.len(),
			retrieved = retrieved.len(),
			"Retrieval finished."
		);

		if retrieved.is_empty() {
			let outcome = Outcome::NoEvidence;

			return Ok(self.respond(query_id, question, classification, queries, outcome, diagnostics));
		}

		let keep = (tuning.rerank_depth as usize).min(retrieved.len());
		let (ranked, diags) = self.rerank(question, retrieved, keep, cancel).await?;

		debug_assert!(is_ranked(&ranked), "Reranked list must be sorted by descending score.");

		diagnostics.extend(diags);

		let outcome = if classification.is_exhaustive() {
			let cfg = &self.cfg.aggregation;
			let files = aggregate(
				&dedup_by_content(ranked),
				cfg.top_n as usize,
				cfg.min_chunks as usize,
				AggregationStrategy::parse(&cfg.strategy),
			);

			if files.is_empty() { Outcome::NoEvidence } else { Outcome::Files(files) }
		} else {
			let passages =
				self.assemble_passages(ranked, &classification, cancel, &mut diagnostics).await?;

			if passages.is_empty() { Outcome::NoEvidence } else { Outcome::Passages(passages) }
		};

		Ok(self.respond(query_id, question, classification, queries, outcome, diagnostics))
	}

	async fn assemble_passages(
		&self,
		ranked: Vec<Candidate>,
		classification: &Classification,
		cancel: &CancellationToken,
		diagnostics: &mut Vec<Diagnostic>,
	) -> Result<Vec<Candidate>> {
		let tuning = &classification.tuning;
		let top_k = tuning.top_k as usize;
		let mut passages = dedup_by_content(ranked);

		if tuning.statistical_filter {
			passages = filter(passages, &FilterParams::from_config(&self.cfg.filter));
		}

		let source_key = SourceKey::parse(&self.cfg.diversity.source_key);

		passages = adjust(passages, tuning.diversity_penalty, |chunk| source_key.key(chunk));

		if tuning.context_expansion {
			let (expanded, diags) = self.expand(passages, top_k, cancel).await?;

			diagnostics.extend(diags);

			return Ok(expanded);
		}

		passages.truncate(top_k);

		Ok(passages)
	}

	fn respond(
		&self,
		query_id: Uuid,
		question: &str,
		classification: Classification,
		queries: Vec<String>,
		outcome: Outcome,
		diagnostics: Vec<Diagnostic>,
	) -> QueryResponse {
		match &outcome {
			Outcome::Passages(passages) => {
				tracing::info!(passages = passages.len(), "Query answered with passages.")
			},
			Outcome::Files(files) => {
				tracing::info!(files = files.len(), "Query answered with a file table.")
			},
			Outcome::NoEvidence => tracing::info!("No evidence found."),
		}

		QueryResponse {
			query_id,
			question: question.to_string(),
			classification,
			queries,
			outcome,
			diagnostics,
		}
	}
}
