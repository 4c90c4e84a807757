//! Query rewriting for multi-query retrieval.

use std::collections::HashSet;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{Diagnostic, Result, SiftService, cancellable, diagnostics::Backend};

impl SiftService {
	/// Returns the queries to retrieve with. Falls back to the question alone on any failure.
	pub async fn rewrite_queries(
		&self,
		question: &str,
		cancel: &CancellationToken,
	) -> Result<(Vec<String>, Vec<Diagnostic>)> {
		let mut diagnostics = Vec::new();
		let original = vec![question.trim().to_string()];
		let Some(llm_cfg) = self.cfg.providers.llm.as_ref() else {
			return Ok((original, diagnostics));
		};
		let cfg = &self.cfg.multi_query;
		let messages = build_rewrite_messages(question, cfg.max_queries, cfg.include_original);
		let reply =
			cancellable(cancel, self.providers.llm.complete_json(llm_cfg, &messages)).await?;
		let rewrites = match reply {
			Ok(value) => parse_rewrites(&value),
			Err(err) => {
				diagnostics.push(Diagnostic::backend_unavailable(Backend::Llm, err));

				return Ok((original, diagnostics));
			},
		};
		let mut queries =
			normalize_queries(rewrites, question, cfg.include_original, cfg.max_queries);

		if queries.is_empty() {
			queries = original;
		}

		tracing::debug!(count = queries.len(), "Rewrote question into queries.");

		Ok((queries, diagnostics))
	}
}

pub fn build_rewrite_messages(
	question: &str,
	max_queries: u32,
	include_original: bool,
) -> Vec<Value> {
	let schema = serde_json::json!({
		"queries": ["string"]
	});
	let schema_text = serde_json::to_string_pretty(&schema)
		.unwrap_or_else(|_| "{\"queries\": [\"string\"]}".to_string());
	let system_prompt = "You rewrite questions for a document retrieval system. \
Output must be valid JSON only and must match the provided schema exactly. \
Generate short search queries that together cover every part of the question, \
in the same language as the question. Do not add explanations or extra fields.";
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema_text}\nConstraints:\n- MAX_QUERIES = {max_queries}\n- INCLUDE_ORIGINAL = {include_original}\nQuestion:\n{question}",
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

pub fn parse_rewrites(value: &Value) -> Vec<String> {
	value
		.get("queries")
		.and_then(Value::as_array)
		.map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
		.unwrap_or_default()
}

/// Trims, drops blanks, de-duplicates case-insensitively, and caps the list at `max_queries`.
pub fn normalize_queries(
	queries: Vec<String>,
	original: &str,
	include_original: bool,
	max_queries: u32,
) -> Vec<String> {
	let max = max_queries.max(1) as usize;
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	if include_original {
		push_query(&mut out, &mut seen, original);
	}

	for query in queries {
		if out.len() >= max {
			break;
		}

		push_query(&mut out, &mut seen, &query);
	}

	out.truncate(max);

	out
}

fn push_query(out: &mut Vec<String>, seen: &mut HashSet<String>, value: &str) {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return;
	}
	if seen.insert(trimmed.to_lowercase()) {
		out.push(trimmed.to_string());
	}
}
