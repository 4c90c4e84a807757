//! Generator prompt assembly and answer streaming.

use std::fmt::Write;

use tokio_util::sync::CancellationToken;

use crate::{Error, Outcome, QueryResponse, Result, SiftService, cancellable};
use sift_providers::TokenStream;

impl SiftService {
	/// Streams an answer grounded in `response`. Requires a configured generator and evidence.
	pub async fn answer(
		&self,
		response: &QueryResponse,
		cancel: &CancellationToken,
	) -> Result<TokenStream> {
		let Some(generator_cfg) = self.cfg.providers.generator.as_ref() else {
			return Err(Error::InvalidRequest {
				message: "providers.generator is not configured.".to_string(),
			});
		};

		if !response.has_evidence() {
			return Err(Error::InvalidRequest {
				message: "No evidence was found to answer from.".to_string(),
			});
		}

		let prompt = build_answer_prompt(&response.question, response);
		let max_tokens = response.classification.tuning.max_output_tokens;
		let generated = cancellable(
			cancel,
			self.providers.generator.generate(generator_cfg, &prompt, max_tokens),
		)
		.await?;

		generated.map_err(|err| {
			tracing::warn!(error = %err, backend = "generator", "Generator unavailable.");

			Error::BackendExhausted { message: format!("Generator failed: {err}") }
		})
	}
}

/// Renders numbered passages, or the ranked file table for exhaustive questions.
pub fn build_answer_prompt(question: &str, response: &QueryResponse) -> String {
	let mut prompt = String::new();

	match &response.outcome {
		Outcome::Passages(passages) => {
			prompt.push_str(
				"Answer the question using only the numbered passages below. \
Cite passages as [n]. If the passages do not contain the answer, say so.\n\n",
			);

			for (idx, passage) in passages.iter().enumerate() {
				let chunk = &passage.chunk;
				let page = chunk.page.map(|page| format!(", page {page}")).unwrap_or_default();

				let _ = writeln!(
					prompt,
					"[{}] ({}{page})\n{}\n",
					idx + 1,
					chunk.source_file,
					chunk.text.trim()
				);
			}
		},
		Outcome::Files(files) => {
			prompt.push_str(
				"The user asked for a complete listing. Summarize the ranked files below as a \
table with one row per file, keeping the given order.\n\n",
			);

			for (idx, file) in files.iter().enumerate() {
				let pages: Vec<String> = file.page_numbers.iter().map(u32::to_string).collect();
				let best =
					file.top_chunks.first().map(|c| c.chunk.text.trim()).unwrap_or_default();

				let _ = writeln!(
					prompt,
					"{}. {} (score {:.3}, {} matching chunks, pages: {})\n   {}",
					idx + 1,
					file.file_name,
					file.aggregate_score,
					file.matching_chunk_count,
					if pages.is_empty() { "-".to_string() } else { pages.join(", ") },
					best,
				);
			}

			prompt.push('\n');
		},
		Outcome::NoEvidence => prompt.push_str("No relevant documents were found.\n\n"),
	}

	let _ = write!(prompt, "Question: {question}\nAnswer:");

	prompt
}
