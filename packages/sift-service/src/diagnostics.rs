use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
	Embedding,
	Vector,
	Keyword,
	Rerank,
	Llm,
	ParentStore,
	Generator,
}
impl Backend {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Embedding => "embedding",
			Self::Vector => "vector",
			Self::Keyword => "keyword",
			Self::Rerank => "rerank",
			Self::Llm => "llm",
			Self::ParentStore => "parent_store",
			Self::Generator => "generator",
		}
	}
}

impl fmt::Display for Backend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A degraded-but-recovered condition observed while answering one query.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
	BackendUnavailable { backend: Backend, message: String },
	MalformedScore { count: usize },
	ParentNotFound { parent_chunk_id: String },
	ClassificationAmbiguous { reason: String },
}
impl Diagnostic {
	pub fn backend_unavailable(backend: Backend, err: impl fmt::Display) -> Self {
		let message = err.to_string();

		tracing::warn!(backend = %backend, error = %message, "Backend unavailable, degrading.");

		Self::BackendUnavailable { backend, message }
	}

	pub fn is_backend_unavailable(&self, backend: Backend) -> bool {
		matches!(self, Self::BackendUnavailable { backend: b, .. } if *b == backend)
	}
}
