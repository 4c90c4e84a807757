use std::{
	collections::HashSet,
	future,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use color_eyre::eyre;
use futures::{StreamExt, stream};
use serde_json::Value;

use sift_config::{EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use sift_domain::{Chunk, text};
use sift_service::{
	BoxFuture, EmbeddingProvider, GeneratorProvider, LlmProvider, RerankProvider, TokenStream,
};
use sift_storage::{KeywordIndex, ParentStore};

/// Bag-of-words embedding: every token increments one hashed dimension, then the vector is
/// L2-normalized.
pub struct HashEmbedding;
impl HashEmbedding {
	pub fn vector(text: &str, dimensions: usize) -> Vec<f32> {
		let dimensions = dimensions.max(1);
		let mut vec = vec![0.0_f32; dimensions];

		for token in text::tokenize(text) {
			let hash = blake3::hash(token.as_bytes());
			let mut bytes = [0_u8; 8];

			bytes.copy_from_slice(&hash.as_bytes()[..8]);

			vec[(u64::from_le_bytes(bytes) % dimensions as u64) as usize] += 1.0;
		}

		let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

		if norm > 0.0 {
			vec.iter_mut().for_each(|value| *value /= norm);
		}

		vec
	}
}
impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let dimensions = cfg.dimensions as usize;
		let vectors = texts.iter().map(|text| Self::vector(text, dimensions)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

pub struct FailingEmbedding;
impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Err(eyre::eyre!("embedding endpoint unreachable")) })
	}
}

/// Hash embeddings behind a fixed delay, recording how many calls overlapped at most.
pub struct SlowEmbedding {
	delay: Duration,
	in_flight: AtomicUsize,
	peak: AtomicUsize,
}
impl SlowEmbedding {
	pub fn new(delay: Duration) -> Self {
		Self { delay, in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0) }
	}

	pub fn peak(&self) -> usize {
		self.peak.load(Ordering::SeqCst)
	}
}
impl EmbeddingProvider for SlowEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;

			self.peak.fetch_max(now, Ordering::SeqCst);

			tokio::time::sleep(self.delay).await;

			self.in_flight.fetch_sub(1, Ordering::SeqCst);

			let dimensions = cfg.dimensions as usize;

			Ok(texts.iter().map(|text| HashEmbedding::vector(text, dimensions)).collect())
		})
	}
}

/// Never resolves, so only cancellation can end the call.
pub struct PendingEmbedding;
impl EmbeddingProvider for PendingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(future::pending())
	}
}

/// Scores a passage by the share of query tokens it contains.
pub struct OverlapRerank;
impl RerankProvider for OverlapRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		let query_tokens = text::token_set(query);
		let scores = docs
			.iter()
			.map(|doc| text::overlap_ratio(&query_tokens, &text::token_set(doc)))
			.collect();

		Box::pin(async move { Ok(scores) })
	}
}

/// Returns the same scores for every call, whatever the batch size.
pub struct FixedRerank(pub Vec<f32>);
impl RerankProvider for FixedRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		let scores = self.0.iter().copied().cycle().take(docs.len()).collect();

		Box::pin(async move { Ok(scores) })
	}
}

pub struct FailingRerank;
impl RerankProvider for FailingRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move { Err(eyre::eyre!("rerank endpoint unreachable")) })
	}
}

/// Replies to classifier prompts and rewrite prompts separately. A missing reply is an error.
#[derive(Default)]
pub struct ScriptedLlm {
	pub classify: Option<Value>,
	pub rewrite: Option<Value>,
	calls: AtomicUsize,
}
impl ScriptedLlm {
	pub fn new(classify: Option<Value>, rewrite: Option<Value>) -> Self {
		Self { classify, rewrite, calls: AtomicUsize::new(0) }
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl LlmProvider for ScriptedLlm {
	fn complete_json<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let system = messages
			.first()
			.and_then(|message| message.get("content"))
			.and_then(Value::as_str)
			.unwrap_or_default();
		let reply = if system.contains("classify") { &self.classify } else { &self.rewrite };
		let reply = reply.clone();

		Box::pin(async move { reply.ok_or_else(|| eyre::eyre!("no scripted reply")) })
	}
}

pub struct StaticGenerator {
	tokens: Vec<String>,
}
impl StaticGenerator {
	pub fn new<I, S>(tokens: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { tokens: tokens.into_iter().map(Into::into).collect() }
	}
}
impl GeneratorProvider for StaticGenerator {
	fn generate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_prompt: &'a str,
		_max_tokens: u32,
	) -> BoxFuture<'a, color_eyre::Result<TokenStream>> {
		let tokens: Vec<color_eyre::Result<String>> =
			self.tokens.iter().cloned().map(Ok).collect();

		Box::pin(async move { Ok(stream::iter(tokens).boxed()) })
	}
}

pub struct FailingKeywords;
impl KeywordIndex for FailingKeywords {
	fn lookup<'a>(
		&'a self,
		_tokens: &'a [String],
		_k: usize,
	) -> sift_storage::BoxFuture<'a, sift_storage::Result<Vec<Arc<Chunk>>>> {
		Box::pin(async move {
			Err(sift_storage::Error::Unavailable("keyword index offline".to_string()))
		})
	}
}

/// Wraps a parent store and counts lookups that reach it.
pub struct CountingParents {
	inner: Arc<dyn ParentStore>,
	calls: AtomicUsize,
	ids: std::sync::Mutex<HashSet<String>>,
}
impl CountingParents {
	pub fn new(inner: Arc<dyn ParentStore>) -> Self {
		Self { inner, calls: AtomicUsize::new(0), ids: Default::default() }
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn distinct(&self) -> usize {
		self.ids.lock().map(|ids| ids.len()).unwrap_or_default()
	}
}
impl ParentStore for CountingParents {
	fn get_parent<'a>(
		&'a self,
		parent_chunk_id: &'a str,
	) -> sift_storage::BoxFuture<'a, sift_storage::Result<Option<Arc<Chunk>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if let Ok(mut ids) = self.ids.lock() {
			ids.insert(parent_chunk_id.to_string());
		}

		self.inner.get_parent(parent_chunk_id)
	}
}
