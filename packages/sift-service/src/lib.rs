pub mod aggregate;
pub mod answer;
pub mod diagnostics;
pub mod expansion;
pub mod multi_query;
pub mod pipeline;
pub mod ranking;
pub mod rerank;
pub mod retrieval;
pub mod router;

mod error;

pub use aggregate::{AggregationStrategy, aggregate};
pub use answer::build_answer_prompt;
pub use diagnostics::{Backend, Diagnostic};
pub use error::{Error, Result};
pub use pipeline::{Outcome, QueryResponse};
pub use router::{
	Classification, ClassificationMethod, ClassifierStats, ClassifierStatsSnapshot, ModelVerdict,
	QuestionRouter, RuleVerdict,
};
pub use sift_providers::TokenStream;
pub use sift_storage::BoxFuture;

use std::{future::Future, sync::Arc};

use moka::{policy::EvictionPolicy, sync::Cache};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use sift_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use sift_domain::Chunk;
use sift_providers::{embedding, generator, llm};
use sift_storage::{KeywordIndex, MemoryStore, ParentStore, VectorIndex};

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

/// Structured-JSON completions for the classifier model tier and query rewriting.
pub trait LlmProvider
where
	Self: Send + Sync,
{
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

pub trait GeneratorProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		prompt: &'a str,
		max_tokens: u32,
	) -> BoxFuture<'a, color_eyre::Result<TokenStream>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub llm: Arc<dyn LlmProvider>,
	pub generator: Arc<dyn GeneratorProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		llm: Arc<dyn LlmProvider>,
		generator: Arc<dyn GeneratorProvider>,
	) -> Self {
		Self { embedding, rerank, llm, generator }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			rerank: provider.clone(),
			llm: provider.clone(),
			generator: provider,
		}
	}
}

/// Read-only corpus collaborators shared by every query.
#[derive(Clone)]
pub struct Stores {
	pub vectors: Arc<dyn VectorIndex>,
	pub keywords: Arc<dyn KeywordIndex>,
	pub parents: Arc<dyn ParentStore>,
}
impl Stores {
	pub fn new(
		vectors: Arc<dyn VectorIndex>,
		keywords: Arc<dyn KeywordIndex>,
		parents: Arc<dyn ParentStore>,
	) -> Self {
		Self { vectors, keywords, parents }
	}

	pub fn from_memory(store: Arc<MemoryStore>) -> Self {
		Self { vectors: store.clone(), keywords: store.clone(), parents: store }
	}
}

pub struct SiftService {
	pub cfg: Config,
	pub stores: Stores,
	pub providers: Providers,
	router: QuestionRouter,
	parent_cache: Cache<String, Arc<Chunk>>,
}
impl SiftService {
	pub fn new(cfg: Config, stores: Stores, providers: Providers) -> Self {
		let router = QuestionRouter::new(&cfg.router);
		let parent_cache = parent_cache(cfg.storage.parent_cache_capacity);

		Self { cfg, stores, providers, router, parent_cache }
	}

	pub fn router(&self) -> &QuestionRouter {
		&self.router
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(sift_providers::rerank::rerank(cfg, query, docs))
	}
}

impl LlmProvider for DefaultProviders {
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(llm::complete_json(cfg, messages))
	}
}

impl GeneratorProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		prompt: &'a str,
		max_tokens: u32,
	) -> BoxFuture<'a, color_eyre::Result<TokenStream>> {
		Box::pin(generator::generate(cfg, prompt, max_tokens))
	}
}

/// Bounded parent lookup cache; the least recently used entry goes first once full.
fn parent_cache(capacity: u64) -> Cache<String, Arc<Chunk>> {
	Cache::builder().max_capacity(capacity).eviction_policy(EvictionPolicy::lru()).build()
}

/// Races a collaborator call against the caller's cancellation token.
pub(crate) async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output>
where
	F: Future,
{
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled),
		out = fut => Ok(out),
	}
}
