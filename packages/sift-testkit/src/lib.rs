//! Deterministic in-process collaborators and a small fixture corpus for pipeline tests.

pub mod fakes;
pub mod fixtures;

pub use fakes::{
	CountingParents, FailingEmbedding, FailingKeywords, FailingRerank, FixedRerank, HashEmbedding,
	OverlapRerank, PendingEmbedding, ScriptedLlm, SlowEmbedding, StaticGenerator,
};
pub use fixtures::{fixture_chunks, fixture_records, fixture_store, llm_provider, test_config};

use std::sync::Arc;

use sift_service::{Providers, SiftService, Stores};
use sift_storage::MemoryStore;

/// Providers with working fakes for every collaborator and no LLM replies scripted.
pub fn default_providers() -> Providers {
	Providers::new(
		Arc::new(HashEmbedding),
		Arc::new(OverlapRerank),
		Arc::new(ScriptedLlm::default()),
		Arc::new(StaticGenerator::new(["Answer", " text."])),
	)
}

pub fn service_with(store: Arc<MemoryStore>, providers: Providers) -> SiftService {
	SiftService::new(test_config(), Stores::from_memory(store), providers)
}

/// A service over the fixture corpus with [`default_providers`].
pub fn fixture_service() -> SiftService {
	service_with(Arc::new(fixture_store()), default_providers())
}
