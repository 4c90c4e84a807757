use std::path::PathBuf;

use serde_json::Map;

use sift_config::{
	Aggregation, Config, Diversity, EmbeddingProviderConfig, Expansion, Filter, LlmProviderConfig,
	MultiQuery, ProviderConfig, Providers, Retrieval, Router, Service, Storage,
};
use sift_domain::{Chunk, ChunkRecord, ChunkType};
use sift_storage::MemoryStore;

use crate::HashEmbedding;

pub const DIMENSIONS: u32 = 256;

pub const OLED_PARENT: &str = "Display technology survey, chapter two. Organic light emitting \
diodes are self-emissive. OLED lifetime depends on blue emitter degradation and drive current. \
Manufacturers compensate with pixel shifting and larger blue subpixels. Burn-in remains the \
main complaint from long-term owners of static-content screens.";
/// Appears verbatim inside [`OLED_PARENT`].
pub const OLED_CHILD: &str = "OLED lifetime depends on blue emitter degradation and drive current.";
/// Stored twice under different files and ids.
pub const OLED_BLACK_LEVELS: &str =
	"OLED panels reach perfect black levels because pixels switch off.";
pub const KFRET_VALUE: &str = "The kFRET value measured in the assay was 0.42.";

pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string(), max_concurrency: 3 },
		storage: Storage { corpus_path: PathBuf::from("corpus.jsonl"), parent_cache_capacity: 64 },
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "hash".to_string(),
				dimensions: DIMENSIONS,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: Some(ProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test-key".to_string(),
				path: "/rerank".to_string(),
				model: "overlap".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			}),
			llm: None,
			generator: Some(llm_provider("generator")),
		},
		router: Router::default(),
		retrieval: Retrieval::default(),
		multi_query: MultiQuery::default(),
		filter: Filter::default(),
		diversity: Diversity::default(),
		expansion: Expansion::default(),
		aggregation: Aggregation::default(),
	}
}

pub fn llm_provider(model: &str) -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://localhost".to_string(),
		api_key: "test-key".to_string(),
		path: "/chat/completions".to_string(),
		model: model.to_string(),
		temperature: 0.0,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

/// Chunks about displays, one assay value, and one unrelated battery note.
pub fn fixture_chunks() -> Vec<Chunk> {
	vec![
		Chunk::new("oled-parent", OLED_PARENT, "oled.pdf")
			.with_page(1)
			.with_type(ChunkType::Body, 1.0),
		Chunk::new("oled-1", OLED_CHILD, "oled.pdf").with_page(1).with_parent("oled-parent"),
		Chunk::new("oled-2", OLED_BLACK_LEVELS, "oled.pdf").with_page(2),
		Chunk::new("oled-3", "OLED burn-in appears after months of static content.", "oled.pdf")
			.with_page(3)
			.with_parent("missing-parent"),
		Chunk::new("oled-summary", "Summary: OLED offers contrast, QLED offers brightness.", "oled.pdf")
			.with_page(4)
			.with_type(ChunkType::Summary, 1.1),
		Chunk::new("qled-1", "QLED displays use quantum dots on an LCD backlight.", "qled.pdf")
			.with_page(1),
		Chunk::new("qled-2", "QLED brightness exceeds OLED brightness in sunny rooms.", "qled.pdf")
			.with_page(2),
		Chunk::new("review-1", OLED_BLACK_LEVELS, "review.pdf").with_page(7),
		Chunk::new("kfret-1", KFRET_VALUE, "assay.pdf").with_page(5),
		Chunk::new("battery-1", "Lithium battery chemistry favours nickel rich cathodes.", "battery.pdf"),
	]
}

pub fn fixture_records() -> Vec<ChunkRecord> {
	fixture_chunks()
		.into_iter()
		.map(|chunk| {
			let embedding = HashEmbedding::vector(&chunk.text, DIMENSIONS as usize);

			ChunkRecord { chunk, embedding: Some(embedding) }
		})
		.collect()
}

pub fn fixture_store() -> MemoryStore {
	let mut store = MemoryStore::default();

	for record in fixture_records() {
		if let Err(err) = store.insert(record) {
			panic!("Fixture corpus is invalid: {err}.");
		}
	}

	store
}
