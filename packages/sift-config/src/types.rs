use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub router: Router,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub multi_query: MultiQuery,
	#[serde(default)]
	pub filter: Filter,
	#[serde(default)]
	pub diversity: Diversity,
	#[serde(default)]
	pub expansion: Expansion,
	#[serde(default)]
	pub aggregation: Aggregation,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
	/// Upper bound on concurrently running retrievals for one multi-query fan-out.
	#[serde(default = "default_max_concurrency")]
	pub max_concurrency: u32,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	/// JSONL file of chunk records produced by ingestion.
	pub corpus_path: PathBuf,
	#[serde(default = "default_parent_cache_capacity")]
	pub parent_cache_capacity: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	/// Optional. Without it the reranking stage passes candidates through.
	pub rerank: Option<ProviderConfig>,
	/// Optional. Enables the classifier model tier and multi-query rewriting.
	pub llm: Option<LlmProviderConfig>,
	/// Optional. Used only to stream answers.
	pub generator: Option<LlmProviderConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Router {
	/// Rule-tier confidence at or above which the model tier is never consulted.
	pub high_confidence: f32,
	/// Rule-tier confidence below which the model tier is always consulted.
	pub low_confidence: f32,
	/// Whether confidences between the two thresholds consult the model tier.
	pub consult_gray_zone: bool,
	pub profiles: RouterProfiles,
}
impl Default for Router {
	fn default() -> Self {
		Self {
			high_confidence: 0.8,
			low_confidence: 0.5,
			consult_gray_zone: true,
			profiles: RouterProfiles::default(),
		}
	}
}

/// Tuning bundle per question type. A profile table given in the config replaces the whole
/// built-in profile for that type.
#[derive(Clone, Debug, Deserialize)]
pub struct RouterProfiles {
	#[serde(default = "default_simple_profile")]
	pub simple: TuningProfile,
	#[serde(default = "default_normal_profile")]
	pub normal: TuningProfile,
	#[serde(default = "default_complex_profile")]
	pub complex: TuningProfile,
	#[serde(default = "default_exhaustive_profile")]
	pub exhaustive: TuningProfile,
}
impl Default for RouterProfiles {
	fn default() -> Self {
		Self {
			simple: default_simple_profile(),
			normal: default_normal_profile(),
			complex: default_complex_profile(),
			exhaustive: default_exhaustive_profile(),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TuningProfile {
	pub fan_out_width: u32,
	pub rerank_depth: u32,
	pub multi_query_enabled: bool,
	pub max_output_tokens: u32,
	/// Number of passages handed to the generator.
	pub top_k: u32,
	pub diversity_penalty: f32,
	pub statistical_filter: bool,
	pub context_expansion: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub vector_weight: f32,
	pub lexical_weight: f32,
	/// Distances are turned into similarities as `max(0, reference_range - distance)`.
	pub reference_range: f32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self { vector_weight: 0.6, lexical_weight: 0.4, reference_range: 2.0 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MultiQuery {
	pub max_queries: u32,
	pub include_original: bool,
}
impl Default for MultiQuery {
	fn default() -> Self {
		Self { max_queries: 3, include_original: true }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Filter {
	/// One of mad, iqr, zscore, or off.
	pub method: String,
	/// Deviation multiplier. Defaults depend on the method when unset.
	pub k: Option<f32>,
	pub gap_threshold_multiplier: f32,
	pub min_docs: u32,
}
impl Default for Filter {
	fn default() -> Self {
		Self { method: "mad".to_string(), k: None, gap_threshold_multiplier: 2.0, min_docs: 3 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Diversity {
	/// One of file, file_page, or section.
	pub source_key: String,
}
impl Default for Diversity {
	fn default() -> Self {
		Self { source_key: "file".to_string() }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Expansion {
	pub max_parents: u32,
	pub partial_context_chars: u32,
	pub partial_score_discount: f32,
	pub near_duplicate_threshold: f32,
	pub dedup_threshold: f32,
}
impl Default for Expansion {
	fn default() -> Self {
		Self {
			max_parents: 3,
			partial_context_chars: 300,
			partial_score_discount: 0.8,
			near_duplicate_threshold: 0.9,
			dedup_threshold: 0.85,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Aggregation {
	pub top_n: u32,
	pub min_chunks: u32,
	/// One of max, mean, weighted, or count.
	pub strategy: String,
}
impl Default for Aggregation {
	fn default() -> Self {
		Self { top_n: 20, min_chunks: 1, strategy: "weighted".to_string() }
	}
}

fn default_max_concurrency() -> u32 {
	4
}

fn default_parent_cache_capacity() -> u64 {
	1_024
}

fn default_simple_profile() -> TuningProfile {
	TuningProfile {
		fan_out_width: 30,
		rerank_depth: 10,
		multi_query_enabled: false,
		max_output_tokens: 1_024,
		top_k: 5,
		diversity_penalty: 0.3,
		statistical_filter: true,
		context_expansion: true,
	}
}

fn default_normal_profile() -> TuningProfile {
	TuningProfile {
		fan_out_width: 50,
		rerank_depth: 15,
		multi_query_enabled: false,
		max_output_tokens: 2_048,
		top_k: 7,
		diversity_penalty: 0.3,
		statistical_filter: true,
		context_expansion: true,
	}
}

fn default_complex_profile() -> TuningProfile {
	TuningProfile {
		fan_out_width: 80,
		rerank_depth: 25,
		multi_query_enabled: true,
		max_output_tokens: 4_096,
		top_k: 10,
		diversity_penalty: 0.3,
		statistical_filter: true,
		context_expansion: true,
	}
}

fn default_exhaustive_profile() -> TuningProfile {
	TuningProfile {
		fan_out_width: 150,
		rerank_depth: 100,
		multi_query_enabled: false,
		max_output_tokens: 4_096,
		top_k: 20,
		diversity_penalty: 0.0,
		statistical_filter: false,
		context_expansion: false,
	}
}
