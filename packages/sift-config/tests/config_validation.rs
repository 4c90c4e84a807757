use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use sift_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root
		.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut(section)
		.and_then(Value::as_table_mut)
		.expect("Template config must include the section.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("sift_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse test config.")
}

fn load_payload(payload: String) -> sift_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = sift_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

#[test]
fn sample_config_loads() {
	let cfg = load_payload(SAMPLE_CONFIG_TEMPLATE_TOML.to_string()).expect("Sample must load.");

	assert_eq!(cfg.service.max_concurrency, 4);
	assert_eq!(cfg.router.profiles.simple.fan_out_width, 30);
	assert_eq!(cfg.router.profiles.complex.fan_out_width, 80);
	assert!(cfg.router.profiles.complex.multi_query_enabled);
	assert!(cfg.providers.generator.is_none());
}

#[test]
fn missing_ranking_sections_use_defaults() {
	let minimal = r#"
[service]
log_level = "debug"

[storage]
corpus_path = "corpus.jsonl"

[providers.embedding]
provider_id = "local"
api_base    = "http://127.0.0.1:8080"
api_key     = "k"
path        = "/v1/embeddings"
model       = "m"
dimensions  = 8
timeout_ms  = 500
"#;
	let cfg = load_payload(minimal.to_string()).expect("Minimal config must load.");

	assert_eq!(cfg.retrieval.vector_weight, 0.6);
	assert_eq!(cfg.retrieval.lexical_weight, 0.4);
	assert_eq!(cfg.filter.method, "mad");
	assert_eq!(cfg.filter.min_docs, 3);
	assert_eq!(cfg.expansion.partial_context_chars, 300);
	assert_eq!(cfg.aggregation.strategy, "weighted");
	assert_eq!(cfg.storage.parent_cache_capacity, 1_024);
	assert!(cfg.providers.rerank.is_none());
	assert!(cfg.providers.llm.is_none());
}

#[test]
fn retrieval_weights_must_sum_to_one() {
	let payload = sample_toml_with("retrieval", "vector_weight", Value::Float(0.7));
	let err = load_payload(payload).expect_err("Expected weight validation error.");

	assert!(
		err.to_string()
			.contains("retrieval.vector_weight and retrieval.lexical_weight must sum to 1.0."),
		"Unexpected error: {err}"
	);
}

#[test]
fn filter_method_is_normalized_and_checked() {
	let payload = sample_toml_with("filter", "method", Value::String(" IQR ".to_string()));
	let cfg = load_payload(payload).expect("Upper-case method must normalize.");

	assert_eq!(cfg.filter.method, "iqr");

	let payload = sample_toml_with("filter", "method", Value::String("percentile".to_string()));
	let err = load_payload(payload).expect_err("Expected filter method validation error.");

	assert!(
		err.to_string().contains("filter.method must be one of mad, iqr, zscore, or off."),
		"Unexpected error: {err}"
	);
}

#[test]
fn aggregation_strategy_must_be_known() {
	let mut cfg = base_config();

	cfg.aggregation.strategy = "median".to_string();

	let err = sift_config::validate(&cfg).expect_err("Expected strategy validation error.");

	assert!(
		err.to_string().contains("aggregation.strategy must be one of max, mean, weighted, or count."),
		"Unexpected error: {err}"
	);
}

#[test]
fn rerank_depth_must_fit_fan_out() {
	let mut cfg = base_config();

	cfg.router.profiles.simple.rerank_depth = cfg.router.profiles.simple.fan_out_width + 1;

	let err = sift_config::validate(&cfg).expect_err("Expected rerank depth validation error.");

	assert!(
		err.to_string()
			.contains("router.profiles.simple.rerank_depth must be between 1 and fan_out_width."),
		"Unexpected error: {err}"
	);
}

#[test]
fn diversity_penalty_must_leave_some_weight() {
	let mut cfg = base_config();

	cfg.router.profiles.normal.diversity_penalty = 1.0;

	assert!(sift_config::validate(&cfg).is_err());
}

#[test]
fn router_thresholds_must_be_ordered() {
	let mut cfg = base_config();

	cfg.router.low_confidence = 0.9;
	cfg.router.high_confidence = 0.8;

	let err = sift_config::validate(&cfg).expect_err("Expected threshold validation error.");

	assert!(
		err.to_string().contains("router.low_confidence must not exceed router.high_confidence."),
		"Unexpected error: {err}"
	);
}

#[test]
fn provider_keys_must_be_non_empty() {
	let mut cfg = base_config();

	if let Some(rerank) = cfg.providers.rerank.as_mut() {
		rerank.api_key = "  ".to_string();
	}

	let err = sift_config::validate(&cfg).expect_err("Expected api key validation error.");

	assert!(
		err.to_string().contains("Provider rerank api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn unreadable_path_reports_read_error() {
	let err = sift_config::load(std::path::Path::new("/nonexistent/sift.toml"))
		.expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
