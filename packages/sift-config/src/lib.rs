mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Aggregation, Config, Diversity, EmbeddingProviderConfig, Expansion, Filter,
	LlmProviderConfig, MultiQuery, ProviderConfig, Providers, Retrieval, Router, RouterProfiles,
	Service, Storage, TuningProfile,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if !(1..=16).contains(&cfg.service.max_concurrency) {
		return Err(Error::Validation {
			message: "service.max_concurrency must be in the range 1-16.".to_string(),
		});
	}
	if cfg.storage.corpus_path.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "storage.corpus_path must be non-empty.".to_string(),
		});
	}
	if cfg.storage.parent_cache_capacity == 0 {
		return Err(Error::Validation {
			message: "storage.parent_cache_capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	validate_provider_keys(cfg)?;
	validate_router(cfg)?;
	validate_retrieval(cfg)?;

	if cfg.multi_query.max_queries == 0 {
		return Err(Error::Validation {
			message: "multi_query.max_queries must be greater than zero.".to_string(),
		});
	}

	validate_filter(cfg)?;

	if !matches!(cfg.diversity.source_key.as_str(), "file" | "file_page" | "section") {
		return Err(Error::Validation {
			message: "diversity.source_key must be one of file, file_page, or section.".to_string(),
		});
	}

	validate_expansion(cfg)?;

	if cfg.aggregation.top_n == 0 {
		return Err(Error::Validation {
			message: "aggregation.top_n must be greater than zero.".to_string(),
		});
	}
	if cfg.aggregation.min_chunks == 0 {
		return Err(Error::Validation {
			message: "aggregation.min_chunks must be greater than zero.".to_string(),
		});
	}
	if !matches!(cfg.aggregation.strategy.as_str(), "max" | "mean" | "weighted" | "count") {
		return Err(Error::Validation {
			message: "aggregation.strategy must be one of max, mean, weighted, or count."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_provider_keys(cfg: &Config) -> Result<()> {
	let mut keys = vec![("embedding", cfg.providers.embedding.api_key.as_str())];

	if let Some(rerank) = cfg.providers.rerank.as_ref() {
		keys.push(("rerank", rerank.api_key.as_str()));
	}
	if let Some(llm) = cfg.providers.llm.as_ref() {
		keys.push(("llm", llm.api_key.as_str()));
	}
	if let Some(generator) = cfg.providers.generator.as_ref() {
		keys.push(("generator", generator.api_key.as_str()));
	}

	for (label, key) in keys {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn validate_router(cfg: &Config) -> Result<()> {
	let router = &cfg.router;

	for (label, value) in
		[("router.high_confidence", router.high_confidence), ("router.low_confidence", router.low_confidence)]
	{
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if router.low_confidence > router.high_confidence {
		return Err(Error::Validation {
			message: "router.low_confidence must not exceed router.high_confidence.".to_string(),
		});
	}

	for (label, profile) in [
		("simple", &router.profiles.simple),
		("normal", &router.profiles.normal),
		("complex", &router.profiles.complex),
		("exhaustive", &router.profiles.exhaustive),
	] {
		if profile.fan_out_width == 0 {
			return Err(Error::Validation {
				message: format!("router.profiles.{label}.fan_out_width must be greater than zero."),
			});
		}
		if profile.rerank_depth == 0 || profile.rerank_depth > profile.fan_out_width {
			return Err(Error::Validation {
				message: format!(
					"router.profiles.{label}.rerank_depth must be between 1 and fan_out_width."
				),
			});
		}
		if profile.top_k == 0 {
			return Err(Error::Validation {
				message: format!("router.profiles.{label}.top_k must be greater than zero."),
			});
		}
		if !profile.diversity_penalty.is_finite()
			|| !(0.0..1.0).contains(&profile.diversity_penalty)
		{
			return Err(Error::Validation {
				message: format!(
					"router.profiles.{label}.diversity_penalty must be in the range 0.0-1.0 (exclusive)."
				),
			});
		}
	}

	Ok(())
}

fn validate_retrieval(cfg: &Config) -> Result<()> {
	let retrieval = &cfg.retrieval;

	for (label, value) in [
		("retrieval.vector_weight", retrieval.vector_weight),
		("retrieval.lexical_weight", retrieval.lexical_weight),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if ((retrieval.vector_weight + retrieval.lexical_weight) - 1.0).abs() > 1e-4 {
		return Err(Error::Validation {
			message: "retrieval.vector_weight and retrieval.lexical_weight must sum to 1.0."
				.to_string(),
		});
	}
	if !retrieval.reference_range.is_finite() || retrieval.reference_range <= 0.0 {
		return Err(Error::Validation {
			message: "retrieval.reference_range must be a positive finite number.".to_string(),
		});
	}

	Ok(())
}

fn validate_filter(cfg: &Config) -> Result<()> {
	let filter = &cfg.filter;

	if !matches!(filter.method.as_str(), "mad" | "iqr" | "zscore" | "off") {
		return Err(Error::Validation {
			message: "filter.method must be one of mad, iqr, zscore, or off.".to_string(),
		});
	}

	if let Some(k) = filter.k
		&& (!k.is_finite() || k <= 0.0)
	{
		return Err(Error::Validation {
			message: "filter.k must be a positive finite number.".to_string(),
		});
	}

	if !filter.gap_threshold_multiplier.is_finite() || filter.gap_threshold_multiplier < 1.0 {
		return Err(Error::Validation {
			message: "filter.gap_threshold_multiplier must be 1.0 or greater.".to_string(),
		});
	}
	if filter.min_docs == 0 {
		return Err(Error::Validation {
			message: "filter.min_docs must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_expansion(cfg: &Config) -> Result<()> {
	let expansion = &cfg.expansion;

	if expansion.partial_context_chars == 0 {
		return Err(Error::Validation {
			message: "expansion.partial_context_chars must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("expansion.partial_score_discount", expansion.partial_score_discount),
		("expansion.near_duplicate_threshold", expansion.near_duplicate_threshold),
		("expansion.dedup_threshold", expansion.dedup_threshold),
	] {
		if !value.is_finite() || value <= 0.0 || value > 1.0 {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0 (exclusive of zero)."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.filter.method = cfg.filter.method.trim().to_ascii_lowercase();
	cfg.diversity.source_key = cfg.diversity.source_key.trim().to_ascii_lowercase();
	cfg.aggregation.strategy = cfg.aggregation.strategy.trim().to_ascii_lowercase();
}
