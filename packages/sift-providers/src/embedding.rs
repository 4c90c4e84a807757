use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Embeds query texts, one vector per input in input order.
///
/// Every vector must carry exactly `cfg.dimensions` finite values, otherwise the whole batch fails.
pub async fn embed(
	cfg: &sift_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let json: Value = client
		.post(format!("{}{}", cfg.api_base, cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?
		.json()
		.await?;

	query_vectors(&json, texts.len(), cfg.dimensions as usize)
}

/// Places each returned item at its `index` slot and checks its shape.
fn query_vectors(json: &Value, inputs: usize, dimensions: usize) -> Result<Vec<Vec<f32>>> {
	let Some(items) = json.get("data").and_then(Value::as_array) else {
		return Err(eyre::eyre!("Embedding response is missing data array."));
	};
	let mut slots: Vec<Option<Vec<f32>>> = vec![None; inputs];

	for (position, item) in items.iter().enumerate() {
		let index =
			item.get("index").and_then(Value::as_u64).map_or(position, |index| index as usize);
		let Some(slot) = slots.get_mut(index) else {
			return Err(eyre::eyre!("Embedding index {index} is out of range for {inputs} inputs."));
		};

		if slot.is_some() {
			return Err(eyre::eyre!("Embedding index {index} was returned twice."));
		}

		*slot = Some(vector(item, index, dimensions)?);
	}

	slots
		.into_iter()
		.enumerate()
		.map(|(index, slot)| {
			slot.ok_or_else(|| eyre::eyre!("Embedding provider returned no vector for input {index}."))
		})
		.collect()
}

fn vector(item: &Value, index: usize, dimensions: usize) -> Result<Vec<f32>> {
	let Some(values) = item.get("embedding").and_then(Value::as_array) else {
		return Err(eyre::eyre!("Embedding item {index} is missing its embedding array."));
	};

	if values.len() != dimensions {
		return Err(eyre::eyre!(
			"Embedding {index} has {} dimensions, expected {dimensions}.",
			values.len()
		));
	}

	values
		.iter()
		.map(|value| match value.as_f64().map(|number| number as f32) {
			Some(number) if number.is_finite() => Ok(number),
			_ => Err(eyre::eyre!("Embedding {index} holds a non-finite or non-numeric value.")),
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn places_vectors_by_index() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let vectors = query_vectors(&json, 2, 2).expect("Vectors should parse.");

		assert_eq!(vectors, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn rejects_vectors_of_the_wrong_dimension() {
		let json = serde_json::json!({ "data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3] }] });
		let err = query_vectors(&json, 1, 2).expect_err("Expected dimension error.");

		assert!(err.to_string().contains("3 dimensions, expected 2"));
	}

	#[test]
	fn rejects_values_outside_f32_range() {
		let json = serde_json::json!({ "data": [{ "embedding": [1e39, 0.0] }] });

		assert!(query_vectors(&json, 1, 2).is_err());
	}

	#[test]
	fn rejects_missing_and_repeated_indices() {
		let short = serde_json::json!({ "data": [{ "index": 0, "embedding": [1.0] }] });
		let repeated = serde_json::json!({
			"data": [{ "index": 0, "embedding": [1.0] }, { "index": 0, "embedding": [2.0] }]
		});

		assert!(query_vectors(&short, 2, 1).is_err());
		assert!(query_vectors(&repeated, 2, 1).is_err());
	}
}
