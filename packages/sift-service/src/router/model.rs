use color_eyre::{Result, eyre};
use serde::Serialize;
use serde_json::Value;

use crate::router::RuleVerdict;
use sift_domain::QuestionType;

/// The model tier's structured answer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelVerdict {
	pub question_type: QuestionType,
	pub confidence: f32,
	pub reasoning: String,
	pub ambiguity: Option<String>,
	pub multi_query_helpful: bool,
}

pub fn build_classifier_messages(question: &str, hint: &RuleVerdict) -> Vec<Value> {
	let schema = serde_json::json!({
		"type": "simple|normal|complex|exhaustive",
		"confidence": 0.0,
		"reasoning": "string",
		"ambiguity": "string|null",
		"multi_query_helpful": false
	});
	let schema_text = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string());
	let system_prompt = "You classify questions for a document retrieval system. \
Output must be valid JSON only and must match the provided schema exactly. \
simple: a single fact or value lookup. normal: a focused explanation or definition. \
complex: comparison, causality, relationships, or several sub-questions. \
exhaustive: the user wants every matching document or a complete list. \
confidence is a number between 0 and 1. Do not add explanations outside the JSON.";
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema_text}\nRule-based guess: {kind} (score {score:.2}, {reason})\nQuestion:\n{question}",
		kind = hint.question_type,
		score = hint.score,
		reason = if hint.reason.is_empty() { "no signals" } else { hint.reason.as_str() },
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

pub fn parse_model_verdict(value: &Value) -> Result<ModelVerdict> {
	let question_type = value
		.get("type")
		.and_then(Value::as_str)
		.ok_or_else(|| eyre::eyre!("Classifier reply is missing type."))?
		.parse::<QuestionType>()
		.map_err(|err| eyre::eyre!(err))?;
	let confidence = value
		.get("confidence")
		.and_then(Value::as_f64)
		.ok_or_else(|| eyre::eyre!("Classifier reply is missing confidence."))?;

	if !confidence.is_finite() {
		return Err(eyre::eyre!("Classifier confidence must be finite."));
	}

	let reasoning =
		value.get("reasoning").and_then(Value::as_str).unwrap_or_default().trim().to_string();
	let ambiguity = value
		.get("ambiguity")
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.map(str::to_string);
	let multi_query_helpful =
		value.get("multi_query_helpful").and_then(Value::as_bool).unwrap_or(false);

	Ok(ModelVerdict {
		question_type,
		confidence: (confidence as f32).clamp(0.0, 1.0),
		reasoning,
		ambiguity,
		multi_query_helpful,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_full_reply() {
		let verdict = parse_model_verdict(&serde_json::json!({
			"type": "Complex",
			"confidence": 1.4,
			"reasoning": " compares two panels ",
			"ambiguity": "",
			"multi_query_helpful": true
		}))
		.expect("parse failed");

		assert_eq!(verdict.question_type, QuestionType::Complex);
		assert_eq!(verdict.confidence, 1.0);
		assert_eq!(verdict.reasoning, "compares two panels");
		assert!(verdict.ambiguity.is_none());
		assert!(verdict.multi_query_helpful);
	}

	#[test]
	fn rejects_unknown_type() {
		let err = parse_model_verdict(&serde_json::json!({ "type": "broad", "confidence": 0.9 }))
			.expect_err("expected error");

		assert!(err.to_string().contains("Unknown question type"));
	}

	#[test]
	fn rejects_missing_confidence() {
		assert!(parse_model_verdict(&serde_json::json!({ "type": "simple" })).is_err());
	}

	#[test]
	fn prompt_carries_rule_hint() {
		let hint = RuleVerdict {
			rule: "complex",
			question_type: QuestionType::Complex,
			score: 0.6,
			reason: "comparison vocabulary".to_string(),
		};
		let messages = build_classifier_messages("OLED vs QLED", &hint);
		let user = messages[1]["content"].as_str().expect("missing content");

		assert!(user.contains("Rule-based guess: complex (score 0.60, comparison vocabulary)"));
		assert!(user.ends_with("OLED vs QLED"));
	}
}
