//! Two-tier question classification.

pub mod model;
pub mod rules;
pub mod stats;

pub use model::{ModelVerdict, build_classifier_messages, parse_model_verdict};
pub use rules::RuleVerdict;
pub use stats::{ClassifierStats, ClassifierStatsSnapshot};

use serde::Serialize;

use crate::{Diagnostic, LlmProvider, SiftService, diagnostics::Backend};
use sift_config::{LlmProviderConfig, Router, TuningProfile};
use sift_domain::QuestionType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
	Rule,
	Model,
	Hybrid,
}

#[derive(Clone, Debug, Serialize)]
pub struct Classification {
	pub question_type: QuestionType,
	pub confidence: f32,
	pub method: ClassificationMethod,
	pub tuning: TuningProfile,
	pub reasoning: String,
	/// Every rule verdict, in evaluation order.
	pub rule_trace: Vec<RuleVerdict>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<ModelVerdict>,
}
impl Classification {
	pub fn is_exhaustive(&self) -> bool {
		self.question_type == QuestionType::Exhaustive
	}
}

pub struct QuestionRouter {
	cfg: Router,
}
impl QuestionRouter {
	pub fn new(cfg: &Router) -> Self {
		Self { cfg: cfg.clone() }
	}

	pub fn profile(&self, question_type: QuestionType) -> &TuningProfile {
		let profiles = &self.cfg.profiles;

		match question_type {
			QuestionType::Simple => &profiles.simple,
			QuestionType::Normal => &profiles.normal,
			QuestionType::Complex => &profiles.complex,
			QuestionType::Exhaustive => &profiles.exhaustive,
		}
	}

	/// Rule tier only. Blank input yields `normal` with zero confidence.
	pub fn classify_rules(&self, question: &str) -> Classification {
		if question.trim().is_empty() {
			return self.build(
				QuestionType::Normal,
				0.0,
				ClassificationMethod::Rule,
				"empty question",
				Vec::new(),
			);
		}

		let (winner, trace) = rules::evaluate(question);
		let verdict = &trace[winner];
		let (question_type, score) = (verdict.question_type, verdict.score);
		let reasoning = format!("{}: {}", verdict.rule, verdict.reason);

		self.build(question_type, score, ClassificationMethod::Rule, &reasoning, trace)
	}

	/// Whether a rule-tier confidence should be double-checked by the model tier.
	pub fn needs_model(&self, confidence: f32) -> bool {
		if confidence >= self.cfg.high_confidence {
			return false;
		}
		if confidence < self.cfg.low_confidence {
			return true;
		}

		self.cfg.consult_gray_zone
	}

	/// Classifies a question. Never fails: model-tier problems keep the rule-tier result.
	pub async fn classify(
		&self,
		question: &str,
		llm: Option<(&dyn LlmProvider, &LlmProviderConfig)>,
		stats: Option<&ClassifierStats>,
	) -> (Classification, Vec<Diagnostic>) {
		let mut diagnostics = Vec::new();
		let rule = self.classify_rules(question);
		let consult = !question.trim().is_empty() && self.needs_model(rule.confidence);
		let Some((provider, llm_cfg)) = llm.filter(|_| consult) else {
			if let Some(stats) = stats {
				stats.record_rule_only();
			}
			if let Some(diagnostic) = ambiguity(&rule, self.cfg.low_confidence) {
				diagnostics.push(diagnostic);
			}

			return (rule, diagnostics);
		};
		let hint = winning_verdict(&rule);
		let messages = build_classifier_messages(question, &hint);
		let verdict = match provider.complete_json(llm_cfg, &messages).await {
			Ok(value) => parse_model_verdict(&value),
			Err(err) => Err(err),
		};
		let classification = match verdict {
			Ok(verdict) => {
				let combined = self.combine(rule, verdict);

				if let Some(stats) = stats {
					stats.record_model(combined.method != ClassificationMethod::Rule, false);
				}

				combined
			},
			Err(err) => {
				if let Some(stats) = stats {
					stats.record_model(false, true);
				}

				diagnostics.push(Diagnostic::backend_unavailable(Backend::Llm, err));

				rule
			},
		};

		if let Some(diagnostic) = ambiguity(&classification, self.cfg.low_confidence) {
			diagnostics.push(diagnostic);
		}

		tracing::debug!(
			question_type = %classification.question_type,
			confidence = classification.confidence,
			method = ?classification.method,
			"Question classified."
		);

		(classification, diagnostics)
	}

	/// A decisive model verdict wins outright. In the middle range the model is preferred and the
	/// rule reasoning is kept alongside.
	fn combine(&self, rule: Classification, verdict: ModelVerdict) -> Classification {
		let high = self.cfg.high_confidence;
		let low = self.cfg.low_confidence;
		let rule_trace = rule.rule_trace.clone();

		let (question_type, confidence, method, reasoning) = if verdict.confidence > high {
			(
				verdict.question_type,
				verdict.confidence,
				ClassificationMethod::Model,
				verdict.reasoning.clone(),
			)
		} else if rule.confidence > high {
			(rule.question_type, rule.confidence, ClassificationMethod::Rule, rule.reasoning.clone())
		} else if verdict.confidence >= low {
			let reasoning = format!("{} (rule tier: {})", verdict.reasoning, rule.reasoning);

			(verdict.question_type, verdict.confidence, ClassificationMethod::Hybrid, reasoning)
		} else {
			(rule.question_type, rule.confidence, ClassificationMethod::Rule, rule.reasoning.clone())
		};
		let mut out = self.build(question_type, confidence, method, &reasoning, rule_trace);

		out.model = Some(verdict);

		out
	}

	fn build(
		&self,
		question_type: QuestionType,
		confidence: f32,
		method: ClassificationMethod,
		reasoning: &str,
		rule_trace: Vec<RuleVerdict>,
	) -> Classification {
		Classification {
			question_type,
			confidence,
			method,
			tuning: self.profile(question_type).clone(),
			reasoning: reasoning.to_string(),
			rule_trace,
			model: None,
		}
	}
}

impl SiftService {
	pub async fn classify(
		&self,
		question: &str,
		stats: Option<&ClassifierStats>,
	) -> (Classification, Vec<Diagnostic>) {
		let llm = self.cfg.providers.llm.as_ref().map(|cfg| (self.providers.llm.as_ref(), cfg));

		self.router().classify(question, llm, stats).await
	}
}

fn winning_verdict(classification: &Classification) -> RuleVerdict {
	classification
		.rule_trace
		.iter()
		.find(|verdict| {
			verdict.question_type == classification.question_type
				&& verdict.score == classification.confidence
		})
		.cloned()
		.unwrap_or(RuleVerdict {
			rule: "fallback",
			question_type: classification.question_type,
			score: classification.confidence,
			reason: classification.reasoning.clone(),
		})
}

fn ambiguity(classification: &Classification, low: f32) -> Option<Diagnostic> {
	if let Some(model) = classification.model.as_ref()
		&& let Some(note) = model.ambiguity.as_ref()
		&& classification.method != ClassificationMethod::Rule
	{
		return Some(Diagnostic::ClassificationAmbiguous { reason: note.clone() });
	}
	if classification.method == ClassificationMethod::Rule && classification.confidence < low {
		return Some(Diagnostic::ClassificationAmbiguous {
			reason: format!(
				"Rule confidence {:.2} is below {low:.2}, using the {} profile.",
				classification.confidence, classification.question_type
			),
		});
	}

	None
}
