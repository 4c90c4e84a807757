//! Rule tier of the question router.
//!
//! Each rule evaluates the question independently and reports a verdict. A fixed reducer picks
//! the first rule, in priority order, whose score reaches its acceptance bar.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use sift_domain::QuestionType;

const EXHAUSTIVE_KO: [&str; 5] = ["모든", "전부", "전체", "목록", "리스트"];
const COMPARISON_KO: [&str; 5] = ["차이", "비교", "장단점", "대비", "다른 점"];
const CAUSAL_KO: [&str; 4] = ["왜", "이유", "원인", "영향"];
const RELATION_KO: [&str; 3] = ["관계", "상관", "연관"];

const COMPARISON_WEIGHT: f32 = 0.4;
const CAUSAL_WEIGHT: f32 = 0.3;
const RELATION_WEIGHT: f32 = 0.3;
const MULTI_ITEM_WEIGHT: f32 = 0.3;
const LONG_QUESTION_WEIGHT: f32 = 0.2;
const MULTI_QUESTION_WEIGHT: f32 = 0.2;
const LONG_QUESTION_CHARS: usize = 50;

const SHORT_WEIGHT: f32 = 0.3;
const VALUE_WEIGHT: f32 = 0.4;
const TECH_TERM_WEIGHT: f32 = 0.3;
const SHORT_QUESTION_CHARS: usize = 20;

const EXHAUSTIVE_BASE: f32 = 0.85;
const EXHAUSTIVE_STEP: f32 = 0.05;
const DEFINITION_CONFIDENCE: f32 = 0.8;
const FALLBACK_CONFIDENCE: f32 = 0.4;

static EXHAUSTIVE_EN: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"(?i)\b(all|every|list|enumerate)\b").ok());
static COMPARISON_EN: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"(?i)\b(compare|compared|comparison|versus|vs|difference|differences|differ|pros and cons|trade-?offs?)\b",
	)
	.ok()
});
static CAUSAL_EN: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(why|cause|causes|caused|because|effect|effects|impact)\b").ok()
});
static RELATION_EN: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(relationship|relation|correlation|correlated|related)\b").ok()
});
static MULTI_ITEM_KO: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+(?:와|과|랑|하고)\s+[\p{L}\p{N}]+").ok());
static MULTI_ITEM_EN: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"(?i)\b[\p{L}\p{N}]+\s+and\s+[\p{L}\p{N}]+\b").ok());
static DEFINITION_EN: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"(?i)^\s*(?:what\s+(?:is|are)\s+(?:an?\s+|the\s+)?[\p{L}\p{N}-]+|define\s+[\p{L}\p{N}-]+|what\s+does\s+[\p{L}\p{N}-]+\s+mean)\s*\??\s*$",
	)
	.ok()
});
static DEFINITION_KO: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"(?:(?:이란|란)\s*(?:무엇|뭐|\?|$)|(?:은|는|이|가)\s*(?:무엇|뭐)|의\s*정의)").ok()
});
static VALUE: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"(?i)(?:값은|값이|값을|수치|얼마|몇|\bvalue\s+of\b|\bhow\s+(?:many|much)\b)").ok()
});
static TECH_TERM: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9-]*[A-Za-z0-9]").ok());

/// One rule's contribution, kept on the classification for audit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RuleVerdict {
	pub rule: &'static str,
	pub question_type: QuestionType,
	pub score: f32,
	pub reason: String,
}

pub(crate) struct Features<'a> {
	text: &'a str,
	char_len: usize,
	question_marks: usize,
	has_comparison: bool,
}
impl<'a> Features<'a> {
	pub(crate) fn new(question: &'a str) -> Self {
		let text = question.trim();

		Self {
			text,
			char_len: text.chars().count(),
			question_marks: text.chars().filter(|ch| matches!(ch, '?' | '？')).count(),
			has_comparison: is_match(&COMPARISON_EN, text) || contains_any(text, &COMPARISON_KO),
		}
	}
}

pub(crate) struct Rule {
	pub(crate) name: &'static str,
	/// Minimum score at which the reducer accepts this rule's verdict.
	pub(crate) accept_at: f32,
	pub(crate) evaluate: fn(&Features<'_>) -> RuleVerdict,
}

/// Rules in priority order. The fallback always accepts.
pub(crate) const RULES: [Rule; 5] = [
	Rule { name: "exhaustive", accept_at: EXHAUSTIVE_BASE, evaluate: exhaustive },
	Rule { name: "complex", accept_at: 0.5, evaluate: complex },
	Rule { name: "definition", accept_at: DEFINITION_CONFIDENCE, evaluate: definition },
	Rule { name: "simple", accept_at: 0.5, evaluate: simple },
	Rule { name: "fallback", accept_at: 0.0, evaluate: fallback },
];

/// Evaluates every rule and returns the index of the winning verdict with the full trace.
pub(crate) fn evaluate(question: &str) -> (usize, Vec<RuleVerdict>) {
	let features = Features::new(question);
	let trace: Vec<RuleVerdict> = RULES.iter().map(|rule| (rule.evaluate)(&features)).collect();
	let winner = RULES
		.iter()
		.zip(&trace)
		.position(|(rule, verdict)| verdict.score > 0.0 && verdict.score >= rule.accept_at)
		.unwrap_or(RULES.len() - 1);

	(winner, trace)
}

fn exhaustive(features: &Features<'_>) -> RuleVerdict {
	let mut hits: Vec<String> = EXHAUSTIVE_KO
		.iter()
		.filter(|term| features.text.contains(**term))
		.map(|term| term.to_string())
		.collect();

	if let Some(re) = EXHAUSTIVE_EN.as_ref() {
		for found in re.find_iter(features.text) {
			let term = found.as_str().to_lowercase();

			if !hits.contains(&term) {
				hits.push(term);
			}
		}
	}

	let score = if hits.is_empty() {
		0.0
	} else {
		(EXHAUSTIVE_BASE + EXHAUSTIVE_STEP * (hits.len() - 1) as f32).min(1.0)
	};

	verdict("exhaustive", QuestionType::Exhaustive, score, &hits)
}

fn complex(features: &Features<'_>) -> RuleVerdict {
	let text = features.text;
	let mut score = 0.0_f32;
	let mut reasons = Vec::new();

	if features.has_comparison {
		score += COMPARISON_WEIGHT;

		reasons.push("comparison vocabulary".to_string());
	}
	if is_match(&CAUSAL_EN, text) || contains_any(text, &CAUSAL_KO) {
		score += CAUSAL_WEIGHT;

		reasons.push("causal vocabulary".to_string());
	}
	if is_match(&RELATION_EN, text) || contains_any(text, &RELATION_KO) {
		score += RELATION_WEIGHT;

		reasons.push("relationship vocabulary".to_string());
	}
	if is_match(&MULTI_ITEM_KO, text) || is_match(&MULTI_ITEM_EN, text) {
		score += MULTI_ITEM_WEIGHT;

		reasons.push("multi-item pattern".to_string());
	}
	if features.char_len > LONG_QUESTION_CHARS {
		score += LONG_QUESTION_WEIGHT;

		reasons.push(format!("long question ({} chars)", features.char_len));
	}
	if features.question_marks >= 2 {
		score += MULTI_QUESTION_WEIGHT;

		reasons.push(format!("{} question marks", features.question_marks));
	}

	verdict("complex", QuestionType::Complex, score.min(1.0), &reasons)
}

fn definition(features: &Features<'_>) -> RuleVerdict {
	let matched = !features.has_comparison
		&& (is_match(&DEFINITION_EN, features.text) || is_match(&DEFINITION_KO, features.text));
	let (score, reasons) = if matched {
		(DEFINITION_CONFIDENCE, vec!["definition pattern".to_string()])
	} else {
		(0.0, Vec::new())
	};

	verdict("definition", QuestionType::Normal, score, &reasons)
}

fn simple(features: &Features<'_>) -> RuleVerdict {
	let mut score = 0.0_f32;
	let mut reasons = Vec::new();

	if features.char_len < SHORT_QUESTION_CHARS {
		score += SHORT_WEIGHT;

		reasons.push(format!("short question ({} chars)", features.char_len));
	}
	if is_match(&VALUE, features.text) {
		score += VALUE_WEIGHT;

		reasons.push("value lookup pattern".to_string());
	}
	if !features.has_comparison
		&& let Some(term) = technical_term(features.text)
	{
		score += TECH_TERM_WEIGHT;

		reasons.push(format!("technical term {term}"));
	}

	verdict("simple", QuestionType::Simple, score.min(1.0), &reasons)
}

fn fallback(_features: &Features<'_>) -> RuleVerdict {
	verdict("fallback", QuestionType::Normal, FALLBACK_CONFIDENCE, &["no strong signal".to_string()])
}

fn verdict(
	rule: &'static str,
	question_type: QuestionType,
	score: f32,
	reasons: &[String],
) -> RuleVerdict {
	RuleVerdict { rule, question_type, score, reason: reasons.join("; ") }
}

/// First acronym-like or mixed-case token such as `OLED`, `kFRET` or `CO2`.
fn technical_term(text: &str) -> Option<&str> {
	let re = TECH_TERM.as_ref()?;

	re.find_iter(text).map(|found| found.as_str()).find(|term| {
		let upper = term.chars().filter(char::is_ascii_uppercase).count();
		let inner_upper = term.chars().skip(1).any(|ch| ch.is_ascii_uppercase());
		let has_digit = term.chars().any(|ch| ch.is_ascii_digit());

		upper >= 2 || inner_upper || has_digit
	})
}

fn is_match(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
	re.as_ref().is_some_and(|re| re.is_match(text))
}

fn contains_any(text: &str, terms: &[&str]) -> bool {
	terms.iter().any(|term| text.contains(term))
}
