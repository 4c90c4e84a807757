use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

use crate::cjk;

/// Splits text into lowercase lexical tokens.
///
/// Words follow Unicode word boundaries, are further split on any character that is neither
/// alphanumeric nor CJK and on every switch between CJK and non-CJK script, and only tokens longer
/// than one character are kept.
pub fn tokenize(text: &str) -> Vec<String> {
	let mut out = Vec::new();

	for word in text.unicode_words() {
		let mut current = String::new();
		let mut current_cjk = None;

		for ch in word.chars() {
			let ch_cjk = cjk::is_cjk(ch);

			if !(ch.is_alphanumeric() || ch_cjk) {
				flush_token(&mut out, &mut current);

				current_cjk = None;

				continue;
			}
			if current_cjk.is_some_and(|prev| prev != ch_cjk) {
				flush_token(&mut out, &mut current);
			}

			current.extend(ch.to_lowercase());

			current_cjk = Some(ch_cjk);
		}

		flush_token(&mut out, &mut current);
	}

	out
}

pub fn token_set(text: &str) -> HashSet<String> {
	tokenize(text).into_iter().collect()
}

/// Jaccard similarity of the token sets of two texts.
///
/// Two texts without any tokens are only similar when they are byte-equal after trimming.
pub fn jaccard_similarity(lhs: &str, rhs: &str) -> f32 {
	jaccard_of_sets(&token_set(lhs), &token_set(rhs), lhs.trim() == rhs.trim())
}

pub fn jaccard_of_sets(lhs: &HashSet<String>, rhs: &HashSet<String>, empty_equal: bool) -> f32 {
	if lhs.is_empty() && rhs.is_empty() {
		return if empty_equal { 1.0 } else { 0.0 };
	}

	let intersection = lhs.intersection(rhs).count();
	let union = lhs.len() + rhs.len() - intersection;

	intersection as f32 / union as f32
}

/// Fraction of distinct query tokens present in the document tokens, `|Q ∩ D| / |Q|`.
pub fn overlap_ratio(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f32 {
	if query_tokens.is_empty() {
		return 0.0;
	}

	let matched = query_tokens.iter().filter(|token| doc_tokens.contains(*token)).count();

	matched as f32 / query_tokens.len() as f32
}

pub fn content_hash(text: &str) -> String {
	blake3::hash(text.trim().as_bytes()).to_hex().to_string()
}

fn flush_token(out: &mut Vec<String>, current: &mut String) {
	if current.chars().count() > 1 {
		out.push(std::mem::take(current));
	} else {
		current.clear();
	}
}
