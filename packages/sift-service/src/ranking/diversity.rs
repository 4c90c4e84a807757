use std::collections::HashMap;

use sift_domain::{Candidate, Chunk, ScoreKind, cmp_f32_desc, sort_by_score};

/// What counts as "the same source" when discouraging repeats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceKey {
	#[default]
	File,
	FilePage,
	Section,
}
impl SourceKey {
	pub fn parse(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"file_page" => Self::FilePage,
			"section" => Self::Section,
			_ => Self::File,
		}
	}

	pub fn key(self, chunk: &Chunk) -> String {
		match (self, chunk.page, chunk.section_title.as_deref()) {
			(Self::FilePage, Some(page), _) => format!("{}#p{page}", chunk.source_file),
			(Self::Section, _, Some(section)) => format!("{}#{section}", chunk.source_file),
			_ => chunk.source_file.clone(),
		}
	}
}

/// Discounts repeated sources and re-sorts.
///
/// `penalty` follows the retained-weight convention: the i-th occurrence of a source key keeps
/// `(1 - penalty)^(i - 1)` of its score. Adjustments always start from the pre-adjustment score
/// kept in `prior_score`, so re-applying with the same parameters is a no-op.
pub fn adjust<F>(candidates: Vec<Candidate>, penalty: f32, source_key: F) -> Vec<Candidate>
where
	F: Fn(&Chunk) -> String,
{
	if candidates.is_empty() || !penalty.is_finite() || penalty <= 0.0 {
		return candidates;
	}

	let retained = (1.0 - penalty).clamp(0.0, 1.0);
	let mut ordered: Vec<(f32, Candidate)> =
		candidates.into_iter().map(|candidate| (candidate.unadjusted_score(), candidate)).collect();

	ordered.sort_by(|a, b| cmp_f32_desc(a.0, b.0));

	let mut seen: HashMap<String, i32> = HashMap::new();
	let mut out = Vec::with_capacity(ordered.len());

	for (base, mut candidate) in ordered {
		let occurrence = seen.entry(source_key(&candidate.chunk)).or_default();

		*occurrence += 1;

		if *occurrence > 1 {
			candidate.score = base * retained.powi(*occurrence - 1);
			candidate.score_kind = ScoreKind::Adjusted;
			candidate.prior_score = Some(base);
		} else {
			candidate.score = base;
		}

		out.push(candidate);
	}

	sort_by_score(&mut out);

	out
}
