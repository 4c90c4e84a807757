//! Distribution-aware pruning of a ranked candidate tail.
//!
//! Both cutoffs are pure functions over a descending score list and only ever return a prefix
//! length, so the surviving candidates keep their order.

use sift_domain::{Candidate, is_ranked};

const MAD_SCALE: f32 = 1.482_6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutlierMethod {
	Mad,
	Iqr,
	ZScore,
}
impl OutlierMethod {
	/// Parses a configured method name. `off` and unknown names disable outlier removal.
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"mad" => Some(Self::Mad),
			"iqr" => Some(Self::Iqr),
			"zscore" | "z-score" | "z" => Some(Self::ZScore),
			_ => None,
		}
	}

	pub fn default_k(self) -> f32 {
		match self {
			Self::Mad => 3.0,
			Self::Iqr => 1.5,
			Self::ZScore => 2.0,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterParams {
	pub method: Option<OutlierMethod>,
	pub k: Option<f32>,
	pub gap_threshold_multiplier: f32,
	pub min_docs: usize,
}
impl FilterParams {
	pub fn from_config(cfg: &sift_config::Filter) -> Self {
		Self {
			method: OutlierMethod::parse(&cfg.method),
			k: cfg.k,
			gap_threshold_multiplier: cfg.gap_threshold_multiplier,
			min_docs: cfg.min_docs as usize,
		}
	}
}

/// Outlier removal followed by the gap cutoff.
///
/// Never returns fewer than `min(min_docs, candidates.len())` candidates.
pub fn filter(mut candidates: Vec<Candidate>, params: &FilterParams) -> Vec<Candidate> {
	debug_assert!(is_ranked(&candidates), "Filter input must be sorted by descending score.");

	let before = candidates.len();

	if let Some(method) = params.method {
		let scores: Vec<f32> = candidates.iter().map(|candidate| candidate.score).collect();
		let keep = outlier_cutoff(&scores, method, params.k, params.min_docs);

		candidates.truncate(keep);
	}

	let scores: Vec<f32> = candidates.iter().map(|candidate| candidate.score).collect();
	let keep = gap_cutoff(&scores, params.gap_threshold_multiplier, params.min_docs);

	candidates.truncate(keep);

	tracing::debug!(before, after = candidates.len(), "Statistical filter applied.");

	candidates
}

/// Length of the prefix whose scores stay within `k` deviations below the centre.
pub fn outlier_cutoff(
	scores: &[f32],
	method: OutlierMethod,
	k: Option<f32>,
	min_docs: usize,
) -> usize {
	let n = scores.len();
	let floor = min_docs.min(n);

	if n <= floor || n < 3 {
		return n;
	}

	let k = k.unwrap_or_else(|| method.default_k());
	let mut sorted = scores.to_vec();

	sorted.sort_by(f32::total_cmp);

	let threshold = match method {
		OutlierMethod::Mad => {
			let center = median(&sorted);
			let mut deviations: Vec<f32> =
				sorted.iter().map(|score| (score - center).abs()).collect();

			deviations.sort_by(f32::total_cmp);

			let mad = median(&deviations) * MAD_SCALE;

			if mad <= f32::EPSILON {
				return n;
			}

			center - k * mad
		},
		OutlierMethod::Iqr => {
			let q1 = percentile(&sorted, 0.25);
			let q3 = percentile(&sorted, 0.75);
			let iqr = q3 - q1;

			if iqr <= f32::EPSILON {
				return n;
			}

			q1 - k * iqr
		},
		OutlierMethod::ZScore => {
			let mean = sorted.iter().sum::<f32>() / n as f32;
			let variance =
				sorted.iter().map(|score| (score - mean).powi(2)).sum::<f32>() / n as f32;
			let std = variance.sqrt();

			if std <= f32::EPSILON {
				return n;
			}

			mean - k * std
		},
	};
	let cut = scores.iter().position(|score| score.is_nan() || *score < threshold).unwrap_or(n);

	cut.max(floor)
}

/// Prefix length ending at the largest score gap after the first `min_docs`, or the full length
/// when that gap is not larger than `multiplier` times the mean gap.
pub fn gap_cutoff(scores: &[f32], multiplier: f32, min_docs: usize) -> usize {
	let n = scores.len();
	let floor = min_docs.min(n);

	if n < 2 || n <= floor {
		return n;
	}

	let gaps: Vec<f32> = scores.windows(2).map(|pair| (pair[0] - pair[1]).max(0.0)).collect();
	let mean_gap = gaps.iter().sum::<f32>() / gaps.len() as f32;

	if mean_gap <= f32::EPSILON {
		return n;
	}

	let start = floor.saturating_sub(1);
	let mut best: Option<(usize, f32)> = None;

	for (idx, gap) in gaps.iter().enumerate().skip(start) {
		if best.is_none_or(|(_, current)| *gap > current) {
			best = Some((idx, *gap));
		}
	}

	match best {
		Some((idx, gap)) if gap > multiplier * mean_gap => idx + 1,
		_ => n,
	}
}

fn median(sorted: &[f32]) -> f32 {
	percentile(sorted, 0.5)
}

/// Linear-interpolated percentile of an ascending slice.
fn percentile(sorted: &[f32], q: f32) -> f32 {
	if sorted.is_empty() {
		return 0.0;
	}

	let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;
	let frac = pos - lower as f32;

	sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}
