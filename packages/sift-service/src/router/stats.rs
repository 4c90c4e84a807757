use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Rule-versus-model usage counters owned by the caller.
///
/// The router only touches an instance that is passed in explicitly. Its lifetime, and when to
/// call [`ClassifierStats::reset`], is up to the owner.
#[derive(Debug, Default)]
pub struct ClassifierStats {
	total: AtomicU64,
	rule_only: AtomicU64,
	model_invoked: AtomicU64,
	model_adopted: AtomicU64,
	model_failed: AtomicU64,
}
impl ClassifierStats {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn snapshot(&self) -> ClassifierStatsSnapshot {
		ClassifierStatsSnapshot {
			total: self.total.load(Ordering::Relaxed),
			rule_only: self.rule_only.load(Ordering::Relaxed),
			model_invoked: self.model_invoked.load(Ordering::Relaxed),
			model_adopted: self.model_adopted.load(Ordering::Relaxed),
			model_failed: self.model_failed.load(Ordering::Relaxed),
		}
	}

	/// Share of classifications that consulted the model tier.
	pub fn model_usage_ratio(&self) -> f64 {
		self.snapshot().model_usage_ratio()
	}

	pub fn reset(&self) {
		for counter in
			[&self.total, &self.rule_only, &self.model_invoked, &self.model_adopted, &self.model_failed]
		{
			counter.store(0, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_rule_only(&self) {
		self.total.fetch_add(1, Ordering::Relaxed);
		self.rule_only.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_model(&self, adopted: bool, failed: bool) {
		self.total.fetch_add(1, Ordering::Relaxed);
		self.model_invoked.fetch_add(1, Ordering::Relaxed);

		if adopted {
			self.model_adopted.fetch_add(1, Ordering::Relaxed);
		}
		if failed {
			self.model_failed.fetch_add(1, Ordering::Relaxed);
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClassifierStatsSnapshot {
	pub total: u64,
	pub rule_only: u64,
	pub model_invoked: u64,
	pub model_adopted: u64,
	pub model_failed: u64,
}
impl ClassifierStatsSnapshot {
	pub fn model_usage_ratio(&self) -> f64 {
		if self.total == 0 {
			return 0.0;
		}

		self.model_invoked as f64 / self.total as f64
	}
}
