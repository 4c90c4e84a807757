use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Broad shape of a question, used to pick a tuning profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
	Simple,
	#[default]
	Normal,
	Complex,
	Exhaustive,
}
impl QuestionType {
	pub const ALL: [Self; 4] = [Self::Simple, Self::Normal, Self::Complex, Self::Exhaustive];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Simple => "simple",
			Self::Normal => "normal",
			Self::Complex => "complex",
			Self::Exhaustive => "exhaustive",
		}
	}
}

impl fmt::Display for QuestionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for QuestionType {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"simple" => Ok(Self::Simple),
			"normal" => Ok(Self::Normal),
			"complex" => Ok(Self::Complex),
			"exhaustive" => Ok(Self::Exhaustive),
			other => Err(format!("Unknown question type {other:?}.")),
		}
	}
}
