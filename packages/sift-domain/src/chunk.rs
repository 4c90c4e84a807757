use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::text;

/// Structural role of a chunk inside its source document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
	#[default]
	Body,
	Summary,
	Table,
	Title,
	Caption,
	List,
	Code,
	#[serde(other)]
	Other,
}
impl ChunkType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Body => "body",
			Self::Summary => "summary",
			Self::Table => "table",
			Self::Title => "title",
			Self::Caption => "caption",
			Self::List => "list",
			Self::Code => "code",
			Self::Other => "other",
		}
	}
}

impl fmt::Display for ChunkType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Immutable unit of retrievable text produced by ingestion.
///
/// `parent_chunk_id` is a relation only. The parent is resolved through a parent-chunk store and
/// never owned by the child.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
	pub id: String,
	pub text: String,
	pub source_file: String,
	#[serde(default)]
	pub page: Option<u32>,
	#[serde(default)]
	pub chunk_type: ChunkType,
	#[serde(default)]
	pub parent_chunk_id: Option<String>,
	#[serde(default = "default_type_weight")]
	pub type_weight: f32,
	#[serde(default)]
	pub section_title: Option<String>,
	#[serde(default)]
	pub heading_level: Option<u8>,
	/// Forward-compatible metadata the typed fields do not cover.
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub extra: Map<String, Value>,
}
impl Chunk {
	pub fn new(id: impl Into<String>, text: impl Into<String>, source_file: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			text: text.into(),
			source_file: source_file.into(),
			page: None,
			chunk_type: ChunkType::Body,
			parent_chunk_id: None,
			type_weight: default_type_weight(),
			section_title: None,
			heading_level: None,
			extra: Map::new(),
		}
	}

	pub fn with_page(mut self, page: u32) -> Self {
		self.page = Some(page);

		self
	}

	pub fn with_parent(mut self, parent_chunk_id: impl Into<String>) -> Self {
		self.parent_chunk_id = Some(parent_chunk_id.into());

		self
	}

	pub fn with_type(mut self, chunk_type: ChunkType, type_weight: f32) -> Self {
		self.chunk_type = chunk_type;
		self.type_weight = type_weight;

		self
	}

	pub fn content_hash(&self) -> String {
		text::content_hash(&self.text)
	}

	/// Effective multiplier, non-finite or negative weights count as neutral.
	pub fn effective_type_weight(&self) -> f32 {
		if self.type_weight.is_finite() && self.type_weight >= 0.0 { self.type_weight } else { 1.0 }
	}
}

/// One line of a corpus file: a chunk plus its precomputed embedding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
	#[serde(flatten)]
	pub chunk: Chunk,
	#[serde(default)]
	pub embedding: Option<Vec<f32>>,
}

fn default_type_weight() -> f32 {
	1.0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deserializes_minimal_record_with_defaults() {
		let raw = r#"{"id":"c1","text":"hello world","source_file":"a.pdf","embedding":[0.1,0.2]}"#;
		let record: ChunkRecord = serde_json::from_str(raw).expect("parse failed");

		assert_eq!(record.chunk.chunk_type, ChunkType::Body);
		assert_eq!(record.chunk.type_weight, 1.0);
		assert!(record.chunk.parent_chunk_id.is_none());
		assert_eq!(record.embedding.as_deref(), Some(&[0.1_f32, 0.2][..]));
	}

	#[test]
	fn unknown_chunk_type_maps_to_other() {
		let raw = r#"{"id":"c1","text":"x","source_file":"a.pdf","chunk_type":"figure"}"#;
		let record: ChunkRecord = serde_json::from_str(raw).expect("parse failed");

		assert_eq!(record.chunk.chunk_type, ChunkType::Other);
	}

	#[test]
	fn negative_type_weight_is_neutral() {
		let chunk = Chunk::new("c1", "x", "a.pdf").with_type(ChunkType::Summary, -2.0);

		assert_eq!(chunk.effective_type_weight(), 1.0);
	}
}
