//! Exact in-memory index over a JSONL corpus.

use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
	fs,
	path::Path,
	sync::Arc,
};

use sift_domain::{Chunk, ChunkRecord, text};

use crate::{BoxFuture, Error, KeywordIndex, ParentStore, Result, VectorIndex};

struct Entry {
	chunk: Arc<Chunk>,
	embedding: Option<Vec<f32>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentIssueKind {
	Missing,
	TextNotContained,
}
impl ParentIssueKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Missing => "missing",
			Self::TextNotContained => "text_not_contained",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentIssue {
	pub chunk_id: String,
	pub parent_chunk_id: String,
	pub kind: ParentIssueKind,
}

#[derive(Default)]
pub struct MemoryStore {
	entries: Vec<Entry>,
	by_id: HashMap<String, usize>,
	postings: HashMap<String, Vec<usize>>,
	dimensions: Option<usize>,
}
impl MemoryStore {
	pub fn from_records(records: impl IntoIterator<Item = ChunkRecord>) -> Result<Self> {
		let mut store = Self::default();

		for record in records {
			store.insert(record)?;
		}

		Ok(store)
	}

	/// Loads one `ChunkRecord` per non-blank line.
	pub fn load_jsonl(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| Error::ReadCorpus { path: path.to_path_buf(), source: err })?;
		let mut store = Self::default();

		for (idx, line) in raw.lines().enumerate() {
			if line.trim().is_empty() {
				continue;
			}

			let record: ChunkRecord = serde_json::from_str(line)
				.map_err(|err| Error::ParseRecord { line: idx + 1, source: err })?;

			store.insert(record)?;
		}

		tracing::info!(
			path = %path.display(),
			chunks = store.len(),
			dimensions = ?store.dimensions,
			"Loaded corpus."
		);

		for issue in store.parent_issues() {
			tracing::warn!(
				chunk_id = %issue.chunk_id,
				parent_chunk_id = %issue.parent_chunk_id,
				kind = issue.kind.as_str(),
				"Corpus parent relation is broken."
			);
		}

		Ok(store)
	}

	/// Children whose `parent_chunk_id` is unknown, or whose parent does not contain their text.
	pub fn parent_issues(&self) -> Vec<ParentIssue> {
		let mut issues = Vec::new();

		for entry in &self.entries {
			let chunk = &entry.chunk;
			let Some(parent_id) = chunk.parent_chunk_id.as_deref() else { continue };
			let kind = match self.get(parent_id) {
				None => ParentIssueKind::Missing,
				Some(parent) if !parent.text.contains(chunk.text.trim()) =>
					ParentIssueKind::TextNotContained,
				Some(_) => continue,
			};

			issues.push(ParentIssue {
				chunk_id: chunk.id.clone(),
				parent_chunk_id: parent_id.to_string(),
				kind,
			});
		}

		issues
	}

	pub fn insert(&mut self, record: ChunkRecord) -> Result<()> {
		let ChunkRecord { chunk, embedding } = record;

		if self.by_id.contains_key(&chunk.id) {
			return Err(Error::DuplicateId(chunk.id));
		}

		if let Some(vec) = embedding.as_ref() {
			match self.dimensions {
				Some(expected) if expected != vec.len() =>
					return Err(Error::DimensionMismatch { expected, actual: vec.len() }),
				Some(_) => {},
				None => self.dimensions = Some(vec.len()),
			}
		}

		let idx = self.entries.len();

		for token in text::token_set(&chunk.text) {
			self.postings.entry(token).or_default().push(idx);
		}

		self.by_id.insert(chunk.id.clone(), idx);
		self.entries.push(Entry { chunk: Arc::new(chunk), embedding });

		Ok(())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn dimensions(&self) -> Option<usize> {
		self.dimensions
	}

	pub fn get(&self, chunk_id: &str) -> Option<Arc<Chunk>> {
		self.by_id.get(chunk_id).map(|idx| self.entries[*idx].chunk.clone())
	}

	fn nearest(&self, embedding: &[f32], k: usize) -> Result<Vec<(Arc<Chunk>, f32)>> {
		if let Some(expected) = self.dimensions
			&& expected != embedding.len()
		{
			return Err(Error::DimensionMismatch { expected, actual: embedding.len() });
		}

		let mut scored: Vec<(usize, f32)> = self
			.entries
			.iter()
			.enumerate()
			.filter_map(|(idx, entry)| {
				entry.embedding.as_deref().map(|vec| (idx, cosine_distance(embedding, vec)))
			})
			.collect();

		scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
		scored.truncate(k);

		Ok(scored.into_iter().map(|(idx, dist)| (self.entries[idx].chunk.clone(), dist)).collect())
	}

	fn keyword_hits(&self, tokens: &[String], k: usize) -> Vec<Arc<Chunk>> {
		let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
		let mut hits: HashMap<usize, usize> = HashMap::new();

		for token in distinct {
			let Some(postings) = self.postings.get(token) else { continue };

			for idx in postings {
				*hits.entry(*idx).or_default() += 1;
			}
		}

		let mut ranked: Vec<(usize, usize)> = hits.into_iter().collect();

		ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
		ranked.truncate(k);

		ranked.into_iter().map(|(idx, _)| self.entries[idx].chunk.clone()).collect()
	}
}

impl VectorIndex for MemoryStore {
	fn search<'a>(
		&'a self,
		embedding: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, Result<Vec<(Arc<Chunk>, f32)>>> {
		Box::pin(async move { self.nearest(embedding, k) })
	}
}

impl KeywordIndex for MemoryStore {
	fn lookup<'a>(
		&'a self,
		tokens: &'a [String],
		k: usize,
	) -> BoxFuture<'a, Result<Vec<Arc<Chunk>>>> {
		Box::pin(async move { Ok(self.keyword_hits(tokens, k)) })
	}
}

impl ParentStore for MemoryStore {
	fn get_parent<'a>(
		&'a self,
		parent_chunk_id: &'a str,
	) -> BoxFuture<'a, Result<Option<Arc<Chunk>>>> {
		Box::pin(async move { Ok(self.get(parent_chunk_id)) })
	}
}

/// Cosine distance in `[0, 2]`. A zero vector is treated as orthogonal to everything.
pub fn cosine_distance(lhs: &[f32], rhs: &[f32]) -> f32 {
	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (a, b) in lhs.iter().zip(rhs) {
		dot += a * b;
		lhs_norm += a * a;
		rhs_norm += b * b;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return 1.0;
	}

	(1.0 - dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(0.0, 2.0)
}
