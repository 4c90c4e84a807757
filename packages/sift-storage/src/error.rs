use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read corpus at {path:?}.")]
	ReadCorpus { path: PathBuf, source: std::io::Error },
	#[error("Invalid corpus record on line {line}: {source}")]
	ParseRecord { line: usize, source: serde_json::Error },
	#[error("Duplicate chunk id: {0}")]
	DuplicateId(String),
	#[error("Embedding dimension mismatch: expected {expected}, got {actual}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Index unavailable: {0}")]
	Unavailable(String),
}
