use std::path::{Path, PathBuf};

use sift_domain::{Chunk, ChunkRecord};
use sift_storage::{
	Error, KeywordIndex, MemoryStore, ParentIssue, ParentIssueKind, ParentStore, VectorIndex,
};

fn fixture() -> PathBuf {
	Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/corpus.jsonl")
}

fn record(id: &str, embedding: Option<Vec<f32>>) -> ChunkRecord {
	ChunkRecord { chunk: Chunk::new(id, format!("text of {id}"), "a.pdf"), embedding }
}

#[tokio::test]
async fn loads_jsonl_and_skips_blank_lines() {
	let store = MemoryStore::load_jsonl(&fixture()).expect("Failed to load corpus.");

	assert_eq!(store.len(), 4);
	assert_eq!(store.dimensions(), Some(3));

	let summary = store.get("c2").expect("Missing chunk.");

	assert_eq!(summary.type_weight, 1.2);
	assert_eq!(summary.page, Some(3));
}

#[tokio::test]
async fn search_orders_by_cosine_distance() {
	let store = MemoryStore::load_jsonl(&fixture()).expect("Failed to load corpus.");
	let hits = store.search(&[1.0, 0.0, 0.0], 2).await.expect("Search failed.");
	let ids: Vec<&str> = hits.iter().map(|(chunk, _)| chunk.id.as_str()).collect();

	assert_eq!(ids, vec!["p1", "c1"]);
	assert!(hits[0].1 <= hits[1].1);
}

#[tokio::test]
async fn search_rejects_wrong_dimensions() {
	let store = MemoryStore::load_jsonl(&fixture()).expect("Failed to load corpus.");
	let err = store.search(&[1.0, 0.0], 2).await.expect_err("Expected dimension error.");

	assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
}

#[tokio::test]
async fn keyword_lookup_ranks_by_distinct_matches() {
	let store = MemoryStore::load_jsonl(&fixture()).expect("Failed to load corpus.");
	let tokens = vec!["oled".to_string(), "lifetime".to_string(), "drive".to_string()];
	let hits = store.lookup(&tokens, 10).await.expect("Lookup failed.");
	let ids: Vec<&str> = hits.iter().map(|chunk| chunk.id.as_str()).collect();

	assert_eq!(ids, vec!["p1", "c1"]);
}

#[tokio::test]
async fn parent_lookup_returns_none_for_unknown_ids() {
	let store = MemoryStore::load_jsonl(&fixture()).expect("Failed to load corpus.");

	assert!(store.get_parent("p1").await.expect("Lookup failed.").is_some());
	assert!(store.get_parent("missing").await.expect("Lookup failed.").is_none());
}

#[test]
fn duplicate_ids_are_rejected() {
	let err = MemoryStore::from_records([record("a", None), record("a", None)])
		.err()
		.expect("Expected duplicate error.");

	assert_eq!(err.to_string(), "Duplicate chunk id: a");
}

#[test]
fn mixed_dimensions_are_rejected() {
	let err = MemoryStore::from_records([
		record("a", Some(vec![1.0, 0.0])),
		record("b", Some(vec![1.0, 0.0, 0.0])),
	])
	.err()
	.expect("Expected dimension error.");

	assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
}

#[test]
fn malformed_lines_report_line_numbers() {
	let path = std::env::temp_dir().join(format!("sift_corpus_{}.jsonl", std::process::id()));

	std::fs::write(&path, "{\"id\":\"a\",\"text\":\"x\",\"source_file\":\"a.pdf\"}\nnot json\n")
		.expect("Failed to write corpus.");

	let err = MemoryStore::load_jsonl(&path).err().expect("Expected parse error.");

	std::fs::remove_file(&path).ok();

	assert!(matches!(err, Error::ParseRecord { line: 2, .. }));
}

#[test]
fn fixture_parents_are_consistent() {
	let store = MemoryStore::load_jsonl(&fixture()).expect("Failed to load corpus.");

	assert!(store.parent_issues().is_empty());
}

#[test]
fn broken_parent_relations_are_reported() {
	let parent = Chunk::new("p", "Quantum dots shift the emission peak.", "a.pdf");
	let orphan = Chunk::new("orphan", "Blue emitters age first.", "a.pdf").with_parent("gone");
	let stray = Chunk::new("stray", "Drive current sets lifetime.", "a.pdf").with_parent("p");
	let nested = Chunk::new("nested", "shift the emission peak", "a.pdf").with_parent("p");
	let store = MemoryStore::from_records(
		[parent, orphan, stray, nested].map(|chunk| ChunkRecord { chunk, embedding: None }),
	)
	.expect("Failed to build store.");

	assert_eq!(
		store.parent_issues(),
		vec![
			ParentIssue {
				chunk_id: "orphan".into(),
				parent_chunk_id: "gone".into(),
				kind: ParentIssueKind::Missing,
			},
			ParentIssue {
				chunk_id: "stray".into(),
				parent_chunk_id: "p".into(),
				kind: ParentIssueKind::TextNotContained,
			},
		]
	);
}
