pub mod memory;

mod error;

pub use error::Error;
pub use memory::{MemoryStore, ParentIssue, ParentIssueKind};

use std::{future::Future, pin::Pin, sync::Arc};

use sift_domain::Chunk;

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Dense nearest-neighbour lookup. Returned distances grow with dissimilarity.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		embedding: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, Result<Vec<(Arc<Chunk>, f32)>>>;
}

/// Keyword-indexed lookup backing the lexical-only retrieval path.
pub trait KeywordIndex
where
	Self: Send + Sync,
{
	fn lookup<'a>(&'a self, tokens: &'a [String], k: usize)
	-> BoxFuture<'a, Result<Vec<Arc<Chunk>>>>;
}

pub trait ParentStore
where
	Self: Send + Sync,
{
	fn get_parent<'a>(&'a self, parent_chunk_id: &'a str) -> BoxFuture<'a, Result<Option<Arc<Chunk>>>>;
}
