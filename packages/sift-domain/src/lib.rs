pub mod aggregate;
pub mod candidate;
pub mod chunk;
pub mod cjk;
pub mod question;
pub mod text;

pub use aggregate::FileAggregate;
pub use candidate::{
	Candidate, ScoreKind, clip_score, cmp_f32_desc, dedup_by_content, is_ranked,
	min_max_normalize, sort_by_score,
};
pub use chunk::{Chunk, ChunkRecord, ChunkType};
pub use question::QuestionType;
