pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Conditions surfaced to the caller. Degraded-but-recoverable conditions are reported as
/// [`crate::Diagnostic`] values on the response instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("All backends exhausted: {message}")]
	BackendExhausted { message: String },
	#[error("Query cancelled.")]
	Cancelled,
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<sift_storage::Error> for Error {
	fn from(err: sift_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
