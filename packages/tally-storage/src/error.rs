#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	/// Another writer committed a live record with this number first.
	#[error("Sequence number {sequence_number} was taken by a concurrent writer.")]
	SequenceCollision { sequence_number: i64 },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Invariant violation: {0}")]
	Invariant(String),
	#[error("Corrupt row: {0}")]
	Decode(String),
}
