pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Validation failed: {message}")]
	Validation { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Invariant violation: {message}")]
	InvariantViolation { message: String },
	#[error("Store unavailable: {message}")]
	StoreUnavailable { message: String },
}
impl Error {
	pub(crate) fn validation(message: impl Into<String>) -> Self {
		Self::Validation { message: message.into() }
	}
}

impl From<tally_storage::Error> for Error {
	fn from(err: tally_storage::Error) -> Self {
		match err {
			tally_storage::Error::Sqlx(inner) =>
				Self::StoreUnavailable { message: inner.to_string() },
			err @ tally_storage::Error::SequenceCollision { .. } =>
				Self::Conflict { message: err.to_string() },
			tally_storage::Error::InvalidArgument(message) => Self::Validation { message },
			tally_storage::Error::NotFound(message) => Self::NotFound { message },
			tally_storage::Error::Conflict(message) => Self::Conflict { message },
			tally_storage::Error::Invariant(message) => Self::InvariantViolation { message },
			tally_storage::Error::Decode(message) => Self::StoreUnavailable { message },
		}
	}
}
