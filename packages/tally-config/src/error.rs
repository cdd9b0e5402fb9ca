use std::{io, path::PathBuf};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Cannot read config file {path:?}.")]
	Read { path: PathBuf, source: io::Error },
	#[error("Cannot parse config file {path:?}.")]
	Parse { path: PathBuf, source: toml::de::Error },
	/// A loaded value that the allocator or the store cannot work with.
	#[error("{key} {message}")]
	Invalid { key: &'static str, message: String },
}
impl Error {
	pub(crate) fn invalid(key: &'static str, message: impl Into<String>) -> Self {
		Self::Invalid { key, message: message.into() }
	}
}
