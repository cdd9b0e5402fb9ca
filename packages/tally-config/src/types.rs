use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub numbering: Numbering,
	#[serde(default)]
	pub categories: Categories,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Numbering {
	#[serde(default)]
	pub policy: NumberingPolicy,
	/// Upper bound on allocate-and-insert attempts when concurrent writers collide on a number.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
}
impl Default for Numbering {
	fn default() -> Self {
		Self { policy: NumberingPolicy::default(), max_attempts: default_max_attempts() }
	}
}

/// Which numbers count as taken when looking for the lowest free one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingPolicy {
	/// Live numbers and every number a soft delete has retired.
	#[default]
	RetireDeleted,
	/// Live numbers only; a soft delete frees its number for the next record.
	ReuseDeleted,
}
impl NumberingPolicy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::RetireDeleted => "retire_deleted",
			Self::ReuseDeleted => "reuse_deleted",
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Categories {
	/// Create unknown categories named on record creation instead of rejecting the request.
	#[serde(default = "default_auto_create")]
	pub auto_create: bool,
	/// Inserted on schema bootstrap when the category table is empty.
	#[serde(default)]
	pub seed: Vec<String>,
}
impl Default for Categories {
	fn default() -> Self {
		Self { auto_create: default_auto_create(), seed: Vec::new() }
	}
}

fn default_max_attempts() -> u32 {
	5
}

fn default_auto_create() -> bool {
	true
}
