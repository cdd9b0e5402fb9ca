mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Categories, Config, Numbering, NumberingPolicy, Postgres, Service, Storage};

use std::{collections::HashSet, fs, path::Path};

pub const MAX_ATTEMPTS_LIMIT: u32 = 32;
pub const MAX_CATEGORY_NAME_CHARS: usize = 100;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|source| Error::Parse { path: path.to_path_buf(), source })?;

	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::invalid("service.log_level", "must be non-empty."));
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::invalid("storage.postgres.dsn", "must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::invalid("storage.postgres.pool_max_conns", "must be greater than zero."));
	}

	validate_numbering(&cfg.numbering)?;
	validate_seed(&cfg.categories.seed)
}

fn validate_numbering(numbering: &Numbering) -> Result<()> {
	const KEY: &str = "numbering.max_attempts";

	match numbering.max_attempts {
		0 => Err(Error::invalid(KEY, "must be greater than zero.")),
		n if n > MAX_ATTEMPTS_LIMIT =>
			Err(Error::invalid(KEY, format!("must be {MAX_ATTEMPTS_LIMIT} or less."))),
		_ => Ok(()),
	}
}

fn validate_seed(seed: &[String]) -> Result<()> {
	const KEY: &str = "categories.seed";

	let mut seen = HashSet::new();

	for name in seed {
		if name.trim().is_empty() {
			return Err(Error::invalid(KEY, "entries must be non-empty."));
		}
		if name.chars().count() > MAX_CATEGORY_NAME_CHARS {
			return Err(Error::invalid(
				KEY,
				format!("entries must be at most {MAX_CATEGORY_NAME_CHARS} characters."),
			));
		}
		if !seen.insert(name.to_lowercase()) {
			return Err(Error::invalid(
				KEY,
				format!("contains {name:?} more than once (names are case-insensitive)."),
			));
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.storage.postgres.dsn = cfg.storage.postgres.dsn.trim().to_string();

	for name in cfg.categories.seed.iter_mut() {
		*name = name.trim().to_string();
	}
}
