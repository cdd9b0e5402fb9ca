use std::fmt;

use tally_config::MAX_CATEGORY_NAME_CHARS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRejection {
	Empty,
	TooLong,
}
impl fmt::Display for NameRejection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Empty => f.write_str("Category name cannot be empty."),
			Self::TooLong =>
				write!(f, "Category name must be at most {MAX_CATEGORY_NAME_CHARS} characters."),
		}
	}
}

/// Trims the name and checks it is storable.
pub fn normalize_name(raw: &str) -> Result<String, NameRejection> {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return Err(NameRejection::Empty);
	}
	if trimmed.chars().count() > MAX_CATEGORY_NAME_CHARS {
		return Err(NameRejection::TooLong);
	}

	Ok(trimmed.to_string())
}

/// Collation key used for uniqueness. Matches the `lower(name)` index on the category table.
pub fn name_key(name: &str) -> String {
	name.trim().to_lowercase()
}

pub fn same_name(a: &str, b: &str) -> bool {
	name_key(a) == name_key(b)
}
