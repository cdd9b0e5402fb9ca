use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
	#[serde(rename = "Priority 1")]
	Priority1,
	#[serde(rename = "Priority 2")]
	Priority2,
	Important,
	Store,
}
impl Priority {
	pub const ALL: [Self; 4] = [Self::Priority1, Self::Priority2, Self::Important, Self::Store];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Priority1 => "Priority 1",
			Self::Priority2 => "Priority 2",
			Self::Important => "Important",
			Self::Store => "Store",
		}
	}
}
impl fmt::Display for Priority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Priority {
	type Err = ParseAttributeError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let trimmed = raw.trim();

		Self::ALL
			.into_iter()
			.find(|value| value.as_str().eq_ignore_ascii_case(trimmed))
			.ok_or_else(|| ParseAttributeError { field: "priority", value: raw.to_string() })
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoxSize {
	Small,
	Medium,
	Large,
	#[serde(rename = "Extra Large")]
	ExtraLarge,
}
impl BoxSize {
	pub const ALL: [Self; 4] = [Self::Small, Self::Medium, Self::Large, Self::ExtraLarge];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Small => "Small",
			Self::Medium => "Medium",
			Self::Large => "Large",
			Self::ExtraLarge => "Extra Large",
		}
	}
}
impl fmt::Display for BoxSize {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for BoxSize {
	type Err = ParseAttributeError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let trimmed = raw.trim();

		Self::ALL
			.into_iter()
			.find(|value| value.as_str().eq_ignore_ascii_case(trimmed))
			.ok_or_else(|| ParseAttributeError { field: "size", value: raw.to_string() })
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseAttributeError {
	pub field: &'static str,
	pub value: String,
}
impl fmt::Display for ParseAttributeError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?} is not a valid {}.", self.value, self.field)
	}
}
impl std::error::Error for ParseAttributeError {}

/// Lifecycle of a record. Purge only ever applies to `SoftDeleted`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordState {
	Active,
	SoftDeleted {
		#[serde(with = "crate::time_serde")]
		deleted_at: OffsetDateTime,
	},
}
impl RecordState {
	/// Rebuilds the state from its column form.
	pub fn from_columns(
		is_deleted: bool,
		deleted_at: Option<OffsetDateTime>,
		updated_at: OffsetDateTime,
	) -> Self {
		if is_deleted {
			Self::SoftDeleted { deleted_at: deleted_at.unwrap_or(updated_at) }
		} else {
			Self::Active
		}
	}

	pub fn is_active(&self) -> bool {
		matches!(self, Self::Active)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAssignment {
	pub category_id: i64,
	pub name: String,
}

/// Descriptive fields of a record. The allocator never looks at these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
	pub category_id: Option<i64>,
	pub category_name: String,
	pub size: BoxSize,
	pub priority: Priority,
	pub description: String,
}
impl Attributes {
	pub fn new(
		category: CategoryAssignment,
		size: BoxSize,
		priority: Priority,
		description: impl Into<String>,
	) -> Self {
		Self {
			category_id: Some(category.category_id),
			category_name: category.name,
			size,
			priority,
			description: description.into(),
		}
	}

	/// Returns the merged attributes; fields absent from `patch` keep their current value.
	pub fn merged(&self, patch: &AttributesPatch) -> Self {
		let mut next = self.clone();

		if let Some(category) = patch.category.as_ref() {
			next.category_id = Some(category.category_id);
			next.category_name = category.name.clone();
		}
		if let Some(size) = patch.size {
			next.size = size;
		}
		if let Some(priority) = patch.priority {
			next.priority = priority;
		}
		if let Some(description) = patch.description.as_ref() {
			next.description = description.clone();
		}

		next
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributesPatch {
	pub category: Option<CategoryAssignment>,
	pub size: Option<BoxSize>,
	pub priority: Option<Priority>,
	pub description: Option<String>,
}
impl AttributesPatch {
	pub fn is_empty(&self) -> bool {
		self.category.is_none()
			&& self.size.is_none()
			&& self.priority.is_none()
			&& self.description.is_none()
	}
}

/// One line per changed field, in a fixed field order. Empty when nothing changed.
pub fn change_summary(prev: &Attributes, next: &Attributes) -> Vec<String> {
	let mut changes = Vec::new();

	if prev.priority != next.priority {
		changes.push(format!("Priority: {} -> {}", prev.priority, next.priority));
	}
	if prev.category_id != next.category_id || prev.category_name != next.category_name {
		changes.push(format!("Category: {} -> {}", prev.category_name, next.category_name));
	}
	if prev.size != next.size {
		changes.push(format!("Size: {} -> {}", prev.size, next.size));
	}
	if prev.description != next.description {
		changes.push("Description updated".to_string());
	}

	changes
}
