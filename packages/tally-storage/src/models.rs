use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, Result};
use tally_domain::{
	history::HistoryAction,
	record::{Attributes, BoxSize, Priority, RecordState},
	time_serde,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
	pub record_id: i64,
	pub sequence_number: i64,
	#[serde(flatten)]
	pub attributes: Attributes,
	#[serde(flatten)]
	pub state: RecordState,
	#[serde(with = "time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time_serde")]
	pub updated_at: OffsetDateTime,
}
impl Record {
	pub fn is_live(&self) -> bool {
		self.state.is_active()
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
	pub category_id: i64,
	pub name: String,
	pub is_active: bool,
	#[serde(with = "time_serde")]
	pub created_at: OffsetDateTime,
}

/// An active category with the number of live records filed under it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryUsage {
	#[serde(flatten)]
	pub category: Category,
	pub usage_count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
	pub entry_id: i64,
	pub record_id: i64,
	pub action: HistoryAction,
	pub editor: String,
	pub change_summary: String,
	#[serde(with = "time_serde")]
	pub ts: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordRow {
	pub record_id: i64,
	pub sequence_number: i64,
	pub category_id: Option<i64>,
	pub category_name: String,
	pub size: String,
	pub priority: String,
	pub description: String,
	pub is_deleted: bool,
	pub deleted_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl TryFrom<RecordRow> for Record {
	type Error = Error;

	fn try_from(row: RecordRow) -> Result<Self> {
		let size = row.size.parse::<BoxSize>().map_err(|err| Error::Decode(err.to_string()))?;
		let priority =
			row.priority.parse::<Priority>().map_err(|err| Error::Decode(err.to_string()))?;

		Ok(Self {
			record_id: row.record_id,
			sequence_number: row.sequence_number,
			attributes: Attributes {
				category_id: row.category_id,
				category_name: row.category_name,
				size,
				priority,
				description: row.description,
			},
			state: RecordState::from_columns(row.is_deleted, row.deleted_at, row.updated_at),
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CategoryRow {
	pub category_id: i64,
	pub name: String,
	pub is_active: bool,
	pub created_at: OffsetDateTime,
}
impl From<CategoryRow> for Category {
	fn from(row: CategoryRow) -> Self {
		Self {
			category_id: row.category_id,
			name: row.name,
			is_active: row.is_active,
			created_at: row.created_at,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CategoryUsageRow {
	pub category_id: i64,
	pub name: String,
	pub is_active: bool,
	pub created_at: OffsetDateTime,
	pub usage_count: i64,
}
impl From<CategoryUsageRow> for CategoryUsage {
	fn from(row: CategoryUsageRow) -> Self {
		Self {
			category: Category {
				category_id: row.category_id,
				name: row.name,
				is_active: row.is_active,
				created_at: row.created_at,
			},
			usage_count: row.usage_count,
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HistoryRow {
	pub entry_id: i64,
	pub record_id: i64,
	pub action: String,
	pub editor: String,
	pub change_summary: String,
	pub ts: OffsetDateTime,
}
impl TryFrom<HistoryRow> for HistoryEntry {
	type Error = Error;

	fn try_from(row: HistoryRow) -> Result<Self> {
		let action = row.action.parse::<HistoryAction>().map_err(Error::Decode)?;

		Ok(Self {
			entry_id: row.entry_id,
			record_id: row.record_id,
			action,
			editor: row.editor,
			change_summary: row.change_summary,
			ts: row.ts,
		})
	}
}
