use std::{future::Future, pin::Pin};

use time::OffsetDateTime;

use crate::{
	Result,
	models::{Category, CategoryUsage, HistoryEntry, Record},
};
use tally_config::NumberingPolicy;
use tally_domain::record::{Attributes, AttributesPatch, BoxSize, Priority};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Clone, Debug)]
pub struct NewRecord {
	pub attributes: Attributes,
	pub editor: String,
	pub now: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct RecordPatch {
	pub record_id: i64,
	pub patch: AttributesPatch,
	pub editor: String,
	pub now: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub enum PatchOutcome {
	/// The patch matched the stored values; nothing was written.
	Unchanged(Record),
	Updated { record: Record, entry: HistoryEntry },
}

#[derive(Clone, Debug)]
pub enum DeleteOutcome {
	AlreadyDeleted(Record),
	Deleted { record: Record, entry: HistoryEntry },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
	pub records: u64,
	pub history_entries: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CategoryInsert {
	Created(Category),
	/// A deactivated category with the same name was switched back on.
	Reactivated(Category),
}
impl CategoryInsert {
	pub fn category(&self) -> &Category {
		match self {
			Self::Created(category) | Self::Reactivated(category) => category,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryRename {
	pub category: Category,
	pub records_touched: u64,
}

/// Record filter shared by listing and counting. Text matches are case-insensitive.
#[derive(Clone, Debug, Default)]
pub struct RecordFilter {
	pub sequence_number: Option<i64>,
	pub category_name: Option<String>,
	pub size: Option<BoxSize>,
	pub priority: Option<Priority>,
	pub description_contains: Option<String>,
	pub include_deleted: bool,
	pub limit: Option<i64>,
	pub offset: i64,
}
impl RecordFilter {
	pub fn matches(&self, record: &Record) -> bool {
		if !self.include_deleted && !record.is_live() {
			return false;
		}
		if self.sequence_number.is_some_and(|n| n != record.sequence_number) {
			return false;
		}
		if let Some(name) = self.category_name.as_deref()
			&& !tally_domain::category::same_name(name, &record.attributes.category_name)
		{
			return false;
		}
		if self.size.is_some_and(|size| size != record.attributes.size) {
			return false;
		}
		if self.priority.is_some_and(|priority| priority != record.attributes.priority) {
			return false;
		}
		if let Some(needle) = self.description_contains.as_deref()
			&& !record.attributes.description.to_lowercase().contains(&needle.to_lowercase())
		{
			return false;
		}

		true
	}
}

/// Persistence seam for records, categories, and history.
///
/// Every mutating method writes its history entry in the same unit of work as the mutation.
pub trait RecordStore
where
	Self: Send + Sync,
{
	/// Numbers that a new record must not take under `policy`, ascending.
	fn held_numbers<'a>(&'a self, policy: NumberingPolicy) -> BoxFuture<'a, Result<Vec<i64>>>;

	/// Assigns the lowest free number and inserts the record with its create entry.
	///
	/// Fails with [`crate::Error::SequenceCollision`] when a concurrent writer won the number.
	fn insert_numbered<'a>(
		&'a self,
		policy: NumberingPolicy,
		new: NewRecord,
	) -> BoxFuture<'a, Result<(Record, HistoryEntry)>>;

	fn load_record<'a>(&'a self, record_id: i64) -> BoxFuture<'a, Result<Option<Record>>>;

	fn update_record<'a>(&'a self, patch: RecordPatch) -> BoxFuture<'a, Result<PatchOutcome>>;

	fn soft_delete_record<'a>(
		&'a self,
		record_id: i64,
		editor: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<DeleteOutcome>>;

	/// Removes soft-deleted records and their history. All or nothing.
	fn purge_records<'a>(&'a self, record_ids: &'a [i64]) -> BoxFuture<'a, Result<PurgeReport>>;

	fn purge_all_deleted<'a>(&'a self) -> BoxFuture<'a, Result<PurgeReport>>;

	fn list_records<'a>(&'a self, filter: &'a RecordFilter) -> BoxFuture<'a, Result<Vec<Record>>>;

	fn count_records<'a>(&'a self, filter: &'a RecordFilter) -> BoxFuture<'a, Result<i64>>;

	/// Newest first.
	fn record_history<'a>(&'a self, record_id: i64) -> BoxFuture<'a, Result<Vec<HistoryEntry>>>;

	fn find_category<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<Option<Category>>>;

	/// Case-insensitive lookup over active and inactive categories.
	fn find_category_by_name<'a>(
		&'a self,
		name: &'a str,
	) -> BoxFuture<'a, Result<Option<Category>>>;

	fn insert_category<'a>(
		&'a self,
		name: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<CategoryInsert>>;

	/// Renames the category and rewrites the name on every record filed under it.
	fn rename_category<'a>(
		&'a self,
		category_id: i64,
		new_name: &'a str,
	) -> BoxFuture<'a, Result<CategoryRename>>;

	/// Live records filed under the category.
	fn category_usage<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<i64>>;

	/// Deactivates an unused category.
	fn deactivate_category<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<Category>>;

	/// Active categories ordered by name.
	fn list_categories<'a>(&'a self) -> BoxFuture<'a, Result<Vec<CategoryUsage>>>;
}

pub(crate) fn category_in_use(usage: i64) -> String {
	format!("Cannot delete category, {usage} live records are using it.")
}

pub(crate) fn category_exists(name: &str) -> String {
	format!("Category {name:?} already exists.")
}

pub(crate) fn record_missing(record_id: i64) -> String {
	format!("Record {record_id} was not found.")
}

pub(crate) fn category_missing(category_id: i64) -> String {
	format!("Category {category_id} was not found.")
}
