//! In-process [`RecordStore`] with the same transactional contract as the Postgres store.
//!
//! Each operation runs under one lock, which plays the role of a serializable transaction.

use std::{
	collections::{BTreeMap, BTreeSet},
	sync::{Mutex, MutexGuard},
};

use time::OffsetDateTime;

use crate::{
	Error, Result,
	models::{Category, CategoryUsage, HistoryEntry, Record},
	store::{
		self, BoxFuture, CategoryInsert, CategoryRename, DeleteOutcome, NewRecord, PatchOutcome,
		PurgeReport, RecordFilter, RecordPatch, RecordStore,
	},
};
use tally_config::NumberingPolicy;
use tally_domain::{
	category,
	history::HistoryDraft,
	numbering,
	record::{self, RecordState},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
	state: Mutex<State>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a store whose category table starts with `names`.
	pub fn with_categories<I, S>(names: I, now: OffsetDateTime) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let store = Self::new();

		{
			let mut state = store.lock();

			for name in names {
				let name = name.as_ref().trim();

				if state.category_by_name(name).is_none() {
					state.push_category(name, now);
				}
			}
		}

		store
	}

	/// Numbers retired by soft deletes, ascending.
	pub fn retired_numbers(&self) -> Vec<i64> {
		self.lock().retired.iter().copied().collect()
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}

impl RecordStore for MemoryStore {
	fn held_numbers<'a>(&'a self, policy: NumberingPolicy) -> BoxFuture<'a, Result<Vec<i64>>> {
		Box::pin(async move { Ok(self.lock().held_numbers(policy)) })
	}

	fn insert_numbered<'a>(
		&'a self,
		policy: NumberingPolicy,
		new: NewRecord,
	) -> BoxFuture<'a, Result<(Record, HistoryEntry)>> {
		Box::pin(async move { self.lock().insert_numbered(policy, new) })
	}

	fn load_record<'a>(&'a self, record_id: i64) -> BoxFuture<'a, Result<Option<Record>>> {
		Box::pin(async move { Ok(self.lock().records.get(&record_id).cloned()) })
	}

	fn update_record<'a>(&'a self, patch: RecordPatch) -> BoxFuture<'a, Result<PatchOutcome>> {
		Box::pin(async move { self.lock().update_record(patch) })
	}

	fn soft_delete_record<'a>(
		&'a self,
		record_id: i64,
		editor: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<DeleteOutcome>> {
		Box::pin(async move { self.lock().soft_delete_record(record_id, editor, now) })
	}

	fn purge_records<'a>(&'a self, record_ids: &'a [i64]) -> BoxFuture<'a, Result<PurgeReport>> {
		Box::pin(async move { self.lock().purge_records(record_ids) })
	}

	fn purge_all_deleted<'a>(&'a self) -> BoxFuture<'a, Result<PurgeReport>> {
		Box::pin(async move {
			let mut state = self.lock();
			let deleted: Vec<i64> = state
				.records
				.values()
				.filter(|record| !record.is_live())
				.map(|record| record.record_id)
				.collect();

			state.purge_records(&deleted)
		})
	}

	fn list_records<'a>(&'a self, filter: &'a RecordFilter) -> BoxFuture<'a, Result<Vec<Record>>> {
		Box::pin(async move {
			let state = self.lock();
			let mut records: Vec<Record> =
				state.records.values().filter(|record| filter.matches(record)).cloned().collect();

			records.sort_by_key(|record| (record.sequence_number, record.record_id));

			let offset = usize::try_from(filter.offset.max(0)).unwrap_or(usize::MAX);
			let limit = filter
				.limit
				.map(|limit| usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
				.unwrap_or(usize::MAX);

			Ok(records.into_iter().skip(offset).take(limit).collect())
		})
	}

	fn count_records<'a>(&'a self, filter: &'a RecordFilter) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let state = self.lock();
			let count = state.records.values().filter(|record| filter.matches(record)).count();

			Ok(i64::try_from(count).unwrap_or(i64::MAX))
		})
	}

	fn record_history<'a>(&'a self, record_id: i64) -> BoxFuture<'a, Result<Vec<HistoryEntry>>> {
		Box::pin(async move {
			let state = self.lock();
			let mut entries: Vec<HistoryEntry> = state
				.history
				.iter()
				.filter(|entry| entry.record_id == record_id)
				.cloned()
				.collect();

			entries.sort_by(|a, b| b.ts.cmp(&a.ts).then(b.entry_id.cmp(&a.entry_id)));

			Ok(entries)
		})
	}

	fn find_category<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<Option<Category>>> {
		Box::pin(async move { Ok(self.lock().categories.get(&category_id).cloned()) })
	}

	fn find_category_by_name<'a>(
		&'a self,
		name: &'a str,
	) -> BoxFuture<'a, Result<Option<Category>>> {
		Box::pin(async move { Ok(self.lock().category_by_name(name).cloned()) })
	}

	fn insert_category<'a>(
		&'a self,
		name: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<CategoryInsert>> {
		Box::pin(async move {
			let mut state = self.lock();
			let existing = state.category_by_name(name).map(|c| (c.category_id, c.is_active));

			match existing {
				Some((_, true)) => Err(Error::Conflict(store::category_exists(name))),
				Some((category_id, false)) => {
					let category = state.active_category_mut(category_id, true)?;

					category.is_active = true;
					category.name = name.to_string();

					Ok(CategoryInsert::Reactivated(category.clone()))
				},
				None => Ok(CategoryInsert::Created(state.push_category(name, now))),
			}
		})
	}

	fn rename_category<'a>(
		&'a self,
		category_id: i64,
		new_name: &'a str,
	) -> BoxFuture<'a, Result<CategoryRename>> {
		Box::pin(async move {
			let mut state = self.lock();

			state.active_category_mut(category_id, false)?;

			if let Some(clash) = state
				.categories
				.values()
				.find(|c| c.category_id != category_id && category::same_name(&c.name, new_name))
			{
				return Err(Error::Conflict(store::category_exists(&clash.name)));
			}

			let mut records_touched = 0;

			for record in state.records.values_mut() {
				if record.attributes.category_id == Some(category_id) {
					record.attributes.category_name = new_name.to_string();
					records_touched += 1;
				}
			}

			let category = state.active_category_mut(category_id, false)?;

			category.name = new_name.to_string();

			Ok(CategoryRename { category: category.clone(), records_touched })
		})
	}

	fn category_usage<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let mut state = self.lock();

			state.active_category_mut(category_id, true)?;

			Ok(state.usage(category_id))
		})
	}

	fn deactivate_category<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<Category>> {
		Box::pin(async move {
			let mut state = self.lock();

			state.active_category_mut(category_id, false)?;

			let usage = state.usage(category_id);

			if usage > 0 {
				return Err(Error::Invariant(store::category_in_use(usage)));
			}

			let category = state.active_category_mut(category_id, false)?;

			category.is_active = false;

			Ok(category.clone())
		})
	}

	fn list_categories<'a>(&'a self) -> BoxFuture<'a, Result<Vec<CategoryUsage>>> {
		Box::pin(async move {
			let state = self.lock();
			let mut categories: Vec<CategoryUsage> = state
				.categories
				.values()
				.filter(|c| c.is_active)
				.map(|c| CategoryUsage {
					category: c.clone(),
					usage_count: state.usage(c.category_id),
				})
				.collect();

			categories
				.sort_by_key(|c| (category::name_key(&c.category.name), c.category.category_id));

			Ok(categories)
		})
	}
}

#[derive(Debug, Default)]
struct State {
	records: BTreeMap<i64, Record>,
	history: Vec<HistoryEntry>,
	categories: BTreeMap<i64, Category>,
	retired: BTreeSet<i64>,
	next_record_id: i64,
	next_entry_id: i64,
	next_category_id: i64,
}
impl State {
	fn held_numbers(&self, policy: NumberingPolicy) -> Vec<i64> {
		let live = self.records.values().filter(|r| r.is_live()).map(|r| r.sequence_number);
		let held: BTreeSet<i64> = match policy {
			NumberingPolicy::RetireDeleted => live.chain(self.retired.iter().copied()).collect(),
			NumberingPolicy::ReuseDeleted => live.collect(),
		};

		held.into_iter().collect()
	}

	fn insert_numbered(
		&mut self,
		policy: NumberingPolicy,
		new: NewRecord,
	) -> Result<(Record, HistoryEntry)> {
		let mut attributes = new.attributes;

		if let Some(category_id) = attributes.category_id {
			attributes.category_name = self.active_category_mut(category_id, false)?.name.clone();
		}

		let sequence_number = numbering::lowest_free_sorted(&self.held_numbers(policy));

		if self.records.values().any(|r| r.is_live() && r.sequence_number == sequence_number) {
			return Err(Error::SequenceCollision { sequence_number });
		}

		self.next_record_id += 1;

		let record = Record {
			record_id: self.next_record_id,
			sequence_number,
			attributes,
			state: RecordState::Active,
			created_at: new.now,
			updated_at: new.now,
		};

		self.records.insert(record.record_id, record.clone());

		let entry = self.push_history(
			record.record_id,
			HistoryDraft::created(sequence_number, &new.editor),
			new.now,
		);

		Ok((record, entry))
	}

	fn update_record(&mut self, patch: RecordPatch) -> Result<PatchOutcome> {
		let current = self.live_record(patch.record_id)?.clone();
		let mut next = current.attributes.merged(&patch.patch);

		if let Some(category) = patch.patch.category.as_ref() {
			let locked = self.active_category_mut(category.category_id, false)?;

			next.category_name = locked.name.clone();
		}

		let changes = record::change_summary(&current.attributes, &next);
		let Some(draft) = HistoryDraft::updated(&changes, &patch.editor) else {
			return Ok(PatchOutcome::Unchanged(current));
		};

		let record = Record { attributes: next, updated_at: patch.now, ..current };

		self.records.insert(record.record_id, record.clone());

		let entry = self.push_history(record.record_id, draft, patch.now);

		Ok(PatchOutcome::Updated { record, entry })
	}

	fn soft_delete_record(
		&mut self,
		record_id: i64,
		editor: &str,
		now: OffsetDateTime,
	) -> Result<DeleteOutcome> {
		let Some(current) = self.records.get(&record_id).cloned() else {
			return Err(Error::NotFound(store::record_missing(record_id)));
		};

		if !current.is_live() {
			return Ok(DeleteOutcome::AlreadyDeleted(current));
		}

		let record = Record {
			state: RecordState::SoftDeleted { deleted_at: now },
			updated_at: now,
			..current
		};

		self.records.insert(record_id, record.clone());
		self.retired.insert(record.sequence_number);

		let draft = HistoryDraft::deleted(record.sequence_number, editor);
		let entry = self.push_history(record_id, draft, now);

		Ok(DeleteOutcome::Deleted { record, entry })
	}

	fn purge_records(&mut self, record_ids: &[i64]) -> Result<PurgeReport> {
		let ids: BTreeSet<i64> = record_ids.iter().copied().collect();
		let mut live = Vec::new();

		for id in &ids {
			match self.records.get(id) {
				None => return Err(Error::NotFound(store::record_missing(*id))),
				Some(record) if record.is_live() => live.push(*id),
				Some(_) => {},
			}
		}

		if !live.is_empty() {
			return Err(Error::Invariant(format!(
				"Records {live:?} are not soft-deleted and cannot be purged."
			)));
		}

		let before = self.history.len();

		self.history.retain(|entry| !ids.contains(&entry.record_id));

		let history_entries = (before - self.history.len()) as u64;

		for id in &ids {
			self.records.remove(id);
		}

		Ok(PurgeReport { records: ids.len() as u64, history_entries })
	}

	fn live_record(&self, record_id: i64) -> Result<&Record> {
		self.records
			.get(&record_id)
			.filter(|record| record.is_live())
			.ok_or_else(|| Error::NotFound(store::record_missing(record_id)))
	}

	fn category_by_name(&self, name: &str) -> Option<&Category> {
		self.categories.values().find(|c| category::same_name(&c.name, name))
	}

	/// Looks up a category that is active, or any category when `include_inactive` is set.
	fn active_category_mut(
		&mut self,
		category_id: i64,
		include_inactive: bool,
	) -> Result<&mut Category> {
		self.categories
			.get_mut(&category_id)
			.filter(|c| include_inactive || c.is_active)
			.ok_or_else(|| Error::NotFound(store::category_missing(category_id)))
	}

	fn usage(&self, category_id: i64) -> i64 {
		self.records
			.values()
			.filter(|r| r.is_live() && r.attributes.category_id == Some(category_id))
			.count() as i64
	}

	fn push_category(&mut self, name: &str, now: OffsetDateTime) -> Category {
		self.next_category_id += 1;

		let category = Category {
			category_id: self.next_category_id,
			name: name.to_string(),
			is_active: true,
			created_at: now,
		};

		self.categories.insert(category.category_id, category.clone());

		category
	}

	fn push_history(
		&mut self,
		record_id: i64,
		draft: HistoryDraft,
		ts: OffsetDateTime,
	) -> HistoryEntry {
		self.next_entry_id += 1;

		let entry = HistoryEntry {
			entry_id: self.next_entry_id,
			record_id,
			action: draft.action,
			editor: draft.editor,
			change_summary: draft.change_summary,
			ts,
		};

		self.history.push(entry.clone());

		entry
	}
}
