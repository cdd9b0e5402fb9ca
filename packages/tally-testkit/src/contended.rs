use std::sync::{
	Mutex,
	atomic::{AtomicU32, Ordering},
};

use time::OffsetDateTime;

use tally_config::NumberingPolicy;
use tally_storage::{
	BoxFuture, Error, RecordStore, Result,
	models::{Category, CategoryUsage, HistoryEntry, Record},
	store::{
		CategoryInsert, CategoryRename, DeleteOutcome, NewRecord, PatchOutcome, PurgeReport,
		RecordFilter, RecordPatch,
	},
};

enum Fault {
	/// Fail the insert as if another writer had committed the same number.
	Collision,
	/// Let a rival record take the number first, then fail the insert.
	Rival(NewRecord),
	Outage,
}

/// Wraps a store and makes the next few numbered inserts lose their race.
///
/// Every other call is forwarded untouched.
pub struct ContendedStore<S> {
	inner: S,
	faults: Mutex<Vec<Fault>>,
	insert_attempts: AtomicU32,
}
impl<S> ContendedStore<S>
where
	S: RecordStore,
{
	pub fn new(inner: S) -> Self {
		Self { inner, faults: Mutex::new(Vec::new()), insert_attempts: AtomicU32::new(0) }
	}

	/// Queues `count` bare collisions.
	pub fn with_collisions(self, count: usize) -> Self {
		self.push_faults((0..count).map(|_| Fault::Collision));

		self
	}

	/// Queues a collision where `rival` is committed under the contested number first.
	pub fn with_rival(self, rival: NewRecord) -> Self {
		self.push_faults([Fault::Rival(rival)]);

		self
	}

	/// Queues an unavailable-store failure.
	pub fn with_outage(self) -> Self {
		self.push_faults([Fault::Outage]);

		self
	}

	/// How many times `insert_numbered` has been called.
	pub fn insert_attempts(&self) -> u32 {
		self.insert_attempts.load(Ordering::SeqCst)
	}

	fn push_faults(&self, faults: impl IntoIterator<Item = Fault>) {
		self.faults.lock().unwrap_or_else(|err| err.into_inner()).extend(faults);
	}

	fn next_fault(&self) -> Option<Fault> {
		let mut faults = self.faults.lock().unwrap_or_else(|err| err.into_inner());

		if faults.is_empty() { None } else { Some(faults.remove(0)) }
	}
}

impl<S> RecordStore for ContendedStore<S>
where
	S: RecordStore,
{
	fn held_numbers<'a>(&'a self, policy: NumberingPolicy) -> BoxFuture<'a, Result<Vec<i64>>> {
		self.inner.held_numbers(policy)
	}

	fn insert_numbered<'a>(
		&'a self,
		policy: NumberingPolicy,
		new: NewRecord,
	) -> BoxFuture<'a, Result<(Record, HistoryEntry)>> {
		Box::pin(async move {
			self.insert_attempts.fetch_add(1, Ordering::SeqCst);

			match self.next_fault() {
				None => self.inner.insert_numbered(policy, new).await,
				Some(Fault::Collision) => {
					let held = self.inner.held_numbers(policy).await?;

					Err(Error::SequenceCollision {
						sequence_number: tally_domain::numbering::lowest_free(held),
					})
				},
				Some(Fault::Rival(rival)) => {
					let (record, _) = self.inner.insert_numbered(policy, rival).await?;

					Err(Error::SequenceCollision { sequence_number: record.sequence_number })
				},
				Some(Fault::Outage) => Err(Error::Sqlx(sqlx::Error::PoolTimedOut)),
			}
		})
	}

	fn load_record<'a>(&'a self, record_id: i64) -> BoxFuture<'a, Result<Option<Record>>> {
		self.inner.load_record(record_id)
	}

	fn update_record<'a>(&'a self, patch: RecordPatch) -> BoxFuture<'a, Result<PatchOutcome>> {
		self.inner.update_record(patch)
	}

	fn soft_delete_record<'a>(
		&'a self,
		record_id: i64,
		editor: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<DeleteOutcome>> {
		self.inner.soft_delete_record(record_id, editor, now)
	}

	fn purge_records<'a>(&'a self, record_ids: &'a [i64]) -> BoxFuture<'a, Result<PurgeReport>> {
		self.inner.purge_records(record_ids)
	}

	fn purge_all_deleted<'a>(&'a self) -> BoxFuture<'a, Result<PurgeReport>> {
		self.inner.purge_all_deleted()
	}

	fn list_records<'a>(&'a self, filter: &'a RecordFilter) -> BoxFuture<'a, Result<Vec<Record>>> {
		self.inner.list_records(filter)
	}

	fn count_records<'a>(&'a self, filter: &'a RecordFilter) -> BoxFuture<'a, Result<i64>> {
		self.inner.count_records(filter)
	}

	fn record_history<'a>(&'a self, record_id: i64) -> BoxFuture<'a, Result<Vec<HistoryEntry>>> {
		self.inner.record_history(record_id)
	}

	fn find_category<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<Option<Category>>> {
		self.inner.find_category(category_id)
	}

	fn find_category_by_name<'a>(
		&'a self,
		name: &'a str,
	) -> BoxFuture<'a, Result<Option<Category>>> {
		self.inner.find_category_by_name(name)
	}

	fn insert_category<'a>(
		&'a self,
		name: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<CategoryInsert>> {
		self.inner.insert_category(name, now)
	}

	fn rename_category<'a>(
		&'a self,
		category_id: i64,
		new_name: &'a str,
	) -> BoxFuture<'a, Result<CategoryRename>> {
		self.inner.rename_category(category_id, new_name)
	}

	fn category_usage<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<i64>> {
		self.inner.category_usage(category_id)
	}

	fn deactivate_category<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<Category>> {
		self.inner.deactivate_category(category_id)
	}

	fn list_categories<'a>(&'a self) -> BoxFuture<'a, Result<Vec<CategoryUsage>>> {
		self.inner.list_categories()
	}
}
