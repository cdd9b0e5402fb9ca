//! Postgres implementation of [`RecordStore`].

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
	Error, Result,
	db::Db,
	models::{
		Category, CategoryRow, CategoryUsage, CategoryUsageRow, HistoryEntry, HistoryRow, Record,
		RecordRow,
	},
	store::{
		self, BoxFuture, CategoryInsert, CategoryRename, DeleteOutcome, NewRecord, PatchOutcome,
		PurgeReport, RecordFilter, RecordPatch, RecordStore,
	},
};
use tally_config::NumberingPolicy;
use tally_domain::{history::HistoryDraft, numbering, record};

pub const SEQUENCE_NUMBER_KEY: &str = "records_live_sequence_number_key";
pub const CATEGORY_NAME_KEY: &str = "categories_name_nocase_key";

impl RecordStore for Db {
	fn held_numbers<'a>(&'a self, policy: NumberingPolicy) -> BoxFuture<'a, Result<Vec<i64>>> {
		Box::pin(async move {
			let mut conn = self.pool.acquire().await?;

			held_numbers(&mut conn, policy).await
		})
	}

	fn insert_numbered<'a>(
		&'a self,
		policy: NumberingPolicy,
		new: NewRecord,
	) -> BoxFuture<'a, Result<(Record, HistoryEntry)>> {
		Box::pin(insert_numbered(&self.pool, policy, new))
	}

	fn load_record<'a>(&'a self, record_id: i64) -> BoxFuture<'a, Result<Option<Record>>> {
		Box::pin(async move {
			let row: Option<RecordRow> =
				sqlx::query_as("SELECT * FROM records WHERE record_id = $1")
					.bind(record_id)
					.fetch_optional(&self.pool)
					.await?;

			row.map(Record::try_from).transpose()
		})
	}

	fn update_record<'a>(&'a self, patch: RecordPatch) -> BoxFuture<'a, Result<PatchOutcome>> {
		Box::pin(update_record(&self.pool, patch))
	}

	fn soft_delete_record<'a>(
		&'a self,
		record_id: i64,
		editor: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<DeleteOutcome>> {
		Box::pin(soft_delete_record(&self.pool, record_id, editor, now))
	}

	fn purge_records<'a>(&'a self, record_ids: &'a [i64]) -> BoxFuture<'a, Result<PurgeReport>> {
		Box::pin(purge_records(&self.pool, record_ids))
	}

	fn purge_all_deleted<'a>(&'a self) -> BoxFuture<'a, Result<PurgeReport>> {
		Box::pin(purge_all_deleted(&self.pool))
	}

	fn list_records<'a>(&'a self, filter: &'a RecordFilter) -> BoxFuture<'a, Result<Vec<Record>>> {
		Box::pin(async move {
			let mut builder = QueryBuilder::new("SELECT * FROM records WHERE TRUE");

			push_record_filter(&mut builder, filter);
			builder.push(" ORDER BY sequence_number, record_id");

			if let Some(limit) = filter.limit {
				builder.push(" LIMIT ");
				builder.push_bind(limit);
			}
			if filter.offset > 0 {
				builder.push(" OFFSET ");
				builder.push_bind(filter.offset);
			}

			let rows: Vec<RecordRow> = builder.build_query_as().fetch_all(&self.pool).await?;

			rows.into_iter().map(Record::try_from).collect()
		})
	}

	fn count_records<'a>(&'a self, filter: &'a RecordFilter) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let mut builder = QueryBuilder::new("SELECT count(*) FROM records WHERE TRUE");

			push_record_filter(&mut builder, filter);

			let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;

			Ok(count)
		})
	}

	fn record_history<'a>(&'a self, record_id: i64) -> BoxFuture<'a, Result<Vec<HistoryEntry>>> {
		Box::pin(async move {
			let rows: Vec<HistoryRow> = sqlx::query_as(
				"\
SELECT *
FROM record_history
WHERE record_id = $1
ORDER BY ts DESC, entry_id DESC",
			)
			.bind(record_id)
			.fetch_all(&self.pool)
			.await?;

			rows.into_iter().map(HistoryEntry::try_from).collect()
		})
	}

	fn find_category<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<Option<Category>>> {
		Box::pin(async move {
			let row: Option<CategoryRow> =
				sqlx::query_as("SELECT * FROM categories WHERE category_id = $1")
					.bind(category_id)
					.fetch_optional(&self.pool)
					.await?;

			Ok(row.map(Category::from))
		})
	}

	fn find_category_by_name<'a>(
		&'a self,
		name: &'a str,
	) -> BoxFuture<'a, Result<Option<Category>>> {
		Box::pin(async move {
			let row: Option<CategoryRow> =
				sqlx::query_as("SELECT * FROM categories WHERE lower(name) = lower($1)")
					.bind(name.trim())
					.fetch_optional(&self.pool)
					.await?;

			Ok(row.map(Category::from))
		})
	}

	fn insert_category<'a>(
		&'a self,
		name: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<CategoryInsert>> {
		Box::pin(insert_category(&self.pool, name, now))
	}

	fn rename_category<'a>(
		&'a self,
		category_id: i64,
		new_name: &'a str,
	) -> BoxFuture<'a, Result<CategoryRename>> {
		Box::pin(rename_category(&self.pool, category_id, new_name))
	}

	fn category_usage<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move {
			let mut conn = self.pool.acquire().await?;
			let exists: Option<i64> =
				sqlx::query_scalar("SELECT category_id FROM categories WHERE category_id = $1")
					.bind(category_id)
					.fetch_optional(&mut *conn)
					.await?;

			if exists.is_none() {
				return Err(Error::NotFound(store::category_missing(category_id)));
			}

			live_usage(&mut conn, category_id).await
		})
	}

	fn deactivate_category<'a>(&'a self, category_id: i64) -> BoxFuture<'a, Result<Category>> {
		Box::pin(deactivate_category(&self.pool, category_id))
	}

	fn list_categories<'a>(&'a self) -> BoxFuture<'a, Result<Vec<CategoryUsage>>> {
		Box::pin(async move {
			let rows: Vec<CategoryUsageRow> = sqlx::query_as(
				"\
SELECT
	c.category_id,
	c.name,
	c.is_active,
	c.created_at,
	(
		SELECT count(*)
		FROM records r
		WHERE r.category_id = c.category_id AND NOT r.is_deleted
	) AS usage_count
FROM categories c
WHERE c.is_active
ORDER BY lower(c.name), c.category_id",
			)
			.fetch_all(&self.pool)
			.await?;

			Ok(rows.into_iter().map(CategoryUsage::from).collect())
		})
	}
}

/// Lock taken on a category row inside a transaction.
#[derive(Clone, Copy, Debug)]
enum CategoryLock {
	/// Record writers. Concurrent writers share it; renames and deactivation wait for them.
	Share,
	/// Renames and deactivation. Serializes them with each other and with record writers.
	Update,
}
impl CategoryLock {
	fn select_sql(self) -> &'static str {
		match self {
			Self::Share =>
				"SELECT name, is_active FROM categories WHERE category_id = $1 FOR SHARE",
			Self::Update =>
				"SELECT name, is_active FROM categories WHERE category_id = $1 FOR UPDATE",
		}
	}
}

pub fn is_unique_violation_on(err: &sqlx::Error, constraint: &str) -> bool {
	err.as_database_error().is_some_and(|db_err| {
		db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
	})
}

async fn held_numbers(conn: &mut PgConnection, policy: NumberingPolicy) -> Result<Vec<i64>> {
	let sql = match policy {
		NumberingPolicy::RetireDeleted =>
			"\
SELECT sequence_number FROM records WHERE NOT is_deleted
UNION
SELECT sequence_number FROM retired_numbers
ORDER BY 1",
		NumberingPolicy::ReuseDeleted =>
			"SELECT sequence_number FROM records WHERE NOT is_deleted ORDER BY 1",
	};
	let numbers: Vec<i64> = sqlx::query_scalar(sql).fetch_all(conn).await?;

	Ok(numbers)
}

async fn insert_numbered(
	pool: &PgPool,
	policy: NumberingPolicy,
	new: NewRecord,
) -> Result<(Record, HistoryEntry)> {
	let mut tx = pool.begin().await?;
	let mut attributes = new.attributes;

	if let Some(category_id) = attributes.category_id {
		attributes.category_name =
			lock_active_category(&mut tx, category_id, CategoryLock::Share).await?;
	}

	let held = held_numbers(&mut tx, policy).await?;
	let sequence_number = numbering::lowest_free_sorted(&held);
	let row: RecordRow = sqlx::query_as(
		"\
INSERT INTO records (
	sequence_number,
	category_id,
	category_name,
	size,
	priority,
	description,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
RETURNING *",
	)
	.bind(sequence_number)
	.bind(attributes.category_id)
	.bind(attributes.category_name.as_str())
	.bind(attributes.size.as_str())
	.bind(attributes.priority.as_str())
	.bind(attributes.description.as_str())
	.bind(new.now)
	.fetch_one(&mut *tx)
	.await
	.map_err(|err| {
		if is_unique_violation_on(&err, SEQUENCE_NUMBER_KEY) {
			Error::SequenceCollision { sequence_number }
		} else {
			Error::Sqlx(err)
		}
	})?;
	let record = Record::try_from(row)?;
	let draft = HistoryDraft::created(sequence_number, &new.editor);
	let entry = insert_history(&mut tx, record.record_id, &draft, new.now).await?;

	tx.commit().await?;

	Ok((record, entry))
}

async fn update_record(pool: &PgPool, patch: RecordPatch) -> Result<PatchOutcome> {
	let mut tx = pool.begin().await?;
	// Category before record, the same order renames take them in.
	let category_name = match patch.patch.category.as_ref() {
		Some(category) =>
			Some(lock_active_category(&mut tx, category.category_id, CategoryLock::Share).await?),
		None => None,
	};
	let current = lock_record(&mut tx, patch.record_id).await?;

	if !current.is_live() {
		return Err(Error::NotFound(store::record_missing(patch.record_id)));
	}

	let mut next = current.attributes.merged(&patch.patch);

	if let Some(name) = category_name {
		next.category_name = name;
	}

	let changes = record::change_summary(&current.attributes, &next);
	let Some(draft) = HistoryDraft::updated(&changes, &patch.editor) else {
		tx.commit().await?;

		return Ok(PatchOutcome::Unchanged(current));
	};

	let row: RecordRow = sqlx::query_as(
		"\
UPDATE records
SET
	category_id = $2,
	category_name = $3,
	size = $4,
	priority = $5,
	description = $6,
	updated_at = $7
WHERE record_id = $1
RETURNING *",
	)
	.bind(patch.record_id)
	.bind(next.category_id)
	.bind(next.category_name.as_str())
	.bind(next.size.as_str())
	.bind(next.priority.as_str())
	.bind(next.description.as_str())
	.bind(patch.now)
	.fetch_one(&mut *tx)
	.await?;
	let record = Record::try_from(row)?;
	let entry = insert_history(&mut tx, record.record_id, &draft, patch.now).await?;

	tx.commit().await?;

	Ok(PatchOutcome::Updated { record, entry })
}

async fn soft_delete_record(
	pool: &PgPool,
	record_id: i64,
	editor: &str,
	now: OffsetDateTime,
) -> Result<DeleteOutcome> {
	let mut tx = pool.begin().await?;
	let current = lock_record(&mut tx, record_id).await?;

	if !current.is_live() {
		tx.commit().await?;

		return Ok(DeleteOutcome::AlreadyDeleted(current));
	}

	let row: RecordRow = sqlx::query_as(
		"\
UPDATE records
SET is_deleted = true, deleted_at = $2, updated_at = $2
WHERE record_id = $1
RETURNING *",
	)
	.bind(record_id)
	.bind(now)
	.fetch_one(&mut *tx)
	.await?;

	sqlx::query(
		"\
INSERT INTO retired_numbers (sequence_number, retired_at)
VALUES ($1, $2)
ON CONFLICT (sequence_number) DO NOTHING",
	)
	.bind(current.sequence_number)
	.bind(now)
	.execute(&mut *tx)
	.await?;

	let record = Record::try_from(row)?;
	let draft = HistoryDraft::deleted(record.sequence_number, editor);
	let entry = insert_history(&mut tx, record_id, &draft, now).await?;

	tx.commit().await?;

	Ok(DeleteOutcome::Deleted { record, entry })
}

async fn purge_records(pool: &PgPool, record_ids: &[i64]) -> Result<PurgeReport> {
	let mut ids = record_ids.to_vec();

	ids.sort_unstable();
	ids.dedup();

	if ids.is_empty() {
		return Ok(PurgeReport::default());
	}

	let mut tx = pool.begin().await?;
	let rows: Vec<(i64, bool)> = sqlx::query_as(
		"\
SELECT record_id, is_deleted
FROM records
WHERE record_id = ANY($1)
ORDER BY record_id
FOR UPDATE",
	)
	.bind(ids.as_slice())
	.fetch_all(&mut *tx)
	.await?;

	if let Some(missing) = ids.iter().find(|id| !rows.iter().any(|(found, _)| found == *id)) {
		return Err(Error::NotFound(store::record_missing(*missing)));
	}

	let live: Vec<i64> =
		rows.iter().filter(|(_, is_deleted)| !is_deleted).map(|(id, _)| *id).collect();

	if !live.is_empty() {
		return Err(Error::Invariant(format!(
			"Records {live:?} are not soft-deleted and cannot be purged."
		)));
	}

	let history_entries = sqlx::query("DELETE FROM record_history WHERE record_id = ANY($1)")
		.bind(ids.as_slice())
		.execute(&mut *tx)
		.await?
		.rows_affected();
	let records = sqlx::query("DELETE FROM records WHERE record_id = ANY($1)")
		.bind(ids.as_slice())
		.execute(&mut *tx)
		.await?
		.rows_affected();

	tx.commit().await?;

	Ok(PurgeReport { records, history_entries })
}

async fn purge_all_deleted(pool: &PgPool) -> Result<PurgeReport> {
	let mut tx = pool.begin().await?;
	let history_entries = sqlx::query(
		"\
DELETE FROM record_history
WHERE record_id IN (SELECT record_id FROM records WHERE is_deleted)",
	)
	.execute(&mut *tx)
	.await?
	.rows_affected();
	let records = sqlx::query("DELETE FROM records WHERE is_deleted")
		.execute(&mut *tx)
		.await?
		.rows_affected();

	tx.commit().await?;

	Ok(PurgeReport { records, history_entries })
}

async fn insert_category(pool: &PgPool, name: &str, now: OffsetDateTime) -> Result<CategoryInsert> {
	let mut tx = pool.begin().await?;
	let existing: Option<CategoryRow> =
		sqlx::query_as("SELECT * FROM categories WHERE lower(name) = lower($1) FOR UPDATE")
			.bind(name)
			.fetch_optional(&mut *tx)
			.await?;
	let inserted = match existing {
		Some(row) if row.is_active =>
			return Err(Error::Conflict(store::category_exists(&row.name))),
		Some(row) => {
			let row: CategoryRow = sqlx::query_as(
				"\
UPDATE categories
SET is_active = true, name = $2
WHERE category_id = $1
RETURNING *",
			)
			.bind(row.category_id)
			.bind(name)
			.fetch_one(&mut *tx)
			.await?;

			CategoryInsert::Reactivated(row.into())
		},
		None => {
			let row: CategoryRow = sqlx::query_as(
				"INSERT INTO categories (name, created_at) VALUES ($1, $2) RETURNING *",
			)
			.bind(name)
			.bind(now)
			.fetch_one(&mut *tx)
			.await
			.map_err(|err| category_write_error(err, name))?;

			CategoryInsert::Created(row.into())
		},
	};

	tx.commit().await?;

	Ok(inserted)
}

async fn rename_category(
	pool: &PgPool,
	category_id: i64,
	new_name: &str,
) -> Result<CategoryRename> {
	let mut tx = pool.begin().await?;

	lock_active_category(&mut tx, category_id, CategoryLock::Update).await?;

	let clash: Option<String> = sqlx::query_scalar(
		"SELECT name FROM categories WHERE lower(name) = lower($1) AND category_id <> $2",
	)
	.bind(new_name)
	.bind(category_id)
	.fetch_optional(&mut *tx)
	.await?;

	if let Some(clash) = clash {
		return Err(Error::Conflict(store::category_exists(&clash)));
	}

	let row: CategoryRow =
		sqlx::query_as("UPDATE categories SET name = $2 WHERE category_id = $1 RETURNING *")
			.bind(category_id)
			.bind(new_name)
			.fetch_one(&mut *tx)
			.await
			.map_err(|err| category_write_error(err, new_name))?;
	let records_touched =
		sqlx::query("UPDATE records SET category_name = $2 WHERE category_id = $1")
			.bind(category_id)
			.bind(new_name)
			.execute(&mut *tx)
			.await?
			.rows_affected();

	tx.commit().await?;

	Ok(CategoryRename { category: row.into(), records_touched })
}

async fn deactivate_category(pool: &PgPool, category_id: i64) -> Result<Category> {
	let mut tx = pool.begin().await?;

	// Waits for open record writers on this category, so the count below sees their rows.
	lock_active_category(&mut tx, category_id, CategoryLock::Update).await?;

	let usage = live_usage(&mut tx, category_id).await?;

	if usage > 0 {
		return Err(Error::Invariant(store::category_in_use(usage)));
	}

	let row: CategoryRow = sqlx::query_as(
		"UPDATE categories SET is_active = false WHERE category_id = $1 RETURNING *",
	)
	.bind(category_id)
	.fetch_one(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(row.into())
}

async fn live_usage(conn: &mut PgConnection, category_id: i64) -> Result<i64> {
	let usage: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM records WHERE category_id = $1 AND NOT is_deleted",
	)
	.bind(category_id)
	.fetch_one(conn)
	.await?;

	Ok(usage)
}

async fn lock_record(conn: &mut PgConnection, record_id: i64) -> Result<Record> {
	let row: Option<RecordRow> =
		sqlx::query_as("SELECT * FROM records WHERE record_id = $1 FOR UPDATE")
			.bind(record_id)
			.fetch_optional(conn)
			.await?;
	let Some(row) = row else {
		return Err(Error::NotFound(store::record_missing(record_id)));
	};

	Record::try_from(row)
}

/// Row-locks an active category and returns its current name.
async fn lock_active_category(
	conn: &mut PgConnection,
	category_id: i64,
	lock: CategoryLock,
) -> Result<String> {
	let row: Option<(String, bool)> = sqlx::query_as(lock.select_sql())
		.bind(category_id)
		.fetch_optional(conn)
		.await?;

	match row {
		Some((name, true)) => Ok(name),
		_ => Err(Error::NotFound(store::category_missing(category_id))),
	}
}

async fn insert_history(
	conn: &mut PgConnection,
	record_id: i64,
	draft: &HistoryDraft,
	ts: OffsetDateTime,
) -> Result<HistoryEntry> {
	let row: HistoryRow = sqlx::query_as(
		"\
INSERT INTO record_history (record_id, action, editor, change_summary, ts)
VALUES ($1, $2, $3, $4, $5)
RETURNING *",
	)
	.bind(record_id)
	.bind(draft.action.as_str())
	.bind(draft.editor.as_str())
	.bind(draft.change_summary.as_str())
	.bind(ts)
	.fetch_one(conn)
	.await?;

	HistoryEntry::try_from(row)
}

fn push_record_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &RecordFilter) {
	if !filter.include_deleted {
		builder.push(" AND NOT is_deleted");
	}
	if let Some(sequence_number) = filter.sequence_number {
		builder.push(" AND sequence_number = ");
		builder.push_bind(sequence_number);
	}
	if let Some(name) = filter.category_name.as_deref() {
		builder.push(" AND lower(category_name) = lower(");
		builder.push_bind(name.trim().to_string());
		builder.push(")");
	}
	if let Some(size) = filter.size {
		builder.push(" AND size = ");
		builder.push_bind(size.as_str());
	}
	if let Some(priority) = filter.priority {
		builder.push(" AND priority = ");
		builder.push_bind(priority.as_str());
	}
	if let Some(needle) = filter.description_contains.as_deref() {
		builder.push(" AND strpos(lower(description), lower(");
		builder.push_bind(needle.to_string());
		builder.push(")) > 0");
	}
}

fn category_write_error(err: sqlx::Error, name: &str) -> Error {
	if is_unique_violation_on(&err, CATEGORY_NAME_KEY) {
		Error::Conflict(store::category_exists(name))
	} else {
		Error::Sqlx(err)
	}
}
