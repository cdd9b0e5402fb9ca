use tally_config::NumberingPolicy;
use tally_domain::{
	history::HistoryAction,
	record::{Attributes, AttributesPatch, BoxSize, CategoryAssignment, Priority},
};
use tally_storage::{
	Error, RecordStore,
	memory::MemoryStore,
	models::Category,
	store::{CategoryInsert, DeleteOutcome, NewRecord, PatchOutcome, RecordFilter, RecordPatch},
};
use tally_testkit::fixed_now;

async fn seeded() -> (MemoryStore, Category) {
	let store = MemoryStore::with_categories(["General"], fixed_now());
	let general = store
		.find_category_by_name("general")
		.await
		.expect("Lookup failed.")
		.expect("Expected the seeded category.");

	(store, general)
}

fn new_record(category: &Category, description: &str) -> NewRecord {
	NewRecord {
		attributes: Attributes::new(
			CategoryAssignment { category_id: category.category_id, name: category.name.clone() },
			BoxSize::Small,
			Priority::Priority2,
			description,
		),
		editor: "tester".to_string(),
		now: fixed_now(),
	}
}

async fn insert(store: &MemoryStore, policy: NumberingPolicy, category: &Category) -> i64 {
	let (record, _) = store
		.insert_numbered(policy, new_record(category, "box"))
		.await
		.expect("Insert failed.");

	record.record_id
}

#[tokio::test]
async fn inserts_take_the_lowest_free_number_with_a_create_entry() {
	let (store, general) = seeded().await;
	let (first, entry) = store
		.insert_numbered(NumberingPolicy::RetireDeleted, new_record(&general, "Plates"))
		.await
		.expect("Insert failed.");

	assert_eq!(first.sequence_number, 1);
	assert_eq!(entry.action, HistoryAction::Create);
	assert_eq!(entry.change_summary, "Created box #1");
	assert_eq!(entry.record_id, first.record_id);

	let (second, _) = store
		.insert_numbered(NumberingPolicy::RetireDeleted, new_record(&general, "Cups"))
		.await
		.expect("Insert failed.");

	assert_eq!(second.sequence_number, 2);
}

#[tokio::test]
async fn soft_deleted_numbers_follow_the_policy() {
	let (store, general) = seeded().await;
	let mut ids = Vec::new();

	for _ in 0..3 {
		ids.push(insert(&store, NumberingPolicy::ReuseDeleted, &general).await);
	}

	store.soft_delete_record(ids[1], "tester", fixed_now()).await.expect("Delete failed.");

	assert_eq!(store.retired_numbers(), vec![2]);
	assert_eq!(
		store.held_numbers(NumberingPolicy::RetireDeleted).await.expect("Query failed."),
		vec![1, 2, 3]
	);
	assert_eq!(
		store.held_numbers(NumberingPolicy::ReuseDeleted).await.expect("Query failed."),
		vec![1, 3]
	);

	let (reused, _) = store
		.insert_numbered(NumberingPolicy::ReuseDeleted, new_record(&general, "again"))
		.await
		.expect("Insert failed.");

	assert_eq!(reused.sequence_number, 2);
}

#[tokio::test]
async fn retired_numbers_survive_purge() {
	let (store, general) = seeded().await;
	let first = insert(&store, NumberingPolicy::RetireDeleted, &general).await;

	insert(&store, NumberingPolicy::RetireDeleted, &general).await;
	store.soft_delete_record(first, "tester", fixed_now()).await.expect("Delete failed.");
	store.purge_records(&[first]).await.expect("Purge failed.");

	let (next, _) = store
		.insert_numbered(NumberingPolicy::RetireDeleted, new_record(&general, "new"))
		.await
		.expect("Insert failed.");

	assert_eq!(next.sequence_number, 3);
}

#[tokio::test]
async fn no_op_patch_writes_nothing() {
	let (store, general) = seeded().await;
	let record_id = insert(&store, NumberingPolicy::RetireDeleted, &general).await;
	let outcome = store
		.update_record(RecordPatch {
			record_id,
			patch: AttributesPatch { size: Some(BoxSize::Small), ..AttributesPatch::default() },
			editor: "tester".to_string(),
			now: fixed_now(),
		})
		.await
		.expect("Update failed.");

	assert!(matches!(outcome, PatchOutcome::Unchanged(_)));
	assert_eq!(store.record_history(record_id).await.expect("Query failed.").len(), 1);
}

#[tokio::test]
async fn updating_a_deleted_record_is_not_found() {
	let (store, general) = seeded().await;
	let record_id = insert(&store, NumberingPolicy::RetireDeleted, &general).await;

	store.soft_delete_record(record_id, "tester", fixed_now()).await.expect("Delete failed.");

	let err = store
		.update_record(RecordPatch {
			record_id,
			patch: AttributesPatch {
				priority: Some(Priority::Store),
				..AttributesPatch::default()
			},
			editor: "tester".to_string(),
			now: fixed_now(),
		})
		.await
		.expect_err("Expected NotFound.");

	assert!(matches!(err, Error::NotFound(_)), "Unexpected error: {err:?}");
}

#[tokio::test]
async fn repeated_delete_is_a_no_op() {
	let (store, general) = seeded().await;
	let record_id = insert(&store, NumberingPolicy::RetireDeleted, &general).await;

	store.soft_delete_record(record_id, "tester", fixed_now()).await.expect("Delete failed.");

	let again =
		store.soft_delete_record(record_id, "tester", fixed_now()).await.expect("Delete failed.");

	assert!(matches!(again, DeleteOutcome::AlreadyDeleted(_)));
	assert_eq!(store.record_history(record_id).await.expect("Query failed.").len(), 2);
}

#[tokio::test]
async fn purge_is_all_or_nothing() {
	let (store, general) = seeded().await;
	let deleted = insert(&store, NumberingPolicy::RetireDeleted, &general).await;
	let live = insert(&store, NumberingPolicy::RetireDeleted, &general).await;

	store.soft_delete_record(deleted, "tester", fixed_now()).await.expect("Delete failed.");

	let err = store.purge_records(&[deleted, live]).await.expect_err("Expected refusal.");

	assert!(matches!(err, Error::Invariant(_)), "Unexpected error: {err:?}");
	assert!(store.load_record(deleted).await.expect("Query failed.").is_some());

	let err = store.purge_records(&[deleted, 999]).await.expect_err("Expected NotFound.");

	assert!(matches!(err, Error::NotFound(_)), "Unexpected error: {err:?}");

	let report = store.purge_records(&[deleted]).await.expect("Purge failed.");

	assert_eq!(report.records, 1);
	assert_eq!(report.history_entries, 2);
	assert!(store.load_record(deleted).await.expect("Query failed.").is_none());
	assert!(store.record_history(deleted).await.expect("Query failed.").is_empty());
}

#[tokio::test]
async fn filters_select_matching_records() {
	let (store, general) = seeded().await;

	store
		.insert_numbered(NumberingPolicy::RetireDeleted, new_record(&general, "Winter Coats"))
		.await
		.expect("Insert failed.");

	let hidden = insert(&store, NumberingPolicy::RetireDeleted, &general).await;

	store.soft_delete_record(hidden, "tester", fixed_now()).await.expect("Delete failed.");

	let filter = RecordFilter {
		description_contains: Some("coats".to_string()),
		category_name: Some("GENERAL".to_string()),
		..RecordFilter::default()
	};
	let records = store.list_records(&filter).await.expect("Query failed.");

	assert_eq!(records.len(), 1);
	assert_eq!(records[0].attributes.description, "Winter Coats");
	assert_eq!(store.count_records(&RecordFilter::default()).await.expect("Query failed."), 1);

	let everything = RecordFilter { include_deleted: true, ..RecordFilter::default() };

	assert_eq!(store.count_records(&everything).await.expect("Query failed."), 2);
}

#[tokio::test]
async fn categories_are_unique_ignoring_case_and_reactivate() {
	let (store, general) = seeded().await;
	let err = store.insert_category("GENERAL", fixed_now()).await.expect_err("Expected conflict.");

	assert!(matches!(err, Error::Conflict(_)), "Unexpected error: {err:?}");

	store.deactivate_category(general.category_id).await.expect("Deactivate failed.");

	let inserted = store.insert_category("general", fixed_now()).await.expect("Insert failed.");

	assert!(matches!(inserted, CategoryInsert::Reactivated(_)));
	assert_eq!(inserted.category().category_id, general.category_id);
	assert!(inserted.category().is_active);
}

#[tokio::test]
async fn rename_cascades_and_deactivate_checks_usage() {
	let (store, general) = seeded().await;
	let record_id = insert(&store, NumberingPolicy::RetireDeleted, &general).await;
	let rename = store.rename_category(general.category_id, "Misc").await.expect("Rename failed.");

	assert_eq!(rename.records_touched, 1);
	assert_eq!(
		store
			.load_record(record_id)
			.await
			.expect("Query failed.")
			.expect("Missing record.")
			.attributes
			.category_name,
		"Misc"
	);

	let err = store.deactivate_category(general.category_id).await.expect_err("Expected refusal.");

	assert!(matches!(err, Error::Invariant(ref message) if message.contains("1 live")));

	let usage = store.list_categories().await.expect("Query failed.");

	assert_eq!(usage.len(), 1);
	assert_eq!(usage[0].usage_count, 1);
}

#[tokio::test]
async fn writes_take_the_category_name_current_at_commit() {
	let (store, general) = seeded().await;

	// `general` still carries the name resolved before the rename.
	store.rename_category(general.category_id, "Renamed").await.expect("Rename failed.");

	let (created, _) = store
		.insert_numbered(NumberingPolicy::RetireDeleted, new_record(&general, "Lamps"))
		.await
		.expect("Insert failed.");

	assert_eq!(created.attributes.category_name, "Renamed");

	let kitchen = store.insert_category("Kitchen", fixed_now()).await.expect("Insert failed.");
	let kitchen = kitchen.category().clone();

	store.rename_category(kitchen.category_id, "Pantry").await.expect("Rename failed.");

	let outcome = store
		.update_record(RecordPatch {
			record_id: created.record_id,
			patch: AttributesPatch {
				category: Some(CategoryAssignment {
					category_id: kitchen.category_id,
					name: kitchen.name.clone(),
				}),
				..AttributesPatch::default()
			},
			editor: "tester".to_string(),
			now: fixed_now(),
		})
		.await
		.expect("Update failed.");
	let PatchOutcome::Updated { record, entry } = outcome else {
		panic!("Expected an update.");
	};

	assert_eq!(record.attributes.category_name, "Pantry");
	assert_eq!(entry.change_summary, "Category: Renamed -> Pantry");
}
