use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{CategoryRef, Error, RecordOp, Result, TallyService};
use tally_domain::record::{AttributesPatch, BoxSize, Priority};
use tally_storage::{
	models::Record,
	store::{PatchOutcome, RecordPatch},
};

/// Partial update. Absent fields keep their stored value; the sequence number is never touched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateRequest {
	pub record_id: i64,
	#[serde(default)]
	pub category: Option<CategoryRef>,
	#[serde(default)]
	pub size: Option<BoxSize>,
	#[serde(default)]
	pub priority: Option<Priority>,
	#[serde(default)]
	pub description: Option<String>,
	pub editor: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdateResponse {
	pub record: Record,
	pub op: RecordOp,
	pub changes: Vec<String>,
}

impl TallyService {
	pub async fn update(&self, req: UpdateRequest) -> Result<UpdateResponse> {
		crate::require_record_id(req.record_id)?;

		let editor = crate::require_editor(&req.editor)?;

		// Reject writes to missing or deleted records before a category can be auto-created.
		let current = self.get(req.record_id).await?;
		let category = match req.category.as_ref() {
			Some(category) => Some(self.resolve_category(category).await?.assignment),
			None => None,
		};
		let patch = AttributesPatch {
			category,
			size: req.size,
			priority: req.priority,
			description: req.description.as_deref().map(|d| d.trim().to_string()),
		};

		if patch.is_empty() {
			return Ok(UpdateResponse { record: current, op: RecordOp::None, changes: Vec::new() });
		}

		let outcome = self
			.store
			.update_record(RecordPatch {
				record_id: req.record_id,
				patch,
				editor,
				now: OffsetDateTime::now_utc(),
			})
			.await?;

		match outcome {
			PatchOutcome::Unchanged(record) =>
				Ok(UpdateResponse { record, op: RecordOp::None, changes: Vec::new() }),
			PatchOutcome::Updated { record, entry } => {
				let changes: Vec<String> =
					entry.change_summary.lines().map(ToString::to_string).collect();

				tracing::info!(
					record_id = record.record_id,
					sequence_number = record.sequence_number,
					changes = changes.len(),
					"Record updated."
				);

				Ok(UpdateResponse { record, op: RecordOp::Update, changes })
			},
		}
	}

	/// A live record by id. Soft-deleted records are reported as missing.
	pub async fn get(&self, record_id: i64) -> Result<Record> {
		self.store
			.load_record(record_id)
			.await?
			.filter(Record::is_live)
			.ok_or_else(|| Error::NotFound {
				message: format!("Record {record_id} was not found."),
			})
	}
}
