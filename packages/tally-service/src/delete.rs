use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{RecordOp, Result, TallyService};
use tally_storage::store::DeleteOutcome;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteRequest {
	pub record_id: i64,
	pub editor: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
	pub record_id: i64,
	pub sequence_number: i64,
	pub op: RecordOp,
}

impl TallyService {
	/// Soft-deletes a record. Deleting an already deleted record changes nothing.
	pub async fn soft_delete(&self, req: DeleteRequest) -> Result<DeleteResponse> {
		crate::require_record_id(req.record_id)?;

		let editor = crate::require_editor(&req.editor)?;
		let outcome = self
			.store
			.soft_delete_record(req.record_id, &editor, OffsetDateTime::now_utc())
			.await?;

		match outcome {
			DeleteOutcome::AlreadyDeleted(record) => Ok(DeleteResponse {
				record_id: record.record_id,
				sequence_number: record.sequence_number,
				op: RecordOp::None,
			}),
			DeleteOutcome::Deleted { record, .. } => {
				tracing::info!(
					record_id = record.record_id,
					sequence_number = record.sequence_number,
					"Record soft-deleted."
				);

				Ok(DeleteResponse {
					record_id: record.record_id,
					sequence_number: record.sequence_number,
					op: RecordOp::Delete,
				})
			},
		}
	}
}
