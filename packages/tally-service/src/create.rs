use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{CategoryRef, Error, RecordOp, Result, TallyService};
use tally_domain::{
	numbering,
	record::{Attributes, BoxSize, Priority},
};
use tally_storage::{models::Record, store::NewRecord};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateRequest {
	pub category: CategoryRef,
	pub size: BoxSize,
	pub priority: Priority,
	#[serde(default)]
	pub description: String,
	pub editor: String,
	/// The number shown to the user before submitting, if any.
	#[serde(default)]
	pub previewed_number: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateResponse {
	pub record: Record,
	pub sequence_number: i64,
	pub op: RecordOp,
	pub previewed_number: Option<i64>,
	/// Set when the committed number differs from the previewed one.
	pub stale_preview: bool,
	pub category_created: bool,
	pub attempts: u32,
}

impl TallyService {
	pub async fn create(&self, req: CreateRequest) -> Result<CreateResponse> {
		let editor = crate::require_editor(&req.editor)?;

		if let Some(previewed) = req.previewed_number
			&& !numbering::is_valid_number(previewed)
		{
			return Err(Error::validation("previewed_number must be positive."));
		}

		let category = self.resolve_category(&req.category).await?;
		let new = NewRecord {
			attributes: Attributes::new(
				category.assignment,
				req.size,
				req.priority,
				req.description.trim(),
			),
			editor,
			now: OffsetDateTime::now_utc(),
		};
		let allocation = self.allocate_and_insert(new).await?;
		let sequence_number = allocation.record.sequence_number;
		let stale_preview =
			req.previewed_number.is_some_and(|previewed| previewed != sequence_number);

		if stale_preview {
			tracing::info!(
				previewed_number = req.previewed_number,
				sequence_number,
				"Previewed number was taken; record saved under the next free number."
			);
		}

		Ok(CreateResponse {
			record: allocation.record,
			sequence_number,
			op: RecordOp::Create,
			previewed_number: req.previewed_number,
			stale_preview,
			category_created: category.created,
			attempts: allocation.attempts,
		})
	}
}
