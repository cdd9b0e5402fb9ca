use serde::{Deserialize, Serialize};

use crate::{Error, Result, TallyService};
use tally_domain::{
	numbering,
	record::{BoxSize, Priority},
};
use tally_storage::{models::Record, store::RecordFilter};

const MAX_LIST_LIMIT: i64 = 1_000;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListRequest {
	#[serde(default)]
	pub sequence_number: Option<i64>,
	#[serde(default)]
	pub category_name: Option<String>,
	#[serde(default)]
	pub size: Option<BoxSize>,
	#[serde(default)]
	pub priority: Option<Priority>,
	#[serde(default)]
	pub description_contains: Option<String>,
	#[serde(default)]
	pub include_deleted: bool,
	#[serde(default)]
	pub limit: Option<i64>,
	#[serde(default)]
	pub offset: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ListResponse {
	pub records: Vec<Record>,
	/// Matching records ignoring limit and offset.
	pub total: i64,
}

impl TallyService {
	/// Records ordered by sequence number.
	pub async fn list(&self, req: ListRequest) -> Result<ListResponse> {
		let filter = record_filter(req)?;
		let records = self.store.list_records(&filter).await?;
		let total = self.store.count_records(&filter).await?;

		Ok(ListResponse { records, total })
	}

	pub async fn count(&self, req: ListRequest) -> Result<i64> {
		let filter = record_filter(req)?;

		Ok(self.store.count_records(&filter).await?)
	}
}

fn record_filter(req: ListRequest) -> Result<RecordFilter> {
	if let Some(sequence_number) = req.sequence_number
		&& !numbering::is_valid_number(sequence_number)
	{
		return Err(Error::validation("sequence_number must be positive."));
	}
	if let Some(limit) = req.limit
		&& !(1..=MAX_LIST_LIMIT).contains(&limit)
	{
		return Err(Error::validation(format!("limit must be between 1 and {MAX_LIST_LIMIT}.")));
	}

	let offset = req.offset.unwrap_or(0);

	if offset < 0 {
		return Err(Error::validation("offset must be zero or greater."));
	}

	Ok(RecordFilter {
		sequence_number: req.sequence_number,
		category_name: non_blank(req.category_name),
		size: req.size,
		priority: req.priority,
		description_contains: non_blank(req.description_contains),
		include_deleted: req.include_deleted,
		limit: req.limit,
		offset,
	})
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
