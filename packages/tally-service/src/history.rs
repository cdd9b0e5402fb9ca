use serde::Serialize;

use crate::{Error, Result, TallyService};
use tally_storage::models::HistoryEntry;

#[derive(Clone, Debug, Serialize)]
pub struct HistoryResponse {
	pub record_id: i64,
	/// Newest first.
	pub entries: Vec<HistoryEntry>,
}

impl TallyService {
	/// History of a record, including soft-deleted ones. Purged records have none.
	pub async fn history(&self, record_id: i64) -> Result<HistoryResponse> {
		if self.store.load_record(record_id).await?.is_none() {
			return Err(Error::NotFound { message: format!("Record {record_id} was not found.") });
		}

		let entries = self.store.record_history(record_id).await?;

		Ok(HistoryResponse { record_id, entries })
	}
}
