use serde::{Deserialize, Serialize};

use crate::{Error, Result, TallyService};
use tally_storage::store::PurgeReport;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurgeRequest {
	pub record_ids: Vec<i64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
	pub purged_records: u64,
	pub purged_history_entries: u64,
}
impl From<PurgeReport> for PurgeResponse {
	fn from(report: PurgeReport) -> Self {
		Self { purged_records: report.records, purged_history_entries: report.history_entries }
	}
}

impl TallyService {
	/// Physically removes soft-deleted records and their history. Irreversible.
	pub async fn purge(&self, req: PurgeRequest) -> Result<PurgeResponse> {
		if req.record_ids.is_empty() {
			return Err(Error::validation("record_ids must name at least one record."));
		}
		for record_id in &req.record_ids {
			crate::require_record_id(*record_id)?;
		}

		let report = self.store.purge_records(&req.record_ids).await?;

		tracing::warn!(
			records = report.records,
			history_entries = report.history_entries,
			"Purged soft-deleted records."
		);

		Ok(report.into())
	}

	pub async fn purge_all_deleted(&self) -> Result<PurgeResponse> {
		let report = self.store.purge_all_deleted().await?;

		tracing::warn!(
			records = report.records,
			history_entries = report.history_entries,
			"Purged all soft-deleted records."
		);

		Ok(report.into())
	}
}
