use crate::{Error, Result, TallyService};
use tally_domain::numbering;
use tally_storage::{
	models::{HistoryEntry, Record},
	store::NewRecord,
};

/// A committed insert together with the number of attempts it took.
#[derive(Clone, Debug)]
pub struct Allocation {
	pub record: Record,
	pub entry: HistoryEntry,
	pub attempts: u32,
}

impl TallyService {
	/// Lowest number not currently held. Only a preview; a concurrent create may take it first.
	pub async fn peek_next(&self) -> Result<i64> {
		let held = self.store.held_numbers(self.policy()).await?;

		Ok(numbering::lowest_free(held))
	}

	/// Inserts `new` under the lowest free number, recomputing and retrying when a concurrent
	/// writer commits the same number first.
	pub async fn allocate_and_insert(&self, new: NewRecord) -> Result<Allocation> {
		let policy = self.policy();
		let max_attempts = self.cfg.numbering.max_attempts.max(1);

		for attempt in 1..=max_attempts {
			match self.store.insert_numbered(policy, new.clone()).await {
				Ok((record, entry)) => {
					tracing::info!(
						record_id = record.record_id,
						sequence_number = record.sequence_number,
						attempt,
						policy = policy.as_str(),
						"Record created."
					);

					return Ok(Allocation { record, entry, attempts: attempt });
				},
				Err(tally_storage::Error::SequenceCollision { sequence_number }) => {
					tracing::warn!(
						sequence_number,
						attempt,
						max_attempts,
						"Sequence number taken by a concurrent writer."
					);
				},
				Err(err) => return Err(err.into()),
			}
		}

		Err(Error::Conflict {
			message: format!(
				"Could not allocate a sequence number after {max_attempts} attempts. Try again."
			),
		})
	}
}
