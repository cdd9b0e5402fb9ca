pub mod allocator;
pub mod categories;
pub mod create;
pub mod delete;
pub mod history;
pub mod list;
pub mod purge;
pub mod update;

mod error;

pub use allocator::Allocation;
pub use categories::{AddCategoryResponse, CategoryOp, CategoryRef, RenameCategoryResponse};
pub use create::{CreateRequest, CreateResponse};
pub use delete::{DeleteRequest, DeleteResponse};
pub use error::{Error, Result};
pub use history::HistoryResponse;
pub use list::{ListRequest, ListResponse};
pub use purge::{PurgeRequest, PurgeResponse};
pub use update::{UpdateRequest, UpdateResponse};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tally_config::{Config, NumberingPolicy};
use tally_storage::{RecordStore, db::Db};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordOp {
	Create,
	Update,
	Delete,
	None,
}

pub struct TallyService {
	pub cfg: Config,
	pub store: Arc<dyn RecordStore>,
}
impl TallyService {
	pub fn new(cfg: Config, store: Arc<dyn RecordStore>) -> Self {
		Self { cfg, store }
	}

	/// Connects to Postgres, bootstraps the schema, and seeds configured categories.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let db = Db::connect(&cfg.storage.postgres).await?;

		db.ensure_schema(&cfg.categories.seed).await?;

		Ok(Self::new(cfg, Arc::new(db)))
	}

	pub fn policy(&self) -> NumberingPolicy {
		self.cfg.numbering.policy
	}
}

pub(crate) fn require_editor(raw: &str) -> Result<String> {
	let editor = raw.trim();

	if editor.is_empty() {
		return Err(Error::validation("editor is required."));
	}

	Ok(editor.to_string())
}

pub(crate) fn require_record_id(record_id: i64) -> Result<()> {
	if record_id <= 0 {
		return Err(Error::validation(format!("record_id must be positive, got {record_id}.")));
	}

	Ok(())
}
