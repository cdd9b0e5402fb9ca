use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result, TallyService};
use tally_domain::{category, record::CategoryAssignment};
use tally_storage::{
	models::{Category, CategoryUsage},
	store::CategoryInsert,
};

/// Names a category either by id or by (case-insensitive) name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
	Id(i64),
	Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryOp {
	Created,
	Reactivated,
}

#[derive(Clone, Debug, Serialize)]
pub struct AddCategoryResponse {
	pub category: Category,
	pub op: CategoryOp,
}

#[derive(Clone, Debug, Serialize)]
pub struct RenameCategoryResponse {
	pub category: Category,
	pub records_touched: u64,
}

/// A category resolved for a record write.
pub(crate) struct ResolvedCategory {
	pub(crate) assignment: CategoryAssignment,
	pub(crate) created: bool,
}

impl TallyService {
	pub async fn add_category(&self, name: &str) -> Result<AddCategoryResponse> {
		let name = normalize(name)?;
		let inserted = self.store.insert_category(&name, OffsetDateTime::now_utc()).await?;
		let response = match inserted {
			CategoryInsert::Created(category) =>
				AddCategoryResponse { category, op: CategoryOp::Created },
			CategoryInsert::Reactivated(category) =>
				AddCategoryResponse { category, op: CategoryOp::Reactivated },
		};

		tracing::info!(
			category_id = response.category.category_id,
			op = ?response.op,
			"Category added."
		);

		Ok(response)
	}

	pub async fn rename_category(
		&self,
		category_id: i64,
		new_name: &str,
	) -> Result<RenameCategoryResponse> {
		let new_name = normalize(new_name)?;
		let renamed = self.store.rename_category(category_id, &new_name).await?;

		tracing::info!(category_id, records_touched = renamed.records_touched, "Category renamed.");

		Ok(RenameCategoryResponse {
			category: renamed.category,
			records_touched: renamed.records_touched,
		})
	}

	/// Deactivates a category that no live record uses.
	pub async fn delete_category(&self, category_id: i64) -> Result<Category> {
		let category = self.store.deactivate_category(category_id).await?;

		tracing::info!(category_id, "Category deleted.");

		Ok(category)
	}

	/// Live records filed under the category.
	pub async fn usage_count(&self, category_id: i64) -> Result<i64> {
		Ok(self.store.category_usage(category_id).await?)
	}

	pub async fn list_categories(&self) -> Result<Vec<CategoryUsage>> {
		Ok(self.store.list_categories().await?)
	}

	pub(crate) async fn resolve_category(
		&self,
		category: &CategoryRef,
	) -> Result<ResolvedCategory> {
		match category {
			CategoryRef::Id(category_id) => {
				let found = self.store.find_category(*category_id).await?;
				let Some(found) = found.filter(|c| c.is_active) else {
					return Err(Error::NotFound {
						message: format!("Category {category_id} was not found."),
					});
				};

				Ok(ResolvedCategory { assignment: assignment(found), created: false })
			},
			CategoryRef::Name(raw) => {
				let name = normalize(raw)?;

				if let Some(found) = self.store.find_category_by_name(&name).await?
					&& found.is_active
				{
					return Ok(ResolvedCategory { assignment: assignment(found), created: false });
				}
				if !self.cfg.categories.auto_create {
					return Err(Error::NotFound {
						message: format!("Category {name:?} does not exist."),
					});
				}

				match self.store.insert_category(&name, OffsetDateTime::now_utc()).await {
					Ok(inserted) => {
						tracing::info!(
							category_id = inserted.category().category_id,
							"Category created for a record write."
						);

						Ok(ResolvedCategory {
							assignment: assignment(inserted.category().clone()),
							created: true,
						})
					},
					// A concurrent writer created it between the lookup and the insert.
					Err(tally_storage::Error::Conflict(_)) => {
						let Some(found) = self.store.find_category_by_name(&name).await? else {
							return Err(Error::Conflict {
								message: format!("Category {name:?} changed concurrently."),
							});
						};

						Ok(ResolvedCategory { assignment: assignment(found), created: false })
					},
					Err(err) => Err(err.into()),
				}
			},
		}
	}
}

fn normalize(raw: &str) -> Result<String> {
	category::normalize_name(raw).map_err(|rejection| Error::validation(rejection.to_string()))
}

fn assignment(category: Category) -> CategoryAssignment {
	CategoryAssignment { category_id: category.category_id, name: category.name }
}
