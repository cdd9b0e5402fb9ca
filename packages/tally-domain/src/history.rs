use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
	Create,
	Update,
	Delete,
}
impl HistoryAction {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Create => "create",
			Self::Update => "update",
			Self::Delete => "delete",
		}
	}
}
impl fmt::Display for HistoryAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for HistoryAction {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"create" => Ok(Self::Create),
			"update" => Ok(Self::Update),
			"delete" => Ok(Self::Delete),
			other => Err(format!("Unknown history action {other:?}.")),
		}
	}
}

/// A history entry before the store has bound it to a row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryDraft {
	pub action: HistoryAction,
	pub editor: String,
	pub change_summary: String,
}
impl HistoryDraft {
	pub fn created(sequence_number: i64, editor: &str) -> Self {
		Self {
			action: HistoryAction::Create,
			editor: editor.to_string(),
			change_summary: format!("Created box #{sequence_number}"),
		}
	}

	/// `None` when there is nothing to record.
	pub fn updated(changes: &[String], editor: &str) -> Option<Self> {
		if changes.is_empty() {
			return None;
		}

		Some(Self {
			action: HistoryAction::Update,
			editor: editor.to_string(),
			change_summary: changes.join("\n"),
		})
	}

	pub fn deleted(sequence_number: i64, editor: &str) -> Self {
		Self {
			action: HistoryAction::Delete,
			editor: editor.to_string(),
			change_summary: format!("Deleted box #{sequence_number}"),
		}
	}
}
