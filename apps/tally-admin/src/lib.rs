pub mod export;

use std::{io, path::PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::eyre;
use serde::Serialize;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use crate::export::ExportFormat;

use tally_domain::record::{BoxSize, Priority};
use tally_service::{
	CategoryRef, CreateRequest, DeleteRequest, ListRequest, PurgeRequest, TallyService,
	UpdateRequest,
};

#[derive(Debug, Parser)]
#[command(
	version = tally_cli::VERSION,
	rename_all = "kebab",
	styles = tally_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Name recorded in the history log for mutations.
	#[arg(long, global = true, value_name = "NAME", default_value = "tally-admin")]
	pub editor: String,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Create missing tables and seed the configured categories.
	Init,
	/// Show the number the next record would most likely receive.
	Peek,
	/// Create a record under the lowest free number.
	Create(CreateArgs),
	/// Change attributes of a live record.
	Update(UpdateArgs),
	/// Soft-delete a record.
	Delete {
		#[arg(value_name = "RECORD_ID")]
		record_id: i64,
	},
	/// Permanently remove soft-deleted records and their history.
	Purge {
		#[arg(value_name = "RECORD_ID", required_unless_present = "all_deleted")]
		record_ids: Vec<i64>,
		#[arg(long, conflicts_with = "record_ids")]
		all_deleted: bool,
		/// Confirms the irreversible removal.
		#[arg(long)]
		yes: bool,
	},
	/// List records ordered by sequence number.
	List(ListArgs),
	/// Show the history of a record, newest first.
	History {
		#[arg(value_name = "RECORD_ID")]
		record_id: i64,
	},
	/// Write the records matching the list filters as JSON lines, a JSON document, or CSV.
	Export(ExportArgs),
	#[command(subcommand)]
	Category(CategoryCommand),
}

#[derive(Debug, ClapArgs)]
pub struct CreateArgs {
	#[arg(long, value_name = "NAME", required_unless_present = "category_id")]
	pub category: Option<String>,
	#[arg(long, value_name = "ID", conflicts_with = "category")]
	pub category_id: Option<i64>,
	#[arg(long)]
	pub size: BoxSize,
	#[arg(long)]
	pub priority: Priority,
	#[arg(long, default_value = "")]
	pub description: String,
	/// The number shown by `peek`; a mismatch is reported, not rejected.
	#[arg(long, value_name = "N")]
	pub expect_number: Option<i64>,
}

#[derive(Debug, ClapArgs)]
pub struct UpdateArgs {
	#[arg(value_name = "RECORD_ID")]
	pub record_id: i64,
	#[arg(long, value_name = "NAME", conflicts_with = "category_id")]
	pub category: Option<String>,
	#[arg(long, value_name = "ID")]
	pub category_id: Option<i64>,
	#[arg(long)]
	pub size: Option<BoxSize>,
	#[arg(long)]
	pub priority: Option<Priority>,
	#[arg(long)]
	pub description: Option<String>,
}

#[derive(Debug, ClapArgs)]
pub struct ListArgs {
	#[arg(long, value_name = "N")]
	pub number: Option<i64>,
	#[arg(long, value_name = "NAME")]
	pub category: Option<String>,
	#[arg(long)]
	pub size: Option<BoxSize>,
	#[arg(long)]
	pub priority: Option<Priority>,
	/// Case-insensitive substring of the description.
	#[arg(long, value_name = "TEXT")]
	pub search: Option<String>,
	#[arg(long)]
	pub include_deleted: bool,
	#[arg(long, value_name = "N")]
	pub limit: Option<i64>,
	#[arg(long, value_name = "N")]
	pub offset: Option<i64>,
}

#[derive(Debug, ClapArgs)]
pub struct ExportArgs {
	#[arg(long, value_enum, default_value_t = ExportFormat::Jsonl)]
	pub format: ExportFormat,
	#[command(flatten)]
	pub filter: ListArgs,
}

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
	/// Add a category, or reactivate a deleted one with the same name.
	Add { name: String },
	/// Rename a category and every record filed under it.
	Rename {
		#[arg(value_name = "CATEGORY_ID")]
		category_id: i64,
		new_name: String,
	},
	/// Delete a category no live record uses.
	Delete {
		#[arg(value_name = "CATEGORY_ID")]
		category_id: i64,
	},
	/// Count the live records filed under a category.
	Usage {
		#[arg(value_name = "CATEGORY_ID")]
		category_id: i64,
	},
	/// List active categories with their usage counts.
	List,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = tally_config::load(&args.config)?;
	init_tracing(&config)?;
	let service = TallyService::connect(config).await?;
	execute(&service, &args.editor, args.command).await
}

pub async fn execute(
	service: &TallyService,
	editor: &str,
	command: Command,
) -> color_eyre::Result<()> {
	match command {
		Command::Init => {
			tracing::info!("Schema is ready.");
			print_json(&service.list_categories().await?)
		},
		Command::Peek => {
			let next = service.peek_next().await?;
			println!("{next}");
			Ok(())
		},
		Command::Create(create) => {
			let category = category_ref(create.category, create.category_id)
				.ok_or_else(|| eyre::eyre!("--category or --category-id is required."))?;
			let created = service
				.create(CreateRequest {
					category,
					size: create.size,
					priority: create.priority,
					description: create.description,
					editor: editor.to_string(),
					previewed_number: create.expect_number,
				})
				.await?;
			if created.stale_preview {
				eprintln!(
					"Number {} was taken; the record was saved as #{}.",
					created.previewed_number.unwrap_or_default(),
					created.sequence_number
				);
			}
			print_json(&created)
		},
		Command::Update(update) => {
			let updated = service
				.update(UpdateRequest {
					record_id: update.record_id,
					category: category_ref(update.category, update.category_id),
					size: update.size,
					priority: update.priority,
					description: update.description,
					editor: editor.to_string(),
				})
				.await?;
			print_json(&updated)
		},
		Command::Delete { record_id } => {
			let deleted = service
				.soft_delete(DeleteRequest { record_id, editor: editor.to_string() })
				.await?;
			print_json(&deleted)
		},
		Command::Purge { record_ids, all_deleted, yes } => {
			if !yes {
				return Err(eyre::eyre!("Purge is irreversible. Pass --yes to confirm."));
			}
			let purged = if all_deleted {
				service.purge_all_deleted().await?
			} else {
				service.purge(PurgeRequest { record_ids }).await?
			};
			print_json(&purged)
		},
		Command::List(list) => print_json(&service.list(list_request(list)).await?),
		Command::History { record_id } => print_json(&service.history(record_id).await?),
		Command::Export(ExportArgs { format, filter }) => {
			let listed = service.list(list_request(filter)).await?;
			let mut out = io::stdout().lock();
			export::write_records(&mut out, format, &listed.records, OffsetDateTime::now_utc())?;
			tracing::info!(records = listed.records.len(), ?format, "Export finished.");
			Ok(())
		},
		Command::Category(CategoryCommand::Add { name }) =>
			print_json(&service.add_category(&name).await?),
		Command::Category(CategoryCommand::Rename { category_id, new_name }) =>
			print_json(&service.rename_category(category_id, &new_name).await?),
		Command::Category(CategoryCommand::Delete { category_id }) =>
			print_json(&service.delete_category(category_id).await?),
		Command::Category(CategoryCommand::Usage { category_id }) => {
			let usage = service.usage_count(category_id).await?;
			println!("{usage}");
			Ok(())
		},
		Command::Category(CategoryCommand::List) => print_json(&service.list_categories().await?),
	}
}

fn list_request(list: ListArgs) -> ListRequest {
	ListRequest {
		sequence_number: list.number,
		category_name: list.category,
		size: list.size,
		priority: list.priority,
		description_contains: list.search,
		include_deleted: list.include_deleted,
		limit: list.limit,
		offset: list.offset,
	}
}

fn category_ref(name: Option<String>, category_id: Option<i64>) -> Option<CategoryRef> {
	match (category_id, name) {
		(Some(category_id), _) => Some(CategoryRef::Id(category_id)),
		(None, Some(name)) => Some(CategoryRef::Name(name)),
		(None, None) => None,
	}
}

fn print_json<T>(value: &T) -> color_eyre::Result<()>
where
	T: Serialize,
{
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn init_tracing(config: &tally_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
	Ok(())
}
