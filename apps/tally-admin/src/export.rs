use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use tally_domain::{record::RecordState, time_serde};
use tally_storage::models::Record;

const CSV_HEADER: &str = "record_id,sequence_number,category_id,category_name,size,priority,\
description,state,deleted_at,created_at,updated_at";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
	/// One JSON object per line.
	#[default]
	Jsonl,
	/// A single document with the export time and record count.
	Json,
	Csv,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
	#[serde(with = "time_serde")]
	exported_at: OffsetDateTime,
	record_count: usize,
	records: &'a [Record],
}

pub fn write_records<W>(
	out: &mut W,
	format: ExportFormat,
	records: &[Record],
	exported_at: OffsetDateTime,
) -> color_eyre::Result<()>
where
	W: Write,
{
	match format {
		ExportFormat::Jsonl =>
			for record in records {
				serde_json::to_writer(&mut *out, record)?;
				writeln!(out)?;
			},
		ExportFormat::Json => {
			let document = ExportDocument { exported_at, record_count: records.len(), records };

			serde_json::to_writer_pretty(&mut *out, &document)?;
			writeln!(out)?;
		},
		ExportFormat::Csv => {
			writeln!(out, "{CSV_HEADER}")?;

			for record in records {
				writeln!(out, "{}", csv_row(record)?)?;
			}
		},
	}

	Ok(())
}

fn csv_row(record: &Record) -> color_eyre::Result<String> {
	let attributes = &record.attributes;
	let (state, deleted_at) = match record.state {
		RecordState::Active => ("active", String::new()),
		RecordState::SoftDeleted { deleted_at } => ("soft_deleted", deleted_at.format(&Rfc3339)?),
	};
	let fields = [
		record.record_id.to_string(),
		record.sequence_number.to_string(),
		attributes.category_id.map(|id| id.to_string()).unwrap_or_default(),
		csv_escape(&attributes.category_name),
		attributes.size.to_string(),
		attributes.priority.to_string(),
		csv_escape(&attributes.description),
		state.to_string(),
		deleted_at,
		record.created_at.format(&Rfc3339)?,
		record.updated_at.format(&Rfc3339)?,
	];

	Ok(fields.join(","))
}

/// Quotes a field when it contains a delimiter, a quote, or a line break.
fn csv_escape(value: &str) -> String {
	if value.contains([',', '"', '\n', '\r']) {
		format!("\"{}\"", value.replace('"', "\"\""))
	} else {
		value.to_string()
	}
}
