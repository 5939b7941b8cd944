use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use webtrace_config::WebtraceConfig;
use webtrace_rules::{Ruleset, WeblogConverter, default_column_renames};

use crate::cli::ConvertArgs;
use crate::input::{attribute_mapping, read_table, timestamp_format};

pub fn run_convert_command(config: &WebtraceConfig, args: ConvertArgs, out: &mut dyn Write) -> Result<()> {
    let raw_rules = fs::read_to_string(&args.rules)
        .with_context(|| format!("failed to read {}", args.rules.display()))?;
    let ruleset = Ruleset::from_json(&raw_rules)
        .with_context(|| format!("failed to parse ruleset {}", args.rules.display()))?;
    let entry_attr = args
        .entry_attr
        .unwrap_or_else(|| config.hierarchy.entry_attr.clone());

    let table = read_table(&args.input)?;

    let renames = default_column_renames();
    let mut mapping = attribute_mapping(&config.log);
    let has_duration = renames.iter().any(|(from, to)| {
        mapping.duration_attr.as_deref() == Some(to.as_str()) && table.has_column(from)
    });
    if !has_duration {
        mapping.duration_attr = None;
    }
    let converter = WeblogConverter::new(ruleset, entry_attr)
        .with_renames(renames)
        .with_mapping(mapping)
        .with_timestamp_format(timestamp_format(&config.log)?);
    let (log, report) = converter.convert(&table).context("failed to convert web-log rows")?;
    tracing::debug!(
        rows_in = report.rows_in,
        rows_out = report.rows_out,
        skipped_without_path = report.skipped_without_path,
        skipped_unmatched = report.skipped_unmatched,
        traces = log.traces().len(),
        "conversion report"
    );

    let lines = log.table().to_json_lines().context("failed to serialize event log")?;
    match args.out {
        Some(path) => {
            fs::write(&path, lines).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote event log");
        }
        None => out.write_all(lines.as_bytes()).context("failed to write event log")?,
    }
    Ok(())
}
