use std::io::Write;

use anyhow::{Context, Result};
use webtrace_config::LogConfig;
use webtrace_core::LogStatistics;

use crate::cli::{OutputFormat, StatsArgs};
use crate::input::load_event_log;
use crate::output::{write_json, write_tsv};

pub fn run_stats_command(config: &LogConfig, args: StatsArgs, out: &mut dyn Write) -> Result<()> {
    let log = load_event_log(&args.input, config)?;
    let path_attr = log
        .table()
        .has_column(&args.path_attr)
        .then_some(args.path_attr.as_str());
    let stats = LogStatistics::compute(&log, path_attr, args.top).context("failed to compute statistics")?;

    match args.format {
        OutputFormat::Json => write_json(&stats, out),
        OutputFormat::Tsv => write_tsv(&statistics_rows(&stats), out).context("failed to write statistics"),
    }
}

fn statistics_rows(stats: &LogStatistics) -> Vec<Vec<String>> {
    let mut rows = vec![
        vec!["metric".to_owned(), "value".to_owned()],
        vec!["rows".to_owned(), stats.row_count.to_string()],
        vec!["cases".to_owned(), stats.case_count.to_string()],
        vec!["activities".to_owned(), stats.activity_count.to_string()],
    ];
    if let Some(length) = &stats.trace_length {
        rows.push(vec!["trace_length_min".to_owned(), length.min.to_string()]);
        rows.push(vec!["trace_length_max".to_owned(), length.max.to_string()]);
        rows.push(vec!["trace_length_mean".to_owned(), format!("{:.2}", length.mean)]);
    }
    for (case_id, length) in &stats.longest_traces {
        rows.push(vec![format!("longest:{case_id}"), length.to_string()]);
    }
    if stats.distinct_paths > 0 {
        rows.push(vec!["distinct_paths".to_owned(), stats.distinct_paths.to_string()]);
    }
    for path in &stats.top_paths {
        rows.push(vec![format!("path:{}", path.path), path.count.to_string()]);
    }
    rows
}
