use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use webtrace_config::{LogConfig, TimestampFormatKind};
use webtrace_core::{AttributeMapping, EventLog, Table, TimestampFormat, filter_by_session_length};

pub fn read_table(path: &Path) -> Result<Table> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let table = Table::from_json_lines(&raw)
        .with_context(|| format!("failed to parse JSON lines in {}", path.display()))?;
    tracing::debug!(path = %path.display(), rows = table.len(), "read rows");
    Ok(table)
}

pub fn timestamp_format(config: &LogConfig) -> Result<TimestampFormat> {
    Ok(match config.timestamp_format {
        TimestampFormatKind::Rfc3339 => TimestampFormat::Rfc3339,
        TimestampFormatKind::UnixMillis => TimestampFormat::UnixMillis,
        TimestampFormatKind::UnixSeconds => TimestampFormat::UnixSeconds,
        TimestampFormatKind::Pattern => match config.timestamp_pattern.as_deref() {
            Some(pattern) => TimestampFormat::Pattern(pattern.to_owned()),
            None => bail!("[log].timestamp_format is \"pattern\" but [log].timestamp_pattern is not set"),
        },
    })
}

pub fn attribute_mapping(config: &LogConfig) -> AttributeMapping {
    let mut mapping = AttributeMapping::new(
        config.case_id_attr.clone(),
        config.activity_attr.clone(),
        config.timestamp_attr.clone(),
    )
    .with_resources(config.resource_attrs.clone());
    if let Some(duration) = &config.duration_attr {
        mapping = mapping.with_duration(duration.clone());
    }
    mapping
}

/// Reads an event log and drops sessions shorter than `[log].min_session_length`.
pub fn load_event_log(path: &Path, config: &LogConfig) -> Result<EventLog> {
    let table = read_table(path)?;
    let mut mapping = attribute_mapping(config);
    if let Some(duration) = mapping.duration_attr.as_deref()
        && !table.has_column(duration)
    {
        tracing::debug!(column = duration, "event log has no duration column");
        mapping.duration_attr = None;
    }

    let table = filter_by_session_length(&table, &config.case_id_attr, config.min_session_length)
        .context("failed to filter short sessions")?;
    let log = EventLog::new(table, mapping, timestamp_format(config)?)
        .with_context(|| format!("failed to build event log from {}", path.display()))?
        .with_cluster_attr(config.cluster_attr.clone());
    tracing::info!(
        path = %path.display(),
        rows = log.len(),
        traces = log.traces().len(),
        "loaded event log"
    );
    Ok(log)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn short_sessions_are_dropped_and_missing_duration_is_tolerated() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("log.jsonl");
        fs::write(
            &path,
            concat!(
                "{\"visitId\":\"v1\",\"activity\":\"A\",\"starttime\":1000}\n",
                "{\"visitId\":\"v1\",\"activity\":\"B\",\"starttime\":2000}\n",
                "{\"visitId\":\"v2\",\"activity\":\"A\",\"starttime\":3000}\n",
            ),
        )
        .expect("write log");

        let log = load_event_log(&path, &LogConfig::default()).expect("load log");

        assert_eq!(log.traces().len(), 1);
        assert_eq!(log.traces()[0].id(), "v1");
        assert_eq!(log.mapping().duration_attr, None);
    }

    #[test]
    fn pattern_format_needs_a_pattern() {
        let config = LogConfig {
            timestamp_format: TimestampFormatKind::Pattern,
            timestamp_pattern: None,
            ..LogConfig::default()
        };

        assert!(timestamp_format(&config).is_err());
    }
}
