use std::collections::BTreeMap;

use serde::Serialize;
use webtrace_core::{AttributeMapping, EventLog, Row, Table, TimestampFormat, Value};

use crate::RuleError;
use crate::rule::{Ruleset, entry_path};

const ACTIVITY_COLUMN: &str = "activity";
const PATH_COLUMN: &str = "path";

/// Raw web-log columns carried over into the event log, keyed by source name.
pub fn default_column_renames() -> BTreeMap<String, String> {
    [
        ("visitId", "visitId"),
        ("ua_starttime", "starttime"),
        ("ua_duration", "duration"),
        ("s_clientType", "clientType"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_owned(), to.to_owned()))
    .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub skipped_without_path: usize,
    pub skipped_unmatched: usize,
}

/// Turns raw web-log rows into an activity-labeled event log.
#[derive(Debug, Clone)]
pub struct WeblogConverter {
    ruleset: Ruleset,
    entry_attr: String,
    renames: BTreeMap<String, String>,
    mapping: AttributeMapping,
    timestamp_format: TimestampFormat,
}

impl WeblogConverter {
    pub fn new(ruleset: Ruleset, entry_attr: impl Into<String>) -> Self {
        Self {
            ruleset,
            entry_attr: entry_attr.into(),
            renames: default_column_renames(),
            mapping: AttributeMapping::new("visitId", ACTIVITY_COLUMN, "starttime")
                .with_duration("duration")
                .with_path(PATH_COLUMN),
            timestamp_format: TimestampFormat::UnixMillis,
        }
    }

    pub fn with_renames(mut self, renames: BTreeMap<String, String>) -> Self {
        self.renames = renames;
        self
    }

    /// Mapping of the produced log. Its activity and path roles are always
    /// the derived `activity` and `path` columns.
    pub fn with_mapping(mut self, mapping: AttributeMapping) -> Self {
        self.mapping = AttributeMapping {
            activity_attr: ACTIVITY_COLUMN.to_owned(),
            path_attr: Some(PATH_COLUMN.to_owned()),
            ..mapping
        };
        self
    }

    pub fn with_timestamp_format(mut self, timestamp_format: TimestampFormat) -> Self {
        self.timestamp_format = timestamp_format;
        self
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    pub fn convert(&self, raw: &Table) -> Result<(EventLog, ConversionReport), RuleError> {
        raw.require_column(&self.entry_attr)?;

        let mut report = ConversionReport {
            rows_in: raw.len(),
            ..ConversionReport::default()
        };
        let mut columns: Vec<String> = self
            .renames
            .iter()
            .filter(|(from, _)| raw.has_column(from))
            .map(|(_, to)| to.clone())
            .collect();
        columns.push(ACTIVITY_COLUMN.to_owned());
        columns.push(PATH_COLUMN.to_owned());

        let mut rows = Vec::with_capacity(raw.len());
        for (index, source) in raw.rows().iter().enumerate() {
            let entry = source.get(&self.entry_attr).to_string();
            let Some(path) = entry_path(&entry) else {
                tracing::warn!(row = index, entry = %entry, "skipping entry without path");
                report.skipped_without_path += 1;
                continue;
            };
            let activity = match self.ruleset.classify(path) {
                Ok(activity) => activity,
                Err(err) => {
                    tracing::warn!(row = index, error = %err, "skipping unclassified entry");
                    report.skipped_unmatched += 1;
                    continue;
                }
            };

            let mut row = Row::new();
            for (from, to) in &self.renames {
                if raw.has_column(from) {
                    row.insert(to.clone(), source.get(from).clone());
                }
            }
            row.insert(ACTIVITY_COLUMN, activity);
            row.insert(PATH_COLUMN, Value::from(path));
            rows.push(row);
        }
        report.rows_out = rows.len();

        let log = EventLog::new(
            Table::with_columns(columns, rows),
            self.mapping.clone(),
            self.timestamp_format.clone(),
        )?;
        tracing::info!(
            rows_in = report.rows_in,
            rows_out = report.rows_out,
            traces = log.traces().len(),
            "converted web log to event log"
        );
        Ok((log, report))
    }
}
