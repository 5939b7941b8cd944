use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

static NULL: Value = Value::Null;

/// One cell of the tabular row source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(value) => value.trim().parse().ok(),
            Self::Null | Self::Bool(_) => None,
        }
    }

    /// Text form used for grouping keys and labels. Null has no key.
    pub fn to_key(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(value) => Some(value.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing cells read as null.
    pub fn get(&self, column: &str) -> &Value {
        self.0.get(column).unwrap_or(&NULL)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Rows in source order plus the ordered column schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Schema is the union of row keys in first-seen order.
    pub fn new(rows: Vec<Row>) -> Self {
        Self::with_columns(Vec::new(), rows)
    }

    pub fn with_columns(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let mut seen: HashSet<String> = columns.iter().cloned().collect();
        let mut columns = columns;
        for row in &rows {
            for column in row.columns() {
                if seen.insert(column.to_owned()) {
                    columns.push(column.to_owned());
                }
            }
        }
        Self { columns, rows }
    }

    /// Parses one JSON object per non-blank line.
    pub fn from_json_lines(raw: &str) -> Result<Self, CoreError> {
        let rows = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<Row>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rows))
    }

    pub fn to_json_lines(&self) -> Result<String, CoreError> {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&serde_json::to_string(row)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|existing| existing == column)
    }

    pub fn require_column(&self, column: &str) -> Result<(), CoreError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(CoreError::Schema {
                attribute: column.to_owned(),
            })
        }
    }

    pub fn filter(&self, predicate: impl Fn(&Row) -> bool) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(row))
                .cloned()
                .collect(),
        }
    }

    /// Sets `column` on every row, adding it to the schema when new.
    pub fn set_column(&mut self, column: &str, mut value_for: impl FnMut(usize, &Row) -> Value) {
        if !self.has_column(column) {
            self.columns.push(column.to_owned());
        }
        for (index, row) in self.rows.iter_mut().enumerate() {
            let value = value_for(index, row);
            row.insert(column, value);
        }
    }

    /// Occurrences of every non-null value of `column`, most frequent first.
    pub fn value_counts(&self, column: &str) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for row in &self.rows {
            if let Some(key) = row.get(column).to_key() {
                let count = counts.entry(key.clone()).or_insert(0);
                if *count == 0 {
                    order.push(key);
                }
                *count += 1;
            }
        }

        let mut result: Vec<(String, usize)> = order
            .into_iter()
            .map(|key| {
                let count = counts[&key];
                (key, count)
            })
            .collect();
        result.sort_by(|left, right| right.1.cmp(&left.1));
        result
    }
}

/// Keeps only rows whose case has at least `min_len` rows.
pub fn filter_by_session_length(
    table: &Table,
    case_attr: &str,
    min_len: usize,
) -> Result<Table, CoreError> {
    table.require_column(case_attr)?;

    let mut sizes: HashMap<String, usize> = HashMap::new();
    for row in table.rows() {
        if let Some(case_id) = row.get(case_attr).to_key() {
            *sizes.entry(case_id).or_insert(0) += 1;
        }
    }

    let filtered = table.filter(|row| {
        row.get(case_attr)
            .to_key()
            .and_then(|case_id| sizes.get(&case_id))
            .is_some_and(|size| *size >= min_len)
    });
    tracing::debug!(
        case_attr,
        min_len,
        before = table.len(),
        after = filtered.len(),
        "filtered rows by session length"
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(case_id: &str, activity: &str) -> Row {
        [("case", Value::from(case_id)), ("activity", Value::from(activity))]
            .into_iter()
            .collect()
    }

    #[test]
    fn value_deserializes_untagged_json() {
        let row: Row = serde_json::from_str(
            r#"{"a": null, "b": true, "c": 42, "d": 1.5, "e": "text"}"#,
        )
        .expect("parse row");

        assert_eq!(row.get("a"), &Value::Null);
        assert_eq!(row.get("b"), &Value::Bool(true));
        assert_eq!(row.get("c"), &Value::Integer(42));
        assert_eq!(row.get("d"), &Value::Float(1.5));
        assert_eq!(row.get("e"), &Value::from("text"));
        assert_eq!(row.get("missing"), &Value::Null);
        assert_eq!(Value::Integer(7).to_key().as_deref(), Some("7"));
        assert_eq!(Value::Null.to_key(), None);
    }

    #[test]
    fn schema_is_union_of_row_keys_in_first_seen_order() {
        let mut second = row("2", "b");
        second.insert("path", "/x");
        let table = Table::with_columns(vec!["case".to_owned()], vec![row("1", "a"), second]);

        assert_eq!(table.columns(), ["case", "activity", "path"]);
        assert!(table.require_column("path").is_ok());
        assert!(matches!(
            table.require_column("timestamp"),
            Err(CoreError::Schema { attribute }) if attribute == "timestamp"
        ));
    }

    #[test]
    fn session_length_filter_drops_short_cases() {
        let table = Table::new(vec![
            row("1", "a"),
            row("2", "a"),
            row("1", "b"),
            row("3", "c"),
            row("3", "d"),
            row("3", "e"),
        ]);

        let filtered = filter_by_session_length(&table, "case", 2).expect("filter");

        let cases: Vec<String> = filtered
            .rows()
            .iter()
            .filter_map(|row| row.get("case").to_key())
            .collect();
        assert_eq!(cases, vec!["1", "1", "3", "3", "3"]);
        assert!(filter_by_session_length(&table, "visit", 2).is_err());
    }

    #[test]
    fn value_counts_orders_by_frequency_then_first_seen() {
        let table = Table::new(vec![
            row("1", "b"),
            row("1", "a"),
            row("2", "a"),
            row("2", "c"),
        ]);

        assert_eq!(
            table.value_counts("activity"),
            vec![
                ("a".to_owned(), 2),
                ("b".to_owned(), 1),
                ("c".to_owned(), 1)
            ]
        );
    }

    #[test]
    fn json_lines_round_trip_preserves_rows() {
        let raw = "{\"case\":\"1\",\"n\":3}\n\n{\"case\":\"2\",\"n\":null}\n";
        let table = Table::from_json_lines(raw).expect("parse json lines");

        assert_eq!(table.len(), 2);
        let rendered = table.to_json_lines().expect("render");
        let reparsed = Table::from_json_lines(&rendered).expect("reparse");
        assert_eq!(reparsed, table);
    }
}
