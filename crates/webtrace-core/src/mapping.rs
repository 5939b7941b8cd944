use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table::Value;

/// Which columns play the case-id, activity, timestamp and optional roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMapping {
    pub case_id_attr: String,
    pub activity_attr: String,
    pub timestamp_attr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_attr: Option<String>,
    #[serde(default)]
    pub resource_attrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_attr: Option<String>,
}

impl Default for AttributeMapping {
    fn default() -> Self {
        Self::new("Case ID", "Activity", "Timestamp")
    }
}

impl AttributeMapping {
    pub fn new(
        case_id_attr: impl Into<String>,
        activity_attr: impl Into<String>,
        timestamp_attr: impl Into<String>,
    ) -> Self {
        Self {
            case_id_attr: case_id_attr.into(),
            activity_attr: activity_attr.into(),
            timestamp_attr: timestamp_attr.into(),
            duration_attr: None,
            resource_attrs: Vec::new(),
            path_attr: None,
        }
    }

    pub fn with_duration(mut self, attr: impl Into<String>) -> Self {
        self.duration_attr = Some(attr.into());
        self
    }

    pub fn with_resources(mut self, attrs: Vec<String>) -> Self {
        self.resource_attrs = attrs;
        self
    }

    pub fn with_path(mut self, attr: impl Into<String>) -> Self {
        self.path_attr = Some(attr.into());
        self
    }

    /// Every column name the mapping refers to.
    pub fn declared(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.case_id_attr.as_str()),
            Some(self.activity_attr.as_str()),
            Some(self.timestamp_attr.as_str()),
            self.duration_attr.as_deref(),
            self.path_attr.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(self.resource_attrs.iter().map(String::as_str))
    }

    /// Guesses a mapping from column names: case ids end in "id", activities
    /// contain "activity", timestamps contain "start". Each role falls back to
    /// the first column not taken yet.
    pub fn suggest(columns: &[String]) -> Option<Self> {
        let mut unmapped: Vec<&String> = columns.iter().collect();

        let case_id = take_matching(&mut unmapped, |name| name.ends_with("id"))?;
        let activity = take_matching(&mut unmapped, |name| name.contains("activity"))?;
        let timestamp = take_matching(&mut unmapped, |name| name.contains("start"))?;

        Some(Self::new(case_id, activity, timestamp))
    }
}

fn take_matching(unmapped: &mut Vec<&String>, predicate: impl Fn(&str) -> bool) -> Option<String> {
    if unmapped.is_empty() {
        return None;
    }
    let index = unmapped
        .iter()
        .position(|name| predicate(&name.to_lowercase()))
        .unwrap_or(0);
    Some(unmapped.remove(index).clone())
}

/// How the timestamp column is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "pattern")]
pub enum TimestampFormat {
    Rfc3339,
    #[default]
    UnixMillis,
    UnixSeconds,
    /// A chrono `strftime` pattern; date-only patterns resolve to midnight.
    Pattern(String),
}

impl TimestampFormat {
    pub fn parse(&self, value: &Value) -> Option<DateTime<Utc>> {
        match self {
            Self::UnixMillis => {
                let millis = value.as_f64()?;
                DateTime::from_timestamp_millis(millis.round() as i64)
            }
            Self::UnixSeconds => {
                let seconds = value.as_f64()?;
                let whole = seconds.floor();
                let nanos = ((seconds - whole) * 1e9).round() as u32;
                DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
            }
            Self::Rfc3339 => {
                let text = value.as_text()?;
                DateTime::parse_from_rfc3339(text.trim())
                    .ok()
                    .map(|parsed| parsed.with_timezone(&Utc))
            }
            Self::Pattern(pattern) => {
                let text = value.as_text()?.trim();
                NaiveDateTime::parse_from_str(text, pattern)
                    .ok()
                    .or_else(|| {
                        NaiveDate::parse_from_str(text, pattern)
                            .ok()
                            .and_then(|date| date.and_hms_opt(0, 0, 0))
                    })
                    .map(|naive| naive.and_utc())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn suggest_follows_column_name_heuristics() {
        let columns: Vec<String> = ["ua_name", "visitId", "starttime", "user activity"]
            .into_iter()
            .map(str::to_owned)
            .collect();

        let mapping = AttributeMapping::suggest(&columns).expect("mapping");

        assert_eq!(mapping.case_id_attr, "visitId");
        assert_eq!(mapping.activity_attr, "user activity");
        assert_eq!(mapping.timestamp_attr, "starttime");
    }

    #[test]
    fn suggest_falls_back_to_first_unmapped_column() {
        let columns: Vec<String> = ["a", "b", "c"].into_iter().map(str::to_owned).collect();

        let mapping = AttributeMapping::suggest(&columns).expect("mapping");

        assert_eq!(mapping.case_id_attr, "a");
        assert_eq!(mapping.activity_attr, "b");
        assert_eq!(mapping.timestamp_attr, "c");
        assert!(AttributeMapping::suggest(&columns[..2]).is_none());
    }

    #[test]
    fn declared_lists_optional_attributes_when_present() {
        let mapping = AttributeMapping::new("case", "activity", "ts")
            .with_duration("duration")
            .with_resources(vec!["client".to_owned()]);

        let declared: Vec<&str> = mapping.declared().collect();

        assert_eq!(declared, vec!["case", "activity", "ts", "duration", "client"]);
    }

    #[test]
    fn timestamp_formats_parse_expected_instants() {
        let millis = TimestampFormat::UnixMillis
            .parse(&Value::Integer(1_577_836_800_500))
            .expect("millis");
        assert_eq!(millis.timestamp(), 1_577_836_800);
        assert_eq!(millis.timestamp_subsec_millis(), 500);

        let seconds = TimestampFormat::UnixSeconds
            .parse(&Value::from("1577836800"))
            .expect("seconds");
        assert_eq!(seconds.year(), 2020);

        let rfc = TimestampFormat::Rfc3339
            .parse(&Value::from("2020-01-01T01:00:00+01:00"))
            .expect("rfc3339");
        assert_eq!(rfc.timestamp(), 1_577_836_800);

        let pattern = TimestampFormat::Pattern("%d-%m-%Y:%H.%M".to_owned())
            .parse(&Value::from("30-12-2010:11.02"))
            .expect("pattern");
        assert_eq!((pattern.day(), pattern.month(), pattern.hour()), (30, 12, 11));

        assert!(TimestampFormat::Rfc3339.parse(&Value::Integer(5)).is_none());
        assert!(TimestampFormat::UnixMillis.parse(&Value::Null).is_none());
    }
}
