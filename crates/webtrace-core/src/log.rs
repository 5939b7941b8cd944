use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::mapping::{AttributeMapping, TimestampFormat};
use crate::table::{Row, Table, Value};
use crate::{CaseId, CoreError};

const DEFAULT_CLUSTER_ATTR: &str = "cluster";

/// One observed action, derived from a single source row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub case_id: CaseId,
    pub activity: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub row: usize,
}

impl Event {
    fn from_row(
        index: usize,
        row: &Row,
        mapping: &AttributeMapping,
        timestamp_format: &TimestampFormat,
    ) -> Result<Self, CoreError> {
        let case_id = required_key(index, row, &mapping.case_id_attr)?;
        let activity = required_key(index, row, &mapping.activity_attr)?;

        let raw_timestamp = row.get(&mapping.timestamp_attr);
        let timestamp =
            timestamp_format
                .parse(raw_timestamp)
                .ok_or_else(|| CoreError::Timestamp {
                    row: index,
                    value: raw_timestamp.to_string(),
                })?;

        let duration_ms = mapping
            .duration_attr
            .as_deref()
            .and_then(|attr| row.get(attr).as_f64());
        let resources = mapping
            .resource_attrs
            .iter()
            .map(|attr| (attr.clone(), row.get(attr).clone()))
            .collect();
        let path = mapping
            .path_attr
            .as_deref()
            .and_then(|attr| row.get(attr).to_key());

        Ok(Self {
            case_id,
            activity,
            timestamp,
            duration_ms,
            resources,
            path,
            row: index,
        })
    }

    pub fn duration(&self) -> Option<TimeDelta> {
        self.duration_ms
            .and_then(|ms| TimeDelta::try_milliseconds(ms.round() as i64))
    }
}

fn required_key(index: usize, row: &Row, attribute: &str) -> Result<String, CoreError> {
    row.get(attribute)
        .to_key()
        .ok_or_else(|| CoreError::MissingValue {
            row: index,
            attribute: attribute.to_owned(),
        })
}

/// Time-ordered, non-empty sequence of events of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    case_id: CaseId,
    events: Vec<Event>,
}

impl Trace {
    pub fn new(case_id: impl Into<CaseId>, events: Vec<Event>) -> Result<Self, CoreError> {
        let case_id = case_id.into();
        if events.is_empty() {
            return Err(CoreError::EmptyTrace { case_id });
        }
        if let Some(stranger) = events.iter().find(|event| event.case_id != case_id) {
            return Err(CoreError::CaseMismatch {
                expected: case_id,
                found: stranger.case_id.clone(),
            });
        }
        Ok(Self { case_id, events })
    }

    pub fn id(&self) -> &str {
        &self.case_id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn activities(&self) -> Vec<&str> {
        self.events
            .iter()
            .map(|event| event.activity.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always false for a constructed trace.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.events[0].timestamp
    }

    pub fn time_passed(&self, reference: DateTime<Utc>) -> TimeDelta {
        reference - self.start_time()
    }

    /// Span from the first event to the end of the last one.
    pub fn duration(&self) -> TimeDelta {
        let last = &self.events[self.events.len() - 1];
        self.time_passed(last.timestamp) + last.duration().unwrap_or_else(TimeDelta::zero)
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]  {}", self.case_id, self.activities().join(" -> "))
    }
}

/// Rows plus attribute mapping; traces are a derived view over the rows.
#[derive(Debug, Clone)]
pub struct EventLog {
    table: Table,
    mapping: AttributeMapping,
    timestamp_format: TimestampFormat,
    cluster_attr: String,
    traces: Vec<Trace>,
    case_index: HashMap<CaseId, usize>,
}

impl EventLog {
    pub fn new(
        table: Table,
        mapping: AttributeMapping,
        timestamp_format: TimestampFormat,
    ) -> Result<Self, CoreError> {
        let mut log = Self {
            table,
            mapping,
            timestamp_format,
            cluster_attr: DEFAULT_CLUSTER_ATTR.to_owned(),
            traces: Vec::new(),
            case_index: HashMap::new(),
        };
        log.derive_traces()?;
        Ok(log)
    }

    pub fn with_cluster_attr(mut self, attr: impl Into<String>) -> Self {
        self.cluster_attr = attr.into();
        self
    }

    /// Replaces the attribute mapping and regroups the rows.
    pub fn remap(&mut self, mapping: AttributeMapping) -> Result<(), CoreError> {
        let previous = std::mem::replace(&mut self.mapping, mapping);
        if let Err(err) = self.derive_traces() {
            self.mapping = previous;
            self.derive_traces()?;
            return Err(err);
        }
        Ok(())
    }

    fn derive_traces(&mut self) -> Result<(), CoreError> {
        for attribute in self.mapping.declared() {
            self.table.require_column(attribute)?;
        }

        let mut case_index: HashMap<CaseId, usize> = HashMap::new();
        let mut groups: Vec<(CaseId, Vec<Event>)> = Vec::new();
        for (index, row) in self.table.rows().iter().enumerate() {
            let event = Event::from_row(index, row, &self.mapping, &self.timestamp_format)?;
            let slot = *case_index.entry(event.case_id.clone()).or_insert_with(|| {
                groups.push((event.case_id.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(event);
        }

        self.traces = groups
            .into_iter()
            .map(|(case_id, events)| Trace::new(case_id, events))
            .collect::<Result<Vec<_>, _>>()?;
        self.case_index = case_index;
        tracing::debug!(
            rows = self.table.len(),
            traces = self.traces.len(),
            "derived traces from event rows"
        );
        Ok(())
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn mapping(&self) -> &AttributeMapping {
        &self.mapping
    }

    pub fn timestamp_format(&self) -> &TimestampFormat {
        &self.timestamp_format
    }

    pub fn case_id_attr(&self) -> &str {
        &self.mapping.case_id_attr
    }

    pub fn activity_attr(&self) -> &str {
        &self.mapping.activity_attr
    }

    pub fn cluster_attr(&self) -> &str {
        &self.cluster_attr
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn traces_where(&self, predicate: impl Fn(&Trace) -> bool) -> Vec<&Trace> {
        self.traces.iter().filter(|trace| predicate(trace)).collect()
    }

    pub fn trace(&self, case_id: &str) -> Option<&Trace> {
        self.case_index
            .get(case_id)
            .map(|index| &self.traces[*index])
    }

    /// Distinct activity labels in first-seen row order.
    pub fn unique_activities(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut activities = Vec::new();
        let mut events: Vec<&Event> = self.traces.iter().flat_map(Trace::iter).collect();
        events.sort_by_key(|event| event.row);
        for event in events {
            if seen.insert(event.activity.as_str()) {
                activities.push(event.activity.clone());
            }
        }
        activities
    }

    /// New log over the rows accepted by `mask`, with the same mapping.
    pub fn project(&self, mask: impl Fn(&Row) -> bool) -> Result<Self, CoreError> {
        let log = Self::new(
            self.table.filter(mask),
            self.mapping.clone(),
            self.timestamp_format.clone(),
        )?;
        Ok(log.with_cluster_attr(self.cluster_attr.clone()))
    }

    /// Writes the cluster column; cases missing from the map get null.
    pub fn set_clusters(&mut self, case_to_cluster: &HashMap<CaseId, u32>) -> Result<(), CoreError> {
        let case_attr = self.mapping.case_id_attr.clone();
        self.table
            .set_column(&self.cluster_attr, |_, row| {
                row.get(&case_attr)
                    .to_key()
                    .and_then(|case_id| case_to_cluster.get(&case_id))
                    .map(|cluster| Value::Integer(i64::from(*cluster)))
                    .unwrap_or(Value::Null)
            });
        self.derive_traces()
    }

    pub fn cluster_of(&self, case_id: &str) -> Option<u32> {
        let trace = self.trace(case_id)?;
        let row = &self.table.rows()[trace.events()[0].row];
        match row.get(&self.cluster_attr) {
            Value::Integer(cluster) => u32::try_from(*cluster).ok(),
            _ => None,
        }
    }

    pub fn time_passed_since_start(&self, event: &Event) -> Option<TimeDelta> {
        self.trace(&event.case_id)
            .map(|trace| trace.time_passed(event.timestamp))
    }

    /// Time since case start for every row, in row order.
    pub fn relative_times(&self) -> Vec<TimeDelta> {
        let mut times = vec![TimeDelta::zero(); self.table.len()];
        for trace in &self.traces {
            for event in trace {
                times[event.row] = trace.time_passed(event.timestamp);
            }
        }
        times
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Trace;
    type IntoIter = std::slice::Iter<'a, Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}
