use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use webtrace_analysis::{ClusterAssignment, TraceClusterer};
use webtrace_config::WebtraceConfig;
use webtrace_core::EventLog;

use crate::cli::ClusterArgs;
use crate::input::load_event_log;
use crate::output::write_json;

const TOP_ACTIVITIES: usize = 5;

#[derive(Debug, Serialize)]
struct ClusterSummary<'a> {
    id: u32,
    size: usize,
    cases: Vec<&'a str>,
    top_activities: Vec<(String, usize)>,
}

pub fn run_cluster_command(
    workspace: &Path,
    config: &WebtraceConfig,
    args: ClusterArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let mut clustering = config.clustering.clone();
    if let Some(expansion) = args.expansion {
        clustering.expansion = expansion;
    }
    if let Some(inflation) = args.inflation {
        clustering.inflation = inflation;
    }

    let mut log = load_event_log(&args.input, &config.log)?;
    let clusterer = TraceClusterer::from_config(workspace, clustering);
    let assignment = clusterer.tag(&mut log).context("trace clustering failed")?;

    if let Some(path) = &args.out {
        let lines = log.table().to_json_lines().context("failed to serialize event log")?;
        fs::write(path, lines).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote clustered event log");
    }
    write_json(&summarize(&assignment, &log), out)
}

fn summarize<'a>(assignment: &'a ClusterAssignment, log: &EventLog) -> Vec<ClusterSummary<'a>> {
    assignment
        .sizes()
        .into_iter()
        .map(|(id, size)| {
            let mut top_activities = assignment.activity_counts(log.traces(), id);
            top_activities.truncate(TOP_ACTIVITIES);
            ClusterSummary {
                id,
                size,
                cases: assignment.members(id),
                top_activities,
            }
        })
        .collect()
}
