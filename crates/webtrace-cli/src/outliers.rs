use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use webtrace_analysis::OutlierDetector;
use webtrace_config::WebtraceConfig;

use crate::cli::OutliersArgs;
use crate::input::load_event_log;
use crate::output::{write_json, write_json_file};

pub fn run_outliers_command(
    workspace: &Path,
    config: &WebtraceConfig,
    args: OutliersArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let mut outliers = config.outliers.clone();
    if let Some(min_cluster_size) = args.min_cluster_size {
        outliers.min_cluster_size = min_cluster_size;
    }
    if let Some(min_samples) = args.min_samples {
        outliers.min_samples = min_samples;
    }
    if let Some(threshold) = args.threshold {
        outliers.threshold = threshold.clamp(0.0, 1.0);
    }

    let log = load_event_log(&args.input, &config.log)?;
    let report = OutlierDetector::from_config(workspace, outliers)
        .detect(&log)
        .context("outlier detection failed")?;

    if let Some(path) = &args.out {
        write_json_file(&report.outliers, path)?;
        tracing::info!(path = %path.display(), outliers = report.outliers.len(), "wrote outliers");
    }
    write_json(&report, out)
}
