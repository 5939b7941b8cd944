use std::io::Write;

use anyhow::{Context, Result};
use webtrace_analysis::{footprint_from_transitions, heuristic_from_transitions, transition_matrix};
use webtrace_config::LogConfig;

use crate::cli::{MatricesArgs, MatrixKind, OutputFormat};
use crate::input::load_event_log;
use crate::output::{write_json, write_tsv};

pub fn run_matrices_command(config: &LogConfig, args: MatricesArgs, out: &mut dyn Write) -> Result<()> {
    let log = load_event_log(&args.input, config)?;
    let transitions = transition_matrix(&log);

    match (args.kind, args.format) {
        (MatrixKind::Transitions, OutputFormat::Json) => write_json(&transitions, out),
        (MatrixKind::Footprint, OutputFormat::Json) => {
            write_json(&footprint_from_transitions(&transitions), out)
        }
        (MatrixKind::Heuristic, OutputFormat::Json) => {
            write_json(&heuristic_from_transitions(&transitions), out)
        }
        (kind, OutputFormat::Tsv) => {
            let rows = match kind {
                MatrixKind::Transitions => transitions.to_table(),
                MatrixKind::Footprint => footprint_from_transitions(&transitions).to_table(),
                MatrixKind::Heuristic => {
                    let heuristic = heuristic_from_transitions(&transitions);
                    heuristic
                        .map_cells(|row, col| format!("{:.3}", heuristic.at(row, col)))
                        .to_table()
                }
            };
            write_tsv(&rows, out).context("failed to write matrix")
        }
    }
}
