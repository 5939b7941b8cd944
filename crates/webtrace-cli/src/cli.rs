use std::ffi::OsStr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Tsv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MatrixKind {
    #[default]
    Footprint,
    Heuristic,
    Transitions,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct TreeArgs {
    #[arg(help = "JSON-lines file of raw web-log rows")]
    pub input: PathBuf,

    #[arg(long, help = "Column holding the raw entry text (defaults to [hierarchy].entry_attr)")]
    pub entry_attr: Option<String>,

    #[arg(long, help = "Stop at aggregation and pagination segments while building")]
    pub preprune: bool,

    #[arg(long, help = "Remove leaves visited fewer times (defaults to [hierarchy].min_count)")]
    pub min_count: Option<u64>,

    #[arg(
        long,
        help = "Promote nodes with more than this many children (defaults to [hierarchy].min_children)"
    )]
    pub min_children: Option<usize>,

    #[arg(long, help = "Write the mined ruleset as JSON to this file")]
    pub rules_out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ConvertArgs {
    #[arg(help = "JSON-lines file of raw web-log rows")]
    pub input: PathBuf,

    #[arg(long, help = "Ruleset JSON written by `webtrace tree --rules-out`")]
    pub rules: PathBuf,

    #[arg(long, help = "Column holding the raw entry text (defaults to [hierarchy].entry_attr)")]
    pub entry_attr: Option<String>,

    #[arg(long, help = "Write the event log here instead of stdout")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct MatricesArgs {
    #[arg(help = "JSON-lines event log")]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = MatrixKind::Footprint)]
    pub kind: MatrixKind,

    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct ClusterArgs {
    #[arg(help = "JSON-lines event log")]
    pub input: PathBuf,

    #[arg(long, help = "Markov clustering expansion, at least 2")]
    pub expansion: Option<u32>,

    #[arg(long, help = "Markov clustering inflation, at least 1")]
    pub inflation: Option<f64>,

    #[arg(long, help = "Write the event log with its cluster column to this file")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct OutliersArgs {
    #[arg(help = "JSON-lines event log")]
    pub input: PathBuf,

    #[arg(long)]
    pub min_cluster_size: Option<usize>,

    #[arg(long)]
    pub min_samples: Option<usize>,

    #[arg(long, help = "Flag traces scoring above this value (0..1)")]
    pub threshold: Option<f64>,

    #[arg(long, help = "Write the flagged traces as JSON to this file")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct StatsArgs {
    #[arg(help = "JSON-lines event log")]
    pub input: PathBuf,

    #[arg(long, default_value = "path", help = "Column counted for the top paths, when present")]
    pub path_attr: String,

    #[arg(long, default_value_t = 10)]
    pub top: usize,

    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Commands {
    /// Build the page hierarchy of raw web-log rows and mine activity rules
    Tree(TreeArgs),
    /// Label raw web-log rows with activities from a ruleset
    Convert(ConvertArgs),
    /// Print the footprint, heuristic or transition matrix of an event log
    Matrices(MatricesArgs),
    /// Group the traces of an event log with Markov clustering
    Cluster(ClusterArgs),
    /// Score traces with GLOSH and list the outliers
    Outliers(OutliersArgs),
    /// Summarize an event log
    Stats(StatsArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Process mining over web access logs")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .webtrace/config.toml"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[arg(long, global = true, help = "Log at debug level")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}
