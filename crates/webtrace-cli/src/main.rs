use anyhow::{Context, Result};
use webtrace_cli::cli::{Cli, Commands, parse_cli};
use webtrace_cli::cluster::run_cluster_command;
use webtrace_cli::convert::run_convert_command;
use webtrace_cli::logging::init_tracing;
use webtrace_cli::matrices::run_matrices_command;
use webtrace_cli::outliers::run_outliers_command;
use webtrace_cli::stats::run_stats_command;
use webtrace_cli::tree::run_tree_command;
use webtrace_config::{config_path, ensure_workspace_config, validate_config};

fn main() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.log_format, cli.verbose)?;
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;

    let config = ensure_workspace_config(&workspace).with_context(|| {
        format!(
            "failed to load or create workspace config at {}",
            config_path(&workspace).display()
        )
    })?;
    for warning in validate_config(&config) {
        tracing::warn!(code = warning.code, "config warning: {}", warning.message);
    }

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Tree(args) => run_tree_command(&config.hierarchy, args, &mut out),
        Commands::Convert(args) => run_convert_command(&config, args, &mut out),
        Commands::Matrices(args) => run_matrices_command(&config.log, args, &mut out),
        Commands::Cluster(args) => run_cluster_command(&workspace, &config, args, &mut out),
        Commands::Outliers(args) => run_outliers_command(&workspace, &config, args, &mut out),
        Commands::Stats(args) => run_stats_command(&config.log, args, &mut out),
    }
}
