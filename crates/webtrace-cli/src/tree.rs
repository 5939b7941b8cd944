use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use webtrace_config::HierarchyConfig;
use webtrace_hierarchy::{BuildOptions, MiningOptions, PageTree};

use crate::cli::TreeArgs;
use crate::input::read_table;

pub fn run_tree_command(config: &HierarchyConfig, args: TreeArgs, out: &mut dyn Write) -> Result<()> {
    let mut config = config.clone();
    if args.preprune {
        config.pre_pruning = true;
    }
    if let Some(entry_attr) = args.entry_attr {
        config.entry_attr = entry_attr;
    }
    let min_count = args.min_count.unwrap_or(config.min_count);

    let table = read_table(&args.input)?;
    let options = BuildOptions::from_config(&config).context("invalid [hierarchy] patterns")?;
    let (mut tree, report) = PageTree::build_from_table(&table, &config.entry_attr, &options)
        .context("failed to build page hierarchy")?;
    let removed = tree.post_prune(min_count);

    let mut mining = MiningOptions::from_config(&config).context("invalid promotion exclusions")?;
    if let Some(min_children) = args.min_children {
        mining.min_children = min_children;
    }
    let ruleset = tree.mine_rules(&mining).context("failed to mine activity rules")?;
    tracing::info!(
        page_loads = report.page_loads,
        malformed = report.malformed,
        pruned = removed,
        nodes = tree.len(),
        rules = ruleset.len(),
        "mined page hierarchy"
    );

    write!(out, "{}", tree.render()).context("failed to write tree")?;
    if let Some(path) = args.rules_out {
        let json = ruleset.to_json().context("failed to serialize ruleset")?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote ruleset");
    }
    Ok(())
}
