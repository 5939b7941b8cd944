use regex::Regex;
use webtrace_config::HierarchyConfig;

use crate::{HierarchyError, whole_name_pattern};

/// Segment patterns that collapse deep structure while the tree is built.
#[derive(Debug, Clone)]
pub struct PrePruning {
    aggregation_nodes: Vec<Regex>,
    exceptions: Vec<Regex>,
    pagination: Vec<Regex>,
}

impl PrePruning {
    pub fn new(
        aggregation_nodes: &[String],
        exceptions: &[String],
        pagination: &[String],
    ) -> Result<Self, HierarchyError> {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| whole_name_pattern(pattern))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            aggregation_nodes: compile(aggregation_nodes)?,
            exceptions: compile(exceptions)?,
            pagination: compile(pagination)?,
        })
    }

    /// True when the walk must stop at `parent` instead of descending
    /// into `child`.
    pub fn stops_at(&self, parent: &str, child: &str) -> bool {
        let aggregated = self.aggregation_nodes.iter().any(|re| re.is_match(parent))
            && !self.exceptions.iter().any(|re| re.is_match(child));
        aggregated || self.pagination.iter().any(|re| re.is_match(child))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Substring that marks an entry as a page load; empty accepts every entry.
    pub entry_marker: String,
    pub pre_pruning: Option<PrePruning>,
}

impl BuildOptions {
    pub fn from_config(config: &HierarchyConfig) -> Result<Self, HierarchyError> {
        let pre_pruning = if config.pre_pruning {
            Some(PrePruning::new(
                &config.aggregation_nodes,
                &config.aggregation_exceptions,
                &config.pagination_segments,
            )?)
        } else {
            None
        };
        Ok(Self {
            entry_marker: config.entry_marker.clone(),
            pre_pruning,
        })
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.entry_marker = marker.into();
        self
    }

    pub fn with_pre_pruning(mut self, pre_pruning: PrePruning) -> Self {
        self.pre_pruning = Some(pre_pruning);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_compiles_and_aggregates() {
        let config = HierarchyConfig {
            pre_pruning: true,
            ..HierarchyConfig::default()
        };

        let options = BuildOptions::from_config(&config).expect("options");
        let pre_pruning = options.pre_pruning.expect("pre-pruning enabled");

        assert_eq!(options.entry_marker, "loading of page");
        assert!(pre_pruning.stops_at("blog", "my-first-post"));
        assert!(!pre_pruning.stops_at("blog", "author"));
        assert!(pre_pruning.stops_at("perform-2020", "agenda"));
        assert!(pre_pruning.stops_at("news", "page"));
        assert!(!pre_pruning.stops_at("news", "today"));
        assert!(!pre_pruning.stops_at("weblog", "entry"));
    }

    #[test]
    fn disabled_pre_pruning_compiles_nothing() {
        let options = BuildOptions::from_config(&HierarchyConfig::default()).expect("options");

        assert!(options.pre_pruning.is_none());
    }
}
