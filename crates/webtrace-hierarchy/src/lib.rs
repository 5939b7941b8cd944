mod mining;
mod options;
mod tree;

use thiserror::Error;

pub use mining::MiningOptions;
pub use options::{BuildOptions, PrePruning};
pub use tree::{BuildReport, NodeId, PageNode, PageTree, ROOT_NAME, path_segments};

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("row {row}: entry '{entry}' has no analyzable path")]
    MalformedEntry { row: usize, entry: String },
    #[error("invalid hierarchy pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error(transparent)]
    Rule(#[from] webtrace_rules::RuleError),
    #[error(transparent)]
    Core(#[from] webtrace_core::CoreError),
}

/// Compiles a name pattern that must match a whole segment.
pub(crate) fn whole_name_pattern(pattern: &str) -> Result<regex::Regex, HierarchyError> {
    regex::Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
        HierarchyError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        }
    })
}
