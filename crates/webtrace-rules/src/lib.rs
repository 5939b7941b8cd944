mod convert;
mod rule;

use thiserror::Error;

pub use convert::{ConversionReport, WeblogConverter, default_column_renames};
pub use rule::{Rule, RulePair, Ruleset, entry_path, title_case};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("no rule matches path '{path}'")]
    NoMatchingRule { path: String },
    #[error("entry '{entry}' carries no path")]
    MissingPath { entry: String },
    #[error("invalid rule pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error(transparent)]
    Core(#[from] webtrace_core::CoreError),
}
