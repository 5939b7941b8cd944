use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WEBTRACE_DIR_NAME: &str = ".webtrace";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_ENTRY_ATTR: &str = "ua_name";
pub const DEFAULT_ENTRY_MARKER: &str = "loading of page";
pub const DEFAULT_CLUSTER_ATTR: &str = "cluster";
pub const DEFAULT_MIN_COUNT: u64 = 2;
pub const DEFAULT_MIN_CHILDREN: usize = 2;
pub const DEFAULT_EXPANSION: u32 = 2;
pub const DEFAULT_INFLATION: f64 = 2.0;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_PRUNING_THRESHOLD: f64 = 0.001;
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 4;
pub const DEFAULT_MIN_SAMPLES: usize = 1;
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 0.6;
pub const EXCLUSION_TABLE_VERSION: u32 = 1;

const DEFAULT_AGGREGATION_NODES: &[&str] = &[
    "author",
    "availability-and-performance",
    "blog",
    "career",
    "configuration",
    "contact-support",
    "customers",
    "data-privacy",
    "diagnostics",
    "integrations",
    "javabook",
    "language",
    "partners",
    "perform-?.*",
    "platform",
    "press-release",
    "release-notes",
    "resource-type",
    "security-alert",
    "services-support",
    "sla",
    "solutions",
    "sso",
    "support",
    "tag",
    "trial",
    "technologies",
    "upgrade",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormatKind {
    Rfc3339,
    #[default]
    UnixMillis,
    UnixSeconds,
    Pattern,
}

impl TimestampFormatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rfc3339 => "rfc3339",
            Self::UnixMillis => "unix_millis",
            Self::UnixSeconds => "unix_seconds",
            Self::Pattern => "pattern",
        }
    }
}

impl std::str::FromStr for TimestampFormatKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "rfc3339" => Ok(Self::Rfc3339),
            "unix_millis" => Ok(Self::UnixMillis),
            "unix_seconds" => Ok(Self::UnixSeconds),
            "pattern" => Ok(Self::Pattern),
            other => Err(format!(
                "invalid timestamp format '{other}', expected one of: rfc3339, unix_millis, unix_seconds, pattern"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WebtraceConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub outliers: OutlierConfig,
}

/// Column roles of a processed event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_case_id_attr")]
    pub case_id_attr: String,
    #[serde(default = "default_activity_attr")]
    pub activity_attr: String,
    #[serde(default = "default_timestamp_attr")]
    pub timestamp_attr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_attr: Option<String>,
    #[serde(default)]
    pub resource_attrs: Vec<String>,
    #[serde(default)]
    pub timestamp_format: TimestampFormatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_pattern: Option<String>,
    #[serde(default = "default_min_session_length")]
    pub min_session_length: usize,
    #[serde(default = "default_cluster_attr")]
    pub cluster_attr: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            case_id_attr: default_case_id_attr(),
            activity_attr: default_activity_attr(),
            timestamp_attr: default_timestamp_attr(),
            duration_attr: Some("duration".to_owned()),
            resource_attrs: Vec::new(),
            timestamp_format: TimestampFormatKind::UnixMillis,
            timestamp_pattern: None,
            min_session_length: default_min_session_length(),
            cluster_attr: default_cluster_attr(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    #[serde(default = "default_entry_attr")]
    pub entry_attr: String,
    #[serde(default = "default_entry_marker")]
    pub entry_marker: String,
    #[serde(default)]
    pub pre_pruning: bool,
    #[serde(default = "default_aggregation_nodes")]
    pub aggregation_nodes: Vec<String>,
    #[serde(default = "default_aggregation_exceptions")]
    pub aggregation_exceptions: Vec<String>,
    #[serde(default = "default_pagination_segments")]
    pub pagination_segments: Vec<String>,
    #[serde(default = "default_min_count")]
    pub min_count: u64,
    #[serde(default = "default_min_children")]
    pub min_children: usize,
    #[serde(default)]
    pub exclusions: ExclusionTable,
    #[serde(default = "default_fallback_rules")]
    pub fallback_rules: Vec<FallbackRule>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            entry_attr: default_entry_attr(),
            entry_marker: default_entry_marker(),
            pre_pruning: false,
            aggregation_nodes: default_aggregation_nodes(),
            aggregation_exceptions: default_aggregation_exceptions(),
            pagination_segments: default_pagination_segments(),
            min_count: DEFAULT_MIN_COUNT,
            min_children: DEFAULT_MIN_CHILDREN,
            exclusions: ExclusionTable::default(),
            fallback_rules: default_fallback_rules(),
        }
    }
}

/// Parent/child name patterns whose nodes must never be promoted to activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionTable {
    #[serde(default = "default_exclusion_version")]
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<PromotionExclusion>,
}

impl Default for ExclusionTable {
    fn default() -> Self {
        Self {
            version: EXCLUSION_TABLE_VERSION,
            entries: vec![
                PromotionExclusion {
                    parent: "technologies".to_owned(),
                    child: ".*-monitoring".to_owned(),
                },
                PromotionExclusion {
                    parent: "/".to_owned(),
                    child: "perform.*".to_owned(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionExclusion {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    pub pattern: String,
    pub activity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default = "default_expansion")]
    pub expansion: u32,
    #[serde(default = "default_inflation")]
    pub inflation: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_pruning_threshold")]
    pub pruning_threshold: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            expansion: DEFAULT_EXPANSION,
            inflation: DEFAULT_INFLATION,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            pruning_threshold: DEFAULT_PRUNING_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierConfig {
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_outlier_threshold")]
    pub threshold: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            min_samples: DEFAULT_MIN_SAMPLES,
            threshold: DEFAULT_OUTLIER_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn webtrace_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(WEBTRACE_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    webtrace_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<WebtraceConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(WebtraceConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: WebtraceConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<WebtraceConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(webtrace_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = WebtraceConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &WebtraceConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.clustering.expansion < 2 {
        warnings.push(ConfigWarning {
            code: "clustering_expansion",
            message: format!(
                "expansion must be at least 2, got {}",
                config.clustering.expansion
            ),
        });
    }
    if !(config.clustering.inflation >= 1.0) {
        warnings.push(ConfigWarning {
            code: "clustering_inflation",
            message: format!(
                "inflation must be at least 1.0, got {}",
                config.clustering.inflation
            ),
        });
    }
    if !(0.0..=1.0).contains(&config.outliers.threshold) {
        warnings.push(ConfigWarning {
            code: "outlier_threshold",
            message: format!(
                "outlier threshold must lie in [0, 1], got {}",
                config.outliers.threshold
            ),
        });
    }
    if config.outliers.min_cluster_size < 2 {
        warnings.push(ConfigWarning {
            code: "outlier_min_cluster_size",
            message: format!(
                "min_cluster_size must be at least 2, got {}",
                config.outliers.min_cluster_size
            ),
        });
    }
    if config.outliers.min_samples < 1 {
        warnings.push(ConfigWarning {
            code: "outlier_min_samples",
            message: "min_samples must be at least 1".to_owned(),
        });
    }
    if config.log.timestamp_format == TimestampFormatKind::Pattern
        && config.log.timestamp_pattern.is_none()
    {
        warnings.push(ConfigWarning {
            code: "timestamp_pattern",
            message: "timestamp_format is 'pattern' but timestamp_pattern is not set".to_owned(),
        });
    }
    if config.hierarchy.exclusions.version != EXCLUSION_TABLE_VERSION {
        warnings.push(ConfigWarning {
            code: "exclusion_version",
            message: format!(
                "exclusion table version {} is not supported, expected {}",
                config.hierarchy.exclusions.version, EXCLUSION_TABLE_VERSION
            ),
        });
    }

    let hierarchy = &config.hierarchy;
    let patterns = hierarchy
        .aggregation_nodes
        .iter()
        .chain(hierarchy.aggregation_exceptions.iter())
        .chain(hierarchy.pagination_segments.iter())
        .chain(
            hierarchy
                .exclusions
                .entries
                .iter()
                .flat_map(|entry| [&entry.parent, &entry.child]),
        )
        .chain(hierarchy.fallback_rules.iter().map(|rule| &rule.pattern));
    for pattern in patterns {
        if let Err(err) = Regex::new(pattern) {
            warnings.push(ConfigWarning {
                code: "invalid_pattern",
                message: format!("pattern '{pattern}' does not compile: {err}"),
            });
        }
    }

    warnings
}

fn default_case_id_attr() -> String {
    "visitId".to_owned()
}

fn default_activity_attr() -> String {
    "activity".to_owned()
}

fn default_timestamp_attr() -> String {
    "starttime".to_owned()
}

fn default_min_session_length() -> usize {
    2
}

fn default_cluster_attr() -> String {
    DEFAULT_CLUSTER_ATTR.to_owned()
}

fn default_entry_attr() -> String {
    DEFAULT_ENTRY_ATTR.to_owned()
}

fn default_entry_marker() -> String {
    DEFAULT_ENTRY_MARKER.to_owned()
}

fn default_aggregation_nodes() -> Vec<String> {
    DEFAULT_AGGREGATION_NODES
        .iter()
        .map(|name| (*name).to_owned())
        .collect()
}

fn default_aggregation_exceptions() -> Vec<String> {
    vec!["author".to_owned()]
}

fn default_pagination_segments() -> Vec<String> {
    vec!["page".to_owned()]
}

fn default_min_count() -> u64 {
    DEFAULT_MIN_COUNT
}

fn default_min_children() -> usize {
    DEFAULT_MIN_CHILDREN
}

fn default_exclusion_version() -> u32 {
    EXCLUSION_TABLE_VERSION
}

fn default_fallback_rules() -> Vec<FallbackRule> {
    vec![
        FallbackRule {
            pattern: r"/perform-?\w*".to_owned(),
            activity: "View Perform-Conference Details".to_owned(),
        },
        FallbackRule {
            pattern: "/.*".to_owned(),
            activity: "View homepage".to_owned(),
        },
    ]
}

fn default_expansion() -> u32 {
    DEFAULT_EXPANSION
}

fn default_inflation() -> f64 {
    DEFAULT_INFLATION
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_pruning_threshold() -> f64 {
    DEFAULT_PRUNING_THRESHOLD
}

fn default_min_cluster_size() -> usize {
    DEFAULT_MIN_CLUSTER_SIZE
}

fn default_min_samples() -> usize {
    DEFAULT_MIN_SAMPLES
}

fn default_outlier_threshold() -> f64 {
    DEFAULT_OUTLIER_THRESHOLD
}

fn normalize_required(value: &mut String, fallback: fn() -> String) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        *value = fallback();
    } else if trimmed.len() != value.len() {
        *value = trimmed.to_owned();
    }
}

fn normalize_optional(input: Option<String>) -> Option<String> {
    input
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn normalize_config(mut config: WebtraceConfig) -> WebtraceConfig {
    normalize_required(&mut config.log.case_id_attr, default_case_id_attr);
    normalize_required(&mut config.log.activity_attr, default_activity_attr);
    normalize_required(&mut config.log.timestamp_attr, default_timestamp_attr);
    normalize_required(&mut config.log.cluster_attr, default_cluster_attr);
    config.log.duration_attr = normalize_optional(config.log.duration_attr.take());
    config.log.timestamp_pattern = normalize_optional(config.log.timestamp_pattern.take());
    config.log.resource_attrs.retain(|attr| !attr.trim().is_empty());

    normalize_required(&mut config.hierarchy.entry_attr, default_entry_attr);
    config.hierarchy.entry_marker = config.hierarchy.entry_marker.trim().to_owned();
    config
        .hierarchy
        .aggregation_nodes
        .retain(|name| !name.trim().is_empty());

    config
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn ensure_workspace_config_creates_default_file() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();

        let config = ensure_workspace_config(workspace).expect("ensure config");

        assert_eq!(config.log.timestamp_format, TimestampFormatKind::UnixMillis);
        assert_eq!(config.outliers.threshold, DEFAULT_OUTLIER_THRESHOLD);
        assert!(config_path(workspace).exists());

        let content = fs::read_to_string(config_path(workspace)).expect("read config file");
        assert!(content.contains("[hierarchy]"));
        assert!(content.contains("timestamp_format = \"unix_millis\""));

        let reloaded = load_workspace_config(workspace).expect("reload config");
        assert_eq!(reloaded, config);
    }

    #[test]
    fn load_workspace_config_parses_partial_sections() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();
        fs::create_dir_all(webtrace_dir(workspace)).expect("create .webtrace");

        let raw = r#"
[log]
case_id_attr = "Case ID"
activity_attr = "  "
timestamp_format = "pattern"
timestamp_pattern = "%d-%m-%Y:%H.%M"

[hierarchy]
pre_pruning = true
min_count = 5

[clustering]
inflation = 3.5
"#;
        fs::write(config_path(workspace), raw).expect("write config");

        let config = load_workspace_config(workspace).expect("load config");

        assert_eq!(config.log.case_id_attr, "Case ID");
        assert_eq!(config.log.activity_attr, "activity");
        assert_eq!(config.log.timestamp_format, TimestampFormatKind::Pattern);
        assert_eq!(
            config.log.timestamp_pattern.as_deref(),
            Some("%d-%m-%Y:%H.%M")
        );
        assert!(config.hierarchy.pre_pruning);
        assert_eq!(config.hierarchy.min_count, 5);
        assert_eq!(config.hierarchy.min_children, DEFAULT_MIN_CHILDREN);
        assert_eq!(config.hierarchy.exclusions.entries.len(), 2);
        assert_eq!(config.clustering.inflation, 3.5);
        assert_eq!(config.clustering.expansion, DEFAULT_EXPANSION);
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn validate_config_reports_out_of_range_values() {
        let mut config = WebtraceConfig::default();
        config.clustering.expansion = 1;
        config.clustering.inflation = 0.5;
        config.outliers.threshold = 1.5;
        config.hierarchy.aggregation_nodes.push("(".to_owned());

        let codes: Vec<&str> = validate_config(&config)
            .into_iter()
            .map(|warning| warning.code)
            .collect();

        assert_eq!(
            codes,
            vec![
                "clustering_expansion",
                "clustering_inflation",
                "outlier_threshold",
                "invalid_pattern"
            ]
        );
    }

    #[test]
    fn timestamp_format_kind_round_trips_through_str() {
        for kind in [
            TimestampFormatKind::Rfc3339,
            TimestampFormatKind::UnixMillis,
            TimestampFormatKind::UnixSeconds,
            TimestampFormatKind::Pattern,
        ] {
            assert_eq!(kind.as_str().parse::<TimestampFormatKind>(), Ok(kind));
        }
        assert!("epoch".parse::<TimestampFormatKind>().is_err());
    }
}
