//! Project-level configuration support
//!
//! Loads per-project configuration from `archfix.toml` or `.archfixrc.json`
//! in the project root.
//!
//! # Configuration Format
//!
//! ```toml
//! # archfix.toml
//!
//! [layers]
//! order = ["Domain", "UseCase", "Infrastructure", "Interface"]
//! immutable = ["Domain"]
//!
//! [layers.paths]
//! "app/core" = "Domain"
//! "app.adapters" = "Infrastructure"
//!
//! [[layers.suffixes]]
//! suffix = "Repository"
//! layer = "Infrastructure"
//!
//! [rules.TYP002]
//! enabled = false
//!
//! [rules.excessive-test-doubles]
//! thresholds = { max_doubles = 4 }
//!
//! [pipeline]
//! validate = true
//! test_command = ["pytest", "-q"]
//! oracle_policy = "strict"
//!
//! [exclude]
//! paths = ["migrations/"]
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Built-in exclusion patterns for environments and tool caches.
/// Applied unless `skip_defaults = true` in config.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/.venv/**",
    "**/venv/**",
    "**/.tox/**",
    "**/site-packages/**",
    "**/node_modules/**",
    "**/__pycache__/**",
    "**/.git/**",
];

/// Project-level configuration loaded from archfix.toml or .archfixrc.json
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    /// Layer ordering and classification conventions
    #[serde(default)]
    pub layers: LayerConfig,

    /// Per-rule overrides, keyed by code (`TYP002`) or name (`layer-dependency`)
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfigOverride>,

    /// Remediation pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Path exclusion patterns
    #[serde(default)]
    pub exclude: ExcludeConfig,
}

/// Layer ordering and the conventions used to classify symbols
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    /// Layers from innermost to outermost
    #[serde(default = "default_layer_order")]
    pub order: Vec<String>,

    /// Layers whose records must be immutable
    #[serde(default = "default_immutable_layers")]
    pub immutable: Vec<String>,

    /// Explicit path or module prefix -> layer. Longest prefix wins.
    #[serde(default)]
    pub paths: BTreeMap<String, String>,

    /// Class-name suffix conventions, first match wins
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<SuffixConvention>,

    /// Directory-name conventions, first match wins
    #[serde(default = "default_directories")]
    pub directories: Vec<DirectoryConvention>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SuffixConvention {
    pub suffix: String,
    pub layer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryConvention {
    pub name: String,
    pub layer: String,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            order: default_layer_order(),
            immutable: default_immutable_layers(),
            paths: BTreeMap::new(),
            suffixes: default_suffixes(),
            directories: default_directories(),
        }
    }
}

fn default_layer_order() -> Vec<String> {
    ["Domain", "UseCase", "Infrastructure", "Interface"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_immutable_layers() -> Vec<String> {
    vec!["Domain".to_string()]
}

fn default_suffixes() -> Vec<SuffixConvention> {
    [
        ("Entity", "Domain"),
        ("ValueObject", "Domain"),
        ("Aggregate", "Domain"),
        ("UseCase", "UseCase"),
        ("Interactor", "UseCase"),
        ("Service", "UseCase"),
        ("Repository", "Infrastructure"),
        ("Gateway", "Infrastructure"),
        ("Adapter", "Infrastructure"),
        ("Client", "Infrastructure"),
        ("Controller", "Interface"),
        ("View", "Interface"),
        ("Router", "Interface"),
    ]
    .iter()
    .map(|(suffix, layer)| SuffixConvention {
        suffix: suffix.to_string(),
        layer: layer.to_string(),
    })
    .collect()
}

fn default_directories() -> Vec<DirectoryConvention> {
    [
        ("domain", "Domain"),
        ("entities", "Domain"),
        ("usecases", "UseCase"),
        ("use_cases", "UseCase"),
        ("application", "UseCase"),
        ("services", "UseCase"),
        ("infrastructure", "Infrastructure"),
        ("adapters", "Infrastructure"),
        ("repositories", "Infrastructure"),
        ("persistence", "Infrastructure"),
        ("api", "Interface"),
        ("interface", "Interface"),
        ("interfaces", "Interface"),
        ("web", "Interface"),
        ("cli", "Interface"),
        ("controllers", "Interface"),
    ]
    .iter()
    .map(|(name, layer)| DirectoryConvention {
        name: name.to_string(),
        layer: layer.to_string(),
    })
    .collect()
}

/// Configuration override for a specific rule
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuleConfigOverride {
    /// Whether the rule is enabled (default: true)
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Rule-specific threshold overrides (e.g. max_doubles)
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdValue>,
}

/// A threshold value can be an integer, float, boolean or string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ThresholdValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl ThresholdValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ThresholdValue::Integer(v) => Some(*v),
            ThresholdValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ThresholdValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ThresholdValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// What to do when the test oracle cannot produce a failure count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OraclePolicy {
    /// Treat a timed-out or unavailable test run as zero failures
    #[default]
    Optimistic,
    /// Treat it as a regression and roll the file back
    Strict,
}

/// Remediation pipeline settings
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Re-run the test suite after each file and roll back regressions
    #[serde(default = "default_true")]
    pub validate: bool,

    /// Snapshot files before editing them
    #[serde(default = "default_true")]
    pub backup: bool,

    /// Ask before applying fixes to each file
    #[serde(default)]
    pub interactive: bool,

    #[serde(default = "default_test_command")]
    pub test_command: Vec<String>,

    #[serde(default = "default_test_timeout")]
    pub test_timeout_secs: u64,

    #[serde(default)]
    pub oracle_policy: OraclePolicy,

    /// Commands run (in order) by the mechanical normalization passes.
    /// Each receives the project root as working directory.
    #[serde(default = "default_formatter_commands")]
    pub formatter_commands: Vec<Vec<String>>,

    #[serde(default = "default_formatter_iterations")]
    pub max_formatter_iterations: usize,

    /// Per-invocation limit for each formatter command
    #[serde(default = "default_formatter_timeout")]
    pub formatter_timeout_secs: u64,

    /// Rounds of the type-hint pass; each round sees the previous round's hints
    #[serde(default = "default_hint_rounds")]
    pub max_hint_rounds: usize,

    /// Evaluation threads (0 = rayon default)
    #[serde(default)]
    pub workers: usize,

    /// Where snapshots live (default: the per-project cache directory)
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validate: true,
            backup: true,
            interactive: false,
            test_command: default_test_command(),
            test_timeout_secs: default_test_timeout(),
            oracle_policy: OraclePolicy::default(),
            formatter_commands: default_formatter_commands(),
            max_formatter_iterations: default_formatter_iterations(),
            formatter_timeout_secs: default_formatter_timeout(),
            max_hint_rounds: default_hint_rounds(),
            workers: 0,
            backup_dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_test_command() -> Vec<String> {
    vec!["pytest".to_string(), "-q".to_string()]
}

fn default_test_timeout() -> u64 {
    300
}

fn default_formatter_commands() -> Vec<Vec<String>> {
    vec![
        vec!["ruff", "check", "--fix", "--select", "I"],
        vec!["ruff", "format"],
    ]
    .into_iter()
    .map(|cmd| cmd.into_iter().map(String::from).collect())
    .collect()
}

fn default_formatter_iterations() -> usize {
    5
}

fn default_formatter_timeout() -> u64 {
    120
}

fn default_hint_rounds() -> usize {
    3
}

/// Path exclusion configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExcludeConfig {
    /// Paths/patterns to exclude from analysis
    #[serde(default)]
    pub paths: Vec<String>,

    /// If true, disable built-in default exclusion patterns
    #[serde(default)]
    pub skip_defaults: bool,
}

impl ExcludeConfig {
    /// Returns effective exclusion patterns (defaults + user patterns).
    pub fn effective_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();

        if !self.skip_defaults {
            patterns.extend(DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()));
        }

        for p in &self.paths {
            if !patterns.contains(p) {
                patterns.push(p.clone());
            }
        }

        patterns
    }
}

/// Load project configuration from the project root.
///
/// Searches for configuration files in this order:
/// 1. `archfix.toml`
/// 2. `.archfixrc.json`
///
/// Returns default configuration if no config file is found or the file
/// cannot be read.
pub fn load_project_config(project_root: &Path) -> ProjectConfig {
    let toml_path = project_root.join("archfix.toml");
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = project_root.join(".archfixrc.json");
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config)
}

fn load_json_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = serde_json::from_str(&content)?;
    Ok(config)
}

impl ProjectConfig {
    fn rule_override(&self, code: &str, name: &str) -> Option<&RuleConfigOverride> {
        self.rules
            .get(code)
            .or_else(|| self.rules.get(&code.to_ascii_lowercase()))
            .or_else(|| self.rules.get(&normalize_rule_name(name)))
            .or_else(|| self.rules.get(name))
    }

    /// Check if a rule is enabled (defaults to true if not specified)
    pub fn is_rule_enabled(&self, code: &str, name: &str) -> bool {
        self.rule_override(code, name)
            .and_then(|c| c.enabled)
            .unwrap_or(true)
    }

    pub fn threshold(&self, code: &str, name: &str, key: &str) -> Option<&ThresholdValue> {
        self.rule_override(code, name)
            .and_then(|c| c.thresholds.get(key))
    }

    pub fn threshold_i64(&self, code: &str, name: &str, key: &str) -> Option<i64> {
        self.threshold(code, name, key).and_then(|v| v.as_i64())
    }

    /// Check if a path (relative to the project root) should be excluded
    pub fn should_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/");
        self.exclude
            .effective_patterns()
            .iter()
            .any(|pattern| glob_match(pattern, &path_str))
    }

    pub fn is_immutable_layer(&self, layer: &str) -> bool {
        self.layers.immutable.iter().any(|l| l == layer)
    }
}

/// Normalize a rule name for config lookup.
///
/// `ExcessiveTestDoubles`, `excessive_test_doubles` and
/// `excessive-test-doubles` all map to `excessive-test-doubles`.
pub fn normalize_rule_name(name: &str) -> String {
    let mut result = String::new();
    let chars: Vec<char> = name.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_is_lower = i > 0 && chars[i - 1].is_lowercase();
            if prev_is_lower {
                result.push('-');
            }
            result.extend(c.to_lowercase());
        } else if *c == '_' || *c == ' ' {
            result.push('-');
        } else {
            result.push(*c);
        }
    }

    result
}

/// Simple glob pattern matching on `/`-separated paths
pub fn glob_match(pattern: &str, path: &str) -> bool {
    // **/X/** matches when X is a directory anywhere in the path
    if let Some(middle) = pattern
        .strip_prefix("**/")
        .and_then(|p| p.strip_suffix("/**"))
    {
        return path.starts_with(&format!("{}/", middle))
            || path.contains(&format!("/{}/", middle));
    }

    // **/*.ext style suffix patterns
    if let Some(rest) = pattern.strip_prefix("**/") {
        return match rest.split_once('*') {
            Some((before, after)) => {
                let file = path.rsplit('/').next().unwrap_or(path);
                file.starts_with(before) && file.ends_with(after)
            }
            None => path == rest || path.ends_with(&format!("/{}", rest)),
        };
    }

    // single * within a pattern
    if let Some((prefix, suffix)) = pattern.split_once('*') {
        if !suffix.contains('*') {
            return path.starts_with(prefix) && path.ends_with(suffix);
        }
    }

    // "migrations/" only matches at the root, use "**/migrations/**" for any depth
    path.starts_with(pattern) || path == pattern
}
