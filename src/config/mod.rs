//! Configuration module for archfix
//!
//! This module handles:
//! - Project-level configuration (archfix.toml)
//! - Layer conventions and ordering
//! - Rule enablement and threshold overrides
//! - Pipeline settings (validation, backups, formatter, oracle)

mod project_config;

pub use project_config::{
    glob_match, load_project_config, normalize_rule_name, DirectoryConvention, ExcludeConfig,
    LayerConfig, OraclePolicy, PipelineConfig, ProjectConfig, RuleConfigOverride,
    SuffixConvention, ThresholdValue,
};
