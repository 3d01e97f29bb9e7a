//! Rules command: list the catalogue

use anyhow::Result;
use archfix::rules::default_rules;
use archfix::{load_project_config, ProjectConfig};
use console::{style, Term};
use std::path::Path;

pub fn run(path: &Path) -> Result<()> {
    let config = load_project_config(path);
    let term = Term::stdout();

    // The full catalogue, so disabled rules still show up
    for rule in default_rules(&ProjectConfig::default()) {
        let enabled = config.is_rule_enabled(rule.code(), rule.name());
        let status = if enabled {
            style("on ").green()
        } else {
            style("off").dim()
        };
        term.write_line(&format!(
            "{} {} {:<30} {:<12} {}",
            status,
            style(rule.code()).cyan().bold(),
            rule.name(),
            rule.fix_type().to_string(),
            rule.description()
        ))?;
    }
    Ok(())
}
