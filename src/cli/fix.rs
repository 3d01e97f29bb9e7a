//! Fix command: run the remediation pipeline

use super::files::collect_python_files;
use super::FixOptions;
use anyhow::{Context, Result};
use archfix::config::OraclePolicy;
use archfix::models::RunSummary;
use archfix::pipeline::NoopFormatter;
use archfix::{load_project_config, RemediationPipeline};
use console::{style, Term};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn run(path: &Path, options: FixOptions, workers: Option<usize>) -> Result<()> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Cannot access {}", path.display()))?;

    let mut config = load_project_config(&root);
    let settings = &mut config.pipeline;
    if options.no_validate {
        settings.validate = false;
    }
    if options.no_backup {
        settings.backup = false;
    }
    if options.interactive {
        settings.interactive = true;
    }
    if options.strict_oracle {
        settings.oracle_policy = OraclePolicy::Strict;
    }
    if let Some(workers) = workers {
        settings.workers = workers;
    }
    let config = Arc::new(config);

    let files = collect_python_files(&root, &config);
    info!("Found {} Python files under {}", files.len(), root.display());

    let mut builder = RemediationPipeline::builder(&root, Arc::clone(&config));
    if options.no_format {
        builder = builder.formatter(Arc::new(NoopFormatter));
    }
    let pipeline = builder.build()?;
    let summary = pipeline
        .run(&files)
        .context("Remediation aborted; run `archfix restore` to undo partial edits")?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&pipeline, &summary)?;
    }
    Ok(())
}

fn print_summary(pipeline: &RemediationPipeline, summary: &RunSummary) -> Result<()> {
    let term = Term::stderr();

    if let Some(baseline) = summary.baseline_failures {
        term.write_line(&format!("Baseline: {} failing tests", baseline))?;
    }
    for (pass, stats) in &summary.passes {
        term.write_line(&format!(
            "{:<36} {:>4} modified  {:>4} rolled back  {:>4} found",
            pass.to_string(),
            stats.modified_count,
            stats.rolled_back_count,
            stats.violations
        ))?;
    }

    for regression in &summary.regressions {
        term.write_line(&format!(
            "{} {} ({}): test failures went from {} to {}",
            style("Rolled back").yellow().bold(),
            regression.file.display(),
            regression.pass,
            regression.baseline.map_or("?".to_string(), |n| n.to_string()),
            regression.observed.map_or("?".to_string(), |n| n.to_string()),
        ))?;
    }
    for failure in &summary.applier_failures {
        term.write_line(&format!(
            "{} {} ({}): {}",
            style("Not applied").yellow(),
            failure.file.display(),
            failure.pass,
            failure.cause
        ))?;
    }
    for failure in &summary.rule_failures {
        term.write_line(&format!("{} {}", style("Rule error").red().bold(), failure))?;
    }

    if !summary.unresolved.is_empty() {
        term.write_line(&format!(
            "\n{}",
            style("Needs a human:").bold().underlined()
        ))?;
        for violation in &summary.unresolved {
            term.write_line(&format!("  {}", violation))?;
            if let Some(instructions) = pipeline.engine().instructions(violation) {
                term.write_line(&format!("    {}", style(instructions).dim()))?;
            }
        }
    }

    term.write_line(&format!(
        "\n{} {} files modified, {} rolled back",
        style("Done:").green().bold(),
        summary.modified_count(),
        summary.rolled_back_count()
    ))?;
    Ok(())
}
