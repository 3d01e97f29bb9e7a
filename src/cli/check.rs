//! Check command: evaluate every rule, change nothing

use super::files::collect_python_files;
use anyhow::{Context, Result};
use archfix::analyzer::PythonAnalyzer;
use archfix::rules::{FileEvaluation, RuleEngine, RuleEngineBuilder, RuleSelection};
use archfix::{load_project_config, Violation};
use console::{style, Term};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Serialize)]
struct JsonViolation<'a> {
    #[serde(flatten)]
    violation: &'a Violation,
    instructions: Option<String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    files: usize,
    violations: Vec<JsonViolation<'a>>,
    parse_errors: Vec<(String, &'a str)>,
    rule_failures: Vec<String>,
}

pub fn run(path: &Path, format: &str, workers: Option<usize>) -> Result<()> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Cannot access {}", path.display()))?;
    let config = Arc::new(load_project_config(&root));
    let files = collect_python_files(&root, &config);

    let engine = RuleEngineBuilder::new(Arc::new(PythonAnalyzer::new(&root)), Arc::clone(&config))
        .default_rules()
        .build();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.unwrap_or(config.pipeline.workers))
        .build()
        .context("Failed to build evaluation thread pool")?;
    let evaluations = pool.install(|| engine.evaluate(&files, RuleSelection::All));

    let total: usize = evaluations.iter().map(|e| e.violations.len()).sum();
    if format == "json" {
        print_json(&engine, files.len(), &evaluations)?;
    } else {
        print_text(&engine, files.len(), &evaluations)?;
    }

    if total > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_json(engine: &RuleEngine, files: usize, evaluations: &[FileEvaluation]) -> Result<()> {
    let report = JsonReport {
        files,
        violations: evaluations
            .iter()
            .flat_map(|e| &e.violations)
            .map(|violation| JsonViolation {
                violation,
                instructions: engine.instructions(violation),
            })
            .collect(),
        parse_errors: evaluations
            .iter()
            .filter_map(|e| {
                e.parse_error
                    .as_deref()
                    .map(|err| (e.path.display().to_string(), err))
            })
            .collect(),
        rule_failures: evaluations
            .iter()
            .flat_map(|e| &e.failures)
            .map(|f| f.to_string())
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_text(engine: &RuleEngine, files: usize, evaluations: &[FileEvaluation]) -> Result<()> {
    let term = Term::stdout();
    let mut total = 0;

    for evaluation in evaluations {
        if let Some(err) = &evaluation.parse_error {
            term.write_line(&format!(
                "{} {}: {}",
                style("skipped").yellow(),
                evaluation.path.display(),
                err
            ))?;
        }
        for failure in &evaluation.failures {
            term.write_line(&format!("{} {}", style("rule error").red().bold(), failure))?;
        }
        for violation in &evaluation.violations {
            total += 1;
            let fix_hint = if violation.is_comment_only() {
                style("comment").blue()
            } else if violation.is_fixable() {
                style("fixable").green()
            } else {
                style("manual").yellow()
            };
            term.write_line(&format!(
                "{} {} {} [{}]",
                style(violation.location()).bold(),
                style(violation.code()).cyan(),
                violation.message(),
                fix_hint
            ))?;
            if !violation.is_fixable() {
                if let Some(instructions) = engine.instructions(violation) {
                    term.write_line(&format!("    {}", style(instructions).dim()))?;
                }
            }
        }
    }

    let headline = format!("{} violations in {} files", total, files);
    if total == 0 {
        term.write_line(&style(headline).green().bold().to_string())?;
    } else {
        term.write_line(&format!(
            "\n{}\nRun `archfix fix` to apply the fixable ones.",
            style(headline).red().bold()
        ))?;
    }
    Ok(())
}
