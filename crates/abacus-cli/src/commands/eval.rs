//! Batch evaluation of request lines.

use std::path::Path;

use abacus_config::OutputFormat;
use abacus_policy::{BatchEntry, Effect, Evaluator};
use anyhow::{Result, bail};
use serde::Serialize;

use super::{Context, load_policy, print_json, read_input};
use crate::style::{self, colors};

#[derive(Serialize)]
struct EntryOutput<'a> {
    line: usize,
    request: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    effect: Option<Effect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Decides every `subject,object,action` line of `requests` in order.
///
/// Malformed lines are reported and skipped; the command fails after
/// printing all decisions if there were any.
pub fn run(ctx: &Context, policy: &Path, requests: &Path) -> Result<()> {
    let store = load_policy(policy)?;
    let input = read_input(requests)?;
    let evaluator = Evaluator::with_strategy(&store, ctx.config.analytics.strategy);
    let entries = evaluator.decide_batch(&input);

    match ctx.format {
        OutputFormat::Json => print_json(&entries.iter().map(entry_output).collect::<Vec<_>>())?,
        OutputFormat::Text => {
            for entry in &entries {
                if let Ok(effect) = &entry.outcome {
                    println!("{}: {}", entry.line, effect);
                }
            }
        }
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = entries
                .iter()
                .filter_map(|entry| {
                    let effect = entry.outcome.as_ref().ok()?;
                    Some(vec![
                        entry.line.to_string(),
                        entry.text.clone(),
                        effect.to_string(),
                    ])
                })
                .collect();
            style::print_data_table(&["Line", "Request", "Decision"], &["Line"], &rows, "decision");
        }
    }

    let malformed: Vec<&BatchEntry> = entries.iter().filter(|entry| entry.outcome.is_err()).collect();
    if ctx.format != OutputFormat::Json {
        for entry in &malformed {
            if let Err(err) = &entry.outcome {
                style::print_error(&err.to_string());
            }
        }
    }

    let permitted = entries
        .iter()
        .filter(|entry| matches!(entry.outcome, Ok(Effect::Permit)))
        .count();
    tracing::info!(
        requests = entries.len(),
        permitted,
        malformed = malformed.len(),
        "Batch evaluated"
    );

    if !malformed.is_empty() {
        bail!(
            "{} of {} request lines were malformed",
            malformed.len(),
            entries.len()
        );
    }
    if ctx.format == OutputFormat::Table {
        style::print_success(&format!(
            "{} of {} requests {}",
            permitted,
            entries.len(),
            colors::effect(Effect::Permit)
        ));
    }
    Ok(())
}

fn entry_output(entry: &BatchEntry) -> EntryOutput<'_> {
    match &entry.outcome {
        Ok(effect) => EntryOutput {
            line: entry.line,
            request: &entry.text,
            effect: Some(*effect),
            error: None,
        },
        Err(err) => EntryOutput {
            line: entry.line,
            request: &entry.text,
            effect: None,
            error: Some(&err.reason),
        },
    }
}
