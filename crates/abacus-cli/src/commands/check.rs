//! Single access decision with explanation.

use std::path::Path;

use abacus_config::OutputFormat;
use abacus_policy::Evaluator;
use anyhow::Result;
use serde::Serialize;

use super::{Context, load_policy, print_json};
use crate::style::{self, colors};

#[derive(Serialize)]
struct CheckOutput<'a> {
    subject: &'a str,
    object: &'a str,
    action: &'a str,
    #[serde(flatten)]
    decision: abacus_policy::Decision,
}

/// Decides one request and explains the result.
pub fn run(ctx: &Context, policy: &Path, subject: &str, object: &str, action: &str) -> Result<()> {
    let store = load_policy(policy)?;
    let evaluator = Evaluator::with_strategy(&store, ctx.config.analytics.strategy);
    let decision = evaluator.evaluate(subject, object, action);

    match ctx.format {
        OutputFormat::Json => print_json(&CheckOutput {
            subject,
            object,
            action,
            decision,
        })?,
        OutputFormat::Text => {
            println!("{}", decision.effect);
            println!("{}", decision.reason);
        }
        OutputFormat::Table => {
            style::print_info_table(&[
                ("Subject", subject.to_string()),
                ("Object", object.to_string()),
                ("Action", action.to_string()),
                ("Decision", decision.effect.to_string()),
                (
                    "Rule",
                    decision
                        .matched_rule
                        .map_or_else(|| "-".to_string(), |index| format!("#{index}")),
                ),
                ("Reason", decision.reason.clone()),
            ]);
            println!("{}", colors::effect(decision.effect));
        }
    }

    Ok(())
}
