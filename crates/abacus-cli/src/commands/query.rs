//! Permission lookup by user, resource and/or action.

use std::path::Path;

use abacus_config::OutputFormat;
use abacus_policy::Evaluator;
use anyhow::Result;

use super::{Context, load_policy, print_json};
use crate::style;

/// Lists the permitted requests matching whichever fields were given.
pub fn run(
    ctx: &Context,
    policy: &Path,
    subject: Option<&str>,
    object: Option<&str>,
    action: Option<&str>,
) -> Result<()> {
    let store = load_policy(policy)?;
    let evaluator = Evaluator::with_strategy(&store, ctx.config.analytics.strategy);
    let permitted = evaluator.permitted(subject, object, action)?;

    match ctx.format {
        OutputFormat::Json => print_json(&permitted)?,
        OutputFormat::Text => {
            for triple in &permitted {
                println!("{}, {}, {}", triple.subject, triple.object, triple.action);
            }
        }
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = permitted
                .iter()
                .map(|triple| {
                    vec![
                        triple.subject.clone(),
                        triple.object.clone(),
                        triple.action.clone(),
                    ]
                })
                .collect();
            style::print_data_table(&["User", "Resource", "Action"], &[], &rows, "permission");
        }
    }
    Ok(())
}
