//! Reports built from the bulk scan: resource ranking, rule coverage and
//! policy statistics.

use std::path::Path;

use abacus_config::OutputFormat;
use abacus_policy::{PolicyStats, ResourceCount};
use anyhow::Result;
use serde::Serialize;

use super::{Context, ScanOptions, load_policy, print_json, scan};
use crate::style;

#[derive(Serialize)]
struct RankingOutput<'a> {
    most_accessed: &'a [ResourceCount],
    least_accessed: &'a [ResourceCount],
}

/// Most and least accessed resources.
pub fn resources(ctx: &Context, policy: &Path, top: Option<usize>, options: ScanOptions) -> Result<()> {
    let store = load_policy(policy)?;
    let analysis = scan(&store, options);
    let ranking = analysis.resource_ranking();
    let top = top.unwrap_or(ctx.config.analytics.top);
    let most = ranking.most_accessed(top);
    let least = ranking.least_accessed(top);

    match ctx.format {
        OutputFormat::Json => print_json(&RankingOutput {
            most_accessed: most,
            least_accessed: least,
        })?,
        OutputFormat::Text => {
            println!("# most accessed");
            for entry in most {
                println!("{} {}", entry.object, entry.count);
            }
            println!("# least accessed");
            for entry in least {
                println!("{} {}", entry.object, entry.count);
            }
        }
        OutputFormat::Table => {
            for (title, entries) in [("Most accessed", most), ("Least accessed", least)] {
                style::print_header(&format!("{title} (top {top})"));
                let rows: Vec<Vec<String>> = entries
                    .iter()
                    .map(|entry| vec![entry.object.clone(), entry.count.to_string()])
                    .collect();
                style::print_data_table(&["Resource", "Accesses"], &["Accesses"], &rows, "resource");
                style::print_spacer();
            }
        }
    }
    Ok(())
}

/// How often each attribute a rule reads was present across its matches.
pub fn coverage(ctx: &Context, policy: &Path, options: ScanOptions) -> Result<()> {
    let store = load_policy(policy)?;
    let analysis = scan(&store, options);
    let coverage = analysis.rule_coverage();

    match ctx.format {
        OutputFormat::Json => print_json(&coverage)?,
        OutputFormat::Text => {
            for rule in coverage {
                let counts: Vec<String> = rule
                    .subject
                    .iter()
                    .map(|(name, count)| format!("user.{name}={count}"))
                    .chain(
                        rule.object
                            .iter()
                            .map(|(name, count)| format!("resource.{name}={count}")),
                    )
                    .collect();
                println!("rule #{} matches={} {}", rule.rule, rule.matches, counts.join(" "));
            }
        }
        OutputFormat::Table => {
            let mut rows = Vec::new();
            for rule in coverage {
                let sides = [("user", &rule.subject), ("resource", &rule.object)];
                for (side, counts) in sides {
                    for (name, count) in counts {
                        rows.push(vec![
                            format!("#{}", rule.rule),
                            rule.matches.to_string(),
                            format!("{side}.{name}"),
                            count.to_string(),
                        ]);
                    }
                }
            }
            style::print_data_table(
                &["Rule", "Matches", "Attribute", "Present"],
                &["Matches", "Present"],
                &rows,
                "attribute",
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct StatsOutput {
    #[serde(flatten)]
    stats: PolicyStats,
    rule_permissions: Vec<u64>,
}

/// Entity, attribute, rule and permission counts.
pub fn stats(ctx: &Context, policy: &Path, options: ScanOptions) -> Result<()> {
    let store = load_policy(policy)?;
    let analysis = scan(&store, options);
    let stats = analysis.stats();
    let rule_permissions = analysis.rule_permission_counts();

    match ctx.format {
        OutputFormat::Json => print_json(&StatsOutput {
            stats,
            rule_permissions,
        })?,
        OutputFormat::Text => {
            println!("subjects {}", stats.subjects);
            println!("objects {}", stats.objects);
            println!("subject_attributes {}", stats.subject_attributes);
            println!("object_attributes {}", stats.object_attributes);
            println!("rules {}", stats.rules);
            println!("permissions {}", stats.permissions);
            for (index, count) in rule_permissions.iter().enumerate() {
                println!("rule #{index} {count}");
            }
        }
        OutputFormat::Table => {
            style::print_info_table(&[
                ("Users", stats.subjects.to_string()),
                ("Resources", stats.objects.to_string()),
                ("User attributes", stats.subject_attributes.to_string()),
                ("Resource attributes", stats.object_attributes.to_string()),
                ("Rules", stats.rules.to_string()),
                ("Permissions", stats.permissions.to_string()),
            ]);
            style::print_spacer();
            let rows: Vec<Vec<String>> = store
                .rules()
                .iter()
                .zip(&rule_permissions)
                .enumerate()
                .map(|(index, (rule, count))| vec![format!("#{index}"), rule.to_string(), count.to_string()])
                .collect();
            style::print_data_table(&["Rule", "Definition", "Permissions"], &["Permissions"], &rows, "rule");
        }
    }
    Ok(())
}
