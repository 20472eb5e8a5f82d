//! ACL extraction and comparison.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use abacus_config::OutputFormat;
use abacus_policy::{AccessTriple, Acl, AclDiff};
use anyhow::{Context as _, Result, bail};
use serde::Serialize;

use super::{Context, ScanOptions, load_policy, print_json, read_input, scan};
use crate::style::{self, colors::SemanticStyle};

/// Enumerates every permitted request, to stdout or to `output`.
pub fn extract(ctx: &Context, policy: &Path, output: Option<&Path>, options: ScanOptions) -> Result<()> {
    let store = load_policy(policy)?;
    let acl = scan(&store, options).into_acl();

    if let Some(path) = output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        acl.write_to(BufWriter::new(file))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        style::print_success(&format!(
            "Wrote {} permissions to {}",
            acl.len(),
            path.display().to_string().code()
        ));
        return Ok(());
    }

    match ctx.format {
        OutputFormat::Json => print_json(&acl)?,
        OutputFormat::Text => acl
            .write_to(io::stdout().lock())
            .context("Failed to write to stdout")?,
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = acl.iter().map(triple_row).collect();
            style::print_data_table(&["Subject", "Object", "Action"], &[], &rows, "permission");
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct DiffOutput<'a> {
    #[serde(flatten)]
    diff: &'a AclDiff,
    total_differences: usize,
    exact_match: bool,
}

/// Compares two ACL files. Fails if they differ.
pub fn diff(ctx: &Context, expected: &Path, actual: &Path) -> Result<()> {
    let expected_acl = read_acl(expected)?;
    let actual_acl = read_acl(actual)?;
    let diff = AclDiff::between(&expected_acl, &actual_acl);

    match ctx.format {
        OutputFormat::Json => print_json(&DiffOutput {
            diff: &diff,
            total_differences: diff.total_differences(),
            exact_match: diff.is_exact_match(),
        })?,
        OutputFormat::Text => {
            for triple in &diff.only_expected {
                println!("- {}", triple_line(triple));
            }
            for triple in &diff.only_actual {
                println!("+ {}", triple_line(triple));
            }
        }
        OutputFormat::Table => {
            style::print_info_table(&[
                ("Common", diff.common.len().to_string()),
                ("Only in expected", diff.only_expected.len().to_string()),
                ("Only in actual", diff.only_actual.len().to_string()),
                ("Total differences", diff.total_differences().to_string()),
            ]);
            if !diff.is_exact_match() {
                let rows: Vec<Vec<String>> = diff
                    .only_expected
                    .iter()
                    .map(|t| side_row("expected", t))
                    .chain(diff.only_actual.iter().map(|t| side_row("actual", t)))
                    .collect();
                style::print_spacer();
                style::print_data_table(
                    &["Only in", "Subject", "Object", "Action"],
                    &[],
                    &rows,
                    "difference",
                );
            }
        }
    }

    if !diff.is_exact_match() {
        bail!("ACLs differ in {} permissions", diff.total_differences());
    }
    if ctx.format == OutputFormat::Table {
        style::print_success("ACLs match");
    }
    Ok(())
}

fn read_acl(path: &Path) -> Result<Acl> {
    let text = read_input(path)?;
    Acl::parse(&text).with_context(|| format!("Failed to parse ACL {}", path.display()))
}

fn triple_row(triple: &AccessTriple) -> Vec<String> {
    vec![
        triple.subject.clone(),
        triple.object.clone(),
        triple.action.clone(),
    ]
}

fn side_row(side: &str, triple: &AccessTriple) -> Vec<String> {
    let mut row = vec![side.to_string()];
    row.extend(triple_row(triple));
    row
}

fn triple_line(triple: &AccessTriple) -> String {
    format!("{}, {}, {}", triple.subject, triple.object, triple.action)
}
