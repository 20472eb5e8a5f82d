//! CLI command implementations.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use abacus_config::{AbacusConfig, OutputFormat};
use abacus_policy::{Analysis, Analyzer, PolicyStore, Strategy};
use anyhow::{Context as _, Result};

use crate::style;

pub mod acl;
pub mod check;
pub mod config;
pub mod eval;
pub mod export;
pub mod query;
pub mod report;

/// Settings shared by every command: configuration with CLI flags applied.
pub struct Context {
    pub config: AbacusConfig,
    pub format: OutputFormat,
}

/// Scan settings after CLI flags are applied over `[analytics]`.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub strategy: Strategy,
    pub parallel: bool,
}

/// Loads a policy file, attaching the path to any error.
pub fn load_policy(path: &Path) -> Result<PolicyStore> {
    PolicyStore::load(path).with_context(|| format!("Failed to load policy {}", path.display()))
}

/// Reads a text input; `-` means stdin.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Runs the bulk scan behind a spinner.
pub fn scan(store: &PolicyStore, options: ScanOptions) -> Analysis {
    let spinner = style::create_spinner(&format!(
        "Scanning {} rules x {} subjects x {} objects...",
        store.rules().len(),
        store.subjects().len(),
        store.objects().len()
    ));
    let analysis = Analyzer::new(store)
        .with_strategy(options.strategy)
        .with_parallel(options.parallel)
        .run();
    style::finish_and_clear(&spinner);
    analysis
}

/// Pretty-prints a value as JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
