//! JSON export and canonical policy text.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::load_policy;
use crate::style::{self, colors::SemanticStyle};

/// Writes the policy as JSON to stdout or `output`.
pub fn json(policy: &Path, output: Option<&Path>) -> Result<()> {
    let store = load_policy(policy)?;
    let json = store.to_json().context("Failed to serialize policy")?;

    match output {
        Some(path) => {
            fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            style::print_success(&format!(
                "Exported {} subjects, {} objects and {} rules to {}",
                store.subjects().len(),
                store.objects().len(),
                store.rules().len(),
                path.display().to_string().code()
            ));
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Prints the policy in canonical form: sets sorted, groups in order.
pub fn fmt(policy: &Path) -> Result<()> {
    let store = load_policy(policy)?;
    print!("{store}");
    Ok(())
}
