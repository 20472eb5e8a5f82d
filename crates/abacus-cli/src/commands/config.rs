//! Configuration commands.

use abacus_config::{AbacusConfig, OutputFormat};
use anyhow::{Context as _, Result};

use super::{Context, print_json};
use crate::style;

/// Show the effective configuration (files, environment and flags merged).
pub fn show(ctx: &Context) -> Result<()> {
    let config: &AbacusConfig = &ctx.config;

    match ctx.format {
        OutputFormat::Json => print_json(config)?,
        OutputFormat::Text => {
            let toml = config.to_toml().context("Failed to render configuration")?;
            print!("{toml}");
        }
        OutputFormat::Table => style::print_info_table(&[
            ("analytics.strategy", config.analytics.strategy.to_string()),
            ("analytics.parallel", config.analytics.parallel.to_string()),
            ("analytics.top", config.analytics.top.to_string()),
            ("output.format", config.output.format.to_string()),
            ("output.color", config.output.color.to_string()),
            ("log.level", config.log.level.clone()),
        ]),
    }
    Ok(())
}
